//! Flow - a sequential pipeline of channel stages
//!
//! Values put on the flow's input travel stage by stage, the output of each
//! becoming the input of the next; the final stage's output is emitted on the
//! flow's output. One forwarder task per hop. When the flow's input closes,
//! closure chases the values downstream so every stage drains before its
//! successor shuts; a stage found closed terminates the whole flow.

use crate::channel::{Chan, IoEndpoint, DEFAULT_CAPACITY};
use crate::core::{CogError, CogResult, Message};

/// Connect stages into a pipeline, returning its endpoint
///
/// Each stage is an endpoint: a cog's [`endpoint`](crate::cog::Cog::endpoint),
/// a plain channel via [`IoEndpoint::from_chan`], or another combinator.
pub fn flow(stages: Vec<IoEndpoint<Message>>) -> CogResult<IoEndpoint<Message>> {
    if stages.is_empty() {
        return Err(CogError::EmptyFlow);
    }

    let inlet: Chan<Message> = Chan::bounded(DEFAULT_CAPACITY);
    let outlet: Chan<Message> = Chan::bounded(DEFAULT_CAPACITY);
    let endpoint = IoEndpoint::new(inlet.clone(), outlet.clone());

    // inlet -> first stage
    {
        let first = stages[0].clone();
        let from = inlet.clone();
        let flow_in = inlet.clone();
        tokio::spawn(async move {
            while let Some(msg) = from.recv().await {
                if !first.send(msg).await {
                    flow_in.close();
                    break;
                }
            }
            first.input().close();
        });
    }

    // stage i -> stage i+1
    for pair in stages.windows(2) {
        let up = pair[0].clone();
        let down = pair[1].clone();
        let flow_in = inlet.clone();
        tokio::spawn(async move {
            while let Some(msg) = up.recv().await {
                if !down.send(msg).await {
                    flow_in.close();
                    break;
                }
            }
            down.input().close();
        });
    }

    // last stage -> outlet
    {
        let last = stages[stages.len() - 1].clone();
        let flow_in = inlet.clone();
        let out = outlet;
        tokio::spawn(async move {
            while let Some(msg) = last.recv().await {
                if !out.send(msg).await {
                    break;
                }
            }
            // the pipeline is done: refuse further input, then end the output
            flow_in.close();
            out.close();
            tracing::trace!("flow drained and closed");
        });
    }

    Ok(endpoint)
}
