//! Dialogue - an alternating two-party exchange over two cogs
//!
//! The first value sent to the dialogue seeds participant A. From then on the
//! coordinator relays: A's reply is published and forwarded to B, B's reply
//! is published and forwarded to A, alternating until either participant
//! ends. The dialogue does not own the participants; closing it leaves both
//! running.

use crate::channel::{Capacity, Chan, IoEndpoint, DEFAULT_CAPACITY};
use crate::core::Message;

/// Options for [`dialogue_with`]
pub struct DialogueConfig {
    output_capacity: Capacity,
}

impl DialogueConfig {
    pub fn new() -> Self {
        Self {
            output_capacity: Capacity::Bounded(DEFAULT_CAPACITY),
        }
    }

    /// Override the published-output discipline
    ///
    /// `Capacity::Sliding` suits consumers that want stale turns dropped
    /// while they are busy (audio playback reading at its own pace).
    pub fn with_output_capacity(mut self, capacity: Capacity) -> Self {
        self.output_capacity = capacity;
        self
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a dialogue between two participant endpoints with default options
pub fn dialogue(a: IoEndpoint<Message>, b: IoEndpoint<Message>) -> IoEndpoint<Message> {
    dialogue_with(a, b, DialogueConfig::new())
}

/// Start a dialogue between two participant endpoints
pub fn dialogue_with(
    a: IoEndpoint<Message>,
    b: IoEndpoint<Message>,
    config: DialogueConfig,
) -> IoEndpoint<Message> {
    let inlet: Chan<Message> = Chan::bounded(DEFAULT_CAPACITY);
    let outlet: Chan<Message> = Chan::with_capacity(config.output_capacity);
    let endpoint = IoEndpoint::new(inlet.clone(), outlet.clone());

    tokio::spawn(async move {
        let seed = match inlet.recv().await {
            Some(msg) => msg,
            None => {
                outlet.close();
                return;
            }
        };
        if !a.send(seed).await {
            inlet.close();
            outlet.close();
            return;
        }

        loop {
            let from_a = match a.recv().await {
                Some(msg) => msg,
                None => break,
            };
            if !outlet.send(from_a.clone()).await {
                break;
            }
            if !b.send(from_a).await {
                break;
            }

            let from_b = match b.recv().await {
                Some(msg) => msg,
                None => break,
            };
            if !outlet.send(from_b.clone()).await {
                break;
            }
            if !a.send(from_b).await {
                break;
            }
        }

        inlet.close();
        outlet.close();
        tracing::trace!("dialogue closed");
    });

    endpoint
}
