//! Fork and extend - deriving cogs from a running cog
//!
//! A fork shares the parent's context cell (or transforms a snapshot into a
//! fresh cell), runs on its own worker, queues, and broadcast, and may
//! inherit or replace the parent's transition. A passive fork has no worker
//! at all: it forwards its input to the parent and re-exposes the parent's
//! broadcast through a new endpoint, which is how modality adapters tap a
//! cog without duplicating its logic.

use std::sync::Arc;

use crate::broadcast::Broadcast;
use crate::channel::{Capacity, Chan, IoEndpoint, DEFAULT_CAPACITY};
use crate::core::Message;

use super::cell::ContextCell;
use super::cog::Cog;
use super::transition::{FaultHandler, Transition};

enum ForkTransition<C> {
    /// Use the parent's transition
    Inherit,
    /// Run a different transition over the (shared or mapped) context
    Replace(Arc<dyn Transition<C>>),
    /// No worker; mirror the parent
    Passive,
}

/// Builder for a derived cog, created by [`Cog::fork`]
pub struct Fork<'a, C> {
    parent: &'a Cog<C>,
    map_context: Option<Box<dyn FnOnce(&C) -> C + Send>>,
    endpoint: Option<IoEndpoint<Message>>,
    transition: ForkTransition<C>,
    input_capacity: Capacity,
    output_capacity: Capacity,
    fault_handler: Option<FaultHandler>,
}

impl<'a, C: Send + Sync + 'static> Fork<'a, C> {
    fn new(parent: &'a Cog<C>) -> Self {
        Self {
            parent,
            map_context: None,
            endpoint: None,
            transition: ForkTransition::Inherit,
            input_capacity: Capacity::Bounded(DEFAULT_CAPACITY),
            output_capacity: Capacity::Rendezvous,
            fault_handler: None,
        }
    }

    /// Initialize a fresh context cell from a snapshot of the parent
    ///
    /// Without this, the derived cog shares the parent's cell by reference.
    pub fn map_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&C) -> C + Send + 'static,
    {
        self.map_context = Some(Box::new(f));
        self
    }

    /// Use the given endpoint instead of allocating a fresh pair
    pub fn endpoint(mut self, io: IoEndpoint<Message>) -> Self {
        self.endpoint = Some(io);
        self
    }

    /// Replace the inherited transition
    pub fn transition(mut self, t: impl Transition<C> + 'static) -> Self {
        self.transition = ForkTransition::Replace(Arc::new(t));
        self
    }

    /// Derive a passive cog: no worker, input forwarded to the parent, output
    /// tapped from the parent's broadcast
    pub fn passive(mut self) -> Self {
        self.transition = ForkTransition::Passive;
        self
    }

    /// Set the input queue discipline of the derived cog
    pub fn with_input_capacity(mut self, capacity: Capacity) -> Self {
        self.input_capacity = capacity;
        self
    }

    /// Set the worker output queue discipline of the derived cog
    pub fn with_output_capacity(mut self, capacity: Capacity) -> Self {
        self.output_capacity = capacity;
        self
    }

    /// Replace the inherited transition fault handler
    pub fn with_fault_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::core::Fault, Message) -> Message + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(f));
        self
    }

    /// Spawn the derived cog
    pub fn spawn(self) -> Cog<C> {
        let context = match self.map_context {
            None => self.parent.context_cell(),
            Some(f) => {
                let snap = self.parent.snapshot();
                ContextCell::new(f(&snap))
            }
        };

        let io = self.endpoint.unwrap_or_else(|| {
            IoEndpoint::new(
                Chan::with_capacity(self.input_capacity),
                Chan::bounded(DEFAULT_CAPACITY),
            )
        });

        let fault_handler = self
            .fault_handler
            .unwrap_or_else(|| self.parent.fault_handler_arc());

        let transition = match self.transition {
            ForkTransition::Inherit => self.parent.transition_arc(),
            ForkTransition::Replace(t) => Some(t),
            ForkTransition::Passive => None,
        };

        match transition {
            Some(transition) => {
                let source = Chan::with_capacity(self.output_capacity);
                let broadcast = Broadcast::new(source.clone());
                broadcast.subscribe(io.output().clone(), true);

                Cog::spawn_worker(
                    context.clone(),
                    io.input().clone(),
                    source,
                    transition.clone(),
                    fault_handler.clone(),
                );

                Cog::from_parts(context, io, broadcast, Some(transition), fault_handler)
            }
            None => {
                // Passive: tap the parent's broadcast, forward input upstream.
                let broadcast = self.parent.broadcast_handle();
                broadcast.subscribe(io.output().clone(), true);

                let derived_in = io.input().clone();
                let parent_io = self.parent.endpoint();
                tokio::spawn(async move {
                    while let Some(msg) = derived_in.recv().await {
                        if !parent_io.send(msg).await {
                            break;
                        }
                    }
                    tracing::trace!("passive fork forwarder exited");
                });

                Cog::from_parts(context, io, broadcast, None, fault_handler)
            }
        }
    }
}

impl<C: Send + Sync + 'static> Cog<C> {
    /// Start deriving a cog from this one
    pub fn fork(&self) -> Fork<'_, C> {
        Fork::new(self)
    }

    /// Splice an adapter endpoint onto this cog's logic
    ///
    /// Fork sugar: shared context, the given endpoint, inherited transition.
    pub fn extend(&self, io: IoEndpoint<Message>) -> Cog<C> {
        self.fork().endpoint(io).spawn()
    }

    /// Splice an adapter endpoint with its own transition
    pub fn extend_with(&self, io: IoEndpoint<Message>, t: impl Transition<C> + 'static) -> Cog<C> {
        self.fork().endpoint(io).transition(t).spawn()
    }
}
