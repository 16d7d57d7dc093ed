//! IoEndpoint - a paired (input, output) handle presented as one channel
//!
//! Sends route to the input channel, receives pull from the output channel,
//! and close closes both. This is the uniform shape every cog and combinator
//! returns, so graphs compose with ordinary channel operations.

use super::chan::{Chan, DEFAULT_CAPACITY};

/// A bidirectional channel handle
///
/// `I` is the type accepted on the input side, `O` the type produced on the
/// output side; for plain pass-through endpoints the two coincide.
pub struct IoEndpoint<I, O = I> {
    input: Chan<I>,
    output: Chan<O>,
}

impl<I, O> Clone for IoEndpoint<I, O> {
    fn clone(&self) -> Self {
        IoEndpoint {
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }
}

impl<I, O> IoEndpoint<I, O> {
    /// Pair an input channel with an output channel
    pub fn new(input: Chan<I>, output: Chan<O>) -> Self {
        Self { input, output }
    }

    /// Allocate a fresh, unconnected pair of bounded channels
    ///
    /// Used to splice adapters: hand the endpoint to a cog's `extend` and it
    /// becomes the derived cog's face.
    pub fn pair() -> Self {
        Self {
            input: Chan::bounded(DEFAULT_CAPACITY),
            output: Chan::bounded(DEFAULT_CAPACITY),
        }
    }

    /// The input channel (writes go here)
    pub fn input(&self) -> &Chan<I> {
        &self.input
    }

    /// The output channel (reads come from here)
    pub fn output(&self) -> &Chan<O> {
        &self.output
    }

    /// Send a value to the input side
    pub async fn send(&self, value: I) -> bool {
        self.input.send(value).await
    }

    /// Try to send without suspending
    pub fn offer(&self, value: I) -> bool {
        self.input.offer(value)
    }

    /// Receive the next value from the output side
    pub async fn recv(&self) -> Option<O> {
        self.output.recv().await
    }

    /// Try to receive without suspending
    pub fn poll(&self) -> Option<O> {
        self.output.poll()
    }

    /// Close both sides (idempotent)
    pub fn close(&self) {
        self.input.close();
        self.output.close();
    }

    /// Check if the input side has been closed
    pub fn is_closed(&self) -> bool {
        self.input.is_closed()
    }
}

impl<T> IoEndpoint<T, T> {
    /// Present a single channel as an endpoint
    ///
    /// Sends and receives address the same queue, so the channel itself acts
    /// as a pipeline stage.
    pub fn from_chan(chan: Chan<T>) -> Self {
        Self {
            input: chan.clone(),
            output: chan,
        }
    }
}

impl<I, O> std::fmt::Debug for IoEndpoint<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoEndpoint")
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}
