//! Flat capability traits implemented by every channel-like value
//!
//! A cog behaves as a channel because its handle implements the same small
//! interface set as [`Chan`] and [`IoEndpoint`]: no hierarchy, just
//! delegation.

use async_trait::async_trait;

use super::chan::Chan;
use super::endpoint::IoEndpoint;

/// The send half of the channel contract
#[async_trait]
pub trait Sender<T>: Send + Sync {
    /// Send a value, suspending until accepted; `false` if closed
    async fn send(&self, value: T) -> bool;

    /// Try to send without suspending
    fn offer(&self, value: T) -> bool;
}

/// The receive half of the channel contract
#[async_trait]
pub trait Receiver<T>: Send + Sync {
    /// Receive the next value; `None` is end-of-stream
    async fn recv(&self) -> Option<T>;

    /// Try to receive without suspending
    fn poll(&self) -> Option<T>;
}

/// The lifecycle half of the channel contract
pub trait Closer {
    /// Close (idempotent)
    fn close(&self);

    /// Check if closed
    fn is_closed(&self) -> bool;
}

/// Anything that can sit in a dataflow graph: send, receive, close
pub trait Port<I, O = I>: Sender<I> + Receiver<O> + Closer {}

impl<P, I, O> Port<I, O> for P where P: Sender<I> + Receiver<O> + Closer {}

// ============================================================================
// Chan
// ============================================================================

#[async_trait]
impl<T: Send> Sender<T> for Chan<T> {
    async fn send(&self, value: T) -> bool {
        Chan::send(self, value).await
    }

    fn offer(&self, value: T) -> bool {
        Chan::offer(self, value)
    }
}

#[async_trait]
impl<T: Send> Receiver<T> for Chan<T> {
    async fn recv(&self) -> Option<T> {
        Chan::recv(self).await
    }

    fn poll(&self) -> Option<T> {
        Chan::poll(self)
    }
}

impl<T> Closer for Chan<T> {
    fn close(&self) {
        Chan::close(self);
    }

    fn is_closed(&self) -> bool {
        Chan::is_closed(self)
    }
}

// ============================================================================
// IoEndpoint
// ============================================================================

#[async_trait]
impl<I: Send, O: Send> Sender<I> for IoEndpoint<I, O> {
    async fn send(&self, value: I) -> bool {
        IoEndpoint::send(self, value).await
    }

    fn offer(&self, value: I) -> bool {
        IoEndpoint::offer(self, value)
    }
}

#[async_trait]
impl<I: Send, O: Send> Receiver<O> for IoEndpoint<I, O> {
    async fn recv(&self) -> Option<O> {
        IoEndpoint::recv(self).await
    }

    fn poll(&self) -> Option<O> {
        IoEndpoint::poll(self)
    }
}

impl<I, O> Closer for IoEndpoint<I, O> {
    fn close(&self) {
        IoEndpoint::close(self);
    }

    fn is_closed(&self) -> bool {
        IoEndpoint::is_closed(self)
    }
}
