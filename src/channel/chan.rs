//! The queue underneath every cog, broadcast, and combinator
//!
//! A [`Chan`] is an ordered FIFO with three buffer disciplines:
//! - **Rendezvous**: send suspends until a receiver is parked and takes over
//! - **Bounded(n)**: send suspends while the buffer is full
//! - **Sliding**: send always succeeds; the oldest retained item is dropped
//!
//! A channel may carry an enqueue transform that expands one value into zero
//! or more values (map, filter, expand), with an optional fault handler that
//! turns a transform fault into a replacement value or a drop. Without a
//! handler, a transform fault closes the channel.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::Fault;

/// Default buffer size for bounded channels allocated by the runtime
pub const DEFAULT_CAPACITY: usize = 32;

/// Buffer discipline of a [`Chan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// Send suspends until a matching receive (capacity 0)
    Rendezvous,

    /// Send suspends when the buffer holds this many items
    Bounded(usize),

    /// Accept always; drop the oldest retained item (size 1)
    Sliding,
}

/// Enqueue transform: one incoming value becomes zero or more values
pub type TransformFn<T> = Arc<dyn Fn(T) -> Result<Vec<T>, Fault> + Send + Sync>;

/// Transform fault handler: replace the value or drop it (`None`)
pub type TransformFaultFn<T> = Arc<dyn Fn(Fault) -> Option<T> + Send + Sync>;

struct ChanState<T> {
    queue: VecDeque<T>,
    closed: bool,
    /// Receivers currently parked in `recv`; may briefly overshoot if a recv
    /// future is dropped mid-wait, which at worst commits a hand-off early.
    recv_waiting: usize,
}

struct ChanInner<T> {
    capacity: Capacity,
    state: Mutex<ChanState<T>>,
    transform: Option<TransformFn<T>>,
    on_fault: Option<TransformFaultFn<T>>,
    /// Signaled when values arrive or the channel closes
    items: Notify,
    /// Signaled when buffer room frees up, a receiver parks, or close
    space: Notify,
}

/// An ordered FIFO message queue
///
/// Cloning a `Chan` produces another handle to the same queue; any handle may
/// send, receive, or close.
pub struct Chan<T> {
    inner: Arc<ChanInner<T>>,
}

impl<T> Clone for Chan<T> {
    fn clone(&self) -> Self {
        Chan {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Chan<T> {
    /// Create a rendezvous channel (capacity 0)
    pub fn rendezvous() -> Self {
        Self::with_capacity(Capacity::Rendezvous)
    }

    /// Create a bounded channel
    ///
    /// A capacity of 0 is a rendezvous channel.
    pub fn bounded(n: usize) -> Self {
        if n == 0 {
            Self::rendezvous()
        } else {
            Self::with_capacity(Capacity::Bounded(n))
        }
    }

    /// Create a sliding channel: always accepts, keeps only the newest item
    pub fn sliding() -> Self {
        Self::with_capacity(Capacity::Sliding)
    }

    /// Create a channel with the given buffer discipline
    pub fn with_capacity(capacity: Capacity) -> Self {
        ChanBuilder::new().capacity(capacity).build()
    }

    /// Start building a channel with a transform or fault handler
    pub fn builder() -> ChanBuilder<T> {
        ChanBuilder::new()
    }

    // =========================================================================
    // Send Side
    // =========================================================================

    /// Send a value, suspending until the channel accepts it
    ///
    /// The enqueue transform (if any) is applied first; every produced value
    /// is enqueued in order. Returns `false` if the channel is closed.
    pub async fn send(&self, value: T) -> bool {
        match &self.inner.transform {
            None => self.enqueue(value).await,
            Some(transform) => match transform(value) {
                Ok(values) => {
                    for v in values {
                        if !self.enqueue(v).await {
                            return false;
                        }
                    }
                    true
                }
                Err(fault) => match &self.inner.on_fault {
                    Some(handler) => match handler(fault) {
                        Some(replacement) => self.enqueue(replacement).await,
                        None => true,
                    },
                    None => {
                        tracing::warn!(error = %fault, "transform fault with no handler, closing channel");
                        self.close();
                        false
                    }
                },
            },
        }
    }

    /// Try to send without suspending
    ///
    /// Transformed values are placed only if they all fit right now: room in
    /// a bounded buffer, a parked receiver per value for rendezvous. Sliding
    /// channels always accept. Returns `false` if nothing was placed and the
    /// value was not dropped by a transform or fault handler.
    pub fn offer(&self, value: T) -> bool {
        match &self.inner.transform {
            None => self.offer_all(vec![value]),
            Some(transform) => match transform(value) {
                Ok(values) => self.offer_all(values),
                Err(fault) => match &self.inner.on_fault {
                    Some(handler) => match handler(fault) {
                        Some(replacement) => self.offer_all(vec![replacement]),
                        None => true,
                    },
                    None => {
                        tracing::warn!(error = %fault, "transform fault with no handler, closing channel");
                        self.close();
                        false
                    }
                },
            },
        }
    }

    async fn enqueue(&self, value: T) -> bool {
        let mut value = Some(value);
        loop {
            let notified = self.inner.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut st = self.inner.state.lock();
                if st.closed {
                    return false;
                }
                let accepted = match self.inner.capacity {
                    Capacity::Sliding => {
                        if !st.queue.is_empty() {
                            st.queue.pop_front();
                        }
                        true
                    }
                    Capacity::Bounded(n) => st.queue.len() < n,
                    Capacity::Rendezvous => st.recv_waiting > st.queue.len(),
                };
                if accepted {
                    if let Some(v) = value.take() {
                        st.queue.push_back(v);
                    }
                    drop(st);
                    self.inner.items.notify_waiters();
                    return true;
                }
            }
            notified.as_mut().await;
        }
    }

    fn offer_all(&self, values: Vec<T>) -> bool {
        let mut st = self.inner.state.lock();
        if st.closed {
            return false;
        }
        if values.is_empty() {
            return true;
        }
        let fits = match self.inner.capacity {
            Capacity::Sliding => true,
            Capacity::Bounded(n) => st.queue.len() + values.len() <= n,
            Capacity::Rendezvous => st.recv_waiting >= st.queue.len() + values.len(),
        };
        if !fits {
            return false;
        }
        for v in values {
            if matches!(self.inner.capacity, Capacity::Sliding) && !st.queue.is_empty() {
                st.queue.pop_front();
            }
            st.queue.push_back(v);
        }
        drop(st);
        self.inner.items.notify_waiters();
        true
    }

    // =========================================================================
    // Receive Side
    // =========================================================================

    /// Receive the next value, suspending until one arrives
    ///
    /// Returns `None` once the channel is closed and its buffer has drained.
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.inner.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut st = self.inner.state.lock();
                if let Some(v) = st.queue.pop_front() {
                    drop(st);
                    self.inner.space.notify_waiters();
                    return Some(v);
                }
                if st.closed {
                    return None;
                }
                st.recv_waiting += 1;
            }
            // a rendezvous sender may be waiting for a parked receiver
            self.inner.space.notify_waiters();
            notified.as_mut().await;
            self.inner.state.lock().recv_waiting -= 1;
        }
    }

    /// Try to receive without suspending
    pub fn poll(&self) -> Option<T> {
        let mut st = self.inner.state.lock();
        let value = st.queue.pop_front();
        if value.is_some() {
            drop(st);
            self.inner.space.notify_waiters();
        }
        value
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the channel (idempotent)
    ///
    /// Buffered values remain receivable; once drained, receivers observe
    /// end-of-stream. Further sends are refused.
    pub fn close(&self) {
        {
            let mut st = self.inner.state.lock();
            if st.closed {
                return;
            }
            st.closed = true;
        }
        self.inner.items.notify_waiters();
        self.inner.space.notify_waiters();
    }

    /// Check if the channel has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of values currently buffered
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for Chan<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chan")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// ChanBuilder
// ============================================================================

/// Builder for channels with a transform or fault handler
///
/// ```ignore
/// let evens: Chan<i64> = Chan::builder()
///     .capacity(Capacity::Bounded(8))
///     .transform(|n| Ok(if n % 2 == 0 { vec![n] } else { vec![] }))
///     .build();
/// ```
pub struct ChanBuilder<T> {
    capacity: Capacity,
    transform: Option<TransformFn<T>>,
    on_fault: Option<TransformFaultFn<T>>,
}

impl<T> ChanBuilder<T> {
    /// Start a builder; the default discipline is rendezvous
    pub fn new() -> Self {
        Self {
            capacity: Capacity::Rendezvous,
            transform: None,
            on_fault: None,
        }
    }

    /// Set the buffer discipline
    pub fn capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the enqueue transform
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Result<Vec<T>, Fault> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Set the transform fault handler
    pub fn on_fault<F>(mut self, f: F) -> Self
    where
        F: Fn(Fault) -> Option<T> + Send + Sync + 'static,
    {
        self.on_fault = Some(Arc::new(f));
        self
    }

    pub(crate) fn transform_shared(mut self, f: TransformFn<T>) -> Self {
        self.transform = Some(f);
        self
    }

    pub(crate) fn on_fault_shared(mut self, f: TransformFaultFn<T>) -> Self {
        self.on_fault = Some(f);
        self
    }

    /// Build the channel
    pub fn build(self) -> Chan<T> {
        Chan {
            inner: Arc::new(ChanInner {
                capacity: self.capacity,
                state: Mutex::new(ChanState {
                    queue: VecDeque::new(),
                    closed: false,
                    recv_waiting: 0,
                }),
                transform: self.transform,
                on_fault: self.on_fault,
                items: Notify::new(),
                space: Notify::new(),
            }),
        }
    }
}

impl<T> Default for ChanBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
