//! Cog - a stateful agent behind a channel endpoint
//!
//! A cog owns a private context, advances it with a user transition on a
//! dedicated worker task, and publishes every output through a broadcast.
//! Its handle behaves as an ordinary channel: send feeds the worker, receive
//! pulls from the primary read endpoint, close drains and shuts down.

use std::sync::Arc;

use async_trait::async_trait;

use crate::broadcast::{Broadcast, Subscribable, Subscription};
use crate::channel::{Capacity, Chan, Closer, IoEndpoint, Receiver, Sender, DEFAULT_CAPACITY};
use crate::channel::{TransformFaultFn, TransformFn};
use crate::core::{Fault, Message};

use super::cell::ContextCell;
use super::transition::{default_fault_handler, FaultHandler, Transition};

/// A stateful concurrent agent
///
/// Cloning produces another handle to the same cog. The handle implements
/// the channel capability traits, so a cog drops into any place a channel
/// fits.
pub struct Cog<C> {
    context: ContextCell<C>,
    io: IoEndpoint<Message>,
    broadcast: Broadcast<Message>,
    transition: Option<Arc<dyn Transition<C>>>,
    fault_handler: FaultHandler,
}

impl<C> Clone for Cog<C> {
    fn clone(&self) -> Self {
        Cog {
            context: self.context.clone(),
            io: self.io.clone(),
            broadcast: self.broadcast.clone(),
            transition: self.transition.clone(),
            fault_handler: self.fault_handler.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> Cog<C> {
    /// Create a cog from an initial context and a plain closure transition
    ///
    /// # Example
    ///
    /// ```ignore
    /// let echo = Cog::new(Vec::new(), |seen: &Vec<String>, msg: Message| {
    ///     let text = msg.as_str().unwrap_or("").to_string();
    ///     let mut next = seen.clone();
    ///     next.push(text.clone());
    ///     Ok((next, Message::text(format!("echo:{}", text))))
    /// });
    /// ```
    pub fn new<F>(initial: C, transition: F) -> Self
    where
        F: Fn(&C, Message) -> Result<(C, Message), Fault> + Send + Sync + 'static,
    {
        CogBuilder::new(initial, transition).spawn()
    }

    /// Start building a cog with non-default queue or fault options
    pub fn builder(initial: C, transition: impl Transition<C> + 'static) -> CogBuilder<C> {
        CogBuilder::new(initial, transition)
    }

    pub(crate) fn from_parts(
        context: ContextCell<C>,
        io: IoEndpoint<Message>,
        broadcast: Broadcast<Message>,
        transition: Option<Arc<dyn Transition<C>>>,
        fault_handler: FaultHandler,
    ) -> Self {
        Self {
            context,
            io,
            broadcast,
            transition,
            fault_handler,
        }
    }

    /// Run the worker loop: receive, step, install, publish
    ///
    /// The worker exits when the input ends, closing the output queue so the
    /// broadcast and every close-on-end subscriber wind down behind it. A
    /// transition fault becomes an error envelope on the output; the context
    /// stays unchanged and the worker keeps going.
    pub(crate) fn spawn_worker(
        context: ContextCell<C>,
        input: Chan<Message>,
        source: Chan<Message>,
        transition: Arc<dyn Transition<C>>,
        fault_handler: FaultHandler,
    ) {
        tokio::spawn(async move {
            while let Some(msg) = input.recv().await {
                let snapshot = context.snapshot();
                match transition.step(snapshot, msg.clone()).await {
                    Ok((next, output)) => {
                        context.install(next);
                        if !source.send(output).await {
                            break;
                        }
                    }
                    Err(fault) => {
                        tracing::debug!(error = %fault, "transition fault, publishing envelope");
                        let envelope = fault_handler(fault, msg);
                        if !source.send(envelope).await {
                            break;
                        }
                    }
                }
            }
            source.close();
            tracing::trace!("cog worker exited");
        });
    }

    // =========================================================================
    // Channel Surface
    // =========================================================================

    /// Send a message to the cog; `false` if its input is closed
    pub async fn send(&self, msg: Message) -> bool {
        self.io.send(msg).await
    }

    /// Try to send without suspending
    pub fn offer(&self, msg: Message) -> bool {
        self.io.offer(msg)
    }

    /// Receive the next output from the primary read endpoint
    pub async fn recv(&self) -> Option<Message> {
        self.io.recv().await
    }

    /// Try to receive without suspending
    pub fn poll(&self) -> Option<Message> {
        self.io.poll()
    }

    /// Close the cog (idempotent)
    ///
    /// Closes the input only; the worker drains any in-flight transition and
    /// buffered inputs, then closes its output queue, which ends the
    /// broadcast and closes the primary read endpoint.
    pub fn close(&self) {
        self.io.input().close();
    }

    /// Check if the cog's input has been closed
    pub fn is_closed(&self) -> bool {
        self.io.is_closed()
    }

    /// Clone of the cog's endpoint, for wiring into combinators
    pub fn endpoint(&self) -> IoEndpoint<Message> {
        self.io.clone()
    }

    // =========================================================================
    // Context & Broadcast Surface
    // =========================================================================

    /// Read-only snapshot of the current context
    ///
    /// Reflects the initial context or the result of the last completed
    /// transition, never a partial value.
    pub fn snapshot(&self) -> Arc<C> {
        self.context.snapshot()
    }

    /// Register a subscriber for every subsequent output
    pub fn subscribe(&self, chan: Chan<Message>, close_on_end: bool) -> Subscription {
        self.broadcast.subscribe(chan, close_on_end)
    }

    /// Remove a subscriber; its channel is left open
    pub fn unsubscribe(&self, sub: Subscription) {
        self.broadcast.unsubscribe(sub)
    }

    /// Number of current subscribers (the primary endpoint counts as one)
    pub fn subscriber_count(&self) -> usize {
        self.broadcast.subscriber_count()
    }

    pub(crate) fn context_cell(&self) -> ContextCell<C> {
        self.context.clone()
    }

    pub(crate) fn broadcast_handle(&self) -> Broadcast<Message> {
        self.broadcast.clone()
    }

    pub(crate) fn transition_arc(&self) -> Option<Arc<dyn Transition<C>>> {
        self.transition.clone()
    }

    pub(crate) fn fault_handler_arc(&self) -> FaultHandler {
        self.fault_handler.clone()
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Sender<Message> for Cog<C> {
    async fn send(&self, value: Message) -> bool {
        Cog::send(self, value).await
    }

    fn offer(&self, value: Message) -> bool {
        Cog::offer(self, value)
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Receiver<Message> for Cog<C> {
    async fn recv(&self) -> Option<Message> {
        Cog::recv(self).await
    }

    fn poll(&self) -> Option<Message> {
        Cog::poll(self)
    }
}

impl<C: Send + Sync + 'static> Closer for Cog<C> {
    fn close(&self) {
        Cog::close(self);
    }

    fn is_closed(&self) -> bool {
        Cog::is_closed(self)
    }
}

impl<C: Send + Sync + 'static> Subscribable<Message> for Cog<C> {
    fn subscribe(&self, chan: Chan<Message>, close_on_end: bool) -> Subscription {
        Cog::subscribe(self, chan, close_on_end)
    }

    fn unsubscribe(&self, sub: Subscription) {
        Cog::unsubscribe(self, sub)
    }
}

impl<C> std::fmt::Debug for Cog<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cog")
            .field("closed", &self.io.is_closed())
            .field("passive", &self.transition.is_none())
            .finish()
    }
}

// ============================================================================
// CogBuilder
// ============================================================================

/// Builder for cogs with non-default queue or fault options
///
/// The output options apply to the worker's output queue, which feeds the
/// broadcast; they affect every subscriber uniformly.
pub struct CogBuilder<C> {
    initial: C,
    transition: Arc<dyn Transition<C>>,
    input_capacity: Capacity,
    output_capacity: Capacity,
    output_transform: Option<TransformFn<Message>>,
    output_fault: Option<TransformFaultFn<Message>>,
    fault_handler: FaultHandler,
}

impl<C: Send + Sync + 'static> CogBuilder<C> {
    /// Start a builder with default capacities and the default fault handler
    pub fn new(initial: C, transition: impl Transition<C> + 'static) -> Self {
        Self {
            initial,
            transition: Arc::new(transition),
            input_capacity: Capacity::Bounded(DEFAULT_CAPACITY),
            output_capacity: Capacity::Rendezvous,
            output_transform: None,
            output_fault: None,
            fault_handler: default_fault_handler(),
        }
    }

    /// Set the input queue discipline
    pub fn with_input_capacity(mut self, capacity: Capacity) -> Self {
        self.input_capacity = capacity;
        self
    }

    /// Set the worker output queue discipline
    pub fn with_output_capacity(mut self, capacity: Capacity) -> Self {
        self.output_capacity = capacity;
        self
    }

    /// Set an enqueue transform on the worker output queue
    pub fn with_output_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Message) -> Result<Vec<Message>, Fault> + Send + Sync + 'static,
    {
        self.output_transform = Some(Arc::new(f));
        self
    }

    /// Set the fault handler for the output transform
    pub fn with_output_transform_fault<F>(mut self, f: F) -> Self
    where
        F: Fn(Fault) -> Option<Message> + Send + Sync + 'static,
    {
        self.output_fault = Some(Arc::new(f));
        self
    }

    /// Replace the transition fault handler
    pub fn with_fault_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(Fault, Message) -> Message + Send + Sync + 'static,
    {
        self.fault_handler = Arc::new(f);
        self
    }

    /// Wire the queues, start the broadcast pump and worker, return the handle
    pub fn spawn(self) -> Cog<C> {
        let context = ContextCell::new(self.initial);
        let io = IoEndpoint::new(
            Chan::with_capacity(self.input_capacity),
            Chan::bounded(DEFAULT_CAPACITY),
        );

        let mut source = Chan::builder().capacity(self.output_capacity);
        if let Some(t) = self.output_transform {
            source = source.transform_shared(t);
        }
        if let Some(h) = self.output_fault {
            source = source.on_fault_shared(h);
        }
        let source = source.build();

        let broadcast = Broadcast::new(source.clone());
        broadcast.subscribe(io.output().clone(), true);

        Cog::spawn_worker(
            context.clone(),
            io.input().clone(),
            source,
            self.transition.clone(),
            self.fault_handler.clone(),
        );

        Cog::from_parts(context, io, broadcast, Some(self.transition), self.fault_handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cog::transition::AsyncTransition;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    fn echo_cog() -> Cog<Vec<String>> {
        Cog::new(Vec::new(), |seen: &Vec<String>, msg: Message| {
            let text = msg.as_str().unwrap_or("").to_string();
            let mut next = seen.clone();
            next.push(text.clone());
            Ok((next, Message::text(format!("echo:{}", text))))
        })
    }

    #[tokio::test]
    async fn test_echo_cog() {
        let cog = echo_cog();

        assert!(cog.send(Message::text("a")).await);
        assert!(cog.send(Message::text("b")).await);

        assert_eq!(cog.recv().await, Some(Message::text("echo:a")));
        assert_eq!(cog.recv().await, Some(Message::text("echo:b")));
        assert_eq!(*cog.snapshot(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_fifo_input_to_output() {
        let cog = Cog::new(0u64, |count: &u64, msg: Message| {
            Ok((count + 1, msg))
        });

        for i in 0..10i64 {
            assert!(cog.send(Message::value(i)).await);
        }
        for i in 0..10i64 {
            assert_eq!(cog.recv().await, Some(Message::value(i)));
        }
        assert_eq!(*cog.snapshot(), 10);
    }

    #[tokio::test]
    async fn test_error_recovery() {
        let cog = Cog::new(Vec::new(), |seen: &Vec<String>, msg: Message| {
            let text = msg.as_str().unwrap_or("").to_string();
            if text.contains("fail") {
                return Err(anyhow!("rejected: {}", text));
            }
            let mut next = seen.clone();
            next.push(text.clone());
            Ok((next, Message::text(text)))
        });

        assert!(cog.send(Message::text("ok1")).await);
        assert!(cog.send(Message::text("fail")).await);
        assert!(cog.send(Message::text("ok2")).await);

        assert_eq!(cog.recv().await, Some(Message::text("ok1")));

        let envelope = cog.recv().await.unwrap();
        assert!(envelope.is_error());
        match &envelope {
            Message::Error { cause, input } => {
                assert!(cause.contains("rejected"));
                assert_eq!(input.as_str(), Some("fail"));
            }
            _ => panic!("expected error envelope"),
        }

        // The cog is still alive and the faulted input left no trace
        assert_eq!(cog.recv().await, Some(Message::text("ok2")));
        assert_eq!(*cog.snapshot(), vec!["ok1".to_string(), "ok2".to_string()]);
    }

    #[tokio::test]
    async fn test_custom_fault_handler() {
        let cog = Cog::builder(0u64, |_: &u64, _: Message| -> Result<(u64, Message), Fault> {
            Err(anyhow!("always"))
        })
        .with_fault_handler(|_, input| Message::tuple(vec![Message::text("fault"), input]))
        .spawn();

        assert!(cog.send(Message::text("x")).await);
        let out = cog.recv().await.unwrap();
        assert_eq!(
            out,
            Message::tuple(vec![Message::text("fault"), Message::text("x")])
        );
    }

    #[tokio::test]
    async fn test_serial_transitions() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let a = active.clone();
        let p = peak.clone();

        let cog = Cog::builder(
            0usize,
            AsyncTransition(move |ctx: Arc<usize>, msg: Message| {
                let a = a.clone();
                let p = p.clone();
                async move {
                    let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    a.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Fault>((*ctx + 1, msg))
                }
            }),
        )
        .spawn();

        for i in 0..5i64 {
            assert!(cog.send(Message::value(i)).await);
        }
        for _ in 0..5 {
            assert!(cog.recv().await.is_some());
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(*cog.snapshot(), 5);
    }

    #[tokio::test]
    async fn test_close_drains_in_flight_output() {
        let cog = echo_cog();

        assert!(cog.send(Message::text("a")).await);
        cog.close();
        cog.close(); // idempotent

        assert!(cog.is_closed());
        assert!(!cog.send(Message::text("late")).await);

        // The buffered input still produces its output before end-of-stream
        assert_eq!(cog.recv().await, Some(Message::text("echo:a")));
        assert_eq!(cog.recv().await, None);
    }

    #[tokio::test]
    async fn test_subscriber_sees_every_output() {
        let cog = echo_cog();

        let tap = Chan::bounded(8);
        cog.subscribe(tap.clone(), true);

        assert!(cog.send(Message::text("a")).await);
        assert!(cog.send(Message::text("b")).await);

        assert_eq!(tap.recv().await, Some(Message::text("echo:a")));
        assert_eq!(tap.recv().await, Some(Message::text("echo:b")));

        cog.close();
        assert_eq!(tap.recv().await, None); // closed with the cog
    }

    #[tokio::test]
    async fn test_unsubscribed_tap_stays_open() {
        let cog = echo_cog();

        let tap = Chan::bounded(8);
        let registration = cog.subscribe(tap.clone(), true);
        cog.unsubscribe(registration);

        cog.close();
        assert_eq!(cog.recv().await, None);
        assert!(!tap.is_closed());
    }

    #[tokio::test]
    async fn test_output_transform_applies_to_all_subscribers() {
        let cog = Cog::builder(0u64, |n: &u64, msg: Message| Ok((n + 1, msg)))
            .with_output_transform(|msg| {
                let text = msg.as_str().unwrap_or("").to_string();
                Ok(vec![Message::text(format!("[{}]", text))])
            })
            .spawn();

        let tap = Chan::bounded(8);
        cog.subscribe(tap.clone(), true);

        assert!(cog.send(Message::text("x")).await);
        assert_eq!(cog.recv().await, Some(Message::text("[x]")));
        assert_eq!(tap.recv().await, Some(Message::text("[x]")));
    }

    #[tokio::test]
    async fn test_offer_and_poll() {
        let cog = echo_cog();

        assert!(cog.offer(Message::text("a")));
        assert_eq!(cog.recv().await, Some(Message::text("echo:a")));
        assert_eq!(cog.poll(), None);
    }

    #[tokio::test]
    async fn test_snapshot_never_observes_partial_state() {
        let cog = Cog::new(0i64, |n: &i64, msg: Message| {
            Ok((n + 1, msg))
        });

        for i in 0..20i64 {
            assert!(cog.send(Message::value(i)).await);
            let snap = *cog.snapshot();
            assert!((0..=20).contains(&snap));
        }
        for _ in 0..20 {
            assert!(cog.recv().await.is_some());
        }
        assert_eq!(*cog.snapshot(), 20);
    }

    #[tokio::test]
    async fn test_recv_times_out_without_input() {
        let cog = echo_cog();
        let got = timeout(Duration::from_millis(20), cog.recv()).await;
        assert!(got.is_err());
    }
}
