//! The transition seam: user code that advances a cog's context
//!
//! A transition takes the current context and one input message and returns
//! the next context together with the output to publish. Plain closures of
//! shape `Fn(&C, Message) -> Result<(C, Message), Fault>` are transitions;
//! [`AsyncTransition`] adapts async closures for work that performs network
//! or disk I/O.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Fault, Message};

/// A user transition bound to a cog's worker
///
/// `step` must not be called concurrently for the same cog; the worker
/// serializes invocations. It may block or suspend freely.
#[async_trait]
pub trait Transition<C>: Send + Sync {
    /// Advance the context with one input, producing the next context and an
    /// output message
    async fn step(&self, ctx: Arc<C>, input: Message) -> Result<(C, Message), Fault>;
}

#[async_trait]
impl<C, F> Transition<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(&C, Message) -> Result<(C, Message), Fault> + Send + Sync,
{
    async fn step(&self, ctx: Arc<C>, input: Message) -> Result<(C, Message), Fault> {
        self(&ctx, input)
    }
}

/// Adapter turning an async closure into a [`Transition`]
///
/// ```ignore
/// let cog = Cog::builder(State::default(), AsyncTransition(|ctx, input| async move {
///     let reply = client.complete(&input).await?;
///     Ok((next_state(&ctx, &reply), Message::text(reply)))
/// }))
/// .spawn();
/// ```
pub struct AsyncTransition<F>(pub F);

#[async_trait]
impl<C, F, Fut> Transition<C> for AsyncTransition<F>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(C, Message), Fault>> + Send,
{
    async fn step(&self, ctx: Arc<C>, input: Message) -> Result<(C, Message), Fault> {
        (self.0)(ctx, input).await
    }
}

/// Converts a transition fault into the message published in its place
pub type FaultHandler = Arc<dyn Fn(Fault, Message) -> Message + Send + Sync>;

/// The default fault handler: an error envelope carrying the rendered fault
/// chain and the input that triggered it
pub fn default_fault_handler() -> FaultHandler {
    Arc::new(|fault, input| Message::error(format!("{:#}", fault), input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_closure_is_a_transition() {
        let double = |ctx: &i64, input: Message| -> Result<(i64, Message), Fault> {
            let n = input.as_i64().unwrap_or(0);
            Ok((ctx + 1, Message::value(n * 2)))
        };

        let (next, output) = double.step(Arc::new(5), Message::value(21)).await.unwrap();
        assert_eq!(next, 6);
        assert_eq!(output.as_i64(), Some(42));
    }

    #[tokio::test]
    async fn test_async_transition_adapter() {
        let shout = AsyncTransition(|ctx: Arc<String>, input: Message| async move {
            let text = input.as_str().unwrap_or("").to_uppercase();
            Ok::<_, Fault>((format!("{}{}", ctx, text), Message::text(text)))
        });

        let (next, output) = shout
            .step(Arc::new("log:".to_string()), Message::text("hi"))
            .await
            .unwrap();
        assert_eq!(next, "log:HI");
        assert_eq!(output.as_str(), Some("HI"));
    }

    #[tokio::test]
    async fn test_default_fault_handler_builds_envelope() {
        let handler = default_fault_handler();
        let envelope = handler(anyhow!("boom"), Message::text("in"));

        assert!(envelope.is_error());
        match envelope {
            Message::Error { cause, input } => {
                assert!(cause.contains("boom"));
                assert_eq!(input.as_str(), Some("in"));
            }
            _ => panic!("expected error envelope"),
        }
    }
}
