//! Fanout - scatter each input to N arms, gather one ordered reply tuple
//!
//! Every input value is broadcast to all arms concurrently; the coordinator
//! then gathers exactly one reply from each arm and emits a tuple whose i-th
//! slot is arm i's reply, whatever order the replies arrived in. The next
//! input is not scattered until the previous gather completes.

use std::sync::Arc;

use futures::future::join_all;

use crate::channel::{Capacity, Chan, IoEndpoint, DEFAULT_CAPACITY};
use crate::core::{CogError, CogResult, Fault, Message};

/// Per-reply transform applied during gather
pub type GatherTransform = Arc<dyn Fn(Message) -> Result<Message, Fault> + Send + Sync>;

/// Gather fault handler: replace the slot or drop the whole tuple (`None`)
pub type GatherFaultFn = Arc<dyn Fn(Fault) -> Option<Message> + Send + Sync>;

/// Options for [`fanout_with`]
pub struct FanoutConfig {
    output_capacity: Option<Capacity>,
    transform: Option<GatherTransform>,
    on_fault: Option<GatherFaultFn>,
}

impl FanoutConfig {
    pub fn new() -> Self {
        Self {
            output_capacity: None,
            transform: None,
            on_fault: None,
        }
    }

    /// Override the gather output capacity (defaults to `Bounded(n)` for n arms)
    pub fn with_output_capacity(mut self, capacity: Capacity) -> Self {
        self.output_capacity = Some(capacity);
        self
    }

    /// Apply a transform to each gathered reply
    pub fn with_transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Message) -> Result<Message, Fault> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(f));
        self
    }

    /// Handle a transform fault: replace the slot, or `None` to drop the tuple
    pub fn with_fault_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(Fault) -> Option<Message> + Send + Sync + 'static,
    {
        self.on_fault = Some(Arc::new(f));
        self
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

enum Gathered {
    Tuple(Vec<Message>),
    Skip,
    Abort,
}

fn apply_transform(slots: Vec<Message>, config: &FanoutConfig) -> Gathered {
    let Some(transform) = &config.transform else {
        return Gathered::Tuple(slots);
    };
    let mut out = Vec::with_capacity(slots.len());
    for slot in slots {
        match transform(slot) {
            Ok(msg) => out.push(msg),
            Err(fault) => match &config.on_fault {
                Some(handler) => match handler(fault) {
                    Some(msg) => out.push(msg),
                    None => return Gathered::Skip,
                },
                None => {
                    tracing::warn!(error = %fault, "gather transform fault with no handler, closing fanout");
                    return Gathered::Abort;
                }
            },
        }
    }
    Gathered::Tuple(out)
}

/// Scatter-gather over the given arms with default options
pub fn fanout(arms: Vec<IoEndpoint<Message>>) -> CogResult<IoEndpoint<Message>> {
    fanout_with(arms, FanoutConfig::new())
}

/// Scatter-gather over the given arms
pub fn fanout_with(
    arms: Vec<IoEndpoint<Message>>,
    config: FanoutConfig,
) -> CogResult<IoEndpoint<Message>> {
    if arms.is_empty() {
        return Err(CogError::EmptyFanout);
    }

    let inlet: Chan<Message> = Chan::bounded(DEFAULT_CAPACITY);
    let out_capacity = config
        .output_capacity
        .unwrap_or(Capacity::Bounded(arms.len()));
    let outlet: Chan<Message> = Chan::with_capacity(out_capacity);
    let endpoint = IoEndpoint::new(inlet.clone(), outlet.clone());

    tokio::spawn(async move {
        'pump: while let Some(msg) = inlet.recv().await {
            let scattered = join_all(arms.iter().map(|arm| arm.send(msg.clone()))).await;
            if scattered.iter().any(|accepted| !accepted) {
                break;
            }

            let replies = join_all(arms.iter().map(|arm| arm.recv())).await;
            let mut slots = Vec::with_capacity(replies.len());
            for reply in replies {
                match reply {
                    Some(r) => slots.push(r),
                    None => break 'pump,
                }
            }

            match apply_transform(slots, &config) {
                Gathered::Tuple(slots) => {
                    if !outlet.send(Message::Tuple(slots)).await {
                        break;
                    }
                }
                Gathered::Skip => continue,
                Gathered::Abort => break,
            }
        }

        inlet.close();
        for arm in &arms {
            arm.input().close();
        }
        outlet.close();
        tracing::trace!("fanout closed");
    });

    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cog::{AsyncTransition, Cog};
    use anyhow::anyhow;
    use std::time::Duration;

    fn arith_arms() -> Vec<IoEndpoint<Message>> {
        let plus = Cog::new((), |_: &(), msg: Message| {
            Ok(((), Message::value(msg.as_i64().unwrap_or(0) + 1)))
        });
        let double = Cog::new((), |_: &(), msg: Message| {
            Ok(((), Message::value(msg.as_i64().unwrap_or(0) * 2)))
        });
        let minus = Cog::new((), |_: &(), msg: Message| {
            Ok(((), Message::value(msg.as_i64().unwrap_or(0) - 1)))
        });
        vec![plus.endpoint(), double.endpoint(), minus.endpoint()]
    }

    #[tokio::test]
    async fn test_fanout_tuple() {
        let scatter = fanout(arith_arms()).unwrap();

        assert!(scatter.send(Message::value(10)).await);
        assert_eq!(
            scatter.recv().await,
            Some(Message::tuple(vec![
                Message::value(11),
                Message::value(20),
                Message::value(9),
            ]))
        );
    }

    #[tokio::test]
    async fn test_tuple_order_ignores_reply_arrival_order() {
        // The slowest arm is the first one; its reply still lands in slot 0
        let slow = Cog::builder(
            (),
            AsyncTransition(|_: Arc<()>, msg: Message| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<_, Fault>(((), Message::value(msg.as_i64().unwrap_or(0) + 1)))
            }),
        )
        .spawn();
        let fast = Cog::new((), |_: &(), msg: Message| {
            Ok(((), Message::value(msg.as_i64().unwrap_or(0) * 2)))
        });

        let scatter = fanout(vec![slow.endpoint(), fast.endpoint()]).unwrap();

        assert!(scatter.send(Message::value(10)).await);
        assert_eq!(
            scatter.recv().await,
            Some(Message::tuple(vec![
                Message::value(11),
                Message::value(20),
            ]))
        );
    }

    #[tokio::test]
    async fn test_gathers_do_not_interleave() {
        let scatter = fanout(arith_arms()).unwrap();

        for i in 0..5i64 {
            assert!(scatter.send(Message::value(i)).await);
        }
        for i in 0..5i64 {
            assert_eq!(
                scatter.recv().await,
                Some(Message::tuple(vec![
                    Message::value(i + 1),
                    Message::value(i * 2),
                    Message::value(i - 1),
                ]))
            );
        }
    }

    #[tokio::test]
    async fn test_gather_transform() {
        let config = FanoutConfig::new().with_transform(|msg| {
            Ok(Message::value(msg.as_i64().unwrap_or(0) * 100))
        });
        let scatter = fanout_with(arith_arms(), config).unwrap();

        assert!(scatter.send(Message::value(10)).await);
        assert_eq!(
            scatter.recv().await,
            Some(Message::tuple(vec![
                Message::value(1100),
                Message::value(2000),
                Message::value(900),
            ]))
        );
    }

    #[tokio::test]
    async fn test_gather_fault_handler_replaces_slot() {
        let config = FanoutConfig::new()
            .with_transform(|msg| {
                if msg.as_i64().unwrap_or(0) == 20 {
                    Err(anyhow!("twenty"))
                } else {
                    Ok(msg)
                }
            })
            .with_fault_handler(|_| Some(Message::text("n/a")));
        let scatter = fanout_with(arith_arms(), config).unwrap();

        assert!(scatter.send(Message::value(10)).await);
        assert_eq!(
            scatter.recv().await,
            Some(Message::tuple(vec![
                Message::value(11),
                Message::text("n/a"),
                Message::value(9),
            ]))
        );
    }

    #[tokio::test]
    async fn test_gather_fault_drop_skips_the_tuple() {
        let config = FanoutConfig::new()
            .with_transform(|msg| {
                if msg.as_i64().unwrap_or(0) % 2 == 0 {
                    Err(anyhow!("even"))
                } else {
                    Ok(msg)
                }
            })
            .with_fault_handler(|_| None);
        let scatter = fanout_with(arith_arms(), config).unwrap();

        // 10 gathers (11, 20, 9): the 20 slot faults, tuple dropped
        assert!(scatter.send(Message::value(10)).await);
        // 0 gathers (1, 0, -1): the 0 slot faults, tuple dropped
        assert!(scatter.send(Message::value(0)).await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(scatter.poll(), None);
    }

    #[tokio::test]
    async fn test_closed_arm_closes_the_fanout() {
        let arms = arith_arms();
        let first = arms[0].clone();
        let scatter = fanout(arms).unwrap();

        first.input().close();
        first.output().close();

        // The next scatter or gather hits the closed arm and winds down
        let _ = scatter.send(Message::value(1)).await;
        assert_eq!(scatter.recv().await, None);
    }

    #[tokio::test]
    async fn test_closing_input_closes_arms_and_output() {
        let arms = arith_arms();
        let probe = arms[1].clone();
        let scatter = fanout(arms).unwrap();

        scatter.input().close();

        assert_eq!(scatter.recv().await, None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_empty_fanout_is_a_construction_error() {
        assert!(matches!(fanout(vec![]), Err(CogError::EmptyFanout)));
    }
}
