//! Graph-level composition over cog endpoints
//!
//! - `flow` - sequential pipeline
//! - `fanout` - parallel scatter to N arms with an ordered gather
//! - `gate` - per-input pairing with a latched channel
//! - `dialogue` - alternating two-party exchange

pub mod dialogue;
pub mod fanout;
pub mod flow;
pub mod gate;

pub use dialogue::{dialogue, dialogue_with, DialogueConfig};
pub use fanout::{fanout, fanout_with, FanoutConfig, GatherFaultFn, GatherTransform};
pub use flow::flow;
pub use gate::gate;
