//! Channel primitives: queues, endpoints, and the capability traits
//!
//! - `Chan` - FIFO queue with rendezvous, bounded, and sliding disciplines,
//!   optional enqueue transform and transform fault handler
//! - `IoEndpoint` - a paired (input, output) handle presented as one channel
//! - `Sender` / `Receiver` / `Closer` / `Port` - the flat interface set

pub mod chan;
pub mod endpoint;
pub mod traits;

pub use chan::{Capacity, Chan, ChanBuilder, TransformFaultFn, TransformFn, DEFAULT_CAPACITY};
pub use endpoint::IoEndpoint;
pub use traits::{Closer, Port, Receiver, Sender};
