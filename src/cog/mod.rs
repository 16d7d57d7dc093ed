//! Cog - stateful agents behind channel endpoints
//!
//! - `Cog` / `CogBuilder` - construction, the worker loop, the channel surface
//! - `ContextCell` - the private state cell with atomic snapshots
//! - `Transition` / `AsyncTransition` - the user transition seam
//! - `Fork` / `extend` - deriving cogs from a running cog

pub mod cell;
#[allow(clippy::module_inception)]
pub mod cog;
pub mod fork;
pub mod transition;

pub use cell::ContextCell;
pub use cog::{Cog, CogBuilder};
pub use fork::Fork;
pub use transition::{default_fault_handler, AsyncTransition, FaultHandler, Transition};
