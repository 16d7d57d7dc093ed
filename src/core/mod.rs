//! Core types for the cog runtime
//!
//! This module provides the fundamental types used throughout the crate:
//! - `Message` - The opaque value traveling through channels
//! - `CogError` / `CogResult` - Construction-time error types
//! - `Fault` - User-level faults from transitions and transforms

pub mod error;
pub mod message;

pub use error::{CogError, CogResult, Fault};
pub use message::Message;
