//! Runtime error types

use thiserror::Error;

/// Faults raised by user code: transitions and enqueue transforms
///
/// These never surface as `Err` from the runtime itself; they are converted
/// to error envelopes on the output stream or routed to a channel's fault
/// handler.
pub type Fault = anyhow::Error;

/// Errors signaled synchronously at construction
#[derive(Error, Debug)]
pub enum CogError {
    /// A flow needs at least one stage to connect
    #[error("flow requires at least one stage")]
    EmptyFlow,

    /// A fanout needs at least one arm to scatter to
    #[error("fanout requires at least one arm")]
    EmptyFanout,
}

/// Result type alias for runtime operations
pub type CogResult<T> = Result<T, CogError>;
