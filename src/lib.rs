// Channel runtime
pub mod broadcast;
pub mod channel;
pub mod core;

// Cogs and composition
pub mod cog;
pub mod combinators;

// Ambient
pub mod logging;
