//! Lifecycle subsystem.
//!
//! # Responsibilities
//! - Coordinate graceful shutdown across tasks
//! - Translate OS signals into the internal shutdown event

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
