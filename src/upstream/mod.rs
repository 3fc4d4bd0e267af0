//! Upstream connection subsystem.
//!
//! # Design Decisions
//! - One fresh connection per client exchange; no pooling
//! - The connect timeout is the only policy applied here

pub mod connector;

pub use connector::{Connector, HostPort};
