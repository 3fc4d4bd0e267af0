//! Proxy core subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → dispatcher.rs (read request head, route by method)
//!         → forwarder.rs (plain HTTP: re-issue upstream, relay response)
//!         → tunnel.rs    (CONNECT: acknowledge, relay opaque bytes)
//!     → upstream::connector (fresh connection per exchange)
//! ```
//!
//! # Design Decisions
//! - One task per connection; the accept loop never waits on a session
//! - Routing is a tagged decision on the method, not per-method dispatch
//! - Error-to-status translation happens once, in the dispatcher

pub mod dispatcher;
pub mod forwarder;
pub mod tunnel;

pub use dispatcher::{route, Dispatcher, RouteDecision};
