//! Forward HTTP/HTTPS Proxy
//!
//! A forward proxy with transparent CONNECT tunneling, built with Tokio.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                 FORWARD PROXY                     │
//!                         │                                                   │
//!   Client Request        │  ┌─────────┐    ┌───────────┐    ┌────────────┐  │
//!   ──────────────────────┼─▶│   net   │───▶│   http    │───▶│ dispatcher │  │
//!                         │  │listener │    │ head parse│    │  (route)   │  │
//!                         │  └─────────┘    └───────────┘    └─────┬──────┘  │
//!                         │                                        │         │
//!                         │                   CONNECT              │ other   │
//!                         │                 ┌──────────────────────┤         │
//!                         │                 ▼                      ▼         │
//!                         │          ┌────────────┐        ┌────────────┐    │
//!                         │          │   tunnel   │        │ forwarder  │    │
//!                         │          │ (2 relay   │        │ (re-issue, │    │
//!                         │          │  loops)    │        │  stream)   │    │
//!                         │          └─────┬──────┘        └─────┬──────┘    │
//!                         │                │                     │           │
//!                         │                └──────────┬──────────┘           │
//!                         │                           ▼                      │
//!                         │                   ┌──────────────┐               │
//!                         │                   │  upstream    │───────────────┼──── Upstream
//!                         │                   │  connector   │               │     proxy / origin
//!                         │                   └──────────────┘               │
//!                         │                                                   │
//!                         │  ┌────────────────────────────────────────────┐  │
//!                         │  │           Cross-Cutting Concerns            │  │
//!                         │  │  ┌─────────┐  ┌───────────┐  ┌──────────┐  │  │
//!                         │  │  │ config  │  │ lifecycle │  │ tracing  │  │  │
//!                         │  │  └─────────┘  └───────────┘  └──────────┘  │  │
//!                         │  └────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────┘
//! ```
//!
//! Plain requests are re-issued upstream with their headers untouched and
//! their bodies streamed. CONNECT requests get an acknowledged tunnel whose
//! payload is relayed without inspection, which is what carries HTTPS.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;
pub mod upstream;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;

pub use config::ProxyConfig;
pub use error::SessionError;
pub use lifecycle::Shutdown;
pub use proxy::Dispatcher;
