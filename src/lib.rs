//! # gci-proxy
//!
//! A GC-aware reverse HTTP proxy for managed-runtime backends. The proxy
//! schedules the backend's stop-the-world collections between requests:
//! every sampling interval it asks the backend agent for current heap
//! usage, and when usage crosses an adaptive threshold it sheds new
//! requests, drains in-flight ones to quiescence, triggers the collection
//! through a side channel and resumes serving.
//!
//! ## Modules
//!
//! - [`threshold`]: bounded random-walk controller for the collection level
//! - [`window`]: adaptive sampling interval over finished-request counts
//! - [`waiter`]: in-flight accounting and quiescence latch
//! - [`engine`]: the serve/shed/drain/check/collect state machine
//! - [`agent`] / [`upstream`]: control-endpoint and pass-through clients
//! - [`proxy`]: axum front server wiring
//!
//! ## Example
//!
//! ```rust,ignore
//! use gci_proxy::proxy::{create_router, AppState};
//!
//! let app = create_router(AppState { engine, upstream, metrics });
//! axum::serve(listener, app).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod threshold;
pub mod upstream;
pub mod waiter;
pub mod window;

// Re-exports for convenience
pub use error::{ProxyError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
