//! ED Bot operations API
//!
//! HTTP endpoints for health probes, Prometheus metrics and runtime feature
//! flag administration, plus the wiring that builds the core components from
//! configuration.

pub mod bootstrap;
pub mod error;
pub mod handler;
pub mod telemetry;

pub use bootstrap::{build_state, build_state_with_store, connect_store, BootstrapError};
pub use error::ApiError;
pub use handler::{create_router, AppState};
pub use telemetry::{init_tracing, LogFormat};
