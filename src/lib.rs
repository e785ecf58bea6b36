//! One-call OpenTelemetry setup.
//!
//! [`init`] resolves configuration from explicit [`Options`] and the environment, starts
//! OTLP/HTTP export of traces, metrics and logs, samples host utilization and applies
//! every instrumentation adapter compiled into the crate.
//!
//! ```ignore
//! observex::init(observex::Options::new().api_key("key").service_name("checkout"))?;
//! ```
//!
//! Everything is flushed by [`shutdown`], which also runs at process exit.

pub mod config;
pub mod error;
pub mod instrument;
mod lifecycle;
mod logs;
mod metrics;
#[cfg(feature = "http")]
pub mod middleware;
pub mod system_metrics;
mod tracing;

pub use config::{Brand, Config, Options};
pub use error::{AdapterError, Error, ProbeError, Signal, ValidationError};
pub use lifecycle::{Sdk, init, is_initialized, shutdown};
