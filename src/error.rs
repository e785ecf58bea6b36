//! Errors surfaced by [`init`](crate::init).

use opentelemetry_otlp::ExporterBuildError;
use std::fmt;
use thiserror::Error;

/// Telemetry signal handled by the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl Signal {
    /// Path segment used under `<endpoint>/otlp/v1/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Traces => "traces",
            Signal::Metrics => "metrics",
            Signal::Logs => "logs",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to build {signal} exporter: {source}")]
    Exporter {
        signal: Signal,
        #[source]
        source: ExporterBuildError,
    },
}

/// Required configuration is missing or malformed. Raised before any provider is built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{brand} API key is required. Pass `api_key` or set {env_var}")]
    MissingApiKey {
        brand: &'static str,
        env_var: String,
    },

    #[error("Service name is required. Pass `service_name` or set {env_var}")]
    MissingServiceName { env_var: String },

    #[error("invalid value {value:?} for option `{key}`")]
    InvalidOption { key: String, value: String },
}

/// Failure reported by an instrumentation adapter while it is applied.
pub type AdapterError = eyre::Report;

/// A host metric could not be read for one collection cycle.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} statistics unavailable")]
    Unavailable(&'static str),

    #[error("host probe state poisoned")]
    Poisoned,
}
