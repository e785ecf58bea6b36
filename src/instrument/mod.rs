//! Auto-instrumentation discovery.
//!
//! [`REGISTRY`] is the fixed table of instrumentable libraries. Every adapter is compiled
//! behind a cargo feature; an entry whose library or adapter is not linked in is skipped.
//! Adapter failures are logged and never abort discovery.

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "log")]
pub mod log;
#[cfg(feature = "panic")]
pub mod panic;

use crate::error::AdapterError;
use regex::Regex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info, warn};

/// Per-library instrumentation plugin.
pub trait Instrumentor: Send {
    /// Whether the library is already instrumented in this process.
    fn is_applied(&self) -> bool;

    fn apply(&self, excluded_urls: &ExcludedUrls) -> Result<(), AdapterError>;
}

/// Registry entry mapping a library to the adapter that instruments it.
pub struct Capability {
    pub library: &'static str,
    /// Path of the adapter type, for diagnostics.
    pub adapter: &'static str,
    pub library_present: fn() -> bool,
    /// `None` when the adapter is not compiled in.
    pub load: fn() -> Option<Box<dyn Instrumentor>>,
}

pub const REGISTRY: &[Capability] = &[
    Capability {
        library: "log",
        adapter: "observex::instrument::log::LogAdapter",
        library_present: || cfg!(feature = "log"),
        load: load_log,
    },
    Capability {
        library: "http",
        adapter: "observex::instrument::http::HttpAdapter",
        library_present: || cfg!(feature = "http"),
        load: load_http,
    },
    Capability {
        library: "panic",
        adapter: "observex::instrument::panic::PanicAdapter",
        library_present: || true,
        load: load_panic,
    },
];

fn load_log() -> Option<Box<dyn Instrumentor>> {
    #[cfg(feature = "log")]
    return Some(Box::new(log::LogAdapter));
    #[cfg(not(feature = "log"))]
    None
}

fn load_http() -> Option<Box<dyn Instrumentor>> {
    #[cfg(feature = "http")]
    return Some(Box::new(http::HttpAdapter));
    #[cfg(not(feature = "http"))]
    None
}

fn load_panic() -> Option<Box<dyn Instrumentor>> {
    #[cfg(feature = "panic")]
    return Some(Box::new(panic::PanicAdapter));
    #[cfg(not(feature = "panic"))]
    None
}

/// URL patterns excluded from trace capture. A pattern matches anywhere in the URL.
#[derive(Clone, Debug, Default)]
pub struct ExcludedUrls {
    patterns: Vec<Regex>,
}

impl ExcludedUrls {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern)
                    .or_else(|error| {
                        warn!(pattern, %error, "Invalid excluded URL pattern, matching it literally");
                        Regex::new(&regex::escape(pattern))
                    })
                    .ok()
            })
            .collect();

        Self { patterns }
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(url))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Skipped {
    LibraryMissing,
    AdapterMissing,
    AlreadyApplied,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Skipped(Skipped),
    Failed(String),
}

/// Outcome of one discovery run, in registry order.
#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<(&'static str, Outcome)>,
}

impl Report {
    pub fn applied(&self) -> Vec<&'static str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == Outcome::Applied)
            .map(|(library, _)| *library)
            .collect()
    }
}

/// Applies every available adapter in `registry` at most once.
pub fn discover(registry: &[Capability], excluded_urls: &ExcludedUrls) -> Report {
    let mut report = Report::default();

    for capability in registry {
        let outcome = instrument(capability, excluded_urls);
        report.outcomes.push((capability.library, outcome));
    }

    let applied = report.applied();
    if applied.is_empty() {
        info!("Auto-instrumented: none");
    } else {
        info!("Auto-instrumented: {}", applied.join(", "));
    }

    report
}

fn instrument(capability: &Capability, excluded_urls: &ExcludedUrls) -> Outcome {
    let library = capability.library;

    if !(capability.library_present)() {
        return Outcome::Skipped(Skipped::LibraryMissing);
    }

    let Some(adapter) = (capability.load)() else {
        debug!(library, adapter = capability.adapter, "Instrumentor not available, skipping");
        return Outcome::Skipped(Skipped::AdapterMissing);
    };

    if adapter.is_applied() {
        return Outcome::Skipped(Skipped::AlreadyApplied);
    }

    let result = catch_unwind(AssertUnwindSafe(|| adapter.apply(excluded_urls)));
    match result {
        Ok(Ok(())) => Outcome::Applied,
        Ok(Err(error)) => {
            let error = format!("{error:#}");
            warn!(library, %error, "Failed to instrument library");
            Outcome::Failed(error)
        }
        Err(_) => {
            warn!(library, "Instrumentor panicked");
            Outcome::Failed("instrumentor panicked".to_string())
        }
    }
}
