//! Routes records of the `log` crate into `tracing`, and from there to the log pipeline.

use super::{ExcludedUrls, Instrumentor};
use crate::error::AdapterError;
use eyre::WrapErr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_log::LogTracer;

static INSTALLED: AtomicBool = AtomicBool::new(false);

pub struct LogAdapter;

impl Instrumentor for LogAdapter {
    fn is_applied(&self) -> bool {
        INSTALLED.load(Ordering::Acquire)
    }

    fn apply(&self, _excluded_urls: &ExcludedUrls) -> Result<(), AdapterError> {
        LogTracer::init().wrap_err("another `log` logger is already installed")?;
        INSTALLED.store(true, Ordering::Release);
        Ok(())
    }
}
