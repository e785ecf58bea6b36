//! Records panics as `error` events before the previously installed hook runs.

use super::{ExcludedUrls, Instrumentor};
use crate::error::AdapterError;
use std::{
    panic,
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::error;

static INSTALLED: AtomicBool = AtomicBool::new(false);

pub struct PanicAdapter;

impl Instrumentor for PanicAdapter {
    fn is_applied(&self) -> bool {
        INSTALLED.load(Ordering::Acquire)
    }

    fn apply(&self, _excluded_urls: &ExcludedUrls) -> Result<(), AdapterError> {
        if INSTALLED.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let payload = info.payload();
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("Box<dyn Any>");
            let location = info
                .location()
                .map(ToString::to_string)
                .unwrap_or_default();

            error!(target: "panic", %location, "{message}");
            previous(info);
        }));

        Ok(())
    }
}
