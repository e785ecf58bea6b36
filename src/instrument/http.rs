//! Enables URL exclusion for [`trace_layer`](crate::middleware::trace_layer).
//!
//! The layer is mounted by the application; this adapter supplies the exclusion list
//! it consults for every request.

use super::{ExcludedUrls, Instrumentor};
use crate::error::AdapterError;
use std::sync::{PoisonError, RwLock};

static EXCLUDED_URLS: RwLock<Option<ExcludedUrls>> = RwLock::new(None);

pub struct HttpAdapter;

impl Instrumentor for HttpAdapter {
    fn is_applied(&self) -> bool {
        EXCLUDED_URLS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn apply(&self, excluded_urls: &ExcludedUrls) -> Result<(), AdapterError> {
        *EXCLUDED_URLS
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(excluded_urls.clone());
        Ok(())
    }
}

/// Whether requests to `url` should be left untraced.
pub(crate) fn is_excluded(url: &str) -> bool {
    EXCLUDED_URLS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .is_some_and(|excluded| excluded.is_excluded(url))
}
