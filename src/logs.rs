//! Log pipeline. Records reach it through the `tracing` bridge installed by the subscriber.

use crate::{Signal, config::Config, error::Error, tracing::auth_headers};
use opentelemetry_otlp::{LogExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{Resource, logs::SdkLoggerProvider};

pub(crate) fn init_provider(config: &Config, resource: Resource) -> Result<SdkLoggerProvider, Error> {
    let log_exporter = LogExporter::builder()
        .with_http()
        .with_endpoint(config.signal_endpoint(Signal::Logs))
        .with_headers(auth_headers(config))
        .build()
        .map_err(|source| Error::Exporter {
            signal: Signal::Logs,
            source,
        })?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(log_exporter)
        .with_resource(resource)
        .build())
}
