//! Metrics module for OpenTelemetry integration.
//!
//! It sets up a meter provider with periodic exporting of metric data.

use crate::{Signal, config::Config, error::Error, tracing::auth_headers};
use global::set_meter_provider;
use opentelemetry::global;
use opentelemetry_otlp::{MetricExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider, Temporality},
};
use tracing::error;

pub(crate) fn init_provider(config: &Config, resource: Resource) -> Result<SdkMeterProvider, Error> {
    let exporter = MetricExporter::builder()
        .with_temporality(Temporality::default())
        .with_http()
        .with_endpoint(config.signal_endpoint(Signal::Metrics))
        .with_headers(auth_headers(config))
        .build()
        .map_err(|source| {
            error!(error = %source, "Failed to create OTLP Metric exporter");
            Error::Exporter {
                signal: Signal::Metrics,
                source,
            }
        })?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.export_interval)
        .build();
    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    set_meter_provider(provider.clone());

    Ok(provider)
}
