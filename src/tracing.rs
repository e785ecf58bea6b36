//! Tracing module for OpenTelemetry integration.
//!
//! Builds the span pipeline and installs the global `tracing` subscriber that feeds
//! spans and events into the tracer and logger providers.

use crate::{Signal, config::Config, error::Error};
use fmt::layer;
use global::{set_text_map_propagator, set_tracer_provider};
use opentelemetry::{global, trace::TracerProvider};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{SpanExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    Resource, logs::SdkLoggerProvider, propagation::TraceContextPropagator,
    trace::{SdkTracerProvider, TracerProviderBuilder},
};
use std::{collections::HashMap, sync::OnceLock};
use tracing::{Event, Metadata, Subscriber, debug, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt,
    layer::{Context, Layered, SubscriberExt},
    registry, reload,
};

/// Targets whose events must not reach the log exporter, which runs on this stack itself.
const EXPORTER_TARGETS: [&str; 4] = ["hyper", "reqwest", "h2", "opentelemetry"];

pub(crate) fn auth_headers(config: &Config) -> HashMap<String, String> {
    HashMap::from([(
        "Authorization".to_string(),
        format!("Bearer {}", config.api_key),
    )])
}

pub(crate) fn init_provider(config: &Config, resource: Resource) -> Result<SdkTracerProvider, Error> {
    let span_exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(config.signal_endpoint(Signal::Traces))
        .with_headers(auth_headers(config))
        .build()
        .map_err(|source| Error::Exporter {
            signal: Signal::Traces,
            source,
        })?;

    let tracer_provider = TracerProviderBuilder::default()
        .with_batch_exporter(span_exporter)
        .with_resource(resource)
        .build();

    set_tracer_provider(tracer_provider.clone());
    set_text_map_propagator(TraceContextPropagator::new());

    Ok(tracer_provider)
}

/// Filter half of the subscriber, reloaded with the log level of each `init`.
type Base = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

/// OpenTelemetry half of the subscriber: the log bridge and the span layer.
type OtelLayer = Box<dyn Layer<Base> + Send + Sync>;

static LAYERS: OnceLock<Option<SubscriberLayers>> = OnceLock::new();

/// Reload handles into an installed subscriber.
///
/// The subscriber outlives any set of providers. Each `init` attaches layers bound to its
/// own providers and `shutdown` detaches them, so a re-initialized SDK exports again.
struct SubscriberLayers {
    filter: reload::Handle<EnvFilter, Registry>,
    otel: reload::Handle<Option<OtelLayer>, Base>,
}

impl SubscriberLayers {
    fn attach(
        &self,
        config: &Config,
        scope: &'static str,
        tracer_provider: Option<&SdkTracerProvider>,
        logger_provider: Option<&SdkLoggerProvider>,
    ) {
        let otel_logger = logger_provider
            .map(|provider| ApplicationEvents(OpenTelemetryTracingBridge::new(provider)));
        let otel_tracer = tracer_provider
            .map(|provider| OpenTelemetryLayer::new(provider.tracer(scope)));
        let otel: OtelLayer = Layer::<Base>::and_then(otel_logger, otel_tracer).boxed();

        let result = self
            .filter
            .reload(env_filter(config))
            .and_then(|()| self.otel.reload(Some(otel)));
        if let Err(error) = result {
            warn!(%error, "Failed to attach providers to the tracing subscriber");
        }
    }

    fn detach(&self) {
        if let Err(error) = self.otel.reload(None) {
            warn!(%error, "Failed to detach providers from the tracing subscriber");
        }
    }
}

fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(config.log_level.into()))
}

fn subscriber(
    config: &Config,
) -> (impl Subscriber + Send + Sync + 'static + use<>, SubscriberLayers) {
    let console_logger = layer()
        .json()
        .with_current_span(true)
        .flatten_event(true)
        .with_target(true)
        .with_span_list(false);

    let (filter, filter_handle) = reload::Layer::new(env_filter(config));
    let (otel, otel_handle) = reload::Layer::new(None::<OtelLayer>);

    let subscriber = registry().with(filter).with(otel).with(console_logger);
    let layers = SubscriberLayers {
        filter: filter_handle,
        otel: otel_handle,
    };
    (subscriber, layers)
}

/// Routes spans and events to the given providers through the process-wide subscriber.
///
/// The subscriber is installed on first use. If another global subscriber already
/// exists, the providers stay reachable through the OpenTelemetry globals only.
pub(crate) fn attach_providers(
    config: &Config,
    scope: &'static str,
    tracer_provider: Option<&SdkTracerProvider>,
    logger_provider: Option<&SdkLoggerProvider>,
) {
    let layers = LAYERS.get_or_init(|| {
        let (subscriber, layers) = subscriber(config);
        match tracing::subscriber::set_global_default(subscriber) {
            Ok(()) => Some(layers),
            Err(error) => {
                debug!(%error, "Global tracing subscriber already installed");
                None
            }
        }
    });

    if let Some(layers) = layers {
        layers.attach(config, scope, tracer_provider, logger_provider);
    }
}

/// Stops routing to the providers attached by [`attach_providers`].
pub(crate) fn detach_providers() {
    if let Some(Some(layers)) = LAYERS.get() {
        layers.detach();
    }
}

/// Forwards only events that do not originate from the export stack.
struct ApplicationEvents<L>(L);

impl<S: Subscriber, L: Layer<S>> Layer<S> for ApplicationEvents<L> {
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if is_application_event(event.metadata()) {
            self.0.on_event(event, ctx);
        }
    }
}

fn is_application_event(metadata: &Metadata<'_>) -> bool {
    !EXPORTER_TARGETS
        .iter()
        .any(|target| metadata.target().starts_with(target))
}
