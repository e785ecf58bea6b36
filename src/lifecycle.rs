//! Process lifecycle of the SDK.
//!
//! An [`Sdk`] is either uninitialized, owning nothing, or initialized, owning exactly the
//! providers enabled at `init` time. Transitions are serialized by a mutex, so provider
//! construction never runs twice concurrently. [`Sdk::is_initialized`] reads an atomic
//! flag and never waits on a transition.

use crate::{
    Signal,
    config::{Brand, Config, Options},
    error::Error,
    instrument::{self, Capability, ExcludedUrls, REGISTRY},
    logs, metrics,
    system_metrics::HostMetrics,
    tracing::{self as otel_tracing, attach_providers, detach_providers},
};
use opentelemetry::KeyValue;
use opentelemetry_sdk::{
    Resource, error::OTelSdkResult, logs::SdkLoggerProvider, metrics::SdkMeterProvider,
    trace::SdkTracerProvider,
};
use std::sync::{
    Mutex, MutexGuard, Once, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info, warn};

static SDK: Sdk = Sdk::new(Brand::DEFAULT);

/// Initializes tracing, metrics and logging for the whole process.
///
/// Calling it again while initialized does nothing. Fails only when required
/// configuration is missing or an exporter cannot be built; nothing stays running then.
/// [`shutdown`] runs automatically at process exit.
pub fn init(options: Options) -> Result<(), Error> {
    SDK.init(options)?;
    register_exit_hook();
    Ok(())
}

/// Flushes and shuts down every provider started by [`init`].
pub fn shutdown() {
    SDK.shutdown();
}

pub fn is_initialized() -> bool {
    SDK.is_initialized()
}

extern "C" fn shutdown_at_exit() {
    SDK.shutdown();
}

fn register_exit_hook() {
    static EXIT_HOOK: Once = Once::new();

    EXIT_HOOK.call_once(|| {
        // SAFETY: the callback is a plain `extern "C"` function with no captured state.
        if unsafe { libc::atexit(shutdown_at_exit) } != 0 {
            warn!("Failed to register exit hook, call shutdown() before exiting");
        }
    });
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Providers owned while initialized.
#[derive(Default)]
struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
    logger: Option<SdkLoggerProvider>,
    host_metrics: Option<HostMetrics>,
}

impl Providers {
    /// Shuts every provider down, even when an earlier one fails.
    fn shutdown(&mut self) {
        self.host_metrics.take();

        if let Some(provider) = self.tracer.take() {
            report(Signal::Traces, provider.shutdown());
        }
        if let Some(provider) = self.meter.take() {
            report(Signal::Metrics, provider.shutdown());
        }
        if let Some(provider) = self.logger.take() {
            report(Signal::Logs, provider.shutdown());
        }
    }
}

fn report(signal: Signal, result: OTelSdkResult) {
    if let Err(error) = result {
        warn!(%error, %signal, "Failed to shut down provider");
    }
}

/// Provider constructors, one per signal.
#[derive(Clone, Copy)]
struct SignalBuilders {
    traces: fn(&Config, Resource) -> Result<SdkTracerProvider, Error>,
    metrics: fn(&Config, Resource) -> Result<SdkMeterProvider, Error>,
    logs: fn(&Config, Resource) -> Result<SdkLoggerProvider, Error>,
}

const OTLP: SignalBuilders = SignalBuilders {
    traces: otel_tracing::init_provider,
    metrics: metrics::init_provider,
    logs: logs::init_provider,
};

/// One SDK lifecycle. The free functions [`init`], [`shutdown`] and [`is_initialized`]
/// drive the process-wide instance.
pub struct Sdk {
    brand: Brand,
    registry: &'static [Capability],
    env: fn(&str) -> Option<String>,
    signals: SignalBuilders,
    state: Mutex<Option<Providers>>,
    initialized: AtomicBool,
}

impl Sdk {
    pub const fn new(brand: Brand) -> Self {
        Self {
            brand,
            registry: REGISTRY,
            env: process_env,
            signals: OTLP,
            state: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Replaces the capability registry used by auto-instrumentation.
    pub fn with_registry(mut self, registry: &'static [Capability]) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the environment lookup used during configuration resolution.
    pub fn with_env(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    #[cfg(test)]
    fn with_signals(mut self, signals: SignalBuilders) -> Self {
        self.signals = signals;
        self
    }

    pub fn brand(&self) -> &Brand {
        &self.brand
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn init(&self, options: Options) -> Result<(), Error> {
        let mut state = self.lock();
        if state.is_some() {
            debug!(sdk = self.brand.name, "Already initialized");
            return Ok(());
        }

        let config = Config::resolve(&self.brand, &options, self.env)?;
        let providers = self.start(&config)?;

        *state = Some(providers);
        self.initialized.store(true, Ordering::Release);

        info!(
            service = %config.service_name,
            endpoint = %config.endpoint,
            traces = config.enable_traces,
            metrics = config.enable_metrics,
            logs = config.enable_logs,
            "{} SDK initialized",
            self.brand.display_name,
        );
        Ok(())
    }

    pub fn shutdown(&self) {
        let mut state = self.lock();
        let Some(mut providers) = state.take() else {
            return;
        };

        detach_providers();
        providers.shutdown();
        self.initialized.store(false, Ordering::Release);
        debug!(sdk = self.brand.name, "Shut down");
    }

    fn lock(&self) -> MutexGuard<'_, Option<Providers>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, config: &Config) -> Result<Providers, Error> {
        let resource = self.resource(config);

        let mut providers = Providers::default();
        if let Err(error) = build_signals(self.signals, config, &resource, &mut providers) {
            warn!(%error, "Signal setup failed, shutting down providers already started");
            providers.shutdown();
            return Err(error);
        }

        if config.enable_traces || config.enable_logs {
            attach_providers(
                config,
                self.brand.name,
                providers.tracer.as_ref(),
                providers.logger.as_ref(),
            );
        }

        if config.enable_system_metrics {
            if let Some(meter) = &providers.meter {
                providers.host_metrics = HostMetrics::start(
                    meter,
                    format!("{}.system", self.brand.name),
                    self.brand.version,
                    config.system_metrics_interval,
                );
            }
        }

        if config.auto_instrument {
            instrument::discover(self.registry, &ExcludedUrls::new(&config.excluded_urls));
        }

        Ok(providers)
    }

    fn resource(&self, config: &Config) -> Resource {
        let service_version = match config.service_version.as_str() {
            "" => "unknown".to_string(),
            version => version.to_string(),
        };

        let mut attributes = vec![
            KeyValue::new("deployment.environment", config.environment.clone()),
            KeyValue::new("service.version", service_version),
            KeyValue::new("telemetry.sdk.name", self.brand.sdk_name()),
            KeyValue::new("telemetry.sdk.version", self.brand.version),
        ];
        if let Some(commit) = &config.commit {
            attributes.push(KeyValue::new("service.commit", commit.clone()));
        }

        Resource::builder()
            .with_service_name(config.service_name.clone())
            .with_attributes(attributes)
            .build()
    }
}

impl Drop for Sdk {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builds the enabled signal providers in order: traces, metrics, logs.
fn build_signals(
    signals: SignalBuilders,
    config: &Config,
    resource: &Resource,
    providers: &mut Providers,
) -> Result<(), Error> {
    if config.enable_traces {
        providers.tracer = Some((signals.traces)(config, resource.clone())?);
    }
    if config.enable_metrics {
        providers.meter = Some((signals.metrics)(config, resource.clone())?);
    }
    if config.enable_logs {
        providers.logger = Some((signals.logs)(config, resource.clone())?);
    }
    Ok(())
}
