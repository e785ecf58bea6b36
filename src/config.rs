//! Configuration resolution.
//!
//! Every field is resolved independently, highest priority first:
//! explicit [`Options`], the brand-specific environment variable, the generic
//! environment variable shared with the OpenTelemetry ecosystem, then the default.

use crate::error::ValidationError;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_ENVIRONMENT: &str = "local";
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_millis(10_000);
pub const DEFAULT_SYSTEM_METRICS_INTERVAL: Duration = Duration::from_secs(15);

/// Naming of one distribution of the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Brand {
    /// Lowercase name, used for instrumentation scopes and `telemetry.sdk.name`.
    pub name: &'static str,
    pub display_name: &'static str,
    /// Prefix of the brand-specific environment variables, e.g. `OBSERVEX_API_KEY`.
    pub env_prefix: &'static str,
    pub version: &'static str,
}

impl Brand {
    pub const OBSERVEX: Brand = Brand {
        name: "observex",
        display_name: "ObserveX",
        env_prefix: "OBSERVEX",
        version: env!("CARGO_PKG_VERSION"),
    };

    pub const OPTIC: Brand = Brand {
        name: "optic",
        display_name: "Optic",
        env_prefix: "OPTIC",
        version: env!("CARGO_PKG_VERSION"),
    };

    #[cfg(not(feature = "optic"))]
    pub const DEFAULT: Brand = Brand::OBSERVEX;
    #[cfg(feature = "optic")]
    pub const DEFAULT: Brand = Brand::OPTIC;

    pub fn sdk_name(&self) -> String {
        format!("{}-sdk", self.name)
    }

    pub fn env_var(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.env_prefix)
    }
}

/// Explicit overrides passed to [`init`](crate::init).
///
/// Empty strings are treated as "not given".
#[derive(Clone, Debug, Default)]
pub struct Options {
    api_key: Option<String>,
    service_name: Option<String>,
    endpoint: Option<String>,
    environment: Option<String>,
    service_version: Option<String>,
    auto_instrument: Option<bool>,
    enable_traces: Option<bool>,
    enable_metrics: Option<bool>,
    enable_logs: Option<bool>,
    enable_system_metrics: Option<bool>,
    system_metrics_interval: Option<Duration>,
    export_interval: Option<Duration>,
    log_level: Option<LevelFilter>,
    excluded_urls: Option<Vec<String>>,
    invalid: Vec<(String, String)>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn service_version(mut self, service_version: impl Into<String>) -> Self {
        self.service_version = Some(service_version.into());
        self
    }

    pub fn auto_instrument(mut self, enabled: bool) -> Self {
        self.auto_instrument = Some(enabled);
        self
    }

    pub fn enable_traces(mut self, enabled: bool) -> Self {
        self.enable_traces = Some(enabled);
        self
    }

    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = Some(enabled);
        self
    }

    pub fn enable_logs(mut self, enabled: bool) -> Self {
        self.enable_logs = Some(enabled);
        self
    }

    pub fn enable_system_metrics(mut self, enabled: bool) -> Self {
        self.enable_system_metrics = Some(enabled);
        self
    }

    pub fn system_metrics_interval(mut self, interval: Duration) -> Self {
        self.system_metrics_interval = Some(interval);
        self
    }

    pub fn export_interval(mut self, interval: Duration) -> Self {
        self.export_interval = Some(interval);
        self
    }

    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn excluded_urls<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_urls = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets an option by its configuration key.
    ///
    /// Unknown keys are ignored so callers can pass options understood only by newer
    /// releases. A known key with a value that does not parse fails resolution. An empty
    /// value leaves the option unset.
    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            return self;
        }
        match key {
            "api_key" => self.api_key = Some(value),
            "service_name" => self.service_name = Some(value),
            "endpoint" => self.endpoint = Some(value),
            "environment" => self.environment = Some(value),
            "service_version" => self.service_version = Some(value),
            "auto_instrument" => self.auto_instrument = self.parse(key, value, parse_bool),
            "enable_traces" => self.enable_traces = self.parse(key, value, parse_bool),
            "enable_metrics" => self.enable_metrics = self.parse(key, value, parse_bool),
            "enable_logs" => self.enable_logs = self.parse(key, value, parse_bool),
            "enable_system_metrics" => {
                self.enable_system_metrics = self.parse(key, value, parse_bool)
            }
            "system_metrics_interval_sec" => {
                self.system_metrics_interval = self.parse(key, value, parse_secs)
            }
            "export_interval_ms" => self.export_interval = self.parse(key, value, parse_millis),
            "log_level" => self.log_level = Some(parse_level(&value)),
            "excluded_urls" => self.excluded_urls = Some(split_list(&value)),
            _ => debug!(key, "Ignoring unknown option"),
        }
        self
    }

    fn parse<T>(&mut self, key: &str, value: String, parse: fn(&str) -> Option<T>) -> Option<T> {
        let parsed = parse(&value);
        if parsed.is_none() {
            self.invalid.push((key.to_string(), value));
        }
        parsed
    }
}

/// Immutable snapshot of the resolved configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub service_name: String,
    pub endpoint: String,
    pub environment: String,
    pub service_version: String,
    pub commit: Option<String>,
    pub auto_instrument: bool,
    pub enable_traces: bool,
    pub enable_metrics: bool,
    pub enable_logs: bool,
    pub enable_system_metrics: bool,
    pub system_metrics_interval: Duration,
    pub export_interval: Duration,
    pub log_level: LevelFilter,
    pub excluded_urls: Vec<String>,
}

impl Config {
    /// Resolves against the process environment.
    pub fn from_env(brand: &Brand, options: &Options) -> Result<Self, ValidationError> {
        Self::resolve(brand, options, |name| std::env::var(name).ok())
    }

    pub fn resolve<E>(brand: &Brand, options: &Options, env: E) -> Result<Self, ValidationError>
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some((key, value)) = options.invalid.first() {
            return Err(ValidationError::InvalidOption {
                key: key.clone(),
                value: value.clone(),
            });
        }

        let lookup = |explicit: &Option<String>, specific: &str, generic: Option<&str>| {
            non_empty(explicit.clone())
                .or_else(|| non_empty(env(&brand.env_var(specific))))
                .or_else(|| generic.and_then(|name| non_empty(env(name))))
        };

        let api_key = lookup(&options.api_key, "API_KEY", Some("OTEL_API_KEY"))
            .ok_or_else(|| ValidationError::MissingApiKey {
                brand: brand.display_name,
                env_var: brand.env_var("API_KEY"),
            })?;
        let service_name = lookup(
            &options.service_name,
            "SERVICE_NAME",
            Some("OTEL_SERVICE_NAME"),
        )
        .ok_or_else(|| ValidationError::MissingServiceName {
            env_var: brand.env_var("SERVICE_NAME"),
        })?;

        let endpoint = lookup(
            &options.endpoint,
            "ENDPOINT",
            Some("OTEL_EXPORTER_OTLP_ENDPOINT"),
        )
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let environment = lookup(&options.environment, "ENVIRONMENT", Some("ENVIRONMENT"))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let service_version = lookup(
            &options.service_version,
            "SERVICE_VERSION",
            Some("SERVICE_VERSION"),
        )
        .unwrap_or_default();
        let commit = lookup(&None, "COMMIT", Some("GITHUB_SHA"));

        let log_level = options.log_level.unwrap_or_else(|| {
            lookup(&None, "LOG_LEVEL", None)
                .map(|level| parse_level(&level))
                .unwrap_or(LevelFilter::INFO)
        });
        let excluded_urls = options.excluded_urls.clone().unwrap_or_else(|| {
            lookup(&None, "EXCLUDED_URLS", None)
                .map(|list| split_list(&list))
                .unwrap_or_default()
        });

        Ok(Self {
            api_key,
            service_name,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            environment,
            service_version,
            commit,
            auto_instrument: options.auto_instrument.unwrap_or(true),
            enable_traces: options.enable_traces.unwrap_or(true),
            enable_metrics: options.enable_metrics.unwrap_or(true),
            enable_logs: options.enable_logs.unwrap_or(true),
            enable_system_metrics: options.enable_system_metrics.unwrap_or(true),
            system_metrics_interval: options
                .system_metrics_interval
                .unwrap_or(DEFAULT_SYSTEM_METRICS_INTERVAL),
            export_interval: options.export_interval.unwrap_or(DEFAULT_EXPORT_INTERVAL),
            log_level,
            excluded_urls,
        })
    }

    /// Collector URL for one signal, e.g. `http://localhost:8080/otlp/v1/traces`.
    pub fn signal_endpoint(&self, signal: crate::Signal) -> String {
        format!("{}/otlp/v1/{signal}", self.endpoint)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn parse_secs(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Unknown names fall back to `INFO`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => LevelFilter::TRACE,
        "DEBUG" => LevelFilter::DEBUG,
        "WARN" | "WARNING" => LevelFilter::WARN,
        "ERROR" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Signal;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn required() -> Options {
        Options::new().api_key("k").service_name("svc")
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(&Brand::OBSERVEX, &required(), env(&[])).unwrap();

        assert_eq!(config.api_key, "k");
        assert_eq!(config.service_name, "svc");
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.environment, "local");
        assert_eq!(config.service_version, "");
        assert_eq!(config.commit, None);
        assert_eq!(config.export_interval, Duration::from_millis(10_000));
        assert_eq!(config.system_metrics_interval, Duration::from_secs(15));
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert!(config.auto_instrument);
        assert!(config.enable_traces && config.enable_metrics && config.enable_logs);
        assert!(config.enable_system_metrics);
        assert!(config.excluded_urls.is_empty());
    }

    #[test]
    fn test_missing_api_key() {
        let options = Options::new().service_name("svc");
        let error = Config::resolve(&Brand::OBSERVEX, &options, env(&[])).unwrap_err();
        assert_eq!(
            error,
            ValidationError::MissingApiKey {
                brand: "ObserveX",
                env_var: "OBSERVEX_API_KEY".into(),
            }
        );
    }

    #[test]
    fn test_empty_service_name_is_missing() {
        let options = Options::new().api_key("k").service_name("");
        let error = Config::resolve(&Brand::OPTIC, &options, env(&[])).unwrap_err();
        assert_eq!(
            error,
            ValidationError::MissingServiceName {
                env_var: "OPTIC_SERVICE_NAME".into(),
            }
        );
    }

    fn field<'a>(config: &'a Config, key: &str) -> &'a str {
        match key {
            "api_key" => &config.api_key,
            "service_name" => &config.service_name,
            "endpoint" => &config.endpoint,
            "environment" => &config.environment,
            "service_version" => &config.service_version,
            _ => unreachable!("untested field {key}"),
        }
    }

    #[test]
    fn test_precedence_per_field() {
        let cases = [
            ("API_KEY", "api_key", "OTEL_API_KEY"),
            ("SERVICE_NAME", "service_name", "OTEL_SERVICE_NAME"),
            ("ENDPOINT", "endpoint", "OTEL_EXPORTER_OTLP_ENDPOINT"),
            ("ENVIRONMENT", "environment", "ENVIRONMENT"),
            ("SERVICE_VERSION", "service_version", "SERVICE_VERSION"),
        ];
        let base = || Options::new().api_key("base-key").service_name("base-svc");

        for (suffix, key, generic) in cases {
            let specific = format!("OBSERVEX_{suffix}");

            let all = env(&[(specific.as_str(), "specific"), (generic, "generic")]);
            let config =
                Config::resolve(&Brand::OBSERVEX, &base().set(key, "explicit"), &all).unwrap();
            assert_eq!(field(&config, key), "explicit", "{key}: explicit wins");

            let config = Config::resolve(&Brand::OBSERVEX, &base().set(key, ""), &all).unwrap();
            assert_eq!(field(&config, key), "specific", "{key}: empty override falls through");

            let options = match key {
                "api_key" => Options::new().service_name("base-svc"),
                "service_name" => Options::new().api_key("base-key"),
                _ => base(),
            };
            let config =
                Config::resolve(&Brand::OBSERVEX, &options, env(&[(generic, "generic")])).unwrap();
            assert_eq!(field(&config, key), "generic", "{key}: generic env is the fallback");
        }
    }

    #[test]
    fn test_brand_prefix_selects_variables() {
        let vars = env(&[
            ("OPTIC_API_KEY", "optic-key"),
            ("OBSERVEX_API_KEY", "observex-key"),
            ("OTEL_SERVICE_NAME", "svc"),
        ]);

        let optic = Config::resolve(&Brand::OPTIC, &Options::new(), &vars).unwrap();
        let observex = Config::resolve(&Brand::OBSERVEX, &Options::new(), &vars).unwrap();

        assert_eq!(optic.api_key, "optic-key");
        assert_eq!(observex.api_key, "observex-key");
    }

    #[test]
    fn test_empty_env_is_unset() {
        let vars = env(&[("OBSERVEX_ENDPOINT", ""), ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://otel:4318")]);
        let config = Config::resolve(&Brand::OBSERVEX, &required(), vars).unwrap();
        assert_eq!(config.endpoint, "http://otel:4318");
    }

    #[test]
    fn test_set_options() {
        let options = required()
            .set("enable_traces", "false")
            .set("export_interval_ms", "2500")
            .set("system_metrics_interval_sec", "0.5")
            .set("log_level", "warning")
            .set("excluded_urls", "/health, /metrics,")
            .set("not_a_field", "ignored");

        let config = Config::resolve(&Brand::OBSERVEX, &options, env(&[])).unwrap();

        assert!(!config.enable_traces);
        assert_eq!(config.export_interval, Duration::from_millis(2500));
        assert_eq!(config.system_metrics_interval, Duration::from_millis(500));
        assert_eq!(config.log_level, LevelFilter::WARN);
        assert_eq!(config.excluded_urls, vec!["/health", "/metrics"]);
    }

    #[test]
    fn test_invalid_option_value() {
        let options = required().set("enable_metrics", "maybe");
        let error = Config::resolve(&Brand::OBSERVEX, &options, env(&[])).unwrap_err();
        assert_eq!(
            error,
            ValidationError::InvalidOption {
                key: "enable_metrics".into(),
                value: "maybe".into(),
            }
        );
    }

    #[test]
    fn test_env_only_fields() {
        let vars = env(&[
            ("OBSERVEX_LOG_LEVEL", "debug"),
            ("OBSERVEX_EXCLUDED_URLS", "/healthz"),
            ("GITHUB_SHA", "abc123"),
        ]);
        let config = Config::resolve(&Brand::OBSERVEX, &required(), vars).unwrap();

        assert_eq!(config.log_level, LevelFilter::DEBUG);
        assert_eq!(config.excluded_urls, vec!["/healthz"]);
        assert_eq!(config.commit.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_env_only_fields_precedence() {
        let vars = env(&[
            ("OBSERVEX_LOG_LEVEL", "debug"),
            ("OBSERVEX_EXCLUDED_URLS", "/healthz"),
        ]);

        let explicit = required()
            .set("log_level", "error")
            .set("excluded_urls", "/ready");
        let config = Config::resolve(&Brand::OBSERVEX, &explicit, &vars).unwrap();
        assert_eq!(config.log_level, LevelFilter::ERROR);
        assert_eq!(config.excluded_urls, vec!["/ready"]);

        let empty = required().set("log_level", "").set("excluded_urls", " ");
        let config = Config::resolve(&Brand::OBSERVEX, &empty, &vars).unwrap();
        assert_eq!(config.log_level, LevelFilter::DEBUG);
        assert_eq!(config.excluded_urls, vec!["/healthz"]);
    }

    #[test]
    fn test_empty_options_are_unset() {
        let options = required()
            .set("export_interval_ms", "")
            .set("system_metrics_interval_sec", "")
            .set("enable_traces", "")
            .set("auto_instrument", "  ");

        let config = Config::resolve(&Brand::OBSERVEX, &options, env(&[])).unwrap();

        assert_eq!(config.export_interval, Duration::from_millis(10_000));
        assert_eq!(config.system_metrics_interval, Duration::from_secs(15));
        assert!(config.enable_traces);
        assert!(config.auto_instrument);
    }

    #[test]
    fn test_signal_endpoint() {
        let options = required().endpoint("https://collector.example.com/");
        let config = Config::resolve(&Brand::OBSERVEX, &options, env(&[])).unwrap();

        assert_eq!(
            config.signal_endpoint(Signal::Traces),
            "https://collector.example.com/otlp/v1/traces"
        );
        assert_eq!(
            config.signal_endpoint(Signal::Logs),
            "https://collector.example.com/otlp/v1/logs"
        );
    }

    #[test]
    fn test_parse_level_fallback() {
        assert_eq!(parse_level("verbose"), LevelFilter::INFO);
        assert_eq!(parse_level("Error"), LevelFilter::ERROR);
    }
}
