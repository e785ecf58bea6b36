use crate::instrument::http::is_excluded;
use axum::{
    body::{Body, Bytes},
    http::{Request, Response},
};
use std::time::Duration;
use tower_http::{
    classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier},
    request_id::RequestId,
    trace::{DefaultOnEos, TraceLayer},
};
use tracing::{Span, error, info, info_span};

/// HTTP server tracing layer.
///
/// Requests whose URI matches a pattern applied by the `http` adapter get no span and no
/// request events.
#[allow(clippy::type_complexity)]
pub fn trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    impl Fn(&Request<Body>) -> Span + Clone,
    impl Fn(&Request<Body>, &Span) + Clone,
    impl Fn(&Response<Body>, Duration, &Span) + Clone,
    impl Fn(&Bytes, Duration, &Span) + Clone,
    DefaultOnEos,
    impl Fn(ServerErrorsFailureClass, Duration, &Span) + Clone,
> {
    TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            if is_excluded(&request.uri().to_string()) {
                return Span::none();
            }

            let trace_id = request
                .extensions()
                .get::<RequestId>()
                .map(|id| id.header_value().to_str().unwrap_or("none").to_string())
                .unwrap_or_else(|| "none".into());

            info_span!(
                "http_request",
                trace_id,
                method     = %request.method(),
                uri        = %request.uri().path(),
            )
        })
        .on_request(|_request: &Request<Body>, span: &Span| {
            if !span.is_none() {
                info!(parent: span, "Incoming request");
            }
        })
        .on_body_chunk(|chunk: &Bytes, _latency: Duration, span: &Span| {
            if !span.is_none() {
                info!(parent: span, bytes = chunk.len(), "Body chunk");
            }
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, span: &Span| {
                if span.is_none() {
                    return;
                }
                info!(
                    parent: span,
                    status      = response.status().as_u16(),
                    latency_ms  = latency.as_millis(),
                    "Request Succeeded"
                )
            },
        )
        .on_failure(
            |class: ServerErrorsFailureClass, latency: Duration, span: &Span| {
                if span.is_none() {
                    return;
                }
                let (error, status) = match class {
                    ServerErrorsFailureClass::StatusCode(code) => {
                        ("N/A".to_string(), code.as_u16())
                    }
                    ServerErrorsFailureClass::Error(error) => (error.to_string(), 500),
                };

                error!(
                    parent: span,
                    error,
                    status,
                    latency_ms  = latency.as_millis(),
                    "Request Failed"
                )
            },
        )
}
