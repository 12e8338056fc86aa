//! HTTP middleware for the waysnap service.
//!
//! This module provides:
//! - [`RequestId`]: Newtype for correlation ID extraction/generation
//! - [`extract_or_generate_request_id`]: Extract X-Request-ID header or generate UUID v7
//! - [`MetricsLayer`]: Tower middleware for request spans and HTTP metrics
//!
//! # Request ID Propagation
//!
//! The middleware extracts the `X-Request-ID` header if present, otherwise
//! generates a new UUID v7. The id is stored in the request extensions for
//! handlers, attached to the request span, and echoed on the response.
//!
//! # Metrics Recording
//!
//! The `MetricsLayer` records:
//! - `http_requests_total`: Counter by method, path, status bucket
//! - `http_request_duration_seconds`: Histogram by method, path
//! - `http_request_size_bytes`: Histogram by method, path
//! - `http_response_size_bytes`: Histogram by method, path
//!
//! Every path that is not a known endpoint is labelled `other`, since the
//! service answers arbitrary paths through its fallback handler.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderValue, Request, Response};
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tracing::{info_span, Span};
use uuid::Uuid;
use waysnap_lib::Action;

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Newtype wrapper for request correlation IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new UUID v7 request ID.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Extract the request ID from headers or generate a new UUID v7.
///
/// An absent, empty or non-UTF-8 `X-Request-ID` header yields a fresh id.
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> RequestId {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(RequestId::from)
        .unwrap_or_else(RequestId::generate)
}

/// Strip the query string from a request path.
pub fn normalize_path(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

/// Bounded metric label for a request path.
pub fn path_label(path: &str) -> &'static str {
    let path = normalize_path(path);
    if let Ok(action) = Action::from_path(path) {
        return action.path();
    }
    match path {
        "/metrics" => "/metrics",
        "/health/live" => "/health/live",
        "/health/ready" => "/health/ready",
        _ => "other",
    }
}

fn status_bucket(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

fn content_length(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
}

// =============================================================================
// MetricsLayer - Tower middleware for HTTP metrics
// =============================================================================

/// Tower layer opening a request span and recording HTTP metrics.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: http_body::Body + Send + 'static,
    ResBody: http_body::Body + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();

        let method = req.method().to_string();
        let path = path_label(req.uri().path());

        if let Some(size) = content_length(req.headers()) {
            metrics::histogram!(
                "http_request_size_bytes",
                "method" => method.clone(),
                "path" => path
            )
            .record(size);
        }

        let request_id = extract_or_generate_request_id(req.headers());
        req.extensions_mut().insert(request_id.clone());
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %req.uri().path(),
            remote_addr = remote_addr.as_deref().unwrap_or("-"),
        );

        {
            let _enter = span.enter();
            tracing::info!("handling request");
        }

        let future = {
            let _enter = span.enter();
            self.inner.call(req)
        };

        MetricsFuture {
            inner: future,
            start,
            method,
            path,
            request_id,
            span,
        }
    }
}

pin_project! {
    /// Future wrapper that records metrics on completion.
    pub struct MetricsFuture<F> {
        #[pin]
        inner: F,
        start: Instant,
        method: String,
        path: &'static str,
        request_id: RequestId,
        span: Span,
    }
}

impl<F, ResBody, E> Future for MetricsFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: http_body::Body,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();

        let mut result = match this.inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        let duration_secs = this.start.elapsed().as_secs_f64();
        let latency_ms = duration_secs * 1000.0;
        let path: &'static str = *this.path;

        match &mut result {
            Ok(response) => {
                if let Ok(value) = HeaderValue::from_str(this.request_id.as_str()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                let status = response.status().as_u16();

                metrics::counter!(
                    "http_requests_total",
                    "method" => this.method.clone(),
                    "path" => path,
                    "status" => status_bucket(status)
                )
                .increment(1);

                metrics::histogram!(
                    "http_request_duration_seconds",
                    "method" => this.method.clone(),
                    "path" => path
                )
                .record(duration_secs);

                if let Some(size) = content_length(response.headers()) {
                    metrics::histogram!(
                        "http_response_size_bytes",
                        "method" => this.method.clone(),
                        "path" => path
                    )
                    .record(size);
                }

                tracing::info!(status = status, latency_ms = latency_ms, "request completed");
            }
            Err(_) => {
                metrics::counter!(
                    "http_requests_total",
                    "method" => this.method.clone(),
                    "path" => path,
                    "status" => "5xx"
                )
                .increment(1);

                metrics::histogram!(
                    "http_request_duration_seconds",
                    "method" => this.method.clone(),
                    "path" => path
                )
                .record(duration_secs);

                tracing::error!(latency_ms = latency_ms, "request failed");
            }
        }

        Poll::Ready(result)
    }
}
