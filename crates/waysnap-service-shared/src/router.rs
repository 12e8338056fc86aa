//! The service router and its dispatching fallback handler.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};
use waysnap_lib::{Action, Outcome};

use crate::health::{health_live, health_ready};
use crate::metrics::{metrics_handler, record_correlations, record_rejection};
use crate::middleware::{MetricsLayer, RequestId};
use crate::pool::DispatchError;
use crate::problem::{from_lib_error, ProblemDetails};
use crate::request::{raw_request, MAX_BODY_BYTES};
use crate::response::ServiceResponse;
use crate::state::AppState;

/// Build the service router.
///
/// Probes and metrics have their own routes; every other path goes to the
/// pipeline, which answers unknown paths with a 404 listing the actions.
/// Every response carries `Access-Control-Allow-Origin: *`.
pub fn build_router(state: AppState, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .fallback(dispatch)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(MetricsLayer)
        .with_state(state)
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let request_id = parts
        .extensions
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(RequestId::generate);

    let action = match Action::from_path(parts.uri.path()) {
        Ok(action) => action,
        Err(err) => {
            record_rejection("other", err.kind().as_str());
            return from_lib_error(&err, request_id.as_str()).into_response();
        }
    };
    if parts.method != Method::GET && parts.method != Method::POST {
        record_rejection(action.name(), "method_not_allowed");
        return ProblemDetails::method_not_allowed(request_id.as_str()).into_response();
    }

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            record_rejection(action.name(), "malformed_input");
            return ProblemDetails::bad_request(
                format!("Failed to read request body: {err}"),
                request_id.as_str(),
            )
            .into_response();
        }
    };
    let raw = match raw_request(&parts.method, &parts.uri, &bytes) {
        Ok(raw) => raw,
        Err(err) => {
            record_rejection(action.name(), err.kind().as_str());
            return from_lib_error(&err, request_id.as_str()).into_response();
        }
    };

    match state.pool().dispatch(raw).await {
        Ok(outcome) => {
            record_correlations(action.name(), outcome.locations());
            respond(&state, outcome, &request_id).await
        }
        Err(DispatchError::Rejected(err)) => {
            warn!(
                action = %action,
                kind = %err.kind(),
                status = err.status_code(),
                error = %err,
                "request rejected"
            );
            record_rejection(action.name(), err.kind().as_str());
            from_lib_error(&err, request_id.as_str()).into_response()
        }
        Err(DispatchError::Unavailable) => {
            record_rejection(action.name(), "unavailable");
            ProblemDetails::service_unavailable(
                DispatchError::Unavailable.to_string(),
                request_id.as_str(),
            )
            .into_response()
        }
    }
}

async fn respond(state: &AppState, outcome: Outcome, request_id: &RequestId) -> Response {
    match outcome {
        Outcome::Respond { body, .. } => ServiceResponse::new(body).into_response(),
        Outcome::Forward { document, .. } => {
            debug!(downstream = state.downstream().target(), "handing off");
            match state.downstream().forward(&document, request_id).await {
                Ok(relayed) => relayed.into_response(),
                Err(err) => {
                    warn!(error = %err, "handoff failed");
                    ProblemDetails::downstream_failed(err.to_string(), request_id.as_str())
                        .into_response()
                }
            }
        }
    }
}
