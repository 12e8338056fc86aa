//! Response wrapper for successful HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Content type of every direct response, JSONP included.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// A pre-rendered success body.
///
/// The worker renders JSON (or a JSONP `callback(...)` wrapper) itself, so
/// this type only carries text plus the status and content type to send it
/// with. The CORS header is added by the router for every response.
///
/// # Example
///
/// ```
/// use waysnap_service_shared::ServiceResponse;
///
/// let response = ServiceResponse::new(r#"[{"ways":null}]"#);
/// assert_eq!(response.status.as_u16(), 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub body: String,
    pub content_type: String,
}

impl ServiceResponse {
    /// A 200 response with the JSON content type.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
            content_type: JSON_CONTENT_TYPE.to_string(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl From<String> for ServiceResponse {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(JSON_CONTENT_TYPE));
        (self.status, [(header::CONTENT_TYPE, content_type)], self.body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_content_type() {
        let response = ServiceResponse::new("[]");
        assert_eq!(response.content_type, JSON_CONTENT_TYPE);
        assert_eq!(response.status, StatusCode::OK);
    }

    #[test]
    fn test_response_from_string() {
        let response: ServiceResponse = "cb([])".to_string().into();
        assert_eq!(response.body, "cb([])");
    }

    #[test]
    fn test_into_response_sets_headers() {
        let response = ServiceResponse::new("{}")
            .with_status(StatusCode::ACCEPTED)
            .into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json;charset=utf-8"
        );
    }

    #[test]
    fn test_invalid_content_type_falls_back() {
        let response = ServiceResponse::new("{}")
            .with_content_type("bad\nvalue")
            .into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON_CONTENT_TYPE);
    }
}
