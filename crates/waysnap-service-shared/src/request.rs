//! Conversion of HTTP requests into the pipeline's transport-independent form.

use axum::http::{Method, Uri};
use waysnap_lib::{Error as LibError, RawRequest};

/// Largest request body the service reads.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build a [`RawRequest`] from the method, target and body bytes.
///
/// The query string is decoded as `application/x-www-form-urlencoded`. An
/// empty body counts as absent; a body that is not UTF-8 is malformed input.
pub fn raw_request(method: &Method, uri: &Uri, body: &[u8]) -> Result<RawRequest, LibError> {
    let mut raw = RawRequest::new(method.as_str(), uri.path());
    if let Some(query) = uri.query() {
        raw = raw.with_query_string(query);
    }
    if !body.is_empty() {
        let text = std::str::from_utf8(body).map_err(|e| LibError::MalformedInput {
            reason: e.to_string(),
        })?;
        raw = raw.with_body(text);
    }
    Ok(raw)
}
