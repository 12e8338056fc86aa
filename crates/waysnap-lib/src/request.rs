//! Raw inbound requests and their normalization into one canonical JSON tree.

use serde_json::{Map, Value};

use crate::action::Action;
use crate::error::{Error, Result};
use crate::location::Location;

/// Transport-independent view of an inbound request.
///
/// Query parameters are grouped by name in first-seen order; repeated
/// parameters keep their values in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, Vec<String>)>,
    pub body: Option<String>,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Parse a request target such as `/locate?json=%7B...%7D`.
    pub fn from_target(method: impl Into<String>, target: &str) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Self::new(method, path).with_query_string(query),
            None => Self::new(method, target),
        }
    }

    /// Add the parameters of an `application/x-www-form-urlencoded` query string.
    pub fn with_query_string(mut self, query: &str) -> Self {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            self.push_param(name.into_owned(), value.into_owned());
        }
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_param(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Values of a query parameter, empty when absent.
    pub fn param(&self, name: &str) -> &[String] {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    fn push_param(&mut self, name: String, value: String) {
        match self.query.iter_mut().find(|(key, _)| *key == name) {
            Some((_, values)) => values.push(value),
            None => self.query.push((name, vec![value])),
        }
    }
}

/// The normalized request tree every later stage reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRequest(Map<String, Value>);

impl CanonicalRequest {
    pub fn new(tree: Map<String, Value>) -> Self {
        Self(tree)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// The raw `locations` field, if any.
    pub fn raw_locations(&self) -> Option<&Value> {
        self.0.get("locations")
    }

    /// The requested travel mode when it is a string.
    pub fn costing(&self) -> Option<&str> {
        self.0.get("costing").and_then(Value::as_str)
    }

    /// Caller overrides at `costing_options.<mode>`.
    pub fn costing_options(&self, mode: &str) -> Option<&Value> {
        self.0.get("costing_options")?.get(mode)
    }

    /// Name of the JSONP callback, if one was requested.
    pub fn jsonp(&self) -> Option<&str> {
        self.0.get("jsonp").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Merge every supported input encoding into one canonical tree.
///
/// The inline payload comes from the first `json` parameter or, when that is
/// absent, a non-empty body. Other query parameters overlay the payload: one
/// value becomes a string, several become an array of strings. For the
/// via-route encoding the `loc` field is converted into `locations`.
pub fn normalize(action: Action, raw: &RawRequest) -> Result<CanonicalRequest> {
    let payload = raw
        .param("json")
        .first()
        .map(String::as_str)
        .or_else(|| raw.body.as_deref().filter(|body| !body.trim().is_empty()));

    let mut tree = match payload {
        Some(text) => parse_payload(text)?,
        None => Map::new(),
    };

    for (name, values) in &raw.query {
        if name.is_empty() || name == "json" || values.is_empty() {
            continue;
        }
        let value = match values.as_slice() {
            [single] => Value::String(single.clone()),
            many => Value::Array(many.iter().cloned().map(Value::String).collect()),
        };
        tree.insert(name.clone(), value);
    }

    if action.is_legacy() {
        convert_via_route(&mut tree)?;
    }
    Ok(CanonicalRequest(tree))
}

fn parse_payload(text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(tree)) => Ok(tree),
        Ok(other) => Err(Error::MalformedInput {
            reason: format!("expected a JSON object, found {}", json_type(&other)),
        }),
        Err(err) => Err(Error::MalformedInput {
            reason: err.to_string(),
        }),
    }
}

fn convert_via_route(tree: &mut Map<String, Value>) -> Result<()> {
    let malformed = || Error::MalformedLocation { parameter: "loc" };
    let entries = match tree.remove("loc") {
        Some(Value::String(single)) => vec![single],
        Some(Value::Array(values)) => values
            .into_iter()
            .map(|value| match value {
                Value::String(text) => Ok(text),
                _ => Err(malformed()),
            })
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(malformed()),
    };

    let locations = entries
        .iter()
        .map(|csv| Location::from_csv(csv).map(|location| location.to_value()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(malformed)?;
    tree.insert("locations".to_string(), Value::Array(locations));
    Ok(())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_strings_group_repeated_parameters() {
        let raw = RawRequest::from_target("GET", "/viaroute?loc=1,2&z=17&loc=3,4");
        assert_eq!(raw.path, "/viaroute");
        assert_eq!(raw.param("loc"), ["1,2", "3,4"]);
        assert_eq!(raw.param("z"), ["17"]);
        assert!(raw.param("missing").is_empty());
    }

    #[test]
    fn inline_json_comes_from_parameter_or_body() {
        let raw = RawRequest::from_target("GET", "/locate?json=%7B%22costing%22%3A%22auto%22%7D");
        let request = normalize(Action::Locate, &raw).unwrap();
        assert_eq!(request.costing(), Some("auto"));

        let raw = RawRequest::new("POST", "/locate").with_body(r#"{"costing":"bicycle"}"#);
        let request = normalize(Action::Locate, &raw).unwrap();
        assert_eq!(request.costing(), Some("bicycle"));
    }

    #[test]
    fn parameters_overlay_the_payload() {
        let raw = RawRequest::new("GET", "/route")
            .with_param("json", r#"{"costing":"auto","units":"km"}"#)
            .with_param("costing", "pedestrian")
            .with_param("avoid", "a")
            .with_param("avoid", "b")
            .with_param("", "ignored");
        let request = normalize(Action::Route, &raw).unwrap();
        assert_eq!(request.costing(), Some("pedestrian"));
        assert_eq!(request.get("units"), Some(&json!("km")));
        assert_eq!(request.get("avoid"), Some(&json!(["a", "b"])));
        assert!(request.get("json").is_none());
        assert!(request.get("").is_none());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        for body in ["{not json", "[1, 2]", "42"] {
            let raw = RawRequest::new("POST", "/route").with_body(body);
            let err = normalize(Action::Route, &raw).unwrap_err();
            assert!(matches!(err, Error::MalformedInput { .. }));
            assert_eq!(err.to_string(), "Failed to parse json request");
        }
    }

    #[test]
    fn blank_body_is_ignored() {
        let raw = RawRequest::new("POST", "/locate").with_body("  \n");
        let request = normalize(Action::Locate, &raw).unwrap();
        assert!(request.as_map().is_empty());
    }

    #[test]
    fn via_route_locations_are_converted() {
        let raw = RawRequest::from_target(
            "GET",
            "/viaroute?loc=50.85,4.35&loc=50.86,4.36,through,90&costing=auto",
        );
        let request = normalize(Action::ViaRoute, &raw).unwrap();
        assert!(request.get("loc").is_none());
        let locations = request.raw_locations().unwrap().as_array().unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0]["lat"], json!(50.85));
        assert_eq!(locations[1]["type"], json!("through"));
        assert_eq!(locations[1]["heading"], json!(90.0));
    }

    #[test]
    fn via_route_requires_parsable_loc() {
        let missing = RawRequest::from_target("GET", "/viaroute?costing=auto");
        let bad = RawRequest::from_target("GET", "/viaroute?loc=north,east");
        for raw in [missing, bad] {
            let err = normalize(Action::ViaRoute, &raw).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Insufficiently specified required parameter 'loc'"
            );
        }
    }

    #[test]
    fn costing_options_are_looked_up_per_mode() {
        let raw = RawRequest::new("POST", "/route")
            .with_body(r#"{"costing_options":{"auto":{"use_highways":0.2}}}"#);
        let request = normalize(Action::Route, &raw).unwrap();
        assert_eq!(
            request.costing_options("auto"),
            Some(&json!({"use_highways": 0.2}))
        );
        assert!(request.costing_options("bicycle").is_none());
    }
}
