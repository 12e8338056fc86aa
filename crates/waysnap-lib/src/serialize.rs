//! Response shapes: the pipeline handoff document and the direct lookup response.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::action::Action;
use crate::correlate::Correlation;
use crate::costing::ResolvedCosting;
use crate::error::{Error, Result};
use crate::geo::LatLng;
use crate::request::CanonicalRequest;
use crate::search::PathLocation;

/// Round a coordinate to six decimal places.
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Canonical object for a correlated location, attached as `correlated_<i>`.
pub fn path_location_value(path: &PathLocation) -> Value {
    let location = &path.location;
    let mut object = Map::new();
    object.insert("lat".to_string(), Value::from(location.latlng.lat));
    object.insert("lon".to_string(), Value::from(location.latlng.lon));
    object.insert("type".to_string(), Value::from(location.stop_type.as_str()));
    if let Some(heading) = location.heading {
        object.insert("heading".to_string(), Value::from(heading));
    }
    object.insert(
        "vertex".to_string(),
        json!({ "lat": path.vertex.lat, "lon": path.vertex.lon }),
    );
    let edges = path
        .edges
        .iter()
        .map(|candidate| {
            json!({
                "id": candidate.edge_id.value(),
                "way_id": candidate.way_id,
                "percent_along": candidate.percent_along,
            })
        })
        .collect();
    object.insert("edges".to_string(), Value::Array(edges));
    Value::Object(object)
}

/// Build the document handed to the route computation stage.
///
/// Every correlated location is attached in input order as `correlated_<i>`
/// and the effective costing options replace `costing_options.<mode>`.
pub fn handoff(
    action: Action,
    mut request: CanonicalRequest,
    correlated: &[PathLocation],
    costing: &ResolvedCosting,
) -> Value {
    for (index, path) in correlated.iter().enumerate() {
        request.insert(format!("correlated_{index}"), path_location_value(path));
    }

    let mut options = match request.get("costing_options") {
        Some(Value::Object(existing)) => existing.clone(),
        _ => Map::new(),
    };
    options.insert(costing.mode.clone(), costing.model.options().clone());
    request.insert("costing_options", Value::Object(options));

    if action.is_legacy() {
        request.insert("osrm", Value::from("compatibility"));
    }
    request.into_value()
}

/// Ways a location snapped onto, reported once per `(way_id, vertex)`.
fn ways(path: &PathLocation) -> Value {
    let mut seen: HashSet<(u64, u64, u64)> = HashSet::new();
    let vertex = snap_key(path.vertex);
    let ways = path
        .edges
        .iter()
        .filter(|candidate| seen.insert((candidate.way_id, vertex.0, vertex.1)))
        .map(|candidate| {
            json!({
                "way_id": candidate.way_id,
                "correlated_lat": round6(path.vertex.lat),
                "correlated_lon": round6(path.vertex.lon),
            })
        })
        .collect();
    Value::Array(ways)
}

fn snap_key(point: LatLng) -> (u64, u64) {
    (round6(point.lat).to_bits(), round6(point.lon).to_bits())
}

/// Direct response body for a lookup: one entry per input location.
pub fn lookup_results(results: &[Correlation]) -> Value {
    let entries = results
        .iter()
        .map(|result| match result {
            Correlation::Found(path) => json!({
                "ways": ways(path),
                "input_lat": round6(path.location.latlng.lat),
                "input_lon": round6(path.location.latlng.lon),
            }),
            Correlation::Failed { location, reason } => json!({
                "ways": Value::Null,
                "input_lat": round6(location.latlng.lat),
                "input_lon": round6(location.latlng.lon),
                "reason": reason,
            }),
        })
        .collect();
    Value::Array(entries)
}

/// Render a JSON body, wrapped as `callback(...)` when a JSONP callback is named.
pub fn render(body: &Value, callback: Option<&str>) -> Result<String> {
    let text = serde_json::to_string(body)?;
    match callback {
        None => Ok(text),
        Some(name) if is_valid_callback(name) => Ok(format!("{name}({text})")),
        Some(name) => Err(Error::InvalidCallback {
            name: name.to_string(),
        }),
    }
}

/// JavaScript identifier paths such as `cb`, `$jq_12` or `app.handlers.locate`.
fn is_valid_callback(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costing::{CostFactory, ResolvedCosting};
    use crate::graph::EdgeId;
    use crate::location::Location;
    use crate::request::{normalize, RawRequest};
    use crate::search::Candidate;

    fn path(lat: f64, lon: f64, ways: &[u64]) -> PathLocation {
        PathLocation {
            location: Location::new(lat + 0.00001, lon),
            vertex: LatLng::new(lat, lon),
            edges: ways
                .iter()
                .enumerate()
                .map(|(index, way_id)| Candidate {
                    edge_id: EdgeId::new(9, index as u32),
                    way_id: *way_id,
                    percent_along: 0.25,
                })
                .collect(),
        }
    }

    fn costing(mode: &str) -> ResolvedCosting {
        ResolvedCosting {
            requested: mode.to_string(),
            mode: mode.to_string(),
            model: CostFactory::standard()
                .create(mode, &json!({"walking_speed": 4.5}))
                .unwrap(),
        }
    }

    #[test]
    fn handoff_attaches_correlations_in_order() {
        let raw = RawRequest::from_target(
            "GET",
            "/viaroute?loc=50.85,4.35&loc=50.86,4.36&costing=pedestrian",
        );
        let request = normalize(Action::ViaRoute, &raw).unwrap();
        let document = handoff(
            Action::ViaRoute,
            request,
            &[path(50.85, 4.35, &[1]), path(50.86, 4.36, &[2, 2])],
            &costing("pedestrian"),
        );

        assert_eq!(document["osrm"], json!("compatibility"));
        assert_eq!(document["costing"], json!("pedestrian"));
        assert_eq!(document["correlated_0"]["vertex"]["lat"], json!(50.85));
        assert_eq!(document["correlated_0"]["type"], json!("break"));
        assert_eq!(document["correlated_1"]["edges"].as_array().unwrap().len(), 2);
        assert_eq!(
            document["correlated_1"]["edges"][1]["id"],
            json!(EdgeId::new(9, 1).value())
        );
        assert_eq!(
            document["costing_options"]["pedestrian"]["walking_speed"],
            json!(4.5)
        );
        assert!(document.get("correlated_2").is_none());
    }

    #[test]
    fn route_handoff_has_no_compatibility_marker() {
        let raw = RawRequest::new("POST", "/route").with_body(
            r#"{"locations":[{"lat":1,"lon":1}],"costing":"pedestrian",
                "costing_options":{"auto":{"top_speed":90}}}"#,
        );
        let request = normalize(Action::Route, &raw).unwrap();
        let document = handoff(
            Action::Route,
            request,
            &[path(1.0, 1.0, &[3])],
            &costing("pedestrian"),
        );
        assert!(document.get("osrm").is_none());
        assert_eq!(document["costing_options"]["auto"]["top_speed"], json!(90));
    }

    #[test]
    fn lookup_reports_each_way_once_per_vertex() {
        let results = [
            Correlation::Found(path(50.1234567, 4.7654321, &[100, 100, 200, 200])),
            Correlation::Failed {
                location: Location::new(90.0, 0.0),
                reason: "No suitable edges near location".to_string(),
            },
        ];
        let body = lookup_results(&results);
        assert_eq!(
            body,
            json!([
                {
                    "ways": [
                        {"way_id": 100, "correlated_lat": 50.123457, "correlated_lon": 4.765432},
                        {"way_id": 200, "correlated_lat": 50.123457, "correlated_lon": 4.765432}
                    ],
                    "input_lat": 50.123467,
                    "input_lon": 4.765432
                },
                {
                    "ways": null,
                    "input_lat": 90.0,
                    "input_lon": 0.0,
                    "reason": "No suitable edges near location"
                }
            ])
        );
    }

    #[test]
    fn jsonp_wraps_the_body() {
        let body = json!([1]);
        assert_eq!(render(&body, None).unwrap(), "[1]");
        assert_eq!(render(&body, Some("cb")).unwrap(), "cb([1])");
        assert_eq!(render(&body, Some("app.on_locate")).unwrap(), "app.on_locate([1])");
        for bad in ["", "alert(1);x", "9lives", "a..b"] {
            assert!(matches!(
                render(&body, Some(bad)),
                Err(Error::InvalidCallback { .. })
            ));
        }
    }
}
