//! Travel-mode cost models and their resolution from configuration and request overrides.
//!
//! A [`CostFactory`] maps mode names to constructors. It is built once at
//! startup and shared read-only by every worker. Per request the
//! [`CostingResolver`] merges the caller's overrides over the configured
//! defaults and asks the factory for a model.

mod auto;
mod bicycle;
mod pedestrian;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ServiceLimits;
use crate::error::{Error, Result};
use crate::graph::DirectedEdge;
use crate::request::CanonicalRequest;

pub use auto::{AutoCost, AutoOptions};
pub use bicycle::{BicycleCost, BicycleOptions, BicycleType};
pub use pedestrian::{PedestrianCost, PedestrianOptions};

/// Mode requested as `multimodal` is served by this mode.
pub const MULTIMODAL_FALLBACK: &str = "pedestrian";

/// A travel-mode cost model.
///
/// The core only needs the edge filter; the effective options are forwarded
/// to the route computation stage unchanged.
pub trait CostModel: Send + Sync + fmt::Debug {
    /// Mode name this model was created for.
    fn mode(&self) -> &str;

    /// Whether an edge may be used by this mode.
    fn allows(&self, edge: &DirectedEdge) -> bool;

    /// Effective traversal parameters after defaults and overrides.
    fn options(&self) -> &Value;
}

impl dyn CostModel {
    /// Predicate used by the spatial search.
    pub fn edge_filter(&self) -> EdgeFilter<'_> {
        EdgeFilter::Costing(self)
    }
}

/// Edge predicate handed to the spatial search.
#[derive(Debug, Clone, Copy)]
pub enum EdgeFilter<'a> {
    /// Used by lookup actions that did not name a travel mode.
    AcceptAll,
    Costing(&'a dyn CostModel),
}

impl EdgeFilter<'_> {
    pub fn allows(&self, edge: &DirectedEdge) -> bool {
        match self {
            EdgeFilter::AcceptAll => true,
            EdgeFilter::Costing(model) => model.allows(edge),
        }
    }
}

/// Builds a cost model from fully merged options.
pub type CostConstructor = fn(&Value) -> Result<Box<dyn CostModel>>;

/// Immutable mode name to constructor registry.
#[derive(Clone, Default)]
pub struct CostFactory {
    constructors: BTreeMap<String, CostConstructor>,
}

impl fmt::Debug for CostFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CostFactory")
            .field("modes", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CostFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor. Only available while the factory is being built.
    pub fn register(mut self, mode: impl Into<String>, constructor: CostConstructor) -> Self {
        self.constructors.insert(mode.into(), constructor);
        self
    }

    /// The factory with every built-in cost model.
    pub fn standard() -> Self {
        Self::new()
            .register("auto", auto::create_auto)
            .register("auto_shorter", auto::create_auto_shorter)
            .register("bus", auto::create_bus)
            .register("bicycle", bicycle::create)
            .register("pedestrian", pedestrian::create)
    }

    pub fn contains(&self, mode: &str) -> bool {
        self.constructors.contains_key(mode)
    }

    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn create(&self, mode: &str, options: &Value) -> Result<Box<dyn CostModel>> {
        let constructor = self
            .constructors
            .get(mode)
            .ok_or_else(|| Error::UnknownCostingMethod {
                name: mode.to_string(),
            })?;
        constructor(options)
    }
}

/// The mode that actually serves a requested mode name.
pub fn resolve_mode(requested: &str) -> &str {
    if requested == "multimodal" {
        MULTIMODAL_FALLBACK
    } else {
        requested
    }
}

/// Merge `overrides` over `base`.
///
/// Objects merge per key and recursively; any other override value replaces
/// the base value.
pub fn merge_options(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            let mut merged = base.clone();
            for (key, value) in overrides {
                let entry = match merged.get(key) {
                    Some(existing) => merge_options(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (_, overrides) => overrides.clone(),
    }
}

/// A resolved cost model plus the names it was resolved under.
#[derive(Debug)]
pub struct ResolvedCosting {
    /// Mode the caller asked for.
    pub requested: String,
    /// Mode that serves the request, used for limits and downstream options.
    pub mode: String,
    pub model: Box<dyn CostModel>,
}

/// Resolves a requested mode into a cost model for one request.
#[derive(Debug, Clone, Copy)]
pub struct CostingResolver<'a> {
    factory: &'a CostFactory,
    limits: &'a ServiceLimits,
}

impl<'a> CostingResolver<'a> {
    pub fn new(factory: &'a CostFactory, limits: &'a ServiceLimits) -> Self {
        Self { factory, limits }
    }

    pub fn resolve(&self, requested: &str, request: &CanonicalRequest) -> Result<ResolvedCosting> {
        let mode = resolve_mode(requested);
        let unknown = || Error::UnknownCostingMethod {
            name: requested.to_string(),
        };
        let defaults = self.limits.default_costing(mode).ok_or_else(unknown)?;
        if !self.factory.contains(mode) {
            return Err(unknown());
        }

        let merged = match request.costing_options(mode) {
            Some(overrides) => merge_options(defaults, overrides),
            None => defaults.clone(),
        };
        debug!(requested, mode, options = %merged, "resolving costing");

        let model = self.factory.create(mode, &merged)?;
        Ok(ResolvedCosting {
            requested: requested.to_string(),
            mode: mode.to_string(),
            model,
        })
    }
}

/// Deserialize a typed options struct, reporting failures against the mode.
pub(crate) fn parse_options<T: DeserializeOwned>(mode: &str, options: &Value) -> Result<T> {
    serde_json::from_value(options.clone()).map_err(|err| invalid_option(mode, err.to_string()))
}

pub(crate) fn check_range(
    mode: &str,
    field: &str,
    value: f64,
    range: RangeInclusive<f64>,
) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(invalid_option(
            mode,
            format!(
                "{field} must be between {} and {}, got {value}",
                range.start(),
                range.end()
            ),
        ))
    }
}

pub(crate) fn invalid_option(mode: &str, reason: impl Into<String>) -> Error {
    Error::InvalidCostingOption {
        mode: mode.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::request::{normalize, RawRequest};
    use crate::Action;
    use serde_json::json;

    fn limits() -> ServiceLimits {
        Config::from_json_str(
            r#"{
                "graph": { "path": "network.db" },
                "service_limits": { "max_distance": { "auto": 1.0, "pedestrian": 1.0, "boat": 1.0 } },
                "costing_options": {
                    "auto": { "use_highways": 0.8, "top_speed": 120 },
                    "pedestrian": { "walking_speed": 4.0 },
                    "boat": {}
                }
            }"#,
        )
        .unwrap()
        .limits()
    }

    fn request(body: &str) -> CanonicalRequest {
        normalize(Action::Route, &RawRequest::new("POST", "/route").with_body(body)).unwrap()
    }

    #[test]
    fn merge_is_recursive_and_override_wins() {
        let base = json!({"a": 1, "nested": {"x": 1, "y": 2}, "list": [1, 2]});
        let overrides = json!({"a": 5, "nested": {"y": 3, "z": 4}, "list": [9]});
        assert_eq!(
            merge_options(&base, &overrides),
            json!({"a": 5, "nested": {"x": 1, "y": 3, "z": 4}, "list": [9]})
        );
        assert_eq!(merge_options(&base, &json!({})), base);
    }

    #[test]
    fn multimodal_is_served_by_pedestrian() {
        let limits = limits();
        let factory = CostFactory::standard();
        let resolved = CostingResolver::new(&factory, &limits)
            .resolve("multimodal", &request("{}"))
            .unwrap();
        assert_eq!(resolved.requested, "multimodal");
        assert_eq!(resolved.mode, "pedestrian");
        assert_eq!(resolved.model.mode(), "pedestrian");
        assert_eq!(resolved.model.options()["walking_speed"], json!(4.0));
    }

    #[test]
    fn request_overrides_replace_defaults_per_field() {
        let limits = limits();
        let factory = CostFactory::standard();
        let resolved = CostingResolver::new(&factory, &limits)
            .resolve(
                "auto",
                &request(r#"{"costing_options":{"auto":{"use_highways":0.1}}}"#),
            )
            .unwrap();
        let options = resolved.model.options();
        assert_eq!(options["use_highways"], json!(0.1));
        assert_eq!(options["top_speed"], json!(120.0));
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let limits = limits();
        let factory = CostFactory::standard();
        let resolver = CostingResolver::new(&factory, &limits);

        let err = resolver.resolve("yak", &request("{}")).unwrap_err();
        assert_eq!(err.to_string(), "No costing method found for 'yak'");

        // Configured but no constructor registered.
        let err = resolver.resolve("boat", &request("{}")).unwrap_err();
        assert!(matches!(err, Error::UnknownCostingMethod { .. }));

        // Registered but not configured.
        let err = resolver.resolve("bicycle", &request("{}")).unwrap_err();
        assert!(matches!(err, Error::UnknownCostingMethod { .. }));
    }

    #[test]
    fn invalid_overrides_name_the_mode() {
        let limits = limits();
        let factory = CostFactory::standard();
        let err = CostingResolver::new(&factory, &limits)
            .resolve(
                "auto",
                &request(r#"{"costing_options":{"auto":{"use_highways":"lots"}}}"#),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCostingOption { ref mode, .. } if mode == "auto"));
    }

    #[test]
    fn misspelled_overrides_are_rejected() {
        let limits = limits();
        let factory = CostFactory::standard();
        let err = CostingResolver::new(&factory, &limits)
            .resolve(
                "pedestrian",
                &request(r#"{"costing_options":{"pedestrian":{"walking_sped":3.0}}}"#),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCostingOption { ref mode, .. } if mode == "pedestrian"));
        assert!(err.to_string().contains("walking_sped"));
    }

    #[test]
    fn accept_all_filter_allows_everything() {
        use crate::geo::LatLng;
        use crate::graph::{Access, EdgeId, RoadClass};

        let edge = DirectedEdge {
            id: EdgeId::new(0, 0),
            way_id: 1,
            start: LatLng::new(0.0, 0.0),
            end: LatLng::new(0.0, 0.001),
            access: Access::NONE,
            class: RoadClass::Motorway,
        };
        assert!(EdgeFilter::AcceptAll.allows(&edge));

        let model = CostFactory::standard().create("auto", &json!({})).unwrap();
        assert!(!model.edge_filter().allows(&edge));
    }
}
