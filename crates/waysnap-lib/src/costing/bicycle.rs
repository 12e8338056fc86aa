use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_range, parse_options, CostModel};
use crate::error::Result;
use crate::graph::{Access, DirectedEdge, RoadClass};

const MODE: &str = "bicycle";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BicycleType {
    Road,
    #[default]
    Hybrid,
    City,
    Cross,
    Mountain,
}

impl BicycleType {
    /// Typical cruising speed in km/h, used when the caller gives none.
    fn default_speed(self) -> f64 {
        match self {
            BicycleType::Road => 25.0,
            BicycleType::Hybrid | BicycleType::City => 18.0,
            BicycleType::Cross => 20.0,
            BicycleType::Mountain => 16.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BicycleOptions {
    pub bicycle_type: BicycleType,
    /// Cruising speed in km/h; derived from the bicycle type when absent.
    pub cycling_speed: Option<f64>,
    pub use_roads: f64,
    pub use_hills: f64,
    pub use_ferry: f64,
    pub avoid_bad_surfaces: f64,
}

impl Default for BicycleOptions {
    fn default() -> Self {
        Self {
            bicycle_type: BicycleType::default(),
            cycling_speed: None,
            use_roads: 0.25,
            use_hills: 0.25,
            use_ferry: 0.5,
            avoid_bad_surfaces: 0.25,
        }
    }
}

/// Cost model for bicycles. Motorways and trunk roads are never used.
#[derive(Debug, Clone)]
pub struct BicycleCost {
    options: Value,
}

impl CostModel for BicycleCost {
    fn mode(&self) -> &str {
        MODE
    }

    fn allows(&self, edge: &DirectedEdge) -> bool {
        edge.access.contains(Access::BICYCLE)
            && !matches!(edge.class, RoadClass::Motorway | RoadClass::Trunk)
    }

    fn options(&self) -> &Value {
        &self.options
    }
}

pub(super) fn create(options: &Value) -> Result<Box<dyn CostModel>> {
    let mut parsed: BicycleOptions = parse_options(MODE, options)?;
    let speed = parsed
        .cycling_speed
        .unwrap_or_else(|| parsed.bicycle_type.default_speed());
    check_range(MODE, "cycling_speed", speed, 5.0..=60.0)?;
    check_range(MODE, "use_roads", parsed.use_roads, 0.0..=1.0)?;
    check_range(MODE, "use_hills", parsed.use_hills, 0.0..=1.0)?;
    check_range(MODE, "use_ferry", parsed.use_ferry, 0.0..=1.0)?;
    check_range(
        MODE,
        "avoid_bad_surfaces",
        parsed.avoid_bad_surfaces,
        0.0..=1.0,
    )?;
    parsed.cycling_speed = Some(speed);

    Ok(Box::new(BicycleCost {
        options: serde_json::to_value(&parsed)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLng;
    use crate::graph::EdgeId;
    use serde_json::json;

    fn edge(access: Access, class: RoadClass) -> DirectedEdge {
        DirectedEdge {
            id: EdgeId::new(1, 0),
            way_id: 7,
            start: LatLng::new(0.0, 0.0),
            end: LatLng::new(0.0, 0.001),
            access,
            class,
        }
    }

    #[test]
    fn motorways_are_excluded_even_with_access() {
        let model = create(&json!({})).unwrap();
        assert!(model.allows(&edge(Access::ALL, RoadClass::Cycleway)));
        assert!(!model.allows(&edge(Access::ALL, RoadClass::Motorway)));
        assert!(!model.allows(&edge(Access::ALL, RoadClass::Trunk)));
        assert!(!model.allows(&edge(Access::AUTO, RoadClass::Residential)));
    }

    #[test]
    fn speed_follows_bicycle_type() {
        let model = create(&json!({"bicycle_type": "road"})).unwrap();
        assert_eq!(model.options()["cycling_speed"], json!(25.0));

        let model = create(&json!({"bicycle_type": "mountain", "cycling_speed": 12})).unwrap();
        assert_eq!(model.options()["cycling_speed"], json!(12.0));
        assert_eq!(model.options()["bicycle_type"], json!("mountain"));
    }

    #[test]
    fn unknown_bicycle_types_are_rejected() {
        let err = create(&json!({"bicycle_type": "tandem"})).unwrap_err();
        assert!(err.to_string().starts_with("Invalid costing options for 'bicycle'"));
    }
}
