use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_range, parse_options, CostModel};
use crate::error::Result;
use crate::graph::{Access, DirectedEdge};

/// Options shared by the motor-vehicle modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoOptions {
    /// Seconds added for a maneuver between differently named ways.
    pub maneuver_penalty: f64,
    pub gate_cost: f64,
    pub toll_booth_cost: f64,
    pub country_crossing_cost: f64,
    /// Preference for motorways, 0 avoids and 1 prefers.
    pub use_highways: f64,
    pub use_tolls: f64,
    pub use_ferry: f64,
    /// Top speed in km/h assumed on any edge.
    pub top_speed: f64,
}

impl Default for AutoOptions {
    fn default() -> Self {
        Self {
            maneuver_penalty: 5.0,
            gate_cost: 30.0,
            toll_booth_cost: 15.0,
            country_crossing_cost: 600.0,
            use_highways: 1.0,
            use_tolls: 0.5,
            use_ferry: 0.5,
            top_speed: 140.0,
        }
    }
}

const MAX_PENALTY: f64 = 43_200.0;

impl AutoOptions {
    fn validate(&self, mode: &str) -> Result<()> {
        check_range(mode, "maneuver_penalty", self.maneuver_penalty, 0.0..=MAX_PENALTY)?;
        check_range(mode, "gate_cost", self.gate_cost, 0.0..=MAX_PENALTY)?;
        check_range(mode, "toll_booth_cost", self.toll_booth_cost, 0.0..=MAX_PENALTY)?;
        check_range(
            mode,
            "country_crossing_cost",
            self.country_crossing_cost,
            0.0..=MAX_PENALTY,
        )?;
        check_range(mode, "use_highways", self.use_highways, 0.0..=1.0)?;
        check_range(mode, "use_tolls", self.use_tolls, 0.0..=1.0)?;
        check_range(mode, "use_ferry", self.use_ferry, 0.0..=1.0)?;
        check_range(mode, "top_speed", self.top_speed, 10.0..=252.0)
    }
}

/// Cost model for cars, the shortest-distance car variant and buses.
#[derive(Debug, Clone)]
pub struct AutoCost {
    mode: &'static str,
    access: Access,
    options: Value,
}

impl AutoCost {
    fn new(mode: &'static str, access: Access, options: &Value) -> Result<Self> {
        let parsed: AutoOptions = parse_options(mode, options)?;
        parsed.validate(mode)?;
        let mut effective = serde_json::to_value(&parsed)?;
        if mode == "auto_shorter" {
            if let Value::Object(map) = &mut effective {
                map.insert("shortest".to_string(), Value::Bool(true));
            }
        }
        Ok(Self {
            mode,
            access,
            options: effective,
        })
    }
}

impl CostModel for AutoCost {
    fn mode(&self) -> &str {
        self.mode
    }

    fn allows(&self, edge: &DirectedEdge) -> bool {
        edge.access.contains(self.access)
    }

    fn options(&self) -> &Value {
        &self.options
    }
}

pub(super) fn create_auto(options: &Value) -> Result<Box<dyn CostModel>> {
    Ok(Box::new(AutoCost::new("auto", Access::AUTO, options)?))
}

pub(super) fn create_auto_shorter(options: &Value) -> Result<Box<dyn CostModel>> {
    Ok(Box::new(AutoCost::new(
        "auto_shorter",
        Access::AUTO,
        options,
    )?))
}

pub(super) fn create_bus(options: &Value) -> Result<Box<dyn CostModel>> {
    Ok(Box::new(AutoCost::new("bus", Access::BUS, options)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geo::LatLng;
    use crate::graph::{EdgeId, RoadClass};
    use serde_json::json;

    fn edge(access: Access) -> DirectedEdge {
        DirectedEdge {
            id: EdgeId::new(1, 0),
            way_id: 7,
            start: LatLng::new(0.0, 0.0),
            end: LatLng::new(0.0, 0.001),
            access,
            class: RoadClass::Primary,
        }
    }

    #[test]
    fn auto_needs_auto_access() {
        let model = create_auto(&json!({})).unwrap();
        assert!(model.allows(&edge(Access::ALL)));
        assert!(model.allows(&edge(Access::AUTO)));
        assert!(!model.allows(&edge(Access::PEDESTRIAN)));
    }

    #[test]
    fn bus_needs_bus_access() {
        let model = create_bus(&json!({})).unwrap();
        assert!(model.allows(&edge(Access::BUS)));
        assert!(!model.allows(&edge(Access::AUTO)));
    }

    #[test]
    fn shorter_variant_is_flagged() {
        let model = create_auto_shorter(&json!({"top_speed": 90})).unwrap();
        assert_eq!(model.options()["shortest"], json!(true));
        assert_eq!(model.options()["top_speed"], json!(90.0));
        assert_eq!(model.options()["gate_cost"], json!(30.0));
    }

    #[test]
    fn out_of_range_options_are_rejected() {
        let err = create_auto(&json!({"use_tolls": 1.5})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid costing options for 'auto': use_tolls must be between 0 and 1, got 1.5"
        );
        assert!(matches!(
            create_bus(&json!({"top_speed": 5})),
            Err(Error::InvalidCostingOption { .. })
        ));
    }
}
