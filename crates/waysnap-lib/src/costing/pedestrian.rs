use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_range, parse_options, CostModel};
use crate::error::Result;
use crate::graph::{Access, DirectedEdge, RoadClass};

const MODE: &str = "pedestrian";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PedestrianOptions {
    /// Walking speed in km/h.
    pub walking_speed: f64,
    pub walkway_factor: f64,
    pub sidewalk_factor: f64,
    pub alley_factor: f64,
    pub driveway_factor: f64,
    pub step_penalty: f64,
    /// Ferries are only usable when this is above zero.
    pub use_ferry: f64,
}

impl Default for PedestrianOptions {
    fn default() -> Self {
        Self {
            walking_speed: 5.1,
            walkway_factor: 1.0,
            sidewalk_factor: 1.0,
            alley_factor: 2.0,
            driveway_factor: 5.0,
            step_penalty: 0.0,
            use_ferry: 1.0,
        }
    }
}

/// Cost model for walking.
#[derive(Debug, Clone)]
pub struct PedestrianCost {
    use_ferry: bool,
    options: Value,
}

impl CostModel for PedestrianCost {
    fn mode(&self) -> &str {
        MODE
    }

    fn allows(&self, edge: &DirectedEdge) -> bool {
        if !edge.access.contains(Access::PEDESTRIAN) {
            return false;
        }
        match edge.class {
            RoadClass::Motorway => false,
            RoadClass::Ferry => self.use_ferry,
            _ => true,
        }
    }

    fn options(&self) -> &Value {
        &self.options
    }
}

pub(super) fn create(options: &Value) -> Result<Box<dyn CostModel>> {
    let parsed: PedestrianOptions = parse_options(MODE, options)?;
    check_range(MODE, "walking_speed", parsed.walking_speed, 0.5..=25.0)?;
    for (field, value) in [
        ("walkway_factor", parsed.walkway_factor),
        ("sidewalk_factor", parsed.sidewalk_factor),
        ("alley_factor", parsed.alley_factor),
        ("driveway_factor", parsed.driveway_factor),
    ] {
        check_range(MODE, field, value, 0.1..=100_000.0)?;
    }
    check_range(MODE, "step_penalty", parsed.step_penalty, 0.0..=43_200.0)?;
    check_range(MODE, "use_ferry", parsed.use_ferry, 0.0..=1.0)?;

    Ok(Box::new(PedestrianCost {
        use_ferry: parsed.use_ferry > 0.0,
        options: serde_json::to_value(&parsed)?,
    }))
}
