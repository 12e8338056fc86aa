//! Location-count and costing-presence checks on the canonical request.

use serde_json::Value;

use crate::action::Action;
use crate::config::ServiceLimits;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::request::CanonicalRequest;

/// The parsed inputs a validated request carries into later stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub locations: Vec<Location>,
    /// Requested travel mode; always present for route-type actions.
    pub costing: Option<String>,
}

/// Parse and bound the locations, then require costing for route-type actions.
pub fn validate(
    action: Action,
    request: &CanonicalRequest,
    limits: &ServiceLimits,
) -> Result<Validated> {
    let malformed = || Error::MalformedLocation {
        parameter: action.locations_parameter(),
    };
    let entries = match request.raw_locations() {
        Some(Value::Array(entries)) => entries,
        _ => return Err(malformed()),
    };

    let max = limits.max_locations(action);
    let mut locations = Vec::with_capacity(entries.len());
    for entry in entries {
        let location = Location::from_value(entry).ok_or_else(malformed)?;
        locations.push(location);
        if let Some(max) = max {
            if locations.len() > max {
                return Err(Error::TooManyLocations { max });
            }
        }
    }

    if locations.is_empty() {
        return Err(Error::TooFewLocations);
    }

    let costing = request.costing().map(str::to_string);
    if action.is_route() && costing.is_none() {
        return Err(Error::MissingCosting);
    }

    Ok(Validated { locations, costing })
}
