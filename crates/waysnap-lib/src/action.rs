//! Actions selected by the request path.

use std::fmt;

use crate::error::{Error, Result};

/// The closed set of actions this stage serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Route computation, handed off to the next pipeline stage.
    Route,
    /// Route computation using the legacy `loc=lat,lon` encoding.
    ViaRoute,
    /// Point lookup: correlation results answered directly.
    Locate,
    /// Reserved nearest-element lookup.
    Nearest,
}

impl Action {
    /// Every action, in the order they are advertised.
    pub const ALL: [Action; 4] = [
        Action::Route,
        Action::ViaRoute,
        Action::Locate,
        Action::Nearest,
    ];

    /// Select the action for a request path.
    pub fn from_path(path: &str) -> Result<Self> {
        Action::ALL
            .into_iter()
            .find(|action| action.path() == path)
            .ok_or_else(|| Error::UnknownAction {
                path: path.to_string(),
            })
    }

    /// Request path serving this action.
    pub fn path(self) -> &'static str {
        match self {
            Action::Route => "/route",
            Action::ViaRoute => "/viaroute",
            Action::Locate => "/locate",
            Action::Nearest => "/nearest",
        }
    }

    /// Short name, used in logs and metric labels.
    pub fn name(self) -> &'static str {
        &self.path()[1..]
    }

    /// Whether the action computes a route and therefore hands off downstream.
    pub fn is_route(self) -> bool {
        matches!(self, Action::Route | Action::ViaRoute)
    }

    /// Whether locations arrive in the legacy via-route encoding.
    pub fn is_legacy(self) -> bool {
        matches!(self, Action::ViaRoute)
    }

    /// Field name the caller used for locations.
    pub fn locations_parameter(self) -> &'static str {
        if self.is_legacy() {
            "loc"
        } else {
            "locations"
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
