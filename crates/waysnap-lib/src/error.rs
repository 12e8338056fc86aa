use std::path::PathBuf;

use thiserror::Error;

use crate::action::Action;

/// Convenient result alias for the waysnap library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// The first group of variants are expected client-facing rejections; each
/// maps to a stable [`ErrorKind`] and HTTP status. The remaining variants wrap
/// storage and configuration faults.
#[derive(Debug, Error)]
pub enum Error {
    /// The request path does not name a supported action.
    #[error("Try any of: {}", supported_paths())]
    UnknownAction { path: String },

    /// The inline JSON payload could not be parsed.
    #[error("Failed to parse json request")]
    MalformedInput { reason: String },

    /// A location entry (or the whole location list) is missing or unusable.
    ///
    /// `parameter` is the field name the caller used: `locations`, or `loc`
    /// for the via-route encoding.
    #[error("Insufficiently specified required parameter '{parameter}'")]
    MalformedLocation { parameter: &'static str },

    /// No locations were supplied.
    #[error("Insufficient number of locations provided")]
    TooFewLocations,

    /// More locations than the action allows.
    #[error("Exceeded max route locations of {max}")]
    TooManyLocations { max: usize },

    /// A route-type action did not name a travel mode.
    #[error("No edge/node costing provided")]
    MissingCosting,

    /// The travel mode has no default costing options or constructor.
    #[error("No costing method found for '{name}'")]
    UnknownCostingMethod { name: String },

    /// Merged costing options failed to build a cost model.
    #[error("Invalid costing options for '{mode}': {reason}")]
    InvalidCostingOption { mode: String, reason: String },

    /// The JSONP callback is not a plain identifier.
    #[error("Invalid jsonp callback name '{name}'")]
    InvalidCallback { name: String },

    /// Two consecutive locations sit in regions that are not connected.
    #[error("Locations are in unconnected regions. Go check/edit the map at osm.org")]
    UnreachableRegion { from: usize, to: usize },

    /// Two consecutive locations are further apart than the mode allows.
    #[error("Path distance exceeds the max distance limit.")]
    DistanceLimitExceeded { distance: f64, max: f64 },

    /// The spatial search found no acceptable edge near a point.
    #[error("No suitable edges near location")]
    NoSuitableEdges,

    /// Correlation failed for a location of a route-type action.
    #[error("Location {index} could not be correlated: {reason}")]
    LocationNotFound { index: usize, reason: String },

    /// The action is recognised but not served by this stage.
    #[error("Action '{action}' is not implemented")]
    NotImplemented { action: Action },

    /// A worker stage failed unexpectedly (for example a caught panic).
    #[error("{message}")]
    Internal { message: String },

    /// The configuration file is missing a required value or is inconsistent.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The tile store does not have the expected schema or metadata.
    #[error("invalid graph store at {path}: {message}")]
    InvalidGraphStore { path: PathBuf, message: String },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON errors outside of request parsing.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Stable classification of [`Error`] values, used for metrics labels and
/// problem types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownAction,
    MalformedInput,
    MalformedLocation,
    TooFewLocations,
    TooManyLocations,
    MissingCosting,
    UnknownCostingMethod,
    InvalidCostingOption,
    UnreachableRegion,
    DistanceLimitExceeded,
    LocationNotFound,
    NotImplemented,
    Internal,
}

impl ErrorKind {
    /// Snake-case label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnknownAction => "unknown_action",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::MalformedLocation => "malformed_location",
            ErrorKind::TooFewLocations => "too_few_locations",
            ErrorKind::TooManyLocations => "too_many_locations",
            ErrorKind::MissingCosting => "missing_costing",
            ErrorKind::UnknownCostingMethod => "unknown_costing_method",
            ErrorKind::InvalidCostingOption => "invalid_costing_option",
            ErrorKind::UnreachableRegion => "unreachable_region",
            ErrorKind::DistanceLimitExceeded => "distance_limit_exceeded",
            ErrorKind::LocationNotFound => "location_not_found",
            ErrorKind::NotImplemented => "not_implemented",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP status code the service answers with for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::UnknownAction | ErrorKind::UnreachableRegion => 404,
            ErrorKind::DistanceLimitExceeded => 412,
            ErrorKind::NotImplemented => 501,
            _ => 400,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownAction { .. } => ErrorKind::UnknownAction,
            Error::MalformedInput { .. } | Error::InvalidCallback { .. } => {
                ErrorKind::MalformedInput
            }
            Error::MalformedLocation { .. } => ErrorKind::MalformedLocation,
            Error::TooFewLocations => ErrorKind::TooFewLocations,
            Error::TooManyLocations { .. } => ErrorKind::TooManyLocations,
            Error::MissingCosting => ErrorKind::MissingCosting,
            Error::UnknownCostingMethod { .. } => ErrorKind::UnknownCostingMethod,
            Error::InvalidCostingOption { .. } => ErrorKind::InvalidCostingOption,
            Error::UnreachableRegion { .. } => ErrorKind::UnreachableRegion,
            Error::DistanceLimitExceeded { .. } => ErrorKind::DistanceLimitExceeded,
            Error::NoSuitableEdges | Error::LocationNotFound { .. } => ErrorKind::LocationNotFound,
            Error::NotImplemented { .. } => ErrorKind::NotImplemented,
            _ => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

fn supported_paths() -> String {
    Action::ALL
        .iter()
        .map(|action| format!("'{}'", action.path()))
        .collect::<Vec<_>>()
        .join(" ")
}
