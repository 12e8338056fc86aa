//! waysnap library entry points.
//!
//! This crate turns raw client requests into graph-correlated, costing-aware
//! requests. It normalizes the supported input encodings, validates location
//! counts against the configured service limits, resolves a cost model for the
//! requested travel mode, rejects unreachable or over-long legs before doing
//! any expensive work, snaps every location onto the road network and renders
//! either a pipeline handoff document or a direct lookup response.
//!
//! The HTTP service and the CLI only drive a [`Worker`]; they should not
//! reimplement any of the request stages.
//!
//! ```text
//! RawRequest -> normalize -> validate -> costing -> preflight -> correlate -> serialize
//! ```

pub mod action;
pub mod config;
pub mod correlate;
pub mod costing;
pub mod error;
pub mod geo;
pub mod graph;
pub mod location;
pub mod preflight;
pub mod request;
pub mod search;
pub mod serialize;
pub mod validate;
pub mod worker;

pub use action::Action;
pub use config::{Config, GraphConfig, LimitsConfig, ServiceLimits, ServiceSettings};
pub use correlate::Correlation;
pub use costing::{CostFactory, CostModel, CostingResolver};
pub use error::{Error, ErrorKind, Result};
pub use geo::LatLng;
pub use graph::{
    Access, DirectedEdge, EdgeId, GraphBuilder, GraphReader, GraphTile, RoadClass, TileGrid,
    TileId, TileReader, TileStore,
};
pub use location::{Location, StopType};
pub use request::{CanonicalRequest, RawRequest};
pub use search::{Candidate, EdgeSearch, PathLocation, Searcher};
pub use worker::{Outcome, ResourceBudget, Stage, Worker, WorkerContext};
