//! The per-thread request pipeline.
//!
//! A [`Worker`] owns one graph reader and processes one request at a time:
//! parse, validate, resolve costing, preflight (route actions only),
//! correlate and serialize. After every request [`Worker::cleanup`] applies
//! the [`ResourceBudget`] so a long-lived worker never keeps more tiles cached
//! than configured.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::action::Action;
use crate::config::{Config, ServiceLimits};
use crate::correlate::{correlate_lookup, correlate_route};
use crate::costing::{CostFactory, CostingResolver, EdgeFilter, ResolvedCosting};
use crate::error::{Error, Result};
use crate::graph::GraphReader;
use crate::location::Location;
use crate::preflight::preflight;
use crate::request::{self, CanonicalRequest, RawRequest};
use crate::search::{EdgeSearch, Searcher};
use crate::serialize;
use crate::validate::{self, Validated};

/// Where a worker is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Parsing,
    Validating,
    CostingResolution,
    Preflight,
    Correlating,
    Serializing,
    Responding,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Parsing => "parsing",
            Stage::Validating => "validating",
            Stage::CostingResolution => "costing_resolution",
            Stage::Preflight => "preflight",
            Stage::Correlating => "correlating",
            Stage::Serializing => "serializing",
            Stage::Responding => "responding",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully processed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Body for the caller: JSON, or JSONP when a callback was named.
    Respond { body: String, locations: usize },
    /// Handoff document for the route computation stage.
    Forward { document: Value, locations: usize },
}

impl Outcome {
    /// Number of locations the request carried.
    pub fn locations(&self) -> usize {
        match self {
            Outcome::Respond { locations, .. } | Outcome::Forward { locations, .. } => *locations,
        }
    }
}

/// Read-only state shared by every worker.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub limits: Arc<ServiceLimits>,
    pub factory: Arc<CostFactory>,
    pub searcher: Arc<dyn Searcher>,
}

impl WorkerContext {
    /// Context with the built-in cost models and the reference edge search.
    pub fn new(config: &Config) -> Self {
        Self {
            limits: Arc::new(config.limits()),
            factory: Arc::new(CostFactory::standard()),
            searcher: Arc::new(EdgeSearch::new()),
        }
    }
}

/// Post-request policy: clear the reader's tile cache once it is over-committed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceBudget;

impl ResourceBudget {
    /// Returns whether the cache was cleared.
    pub fn enforce(&self, reader: &mut dyn GraphReader) -> bool {
        if reader.over_committed() {
            reader.clear();
            true
        } else {
            false
        }
    }
}

/// Everything that belongs to a single request. Dropped when the request ends.
struct RequestContext {
    action: Action,
    request: CanonicalRequest,
    locations: Vec<Location>,
    costing: Option<ResolvedCosting>,
}

/// Single-threaded request pipeline over one graph reader.
#[derive(Debug)]
pub struct Worker<R> {
    context: WorkerContext,
    reader: R,
    budget: ResourceBudget,
    stage: Stage,
    cache_clears: u64,
}

impl<R: GraphReader> Worker<R> {
    pub fn new(context: WorkerContext, reader: R) -> Self {
        Self {
            context,
            reader,
            budget: ResourceBudget,
            stage: Stage::Idle,
            cache_clears: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// How many times the resource budget has cleared this worker's tile cache.
    pub fn cache_clears(&self) -> u64 {
        self.cache_clears
    }

    /// Process one request, then apply the resource budget.
    ///
    /// A panic inside the pipeline is caught here and reported as
    /// [`Error::Internal`]; the worker stays usable.
    pub fn handle(&mut self, raw: &RawRequest) -> Result<Outcome> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.work(raw))).unwrap_or_else(
            |payload| {
                let message = panic_message(payload.as_ref());
                warn!(stage = %self.stage, %message, "worker panicked");
                Err(Error::Internal { message })
            },
        );
        self.cleanup();
        result
    }

    /// Run the pipeline for one request.
    pub fn work(&mut self, raw: &RawRequest) -> Result<Outcome> {
        self.enter(Stage::Parsing);
        let action = Action::from_path(&raw.path)?;
        let request = request::normalize(action, raw)?;

        self.enter(Stage::Validating);
        let Validated { locations, costing } =
            validate::validate(action, &request, &self.context.limits)?;
        debug!(%action, locations = locations.len(), costing = ?costing, "validated request");
        if action == Action::Nearest {
            return Err(Error::NotImplemented { action });
        }

        self.enter(Stage::CostingResolution);
        let resolver = CostingResolver::new(&self.context.factory, &self.context.limits);
        let costing = costing
            .map(|name| resolver.resolve(&name, &request))
            .transpose()?;

        let context = RequestContext {
            action,
            request,
            locations,
            costing,
        };
        let outcome = if action.is_route() {
            self.route(context)?
        } else {
            self.locate(context)?
        };
        self.enter(Stage::Responding);
        Ok(outcome)
    }

    /// Release per-request resources. Returns whether the tile cache was cleared.
    pub fn cleanup(&mut self) -> bool {
        self.stage = Stage::Idle;
        let cleared = self.budget.enforce(&mut self.reader);
        if cleared {
            self.cache_clears += 1;
            debug!("tile cache over budget, cleared");
        }
        cleared
    }

    fn route(&mut self, context: RequestContext) -> Result<Outcome> {
        let RequestContext {
            action,
            request,
            locations,
            costing,
        } = context;
        let costing = costing.ok_or(Error::MissingCosting)?;

        self.enter(Stage::Preflight);
        let max_distance = self
            .context
            .limits
            .max_distance(&costing.mode)
            .ok_or_else(|| Error::Internal {
                message: format!("no max_distance configured for costing '{}'", costing.mode),
            })?;
        preflight(&locations, &self.reader, max_distance)?;

        self.enter(Stage::Correlating);
        let correlated = correlate_route(
            &locations,
            &mut self.reader,
            self.context.searcher.as_ref(),
            costing.model.edge_filter(),
        )?;

        self.enter(Stage::Serializing);
        let document = serialize::handoff(action, request, &correlated, &costing);
        Ok(Outcome::Forward {
            document,
            locations: locations.len(),
        })
    }

    fn locate(&mut self, context: RequestContext) -> Result<Outcome> {
        let filter = match &context.costing {
            Some(costing) => costing.model.edge_filter(),
            None => EdgeFilter::AcceptAll,
        };

        self.enter(Stage::Correlating);
        let results = correlate_lookup(
            &context.locations,
            &mut self.reader,
            self.context.searcher.as_ref(),
            filter,
        );

        self.enter(Stage::Serializing);
        let body = serialize::render(
            &serialize::lookup_results(&results),
            context.request.jsonp(),
        )?;
        Ok(Outcome::Respond {
            body,
            locations: context.locations.len(),
        })
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "stage");
        self.stage = stage;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::geo::LatLng;
    use crate::graph::{Access, DirectedEdge, EdgeId, GraphTile, RoadClass, TileGrid, TileId};
    use crate::location::Location;
    use crate::search::PathLocation;

    /// One tile of edges, every tile connected, a configurable cache ceiling.
    #[derive(Debug)]
    struct OneTile {
        grid: TileGrid,
        tile: Arc<GraphTile>,
        loads: usize,
        ceiling: usize,
    }

    impl OneTile {
        fn new(ceiling: usize) -> Self {
            let grid = TileGrid::new(0.25).unwrap();
            let start = LatLng::new(50.85, 4.35);
            let end = LatLng::new(50.85, 4.352);
            let id = grid.tile_id(start);
            let edge = DirectedEdge {
                id: EdgeId::new(id, 0),
                way_id: 100,
                start,
                end,
                access: Access::ALL,
                class: RoadClass::Residential,
            };
            Self {
                grid,
                tile: Arc::new(GraphTile::new(id, vec![edge])),
                loads: 0,
                ceiling,
            }
        }
    }

    impl GraphReader for OneTile {
        fn grid(&self) -> &TileGrid {
            &self.grid
        }

        fn tile(&mut self, id: TileId) -> Result<Option<Arc<GraphTile>>> {
            self.loads += 1;
            Ok((id == self.tile.id).then(|| Arc::clone(&self.tile)))
        }

        fn are_connected(&self, _: TileId, _: TileId) -> bool {
            true
        }

        fn over_committed(&self) -> bool {
            self.loads > self.ceiling
        }

        fn clear(&mut self) {
            self.loads = 0;
        }
    }

    #[derive(Debug)]
    struct Exploding;

    impl Searcher for Exploding {
        fn search(
            &self,
            _: &Location,
            _: &mut dyn GraphReader,
            _: EdgeFilter<'_>,
        ) -> Result<PathLocation> {
            panic!("search index corrupted");
        }
    }

    fn context() -> WorkerContext {
        let config = Config::from_json_str(
            r#"{
                "graph": { "path": "network.db" },
                "service_limits": { "max_distance": { "auto": 100000.0, "pedestrian": 1000.0 } },
                "costing_options": { "auto": {}, "pedestrian": {} }
            }"#,
        )
        .unwrap();
        WorkerContext::new(&config)
    }

    fn post(path: &str, body: &str) -> RawRequest {
        RawRequest::new("POST", path).with_body(body)
    }

    #[test]
    fn locate_answers_directly() {
        let mut worker = Worker::new(context(), OneTile::new(1000));
        let outcome = worker
            .handle(&post("/locate", r#"{"locations":[{"lat":50.8501,"lon":4.351}]}"#))
            .unwrap();
        match outcome {
            Outcome::Respond { body, locations } => {
                assert_eq!(locations, 1);
                let body: Value = serde_json::from_str(&body).unwrap();
                assert_eq!(body[0]["ways"][0]["way_id"], 100);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(worker.stage(), Stage::Idle);
    }

    #[test]
    fn route_hands_off_with_effective_costing() {
        let mut worker = Worker::new(context(), OneTile::new(1000));
        let outcome = worker
            .handle(&post(
                "/route",
                r#"{"costing":"multimodal","locations":[{"lat":50.85,"lon":4.35},{"lat":50.85,"lon":4.352}]}"#,
            ))
            .unwrap();
        let Outcome::Forward { document, .. } = outcome else {
            panic!("expected a handoff");
        };
        assert_eq!(document["costing"], "multimodal");
        assert!(document["costing_options"]["pedestrian"].is_object());
        assert!(document["correlated_1"]["edges"].is_array());
    }

    #[test]
    fn multimodal_uses_the_pedestrian_distance_ceiling() {
        let mut worker = Worker::new(context(), OneTile::new(1000));
        let err = worker
            .handle(&post(
                "/route",
                r#"{"costing":"multimodal","locations":[{"lat":50.85,"lon":4.35},{"lat":50.86,"lon":4.35}]}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, Error::DistanceLimitExceeded { max, .. } if max == 1000.0));
    }

    #[test]
    fn nearest_is_reserved() {
        let mut worker = Worker::new(context(), OneTile::new(1000));
        let err = worker
            .handle(&post("/nearest", r#"{"locations":[{"lat":0,"lon":0}]}"#))
            .unwrap_err();
        assert_eq!(err.status_code(), 501);
    }

    #[test]
    fn panics_become_internal_errors() {
        let mut context = context();
        context.searcher = Arc::new(Exploding);
        let mut worker = Worker::new(context, OneTile::new(1000));
        let err = worker
            .handle(&post("/locate", r#"{"locations":[{"lat":0,"lon":0}]}"#))
            .unwrap_err();
        assert!(matches!(err, Error::Internal { ref message } if message == "search index corrupted"));
        assert_eq!(worker.stage(), Stage::Idle);

        // The worker keeps serving.
        let err = worker.handle(&post("/isochrone", "{}")).unwrap_err();
        assert!(matches!(err, Error::UnknownAction { .. }));
    }

    #[test]
    fn cleanup_clears_over_committed_readers() {
        let mut worker = Worker::new(context(), OneTile::new(0));
        worker
            .work(&post("/locate", r#"{"locations":[{"lat":50.85,"lon":4.35}]}"#))
            .unwrap();
        assert!(worker.reader().over_committed());
        assert!(worker.cleanup());
        assert!(!worker.reader().over_committed());
        assert!(!worker.cleanup());
        assert_eq!(worker.cache_clears(), 1);
    }
}
