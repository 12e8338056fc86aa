//! Road network graph: identifiers, edges, the tile grid and the reader contract.
//!
//! The network is partitioned into a regular grid of square tiles. Edges are
//! cut at tile boundaries, so each directed edge lies within one tile and is
//! addressed by `(tile, index)`. Tiles are loaded lazily by a [`GraphReader`];
//! the reference implementation is [`TileReader`] over a SQLite [`TileStore`]
//! produced by [`GraphBuilder`].

mod builder;
mod store;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{self, LatLng};

pub use builder::{BuildSummary, GraphBuilder, NetworkFile, NetworkWay};
pub use store::{Connectivity, TileReader, TileStore};

/// Identifier of a tile in a [`TileGrid`].
pub type TileId = u32;

/// Identifier of a directed edge: the owning tile and the edge's index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId {
    pub tile: TileId,
    pub index: u32,
}

impl EdgeId {
    pub fn new(tile: TileId, index: u32) -> Self {
        Self { tile, index }
    }

    /// Pack into a single integer, tile in the high 32 bits.
    pub fn value(self) -> u64 {
        (u64::from(self.tile) << 32) | u64::from(self.index)
    }

    pub fn from_value(value: u64) -> Self {
        Self {
            tile: (value >> 32) as TileId,
            index: value as u32,
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tile, self.index)
    }
}

/// Travel modes allowed on an edge, as a bit mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access(pub u8);

impl Access {
    pub const NONE: Access = Access(0);
    pub const AUTO: Access = Access(1);
    pub const BUS: Access = Access(1 << 1);
    pub const BICYCLE: Access = Access(1 << 2);
    pub const PEDESTRIAN: Access = Access(1 << 3);
    pub const ALL: Access = Access(0b1111);

    pub fn contains(self, other: Access) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn union(self, other: Access) -> Access {
        Access(self.0 | other.0)
    }

    /// Parse a mode name as used in network files (`auto`, `bus`, `bicycle`, `pedestrian`).
    pub fn from_name(name: &str) -> Option<Access> {
        match name {
            "auto" => Some(Access::AUTO),
            "bus" => Some(Access::BUS),
            "bicycle" => Some(Access::BICYCLE),
            "pedestrian" => Some(Access::PEDESTRIAN),
            _ => None,
        }
    }
}

/// Functional classification of the way an edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    Service,
    Footway,
    Cycleway,
    Ferry,
}

impl RoadClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RoadClass::Motorway => "motorway",
            RoadClass::Trunk => "trunk",
            RoadClass::Primary => "primary",
            RoadClass::Secondary => "secondary",
            RoadClass::Tertiary => "tertiary",
            RoadClass::Unclassified => "unclassified",
            RoadClass::Residential => "residential",
            RoadClass::Service => "service",
            RoadClass::Footway => "footway",
            RoadClass::Cycleway => "cycleway",
            RoadClass::Ferry => "ferry",
        }
    }

    pub fn parse(value: &str) -> Option<RoadClass> {
        serde_json::from_value(serde_json::Value::from(value)).ok()
    }
}

/// A directed edge: one travel direction along one segment of a way.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectedEdge {
    pub id: EdgeId,
    /// Stable identifier of the real-world way this edge belongs to.
    pub way_id: u64,
    pub start: LatLng,
    pub end: LatLng,
    pub access: Access,
    pub class: RoadClass,
}

impl DirectedEdge {
    /// Approximate length in metres.
    pub fn length(&self) -> f64 {
        geo::distance(self.start, self.end)
    }

    /// Direction of travel in degrees clockwise from north.
    pub fn bearing(&self) -> f64 {
        geo::bearing(self.start, self.end)
    }
}

/// One loaded tile.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphTile {
    pub id: TileId,
    edges: Vec<DirectedEdge>,
}

impl GraphTile {
    pub fn new(id: TileId, edges: Vec<DirectedEdge>) -> Self {
        Self { id, edges }
    }

    pub fn edges(&self) -> &[DirectedEdge] {
        &self.edges
    }

    pub fn edge(&self, index: u32) -> Option<&DirectedEdge> {
        self.edges.get(index as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Regular grid of square tiles covering the globe.
///
/// Tile ids count row-major from the south-west corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    size: f64,
    rows: u32,
    columns: u32,
}

impl TileGrid {
    /// Create a grid whose tile edge is `size` degrees. `size` must divide 180.
    pub fn new(size: f64) -> Result<Self> {
        let rows = 180.0 / size;
        if !(size > 0.0) || (rows - rows.round()).abs() > 1e-9 {
            return Err(Error::InvalidConfig {
                message: format!("tile size {size} does not divide the globe evenly"),
            });
        }
        let rows = rows.round() as u64;
        let count = rows
            .checked_mul(2)
            .and_then(|columns| columns.checked_mul(rows));
        match count {
            Some(count) if count <= u64::from(u32::MAX) => Ok(Self {
                size,
                rows: rows as u32,
                columns: (rows * 2) as u32,
            }),
            _ => Err(Error::InvalidConfig {
                message: format!(
                    "tile size {size} needs more tiles than tile ids can address"
                ),
            }),
        }
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn tile_count(&self) -> u32 {
        self.rows * self.columns
    }

    /// Tile containing a point. Points on the north or east boundary fall in the last row/column.
    pub fn tile_id(&self, latlng: LatLng) -> TileId {
        let row = (((latlng.lat + 90.0) / self.size).floor().max(0.0) as u32).min(self.rows - 1);
        let column =
            (((latlng.lon + 180.0) / self.size).floor().max(0.0) as u32).min(self.columns - 1);
        row * self.columns + column
    }

    /// Cut the straight segment `start -> end` wherever it crosses a tile
    /// boundary. The result starts with `start`, ends with `end` and every
    /// consecutive pair lies within a single tile.
    pub fn split_segment(&self, start: LatLng, end: LatLng) -> Vec<LatLng> {
        let mut cuts = Vec::new();
        self.crossings(start.lat + 90.0, end.lat + 90.0, &mut cuts);
        self.crossings(start.lon + 180.0, end.lon + 180.0, &mut cuts);
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

        let mut points = Vec::with_capacity(cuts.len() + 2);
        points.push(start);
        for t in cuts {
            points.push(LatLng::new(
                start.lat + (end.lat - start.lat) * t,
                start.lon + (end.lon - start.lon) * t,
            ));
        }
        points.push(end);
        points
    }

    /// Fractions along `from -> to` (offset coordinates) where a grid line is crossed.
    fn crossings(&self, from: f64, to: f64, cuts: &mut Vec<f64>) {
        let (low, high) = if from < to { (from, to) } else { (to, from) };
        if high - low < f64::EPSILON {
            return;
        }
        let mut line = (low / self.size).floor() + 1.0;
        while line * self.size < high {
            let t = (line * self.size - from) / (to - from);
            if t > 0.0 && t < 1.0 {
                cuts.push(t);
            }
            line += 1.0;
        }
    }

    /// Tiles within `rings` rows/columns of `tile`, including `tile` itself.
    ///
    /// Rows stop at the poles; columns wrap around the antimeridian.
    pub fn neighbours(&self, tile: TileId, rings: u32) -> Vec<TileId> {
        let row = (tile / self.columns) as i64;
        let column = (tile % self.columns) as i64;
        let rings = i64::from(rings.min(self.columns / 2));
        let mut tiles = Vec::new();
        for r in (row - rings)..=(row + rings) {
            if r < 0 || r >= i64::from(self.rows) {
                continue;
            }
            for c in (column - rings)..=(column + rings) {
                let c = c.rem_euclid(i64::from(self.columns));
                let id = (r * i64::from(self.columns) + c) as TileId;
                if !tiles.contains(&id) {
                    tiles.push(id);
                }
            }
        }
        tiles
    }
}

/// Graph-access contract used by preflight and the spatial search.
///
/// Each worker owns its reader; implementations cache loaded tiles and report
/// when that cache has outgrown its budget.
pub trait GraphReader {
    /// The grid the graph is partitioned on.
    fn grid(&self) -> &TileGrid;

    /// Load a tile, `None` when the store has no edges there.
    fn tile(&mut self, id: TileId) -> Result<Option<Arc<GraphTile>>>;

    /// Whether two tiles belong to the same connected region.
    fn are_connected(&self, a: TileId, b: TileId) -> bool;

    /// Whether the tile cache has grown past its ceiling.
    fn over_committed(&self) -> bool;

    /// Drop every cached tile.
    fn clear(&mut self);

    /// Tile containing a point.
    fn tile_id(&self, latlng: LatLng) -> TileId {
        self.grid().tile_id(latlng)
    }

    /// Look up an edge by id.
    fn edge(&mut self, id: EdgeId) -> Result<Option<DirectedEdge>> {
        Ok(self
            .tile(id.tile)?
            .and_then(|tile| tile.edge(id.index).cloned()))
    }
}
