//! Nearest-edge search used to correlate a location onto the graph.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::costing::EdgeFilter;
use crate::error::{Error, Result};
use crate::geo::{self, LatLng, METERS_PER_DEGREE_LAT};
use crate::graph::{EdgeId, GraphReader};
use crate::location::Location;

/// Snap points within this many degrees of the closest one are equivalent.
pub const SNAP_EPSILON: f64 = 1e-6;

/// Default maximum difference between an edge bearing and a heading hint.
pub const DEFAULT_HEADING_TOLERANCE: f64 = 60.0;

/// Largest neighbourhood a radius hint may widen the scan to.
const MAX_RINGS: u32 = 8;

/// One directed edge a location snapped onto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub edge_id: EdgeId,
    pub way_id: u64,
    /// Position of the snap point along the edge, from 0 at its start to 1 at its end.
    pub percent_along: f64,
}

/// A location correlated to the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PathLocation {
    pub location: Location,
    /// The snapped point every candidate shares.
    pub vertex: LatLng,
    pub edges: Vec<Candidate>,
}

/// Spatial-search contract.
pub trait Searcher: Send + Sync + fmt::Debug {
    /// Correlate one location, considering only edges the filter accepts.
    ///
    /// Fails with [`Error::NoSuitableEdges`] when nothing acceptable is near.
    fn search(
        &self,
        location: &Location,
        reader: &mut dyn GraphReader,
        filter: EdgeFilter<'_>,
    ) -> Result<PathLocation>;
}

/// Reference searcher: projects the point onto every accepted edge in the
/// surrounding tiles and keeps the edges sharing the closest snap point.
#[derive(Debug, Clone)]
pub struct EdgeSearch {
    heading_tolerance: f64,
}

impl Default for EdgeSearch {
    fn default() -> Self {
        Self {
            heading_tolerance: DEFAULT_HEADING_TOLERANCE,
        }
    }
}

struct Snap {
    candidate: Candidate,
    point: LatLng,
    distance_squared: f64,
}

impl EdgeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heading_tolerance(mut self, degrees: f64) -> Self {
        self.heading_tolerance = degrees;
        self
    }

    fn rings(&self, location: &Location, tile_size: f64) -> u32 {
        let tile_meters = tile_size * METERS_PER_DEGREE_LAT;
        match location.radius {
            Some(radius) if radius > 0.0 => {
                ((radius / tile_meters).ceil() as u32).clamp(1, MAX_RINGS)
            }
            _ => 1,
        }
    }
}

impl Searcher for EdgeSearch {
    fn search(
        &self,
        location: &Location,
        reader: &mut dyn GraphReader,
        filter: EdgeFilter<'_>,
    ) -> Result<PathLocation> {
        let point = location.latlng;
        let grid = *reader.grid();
        let center = grid.tile_id(point);
        let rings = self.rings(location, grid.size());
        let radius_squared = location.radius.map(|radius| radius * radius);

        let mut snaps = Vec::new();
        for tile_id in grid.neighbours(center, rings) {
            let Some(tile) = reader.tile(tile_id)? else {
                continue;
            };
            for edge in tile.edges() {
                if !filter.allows(edge) {
                    continue;
                }
                if let Some(heading) = location.heading {
                    if geo::heading_delta(edge.bearing(), heading) > self.heading_tolerance {
                        continue;
                    }
                }
                let (snapped, fraction) = geo::project(point, edge.start, edge.end);
                let distance_squared = geo::distance_squared(point, snapped);
                if radius_squared.is_some_and(|limit| distance_squared > limit) {
                    continue;
                }
                snaps.push(Snap {
                    candidate: Candidate {
                        edge_id: edge.id,
                        way_id: edge.way_id,
                        percent_along: fraction,
                    },
                    point: snapped,
                    distance_squared,
                });
            }
        }

        let closest = snaps
            .iter()
            .min_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared))
            .map(|snap| snap.point)
            .ok_or(Error::NoSuitableEdges)?;

        let edges = snaps
            .into_iter()
            .filter(|snap| {
                (snap.point.lat - closest.lat).abs() <= SNAP_EPSILON
                    && (snap.point.lon - closest.lon).abs() <= SNAP_EPSILON
            })
            .map(|snap| snap.candidate)
            .collect::<Vec<_>>();
        trace!(
            lat = point.lat,
            lon = point.lon,
            candidates = edges.len(),
            "correlated location"
        );

        Ok(PathLocation {
            location: location.clone(),
            vertex: closest,
            edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::graph::{Access, DirectedEdge, GraphTile, RoadClass, TileGrid, TileId};

    /// In-memory reader over a handful of edges.
    #[derive(Debug)]
    struct MemoryReader {
        grid: TileGrid,
        tiles: HashMap<TileId, Arc<GraphTile>>,
    }

    impl MemoryReader {
        fn new(segments: &[(u64, (f64, f64), (f64, f64), Access)]) -> Self {
            let grid = TileGrid::new(0.25).unwrap();
            let mut edges: HashMap<TileId, Vec<DirectedEdge>> = HashMap::new();
            for (way_id, start, end, access) in segments {
                let start = LatLng::new(start.0, start.1);
                let end = LatLng::new(end.0, end.1);
                let tile = grid.tile_id(start);
                let list = edges.entry(tile).or_default();
                list.push(DirectedEdge {
                    id: EdgeId::new(tile, list.len() as u32),
                    way_id: *way_id,
                    start,
                    end,
                    access: *access,
                    class: RoadClass::Residential,
                });
            }
            let tiles = edges
                .into_iter()
                .map(|(id, edges)| (id, Arc::new(GraphTile::new(id, edges))))
                .collect();
            Self { grid, tiles }
        }
    }

    impl GraphReader for MemoryReader {
        fn grid(&self) -> &TileGrid {
            &self.grid
        }

        fn tile(&mut self, id: TileId) -> Result<Option<Arc<GraphTile>>> {
            Ok(self.tiles.get(&id).cloned())
        }

        fn are_connected(&self, _: TileId, _: TileId) -> bool {
            true
        }

        fn over_committed(&self) -> bool {
            false
        }

        fn clear(&mut self) {}
    }

    fn crossing() -> MemoryReader {
        MemoryReader::new(&[
            (100, (50.85, 4.35), (50.85, 4.352), Access::ALL),
            (100, (50.85, 4.352), (50.85, 4.35), Access::ALL),
            (200, (50.849, 4.352), (50.851, 4.352), Access::PEDESTRIAN),
            (200, (50.851, 4.352), (50.849, 4.352), Access::PEDESTRIAN),
        ])
    }

    #[test]
    fn keeps_every_edge_sharing_the_closest_snap() {
        let mut reader = crossing();
        let found = EdgeSearch::new()
            .search(
                &Location::new(50.85, 4.3521),
                &mut reader,
                EdgeFilter::AcceptAll,
            )
            .unwrap();
        assert!(found.vertex.approx_eq(&LatLng::new(50.85, 4.352)));
        let ways = found.edges.iter().map(|c| c.way_id).collect::<Vec<_>>();
        assert_eq!(ways, vec![100, 100, 200, 200]);
        assert!((found.edges[0].percent_along - 1.0).abs() < 1e-9);
        assert!(found.edges[1].percent_along.abs() < 1e-9);
    }

    #[test]
    fn heading_filters_out_opposing_edges() {
        let mut reader = crossing();
        let mut location = Location::new(50.8502, 4.351);
        location.heading = Some(85.0);
        let found = EdgeSearch::new()
            .search(&location, &mut reader, EdgeFilter::AcceptAll)
            .unwrap();
        assert_eq!(found.edges.len(), 1);
        assert_eq!(found.edges[0].way_id, 100);
        assert_eq!(found.edges[0].edge_id.index, 0);
    }

    #[test]
    fn radius_bounds_the_snap_distance() {
        let mut reader = crossing();
        let mut location = Location::new(50.8505, 4.351);
        location.radius = Some(10.0);
        let err = EdgeSearch::new()
            .search(&location, &mut reader, EdgeFilter::AcceptAll)
            .unwrap_err();
        assert_eq!(err.to_string(), "No suitable edges near location");

        location.radius = Some(100.0);
        assert!(EdgeSearch::new()
            .search(&location, &mut reader, EdgeFilter::AcceptAll)
            .is_ok());
    }

    #[test]
    fn empty_surroundings_have_no_suitable_edges() {
        let mut reader = crossing();
        let err = EdgeSearch::new()
            .search(&Location::new(90.0, 0.0), &mut reader, EdgeFilter::AcceptAll)
            .unwrap_err();
        assert!(matches!(err, Error::NoSuitableEdges));
    }
}
