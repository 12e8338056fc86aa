use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::store::{FORMAT_VERSION, SCHEMA};
use super::{Access, RoadClass, TileGrid, TileId};
use crate::error::{Error, Result};
use crate::geo::LatLng;

/// A road network in the JSON interchange format accepted by `waysnap-cli import`.
///
/// ```json
/// { "ways": [ { "id": 100, "class": "residential", "access": ["auto", "pedestrian"],
///               "oneway": false, "coordinates": [[50.85, 4.35], [50.85, 4.352]] } ] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkFile {
    pub ways: Vec<NetworkWay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkWay {
    pub id: u64,
    pub class: RoadClass,
    /// Travel modes allowed on the way; every mode when omitted.
    #[serde(default)]
    pub access: Option<Vec<String>>,
    #[serde(default)]
    pub oneway: bool,
    /// `[lat, lon]` pairs in travel order.
    pub coordinates: Vec<[f64; 2]>,
}

/// Counts reported after a store has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub ways: usize,
    pub edges: usize,
    pub tiles: usize,
    pub components: usize,
}

#[derive(Debug, Clone)]
struct PendingEdge {
    way_id: u64,
    start: LatLng,
    end: LatLng,
    access: Access,
    class: RoadClass,
}

/// Collects ways, splits them into directed edges per tile and writes a tile store.
#[derive(Debug)]
pub struct GraphBuilder {
    grid: TileGrid,
    ways: usize,
    tiles: BTreeMap<TileId, Vec<PendingEdge>>,
    components: UnionFind,
}

impl GraphBuilder {
    pub fn new(tile_size: f64) -> Result<Self> {
        Ok(Self {
            grid: TileGrid::new(tile_size)?,
            ways: 0,
            tiles: BTreeMap::new(),
            components: UnionFind::default(),
        })
    }

    /// Add a way as directed edges between consecutive points.
    ///
    /// Segments are cut where they cross a tile boundary, so every tile the
    /// way passes through holds a piece of it. Two-way roads produce one edge
    /// per direction. All tiles along the way, including tiles its vertices only
    /// touch, are joined in the connectivity map.
    pub fn add_way(
        &mut self,
        way_id: u64,
        points: &[LatLng],
        access: Access,
        class: RoadClass,
        oneway: bool,
    ) {
        self.ways += 1;
        let mut previous_tile = None;
        for pair in points.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            if start.approx_eq(&end) {
                continue;
            }
            for piece in self.grid.split_segment(start, end).windows(2) {
                let (from, to) = (piece[0], piece[1]);
                if from.approx_eq(&to) {
                    continue;
                }
                let tile = self.grid.tile_id(midpoint(from, to));
                if let Some(previous) = previous_tile {
                    self.components.union(previous, tile);
                }
                // A vertex on a boundary belongs to the tile north or east of
                // it, which must count as reachable too.
                self.components.union(tile, self.grid.tile_id(from));
                self.components.union(tile, self.grid.tile_id(to));
                previous_tile = Some(tile);

                self.push_edge(tile, way_id, from, to, access, class);
                if !oneway {
                    self.push_edge(tile, way_id, to, from, access, class);
                }
            }
        }
    }

    /// Add every way of a network file.
    pub fn add_network(&mut self, network: &NetworkFile) -> Result<()> {
        for way in &network.ways {
            let access = match &way.access {
                None => Access::ALL,
                Some(names) => names.iter().try_fold(Access::NONE, |mask, name| {
                    Access::from_name(name)
                        .map(|mode| mask.union(mode))
                        .ok_or_else(|| Error::InvalidConfig {
                            message: format!("way {}: unknown access mode '{name}'", way.id),
                        })
                })?,
            };
            let points = way
                .coordinates
                .iter()
                .map(|[lat, lon]| LatLng::new(*lat, *lon))
                .collect::<Vec<_>>();
            if let Some(point) = points.iter().find(|point| !point.is_valid()) {
                return Err(Error::InvalidConfig {
                    message: format!(
                        "way {}: coordinate ({}, {}) is out of range",
                        way.id, point.lat, point.lon
                    ),
                });
            }
            self.add_way(way.id, &points, access, way.class, way.oneway);
        }
        Ok(())
    }

    fn push_edge(
        &mut self,
        tile: TileId,
        way_id: u64,
        start: LatLng,
        end: LatLng,
        access: Access,
        class: RoadClass,
    ) {
        self.tiles.entry(tile).or_default().push(PendingEdge {
            way_id,
            start,
            end,
            access,
            class,
        });
    }

    /// Write the store to `path`, replacing any existing file.
    pub fn write(mut self, path: &Path) -> Result<BuildSummary> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        let components = self.components.components();
        let mut connection = Connection::open(path)?;
        connection.execute_batch(SCHEMA)?;

        let tx = connection.transaction()?;
        let mut edges = 0;
        {
            let mut meta = tx.prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")?;
            meta.execute(params!["format_version", FORMAT_VERSION])?;
            meta.execute(params!["tile_size", self.grid.size().to_string()])?;

            let mut insert = tx.prepare(
                "INSERT INTO edges (tile_id, edge_index, way_id, start_lat, start_lon, end_lat, end_lon, access, class)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (tile, tile_edges) in &self.tiles {
                for (index, edge) in tile_edges.iter().enumerate() {
                    insert.execute(params![
                        tile,
                        index as u32,
                        edge.way_id as i64,
                        edge.start.lat,
                        edge.start.lon,
                        edge.end.lat,
                        edge.end.lon,
                        edge.access.0,
                        edge.class.as_str(),
                    ])?;
                    edges += 1;
                }
            }

            let mut connectivity =
                tx.prepare("INSERT INTO tile_connectivity (tile_id, component) VALUES (?1, ?2)")?;
            for (tile, component) in &components {
                connectivity.execute(params![tile, component])?;
            }
        }
        tx.commit()?;

        let summary = BuildSummary {
            ways: self.ways,
            edges,
            tiles: self.tiles.len(),
            components: components.values().collect::<BTreeSet<_>>().len(),
        };
        info!(
            path = %path.display(),
            ways = summary.ways,
            edges = summary.edges,
            tiles = summary.tiles,
            components = summary.components,
            "wrote tile store"
        );
        Ok(summary)
    }
}

fn midpoint(a: LatLng, b: LatLng) -> LatLng {
    LatLng::new((a.lat + b.lat) / 2.0, (a.lon + b.lon) / 2.0)
}

/// Union-find over tile ids with path halving.
#[derive(Debug, Default)]
struct UnionFind {
    parent: HashMap<TileId, TileId>,
}

impl UnionFind {
    fn find(&mut self, tile: TileId) -> TileId {
        self.parent.entry(tile).or_insert(tile);
        let mut current = tile;
        loop {
            let parent = self.parent[&current];
            if parent == current {
                return current;
            }
            let grandparent = self.parent[&parent];
            self.parent.insert(current, grandparent);
            current = grandparent;
        }
    }

    fn union(&mut self, a: TileId, b: TileId) {
        let a = self.find(a);
        let b = self.find(b);
        if a != b {
            // Smaller root wins so component ids are stable across runs.
            let (root, child) = if a < b { (a, b) } else { (b, a) };
            self.parent.insert(child, root);
        }
    }

    /// Every known tile mapped to its component, numbered densely from 0.
    fn components(&mut self) -> BTreeMap<TileId, u32> {
        let tiles = self.parent.keys().copied().collect::<Vec<_>>();
        let mut numbering = BTreeMap::new();
        let mut roots = BTreeMap::new();
        for tile in tiles {
            roots.insert(tile, self.find(tile));
        }
        let mut result = BTreeMap::new();
        for (tile, root) in roots {
            let next = numbering.len() as u32;
            let component = *numbering.entry(root).or_insert(next);
            result.insert(tile, component);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_find_merges_transitively() {
        let mut sets = UnionFind::default();
        sets.union(5, 9);
        sets.union(9, 2);
        sets.union(7, 7);
        let components = sets.components();
        assert_eq!(components[&2], components[&5]);
        assert_eq!(components[&5], components[&9]);
        assert_ne!(components[&7], components[&2]);
    }

    #[test]
    fn two_way_roads_produce_both_directions() {
        let mut builder = GraphBuilder::new(0.25).unwrap();
        builder.add_way(
            1,
            &[
                LatLng::new(50.85, 4.35),
                LatLng::new(50.85, 4.352),
                LatLng::new(50.85, 4.354),
            ],
            Access::ALL,
            RoadClass::Residential,
            false,
        );
        builder.add_way(
            2,
            &[LatLng::new(50.86, 4.35), LatLng::new(50.86, 4.36)],
            Access::AUTO,
            RoadClass::Motorway,
            true,
        );

        let dir = tempfile::tempdir().unwrap();
        let summary = builder.write(&dir.path().join("network.db")).unwrap();
        assert_eq!(
            summary,
            BuildSummary {
                ways: 2,
                edges: 5,
                tiles: 1,
                components: 1
            }
        );
    }

    #[test]
    fn long_ways_cover_every_tile_they_cross() {
        let mut builder = GraphBuilder::new(0.25).unwrap();
        builder.add_way(
            7,
            &[LatLng::new(50.85, 4.354), LatLng::new(51.6, 4.354)],
            Access::ALL,
            RoadClass::Primary,
            true,
        );
        for (tile, edges) in &builder.tiles {
            assert_eq!(edges.len(), 1);
            let edge = &edges[0];
            assert!(edge.end.lat - edge.start.lat <= 0.25 + 1e-9);
            assert_eq!(builder.grid.tile_id(midpoint(edge.start, edge.end)), *tile);
        }

        let dir = tempfile::tempdir().unwrap();
        let summary = builder.write(&dir.path().join("network.db")).unwrap();
        assert_eq!(
            summary,
            BuildSummary {
                ways: 1,
                edges: 4,
                tiles: 4,
                components: 1
            }
        );
    }

    #[test]
    fn network_files_reject_unknown_modes() {
        let network: NetworkFile = serde_json::from_str(
            r#"{ "ways": [ { "id": 1, "class": "residential", "access": ["hovercraft"],
                             "coordinates": [[0, 0], [0, 0.001]] } ] }"#,
        )
        .unwrap();
        let mut builder = GraphBuilder::new(0.25).unwrap();
        let err = builder.add_network(&network).unwrap_err();
        assert!(err.to_string().contains("hovercraft"));
    }
}
