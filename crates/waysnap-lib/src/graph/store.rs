use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, info};

use super::{Access, DirectedEdge, EdgeId, GraphReader, GraphTile, RoadClass, TileGrid, TileId};
use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::geo::LatLng;

/// Schema version written by [`super::GraphBuilder`] and required on open.
pub(crate) const FORMAT_VERSION: &str = "1";

pub(crate) const SCHEMA: &str = "
    CREATE TABLE metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE edges (
        tile_id INTEGER NOT NULL,
        edge_index INTEGER NOT NULL,
        way_id INTEGER NOT NULL,
        start_lat REAL NOT NULL,
        start_lon REAL NOT NULL,
        end_lat REAL NOT NULL,
        end_lon REAL NOT NULL,
        access INTEGER NOT NULL,
        class TEXT NOT NULL,
        PRIMARY KEY (tile_id, edge_index)
    );
    CREATE TABLE tile_connectivity (
        tile_id INTEGER PRIMARY KEY,
        component INTEGER NOT NULL
    );
";

/// Tile id to connected-component id. Tiles absent from the map have no edges.
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    components: HashMap<TileId, u32>,
}

impl Connectivity {
    pub fn new(components: HashMap<TileId, u32>) -> Self {
        Self { components }
    }

    /// Whether both tiles carry data and share a component.
    pub fn are_connected(&self, a: TileId, b: TileId) -> bool {
        match (self.components.get(&a), self.components.get(&b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn component(&self, tile: TileId) -> Option<u32> {
        self.components.get(&tile).copied()
    }

    pub fn tile_count(&self) -> usize {
        self.components.len()
    }
}

/// A validated SQLite tile store.
///
/// Opening the store checks the schema and metadata and loads the
/// connectivity map once; [`TileStore::reader`] then hands each worker its own
/// connection and cache sharing that map.
#[derive(Debug, Clone)]
pub struct TileStore {
    path: PathBuf,
    grid: TileGrid,
    max_cache_tiles: usize,
    connectivity: Arc<Connectivity>,
}

impl TileStore {
    pub fn open(config: &GraphConfig) -> Result<Self> {
        let path = config.path.clone();
        if !path.exists() {
            return Err(store_error(&path, "file does not exist"));
        }
        let connection = open_read_only(&path)?;

        for table in ["metadata", "edges", "tile_connectivity"] {
            if !table_exists(&connection, table)? {
                return Err(store_error(&path, format!("missing table '{table}'")));
            }
        }

        let version = metadata(&connection, "format_version")?;
        if version.as_deref() != Some(FORMAT_VERSION) {
            return Err(store_error(
                &path,
                format!(
                    "unsupported format version {}",
                    version.as_deref().unwrap_or("<none>")
                ),
            ));
        }

        let stored_size = metadata(&connection, "tile_size")?
            .and_then(|value| value.parse::<f64>().ok())
            .ok_or_else(|| store_error(&path, "missing tile_size metadata"))?;
        if (stored_size - config.tile_size).abs() > 1e-9 {
            return Err(store_error(
                &path,
                format!(
                    "store uses tile size {stored_size}, configuration expects {}",
                    config.tile_size
                ),
            ));
        }
        let grid = TileGrid::new(stored_size)?;

        let connectivity = Arc::new(load_connectivity(&connection)?);
        info!(
            path = %path.display(),
            tiles = connectivity.tile_count(),
            tile_size = stored_size,
            "opened tile store"
        );

        Ok(Self {
            path,
            grid,
            max_cache_tiles: config.max_cache_tiles,
            connectivity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn connectivity(&self) -> &Arc<Connectivity> {
        &self.connectivity
    }

    /// Open a reader with its own connection and an empty tile cache.
    pub fn reader(&self) -> Result<TileReader> {
        Ok(TileReader {
            path: self.path.clone(),
            connection: open_read_only(&self.path)?,
            grid: self.grid,
            connectivity: Arc::clone(&self.connectivity),
            cache: HashMap::new(),
            max_cache_tiles: self.max_cache_tiles,
        })
    }
}

/// Per-worker [`GraphReader`] backed by a [`TileStore`].
#[derive(Debug)]
pub struct TileReader {
    path: PathBuf,
    connection: Connection,
    grid: TileGrid,
    connectivity: Arc<Connectivity>,
    cache: HashMap<TileId, Option<Arc<GraphTile>>>,
    max_cache_tiles: usize,
}

impl TileReader {
    /// Number of cached tile lookups, including tiles found empty.
    pub fn cached_tiles(&self) -> usize {
        self.cache.len()
    }

    fn load_tile(&self, id: TileId) -> Result<Option<Arc<GraphTile>>> {
        let mut stmt = self.connection.prepare_cached(
            "SELECT edge_index, way_id, start_lat, start_lon, end_lat, end_lon, access, class
             FROM edges WHERE tile_id = ?1 ORDER BY edge_index",
        )?;
        let rows = stmt.query_map([id], |row| row_to_edge(id, row))?;

        let mut edges = Vec::new();
        for row in rows {
            let (edge, class) = row?;
            let class = RoadClass::parse(&class).ok_or_else(|| {
                store_error(&self.path, format!("unknown road class '{class}'"))
            })?;
            edges.push(DirectedEdge { class, ..edge });
        }
        debug!(tile = id, edges = edges.len(), "loaded tile");

        if edges.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Arc::new(GraphTile::new(id, edges))))
        }
    }
}

impl GraphReader for TileReader {
    fn grid(&self) -> &TileGrid {
        &self.grid
    }

    fn tile(&mut self, id: TileId) -> Result<Option<Arc<GraphTile>>> {
        if let Some(tile) = self.cache.get(&id) {
            return Ok(tile.clone());
        }
        let tile = self.load_tile(id)?;
        self.cache.insert(id, tile.clone());
        Ok(tile)
    }

    fn are_connected(&self, a: TileId, b: TileId) -> bool {
        self.connectivity.are_connected(a, b)
    }

    fn over_committed(&self) -> bool {
        self.cache.len() > self.max_cache_tiles
    }

    fn clear(&mut self) {
        self.cache.clear();
    }
}

fn row_to_edge(tile: TileId, row: &Row<'_>) -> rusqlite::Result<(DirectedEdge, String)> {
    let edge = DirectedEdge {
        id: EdgeId::new(tile, row.get(0)?),
        way_id: row.get::<_, i64>(1)? as u64,
        start: LatLng::new(row.get(2)?, row.get(3)?),
        end: LatLng::new(row.get(4)?, row.get(5)?),
        access: Access(row.get(6)?),
        // Replaced by the caller once the stored name is parsed.
        class: RoadClass::Unclassified,
    };
    Ok((edge, row.get(7)?))
}

fn open_read_only(path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(connection)
}

fn load_connectivity(connection: &Connection) -> Result<Connectivity> {
    let mut stmt = connection.prepare("SELECT tile_id, component FROM tile_connectivity")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut components = HashMap::new();
    for row in rows {
        let (tile, component): (TileId, u32) = row?;
        components.insert(tile, component);
    }
    Ok(Connectivity::new(components))
}

fn metadata(connection: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = connection.prepare("SELECT value FROM metadata WHERE key = ?1")?;
    let mut rows = stmt.query([key])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn table_exists(connection: &Connection, table: &str) -> Result<bool> {
    let mut stmt = connection
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1")?;
    let mut rows = stmt.query([table])?;
    Ok(rows.next()?.is_some())
}

fn store_error(path: &Path, message: impl Into<String>) -> Error {
    Error::InvalidGraphStore {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
