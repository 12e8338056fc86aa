//! Cheap reachability and distance checks run before any correlation.

use tracing::debug;

use crate::error::{Error, Result};
use crate::geo;
use crate::graph::GraphReader;
use crate::location::Location;

/// Check every consecutive pair of locations in order.
///
/// The first pair in unconnected regions fails with
/// [`Error::UnreachableRegion`]; the first pair further apart than
/// `max_distance` metres fails with [`Error::DistanceLimitExceeded`].
pub fn preflight(
    locations: &[Location],
    reader: &dyn GraphReader,
    max_distance: f64,
) -> Result<()> {
    for (index, pair) in locations.windows(2).enumerate() {
        let (from, to) = (&pair[0], &pair[1]);

        let a = reader.tile_id(from.latlng);
        let b = reader.tile_id(to.latlng);
        if !reader.are_connected(a, b) {
            return Err(Error::UnreachableRegion {
                from: index,
                to: index + 1,
            });
        }

        let distance = geo::distance(from.latlng, to.latlng);
        if distance > max_distance {
            return Err(Error::DistanceLimitExceeded {
                distance,
                max: max_distance,
            });
        }
        debug!(from = index, to = index + 1, distance, "location distance");
    }
    Ok(())
}
