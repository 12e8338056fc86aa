//! Orchestrates one spatial search per location.
//!
//! Route-type actions need every location correlated and stop at the first
//! failure. Lookups record a reason for each failed location and carry on.

use tracing::debug;

use crate::costing::EdgeFilter;
use crate::error::{Error, Result};
use crate::graph::GraphReader;
use crate::location::Location;
use crate::search::{PathLocation, Searcher};

/// Outcome of correlating one location for a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Correlation {
    Found(PathLocation),
    Failed { location: Location, reason: String },
}

impl Correlation {
    pub fn location(&self) -> &Location {
        match self {
            Correlation::Found(path) => &path.location,
            Correlation::Failed { location, .. } => location,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Correlation::Found(_))
    }
}

/// Correlate every location, failing the request on the first one without candidates.
pub fn correlate_route(
    locations: &[Location],
    reader: &mut dyn GraphReader,
    searcher: &dyn Searcher,
    filter: EdgeFilter<'_>,
) -> Result<Vec<PathLocation>> {
    locations
        .iter()
        .enumerate()
        .map(|(index, location)| {
            searcher
                .search(location, reader, filter)
                .map_err(|err| match err {
                    Error::NoSuitableEdges => Error::LocationNotFound {
                        index,
                        reason: err.to_string(),
                    },
                    other => other,
                })
        })
        .collect()
}

/// Correlate every location, recording a reason for each one that fails.
pub fn correlate_lookup(
    locations: &[Location],
    reader: &mut dyn GraphReader,
    searcher: &dyn Searcher,
    filter: EdgeFilter<'_>,
) -> Vec<Correlation> {
    locations
        .iter()
        .enumerate()
        .map(
            |(index, location)| match searcher.search(location, reader, filter) {
                Ok(path) => Correlation::Found(path),
                Err(err) => {
                    debug!(index, error = %err, "location not correlated");
                    Correlation::Failed {
                        location: location.clone(),
                        reason: err.to_string(),
                    }
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::geo::LatLng;
    use crate::graph::{GraphTile, TileGrid, TileId};
    use crate::search::Candidate;

    /// Finds a candidate for every location north of the equator.
    #[derive(Debug)]
    struct NorthOnly;

    impl Searcher for NorthOnly {
        fn search(
            &self,
            location: &Location,
            _: &mut dyn GraphReader,
            _: EdgeFilter<'_>,
        ) -> Result<PathLocation> {
            if location.latlng.lat <= 0.0 {
                return Err(Error::NoSuitableEdges);
            }
            Ok(PathLocation {
                location: location.clone(),
                vertex: location.latlng,
                edges: vec![Candidate {
                    edge_id: crate::graph::EdgeId::new(0, 0),
                    way_id: 1,
                    percent_along: 0.5,
                }],
            })
        }
    }

    struct Empty(TileGrid);

    impl GraphReader for Empty {
        fn grid(&self) -> &TileGrid {
            &self.0
        }

        fn tile(&mut self, _: TileId) -> Result<Option<Arc<GraphTile>>> {
            Ok(None)
        }

        fn are_connected(&self, _: TileId, _: TileId) -> bool {
            false
        }

        fn over_committed(&self) -> bool {
            false
        }

        fn clear(&mut self) {}
    }

    fn locations() -> Vec<Location> {
        vec![
            Location::new(10.0, 0.0),
            Location::new(-10.0, 0.0),
            Location::new(20.0, 0.0),
        ]
    }

    #[test]
    fn route_fails_on_first_missing_location() {
        let mut reader = Empty(TileGrid::new(1.0).unwrap());
        let err = correlate_route(&locations(), &mut reader, &NorthOnly, EdgeFilter::AcceptAll)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Location 1 could not be correlated: No suitable edges near location"
        );
    }

    #[test]
    fn lookup_records_reasons_and_continues() {
        let mut reader = Empty(TileGrid::new(1.0).unwrap());
        let results =
            correlate_lookup(&locations(), &mut reader, &NorthOnly, EdgeFilter::AcceptAll);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_found());
        assert!(results[2].is_found());
        match &results[1] {
            Correlation::Failed { location, reason } => {
                assert_eq!(location.latlng, LatLng::new(-10.0, 0.0));
                assert_eq!(reason, "No suitable edges near location");
            }
            other => panic!("unexpected correlation {other:?}"),
        }
    }
}
