#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index over planar points.
//!
//! Bulk-loads an R-tree once per point set and answers exact radius queries
//! and nearest-neighbor queries. Each hit carries the position of the point
//! in the slice it was built from, so callers can look up per-point data
//! (timestamps, weights) without storing it in the tree.

use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree};

/// A point stored in the R-tree tagged with its input position.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// An indexed point found by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the point in the input the index was built from.
    pub index: usize,
    /// Euclidean distance from the query point, in the input's units.
    pub distance: f64,
}

/// Pre-built R-tree over a fixed set of points.
///
/// Rebuilt rather than updated whenever the point set changes.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    /// Builds an index over `points`. An empty input gives an empty index.
    #[must_use]
    pub fn new<I: IntoIterator<Item = [f64; 2]>>(points: I) -> Self {
        let entries: Vec<IndexedPoint> = points
            .into_iter()
            .enumerate()
            .map(|(index, point)| GeomWithData::new(point, index))
            .collect();
        log::trace!("Bulk-loading {} points into spatial index", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// All points within `radius` of `query`, boundary included, ordered by
    /// input position.
    #[must_use]
    pub fn within_radius(&self, query: [f64; 2], radius: f64) -> Vec<Neighbor> {
        let mut hits: Vec<Neighbor> = self
            .tree
            .locate_within_distance(query, radius * radius)
            .map(|entry| Neighbor {
                index: entry.data,
                distance: entry.distance_2(&query).sqrt(),
            })
            .collect();
        hits.sort_unstable_by_key(|hit| hit.index);
        hits
    }

    /// The closest point to `query`, or `None` for an empty index.
    ///
    /// Equidistant points resolve to whichever the tree visits first.
    #[must_use]
    pub fn nearest(&self, query: [f64; 2]) -> Option<Neighbor> {
        self.tree.nearest_neighbor(&query).map(|entry| Neighbor {
            index: entry.data,
            distance: entry.distance_2(&query).sqrt(),
        })
    }

    /// [`Self::nearest`] for each query point, in query order.
    #[must_use]
    pub fn nearest_each<I: IntoIterator<Item = [f64; 2]>>(
        &self,
        queries: I,
    ) -> Vec<Option<Neighbor>> {
        queries.into_iter().map(|query| self.nearest(query)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PointIndex {
        PointIndex::new([[0.0, 0.0], [3.0, 4.0], [10.0, 0.0], [-1.0, 0.0]])
    }

    #[test]
    fn radius_query_is_inclusive_and_ordered() {
        let hits = index().within_radius([0.0, 0.0], 5.0);
        let ids: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(ids, vec![0, 1, 3]);
        assert!((hits[1].distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn radius_query_excludes_beyond_cutoff() {
        let hits = index().within_radius([0.0, 0.0], 4.999);
        assert!(hits.iter().all(|h| h.index != 1));
    }

    #[test]
    fn nearest_returns_distance() {
        let hit = index().nearest([9.0, 1.0]).unwrap();
        assert_eq!(hit.index, 2);
        assert!((hit.distance - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn nearest_each_preserves_query_order() {
        let hits = index().nearest_each([[10.0, 1.0], [-2.0, 0.0]]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].unwrap().index, 2);
        assert_eq!(hits[1].unwrap().index, 3);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let empty = PointIndex::new(std::iter::empty::<[f64; 2]>());
        assert!(empty.is_empty());
        assert!(empty.within_radius([0.0, 0.0], 1e9).is_empty());
        assert!(empty.nearest([0.0, 0.0]).is_none());
        assert_eq!(empty.nearest_each([[1.0, 1.0]]), vec![None]);
    }
}
