//! Tiles: per-address buckets of indexed features.

use crate::coord::{self, TileAddress};
use crate::geom::Rect;
use crate::index::TileIndex;

/// Load/lifecycle status of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// Created but holding no data yet.
    Empty,
    /// A remote fetch for this tile is in flight.
    Loading,
    /// Holds locally added features but was never fetched from the remote;
    /// remote features for this area may be missing.
    Partial,
    /// Remote payload integrated; the tile is complete for its area.
    Full,
    /// A remote fetch failed; local contents are served, remote contents
    /// may be missing until a later fetch succeeds.
    Stale,
}

/// One tile of a provider: address, status, and the spatial index over the
/// features assigned to it (owned and ghost references).
#[derive(Debug)]
pub struct Tile {
    address: TileAddress,
    status: TileStatus,
    pub(crate) index: TileIndex,
}

impl Tile {
    /// Creates an empty tile at an address.
    pub fn new(address: TileAddress) -> Self {
        Self {
            address,
            status: TileStatus::Empty,
            index: TileIndex::new(),
        }
    }

    /// The tile's address.
    pub fn address(&self) -> TileAddress {
        self.address
    }

    /// Geographic bounds of the tile.
    pub fn bounds(&self) -> Rect {
        coord::bounds(&self.address)
    }

    /// Current status.
    pub fn status(&self) -> TileStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: TileStatus) {
        self.status = status;
    }

    /// Number of feature references indexed in this tile.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if no features are indexed here.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{FeatureId, LonLat};

    #[test]
    fn test_new_tile_is_empty() {
        let tile = Tile::new(TileAddress::new(1, 2, 3).unwrap());
        assert_eq!(tile.status(), TileStatus::Empty);
        assert!(tile.is_empty());
        assert_eq!(tile.address(), TileAddress::new(1, 2, 3).unwrap());
    }

    #[test]
    fn test_bounds_contains_indexed_point() {
        let address = crate::coord::tile_address(10, 13.4, 52.5).unwrap();
        let mut tile = Tile::new(address);
        let bounds = tile.bounds();
        assert!(bounds.contains(LonLat::new(13.4, 52.5)));

        tile.index.insert(
            FeatureId::Local(1),
            Rect::from_point(LonLat::new(13.4, 52.5)),
            false,
        );
        assert_eq!(tile.len(), 1);
    }
}
