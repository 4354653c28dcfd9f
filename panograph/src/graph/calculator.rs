//! Tile arithmetic for the graph.

use crate::coord::{
    encode_geohash, enu_offset, geohash_bounds, geohash_neighbour, offset_position, CoordError,
    Direction, LatLon,
};

/// Geohash length of a graph tile.
pub const TILE_PRECISION: usize = 7;

/// Distance in meters to a tile edge within which the neighbouring tile
/// is also considered to cover a position.
pub const TILE_THRESHOLD_METERS: f64 = 20.0;

/// Pure conversions between positions and tile ids ("h" codes).
#[derive(Debug, Clone, Copy)]
pub struct GraphCalculator {
    precision: usize,
    threshold: f64,
}

impl GraphCalculator {
    pub fn new() -> Self {
        Self {
            precision: TILE_PRECISION,
            threshold: TILE_THRESHOLD_METERS,
        }
    }

    /// Radius used for spatial area queries around a node.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Tile containing `position`.
    pub fn encode_h(&self, position: &LatLon) -> Result<String, CoordError> {
        encode_geohash(position, self.precision)
    }

    /// Tile containing `position` plus every neighbour whose edge lies within
    /// the threshold distance.
    ///
    /// The containing tile comes first, neighbours follow in the order
    /// n, nw, w, sw, s, se, e, ne.
    pub fn encode_hs(&self, position: &LatLon) -> Result<Vec<String>, CoordError> {
        let h = self.encode_h(position)?;
        let bounds = geohash_bounds(&h)?;
        let (east, north) = enu_offset(&bounds.sw, position);
        let (width, height) = enu_offset(&bounds.sw, &bounds.ne);

        let near_north = height - north < self.threshold;
        let near_south = north < self.threshold;
        let near_east = width - east < self.threshold;
        let near_west = east < self.threshold;

        let candidates = [
            (near_north, Direction::North),
            (near_north && near_west, Direction::NorthWest),
            (near_west, Direction::West),
            (near_south && near_west, Direction::SouthWest),
            (near_south, Direction::South),
            (near_south && near_east, Direction::SouthEast),
            (near_east, Direction::East),
            (near_north && near_east, Direction::NorthEast),
        ];

        let mut hs = vec![h.clone()];
        for (near, direction) in candidates {
            if !near {
                continue;
            }
            let neighbour = geohash_neighbour(&h, direction)?;
            if !hs.contains(&neighbour) {
                hs.push(neighbour);
            }
        }
        Ok(hs)
    }

    /// Every tile overlapping the box spanned by `sw` and `ne`.
    pub fn encode_hs_from_bounding_box(
        &self,
        sw: &LatLon,
        ne: &LatLon,
    ) -> Result<Vec<String>, CoordError> {
        sw.validate()?;
        ne.validate()?;
        if ne.lat <= sw.lat || ne.lon <= sw.lon {
            return Err(CoordError::InvalidBoundingBox { sw: *sw, ne: *ne });
        }

        let corner = self.encode_h(sw)?;
        let cell = geohash_bounds(&corner)?;
        let (lat_step, lon_step) = (cell.lat_span(), cell.lon_span());

        let mut hs = Vec::new();
        let mut lat = cell.center().lat;
        while lat - lat_step / 2.0 < ne.lat {
            let mut lon = cell.center().lon;
            while lon - lon_step / 2.0 < ne.lon {
                let h = self.encode_h(&LatLon::new(lat.min(90.0), lon.min(180.0)))?;
                if !hs.contains(&h) {
                    hs.push(h);
                }
                lon += lon_step;
            }
            lat += lat_step;
        }
        Ok(hs)
    }

    /// South-west and north-east corners of a square with half side
    /// `radius` meters centered on `position`.
    pub fn bounding_box_corners(&self, position: &LatLon, radius: f64) -> (LatLon, LatLon) {
        (
            offset_position(position, -radius, -radius),
            offset_position(position, radius, radius),
        )
    }
}

impl Default for GraphCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Tile arithmetic used by [`Graph`](super::Graph).
///
/// [`GraphCalculator`] is the implementation used by default; a graph can
/// be built with another one through [`Graph::from_parts`](super::Graph::from_parts).
pub trait TileCalculator: Send + Sync {
    /// Radius in meters of the spatial area around a node.
    fn threshold(&self) -> f64;

    fn encode_h(&self, position: &LatLon) -> Result<String, CoordError>;

    fn encode_hs(&self, position: &LatLon) -> Result<Vec<String>, CoordError>;

    fn encode_hs_from_bounding_box(
        &self,
        sw: &LatLon,
        ne: &LatLon,
    ) -> Result<Vec<String>, CoordError>;

    fn bounding_box_corners(&self, position: &LatLon, radius: f64) -> (LatLon, LatLon);
}

impl TileCalculator for GraphCalculator {
    fn threshold(&self) -> f64 {
        GraphCalculator::threshold(self)
    }

    fn encode_h(&self, position: &LatLon) -> Result<String, CoordError> {
        GraphCalculator::encode_h(self, position)
    }

    fn encode_hs(&self, position: &LatLon) -> Result<Vec<String>, CoordError> {
        GraphCalculator::encode_hs(self, position)
    }

    fn encode_hs_from_bounding_box(
        &self,
        sw: &LatLon,
        ne: &LatLon,
    ) -> Result<Vec<String>, CoordError> {
        GraphCalculator::encode_hs_from_bounding_box(self, sw, ne)
    }

    fn bounding_box_corners(&self, position: &LatLon, radius: f64) -> (LatLon, LatLon) {
        GraphCalculator::bounding_box_corners(self, position, radius)
    }
}
