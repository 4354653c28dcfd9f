//! Coordinate conversion module
//!
//! Provides geohash encoding of geographic positions (the tile scheme used
//! to page node discovery by location) and local metric offsets used to
//! build query boxes around a position.

mod types;

pub use types::{
    CellBounds, CoordError, LatLon, MAX_LAT, MAX_LON, MAX_PRECISION, MIN_LAT, MIN_LON,
};

/// Geohash base32 alphabet.
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Equatorial earth radius used for local metric offsets.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Compass direction of a neighbouring geohash cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Latitude/longitude step (in cell units) towards this direction.
    fn step(self) -> (f64, f64) {
        match self {
            Direction::North => (1.0, 0.0),
            Direction::NorthEast => (1.0, 1.0),
            Direction::East => (0.0, 1.0),
            Direction::SouthEast => (-1.0, 1.0),
            Direction::South => (-1.0, 0.0),
            Direction::SouthWest => (-1.0, -1.0),
            Direction::West => (0.0, -1.0),
            Direction::NorthWest => (1.0, -1.0),
        }
    }
}

/// Encodes a position as a geohash of the given precision.
///
/// # Arguments
///
/// * `position` - Position to encode
/// * `precision` - Number of base32 characters (1 to 12)
pub fn encode_geohash(position: &LatLon, precision: usize) -> Result<String, CoordError> {
    position.validate()?;
    if precision == 0 || precision > MAX_PRECISION {
        return Err(CoordError::InvalidPrecision(precision));
    }

    let (mut lat_min, mut lat_max) = (MIN_LAT, MAX_LAT);
    let (mut lon_min, mut lon_max) = (MIN_LON, MAX_LON);
    let mut hash = String::with_capacity(precision);
    let mut bits = 0u8;
    let mut index = 0usize;
    let mut even = true;

    while hash.len() < precision {
        // Even bits bisect longitude, odd bits latitude
        if even {
            let mid = (lon_min + lon_max) / 2.0;
            if position.lon >= mid {
                index = index * 2 + 1;
                lon_min = mid;
            } else {
                index *= 2;
                lon_max = mid;
            }
        } else {
            let mid = (lat_min + lat_max) / 2.0;
            if position.lat >= mid {
                index = index * 2 + 1;
                lat_min = mid;
            } else {
                index *= 2;
                lat_max = mid;
            }
        }
        even = !even;
        bits += 1;

        if bits == 5 {
            hash.push(BASE32[index] as char);
            bits = 0;
            index = 0;
        }
    }

    Ok(hash)
}

/// Decodes the latitude/longitude extent of a geohash cell.
pub fn geohash_bounds(hash: &str) -> Result<CellBounds, CoordError> {
    if hash.is_empty() || hash.len() > MAX_PRECISION {
        return Err(CoordError::InvalidGeohash(hash.to_string()));
    }

    let (mut lat_min, mut lat_max) = (MIN_LAT, MAX_LAT);
    let (mut lon_min, mut lon_max) = (MIN_LON, MAX_LON);
    let mut even = true;

    for c in hash.bytes() {
        let index = BASE32
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| CoordError::InvalidGeohash(hash.to_string()))?;

        for shift in (0..5).rev() {
            let bit = (index >> shift) & 1;
            if even {
                let mid = (lon_min + lon_max) / 2.0;
                if bit == 1 {
                    lon_min = mid;
                } else {
                    lon_max = mid;
                }
            } else {
                let mid = (lat_min + lat_max) / 2.0;
                if bit == 1 {
                    lat_min = mid;
                } else {
                    lat_max = mid;
                }
            }
            even = !even;
        }
    }

    Ok(CellBounds {
        sw: LatLon::new(lat_min, lon_min),
        ne: LatLon::new(lat_max, lon_max),
    })
}

/// Returns the adjacent geohash cell of the same precision.
///
/// Longitude wraps around the antimeridian; latitude is clamped at the poles,
/// so the northern neighbour of a polar cell is the cell itself.
pub fn geohash_neighbour(hash: &str, direction: Direction) -> Result<String, CoordError> {
    let bounds = geohash_bounds(hash)?;
    let center = bounds.center();
    let (lat_step, lon_step) = direction.step();

    let lat = (center.lat + lat_step * bounds.lat_span()).clamp(MIN_LAT, MAX_LAT);
    let mut lon = center.lon + lon_step * bounds.lon_span();
    if lon > MAX_LON {
        lon -= 360.0;
    } else if lon < MIN_LON {
        lon += 360.0;
    }

    encode_geohash(&LatLon::new(lat, lon), hash.len())
}

/// Local east/north offset in meters from `origin` to `position`.
///
/// Uses an equirectangular approximation which is accurate for the short
/// distances (tens to hundreds of meters) the graph works with.
pub fn enu_offset(origin: &LatLon, position: &LatLon) -> (f64, f64) {
    let north = (position.lat - origin.lat).to_radians() * EARTH_RADIUS_METERS;
    let east = (position.lon - origin.lon).to_radians()
        * EARTH_RADIUS_METERS
        * origin.lat.to_radians().cos();
    (east, north)
}

/// Position reached by moving `east`/`north` meters from `origin`.
pub fn offset_position(origin: &LatLon, east: f64, north: f64) -> LatLon {
    let lat = origin.lat + (north / EARTH_RADIUS_METERS).to_degrees();
    let lon = origin.lon
        + (east / (EARTH_RADIUS_METERS * origin.lat.to_radians().cos())).to_degrees();
    LatLon::new(lat, lon)
}

/// Approximate ground distance in meters between two nearby positions.
pub fn distance_meters(a: &LatLon, b: &LatLon) -> f64 {
    let (east, north) = enu_offset(a, b);
    east.hypot(north)
}

/// Bearing in degrees (0 = north, clockwise) from `origin` to `position`.
pub fn bearing_degrees(origin: &LatLon, position: &LatLon) -> f64 {
    let (east, north) = enu_offset(origin, position);
    east.atan2(north).to_degrees().rem_euclid(360.0)
}
