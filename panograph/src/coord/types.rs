//! Coordinate type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Valid latitude range
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Longest geohash the encoder will produce.
pub const MAX_PRECISION: usize = 12;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude, positive north
    pub lat: f64,
    /// Longitude, positive east
    pub lon: f64,
}

impl LatLon {
    /// Creates a new position.
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Checks that the position lies inside the valid lat/lon ranges.
    pub fn validate(&self) -> Result<(), CoordError> {
        if !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            return Err(CoordError::InvalidLatitude(self.lat));
        }
        if !(MIN_LON..=MAX_LON).contains(&self.lon) {
            return Err(CoordError::InvalidLongitude(self.lon));
        }
        Ok(())
    }
}

/// Latitude/longitude extent of a single geohash cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    /// South-west corner
    pub sw: LatLon,
    /// North-east corner
    pub ne: LatLon,
}

impl CellBounds {
    /// Returns the center of the cell.
    pub fn center(&self) -> LatLon {
        LatLon::new(
            (self.sw.lat + self.ne.lat) / 2.0,
            (self.sw.lon + self.ne.lon) / 2.0,
        )
    }

    /// Height of the cell in degrees latitude.
    pub fn lat_span(&self) -> f64 {
        self.ne.lat - self.sw.lat
    }

    /// Width of the cell in degrees longitude.
    pub fn lon_span(&self) -> f64 {
        self.ne.lon - self.sw.lon
    }

    /// Checks if the position lies inside (or on the edge of) the cell.
    pub fn contains(&self, position: &LatLon) -> bool {
        position.lat >= self.sw.lat
            && position.lat <= self.ne.lat
            && position.lon >= self.sw.lon
            && position.lon <= self.ne.lon
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Latitude is outside valid range (-90.0 to 90.0)
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    InvalidLongitude(f64),
    /// Geohash precision is zero or longer than [`MAX_PRECISION`]
    InvalidPrecision(usize),
    /// Geohash contains characters outside the base32 alphabet
    InvalidGeohash(String),
    /// The north-east corner is not above and to the right of the south-west corner
    InvalidBoundingBox { sw: LatLon, ne: LatLon },
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::InvalidLatitude(lat) => {
                write!(
                    f,
                    "Invalid latitude: {} (must be between {} and {})",
                    lat, MIN_LAT, MAX_LAT
                )
            }
            CoordError::InvalidLongitude(lon) => {
                write!(
                    f,
                    "Invalid longitude: {} (must be between {} and {})",
                    lon, MIN_LON, MAX_LON
                )
            }
            CoordError::InvalidPrecision(precision) => {
                write!(
                    f,
                    "Invalid geohash precision: {} (must be between 1 and {})",
                    precision, MAX_PRECISION
                )
            }
            CoordError::InvalidGeohash(hash) => {
                write!(f, "Invalid geohash: '{}'", hash)
            }
            CoordError::InvalidBoundingBox { sw, ne } => {
                write!(
                    f,
                    "North east ({}, {}) needs to be top right of south west ({}, {})",
                    ne.lat, ne.lon, sw.lat, sw.lon
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}
