//! Record shapes returned by the remote data source.
//!
//! Field names follow the remote API's short keys so a JSON client can
//! deserialize responses straight into these types.

use crate::coord::LatLon;
use serde::{Deserialize, Serialize};

/// Minimal node data discovered through tile scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreNodeRecord {
    /// Globally unique node key
    pub key: String,
    /// Original (uncorrected) capture position
    #[serde(rename = "l")]
    pub original_lat_lon: LatLon,
    /// Computed (corrected) position, if available
    #[serde(rename = "cl", default, skip_serializing_if = "Option::is_none")]
    pub computed_lat_lon: Option<LatLon>,
    /// Key of the sequence the node belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_key: Option<String>,
}

/// Panorama crop metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PanoramaRecord {
    pub cropped_area_image_height_pixels: u32,
    pub cropped_area_image_width_pixels: u32,
    pub cropped_area_left_pixels: u32,
    pub cropped_area_top_pixels: u32,
    pub full_pano_height_pixels: u32,
    pub full_pano_width_pixels: u32,
}

/// Uploader of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub key: String,
    pub username: String,
}

/// Project a node was uploaded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub key: String,
}

/// Data that completes a core node into a full node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillNodeRecord {
    /// Capture time in milliseconds since the Unix epoch
    pub captured_at: i64,
    /// Original compass angle in degrees
    #[serde(rename = "ca", default, skip_serializing_if = "Option::is_none")]
    pub compass_angle: Option<f64>,
    /// Computed compass angle in degrees
    #[serde(rename = "cca", default, skip_serializing_if = "Option::is_none")]
    pub computed_compass_angle: Option<f64>,
    /// Computed altitude in meters
    #[serde(rename = "calt", default, skip_serializing_if = "Option::is_none")]
    pub computed_altitude: Option<f64>,
    /// Camera rotation as an angle-axis vector
    #[serde(rename = "c_rotation", default, skip_serializing_if = "Option::is_none")]
    pub camera_rotation: Option<[f64; 3]>,
    /// Camera translation in the merge component's frame
    #[serde(rename = "c_translation", default, skip_serializing_if = "Option::is_none")]
    pub camera_translation: Option<[f64; 3]>,
    /// Scale of the reconstruction the node belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic_scale: Option<f64>,
    /// Normalized focal length
    #[serde(rename = "cfocal", default, skip_serializing_if = "Option::is_none")]
    pub focal: Option<f64>,
    /// EXIF orientation
    #[serde(default = "default_orientation")]
    pub orientation: u8,
    /// Panorama crop metadata, present for panoramas only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpano: Option<PanoramaRecord>,
    /// Merge component id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_cc: Option<u64>,
    /// Merge version, zero when the node is not merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_version: Option<u64>,
    #[serde(default)]
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRecord>,
    pub user: UserRecord,
    pub width: u32,
    pub height: u32,
}

fn default_orientation() -> u8 {
    1
}

/// Core and fill data of a node in a single response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullNodeRecord {
    #[serde(flatten)]
    pub core: CoreNodeRecord,
    #[serde(flatten)]
    pub fill: FillNodeRecord,
}

impl FullNodeRecord {
    /// Node key of the record.
    pub fn key(&self) -> &str {
        &self.core.key
    }
}

/// Ordered node keys of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub key: String,
    pub keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record_deserializes_short_keys() {
        let value = json!({
            "key": "n1",
            "l": { "lat": 55.0, "lon": 13.0 },
            "cl": { "lat": 55.0001, "lon": 13.0001 },
            "sequence_key": "s1",
            "captured_at": 1,
            "ca": 90.0,
            "merge_version": 2,
            "gpano": {
                "CroppedAreaImageHeightPixels": 10,
                "CroppedAreaImageWidthPixels": 20,
                "CroppedAreaLeftPixels": 0,
                "CroppedAreaTopPixels": 0,
                "FullPanoHeightPixels": 10,
                "FullPanoWidthPixels": 20
            },
            "user": { "key": "u1", "username": "someone" },
            "width": 640,
            "height": 480
        });

        let record: FullNodeRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.key(), "n1");
        assert_eq!(record.core.sequence_key.as_deref(), Some("s1"));
        assert_eq!(record.core.computed_lat_lon, Some(LatLon::new(55.0001, 13.0001)));
        assert_eq!(record.fill.compass_angle, Some(90.0));
        assert_eq!(record.fill.orientation, 1);
        assert_eq!(record.fill.gpano.unwrap().full_pano_width_pixels, 20);
    }

    #[test]
    fn test_core_record_without_sequence_key() {
        let record: CoreNodeRecord =
            serde_json::from_value(json!({ "key": "n1", "l": { "lat": 1.0, "lon": 2.0 } }))
                .unwrap();
        assert!(record.sequence_key.is_none());
        assert!(record.computed_lat_lon.is_none());
    }
}
