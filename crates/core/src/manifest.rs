//! The case manifest: one processing request, as serialized into the
//! uploaded archive.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Current manifest schema version written by the packager.
pub const MANIFEST_VERSION: &str = "1.0";

/// Schema versions this build knows how to process.
pub const RECOGNIZED_VERSIONS: [&str; 1] = [MANIFEST_VERSION];

/// Unit system used throughout the pipeline. Scans are treated as
/// millimeters end-to-end; the processor contract takes mm offsets.
pub const UNITS_MM: &str = "mm";

/// Which side of the body carries the healthy breast to mirror from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthySide {
    Left,
    Right,
}

/// Mirror plane definition: a point on the plane and its normal,
/// both in world millimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Midline {
    pub point: [f64; 3],
    pub normal: [f64; 3],
}

/// Base (chest-side) fit parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseFit {
    pub enabled: bool,
    pub offset_mm: f64,
}

/// Versioned record describing one processing request.
///
/// The case id is generated by the client at packaging time, is unique
/// per submission, and never changes once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub units: String,
    pub case_id: String,
    pub healthy_side: HealthySide,
    pub midline: Midline,
    pub base_fit: BaseFit,
}

impl Manifest {
    /// Parse a manifest from its JSON serialization, rejecting
    /// unrecognized schema versions.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        let manifest: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::Validation(format!("manifest does not parse: {e}")))?;

        if !RECOGNIZED_VERSIONS.contains(&manifest.schema_version.as_str()) {
            return Err(CoreError::Validation(format!(
                "unrecognized manifest version: {}",
                manifest.schema_version
            )));
        }
        if manifest.case_id.is_empty() {
            return Err(CoreError::Validation("manifest has an empty case id".into()));
        }

        Ok(manifest)
    }

    /// Serialize to the flat JSON document stored in the archive.
    pub fn to_json(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CoreError::Internal(format!("manifest serialization failed: {e}")))
    }
}
