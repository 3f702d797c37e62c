//! Case packaging: turn a local scan mesh plus processing options into an
//! uploadable archive with a fresh case id.

use std::path::Path;

use uuid::Uuid;

use vestra_core::archive::CaseArchive;
use vestra_core::invocation::DEFAULT_BASE_OFFSET_MM;
use vestra_core::manifest::{BaseFit, HealthySide, Manifest, Midline, MANIFEST_VERSION, UNITS_MM};

use crate::error::ClientError;

/// Processing options chosen at packaging time.
///
/// The midline is a sagittal plane: a point `[x, 0, 0]` with normal
/// `[1, 0, 0]`, positioned by the x-offset.
#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub healthy_side: HealthySide,
    pub midline_x_mm: f64,
    pub base_fit_enabled: bool,
    pub base_offset_mm: f64,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            healthy_side: HealthySide::Left,
            midline_x_mm: 0.0,
            base_fit_enabled: true,
            base_offset_mm: DEFAULT_BASE_OFFSET_MM,
        }
    }
}

/// A packaged case ready for upload.
#[derive(Debug, Clone)]
pub struct PackagedCase {
    pub case_id: String,
    pub archive: Vec<u8>,
}

/// Package a scan mesh into a case archive.
///
/// The case id is generated here, once, and identifies the submission for
/// its whole lifetime. Fails with [`ClientError::Validation`] before any
/// network call when no usable mesh was selected.
pub fn package(mesh_path: &Path, options: &PackageOptions) -> Result<PackagedCase, ClientError> {
    if mesh_path.as_os_str().is_empty() {
        return Err(ClientError::Validation("no mesh selected".into()));
    }
    if !mesh_path.is_file() {
        return Err(ClientError::Validation(format!(
            "mesh does not exist: {}",
            mesh_path.display()
        )));
    }

    let mesh = std::fs::read(mesh_path)?;
    if mesh.is_empty() {
        return Err(ClientError::Validation(format!(
            "mesh is empty: {}",
            mesh_path.display()
        )));
    }

    let case_id = Uuid::new_v4().to_string();
    let manifest = Manifest {
        schema_version: MANIFEST_VERSION.to_string(),
        units: UNITS_MM.to_string(),
        case_id: case_id.clone(),
        healthy_side: options.healthy_side,
        midline: Midline {
            point: [options.midline_x_mm, 0.0, 0.0],
            normal: [1.0, 0.0, 0.0],
        },
        base_fit: BaseFit {
            enabled: options.base_fit_enabled,
            offset_mm: options.base_offset_mm,
        },
    };

    let archive = CaseArchive::new(mesh, manifest).pack()?;
    Ok(PackagedCase { case_id, archive })
}
