//! The case archive: a ZIP container bundling exactly one scan mesh and
//! one manifest.
//!
//! Entry names are fixed by the upload contract. An archive missing either
//! part, or carrying an empty mesh, is rejected at submission time.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::CoreError;
use crate::manifest::Manifest;

/// Fixed entry name for the scan mesh inside the archive.
pub const MESH_ENTRY: &str = "mesh_breast.stl";

/// Fixed entry name for the serialized manifest inside the archive.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// An unpacked case archive: the raw mesh bytes plus the parsed manifest.
#[derive(Debug, Clone)]
pub struct CaseArchive {
    pub mesh: Vec<u8>,
    pub manifest: Manifest,
}

impl CaseArchive {
    pub fn new(mesh: Vec<u8>, manifest: Manifest) -> Self {
        Self { mesh, manifest }
    }

    /// Serialize into a ZIP container ready for upload.
    pub fn pack(&self) -> Result<Vec<u8>, CoreError> {
        if self.mesh.is_empty() {
            return Err(CoreError::Validation("mesh is empty".into()));
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        writer
            .start_file(MESH_ENTRY, options)
            .and_then(|_| writer.write_all(&self.mesh).map_err(Into::into))
            .map_err(|e| CoreError::Internal(format!("failed to write mesh entry: {e}")))?;

        let manifest_json = self.manifest.to_json()?;
        writer
            .start_file(MANIFEST_ENTRY, options)
            .and_then(|_| writer.write_all(&manifest_json).map_err(Into::into))
            .map_err(|e| CoreError::Internal(format!("failed to write manifest entry: {e}")))?;

        let cursor = writer
            .finish()
            .map_err(|e| CoreError::Internal(format!("failed to finish archive: {e}")))?;
        Ok(cursor.into_inner())
    }

    /// Parse and validate an uploaded archive.
    ///
    /// Both entries must be present, the mesh must be non-empty, and the
    /// manifest must parse with a recognized schema version.
    pub fn unpack(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CoreError::Validation(format!("not a valid archive: {e}")))?;

        let mesh = read_entry(&mut zip, MESH_ENTRY)?;
        if mesh.is_empty() {
            return Err(CoreError::Validation(format!("{MESH_ENTRY} is empty")));
        }

        let manifest_bytes = read_entry(&mut zip, MANIFEST_ENTRY)?;
        let manifest = Manifest::from_json(&manifest_bytes)?;

        Ok(Self { mesh, manifest })
    }
}

fn read_entry(zip: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>, CoreError> {
    let mut entry = zip
        .by_name(name)
        .map_err(|_| CoreError::Validation(format!("archive is missing {name}")))?;
    let mut buf = Vec::new();
    entry
        .read_to_end(&mut buf)
        .map_err(|e| CoreError::Validation(format!("failed to read {name}: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{BaseFit, HealthySide, Midline, MANIFEST_VERSION, UNITS_MM};
    use assert_matches::assert_matches;

    fn manifest() -> Manifest {
        Manifest {
            schema_version: MANIFEST_VERSION.to_string(),
            units: UNITS_MM.to_string(),
            case_id: "c0ffee".to_string(),
            healthy_side: HealthySide::Right,
            midline: Midline {
                point: [0.0, 0.0, 0.0],
                normal: [1.0, 0.0, 0.0],
            },
            base_fit: BaseFit {
                enabled: false,
                offset_mm: 0.0,
            },
        }
    }

    #[test]
    fn pack_then_unpack_recovers_manifest_and_mesh() {
        let archive = CaseArchive::new(b"solid fake-stl".to_vec(), manifest());
        let bytes = archive.pack().unwrap();
        let unpacked = CaseArchive::unpack(&bytes).unwrap();
        assert_eq!(unpacked.manifest, archive.manifest);
        assert_eq!(unpacked.mesh, archive.mesh);
    }

    #[test]
    fn empty_mesh_is_rejected_at_pack_time() {
        let archive = CaseArchive::new(Vec::new(), manifest());
        assert_matches!(archive.pack(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn archive_without_mesh_is_rejected() {
        // Build a ZIP holding only the manifest.
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(MANIFEST_ENTRY, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&manifest().to_json().unwrap()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_matches!(CaseArchive::unpack(&bytes), Err(CoreError::Validation(_)));
    }

    #[test]
    fn archive_without_manifest_is_rejected() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(MESH_ENTRY, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"solid fake-stl").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_matches!(CaseArchive::unpack(&bytes), Err(CoreError::Validation(_)));
    }

    #[test]
    fn random_bytes_are_not_an_archive() {
        assert_matches!(
            CaseArchive::unpack(b"definitely not a zip"),
            Err(CoreError::Validation(_))
        );
    }
}
