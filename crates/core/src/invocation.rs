//! Derivation of an external-processor invocation from manifest parameters.
//!
//! The geometry processor is a black box reachable only through a fixed
//! command-line contract; this module owns the translation from a parsed
//! [`Manifest`] plus file paths into that argument set.

use std::path::{Path, PathBuf};

use crate::manifest::Manifest;

/// Default base comfort offset in millimeters.
pub const DEFAULT_BASE_OFFSET_MM: f64 = 2.0;

/// Default mold shell padding in millimeters.
pub const DEFAULT_MOLD_PADDING_MM: f64 = 10.0;

/// Mirror axis passed to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAxis {
    X,
    Y,
    Z,
}

impl MirrorAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            MirrorAxis::X => "X",
            MirrorAxis::Y => "Y",
            MirrorAxis::Z => "Z",
        }
    }

    /// Derive the mirror axis from a midline plane normal.
    ///
    /// The dominant absolute component wins; a zero or tied normal falls
    /// back to X, the processor's own default.
    pub fn from_normal(normal: [f64; 3]) -> Self {
        let [x, y, z] = [normal[0].abs(), normal[1].abs(), normal[2].abs()];
        if z > x && z > y {
            MirrorAxis::Z
        } else if y > x && y > z {
            MirrorAxis::Y
        } else {
            MirrorAxis::X
        }
    }
}

/// A fully resolved processor invocation: everything needed to build the
/// argument tail after the `--` separator.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub input: PathBuf,
    pub chest_wall: Option<PathBuf>,
    pub axis: MirrorAxis,
    pub base_offset_mm: f64,
    pub mold_padding_mm: f64,
    pub out_prosthetic: PathBuf,
    pub out_mold: PathBuf,
}

impl Invocation {
    /// Resolve an invocation from a manifest and the scratch-dir paths the
    /// worker prepared for this case.
    pub fn from_manifest(
        manifest: &Manifest,
        input: &Path,
        out_prosthetic: &Path,
        out_mold: &Path,
        mold_padding_mm: f64,
    ) -> Self {
        let base_offset_mm = if manifest.base_fit.enabled {
            manifest.base_fit.offset_mm
        } else {
            0.0
        };

        Self {
            input: input.to_path_buf(),
            chest_wall: None,
            axis: MirrorAxis::from_normal(manifest.midline.normal),
            base_offset_mm,
            mold_padding_mm,
            out_prosthetic: out_prosthetic.to_path_buf(),
            out_mold: out_mold.to_path_buf(),
        }
    }

    /// Render the recognized option set of the processor CLI contract.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--input".to_string(),
            self.input.to_string_lossy().into_owned(),
        ];
        if let Some(chest_wall) = &self.chest_wall {
            args.push("--chest_wall".to_string());
            args.push(chest_wall.to_string_lossy().into_owned());
        }
        args.extend([
            "--axis".to_string(),
            self.axis.as_str().to_string(),
            "--base_offset_mm".to_string(),
            self.base_offset_mm.to_string(),
            "--mold_padding_mm".to_string(),
            self.mold_padding_mm.to_string(),
            "--out_prosthetic".to_string(),
            self.out_prosthetic.to_string_lossy().into_owned(),
            "--out_mold".to_string(),
            self.out_mold.to_string_lossy().into_owned(),
        ]);
        args
    }
}
