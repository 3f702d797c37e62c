//! One-shot mode: run the processor once from environment parameters.
//!
//! Activated when `VESTRA_INPUT` is set. Takes the same parameter set a
//! queued case manifest carries, so a result produced here matches what
//! the pipeline would produce for the same inputs. No store or queue is
//! involved.

use std::path::{Path, PathBuf};

use vestra_core::invocation::{Invocation, DEFAULT_BASE_OFFSET_MM, DEFAULT_MOLD_PADDING_MM};
use vestra_core::manifest::{BaseFit, HealthySide, Manifest, Midline, MANIFEST_VERSION, UNITS_MM};
use vestra_processor::{GeometryProcessor, ProcessorError, ProcessorOutput};

/// Environment variable that switches the binary into one-shot mode.
pub const INPUT_VAR: &str = "VESTRA_INPUT";

#[derive(Debug, thiserror::Error)]
pub enum SingleShotError {
    #[error("Invalid parameter: {0}")]
    Config(String),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// Parameters of one invocation, mirroring the manifest fields of a
/// queued case plus explicit output paths.
#[derive(Debug, Clone)]
pub struct SingleShotParams {
    pub input: PathBuf,
    pub chest_wall: Option<PathBuf>,
    pub healthy_side: HealthySide,
    pub midline_point: [f64; 3],
    pub midline_normal: [f64; 3],
    pub base_fit_enabled: bool,
    pub base_offset_mm: f64,
    pub mold_padding_mm: f64,
    pub out_prosthetic: PathBuf,
    pub out_mold: PathBuf,
}

impl SingleShotParams {
    /// Read parameters from `VESTRA_*` environment variables.
    ///
    /// | Env Var                 | Default                     |
    /// |-------------------------|-----------------------------|
    /// | `VESTRA_INPUT`          | (required)                  |
    /// | `VESTRA_CHEST_WALL`     | (none)                      |
    /// | `VESTRA_HEALTHY_SIDE`   | `left`                      |
    /// | `VESTRA_MIDLINE_POINT`  | `0,0,0`                     |
    /// | `VESTRA_MIDLINE_NORMAL` | `1,0,0`                     |
    /// | `VESTRA_BASE_FIT`       | `true`                      |
    /// | `VESTRA_BASE_OFFSET_MM` | `2.0`                       |
    /// | `VESTRA_MOLD_PADDING_MM`| `10.0`                      |
    /// | `VESTRA_OUT_PROSTHETIC` | `prosthetic.stl` next to input |
    /// | `VESTRA_OUT_MOLD`       | `mold.stl` next to input    |
    pub fn from_env() -> Result<Self, SingleShotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), with an injectable variable
    /// source.
    pub fn from_lookup(
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SingleShotError> {
        let input = PathBuf::from(
            get(INPUT_VAR).ok_or_else(|| SingleShotError::Config(format!("{INPUT_VAR} is not set")))?,
        );

        let chest_wall = get("VESTRA_CHEST_WALL").map(PathBuf::from);

        let healthy_side = match get("VESTRA_HEALTHY_SIDE").as_deref() {
            None | Some("left") => HealthySide::Left,
            Some("right") => HealthySide::Right,
            Some(other) => {
                return Err(SingleShotError::Config(format!(
                    "VESTRA_HEALTHY_SIDE must be `left` or `right`, got `{other}`"
                )))
            }
        };

        let midline_point = parse_vec3("VESTRA_MIDLINE_POINT", get("VESTRA_MIDLINE_POINT"), [0.0; 3])?;
        let midline_normal =
            parse_vec3("VESTRA_MIDLINE_NORMAL", get("VESTRA_MIDLINE_NORMAL"), [1.0, 0.0, 0.0])?;

        let base_fit_enabled = parse_bool("VESTRA_BASE_FIT", get("VESTRA_BASE_FIT"))?;
        let base_offset_mm = parse_f64(
            "VESTRA_BASE_OFFSET_MM",
            get("VESTRA_BASE_OFFSET_MM"),
            DEFAULT_BASE_OFFSET_MM,
        )?;
        let mold_padding_mm = parse_f64(
            "VESTRA_MOLD_PADDING_MM",
            get("VESTRA_MOLD_PADDING_MM"),
            DEFAULT_MOLD_PADDING_MM,
        )?;

        let sibling = |name: &str| {
            input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
                .join(name)
        };
        let out_prosthetic = get("VESTRA_OUT_PROSTHETIC")
            .map(PathBuf::from)
            .unwrap_or_else(|| sibling("prosthetic.stl"));
        let out_mold = get("VESTRA_OUT_MOLD")
            .map(PathBuf::from)
            .unwrap_or_else(|| sibling("mold.stl"));

        Ok(Self {
            input,
            chest_wall,
            healthy_side,
            midline_point,
            midline_normal,
            base_fit_enabled,
            base_offset_mm,
            mold_padding_mm,
            out_prosthetic,
            out_mold,
        })
    }

    /// Resolve the invocation through the same manifest translation a
    /// queued case goes through.
    pub fn invocation(&self) -> Invocation {
        let manifest = Manifest {
            schema_version: MANIFEST_VERSION.to_string(),
            units: UNITS_MM.to_string(),
            case_id: "one-shot".to_string(),
            healthy_side: self.healthy_side,
            midline: Midline {
                point: self.midline_point,
                normal: self.midline_normal,
            },
            base_fit: BaseFit {
                enabled: self.base_fit_enabled,
                offset_mm: self.base_offset_mm,
            },
        };

        let mut invocation = Invocation::from_manifest(
            &manifest,
            &self.input,
            &self.out_prosthetic,
            &self.out_mold,
            self.mold_padding_mm,
        );
        invocation.chest_wall = self.chest_wall.clone();
        invocation
    }
}

/// Run exactly one invocation and report the outcome.
pub async fn run(
    processor: &dyn GeometryProcessor,
    params: &SingleShotParams,
) -> Result<ProcessorOutput, SingleShotError> {
    if !params.input.is_file() {
        return Err(SingleShotError::Config(format!(
            "input mesh does not exist: {}",
            params.input.display()
        )));
    }

    let invocation = params.invocation();
    tracing::info!(
        input = %invocation.input.display(),
        axis = invocation.axis.as_str(),
        "Running one-shot invocation"
    );

    let output = processor.process(&invocation).await?;

    tracing::info!(
        prosthetic = %invocation.out_prosthetic.display(),
        mold = %invocation.out_mold.display(),
        duration_ms = output.duration_ms,
        "One-shot invocation completed"
    );
    Ok(output)
}

fn parse_vec3(
    name: &str,
    value: Option<String>,
    default: [f64; 3],
) -> Result<[f64; 3], SingleShotError> {
    let Some(value) = value else {
        return Ok(default);
    };

    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse())
        .collect::<Result<_, _>>()
        .map_err(|_| SingleShotError::Config(format!("{name} must be `x,y,z`, got `{value}`")))?;

    <[f64; 3]>::try_from(parts)
        .map_err(|_| SingleShotError::Config(format!("{name} must have three components")))
}

fn parse_f64(name: &str, value: Option<String>, default: f64) -> Result<f64, SingleShotError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| SingleShotError::Config(format!("{name} must be a number, got `{v}`"))),
    }
}

fn parse_bool(name: &str, value: Option<String>) -> Result<bool, SingleShotError> {
    match value.as_deref() {
        None | Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(SingleShotError::Config(format!(
            "{name} must be `true` or `false`, got `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;
    use vestra_core::invocation::MirrorAxis;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn input_is_required() {
        let err = SingleShotParams::from_lookup(lookup(&[])).unwrap_err();
        assert_matches!(err, SingleShotError::Config(_));
    }

    #[test]
    fn defaults_mirror_the_queued_path() {
        let params =
            SingleShotParams::from_lookup(lookup(&[("VESTRA_INPUT", "/scans/in.stl")])).unwrap();

        assert_eq!(params.base_offset_mm, DEFAULT_BASE_OFFSET_MM);
        assert_eq!(params.mold_padding_mm, DEFAULT_MOLD_PADDING_MM);
        assert!(params.base_fit_enabled);
        assert_eq!(params.out_prosthetic, PathBuf::from("/scans/prosthetic.stl"));
        assert_eq!(params.out_mold, PathBuf::from("/scans/mold.stl"));

        let invocation = params.invocation();
        assert_eq!(invocation.axis, MirrorAxis::X);
        assert_eq!(invocation.base_offset_mm, DEFAULT_BASE_OFFSET_MM);
    }

    #[test]
    fn overrides_flow_through_to_the_invocation() {
        let params = SingleShotParams::from_lookup(lookup(&[
            ("VESTRA_INPUT", "/scans/in.stl"),
            ("VESTRA_HEALTHY_SIDE", "right"),
            ("VESTRA_MIDLINE_NORMAL", "0, 0.9, 0.1"),
            ("VESTRA_BASE_FIT", "false"),
            ("VESTRA_BASE_OFFSET_MM", "5.0"),
            ("VESTRA_MOLD_PADDING_MM", "12.5"),
            ("VESTRA_OUT_PROSTHETIC", "/out/p.stl"),
            ("VESTRA_OUT_MOLD", "/out/m.stl"),
            ("VESTRA_CHEST_WALL", "/scans/cw.stl"),
        ]))
        .unwrap();

        let invocation = params.invocation();
        assert_eq!(invocation.axis, MirrorAxis::Y);
        // Disabled base fit zeroes the offset, matching the queued path.
        assert_eq!(invocation.base_offset_mm, 0.0);
        assert_eq!(invocation.mold_padding_mm, 12.5);
        assert_eq!(invocation.out_prosthetic, PathBuf::from("/out/p.stl"));
        assert_eq!(invocation.chest_wall, Some(PathBuf::from("/scans/cw.stl")));
    }

    #[test]
    fn malformed_vectors_are_rejected() {
        let err = SingleShotParams::from_lookup(lookup(&[
            ("VESTRA_INPUT", "/scans/in.stl"),
            ("VESTRA_MIDLINE_NORMAL", "1,banana,0"),
        ]))
        .unwrap_err();
        assert_matches!(err, SingleShotError::Config(_));

        let err = SingleShotParams::from_lookup(lookup(&[
            ("VESTRA_INPUT", "/scans/in.stl"),
            ("VESTRA_MIDLINE_POINT", "1,2"),
        ]))
        .unwrap_err();
        assert_matches!(err, SingleShotError::Config(_));
    }
}
