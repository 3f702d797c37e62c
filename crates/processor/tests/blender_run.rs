//! End-to-end runs of [`BlenderProcessor`] against stand-in executables.
//!
//! A real Blender install is not needed: the processor contract is purely
//! a command line plus output files, so a shell script exercises the full
//! spawn → capture → verify path.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_matches::assert_matches;

use vestra_core::invocation::{Invocation, MirrorAxis};
use vestra_processor::blender::BlenderProcessor;
use vestra_processor::{GeometryProcessor, ProcessorError};

/// Write an executable stand-in for the Blender binary.
fn write_fake_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-blender");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    file.write_all(body.as_bytes()).unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn invocation(dir: &Path) -> Invocation {
    Invocation {
        input: dir.join("in.stl"),
        chest_wall: None,
        axis: MirrorAxis::X,
        base_offset_mm: 2.0,
        mold_padding_mm: 10.0,
        out_prosthetic: dir.join("prosthetic.stl"),
        out_mold: dir.join("mold.stl"),
    }
}

// A stand-in that honors the output-path options and writes both files.
const WRITES_BOTH_OUTPUTS: &str = r#"
P=""; M=""
while [ $# -gt 0 ]; do
  case "$1" in
    --out_prosthetic) P="$2"; shift 2 ;;
    --out_mold) M="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "processing done"
printf 'solid prosthetic' > "$P"
printf 'solid mold' > "$M"
"#;

#[tokio::test]
async fn successful_run_produces_both_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_fake_tool(dir.path(), WRITES_BOTH_OUTPUTS);
    let processor = BlenderProcessor::new(tool, "process_cli.py", Duration::from_secs(10));

    let inv = invocation(dir.path());
    let output = processor.process(&inv).await.unwrap();

    assert!(output.stdout.contains("processing done"));
    assert!(inv.out_prosthetic.exists());
    assert!(inv.out_mold.exists());
}

#[tokio::test]
async fn nonzero_exit_is_a_processing_failure() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_fake_tool(dir.path(), "echo 'mesh is not manifold' >&2\nexit 1\n");
    let processor = BlenderProcessor::new(tool, "process_cli.py", Duration::from_secs(10));

    let err = processor.process(&invocation(dir.path())).await.unwrap_err();
    assert_matches!(
        err,
        ProcessorError::ExecutionFailed { exit_code: 1, ref detail } if detail.contains("not manifold")
    );
}

#[tokio::test]
async fn clean_exit_without_outputs_is_still_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_fake_tool(dir.path(), "echo 'looks fine'\nexit 0\n");
    let processor = BlenderProcessor::new(tool, "process_cli.py", Duration::from_secs(10));

    let err = processor.process(&invocation(dir.path())).await.unwrap_err();
    assert_matches!(err, ProcessorError::MissingOutput { .. });
}

#[tokio::test]
async fn empty_output_file_counts_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_fake_tool(
        dir.path(),
        r#"
P=""; M=""
while [ $# -gt 0 ]; do
  case "$1" in
    --out_prosthetic) P="$2"; shift 2 ;;
    --out_mold) M="$2"; shift 2 ;;
    *) shift ;;
  esac
done
printf 'solid prosthetic' > "$P"
: > "$M"
"#,
    );
    let processor = BlenderProcessor::new(tool, "process_cli.py", Duration::from_secs(10));

    let err = processor.process(&invocation(dir.path())).await.unwrap_err();
    assert_matches!(err, ProcessorError::MissingOutput { ref path } if path.ends_with("mold.stl"));
}

#[tokio::test]
async fn hung_tool_is_killed_at_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let tool = write_fake_tool(dir.path(), "sleep 30\n");
    let processor = BlenderProcessor::new(tool, "process_cli.py", Duration::from_millis(100));

    let err = processor.process(&invocation(dir.path())).await.unwrap_err();
    assert_matches!(err, ProcessorError::Timeout { .. });
}
