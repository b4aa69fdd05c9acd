//! Helpers for running external conversion tools.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use super::error::ConverterError;
use super::types::ConversionOutput;

/// Lines of stderr kept in a failure report.
const STDERR_TAIL_LINES: usize = 20;

fn spawn_error(tool: &str, program: &Path, e: std::io::Error) -> ConverterError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ConverterError::ToolNotFound {
            tool: tool.to_string(),
            path: program.to_path_buf(),
        }
    } else {
        ConverterError::Io(e)
    }
}

fn stderr_tail(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    Some(lines[start..].join("\n"))
}

/// Runs `program` to completion. A non-zero exit becomes
/// [`ConverterError::ConversionFailed`] carrying the tail of stderr.
///
/// The child is killed if the returned future is dropped, so an outer
/// timeout stops the tool as well.
pub(crate) async fn run_tool(
    tool: &str,
    program: &Path,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<(), ConverterError> {
    debug!("Running {} {}", program.display(), args.join(" "));

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let child = command
        .spawn()
        .map_err(|e| spawn_error(tool, program, e))?;
    let output = child.wait_with_output().await?;

    if !output.status.success() {
        return Err(ConverterError::conversion_failed(
            format!("{} exited with code: {:?}", tool, output.status.code()),
            stderr_tail(&output.stderr),
        ));
    }
    Ok(())
}

/// Checks that a tool can be started by asking for its version.
pub(crate) async fn check_tool(
    tool: &str,
    program: &Path,
    version_arg: &str,
) -> Result<(), ConverterError> {
    Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| spawn_error(tool, program, e))?;
    Ok(())
}

/// Confirms the output file exists and reports its size.
pub(crate) async fn finish(
    output_path: &Path,
    started: Instant,
) -> Result<ConversionOutput, ConverterError> {
    let meta = tokio::fs::metadata(output_path)
        .await
        .map_err(|_| ConverterError::OutputMissing {
            path: output_path.to_path_buf(),
        })?;
    if !meta.is_file() {
        return Err(ConverterError::OutputMissing {
            path: output_path.to_path_buf(),
        });
    }
    Ok(ConversionOutput {
        output_path: output_path.to_path_buf(),
        size_bytes: meta.len(),
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Renders a path as a command-line argument.
pub(crate) fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_stderr_tail() {
        assert_eq!(stderr_tail(b""), None);
        assert_eq!(stderr_tail(b"\n  \n"), None);

        let many: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(many.as_bytes()).unwrap();
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let program = PathBuf::from("/nonexistent/definitely-not-a-tool");
        let err = run_tool("fake", &program, &[], None).await.unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { .. }));

        let err = check_tool("fake", &program, "--version").await.unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_finish_missing_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = finish(&dir.path().join("nope.png"), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::OutputMissing { .. }));

        let path = dir.path().join("out.png");
        std::fs::write(&path, b"1234").unwrap();
        let out = finish(&path, Instant::now()).await.unwrap();
        assert_eq!(out.size_bytes, 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_conversion_failure() {
        let args = vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()];
        let err = run_tool("sh", Path::new("sh"), &args, None)
            .await
            .unwrap_err();
        match err {
            ConverterError::ConversionFailed { reason, stderr } => {
                assert!(reason.contains("Some(3)"));
                assert_eq!(stderr.as_deref(), Some("broken"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
