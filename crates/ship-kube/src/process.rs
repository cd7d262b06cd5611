//! External tool execution
//!
//! `helm` and `kubectl` are resolved through a `{TOOL}_BIN` environment variable
//! (for example `HELM_BIN`), falling back to the bare name on `PATH`.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{KubeError, Result};

/// Resolve the program to run for `tool`
pub(crate) fn tool_path(tool: &str) -> String {
    let env_var = format!("{}_BIN", tool.to_uppercase());
    std::env::var(&env_var).unwrap_or_else(|_| tool.to_string())
}

/// Run `program` with `args` and return its stdout
///
/// A non-zero exit becomes [`KubeError::CommandFailed`] carrying the combined output.
pub(crate) async fn run(program: &str, args: &[String]) -> Result<String> {
    tracing::debug!(program, args = %args.join(" "), "running command");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| match source.kind() {
            ErrorKind::NotFound => {
                let tool = Path::new(program)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or(program);
                KubeError::ToolMissing {
                    program: tool.to_string(),
                    hint: format!(
                        "install {} and make sure it is on PATH, or point {}_BIN at it",
                        tool,
                        tool.to_uppercase()
                    ),
                }
            }
            _ => KubeError::CommandSpawn {
                program: program.to_string(),
                source,
            },
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}{}", stdout, stderr);
        return Err(KubeError::CommandFailed {
            program: program.to_string(),
            args: args.join(" "),
            output: combined.trim().to_string(),
        });
    }

    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_path_falls_back_to_name() {
        assert_eq!(tool_path("ship-test-tool-without-override"), "ship-test-tool-without-override");
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let err = run("/nonexistent/bin/helm", &[]).await.unwrap_err();
        assert!(matches!(err, KubeError::ToolMissing { ref program, .. } if program == "helm"));
        assert!(err.to_string().contains("HELM_BIN"));
    }

    #[tokio::test]
    async fn test_failed_command_carries_output() {
        let args = vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()];
        let err = run("sh", &args).await.unwrap_err();
        match err {
            KubeError::CommandFailed { program, output, .. } => {
                assert_eq!(program, "sh");
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
