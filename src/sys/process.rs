//! External tool invocation: executable resolution and bounded-time
//! subprocess runs. A timed-out child is killed, never abandoned, so no
//! zombie processes or open descriptors leak.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("failed to spawn {tool}: {source}")]
    Spawn { tool: String, source: io::Error },
    #[error("{tool} did not exit within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
    #[error("{tool} exited with {status}: {stderr}")]
    Exit {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Find `name` by searching the fixed priority directories first, then the
/// entries of `PATH`; first executable match wins.
pub fn find_executable(name: &str, priority_dirs: &[&str]) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> =
        priority_dirs.iter().map(|dir| Path::new(dir).join(name)).collect();
    if let Some(path_var) = std::env::var_os("PATH") {
        candidates.extend(std::env::split_paths(&path_var).map(|dir| dir.join(name)));
    }
    candidates.into_iter().find(|candidate| is_executable(candidate))
}

pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Run `program` and wait for it to exit, bounded by `limit`. The wait races
/// against the timeout; on timeout the child is forcibly terminated and the
/// call fails. Non-zero exit is failure, with captured stderr in the error.
pub async fn run_with_timeout(
    program: &Path,
    args: &[&str],
    limit: Duration,
) -> Result<(), ToolFailure> {
    let tool = program.display().to_string();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolFailure::Spawn { tool: tool.clone(), source })?;
    let mut stderr = child.stderr.take();

    // Drain stderr while waiting, not after: a child that fills the pipe
    // buffer would otherwise block on its own writes and never exit.
    let waited = tokio::time::timeout(limit, async {
        let mut captured = String::new();
        let drain = async {
            if let Some(pipe) = stderr.as_mut() {
                let _ = pipe.read_to_string(&mut captured).await;
            }
        };
        let (status, ()) = tokio::join!(child.wait(), drain);
        io::Result::Ok((status?, captured))
    })
    .await;

    match waited {
        Ok(Ok((status, captured))) if status.success() => {
            let captured = captured.trim();
            if !captured.is_empty() {
                debug!(tool, stderr = captured, "tool wrote to stderr");
            }
            Ok(())
        }
        Ok(Ok((status, captured))) => Err(ToolFailure::Exit {
            tool,
            status,
            stderr: captured.trim().to_string(),
        }),
        Ok(Err(source)) => Err(ToolFailure::Spawn { tool, source }),
        Err(_elapsed) => {
            if let Err(err) = child.start_kill() {
                warn!(tool, %err, "could not kill timed-out child");
            }
            let _ = child.wait().await;
            Err(ToolFailure::Timeout { tool, timeout: limit })
        }
    }
}
