//! Blocking external tool invocation with a timeout

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::CommandError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_STDERR_CHARS: usize = 300;

/// Captured result of a successful invocation
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, waiting at most `timeout`.
///
/// Output is captured through temporary files so a chatty child cannot
/// block on a full pipe while we poll for its exit.
pub fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let io_err = |source| CommandError::Io {
        program: program.to_string(),
        source,
    };

    let mut stdout_file = tempfile::tempfile().map_err(io_err)?;
    let mut stderr_file = tempfile::tempfile().map_err(io_err)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone().map_err(io_err)?))
        .stderr(Stdio::from(stderr_file.try_clone().map_err(io_err)?));
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    debug!("Running {} {}", program, args.join(" "));
    let mut child = command.spawn().map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            CommandError::NotFound {
                program: program.to_string(),
            }
        } else {
            CommandError::Spawn {
                program: program.to_string(),
                source,
            }
        }
    })?;

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CommandError::TimedOut {
                program: program.to_string(),
                timeout,
            });
        }
        sleep(POLL_INTERVAL);
    };

    let stdout = read_all(&mut stdout_file).map_err(io_err)?;
    let stderr = read_all(&mut stderr_file).map_err(io_err)?;

    if !status.success() {
        return Err(CommandError::Failed {
            program: program.to_string(),
            status,
            stderr: summarize_stderr(&stderr),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

fn read_all(file: &mut File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// First non-empty stderr line, shortened for one-line messages
fn summarize_stderr(stderr: &str) -> String {
    let line = stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no error output");

    if line.chars().count() > MAX_STDERR_CHARS {
        let short: String = line.chars().take(MAX_STDERR_CHARS).collect();
        format!("{}...", short)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_stderr() {
        assert_eq!(summarize_stderr("\n  \nFATAL: no such image\nmore\n"), "FATAL: no such image");
        assert_eq!(summarize_stderr(""), "no error output");

        let long = "x".repeat(MAX_STDERR_CHARS + 10);
        assert_eq!(summarize_stderr(&long).len(), MAX_STDERR_CHARS + 3);
    }

    #[test]
    fn test_missing_program() {
        let err =
            run("definitely-not-a-real-tool-xyz", &[], None, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout() {
        let output = run("sh", &["-c", "echo hello"], None, Duration::from_secs(10)).unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_reports_stderr() {
        let script = ["-c", "echo boom >&2; exit 3"];
        let err = run("sh", &script, None, Duration::from_secs(10)).unwrap_err();
        match err {
            CommandError::Failed { stderr, status, .. } => {
                assert_eq!(stderr, "boom");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let err = run("sleep", &["5"], None, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }
}
