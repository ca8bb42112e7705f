//! Process executor (PAL): cross-platform subprocess spawn with mandatory
//! non-blocking stdout/stderr drain and optional timeout.
//!
//! Pipe-deadlock avoidance is mandatory: two dedicated threads drain stdout
//! and stderr to EOF concurrently, independent of wait(). Draining from the
//! thread that also waits on the child is the one pattern the design notes
//! forbid outright — a child that fills both pipe buffers before exiting
//! would deadlock against a parent blocked in `wait()`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{AriaError, Result};

#[derive(Clone, Debug, Default)]
pub struct ExecOptions {
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub env: Option<Vec<(String, String)>>,
}

#[derive(Debug)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub wall_time: Duration,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Polling interval used while waiting out a timeout. Short enough to keep
/// the reported wall time close to the child's actual finish time, coarse
/// enough not to burn a core busy-waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn execute(binary: &Path, argv: &[String], options: &ExecOptions) -> Result<ExecResult> {
    let start = Instant::now();

    let mut cmd = Command::new(binary);
    cmd.args(argv);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if let Some(dir) = &options.working_dir {
        cmd.current_dir(dir);
    }
    if let Some(env) = &options.env {
        cmd.env_clear();
        cmd.envs(env.iter().cloned());
    }

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AriaError::ToolchainMissing { target: String::new(), binary: binary.to_path_buf() }
        } else {
            AriaError::io(binary.display().to_string(), e)
        }
    })?;

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

    let stdout_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        buf
    });
    let stderr_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf);
        buf
    });

    let mut timed_out = false;
    let status = match options.timeout {
        None => child.wait().map_err(|e| AriaError::io(binary.display().to_string(), e))?,
        Some(timeout) => loop {
            if let Some(status) =
                child.try_wait().map_err(|e| AriaError::io(binary.display().to_string(), e))?
            {
                break status;
            }
            if start.elapsed() >= timeout {
                timed_out = true;
                // Graceful-then-force: std gives us only `kill`, so the
                // "graceful termination" step is a short grace window on
                // top of a fresh `try_wait` before the hard kill.
                std::thread::sleep(POLL_INTERVAL);
                if child.try_wait().ok().flatten().is_none() {
                    let _ = child.kill();
                }
                break child.wait().map_err(|e| AriaError::io(binary.display().to_string(), e))?;
            }
            std::thread::sleep(POLL_INTERVAL);
        },
    };

    // Always join both drain threads before returning, win or lose.
    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    let exit_code = exit_code_of(&status, timed_out);

    Ok(ExecResult { exit_code, stdout, stderr, timed_out, wall_time: start.elapsed() })
}

#[cfg(unix)]
fn exit_code_of(status: &std::process::ExitStatus, timed_out: bool) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
        128 + signal
    } else if timed_out {
        128 + 9
    } else {
        status.code().unwrap_or(-1)
    }
}

#[cfg(not(unix))]
fn exit_code_of(status: &std::process::ExitStatus, timed_out: bool) -> i32 {
    if timed_out {
        128 + 9
    } else {
        status.code().unwrap_or(-1)
    }
}

/// Builds a single command-line string from `binary` + `argv` using the
/// quoting rules PE/COFF-style argv parsing requires: the binary is quoted
/// if it contains whitespace, each argument with whitespace is quoted, and a
/// run of backslashes immediately before a quote (or at the end of a quoted
/// argument) is doubled so the receiving parser doesn't eat them.
pub fn quote_command_line(binary: &str, argv: &[String]) -> String {
    let mut parts = Vec::with_capacity(argv.len() + 1);
    parts.push(quote_arg(binary));
    parts.extend(argv.iter().map(|a| quote_arg(a)));
    parts.join(" ")
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => {
                backslashes += 1;
            }
            '"' => {
                out.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(std::iter::repeat('\\').take(backslashes));
                backslashes = 0;
                out.push(c);
            }
        }
    }
    out.extend(std::iter::repeat('\\').take(backslashes * 2));
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn script(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh\n{body}").unwrap();
        drop(f);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        (dir, path)
    }

    #[test]
    #[cfg(unix)]
    fn captures_exit_code_and_streams() {
        let (_dir, path) = script("echo out; echo err 1>&2; exit 3");
        let result = execute(&path, &[], &ExecOptions::default()).unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(String::from_utf8_lossy(&result.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&result.stderr).trim(), "err");
        assert!(!result.timed_out);
    }

    #[test]
    #[cfg(unix)]
    fn missing_binary_is_toolchain_missing() {
        let err = execute(Path::new("/no/such/aria-cc"), &[], &ExecOptions::default()).unwrap_err();
        assert!(matches!(err, AriaError::ToolchainMissing { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn large_dual_stream_output_does_not_deadlock() {
        let (_dir, path) = script(
            "yes A | head -c 4194304; yes B | head -c 4194304 1>&2",
        );
        let start = Instant::now();
        let result = execute(&path, &[], &ExecOptions::default()).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.len(), 4 * 1024 * 1024);
        assert_eq!(result.stderr.len(), 4 * 1024 * 1024);
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[test]
    #[cfg(unix)]
    fn timeout_kills_and_marks_timed_out() {
        let (_dir, path) = script("sleep 5");
        let result = execute(
            &path,
            &[],
            &ExecOptions { timeout: Some(Duration::from_millis(200)), ..Default::default() },
        )
        .unwrap();
        assert!(result.timed_out);
    }

    #[test]
    fn quote_command_line_quotes_whitespace_and_doubles_backslashes() {
        let line = quote_command_line("c:\\aria cc.exe", &["a b".to_string(), "plain".to_string()]);
        assert_eq!(line, "\"c:\\aria cc.exe\" \"a b\" plain");

        // A quoted argument ending in a backslash must have that backslash
        // doubled so the receiving argv parser doesn't treat it as escaping
        // the closing quote.
        let line = quote_command_line("cc", &["has space\\".to_string()]);
        assert!(line.ends_with("\\\\\""));
        assert!(line.starts_with("cc \"has space"));
    }
}
