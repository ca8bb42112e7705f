//! Error taxonomy for the build engine.
//!
//! Every error carries a stable tag (the variant itself) plus enough context
//! to render the one-line diagnostic described by the error handling design:
//! tag, target name, and a captured stderr tail where applicable.

use std::path::PathBuf;

use crate::pal::ExecResult;

pub type Result<T, E = AriaError> = std::result::Result<T, E>;

/// Maximum number of bytes of a captured stream kept in a diagnostic.
pub const STDERR_TAIL_CAP: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AriaError {
    #[error("manifest error: {detail}")]
    Manifest { detail: String },

    #[error("cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("dirty analysis failed for `{target}`: {detail}")]
    DirtyAnalysis { target: String, detail: String },

    #[error("toolchain missing for `{target}`: {binary}")]
    ToolchainMissing { target: String, binary: PathBuf },

    #[error("`{target}` failed (exit {code}){}", tail_suffix(.stderr_tail))]
    SubprocessFailure { target: String, code: i32, stderr_tail: String },

    #[error("`{target}` timed out{}", tail_suffix(.stderr_tail))]
    Timeout { target: String, stderr_tail: String },

    #[error("state store corrupted, continuing with empty state: {detail}")]
    StateCorruption { detail: String },

    #[error("io error for `{target}`: {source}")]
    Io { target: String, #[source] source: std::io::Error },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

fn tail_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("\n{tail}")
    }
}

impl AriaError {
    pub fn io(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { target: target.into(), source }
    }

    pub fn manifest(detail: impl Into<String>) -> Self {
        Self::Manifest { detail: detail.into() }
    }

    /// Builds a `subprocess_failure`/`timeout` error from a PAL result, truncating the
    /// captured stderr to [`STDERR_TAIL_CAP`] bytes as described in the error design.
    pub fn from_exec(target: impl Into<String>, result: &ExecResult) -> Self {
        let target = target.into();
        let tail = tail_of(&result.stderr, STDERR_TAIL_CAP);
        if result.timed_out {
            Self::Timeout { target, stderr_tail: tail }
        } else {
            Self::SubprocessFailure { target, code: result.exit_code, stderr_tail: tail }
        }
    }

    /// The stable tag string used in the one-line diagnostic and in tests.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Manifest { .. } => "manifest",
            Self::Cycle { .. } => "cycle",
            Self::DirtyAnalysis { .. } => "dirty_analysis",
            Self::ToolchainMissing { .. } => "toolchain_missing",
            Self::SubprocessFailure { .. } => "subprocess_failure",
            Self::Timeout { .. } => "timeout",
            Self::StateCorruption { .. } => "state_corruption",
            Self::Io { .. } => "io",
            Self::Cancelled => "cancelled",
            Self::Serde(_) => "io",
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Self::DirtyAnalysis { target, .. }
            | Self::ToolchainMissing { target, .. }
            | Self::SubprocessFailure { target, .. }
            | Self::Timeout { target, .. }
            | Self::Io { target, .. } => Some(target),
            _ => None,
        }
    }
}

fn tail_of(bytes: &[u8], cap: usize) -> String {
    let start = bytes.len().saturating_sub(cap);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}
