//! Toolchain identity: the compiler binary's path and self-reported version.
//!
//! Grounded in the teacher's `Solc::version`/`RELEASES` memoization: probing
//! `--version` is cheap but not free, and every target sharing a compiler
//! binary should pay for it once per build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AriaError, Result};
use crate::pal::{self, ExecOptions};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolchainInfo {
    pub binary: PathBuf,
    /// Trimmed, verbatim `--version` stdout. Part of every command digest:
    /// a compiler upgrade invalidates every record for that binary.
    pub version_string: String,
}

impl ToolchainInfo {
    /// Invokes `<binary> --version` and captures stdout verbatim, trimmed.
    pub fn probe(binary: &Path) -> Result<Self> {
        let result = pal::execute(binary, &["--version".into()], &ExecOptions::default())
            .map_err(|e| match e {
                AriaError::ToolchainMissing { binary, .. } => {
                    AriaError::ToolchainMissing { target: String::new(), binary }
                }
                other => other,
            })?;
        if !result.success() {
            return Err(AriaError::from_exec(binary.display().to_string(), &result));
        }
        let version_string = String::from_utf8_lossy(&result.stdout).trim().to_string();
        Ok(Self { binary: binary.to_path_buf(), version_string })
    }
}

/// Caches one [`ToolchainInfo`] per distinct compiler binary path for the
/// lifetime of a single [`crate::build::Build`].
#[derive(Default)]
pub struct ToolchainCache {
    by_binary: Mutex<HashMap<PathBuf, ToolchainInfo>>,
}

impl ToolchainCache {
    pub fn get_or_probe(&self, binary: &Path) -> Result<ToolchainInfo> {
        if let Some(info) = self.by_binary.lock().unwrap().get(binary) {
            return Ok(info.clone());
        }
        let info = ToolchainInfo::probe(binary)?;
        self.by_binary.lock().unwrap().insert(binary.to_path_buf(), info.clone());
        Ok(info)
    }
}
