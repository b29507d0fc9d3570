//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod hex_utils;
pub mod hexdump;
pub mod inspect;
pub mod locate;
pub mod patch;
pub mod rebuild;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// Write `data` to `path`, creating parent directories as needed
pub fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
