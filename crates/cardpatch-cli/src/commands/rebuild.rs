//! Rebuild command implementation.
//!
//! Replaces a whole entry payload selected by container path and/or object
//! name. Failures map to distinct exit codes so wrapper scripts can tell a
//! missing bundle from a missing asset.

use std::path::Path;

use anyhow::{Context, Result};
use cardpatch_core::{EntryFilter, Error, open_container, read_input, replace_entry};
use owo_colors::OwoColorize;
use tracing::info;

use super::write_output;

pub const EXIT_UNSUPPORTED: u8 = 2;
pub const EXIT_BUNDLE_MISSING: u8 = 3;
pub const EXIT_ASSET_MISSING: u8 = 4;
pub const EXIT_REBUILD_FAILED: u8 = 5;

/// Error raised before any work when one of the inputs is absent
#[derive(Debug, thiserror::Error)]
enum MissingInput {
    #[error("Bundle not found: {}", .0.display())]
    Bundle(std::path::PathBuf),
    #[error("Asset not found: {}", .0.display())]
    Asset(std::path::PathBuf),
}

/// Run the rebuild command
pub fn run(
    bundle: &Path,
    asset: &Path,
    container_path: Option<String>,
    object_name: Option<String>,
    output: &Path,
    raw: bool,
) -> Result<()> {
    if !bundle.is_file() {
        return Err(MissingInput::Bundle(bundle.to_path_buf()).into());
    }
    if !asset.is_file() {
        return Err(MissingInput::Asset(asset.to_path_buf()).into());
    }

    let mut container = open_container(bundle, raw)
        .with_context(|| format!("Failed to open {}", bundle.display()))?;
    let payload = read_input(asset)?;

    let filter = EntryFilter {
        container: container_path,
        name: object_name,
    };
    let index = replace_entry(container.as_mut(), &filter, payload)?;

    let saved = container.save().context("Failed to save bundle")?;
    write_output(output, &saved)?;
    info!("Rebuilt bundle written to {}", output.display());

    println!(
        "{} Replaced entry #{} {} -> {}",
        "✓".green(),
        index,
        container.entries()[index].path,
        output.display()
    );
    Ok(())
}

/// Exit code for a failed rebuild
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(missing) = cause.downcast_ref::<MissingInput>() {
            return match missing {
                MissingInput::Bundle(_) => EXIT_BUNDLE_MISSING,
                MissingInput::Asset(_) => EXIT_ASSET_MISSING,
            };
        }
        if let Some(e) = cause.downcast_ref::<Error>() {
            return if e.is_unsupported() {
                EXIT_UNSUPPORTED
            } else {
                EXIT_REBUILD_FAILED
            };
        }
    }
    EXIT_REBUILD_FAILED
}
