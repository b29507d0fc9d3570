//! Patch command implementation.
//!
//! Locates the original asset bytes inside the bundle, splices in the new
//! asset, saves the bundle and optionally re-opens it to verify the result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cardpatch_core::{
    Config, EntryFilter, HeaderUpdate, PatchOutcome, Strategy, apply_patch, open_container,
    read_input, verify_saved,
};
use owo_colors::OwoColorize;
use tracing::{info, warn};

use super::write_output;

pub struct PatchPaths {
    pub original_bundle: PathBuf,
    pub original_asset: PathBuf,
    pub new_asset: PathBuf,
    pub output_bundle: PathBuf,
}

/// Run the patch command
pub fn run(
    paths: &PatchPaths,
    expected_entry: Option<String>,
    strategy: Strategy,
    verify: bool,
    markers: Vec<String>,
    config: &Config,
    raw: bool,
) -> Result<()> {
    let mut container = open_container(&paths.original_bundle, raw)
        .with_context(|| format!("Failed to open {}", paths.original_bundle.display()))?;
    info!(
        "Loaded {} with {} entries",
        paths.original_bundle.display(),
        container.entries().len()
    );

    let original = read_input(&paths.original_asset)?;
    let replacement = read_input(&paths.new_asset)?;
    info!(
        "Original asset {} bytes, new asset {} bytes",
        original.len(),
        replacement.len()
    );

    let filter = expected_entry.map(EntryFilter::by_name).unwrap_or_default();
    let outcome = apply_patch(
        container.as_mut(),
        &original,
        &replacement,
        strategy,
        &filter,
        &config.locate,
        &config.profile,
    )?;

    let saved = container.save().context("Failed to save bundle")?;
    write_output(&paths.output_bundle, &saved)?;

    for line in summary_lines(&outcome) {
        println!("{}", line);
    }
    println!(
        "{} Wrote {} ({} bytes)",
        "✓".green(),
        paths.output_bundle.display(),
        saved.len()
    );

    if verify && config.verify.enabled {
        let mut all_markers = config.verify.markers.clone();
        all_markers.extend(markers);
        let report = verify_saved(container.as_ref(), saved, &replacement, &all_markers);
        if report.is_clean() {
            info!("Verification passed");
        }
        for issue in &report.issues {
            warn!("Verification: {}", issue);
            println!("{} {}", "warning:".yellow(), issue);
        }
    }

    Ok(())
}

fn summary_lines(outcome: &PatchOutcome) -> Vec<String> {
    let location = &outcome.location;
    let mut lines = vec![format!(
        "Entry #{} {} ({} match)",
        outcome.entry_index, outcome.entry_path, location.strategy
    )];

    let Some(report) = &outcome.report else {
        lines.push(format!("Replaced whole entry ({} bytes)", location.len));
        return lines;
    };

    lines.push(format!(
        "Sub-payload at 0x{:X}: {} -> {} bytes ({:+})",
        report.offset,
        report.old_len,
        report.new_len,
        report.size_delta()
    ));
    match report.header {
        HeaderUpdate::Unchanged => {}
        HeaderUpdate::Written {
            field,
            layout,
            previous,
            current,
        } => {
            let source: &str = layout.map_or("profile", Into::into);
            lines.push(format!(
                "Header size ({} u{} at 0x{:X}): {} -> {}",
                source,
                field.width * 8,
                field.offset,
                previous,
                current
            ));
        }
        HeaderUpdate::TooShort => lines.push("Header size: blob too short, skipped".to_string()),
        HeaderUpdate::OverlapsPayload => {
            lines.push("Header size: field overlaps payload, skipped".to_string())
        }
        HeaderUpdate::LayoutMismatch {
            layout,
            recorded,
            actual,
        } => lines.push(format!(
            "Header size: {} header records {} bytes but blob had {}, skipped",
            layout, recorded, actual
        )),
        HeaderUpdate::TooLarge { field, current } => lines.push(format!(
            "Header size: {} does not fit u{} at 0x{:X}, skipped",
            current,
            field.width * 8,
            field.offset
        )),
    }
    if report.is_resized() {
        match report.metadata_field {
            Some(at) => lines.push(format!("Metadata size field updated at 0x{:X}", at)),
            None => lines.push("Metadata size field not found, left unchanged".to_string()),
        }
    }
    lines
}
