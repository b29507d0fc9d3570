//! Locate command implementation.
//!
//! Runs the locator without modifying anything and reports where the
//! original asset sits, together with the size fields a patch would touch.

use std::path::Path;

use anyhow::{Context, Result};
use cardpatch_core::{
    BlobLayout, Config, EntryFilter, FormatProfile, Location, SerializedHeader, Strategy,
    locate_payload, open_container, patch::find_le_u32, read_input,
};
use serde::Serialize;

use super::hex_utils::format_hex_address;

#[derive(Debug, Serialize)]
struct LocateView {
    entry_path: String,
    entry_size: usize,
    #[serde(flatten)]
    location: Location,
    /// Blob total-size field, when readable
    header_total_size: Option<u64>,
    /// First metadata field holding the payload length
    metadata_field: Option<usize>,
    /// Recognized serialized-file header of the entry
    serialized: Option<SerializedHeader>,
}

impl LocateView {
    fn new(data: &[u8], entry_path: &str, location: Location, profile: &FormatProfile) -> Self {
        let (header_total_size, metadata_field, serialized) = if location.whole_entry {
            (None, None, None)
        } else {
            let layout = BlobLayout::detect(data, profile);
            let window = layout.metadata_window(location.offset);
            let field = u32::try_from(location.len).ok().and_then(|len| {
                data.get(window.clone())
                    .and_then(|region| find_le_u32(region, len))
                    .map(|hit| window.start + hit)
            });
            (layout.size_field.read(data), field, layout.header)
        };
        Self {
            entry_path: entry_path.to_string(),
            entry_size: data.len(),
            location,
            header_total_size,
            metadata_field,
            serialized,
        }
    }

    fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Entry #{} {} ({} bytes)",
                self.location.entry_index, self.entry_path, self.entry_size
            ),
            format!(
                "Match: {} at {} ({} bytes{})",
                self.location.strategy,
                format_hex_address(self.location.offset),
                self.location.len,
                if self.location.whole_entry { ", whole entry" } else { "" }
            ),
        ];
        if let Some(header) = &self.serialized {
            lines.push(format!(
                "Serialized header: v{} ({}), unity {}",
                header.version,
                header.layout,
                header.unity_version.as_deref().unwrap_or("?")
            ));
        }
        if let Some(total) = self.header_total_size {
            lines.push(format!("Header size field: {}", total));
        }
        if !self.location.whole_entry {
            lines.push(match self.metadata_field {
                Some(at) => format!("Metadata size field: {}", format_hex_address(at)),
                None => "Metadata size field: not found".to_string(),
            });
        }
        lines
    }
}

/// Run the locate command
pub fn run(
    bundle: &Path,
    original_asset: &Path,
    strategy: Strategy,
    entry: Option<String>,
    json: bool,
    config: &Config,
    raw: bool,
) -> Result<()> {
    let container = open_container(bundle, raw)
        .with_context(|| format!("Failed to open {}", bundle.display()))?;
    let needle = read_input(original_asset)?;
    let filter = entry.map(EntryFilter::by_name).unwrap_or_default();

    let location = locate_payload(
        container.entries(),
        &needle,
        strategy,
        &filter,
        &config.locate,
    )?;
    let target = &container.entries()[location.entry_index];
    let view = LocateView::new(&target.data, &target.path, location, &config.profile);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        for line in view.lines() {
            println!("{}", line);
        }
    }
    Ok(())
}
