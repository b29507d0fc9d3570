//! Inspect command implementation.
//!
//! Prints container header fields followed by an entry table, or the same
//! data as JSON. Blob entries whose payload starts with a serialized-file
//! header get an extra line with its fields.

use std::path::Path;

use anyhow::{Context, Result};
use cardpatch_core::{ContainerSummary, open_container};

/// Run the inspect command
pub fn run(bundle: &Path, json: bool, raw: bool) -> Result<()> {
    let container = open_container(bundle, raw)
        .with_context(|| format!("Failed to open {}", bundle.display()))?;
    let summary = ContainerSummary::from_container(container.as_ref());

    if json {
        println!("{}", summary.to_json()?);
    } else {
        for line in render_table(&summary) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn render_table(summary: &ContainerSummary) -> Vec<String> {
    let mut lines = vec![format!("Format: {}", summary.format)];
    let width = summary
        .properties
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0);
    for property in &summary.properties {
        lines.push(format!("  {:<width$}  {}", property.name, property.value));
    }

    lines.push(String::new());
    lines.push(format!("Entries ({}):", summary.entries.len()));
    lines.push(format!("  {:>3}  {:<8}  {:>10}  {:>6}  path", "#", "kind", "size", "flags"));
    for entry in &summary.entries {
        lines.push(format!(
            "  {:>3}  {:<8}  {:>10}  {:>#6x}  {}",
            entry.index,
            entry.kind.to_string(),
            entry.size,
            entry.flags,
            entry.path
        ));
        if let Some(header) = &entry.serialized {
            lines.push(format!(
                "       serialized v{} ({}), unity {}, file size {}, metadata {}, data at 0x{:X}",
                header.version,
                header.layout,
                header.unity_version.as_deref().unwrap_or("?"),
                header.file_size,
                header.metadata_size,
                header.data_offset
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardpatch_core::RawFile;

    #[test]
    fn test_render_table() {
        let raw = RawFile::new("CAB-1234", vec![0u8; 42]);
        let lines = render_table(&ContainerSummary::from_container(&raw));

        assert_eq!(lines[0], "Format: raw");
        assert_eq!(lines[1], "  size  42");
        assert_eq!(lines[3], "Entries (1):");
        let row = lines.last().unwrap();
        assert!(row.contains("blob"));
        assert!(row.contains("42"));
        assert!(row.ends_with("CAB-1234"));
    }

    #[test]
    fn test_render_serialized_header_line() {
        let mut blob = vec![0u8; 0x60];
        blob[0x08..0x0C].copy_from_slice(&22u32.to_be_bytes());
        blob[0x14..0x18].copy_from_slice(&0x10u32.to_be_bytes());
        blob[0x18..0x20].copy_from_slice(&0x60u64.to_be_bytes());
        blob[0x20..0x28].copy_from_slice(&0x50u64.to_be_bytes());
        blob[0x30..0x3C].copy_from_slice(b"2022.3.10f1\0");
        let raw = RawFile::new("CAB-5678", blob);
        let lines = render_table(&ContainerSummary::from_container(&raw));

        assert!(lines[lines.len() - 2].ends_with("CAB-5678"));
        assert_eq!(
            lines.last().unwrap().trim(),
            "serialized v22 (large), unity 2022.3.10f1, file size 96, metadata 16, data at 0x50"
        );
    }
}
