//! Hexdump command implementation.
//!
//! Displays raw bytes of a file, or of one entry inside a bundle, in
//! traditional hexdump format. Useful for checking the blob header and the
//! metadata size fields around a patched sub-payload.
//!
//! # Output Format
//!
//! ```text
//! 0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use cardpatch_core::{EntryFilter, open_container, read_input};

/// Run the hexdump command
pub fn run(
    file: &Path,
    entry: Option<&str>,
    offset: u64,
    size: usize,
    ascii: bool,
    raw: bool,
) -> Result<()> {
    let (label, data) = match entry {
        Some(name) => {
            let container = open_container(file, raw)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let filter = EntryFilter::by_name(name);
            let Some(found) = container.entries().iter().find(|e| filter.matches(e)) else {
                bail!("No entry named {} in {}", name, file.display());
            };
            (found.path.clone(), found.data.clone())
        }
        None => (file.display().to_string(), read_input(file)?),
    };

    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    if start > data.len() {
        bail!(
            "Offset 0x{:X} is past the end of {} ({} bytes)",
            offset,
            label,
            data.len()
        );
    }
    let end = start.saturating_add(size).min(data.len());
    let bytes = &data[start..end];

    println!("Hexdump of {} at 0x{:X} ({} bytes):", label, offset, bytes.len());
    println!();
    for line in format_lines(bytes, start, ascii) {
        println!("{}", line);
    }

    Ok(())
}

fn format_lines(bytes: &[u8], base: usize, ascii: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(bytes.len().div_ceil(16));

    for (i, chunk) in bytes.chunks(16).enumerate() {
        let mut line = format!("0x{:03X}: ", base + i * 16);

        // Hex bytes
        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                line.push(' ');
            }
            line.push_str(&format!("{:02X} ", byte));
        }

        // Padding for incomplete lines
        for j in chunk.len()..16 {
            if j == 8 {
                line.push(' ');
            }
            line.push_str("   ");
        }

        // ASCII representation
        if ascii {
            line.push_str(" |");
            for byte in chunk {
                if (0x20..0x7F).contains(byte) {
                    line.push(*byte as char);
                } else {
                    line.push('.');
                }
            }
            for _ in chunk.len()..16 {
                line.push(' ');
            }
            line.push('|');
        }

        lines.push(line.trim_end().to_string());
    }

    lines
}
