//! Sub-payload splicing with size-field correction
//!
//! A replacement of the same length is written in place. A replacement of a
//! different length shifts everything after it, so the blob's total-size
//! header field and the sub-payload's size field in the metadata region are
//! rewritten to match. Where those fields live comes from the blob's own
//! SerializedFile header when it is recognized, and from the
//! [`FormatProfile`] otherwise. A size field that cannot be found is
//! reported, not treated as an error: the container writer regenerates its
//! own tables.

use memchr::memmem;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::profile::{FormatProfile, META_FIELD_WIDTH};
use crate::serialized::{BlobLayout, HeaderLayout, SerializedHeader, SizeField};

/// Outcome of the total-size header update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeaderUpdate {
    /// Lengths were equal, nothing to rewrite
    Unchanged,
    /// Field rewritten; `layout` is `None` when the profile offset was used
    Written {
        field: SizeField,
        layout: Option<HeaderLayout>,
        previous: u64,
        current: u64,
    },
    /// Blob shorter than the header field
    TooShort,
    /// Field would land inside the inserted sub-payload
    OverlapsPayload,
    /// Recognized header records a size other than the blob's length
    LayoutMismatch { layout: HeaderLayout, recorded: u64, actual: u64 },
    /// New length does not fit the field
    TooLarge { field: SizeField, current: u64 },
}

/// What the patcher changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub offset: usize,
    pub old_len: usize,
    pub new_len: usize,
    pub blob_len_before: usize,
    pub blob_len_after: usize,
    pub header: HeaderUpdate,
    /// Offset of the rewritten metadata size field
    pub metadata_field: Option<usize>,
    /// SerializedFile header found before patching
    pub serialized: Option<SerializedHeader>,
}

impl PatchReport {
    /// Signed length change of the blob
    pub fn size_delta(&self) -> i64 {
        self.new_len as i64 - self.old_len as i64
    }

    pub fn is_resized(&self) -> bool {
        self.old_len != self.new_len
    }
}

/// Patched blob together with its report
#[derive(Debug, Clone)]
pub struct Patched {
    pub data: Vec<u8>,
    pub report: PatchReport,
}

/// Replace `old_len` bytes at `offset` in `blob` with `replacement`.
///
/// Only an out-of-range `offset`/`old_len` pair is an error.
pub fn patch_blob(
    mut blob: Vec<u8>,
    offset: usize,
    old_len: usize,
    replacement: &[u8],
    profile: &FormatProfile,
) -> Result<Patched> {
    let blob_len_before = blob.len();
    let end = offset
        .checked_add(old_len)
        .filter(|&end| end <= blob_len_before)
        .ok_or(Error::InvalidRange {
            offset,
            len: old_len,
            blob_len: blob_len_before,
        })?;
    let new_len = replacement.len();
    let layout = BlobLayout::detect(&blob, profile);

    if new_len == old_len {
        blob[offset..end].copy_from_slice(replacement);
        debug!("Replaced {} bytes in place at 0x{:X}", new_len, offset);
        return Ok(Patched {
            report: PatchReport {
                offset,
                old_len,
                new_len,
                blob_len_before,
                blob_len_after: blob.len(),
                header: HeaderUpdate::Unchanged,
                metadata_field: None,
                serialized: layout.header,
            },
            data: blob,
        });
    }

    blob.splice(offset..end, replacement.iter().copied());
    debug!(
        "Spliced sub-payload at 0x{:X}: {} -> {} bytes",
        offset, old_len, new_len
    );

    let header = write_total_size(&mut blob, offset, new_len, blob_len_before, &layout);
    let metadata_field = rewrite_metadata_size(&mut blob, offset, old_len, new_len, &layout);

    Ok(Patched {
        report: PatchReport {
            offset,
            old_len,
            new_len,
            blob_len_before,
            blob_len_after: blob.len(),
            header,
            metadata_field,
            serialized: layout.header,
        },
        data: blob,
    })
}

fn write_total_size(
    blob: &mut [u8],
    payload_offset: usize,
    payload_len: usize,
    len_before: usize,
    layout: &BlobLayout,
) -> HeaderUpdate {
    if let (Some(header), Some(recorded)) = (&layout.header, layout.stale_file_size(len_before)) {
        warn!(
            "Version {} header records {} bytes but the blob had {}; header size left as is",
            header.version, recorded, len_before
        );
        return HeaderUpdate::LayoutMismatch {
            layout: header.layout,
            recorded,
            actual: len_before as u64,
        };
    }

    let field = layout.size_field;
    let Some(previous) = field.read(blob) else {
        debug!("Blob too short for size field at 0x{:X}", field.offset);
        return HeaderUpdate::TooShort;
    };
    if field.offset < payload_offset + payload_len && payload_offset < field.end() {
        debug!("Size field at 0x{:X} overlaps the sub-payload", field.offset);
        return HeaderUpdate::OverlapsPayload;
    }

    let current = blob.len() as u64;
    if current > field.max_value() {
        warn!(
            "Blob length {} does not fit the {}-byte size field at 0x{:X}",
            current, field.width, field.offset
        );
        return HeaderUpdate::TooLarge { field, current };
    }

    field.write(blob, current);
    info!(
        "Updated blob header size at 0x{:X}: {} -> {}",
        field.offset, previous, current
    );
    HeaderUpdate::Written {
        field,
        layout: layout.layout(),
        previous,
        current,
    }
}

fn rewrite_metadata_size(
    blob: &mut [u8],
    payload_offset: usize,
    old_len: usize,
    new_len: usize,
    layout: &BlobLayout,
) -> Option<usize> {
    let (Ok(old), Ok(new)) = (u32::try_from(old_len), u32::try_from(new_len)) else {
        debug!("Sub-payload length exceeds u32, metadata field left as is");
        return None;
    };

    let window = layout.metadata_window(payload_offset);
    let Some(hit) = blob
        .get(window.clone())
        .and_then(|region| find_le_u32(region, old))
    else {
        info!(
            "No metadata size field equal to {} in 0x{:X}..0x{:X}; leaving it to the container writer",
            old_len, window.start, window.end
        );
        return None;
    };

    let at = window.start + hit;
    blob[at..at + META_FIELD_WIDTH].copy_from_slice(&new.to_le_bytes());
    info!("Updated metadata size field at 0x{:X}: {} -> {}", at, old, new);
    Some(at)
}

/// First position of `value` encoded as little-endian u32
pub fn find_le_u32(haystack: &[u8], value: u32) -> Option<usize> {
    memmem::find(haystack, &value.to_le_bytes())
}
