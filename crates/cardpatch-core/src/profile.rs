//! Embedded blob layout assumptions
//!
//! The embedded blob is a Unity SerializedFile. A format 22+ header keeps the
//! total file size as a big-endian u64, and the object table that follows
//! stores each object's byte size as a little-endian u32. These offsets apply
//! when the header itself is not recognized (see [`crate::serialized`]).

use serde::{Deserialize, Serialize};

use crate::serialized::SizeField;

/// Width of the header's total-size field (u64, big-endian)
pub const SIZE_FIELD_WIDTH: usize = 8;

/// Width of the metadata sub-payload size field (u32, little-endian)
pub const META_FIELD_WIDTH: usize = 4;

/// Default offset of the total-size field
pub const DEFAULT_SIZE_FIELD_OFFSET: usize = 0x18;

/// Default lower bound of the metadata search window
pub const DEFAULT_METADATA_START: usize = 0x30;

/// Offsets assumed for the embedded blob's header and metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatProfile {
    /// Offset of the 8-byte big-endian total-size field
    pub size_field_offset: usize,
    /// First offset scanned for the 4-byte little-endian sub-payload size
    pub metadata_start: usize,
}

impl Default for FormatProfile {
    fn default() -> Self {
        Self {
            size_field_offset: DEFAULT_SIZE_FIELD_OFFSET,
            metadata_start: DEFAULT_METADATA_START,
        }
    }
}

impl FormatProfile {
    pub fn new(size_field_offset: usize, metadata_start: usize) -> Self {
        Self {
            size_field_offset,
            metadata_start,
        }
    }

    pub fn size_field(&self) -> SizeField {
        SizeField {
            offset: self.size_field_offset,
            width: SIZE_FIELD_WIDTH,
        }
    }
}
