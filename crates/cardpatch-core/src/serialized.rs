//! Unity SerializedFile header
//!
//! ```text
//! legacy (version < 22)            large (version >= 22)
//! 0x00 metadata size u32           0x00 zero u32
//! 0x04 file size     u32           0x04 zero u32
//! 0x08 version       u32           0x08 version u32
//! 0x0C data offset   u32           0x0C zero u32
//! 0x10 endianness u8, 3 reserved   0x10 endianness u8, 3 reserved
//! 0x14 unity version\0             0x14 metadata size u32
//!                                  0x18 file size     u64
//!                                  0x20 data offset   u64
//!                                  0x28 reserved      u64
//!                                  0x30 unity version\0
//! ```
//!
//! Header integers are big-endian. The version sits at 0x08 in both layouts,
//! which is what decides where the file size lives. A blob whose header does
//! not pass the range checks falls back to the [`FormatProfile`] offsets.

use std::ops::Range;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::debug;

use crate::container::ByteReader;
use crate::container::text::bytes_to_text;
use crate::profile::FormatProfile;

/// First version with the 64-bit header
pub const LARGE_HEADER_VERSION: u32 = 22;

const LEGACY_HEADER_LEN: usize = 0x14;
const LARGE_HEADER_LEN: usize = 0x30;

const MAX_VERSION: u32 = 100;
const MAX_METADATA_SIZE: u64 = 100_000;
const MAX_FILE_SIZE: u64 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, IntoStaticStr, Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum HeaderLayout {
    /// 32-bit sizes, before version 22
    Legacy,
    /// 64-bit sizes, version 22 and later
    Large,
}

/// A big-endian unsigned size field inside the blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeField {
    pub offset: usize,
    /// 4 or 8 bytes
    pub width: usize,
}

impl SizeField {
    pub fn end(&self) -> usize {
        self.offset + self.width
    }

    pub fn read(&self, blob: &[u8]) -> Option<u64> {
        let bytes = blob.get(self.offset..self.end())?;
        match self.width {
            4 => Some(u32::from_be_bytes(bytes.try_into().ok()?) as u64),
            8 => Some(u64::from_be_bytes(bytes.try_into().ok()?)),
            _ => None,
        }
    }

    /// Largest value the field can hold
    pub fn max_value(&self) -> u64 {
        if self.width >= 8 {
            u64::MAX
        } else {
            (1u64 << (self.width * 8)) - 1
        }
    }

    /// Write `value`; the caller checks bounds and range
    pub(crate) fn write(&self, blob: &mut [u8], value: u64) {
        let bytes = value.to_be_bytes();
        blob[self.offset..self.end()].copy_from_slice(&bytes[8 - self.width..]);
    }
}

/// Parsed SerializedFile header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerializedHeader {
    pub layout: HeaderLayout,
    pub version: u32,
    pub metadata_size: u64,
    pub file_size: u64,
    pub data_offset: u64,
    pub big_endian: bool,
    pub unity_version: Option<String>,
    /// End of the header, including the version string
    pub header_len: usize,
}

impl SerializedHeader {
    /// Parse and sanity-check the header; `None` when it does not look like one
    pub fn parse(blob: &[u8]) -> Option<Self> {
        let mut reader = ByteReader::new(blob);
        if reader.remaining() < LEGACY_HEADER_LEN {
            return None;
        }

        let metadata_size = reader.read_u32_be().ok()? as u64;
        let file_size = reader.read_u32_be().ok()? as u64;
        let version = reader.read_u32_be().ok()?;
        let data_offset = reader.read_u32_be().ok()? as u64;
        let endianness = reader.read_bytes(4).ok()?[0];

        let mut header = if version >= LARGE_HEADER_VERSION {
            if reader.remaining() < LARGE_HEADER_LEN - LEGACY_HEADER_LEN {
                return None;
            }
            let metadata_size = reader.read_u32_be().ok()? as u64;
            let file_size = reader.read_u64_be().ok()?;
            let data_offset = reader.read_u64_be().ok()?;
            reader.read_u64_be().ok()?;
            Self {
                layout: HeaderLayout::Large,
                version,
                metadata_size,
                file_size,
                data_offset,
                big_endian: endianness == 0,
                unity_version: read_version_string(blob, reader.position()),
                header_len: reader.position(),
            }
        } else {
            Self {
                layout: HeaderLayout::Legacy,
                version,
                metadata_size,
                file_size,
                data_offset,
                big_endian: endianness == 0,
                unity_version: read_version_string(blob, reader.position()),
                header_len: reader.position(),
            }
        };
        if let Some(unity_version) = &header.unity_version {
            header.header_len += unity_version.len() + 1;
        }

        if !header.is_plausible(endianness) {
            debug!("Rejected serialized header candidate: {:?}", header);
            return None;
        }
        Some(header)
    }

    fn is_plausible(&self, endianness: u8) -> bool {
        (1..=MAX_VERSION).contains(&self.version)
            && endianness <= 1
            && self.metadata_size <= MAX_METADATA_SIZE
            && self.file_size <= MAX_FILE_SIZE
            && self.data_offset <= self.file_size
    }

    /// Where this layout keeps the total file size
    pub fn file_size_field(&self) -> SizeField {
        match self.layout {
            HeaderLayout::Legacy => SizeField {
                offset: 0x04,
                width: 4,
            },
            HeaderLayout::Large => SizeField {
                offset: 0x18,
                width: 8,
            },
        }
    }
}

/// Size fields the patcher uses for one blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLayout {
    /// Recognized header; `None` means the profile offsets apply
    pub header: Option<SerializedHeader>,
    pub size_field: SizeField,
    /// First offset scanned for the sub-payload size
    pub metadata_start: usize,
}

impl BlobLayout {
    /// Pick the size fields from the blob's own header, or from `profile`
    pub fn detect(blob: &[u8], profile: &FormatProfile) -> Self {
        let Some(header) = SerializedHeader::parse(blob) else {
            debug!(
                "No serialized header recognized, using size field at 0x{:X}",
                profile.size_field_offset
            );
            return Self {
                header: None,
                size_field: profile.size_field(),
                metadata_start: profile.metadata_start,
            };
        };

        let size_field = header.file_size_field();
        if size_field.offset != profile.size_field_offset {
            debug!(
                "Version {} header keeps its size at 0x{:X}, not the profile's 0x{:X}",
                header.version, size_field.offset, profile.size_field_offset
            );
        }
        Self {
            size_field,
            metadata_start: header.header_len,
            header: Some(header),
        }
    }

    pub fn layout(&self) -> Option<HeaderLayout> {
        self.header.as_ref().map(|h| h.layout)
    }

    /// File size recorded by a recognized header that disagrees with `blob_len`
    pub fn stale_file_size(&self, blob_len: usize) -> Option<u64> {
        self.header
            .as_ref()
            .map(|h| h.file_size)
            .filter(|&size| size != blob_len as u64)
    }

    /// Metadata search window for a sub-payload starting at `payload_offset`
    pub fn metadata_window(&self, payload_offset: usize) -> Range<usize> {
        self.metadata_start..payload_offset.max(self.metadata_start)
    }
}

/// Printable NUL-terminated version string at `start`
fn read_version_string(blob: &[u8], start: usize) -> Option<String> {
    let rest = blob.get(start..)?;
    let len = rest.iter().take(32).position(|&b| b == 0)?;
    let bytes = &rest[..len];
    (!bytes.is_empty() && bytes.iter().all(|b| (0x20..0x7F).contains(b))).then(|| bytes_to_text(bytes))
}
