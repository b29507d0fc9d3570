//! UnityFS AssetBundle reader/writer
//!
//! # Layout
//!
//! ```text
//! "UnityFS\0" | format u32 | player str\0 | engine str\0
//! total size u64 | block info compressed u32 | uncompressed u32 | flags u32
//! [align 16 for format >= 7]
//! block info (or at end of file when flags & 0x80)
//! [align 16 when flags & 0x200 on newer engines]
//! data blocks
//! ```
//!
//! Block info: 16-byte hash, block count, `(uncompressed u32, compressed u32,
//! flags u16)` per block, node count, `(offset i64, size i64, flags u32, path\0)`
//! per node. Node offsets index the concatenated, decompressed block stream.
//! All integers are big-endian.
//!
//! The whole bundle is held in memory; each node becomes one [`Entry`].

use serde::Serialize;
use tracing::{debug, info};

use super::compression::{self, Compression, COMPRESSION_MASK};
use super::reader::{ByteReader, pad_to};
use super::{Container, ContainerFormat, Entry, EntryKind};
use crate::error::{Error, Result};

pub(super) const SIGNATURE: &[u8] = b"UnityFS\0";

const FLAG_BLOCKS_AND_DIR: u32 = 0x40;
const FLAG_BLOCKS_INFO_AT_END: u32 = 0x80;
const FLAG_BLOCK_INFO_NEED_PADDING: u32 = 0x200;
const FLAG_ENCRYPTION_OLD: u32 = 0x200;
const FLAG_ENCRYPTION_NEW: u32 = 0x1400;

/// Node flag marking a serialized file
const NODE_SERIALIZED_FILE: u32 = 0x4;

/// Data block size used when writing LZ4 blocks
const LZ4_CHUNK_SIZE: usize = 0x0002_0000;

/// Fixed UnityFS header fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleHeader {
    pub format_version: u32,
    pub player_version: String,
    pub engine_version: String,
    pub total_size: u64,
    pub flags: u32,
}

impl BundleHeader {
    pub fn compression(&self) -> Result<Compression> {
        Compression::from_flags(self.flags)
    }

    pub fn block_info_at_end(&self) -> bool {
        self.flags & FLAG_BLOCKS_INFO_AT_END != 0
    }

    fn uses_new_flags(&self) -> bool {
        parse_engine_version(&self.engine_version)
            .map(uses_new_archive_flags)
            .unwrap_or(false)
    }

    fn block_info_needs_padding(&self) -> bool {
        self.uses_new_flags() && self.flags & FLAG_BLOCK_INFO_NEED_PADDING != 0
    }

    fn uses_block_alignment(&self) -> bool {
        self.format_version >= 7
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockInfo {
    uncompressed_size: u32,
    compressed_size: u32,
    flags: u16,
}

#[derive(Debug, Clone)]
pub struct UnityFsBundle {
    header: BundleHeader,
    hash: [u8; 16],
    /// Flags of the first data block, reused for every rewritten block
    block_flags: u16,
    block_count: usize,
    entries: Vec<Entry>,
}

impl UnityFsBundle {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let signature = reader.read_cstring()?;
        if signature != "UnityFS" {
            return Err(Error::UnsupportedFormat(format!(
                "unsupported bundle signature {:?}",
                signature
            )));
        }

        let header = BundleHeader {
            format_version: reader.read_u32_be()?,
            player_version: reader.read_cstring()?,
            engine_version: reader.read_cstring()?,
            total_size: reader.read_u64_be()?,
            flags: 0,
        };
        let compressed_info_size = reader.read_u32_be()? as usize;
        let uncompressed_info_size = reader.read_u32_be()? as usize;
        let header = BundleHeader {
            flags: reader.read_u32_be()?,
            ..header
        };

        debug!(
            "UnityFS header: format={}, player={}, engine={}, size={}, flags=0x{:X}",
            header.format_version,
            header.player_version,
            header.engine_version,
            header.total_size,
            header.flags
        );

        let encryption_flag = if header.uses_new_flags() {
            FLAG_ENCRYPTION_NEW
        } else {
            FLAG_ENCRYPTION_OLD
        };
        if header.flags & encryption_flag != 0 {
            return Err(Error::UnsupportedFormat(
                "encrypted asset bundles are not supported".to_string(),
            ));
        }

        if header.uses_block_alignment() {
            reader.align(16);
        }

        let compressed_info = if header.block_info_at_end() {
            let start = data.len().checked_sub(compressed_info_size).ok_or_else(|| {
                Error::MalformedContainer("block info larger than bundle".to_string())
            })?;
            ByteReader::new(&data[start..]).read_bytes(compressed_info_size)?
        } else {
            reader.read_bytes(compressed_info_size)?
        };
        let info = compression::decompress(
            compressed_info,
            uncompressed_info_size,
            header.compression()?,
        )?;

        let mut info_reader = ByteReader::new(&info);
        let mut hash = [0u8; 16];
        hash.copy_from_slice(info_reader.read_bytes(16)?);

        let block_count = read_count(&mut info_reader, "block")?;
        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            blocks.push(BlockInfo {
                uncompressed_size: info_reader.read_u32_be()?,
                compressed_size: info_reader.read_u32_be()?,
                flags: info_reader.read_u16_be()?,
            });
        }

        let node_count = read_count(&mut info_reader, "node")?;
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let offset = info_reader.read_i64_be()?;
            let size = info_reader.read_i64_be()?;
            let flags = info_reader.read_u32_be()?;
            let path = info_reader.read_cstring()?;
            nodes.push((offset, size, flags, path));
        }

        if header.block_info_needs_padding() {
            reader.align(16);
        }

        let mut stream = Vec::new();
        for (i, block) in blocks.iter().enumerate() {
            let raw = reader.read_bytes(block.compressed_size as usize)?;
            let codec = Compression::from_flags(block.flags as u32)?;
            let chunk = compression::decompress(raw, block.uncompressed_size as usize, codec)
                .map_err(|e| match e {
                    Error::Compression(msg) => Error::Compression(format!("block {}: {}", i, msg)),
                    other => other,
                })?;
            stream.extend_from_slice(&chunk);
        }

        let mut entries = Vec::with_capacity(nodes.len());
        for (offset, size, flags, path) in nodes {
            let range = usize::try_from(offset)
                .ok()
                .zip(usize::try_from(size).ok())
                .and_then(|(start, len)| Some(start..start.checked_add(len)?))
                .filter(|range| range.end <= stream.len())
                .ok_or_else(|| {
                    Error::MalformedContainer(format!(
                        "node {} ({}+{}) outside data stream of {} bytes",
                        path,
                        offset,
                        size,
                        stream.len()
                    ))
                })?;
            let kind = if flags & NODE_SERIALIZED_FILE != 0 {
                EntryKind::Blob
            } else {
                EntryKind::Resource
            };
            debug!("Node {}: {} bytes, flags=0x{:X}, {}", path, size, flags, kind);
            entries.push(Entry {
                path,
                kind,
                flags,
                data: stream[range].to_vec(),
            });
        }

        Ok(Self {
            header,
            hash,
            block_flags: blocks.first().map(|b| b.flags).unwrap_or(0),
            block_count,
            entries,
        })
    }

    pub fn header(&self) -> &BundleHeader {
        &self.header
    }

    fn build_blocks(&self, stream: &[u8]) -> Result<(Vec<BlockInfo>, Vec<u8>)> {
        let codec = Compression::from_flags(self.block_flags as u32)?.for_writing();
        let raw_flags = self.block_flags & !(COMPRESSION_MASK as u16);
        let packed_flags = raw_flags | codec.flag() as u16;

        if !codec.is_lz4() {
            let size = u32::try_from(stream.len()).map_err(|_| {
                Error::UnsupportedFormat(format!(
                    "data too large for a single uncompressed block ({} bytes)",
                    stream.len()
                ))
            })?;
            return Ok((
                vec![BlockInfo {
                    uncompressed_size: size,
                    compressed_size: size,
                    flags: raw_flags,
                }],
                stream.to_vec(),
            ));
        }

        let mut blocks = Vec::new();
        let mut data = Vec::with_capacity(stream.len());
        for chunk in stream.chunks(LZ4_CHUNK_SIZE) {
            let packed = compression::compress(chunk, codec)?;
            if packed.len() >= chunk.len() {
                data.extend_from_slice(chunk);
                blocks.push(BlockInfo {
                    uncompressed_size: chunk.len() as u32,
                    compressed_size: chunk.len() as u32,
                    flags: raw_flags,
                });
            } else {
                data.extend_from_slice(&packed);
                blocks.push(BlockInfo {
                    uncompressed_size: chunk.len() as u32,
                    compressed_size: packed.len() as u32,
                    flags: packed_flags,
                });
            }
        }
        Ok((blocks, data))
    }

    fn build_block_info(&self, blocks: &[BlockInfo]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&(blocks.len() as i32).to_be_bytes());
        for block in blocks {
            out.extend_from_slice(&block.uncompressed_size.to_be_bytes());
            out.extend_from_slice(&block.compressed_size.to_be_bytes());
            out.extend_from_slice(&block.flags.to_be_bytes());
        }
        out.extend_from_slice(&(self.entries.len() as i32).to_be_bytes());
        let mut offset = 0u64;
        for entry in &self.entries {
            let size = entry.data.len() as u64;
            out.extend_from_slice(&(offset as i64).to_be_bytes());
            out.extend_from_slice(&(size as i64).to_be_bytes());
            out.extend_from_slice(&entry.flags.to_be_bytes());
            out.extend_from_slice(entry.path.as_bytes());
            out.push(0);
            offset += size;
        }
        out
    }
}

impl Container for UnityFsBundle {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::UnityFs
    }

    fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn set_entry_data(&mut self, index: usize, data: Vec<u8>) -> Result<()> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(Error::EntryOutOfRange(index))?;
        entry.data = data;
        Ok(())
    }

    fn save(&self) -> Result<Vec<u8>> {
        let read_codec = self.header.compression()?;
        let info_codec = read_codec.for_writing();
        if info_codec != read_codec {
            info!("Re-encoding {:?} bundle as {:?}", read_codec, info_codec);
        }
        let flags = (self.header.flags & !COMPRESSION_MASK) | info_codec.flag() | FLAG_BLOCKS_AND_DIR;
        let stream: Vec<u8> = self.entries.iter().flat_map(|e| e.data.iter().copied()).collect();
        let (blocks, block_data) = self.build_blocks(&stream)?;

        let info = self.build_block_info(&blocks);
        let packed_info = compression::compress(&info, info_codec)?;

        let mut out = Vec::with_capacity(block_data.len() + packed_info.len() + 128);
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&self.header.format_version.to_be_bytes());
        out.extend_from_slice(self.header.player_version.as_bytes());
        out.push(0);
        out.extend_from_slice(self.header.engine_version.as_bytes());
        out.push(0);
        let size_offset = out.len();
        out.extend_from_slice(&0u64.to_be_bytes());
        out.extend_from_slice(&(packed_info.len() as u32).to_be_bytes());
        out.extend_from_slice(&(info.len() as u32).to_be_bytes());
        out.extend_from_slice(&flags.to_be_bytes());

        if self.header.uses_block_alignment() {
            pad_to(&mut out, 16);
        }

        let needs_padding = self.header.block_info_needs_padding();
        if self.header.block_info_at_end() {
            if needs_padding {
                pad_to(&mut out, 16);
            }
            out.extend_from_slice(&block_data);
            out.extend_from_slice(&packed_info);
        } else {
            out.extend_from_slice(&packed_info);
            if needs_padding {
                pad_to(&mut out, 16);
            }
            out.extend_from_slice(&block_data);
        }

        let total = out.len() as u64;
        out[size_offset..size_offset + 8].copy_from_slice(&total.to_be_bytes());

        info!(
            "Serialized UnityFS bundle: {} entries, {} blocks, {} bytes",
            self.entries.len(),
            blocks.len(),
            total
        );
        Ok(out)
    }

    fn properties(&self) -> Vec<(&'static str, String)> {
        let compression = self
            .header
            .compression()
            .map(|c| format!("{:?}", c))
            .unwrap_or_else(|_| "unknown".to_string());
        vec![
            ("format version", self.header.format_version.to_string()),
            ("player version", self.header.player_version.clone()),
            ("engine version", self.header.engine_version.clone()),
            ("total size", self.header.total_size.to_string()),
            ("flags", format!("0x{:X}", self.header.flags)),
            ("block info compression", compression),
            ("block info at end", self.header.block_info_at_end().to_string()),
            ("data blocks", self.block_count.to_string()),
        ]
    }
}

fn read_count(reader: &mut ByteReader<'_>, what: &str) -> Result<usize> {
    let count = reader.read_i32_be()?;
    usize::try_from(count)
        .map_err(|_| Error::MalformedContainer(format!("negative {} count {}", what, count)))
}

fn parse_engine_version(value: &str) -> Option<(u32, u32, u32)> {
    let mut parts = value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok());
    Some((parts.next()?, parts.next()?, parts.next()?))
}

/// Engines that moved the encryption bit and gave 0x200 its padding meaning
fn uses_new_archive_flags(version: (u32, u32, u32)) -> bool {
    match version {
        (major, ..) if major < 2020 => false,
        (2020, minor, patch) if (minor, patch) < (3, 34) => false,
        (2021, minor, patch) if (minor, patch) < (3, 2) => false,
        (2022, minor, patch) if (minor, patch) < (1, 1) => false,
        _ => true,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Build a bundle from scratch with the given header flags and block flags
    pub fn build_bundle(entries: Vec<Entry>, flags: u32, block_flags: u16, engine: &str) -> Vec<u8> {
        UnityFsBundle {
            header: BundleHeader {
                format_version: 8,
                player_version: "5.x.x".to_string(),
                engine_version: engine.to_string(),
                total_size: 0,
                flags,
            },
            hash: [0u8; 16],
            block_flags,
            block_count: 0,
            entries,
        }
        .save()
        .unwrap()
    }

    pub fn sample_entries() -> Vec<Entry> {
        let mut cab = Entry::new("CAB-5d8e3c", EntryKind::Blob, b"SERIALIZED-CARD-DATA".repeat(16));
        cab.flags = NODE_SERIALIZED_FILE;
        let res = Entry::new("CAB-5d8e3c.resS", EntryKind::Resource, vec![0x7F; 300]);
        vec![cab, res]
    }
}
