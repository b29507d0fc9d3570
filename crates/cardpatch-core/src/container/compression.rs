//! Block compression used by UnityFS bundles
//!
//! The low six bits of a block (or header) flag word select the codec.
//! LZ4 and LZ4HC are read and written; LZ4HC blocks are re-encoded with the
//! regular LZ4 encoder, which any LZ4 decoder reads. LZMA is read only, and
//! such bundles are written back as LZ4.

use std::io::{Cursor, Read};

use crate::error::{Error, Result};

pub const COMPRESSION_MASK: u32 = 0x3F;

/// Codec selected by a UnityFS flag word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
    Lzham,
}

impl Compression {
    pub fn from_flags(flags: u32) -> Result<Self> {
        match flags & COMPRESSION_MASK {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lzma),
            2 => Ok(Compression::Lz4),
            3 => Ok(Compression::Lz4Hc),
            4 => Ok(Compression::Lzham),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown compression flag {}",
                other
            ))),
        }
    }

    pub fn is_lz4(self) -> bool {
        matches!(self, Compression::Lz4 | Compression::Lz4Hc)
    }

    /// Flag value selecting this codec
    pub fn flag(self) -> u32 {
        match self {
            Compression::None => 0,
            Compression::Lzma => 1,
            Compression::Lz4 => 2,
            Compression::Lz4Hc => 3,
            Compression::Lzham => 4,
        }
    }

    /// Codec used when saving data that was read with `self`
    pub fn for_writing(self) -> Self {
        match self {
            Compression::Lzma => Compression::Lz4,
            other => other,
        }
    }
}

/// Decompress one block to exactly `uncompressed_size` bytes
pub fn decompress(data: &[u8], uncompressed_size: usize, compression: Compression) -> Result<Vec<u8>> {
    let out = match compression {
        Compression::None => data.to_vec(),
        Compression::Lz4 | Compression::Lz4Hc => {
            lz4_flex::block::decompress(data, uncompressed_size)
                .map_err(|e| Error::Compression(format!("LZ4 decompression failed: {}", e)))?
        }
        Compression::Lzma => decompress_lzma(data, uncompressed_size)?,
        Compression::Lzham => {
            return Err(Error::UnsupportedFormat(
                "LZHAM-compressed bundles are not supported".to_string(),
            ));
        }
    };

    if out.len() != uncompressed_size {
        return Err(Error::Compression(format!(
            "decompressed size ({}) does not match expected size ({})",
            out.len(),
            uncompressed_size
        )));
    }
    Ok(out)
}

/// Unity stores LZMA1 as 5 property bytes and the stream, without the
/// `.lzma` size field; put it back so the alone decoder accepts the data.
fn decompress_lzma(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return Err(Error::Compression(
            "LZMA data too small to contain header".to_string(),
        ));
    }
    let mut header = Vec::with_capacity(13);
    header.extend_from_slice(&data[..5]);
    header.extend_from_slice(&(uncompressed_size as u64).to_le_bytes());

    let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
        .map_err(|e| Error::Compression(format!("LZMA decoder setup failed: {}", e)))?;
    let reader = Cursor::new(header).chain(&data[5..]);
    let mut decoder = xz2::read::XzDecoder::new_stream(reader, stream);
    let mut out = Vec::with_capacity(uncompressed_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Compression(format!("LZMA decompression failed: {}", e)))?;
    Ok(out)
}

/// Compress one block
pub fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 | Compression::Lz4Hc => Ok(lz4_flex::block::compress(data)),
        Compression::Lzma | Compression::Lzham => Err(Error::UnsupportedFormat(format!(
            "cannot write {:?}-compressed blocks",
            compression
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Compression::from_flags(0x43).unwrap(), Compression::Lz4Hc);
        assert_eq!(Compression::from_flags(0x240).unwrap(), Compression::None);
        assert!(Compression::from_flags(0x3F).is_err());
    }

    #[test]
    fn test_lz4_block_roundtrip() {
        let data = b"CARDCARDCARDCARDCARDCARDCARDCARD".repeat(8);
        let packed = compress(&data, Compression::Lz4).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed, data.len(), Compression::Lz4).unwrap(), data);
    }

    #[test]
    fn test_size_mismatch_is_error() {
        let packed = compress(b"abcdefgh", Compression::Lz4).unwrap();
        assert!(decompress(&packed, 4, Compression::Lz4).is_err());
        assert!(matches!(
            decompress(b"abc", 4, Compression::None),
            Err(Error::Compression(_))
        ));
    }

    #[test]
    fn test_lzma_block_decodes() {
        let data = b"SERIALIZED-CARD-DATA".repeat(12);
        let packed = lzma_block(&data);
        assert_eq!(decompress(&packed, data.len(), Compression::Lzma).unwrap(), data);
    }

    #[test]
    fn test_lzma_is_read_only() {
        assert!(matches!(
            decompress(b"\x5d\0", 10, Compression::Lzma),
            Err(Error::Compression(_))
        ));
        assert!(compress(b"abc", Compression::Lzma).unwrap_err().is_unsupported());
        assert_eq!(Compression::Lzma.for_writing(), Compression::Lz4);
        assert_eq!(Compression::Lz4Hc.for_writing(), Compression::Lz4Hc);
        assert_eq!(Compression::Lz4.flag(), 2);
    }

    /// LZMA1 block the way Unity stores it: properties, then the stream
    pub(crate) fn lzma_block(data: &[u8]) -> Vec<u8> {
        use std::io::Write;

        let options = xz2::stream::LzmaOptions::new_preset(6).unwrap();
        let stream = xz2::stream::Stream::new_lzma_encoder(&options).unwrap();
        let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
        encoder.write_all(data).unwrap();
        let alone = encoder.finish().unwrap();
        [&alone[..5], &alone[13..]].concat()
    }
}
