//! Container abstraction
//!
//! A container is an archive of named entries that can be loaded from bytes
//! and saved back to bytes. The patcher only sees [`Entry`] payloads, so the
//! archive format can be swapped without touching the splice logic.
//!
//! - [`UnityFsBundle`]: Unity AssetBundle (`UnityFS` signature)
//! - [`RawFile`]: a bare serialized file treated as a single entry

mod compression;
#[cfg(test)]
pub mod mock;
mod raw;
mod reader;
mod summary;
pub mod text;
mod unityfs;

use std::fs;
use std::path::Path;

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::debug;

use crate::error::{Error, Result};

pub use raw::RawFile;
pub use reader::ByteReader;
pub use summary::{ContainerSummary, EntrySummary, Property};
pub use unityfs::{BundleHeader, UnityFsBundle};

#[cfg(test)]
pub use mock::{MockContainer, MockContainerBuilder};
#[cfg(test)]
pub(crate) use unityfs::fixtures;

/// Kind of payload an entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// Serialized blob that may embed the target sub-payload
    Blob,
    /// Any other stream (textures, audio, `.resS`)
    Resource,
}

/// One named record inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    /// Format-specific flags, preserved on save
    pub flags: u32,
    pub data: Vec<u8>,
}

impl Entry {
    pub fn new(path: impl Into<String>, kind: EntryKind, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            kind,
            flags: 0,
            data,
        }
    }

    /// Last path component, without extension
    pub fn name(&self) -> &str {
        let file = self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path);
        match file.rfind('.') {
            Some(dot) if dot > 0 => &file[..dot],
            _ => file,
        }
    }

    pub fn is_blob(&self) -> bool {
        self.kind == EntryKind::Blob
    }
}

/// Container formats this crate can load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ContainerFormat {
    UnityFs,
    Raw,
}

impl ContainerFormat {
    /// Load a container of this format from bytes
    pub fn load(self, data: Vec<u8>, name: &str) -> Result<Box<dyn Container>> {
        match self {
            ContainerFormat::UnityFs => Ok(Box::new(UnityFsBundle::from_bytes(&data)?)),
            ContainerFormat::Raw => Ok(Box::new(RawFile::new(name, data))),
        }
    }
}

/// Load/save capability over an archive of entries
pub trait Container {
    fn format(&self) -> ContainerFormat;

    /// Entries in enumeration order
    fn entries(&self) -> &[Entry];

    /// Replace the payload of the entry at `index`
    fn set_entry_data(&mut self, index: usize, data: Vec<u8>) -> Result<()>;

    /// Serialize all entries back into container bytes
    fn save(&self) -> Result<Vec<u8>>;

    /// Format-level fields for display
    fn properties(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Read a file, mapping a missing path to [`Error::InputMissing`]
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::InputMissing(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

/// Guess the container format from the leading signature
pub fn detect_format(data: &[u8]) -> Result<ContainerFormat> {
    if data.starts_with(unityfs::SIGNATURE) {
        return Ok(ContainerFormat::UnityFs);
    }
    if data.starts_with(b"UnityWeb") || data.starts_with(b"UnityRaw") || data.starts_with(b"UnityArchive") {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len().min(16));
        return Err(Error::UnsupportedFormat(format!(
            "legacy bundle signature {:?}",
            String::from_utf8_lossy(&data[..end])
        )));
    }
    Err(Error::UnsupportedFormat(
        "missing UnityFS signature (use --raw for a bare serialized file)".to_string(),
    ))
}

/// Open a container file.
///
/// With `raw` set the whole file becomes a single blob entry.
pub fn open_container(path: &Path, raw: bool) -> Result<Box<dyn Container>> {
    let data = read_input(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = if raw {
        ContainerFormat::Raw
    } else {
        detect_format(&data)?
    };
    debug!("Opening {} as {} ({} bytes)", path.display(), format, data.len());
    format.load(data, &name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_entry_name_strips_directories_and_extension() {
        let entry = Entry::new("archive:/CAB-abc/CAB-abc.resS", EntryKind::Resource, vec![]);
        assert_eq!(entry.name(), "CAB-abc");
        let entry = Entry::new("CAB-0123", EntryKind::Blob, vec![]);
        assert_eq!(entry.name(), "CAB-0123");
        let entry = Entry::new(".hidden", EntryKind::Blob, vec![]);
        assert_eq!(entry.name(), ".hidden");
    }

    #[test]
    fn test_entry_kind_strings() {
        assert_eq!(EntryKind::Blob.to_string(), "blob");
        assert_eq!("resource".parse::<EntryKind>().unwrap(), EntryKind::Resource);
        assert_eq!(ContainerFormat::UnityFs.to_string(), "unity-fs");
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format(b"UnityFS\0\0\0\0\x08").unwrap(),
            ContainerFormat::UnityFs
        );
        assert!(matches!(
            detect_format(b"UnityWeb\0rest"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(detect_format(b"\x00\x00\x00\x00").unwrap_err().is_unsupported());
    }

    #[test]
    fn test_read_input_missing() {
        let err = read_input(&PathBuf::from("/definitely/not/here.bundle")).unwrap_err();
        assert!(matches!(err, Error::InputMissing(_)));
    }

    #[test]
    fn test_open_container_raw() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"serialized").unwrap();
        let container = open_container(file.path(), true).unwrap();
        assert_eq!(container.format(), ContainerFormat::Raw);
        assert_eq!(container.entries().len(), 1);
        assert_eq!(container.entries()[0].data, b"serialized");
    }
}
