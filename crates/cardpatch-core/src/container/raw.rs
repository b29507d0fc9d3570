use super::{Container, ContainerFormat, Entry, EntryKind};
use crate::error::{Error, Result};

/// A bare serialized file exposed as a single blob entry
#[derive(Debug, Clone)]
pub struct RawFile {
    entries: [Entry; 1],
}

impl RawFile {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            entries: [Entry::new(name, EntryKind::Blob, data)],
        }
    }
}

impl Container for RawFile {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Raw
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
        Ok(self.entries[0].data.clone())
    }

    fn properties(&self) -> Vec<(&'static str, String)> {
        vec![("size", self.entries[0].data.len().to_string())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_file_save_returns_payload() {
        let mut raw = RawFile::new("CAB-1234", b"abc".to_vec());
        assert_eq!(raw.entries()[0].name(), "CAB-1234");
        raw.set_entry_data(0, b"abcd".to_vec()).unwrap();
        assert_eq!(raw.save().unwrap(), b"abcd");
        assert!(matches!(
            raw.set_entry_data(1, vec![]),
            Err(Error::EntryOutOfRange(1))
        ));
    }
}
