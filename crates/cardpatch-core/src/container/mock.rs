//! In-memory container for tests

use super::{Container, ContainerFormat, Entry, EntryKind};
use crate::error::{Error, Result};

/// Container backed by a plain entry list; `save` concatenates payloads
#[derive(Debug, Clone, Default)]
pub struct MockContainer {
    entries: Vec<Entry>,
}

impl Container for MockContainer {
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
        Ok(self.entries.iter().flat_map(|e| e.data.clone()).collect())
    }
}

/// Builder for [`MockContainer`]
#[derive(Debug, Default)]
pub struct MockContainerBuilder {
    entries: Vec<Entry>,
}

impl MockContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blob(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.entries.push(Entry::new(path, EntryKind::Blob, data.into()));
        self
    }

    pub fn resource(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.entries
            .push(Entry::new(path, EntryKind::Resource, data.into()));
        self
    }

    pub fn build(self) -> MockContainer {
        MockContainer {
            entries: self.entries,
        }
    }
}
