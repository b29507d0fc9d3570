//! Sub-payload location
//!
//! Finds which entry holds the original payload and where. Each strategy is a
//! [`Locate`] implementation; [`Strategy::Auto`] chains them in order of
//! confidence. Only blob entries passing the [`EntryFilter`] are considered,
//! in enumeration order.

mod strategies;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, info};

use crate::container::Entry;
use crate::error::{Error, Result};

pub use strategies::{Embedded, ExactMatch, SizeTolerant};

/// Default size tolerance for [`SizeTolerant`] (percent)
pub const DEFAULT_TOLERANCE_PERCENT: u32 = 10;

/// Default prefix length compared by [`SizeTolerant`]
pub const DEFAULT_PREFIX_LEN: usize = 64;

/// Locator selection
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, IntoStaticStr, Display,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Embedded, then exact, then size-tolerant
    #[default]
    Auto,
    /// Contiguous byte search inside each entry
    Embedded,
    /// Whole entry equals the payload
    Exact,
    /// Whole entry of similar size sharing the payload's prefix
    SizeTolerant,
}

/// Tuning for the size-tolerant heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateOptions {
    pub tolerance_percent: u32,
    pub prefix_len: usize,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            prefix_len: DEFAULT_PREFIX_LEN,
        }
    }
}

/// Where a payload was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub entry_index: usize,
    /// Offset of the sub-payload inside the entry
    pub offset: usize,
    /// Length of the matched range
    pub len: usize,
    /// The match covers the whole entry; no header fix-up applies
    pub whole_entry: bool,
    pub strategy: Strategy,
}

/// Restricts which entries are scanned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Exact entry path
    pub container: Option<String>,
    /// Entry name (path stem) or full path
    pub name: Option<String>,
}

impl EntryFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            container: None,
            name: Some(name.into()),
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        if let Some(container) = &self.container {
            if entry.path != *container {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if entry.name() != name && entry.path != *name {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_none() && self.name.is_none()
    }

    pub fn describe(&self) -> String {
        match (&self.container, &self.name) {
            (None, None) => "<any entry>".to_string(),
            (Some(c), None) => format!("container {}", c),
            (None, Some(n)) => format!("entry {}", n),
            (Some(c), Some(n)) => format!("container {} / entry {}", c, n),
        }
    }
}

/// A payload location strategy
pub trait Locate {
    fn strategy(&self) -> Strategy;

    /// Check one candidate entry
    fn match_entry(&self, entry: &Entry) -> Option<(usize, usize)>;

    /// Whether a hit replaces the whole entry
    fn whole_entry(&self) -> bool;

    /// First matching blob entry, in enumeration order
    fn locate(&self, entries: &[Entry], filter: &EntryFilter) -> Option<Location> {
        entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_blob() && filter.matches(entry))
            .find_map(|(entry_index, entry)| {
                let (offset, len) = self.match_entry(entry)?;
                Some(Location {
                    entry_index,
                    offset,
                    len,
                    whole_entry: self.whole_entry(),
                    strategy: self.strategy(),
                })
            })
    }
}

impl Strategy {
    /// Locators tried for this strategy, in order
    pub fn locators<'a>(self, needle: &'a [u8], options: &LocateOptions) -> Vec<Box<dyn Locate + 'a>> {
        let embedded = || Box::new(Embedded::new(needle)) as Box<dyn Locate + 'a>;
        let exact = || Box::new(ExactMatch::new(needle)) as Box<dyn Locate + 'a>;
        let tolerant = || Box::new(SizeTolerant::new(needle, options)) as Box<dyn Locate + 'a>;
        match self {
            Strategy::Auto => vec![embedded(), exact(), tolerant()],
            Strategy::Embedded => vec![embedded()],
            Strategy::Exact => vec![exact()],
            Strategy::SizeTolerant => vec![tolerant()],
        }
    }
}

/// Locate `needle` among `entries`
pub fn locate_payload(
    entries: &[Entry],
    needle: &[u8],
    strategy: Strategy,
    filter: &EntryFilter,
    options: &LocateOptions,
) -> Result<Location> {
    if needle.is_empty() {
        return Err(Error::PayloadNotLocated(
            "original payload is empty".to_string(),
        ));
    }

    let candidates = entries
        .iter()
        .filter(|e| e.is_blob() && filter.matches(e))
        .count();
    debug!(
        "Locating {} byte payload with {} strategy across {} candidate entries ({})",
        needle.len(),
        strategy,
        candidates,
        filter.describe()
    );

    for locator in strategy.locators(needle, options) {
        if let Some(location) = locator.locate(entries, filter) {
            info!(
                "Found payload in {} at offset 0x{:X} ({} strategy)",
                entries[location.entry_index].path,
                location.offset,
                location.strategy
            );
            return Ok(location);
        }
        debug!("{} strategy found no match", locator.strategy());
    }

    Err(Error::PayloadNotLocated(format!(
        "no blob entry matched ({}, {} strategy, {} candidates)",
        filter.describe(),
        strategy,
        candidates
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::EntryKind;

    fn blob(path: &str, data: &[u8]) -> Entry {
        Entry::new(path, EntryKind::Blob, data.to_vec())
    }

    #[test]
    fn test_auto_prefers_embedded() {
        let entries = vec![
            blob("CAB-a", b"CARD"),
            blob("CAB-b", b"headerCARDtrailer"),
        ];
        let loc = locate_payload(
            &entries,
            b"CARD",
            Strategy::Auto,
            &EntryFilter::default(),
            &LocateOptions::default(),
        )
        .unwrap();
        // Embedded search hits the first entry at offset 0 before exact runs
        assert_eq!(loc.entry_index, 0);
        assert_eq!(loc.strategy, Strategy::Embedded);
        assert!(!loc.whole_entry);
    }

    #[test]
    fn test_auto_falls_back_to_size_tolerant() {
        let original: Vec<u8> = (0..200u8).collect();
        let mut edited = original.clone();
        edited[150] ^= 0xFF;
        edited.push(0);
        let entries = vec![blob("CAB-a", &edited)];

        let loc = locate_payload(
            &entries,
            &original,
            Strategy::Auto,
            &EntryFilter::default(),
            &LocateOptions::default(),
        )
        .unwrap();
        assert_eq!(loc.strategy, Strategy::SizeTolerant);
        assert!(loc.whole_entry);
        assert_eq!(loc.len, edited.len());
    }

    #[test]
    fn test_resources_are_skipped() {
        let entries = vec![Entry::new("CAB-a.resS", EntryKind::Resource, b"xxCARD".to_vec())];
        let err = locate_payload(
            &entries,
            b"CARD",
            Strategy::Embedded,
            &EntryFilter::default(),
            &LocateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::PayloadNotLocated(_)));
    }

    #[test]
    fn test_filter_restricts_candidates() {
        let entries = vec![blob("CAB-a", b"CARD"), blob("CAB-b", b"..CARD")];
        let loc = locate_payload(
            &entries,
            b"CARD",
            Strategy::Embedded,
            &EntryFilter::by_name("CAB-b"),
            &LocateOptions::default(),
        )
        .unwrap();
        assert_eq!(loc.entry_index, 1);
        assert_eq!(loc.offset, 2);
    }

    #[test]
    fn test_filter_matching() {
        let entry = blob("archive:/CAB-a/CAB-a.bytes", b"");
        assert!(EntryFilter::default().matches(&entry));
        assert!(EntryFilter::by_name("CAB-a").matches(&entry));
        assert!(EntryFilter::by_name("archive:/CAB-a/CAB-a.bytes").matches(&entry));
        assert!(!EntryFilter::by_name("CAB-b").matches(&entry));

        let filter = EntryFilter {
            container: Some("archive:/CAB-a/CAB-a.bytes".to_string()),
            name: Some("other".to_string()),
        };
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_empty_needle_is_rejected() {
        let entries = vec![blob("CAB-a", b"CARD")];
        assert!(
            locate_payload(
                &entries,
                b"",
                Strategy::Auto,
                &EntryFilter::default(),
                &LocateOptions::default()
            )
            .is_err()
        );
    }

    #[test]
    fn test_strategy_strings() {
        assert_eq!("size-tolerant".parse::<Strategy>().unwrap(), Strategy::SizeTolerant);
        assert_eq!(Strategy::Auto.to_string(), "auto");
        assert!("fuzzy".parse::<Strategy>().is_err());
    }
}
