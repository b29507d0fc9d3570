//! End-to-end operations over an opened container
//!
//! [`apply_patch`] locates the original sub-payload and splices the
//! replacement into its entry. [`replace_entry`] swaps a whole entry payload
//! selected by name. Neither touches the filesystem; the caller saves.

use serde::Serialize;
use tracing::{debug, info};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::locate::{EntryFilter, LocateOptions, Location, Strategy, locate_payload};
use crate::patch::{PatchReport, patch_blob};
use crate::profile::FormatProfile;

/// Result of a patch applied to a container
#[derive(Debug, Clone, Serialize)]
pub struct PatchOutcome {
    pub entry_index: usize,
    pub entry_path: String,
    pub location: Location,
    /// `None` for whole-entry replacements
    pub report: Option<PatchReport>,
}

/// Locate `original` and replace it with `replacement` inside `container`
pub fn apply_patch(
    container: &mut dyn Container,
    original: &[u8],
    replacement: &[u8],
    strategy: Strategy,
    filter: &EntryFilter,
    options: &LocateOptions,
    profile: &FormatProfile,
) -> Result<PatchOutcome> {
    let location = locate_payload(container.entries(), original, strategy, filter, options)?;
    let entry = &container.entries()[location.entry_index];
    let entry_path = entry.path.clone();

    let report = if location.whole_entry {
        info!(
            "Replacing whole entry {} ({} -> {} bytes)",
            entry_path,
            entry.data.len(),
            replacement.len()
        );
        container.set_entry_data(location.entry_index, replacement.to_vec())?;
        None
    } else {
        let patched = patch_blob(
            entry.data.clone(),
            location.offset,
            location.len,
            replacement,
            profile,
        )?;
        debug!(
            "Entry {} resized from {} to {} bytes",
            entry_path, patched.report.blob_len_before, patched.report.blob_len_after
        );
        container.set_entry_data(location.entry_index, patched.data)?;
        Some(patched.report)
    };

    Ok(PatchOutcome {
        entry_index: location.entry_index,
        entry_path,
        location,
        report,
    })
}

/// Replace the payload of the first entry matching `filter`.
///
/// Any entry kind qualifies; with an empty filter the first entry is used.
pub fn replace_entry(
    container: &mut dyn Container,
    filter: &EntryFilter,
    payload: Vec<u8>,
) -> Result<usize> {
    let index = container
        .entries()
        .iter()
        .position(|e| filter.matches(e))
        .ok_or_else(|| {
            Error::PayloadNotLocated(format!("no entry matched {}", filter.describe()))
        })?;

    info!(
        "Replacing entry {} with {} bytes",
        container.entries()[index].path,
        payload.len()
    );
    container.set_entry_data(index, payload)?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::fixtures::{build_bundle, sample_entries};
    use crate::container::{MockContainerBuilder, UnityFsBundle};
    use crate::patch::HeaderUpdate;
    use crate::serialized::fixtures::legacy_header;

    /// Blob with a 0x30 header, a size field at 0x38 and the payload at 0x40
    fn serialized_blob(payload: &[u8]) -> Vec<u8> {
        let mut blob = vec![0u8; 0x40];
        blob[0x38..0x3C].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        blob.extend_from_slice(payload);
        blob.extend_from_slice(&[0xEE; 16]);
        let total = blob.len() as u64;
        blob[0x18..0x20].copy_from_slice(&total.to_be_bytes());
        blob
    }

    #[test]
    fn test_embedded_patch_fixes_sizes() {
        let mut container = MockContainerBuilder::new()
            .resource("CAB-1.resS", vec![0u8; 64])
            .blob("CAB-1", serialized_blob(b"OLD-CARD-PAYLOAD"))
            .build();

        let outcome = apply_patch(
            &mut container,
            b"OLD-CARD-PAYLOAD",
            b"NEW-LONGER-CARD-PAYLOAD",
            Strategy::Auto,
            &EntryFilter::default(),
            &LocateOptions::default(),
            &FormatProfile::default(),
        )
        .unwrap();

        assert_eq!(outcome.entry_index, 1);
        assert_eq!(outcome.entry_path, "CAB-1");
        assert_eq!(outcome.location.offset, 0x40);
        let report = outcome.report.unwrap();
        assert_eq!(report.metadata_field, Some(0x38));

        let data = &container.entries()[1].data;
        assert_eq!(
            report.header,
            HeaderUpdate::Written {
                field: FormatProfile::default().size_field(),
                layout: None,
                previous: (data.len() - 7) as u64,
                current: data.len() as u64
            }
        );
        assert_eq!(&data[0x38..0x3C], &23u32.to_le_bytes());
        assert_eq!(&data[0x40..0x40 + 23], b"NEW-LONGER-CARD-PAYLOAD");
    }

    #[test]
    fn test_exact_patch_replaces_whole_entry() {
        let mut container = MockContainerBuilder::new()
            .blob("CAB-1", b"CARD".to_vec())
            .build();

        let outcome = apply_patch(
            &mut container,
            b"CARD",
            b"REPLACED",
            Strategy::Exact,
            &EntryFilter::default(),
            &LocateOptions::default(),
            &FormatProfile::default(),
        )
        .unwrap();

        assert!(outcome.report.is_none());
        assert!(outcome.location.whole_entry);
        assert_eq!(container.save().unwrap(), b"REPLACED");
    }

    #[test]
    fn test_patch_not_located_leaves_container_untouched() {
        let mut container = MockContainerBuilder::new()
            .blob("CAB-1", b"something else".to_vec())
            .build();

        let err = apply_patch(
            &mut container,
            b"CARD",
            b"NEW",
            Strategy::Auto,
            &EntryFilter::default(),
            &LocateOptions::default(),
            &FormatProfile::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::PayloadNotLocated(_)));
        assert_eq!(container.entries()[0].data, b"something else");
    }

    #[test]
    fn test_patch_through_unityfs_roundtrip() {
        let bytes = build_bundle(sample_entries(), 0x43, 2, "2019.4.24f1");
        let mut bundle = UnityFsBundle::from_bytes(&bytes).unwrap();

        apply_patch(
            &mut bundle,
            b"CARD",
            b"CARD-EDITED",
            Strategy::Embedded,
            &EntryFilter::by_name("CAB-5d8e3c"),
            &LocateOptions::default(),
            &FormatProfile::default(),
        )
        .unwrap();

        let saved = bundle.save().unwrap();
        let reopened = UnityFsBundle::from_bytes(&saved).unwrap();
        assert_eq!(reopened.header().total_size, saved.len() as u64);
        assert_eq!(reopened.entries().len(), 2);
        assert_eq!(reopened.entries()[0].path, "CAB-5d8e3c");
        // The total-size field at 0x18 lands inside the repeated text
        let blob = &reopened.entries()[0].data;
        assert_eq!(blob.len(), 320 + 7);
        assert!(blob.starts_with(b"SERIALIZED-CARD-EDITED"));
        assert_eq!(&blob[0x18..0x20], &(327u64).to_be_bytes());
        assert_eq!(reopened.entries()[1].data, vec![0x7F; 300]);
    }

    #[test]
    fn test_legacy_blob_through_unityfs_roundtrip() {
        let mut cab = legacy_header(0);
        cab.resize(0x40, 0);
        cab[0x28..0x2C].copy_from_slice(&4u32.to_le_bytes());
        cab.extend_from_slice(b"CARD");
        let total = cab.len() as u32;
        cab[0x04..0x08].copy_from_slice(&total.to_be_bytes());
        let mut entries = sample_entries();
        entries[0].data = cab;

        let bytes = build_bundle(entries, 0x43, 2, "2019.4.24f1");
        let mut bundle = UnityFsBundle::from_bytes(&bytes).unwrap();
        let outcome = apply_patch(
            &mut bundle,
            b"CARD",
            b"CARD-EDITED",
            Strategy::Embedded,
            &EntryFilter::by_name("CAB-5d8e3c"),
            &LocateOptions::default(),
            &FormatProfile::default(),
        )
        .unwrap();
        assert_eq!(outcome.report.unwrap().metadata_field, Some(0x28));

        let saved = bundle.save().unwrap();
        let reopened = UnityFsBundle::from_bytes(&saved).unwrap();
        let blob = &reopened.entries()[0].data;
        assert_eq!(blob.len(), 0x44 + 7);
        assert_eq!(&blob[0x04..0x08], &(0x44u32 + 7).to_be_bytes());
        assert_eq!(&blob[0x14..0x20], b"2019.4.24f1\0");
        assert_eq!(&blob[0x28..0x2C], &11u32.to_le_bytes());
        assert!(blob.ends_with(b"CARD-EDITED"));
    }

    #[test]
    fn test_replace_entry_by_filter() {
        let mut container = MockContainerBuilder::new()
            .blob("archive:/CAB-1/CAB-1", b"a".to_vec())
            .resource("archive:/CAB-1/CAB-1.resS", b"b".to_vec())
            .build();

        let filter = EntryFilter {
            container: Some("archive:/CAB-1/CAB-1.resS".to_string()),
            name: None,
        };
        let index = replace_entry(&mut container, &filter, b"xyz".to_vec()).unwrap();
        assert_eq!(index, 1);
        assert_eq!(container.save().unwrap(), b"axyz");

        let index = replace_entry(&mut container, &EntryFilter::default(), b"0".to_vec()).unwrap();
        assert_eq!(index, 0);

        let err = replace_entry(&mut container, &EntryFilter::by_name("CAB-2"), vec![]).unwrap_err();
        assert!(matches!(err, Error::PayloadNotLocated(_)));
    }
}
