//! Post-save verification.
//!
//! Re-opens the saved bytes with the same loader and re-scans them. Failed
//! checks are collected as issues for the caller to print as warnings; the
//! writer's guarantees about metadata preservation are not known, so none of
//! these is fatal.

use std::fmt;

use memchr::memmem;
use serde::Serialize;
use tracing::debug;

use crate::container::text::text_to_bytes;
use crate::container::{Container, Entry};

/// One failed verification check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VerifyIssue {
    /// Saved bytes could not be loaded again
    Unreadable(String),
    EntryCountChanged { before: usize, after: usize },
    PathChanged { index: usize, before: String, after: String },
    /// Replacement payload is not present in any blob entry
    PayloadMissing,
    MarkerMissing(String),
}

impl fmt::Display for VerifyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyIssue::Unreadable(e) => write!(f, "saved container could not be re-opened: {}", e),
            VerifyIssue::EntryCountChanged { before, after } => {
                write!(f, "entry count changed from {} to {}", before, after)
            }
            VerifyIssue::PathChanged {
                index,
                before,
                after,
            } => write!(f, "entry {} path changed from {:?} to {:?}", index, before, after),
            VerifyIssue::PayloadMissing => write!(f, "new payload not found in any blob entry"),
            VerifyIssue::MarkerMissing(marker) => write!(f, "marker {:?} not found", marker),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Compare a re-opened container against the entries it was saved from
pub fn verify_entries(
    before: &[Entry],
    after: &[Entry],
    payload: &[u8],
    markers: &[String],
) -> VerifyReport {
    let mut issues = Vec::new();

    if before.len() != after.len() {
        issues.push(VerifyIssue::EntryCountChanged {
            before: before.len(),
            after: after.len(),
        });
    }
    for (index, (old, new)) in before.iter().zip(after).enumerate() {
        if old.path != new.path {
            issues.push(VerifyIssue::PathChanged {
                index,
                before: old.path.clone(),
                after: new.path.clone(),
            });
        }
    }

    let payload_present = payload.is_empty()
        || after
            .iter()
            .filter(|e| e.is_blob())
            .any(|e| memmem::find(&e.data, payload).is_some());
    if !payload_present {
        issues.push(VerifyIssue::PayloadMissing);
    }

    // Markers are matched as Latin-1, or as UTF-8 when they do not fit
    for marker in markers {
        let needle = text_to_bytes(marker).unwrap_or_else(|| marker.as_bytes().to_vec());
        let found = after
            .iter()
            .any(|e| memmem::find(&e.data, &needle).is_some());
        if !found {
            issues.push(VerifyIssue::MarkerMissing(marker.clone()));
        }
    }

    debug!("Verification finished with {} issue(s)", issues.len());
    VerifyReport { issues }
}

/// Re-open `saved` with the loader of `original` and check it
pub fn verify_saved(
    original: &dyn Container,
    saved: Vec<u8>,
    payload: &[u8],
    markers: &[String],
) -> VerifyReport {
    let name = original
        .entries()
        .first()
        .map(|e| e.path.clone())
        .unwrap_or_default();
    match original.format().load(saved, &name) {
        Ok(reopened) => verify_entries(original.entries(), reopened.entries(), payload, markers),
        Err(e) => VerifyReport {
            issues: vec![VerifyIssue::Unreadable(e.to_string())],
        },
    }
}
