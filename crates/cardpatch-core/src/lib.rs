//! # cardpatch-core
//!
//! Core library for patching CARD data inside Unity AssetBundles.
//!
//! This crate provides:
//! - A container abstraction with a UnityFS reader/writer
//! - Payload location strategies (embedded, exact, size-tolerant)
//! - SerializedFile header detection for the legacy and 64-bit layouts
//! - Sub-payload splicing with header and metadata size-field correction
//! - Post-save verification and optional TOML configuration

pub mod config;
pub mod container;
pub mod error;
pub mod locate;
pub mod patch;
pub mod profile;
pub mod serialized;
pub mod verify;
pub mod workflow;

pub use config::{CONFIG_FILE, Config, VerifyConfig};
pub use container::{
    BundleHeader, Container, ContainerFormat, ContainerSummary, Entry, EntryKind, RawFile, UnityFsBundle,
    detect_format, open_container, read_input,
};
pub use error::{Error, Result};
pub use locate::{EntryFilter, Locate, LocateOptions, Location, Strategy, locate_payload};
pub use patch::{HeaderUpdate, PatchReport, Patched, patch_blob};
pub use profile::FormatProfile;
pub use serialized::{BlobLayout, HeaderLayout, SerializedHeader, SizeField};
pub use verify::{VerifyIssue, VerifyReport, verify_entries, verify_saved};
pub use workflow::{PatchOutcome, apply_patch, replace_entry};
