//! Serializable overview of a container

use serde::Serialize;

use super::{Container, ContainerFormat, EntryKind};
use crate::error::Result;
use crate::serialized::SerializedHeader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub index: usize,
    pub kind: EntryKind,
    pub path: String,
    pub size: usize,
    pub flags: u32,
    /// Header of a blob entry, when it parses as a serialized file
    pub serialized: Option<SerializedHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub format: ContainerFormat,
    pub properties: Vec<Property>,
    pub entries: Vec<EntrySummary>,
}

impl ContainerSummary {
    pub fn from_container(container: &dyn Container) -> Self {
        Self {
            format: container.format(),
            properties: container
                .properties()
                .into_iter()
                .map(|(name, value)| Property {
                    name: name.to_string(),
                    value,
                })
                .collect(),
            entries: container
                .entries()
                .iter()
                .enumerate()
                .map(|(index, e)| EntrySummary {
                    index,
                    kind: e.kind,
                    path: e.path.clone(),
                    size: e.data.len(),
                    flags: e.flags,
                    serialized: if e.is_blob() {
                        SerializedHeader::parse(&e.data)
                    } else {
                        None
                    },
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::fixtures::{build_bundle, sample_entries};
    use crate::container::UnityFsBundle;

    #[test]
    fn test_summary_of_bundle() {
        let bytes = build_bundle(sample_entries(), 0x40, 0, "2019.4.24f1");
        let bundle = UnityFsBundle::from_bytes(&bytes).unwrap();
        let summary = ContainerSummary::from_container(&bundle);

        assert_eq!(summary.format, ContainerFormat::UnityFs);
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entries[0].kind, EntryKind::Blob);
        assert_eq!(summary.entries[0].size, 320);
        assert_eq!(summary.entries[0].flags, 4);
        assert_eq!(summary.entries[1].path, "CAB-5d8e3c.resS");
        assert!(summary.properties.iter().any(|p| p.name == "engine version" && p.value == "2019.4.24f1"));
    }

    #[test]
    fn test_summary_json() {
        let bytes = build_bundle(sample_entries(), 0x40, 0, "2019.4.24f1");
        let bundle = UnityFsBundle::from_bytes(&bytes).unwrap();
        let json = ContainerSummary::from_container(&bundle).to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["format"], "unity-fs");
        assert_eq!(value["entries"][0]["kind"], "blob");
        assert_eq!(value["entries"][1]["kind"], "resource");
        assert_eq!(value["entries"][1]["size"], 300);
        assert!(value["entries"][0]["serialized"].is_null());
    }

    #[test]
    fn test_summary_reads_blob_header() {
        let mut entries = sample_entries();
        let mut cab = crate::serialized::fixtures::legacy_header(0x40);
        cab.resize(0x40, 0);
        entries[0].data = cab;
        // Resources are never parsed
        entries[1].data = entries[0].data.clone();

        let bytes = build_bundle(entries, 0x40, 0, "2019.4.24f1");
        let bundle = UnityFsBundle::from_bytes(&bytes).unwrap();
        let summary = ContainerSummary::from_container(&bundle);

        let header = summary.entries[0].serialized.as_ref().unwrap();
        assert_eq!(header.version, 17);
        assert_eq!(header.file_size, 0x40);
        assert_eq!(summary.entries[1].serialized, None);

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["entries"][0]["serialized"]["layout"], "legacy");
        assert_eq!(json["entries"][0]["serialized"]["unity_version"], "2019.4.24f1");
    }
}
