//! Bug report snapshots and the JSON shapes exchanged with the dashboard.
//!
//! Domain types (`BugRecord`, `BugStatus`) are decoupled from the wire layout so
//! the pipeline never sees base64 blobs or dashboard field casing.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque dashboard identifier of a bug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BugId(String);

impl BugId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BugId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BugId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Crash the report was taken from. Only echoed back on update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrashReference(i64);

impl CrashReference {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Dashboard lifecycle state of a bug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum BugStatus {
    #[default]
    Open,
    Upstream,
    Invalid,
    Dup,
    Update,
    UnCc,
    Fixed,
    Unknown(i64),
}

impl BugStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, BugStatus::Open)
    }
}

impl From<i64> for BugStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => BugStatus::Open,
            1 => BugStatus::Upstream,
            2 => BugStatus::Invalid,
            3 => BugStatus::Dup,
            4 => BugStatus::Update,
            5 => BugStatus::UnCc,
            6 => BugStatus::Fixed,
            other => BugStatus::Unknown(other),
        }
    }
}

impl From<BugStatus> for i64 {
    fn from(status: BugStatus) -> Self {
        match status {
            BugStatus::Open => 0,
            BugStatus::Upstream => 1,
            BugStatus::Invalid => 2,
            BugStatus::Dup => 3,
            BugStatus::Update => 4,
            BugStatus::UnCc => 5,
            BugStatus::Fixed => 6,
            BugStatus::Unknown(code) => code,
        }
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BugStatus::Open => f.write_str("open"),
            BugStatus::Upstream => f.write_str("upstream"),
            BugStatus::Invalid => f.write_str("invalid"),
            BugStatus::Dup => f.write_str("dup"),
            BugStatus::Update => f.write_str("update"),
            BugStatus::UnCc => f.write_str("uncc"),
            BugStatus::Fixed => f.write_str("fixed"),
            BugStatus::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// Immutable snapshot of one bug as loaded from the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BugRecord {
    pub id: BugId,
    pub os: String,
    pub arch: String,
    pub log: String,
    pub report: String,
    pub status: BugStatus,
    pub guilty_files: Option<Vec<String>>,
    pub crash_id: CrashReference,
}

impl BugRecord {
    /// The dashboard answers unknown IDs with an empty record rather than an error.
    pub fn is_found(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn has_guilty_files(&self) -> bool {
        self.guilty_files
            .as_ref()
            .map(|files| !files.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugListResponse {
    #[serde(rename = "List", default)]
    pub list: Vec<BugId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBugRequest {
    #[serde(rename = "ID")]
    pub id: BugId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReportRequest {
    #[serde(rename = "BugID")]
    pub bug_id: BugId,
    #[serde(rename = "CrashID")]
    pub crash_id: CrashReference,
    #[serde(rename = "GuiltyFiles")]
    pub guilty_files: Option<Vec<String>>,
}

impl UpdateReportRequest {
    pub fn guilty_files(bug_id: BugId, crash_id: CrashReference, files: Vec<String>) -> Self {
        Self {
            bug_id,
            crash_id,
            guilty_files: Some(files),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportElementsWire {
    #[serde(rename = "GuiltyFiles", default)]
    pub guilty_files: Vec<String>,
}

/// `load_bug` response body. Byte fields travel base64 encoded and may be `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugReportWire {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "Arch")]
    pub arch: String,
    #[serde(rename = "Log", with = "base64_bytes")]
    pub log: Vec<u8>,
    #[serde(rename = "Report", with = "base64_bytes")]
    pub report: Vec<u8>,
    #[serde(rename = "BugStatus")]
    pub bug_status: i64,
    #[serde(rename = "CrashID")]
    pub crash_id: i64,
    #[serde(rename = "ReportElements")]
    pub report_elements: Option<ReportElementsWire>,
}

impl From<BugReportWire> for BugRecord {
    fn from(wire: BugReportWire) -> Self {
        Self {
            id: BugId::new(wire.id),
            os: wire.os,
            arch: wire.arch,
            log: String::from_utf8_lossy(&wire.log).into_owned(),
            report: String::from_utf8_lossy(&wire.report).into_owned(),
            status: BugStatus::from(wire.bug_status),
            guilty_files: wire.report_elements.map(|elements| elements.guilty_files),
            crash_id: CrashReference::new(wire.crash_id),
        }
    }
}

impl From<&BugRecord> for BugReportWire {
    fn from(record: &BugRecord) -> Self {
        Self {
            id: record.id.as_str().to_owned(),
            os: record.os.clone(),
            arch: record.arch.clone(),
            log: record.log.as_bytes().to_vec(),
            report: record.report.as_bytes().to_vec(),
            bug_status: i64::from(record.status),
            crash_id: record.crash_id.value(),
            report_elements: record.guilty_files.as_ref().map(|files| ReportElementsWire {
                guilty_files: files.clone(),
            }),
        }
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => BASE64_STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
