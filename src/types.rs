//! Wire and pipeline types shared across stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::config::SOURCE_HOST;

/// One entry of a module version's directory listing, as served by the CDN.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

/// Listing entry kind. Kinds the CDN may add later decode as `Unknown` and
/// are dropped by the listing filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    #[serde(other)]
    Unknown,
}

/// One unit of crawl work: a module name and, per version, its filtered file
/// listing. This is the shape that round-trips through the work queue.
///
/// `receipt` is transport state set by the durable queue on delivery; it is
/// required to acknowledge the message and is never part of the message body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleWork {
    pub name: String,
    pub versions: BTreeMap<String, Vec<DirectoryEntry>>,
    #[serde(skip)]
    pub receipt: Option<String>,
}

/// Per-file entry in the analyzer's `files` map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub size: u64,
}

/// Decoded analyzer output for one root file: the root's specifier and the
/// transitive closure of files it pulls in, each with its direct deps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileInfo {
    pub module: String,
    #[serde(rename = "totalSize", default)]
    pub total_size: u64,
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,
}

/// Analyzer-stage output for one version of a module.
#[derive(Clone, Debug)]
pub struct VersionAnalysis {
    pub version: String,
    pub infos: Vec<FileInfo>,
}

/// Analyzer-stage output for one module: everything the writer needs to
/// commit the module in a single transaction and acknowledge its message.
#[derive(Clone, Debug)]
pub struct AnalyzedModule {
    pub name: String,
    pub receipt: Option<String>,
    pub versions: Vec<VersionAnalysis>,
}

/// Build the absolute specifier URL for one file of one module version.
/// Listing paths usually carry a leading slash; tolerate ones that don't.
pub fn file_specifier(name: &str, version: &str, path: &str) -> String {
    let sep = if path.starts_with('/') { "" } else { "/" };
    format!("https://{SOURCE_HOST}/x/{name}@{version}{sep}{path}")
}

/// Ledger key for a module version's identity.
pub fn version_key(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}
