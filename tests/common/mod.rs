//! Shared fakes: in-memory graph store, canned registry, canned analyzer.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use modgraph::analyzer::{AnalyzerError, DepAnalyzer};
use modgraph::graph::{GraphError, GraphStore, GraphTxn};
use modgraph::registry::{ModuleRegistry, RegistryError, VersionList, strip_listing};
use modgraph::types::{DirectoryEntry, EntryKind, FileEntry, FileInfo};

// ---- In-memory graph store ----

/// Predicates of one committed node.
#[derive(Clone, Debug, Default)]
pub struct NodeData {
    pub specifier: Option<String>,
    pub name: Option<String>,
    pub module_version: Option<String>,
    pub stars: Option<i64>,
    pub dtypes: Vec<String>,
    pub depends_on: Vec<String>,
    pub version: Vec<String>,
    pub file_specifier: Vec<String>,
}

#[derive(Default)]
struct GraphState {
    next_uid: u64,
    nodes: HashMap<String, NodeData>,
}

/// Graph store with per-transaction blank resolution and atomic commit,
/// mirroring the contract the writer relies on.
#[derive(Clone, Default)]
pub struct MemGraph {
    state: Arc<Mutex<GraphState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemGraph {
    pub fn new() -> Self {
        MemGraph::default()
    }

    /// Make the next commit fail (and every later one succeed again).
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::Relaxed);
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    pub fn file_nodes(&self) -> Vec<NodeData> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .values()
            .filter(|n| n.dtypes.iter().any(|t| t == "File"))
            .cloned()
            .collect()
    }

    pub fn uid_of_specifier(&self, specifier: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .iter()
            .find(|(_, n)| n.specifier.as_deref() == Some(specifier))
            .map(|(uid, _)| uid.clone())
    }

    /// Count of nodes carrying this specifier; dedup means at most one.
    pub fn specifier_count(&self, specifier: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .values()
            .filter(|n| n.specifier.as_deref() == Some(specifier))
            .count()
    }

    /// Specifiers of the nodes `specifier` depends on.
    pub fn deps_of(&self, specifier: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let Some(node) = state
            .nodes
            .values()
            .find(|n| n.specifier.as_deref() == Some(specifier))
        else {
            return Vec::new();
        };
        node.depends_on
            .iter()
            .filter_map(|uid| state.nodes.get(uid))
            .filter_map(|n| n.specifier.clone())
            .collect()
    }

    pub fn module_by_name(&self, name: &str) -> Option<NodeData> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .values()
            .find(|n| n.name.as_deref() == Some(name))
            .cloned()
    }

    pub fn version_node(&self, module_version: &str) -> Option<NodeData> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .values()
            .find(|n| n.module_version.as_deref() == Some(module_version))
            .cloned()
    }

    pub fn edge_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.nodes.values().map(|n| n.depends_on.len()).sum()
    }
}

#[derive(Default)]
struct NodePatch {
    uid: String,
    data: NodeData,
}

pub struct MemTxn {
    state: Arc<Mutex<GraphState>>,
    fail_next_commit: Arc<AtomicBool>,
    assigned: HashMap<String, String>,
    staged: Vec<NodePatch>,
}

impl MemTxn {
    fn stage(
        &mut self,
        obj: &serde_json::Map<String, serde_json::Value>,
        newly: &mut HashMap<String, String>,
    ) -> Result<String, GraphError> {
        let raw = obj
            .get("uid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GraphError::Api {
                message: "mutation node without uid".to_string(),
            })?
            .to_string();

        let uid = match raw.strip_prefix("_:") {
            Some(label) => match self.assigned.get(label) {
                Some(uid) => uid.clone(),
                None => {
                    let uid = {
                        let mut state = self.state.lock().unwrap();
                        state.next_uid += 1;
                        format!("0x{:x}", state.next_uid)
                    };
                    self.assigned.insert(label.to_string(), uid.clone());
                    newly.insert(label.to_string(), uid.clone());
                    uid
                }
            },
            None => raw,
        };

        let mut patch = NodePatch {
            uid: uid.clone(),
            data: NodeData::default(),
        };
        for (key, value) in obj {
            match key.as_str() {
                "specifier" => patch.data.specifier = value.as_str().map(String::from),
                "name" => patch.data.name = value.as_str().map(String::from),
                "module_version" => {
                    patch.data.module_version = value.as_str().map(String::from)
                }
                "stars" => patch.data.stars = value.as_i64(),
                "dgraph.type" => {
                    patch.data.dtypes = value
                        .as_array()
                        .map(|a| {
                            a.iter()
                                .filter_map(|t| t.as_str().map(String::from))
                                .collect()
                        })
                        .unwrap_or_default()
                }
                "depends_on" | "version" | "file_specifier" => {
                    let mut targets = Vec::new();
                    for child in value.as_array().into_iter().flatten() {
                        let child = child.as_object().ok_or_else(|| GraphError::Api {
                            message: format!("{key} entry is not an object"),
                        })?;
                        targets.push(self.stage(child, newly)?);
                    }
                    match key.as_str() {
                        "depends_on" => patch.data.depends_on = targets,
                        "version" => patch.data.version = targets,
                        _ => patch.data.file_specifier = targets,
                    }
                }
                _ => {}
            }
        }
        self.staged.push(patch);
        Ok(uid)
    }
}

impl GraphStore for MemGraph {
    type Txn = MemTxn;

    fn alter(&self, _schema: &str) -> Result<(), GraphError> {
        Ok(())
    }

    fn txn(&self) -> MemTxn {
        MemTxn {
            state: Arc::clone(&self.state),
            fail_next_commit: Arc::clone(&self.fail_next_commit),
            assigned: HashMap::new(),
            staged: Vec::new(),
        }
    }
}

impl GraphTxn for MemTxn {
    fn mutate(&mut self, set: &serde_json::Value) -> Result<HashMap<String, String>, GraphError> {
        let obj = set.as_object().ok_or_else(|| GraphError::Api {
            message: "mutation is not an object".to_string(),
        })?;
        let mut newly = HashMap::new();
        self.stage(obj, &mut newly)?;
        Ok(newly)
    }

    fn commit(self) -> Result<(), GraphError> {
        if self.fail_next_commit.swap(false, Ordering::Relaxed) {
            return Err(GraphError::Api {
                message: "commit refused".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        for patch in self.staged {
            let node = state.nodes.entry(patch.uid).or_default();
            if patch.data.specifier.is_some() {
                node.specifier = patch.data.specifier;
            }
            if patch.data.name.is_some() {
                node.name = patch.data.name;
            }
            if patch.data.module_version.is_some() {
                node.module_version = patch.data.module_version;
            }
            if patch.data.stars.is_some() {
                node.stars = patch.data.stars;
            }
            for dtype in patch.data.dtypes {
                if !node.dtypes.contains(&dtype) {
                    node.dtypes.push(dtype);
                }
            }
            for uid in patch.data.depends_on {
                if !node.depends_on.contains(&uid) {
                    node.depends_on.push(uid);
                }
            }
            for uid in patch.data.version {
                if !node.version.contains(&uid) {
                    node.version.push(uid);
                }
            }
            for uid in patch.data.file_specifier {
                if !node.file_specifier.contains(&uid) {
                    node.file_specifier.push(uid);
                }
            }
        }
        Ok(())
    }

    fn discard(self) {}
}

// ---- Canned registry ----

/// Registry serving fixed data. Applies the same listing filter the HTTP
/// client applies, and can trip the cancel flag after a number of calls to
/// exercise cancellation mid-crawl.
pub struct StubRegistry {
    pub modules: Vec<String>,
    pub versions: HashMap<String, VersionList>,
    pub files: HashMap<(String, String), Vec<DirectoryEntry>>,
    pub cancel_after: Option<(usize, Arc<AtomicBool>)>,
    calls: std::sync::atomic::AtomicUsize,
}

impl StubRegistry {
    pub fn new(
        modules: Vec<String>,
        versions: HashMap<String, VersionList>,
        files: HashMap<(String, String), Vec<DirectoryEntry>>,
    ) -> Self {
        StubRegistry {
            modules,
            versions,
            files,
            cancel_after: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    fn tick(&self) {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, cancel)) = &self.cancel_after
            && calls >= *after
        {
            cancel.store(true, Ordering::SeqCst);
        }
    }
}

impl ModuleRegistry for StubRegistry {
    fn list_modules(&self) -> Result<Vec<String>, RegistryError> {
        self.tick();
        Ok(self.modules.clone())
    }

    fn list_versions(&self, name: &str) -> Result<VersionList, RegistryError> {
        self.tick();
        self.versions
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                status: 404,
                url: name.to_string(),
            })
    }

    fn list_files(&self, name: &str, version: &str) -> Result<Vec<DirectoryEntry>, RegistryError> {
        self.tick();
        let mut listing = self
            .files
            .get(&(name.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                status: 404,
                url: format!("{name}@{version}"),
            })?;
        strip_listing(&mut listing);
        Ok(listing)
    }
}

// ---- Canned analyzer ----

pub struct StubAnalyzer {
    pub infos: HashMap<String, FileInfo>,
    pub fail: HashSet<String>,
}

impl StubAnalyzer {
    pub fn new(infos: HashMap<String, FileInfo>) -> Self {
        StubAnalyzer {
            infos,
            fail: HashSet::new(),
        }
    }
}

impl DepAnalyzer for StubAnalyzer {
    fn analyze(&self, specifier: &str) -> Result<Option<FileInfo>, AnalyzerError> {
        if self.fail.contains(specifier) {
            return Err(AnalyzerError::Exit {
                specifier: specifier.to_string(),
                code: Some(1),
            });
        }
        self.infos
            .get(specifier)
            .cloned()
            .map(Some)
            .ok_or_else(|| AnalyzerError::Exit {
                specifier: specifier.to_string(),
                code: Some(1),
            })
    }
}

// ---- Builders ----

pub fn file_entry(path: &str, size: u64) -> DirectoryEntry {
    DirectoryEntry {
        path: path.to_string(),
        size,
        kind: EntryKind::File,
    }
}

pub fn dir_entry(path: &str) -> DirectoryEntry {
    DirectoryEntry {
        path: path.to_string(),
        size: 0,
        kind: EntryKind::Dir,
    }
}

/// `FileInfo` for `root` whose `files` map holds `(specifier, deps)` pairs.
pub fn info_with_files(root: &str, files: &[(&str, &[&str])]) -> FileInfo {
    let mut map = std::collections::BTreeMap::new();
    for (specifier, deps) in files {
        map.insert(
            specifier.to_string(),
            FileEntry {
                deps: deps.iter().map(|d| d.to_string()).collect(),
                size: 10,
            },
        );
    }
    FileInfo {
        module: root.to_string(),
        total_size: 10 * files.len() as u64,
        files: map,
    }
}
