//! Graph schema, node shapes, and the store/transaction seam.

pub mod dgraph;
pub mod writer;

pub use dgraph::DgraphClient;

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Graph types and predicates. Applied once at startup; failure is fatal.
pub const SCHEMA: &str = r#"
    type Module {
        name
        description
        stars
        version
    }
    type ModuleVersion {
        module_version
        README
        file_specifier
    }
    type File {
        specifier
        depends_on
    }
    name: string @index(term, fulltext, trigram) .
    description: string @index(term, fulltext, trigram) .
    stars: int .
    version: [uid] @reverse .
    module_version: string @index(term, fulltext, trigram) .
    README: string @index(term, fulltext, trigram) .
    file_specifier: [uid] .
    specifier: string @index(term, fulltext, trigram) .
    depends_on: [uid] @reverse .
"#;

/// Failures against the graph store. A failed mutation or commit discards
/// the transaction and skips the module; its queue message is redelivered.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph request to {path} failed")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("graph call failed: {message}")]
    Api { message: String },

    #[error("failed to decode graph response")]
    Decode(#[source] serde_json::Error),

    #[error("failed to marshal mutation")]
    Marshal(#[source] serde_json::Error),
}

/// A `File` node, or a bare `{uid}` reference to one when only `uid` is set.
/// Fresh dependencies carry their specifier so the placeholder node written
/// for them is queryable on its own.
#[derive(Clone, Debug, Serialize)]
pub struct FileNode {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<FileNode>,
    #[serde(rename = "dgraph.type", skip_serializing_if = "Vec::is_empty")]
    pub dtype: Vec<String>,
}

impl FileNode {
    /// Bare reference to an already-known node.
    pub fn reference(uid: String) -> Self {
        FileNode {
            uid,
            specifier: None,
            depends_on: Vec::new(),
            dtype: Vec::new(),
        }
    }

    /// Placeholder for a specifier seen only as a dependency so far.
    pub fn placeholder(uid: String, specifier: String) -> Self {
        FileNode {
            uid,
            specifier: Some(specifier),
            depends_on: Vec::new(),
            dtype: vec!["File".to_string()],
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UidRef {
    pub uid: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModuleNode {
    pub uid: String,
    pub name: String,
    pub stars: i64,
    #[serde(rename = "dgraph.type")]
    pub dtype: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VersionNode {
    pub uid: String,
    pub module_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_specifier: Vec<UidRef>,
    #[serde(rename = "dgraph.type")]
    pub dtype: Vec<String>,
}

/// Blank identity for a key not yet known to the graph or the ledger.
pub fn blank(key: &str) -> String {
    format!("_:{key}")
}

/// The graph database seam. The HTTP implementation is [`DgraphClient`];
/// tests substitute an in-memory store.
pub trait GraphStore: Send + Sync {
    type Txn: GraphTxn;

    fn alter(&self, schema: &str) -> Result<(), GraphError>;
    fn txn(&self) -> Self::Txn;
}

/// One transaction. `mutate` returns the blank → identity assignments the
/// store resolved for this mutation, keyed by the blank's label.
pub trait GraphTxn {
    fn mutate(&mut self, set: &serde_json::Value) -> Result<HashMap<String, String>, GraphError>;
    fn commit(self) -> Result<(), GraphError>;
    fn discard(self);
}
