//! Writer stages: Module nodes ahead of analysis, file graphs after it.
//!
//! Identities are resolved in three layers: already resolved in this
//! transaction, recorded in the ledger, or minted as a fresh blank. Blanks
//! are assigned real identities by the store per mutation; those assignments
//! flow back into the transaction state and, after commit, into the ledger.

use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::error::{CrawlError, error_chain};
use crate::ledger::{LedgerError, PutOutcome, SpecifierLedger};
use crate::metrics::TXN_COMMIT_SECONDS;
use crate::types::{AnalyzedModule, FileEntry, ModuleWork, version_key};

use super::{FileNode, GraphError, GraphStore, GraphTxn, ModuleNode, UidRef, VersionNode, blank};

/// Write the `Module` node for a work unit in its own transaction, reusing
/// the ledger identity for the name when one exists. Failures skip the
/// module's node, never the work unit itself.
pub fn insert_module<G: GraphStore, L: SpecifierLedger>(
    graph: &G,
    ledger: &L,
    work: &ModuleWork,
) -> Result<(), CrawlError> {
    let uid = match ledger.get(&work.name)? {
        Some(uid) => uid,
        None => blank(&work.name),
    };
    let fresh = uid.starts_with("_:");

    let node = ModuleNode {
        uid,
        name: work.name.clone(),
        stars: 0,
        dtype: vec!["Module".to_string()],
    };
    let set = serde_json::to_value(&node).map_err(GraphError::Marshal)?;

    let mut txn = graph.txn();
    let uids = match txn.mutate(&set) {
        Ok(uids) => uids,
        Err(err) => {
            txn.discard();
            return Err(err.into());
        }
    };
    let start = Instant::now();
    txn.commit()?;
    TXN_COMMIT_SECONDS.observe(start.elapsed().as_secs_f64());

    if fresh
        && let Some(resolved) = uids.get(&work.name)
    {
        ledger.put(&work.name, resolved)?;
    }
    debug!("module node written for {}", work.name);
    Ok(())
}

/// Identity resolution state for one file-writing transaction.
struct TxnIdentities<'a, L: SpecifierLedger> {
    ledger: &'a L,
    /// key → identity, from ledger hits and resolved blanks.
    known: HashMap<String, String>,
    /// key → identity for blanks minted by this transaction's mutations.
    minted: HashMap<String, String>,
    /// Keys referenced by a blank that no mutation has resolved yet.
    pending: HashSet<String>,
}

impl<'a, L: SpecifierLedger> TxnIdentities<'a, L> {
    fn new(ledger: &'a L) -> Self {
        TxnIdentities {
            ledger,
            known: HashMap::new(),
            minted: HashMap::new(),
            pending: HashSet::new(),
        }
    }

    /// Resolve a key to `(identity, fresh)`. `fresh` means the identity is a
    /// blank this transaction has not written a node for yet.
    fn resolve(&mut self, key: &str) -> Result<(String, bool), LedgerError> {
        if let Some(uid) = self.known.get(key) {
            return Ok((uid.clone(), false));
        }
        if self.pending.contains(key) {
            return Ok((blank(key), true));
        }
        if let Some(uid) = self.ledger.get(key)? {
            self.known.insert(key.to_string(), uid.clone());
            return Ok((uid, false));
        }
        self.pending.insert(key.to_string());
        Ok((blank(key), true))
    }

    /// Fold one mutation's blank → identity assignments into the state.
    fn absorb(&mut self, uids: HashMap<String, String>) {
        for (key, uid) in uids {
            self.pending.remove(&key);
            self.minted.entry(key.clone()).or_insert_with(|| uid.clone());
            self.known.entry(key).or_insert(uid);
        }
    }
}

/// Commit one module's file graph in a single transaction, then record the
/// minted identities in the ledger. A failed mutation or commit discards
/// everything; the caller must not acknowledge the queue message in that
/// case. Per-file ledger failures skip only the affected file.
pub fn insert_module_files<G: GraphStore, L: SpecifierLedger>(
    graph: &G,
    ledger: &L,
    module: &AnalyzedModule,
) -> Result<(), CrawlError> {
    let mut txn = graph.txn();
    let mut ids = TxnIdentities::new(ledger);

    for analysis in &module.versions {
        let mut roots: Vec<String> = Vec::new();
        for info in &analysis.infos {
            for (specifier, entry) in &info.files {
                match write_file(&mut txn, &mut ids, specifier, entry) {
                    Ok(()) => {}
                    Err(CrawlError::Ledger(err)) => {
                        warn!("skipping {}: {}", specifier, error_chain(&err));
                    }
                    Err(err) => {
                        txn.discard();
                        return Err(err);
                    }
                }
            }
            if let Some(uid) = ids.known.get(&info.module) {
                roots.push(uid.clone());
            }
        }
        match write_version(&mut txn, &mut ids, &module.name, &analysis.version, roots) {
            Ok(()) => {}
            Err(CrawlError::Ledger(err)) => {
                warn!(
                    "skipping version node {}: {}",
                    version_key(&module.name, &analysis.version),
                    error_chain(&err)
                );
            }
            Err(err) => {
                txn.discard();
                return Err(err);
            }
        }
    }

    let start = Instant::now();
    txn.commit()?;
    TXN_COMMIT_SECONDS.observe(start.elapsed().as_secs_f64());
    info!("transaction completed for {}", module.name);

    // Only now is it safe to publish identities: a discarded transaction
    // must leave no ledger entries behind.
    for (key, uid) in &ids.minted {
        if key.starts_with("https://") {
            publish_identity(ledger, key, uid);
        }
    }
    for analysis in &module.versions {
        let key = version_key(&module.name, &analysis.version);
        if let Some(uid) = ids.minted.get(&key) {
            publish_identity(ledger, &key, uid);
        }
    }
    Ok(())
}

/// Record one minted identity. A conditional-failure means another writer
/// committed the key first; re-read the winner so the loss is visible, and
/// keep the winner's identity for every future edge.
fn publish_identity<L: SpecifierLedger>(ledger: &L, key: &str, uid: &str) {
    match ledger.put(key, uid) {
        Ok(PutOutcome::Inserted) => {}
        Ok(PutOutcome::AlreadyExists) => {
            if let Ok(Some(winner)) = ledger.get(key)
                && winner != uid
            {
                warn!(
                    "identity race for {}: ledger kept {}, this transaction wrote {}",
                    key, winner, uid
                );
            }
        }
        Err(err) => {
            warn!("failed to record identity for {}: {}", key, error_chain(&err));
        }
    }
}

/// Mutate one `File` node with its dependency edges. Fresh dependencies are
/// written as placeholder nodes in the same mutation so no edge dangles, and
/// so mutual references resolve to one identity each.
fn write_file<T: GraphTxn, L: SpecifierLedger>(
    txn: &mut T,
    ids: &mut TxnIdentities<'_, L>,
    specifier: &str,
    entry: &FileEntry,
) -> Result<(), CrawlError> {
    let mut deps = Vec::with_capacity(entry.deps.len());
    for dep in &entry.deps {
        let (uid, fresh) = ids.resolve(dep)?;
        deps.push(if fresh {
            FileNode::placeholder(uid, dep.clone())
        } else {
            FileNode::reference(uid)
        });
    }
    let (uid, _) = ids.resolve(specifier)?;
    let node = FileNode {
        uid,
        specifier: Some(specifier.to_string()),
        depends_on: deps,
        dtype: vec!["File".to_string()],
    };
    let set = serde_json::to_value(&node).map_err(GraphError::Marshal)?;
    let uids = txn.mutate(&set)?;
    ids.absorb(uids);
    Ok(())
}

/// Mutate the `ModuleVersion` node for one version and link it from its
/// `Module` node. The link is skipped when the module has no identity yet
/// (its own insert failed earlier); a later crawl repairs it.
fn write_version<T: GraphTxn, L: SpecifierLedger>(
    txn: &mut T,
    ids: &mut TxnIdentities<'_, L>,
    name: &str,
    version: &str,
    roots: Vec<String>,
) -> Result<(), CrawlError> {
    let key = version_key(name, version);
    let (uid, _) = ids.resolve(&key)?;
    let node = VersionNode {
        uid,
        module_version: key.clone(),
        file_specifier: roots.into_iter().map(|uid| UidRef { uid }).collect(),
        dtype: vec!["ModuleVersion".to_string()],
    };
    let set = serde_json::to_value(&node).map_err(GraphError::Marshal)?;
    let uids = txn.mutate(&set)?;
    ids.absorb(uids);

    let version_uid = ids.known.get(&key).cloned();
    match ids.resolve(name)? {
        (module_uid, false) => {
            if let Some(version_uid) = version_uid {
                let link =
                    serde_json::json!({"uid": module_uid, "version": [{"uid": version_uid}]});
                let uids = txn.mutate(&link)?;
                ids.absorb(uids);
            }
        }
        (_, true) => {
            debug!("module {} has no identity yet, skipping version link", name);
        }
    }
    Ok(())
}
