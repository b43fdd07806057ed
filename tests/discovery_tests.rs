//! Discovery producer behavior with a canned registry.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use common::{StubRegistry, dir_entry, file_entry};
use crossbeam_channel::unbounded;
use modgraph::pipeline::crawl_registry;
use modgraph::queue::{ChanQueue, WorkQueue};
use modgraph::registry::VersionList;

fn version_list(versions: &[&str]) -> VersionList {
    VersionList {
        latest: versions.first().map(|v| v.to_string()).unwrap_or_default(),
        versions: versions.iter().map(|v| v.to_string()).collect(),
    }
}

fn single_file_registry(names: &[&str]) -> StubRegistry {
    let modules = names.iter().map(|n| n.to_string()).collect();
    let mut versions = HashMap::new();
    let mut files = HashMap::new();
    for name in names {
        versions.insert(name.to_string(), version_list(&["1.0.0"]));
        files.insert(
            (name.to_string(), "1.0.0".to_string()),
            vec![file_entry("/mod.ts", 10)],
        );
    }
    StubRegistry::new(modules, versions, files)
}

/// Directory and non-source entries never reach the queue.
#[test]
fn test_discovery_enqueues_filtered_listings() {
    let mut files = HashMap::new();
    files.insert(
        ("mod".to_string(), "1.0.0".to_string()),
        vec![
            dir_entry("a"),
            file_entry("a/b.ts", 10),
            file_entry("a/c.yml", 10),
            file_entry("README.md", 10),
        ],
    );
    let mut versions = HashMap::new();
    versions.insert("mod".to_string(), version_list(&["1.0.0"]));
    let registry = Arc::new(StubRegistry::new(vec!["mod".to_string()], versions, files));

    let cancel = Arc::new(AtomicBool::new(false));
    let queue = Arc::new(ChanQueue::new(8, Arc::clone(&cancel)));
    let (err_tx, err_rx) = unbounded();

    crawl_registry(&registry, &queue, &cancel, &err_tx, None);

    let work = queue.get().unwrap().unwrap();
    assert_eq!(work.name, "mod");
    let paths: Vec<_> = work.versions["1.0.0"]
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(paths, ["a/b.ts", "README.md"]);
    assert!(err_rx.try_recv().is_err());
}

#[test]
fn test_discovery_respects_module_cap() {
    let registry = Arc::new(single_file_registry(&["a", "b", "c"]));
    let cancel = Arc::new(AtomicBool::new(false));
    let queue = Arc::new(ChanQueue::new(8, Arc::clone(&cancel)));
    let (err_tx, _err_rx) = unbounded();

    crawl_registry(&registry, &queue, &cancel, &err_tx, Some(2));

    assert_eq!(queue.approx_depth().unwrap(), 2);
}

/// A registry failure on one module surfaces an error and skips only that
/// module.
#[test]
fn test_discovery_skips_failing_module() {
    let mut registry = single_file_registry(&["good"]);
    registry.modules.push("broken".to_string());
    let registry = Arc::new(registry);

    let cancel = Arc::new(AtomicBool::new(false));
    let queue = Arc::new(ChanQueue::new(8, Arc::clone(&cancel)));
    let (err_tx, err_rx) = unbounded();

    crawl_registry(&registry, &queue, &cancel, &err_tx, None);

    assert_eq!(queue.approx_depth().unwrap(), 1);
    assert_eq!(queue.get().unwrap().unwrap().name, "good");
    assert!(err_rx.try_recv().is_ok());
}

#[test]
fn test_discovery_cancelled_before_start_enqueues_nothing() {
    let registry = Arc::new(single_file_registry(&["a", "b"]));
    let cancel = Arc::new(AtomicBool::new(true));
    let queue = Arc::new(ChanQueue::new(8, Arc::clone(&cancel)));
    let (err_tx, _err_rx) = unbounded();

    crawl_registry(&registry, &queue, &cancel, &err_tx, None);

    assert_eq!(queue.approx_depth().unwrap(), 0);
}

/// Cancellation mid-crawl: whatever was enqueued is a complete, well-formed
/// subset of the full run; nothing is half-written.
#[test]
fn test_discovery_cancel_mid_run() {
    let cancel = Arc::new(AtomicBool::new(false));
    let mut registry = single_file_registry(&["a", "b", "c"]);
    registry.cancel_after = Some((4, Arc::clone(&cancel)));
    let registry = Arc::new(registry);

    let queue = Arc::new(ChanQueue::new(8, Arc::clone(&cancel)));
    let (err_tx, _err_rx) = unbounded();

    crawl_registry(&registry, &queue, &cancel, &err_tx, None);

    let enqueued = queue.approx_depth().unwrap();
    assert!(enqueued < 3, "cancelled crawl must not enqueue everything");
    for _ in 0..enqueued {
        let work = queue.get().unwrap().unwrap();
        assert!(["a", "b", "c"].contains(&work.name.as_str()));
        assert_eq!(work.versions["1.0.0"].len(), 1);
    }
}
