//! Conditional-insert semantics of the specifier ledger.

use modgraph::ledger::{PutOutcome, SpecifierLedger, SqliteLedger};

#[test]
fn test_get_missing_key() {
    let ledger = SqliteLedger::open_in_memory().unwrap();
    assert_eq!(ledger.get("https://deno.land/x/foo@1.0.0/mod.ts").unwrap(), None);
}

#[test]
fn test_put_then_get() {
    let ledger = SqliteLedger::open_in_memory().unwrap();
    let outcome = ledger
        .put("https://deno.land/x/foo@1.0.0/mod.ts", "0x1")
        .unwrap();
    assert_eq!(outcome, PutOutcome::Inserted);
    assert_eq!(
        ledger.get("https://deno.land/x/foo@1.0.0/mod.ts").unwrap(),
        Some("0x1".to_string())
    );
}

/// The first writer wins; the losing insert is a no-op, not an error.
#[test]
fn test_conditional_insert_keeps_first_identity() {
    let ledger = SqliteLedger::open_in_memory().unwrap();
    ledger.put("https://deno.land/std@0.50.0/http/server.ts", "0x1").unwrap();
    let outcome = ledger
        .put("https://deno.land/std@0.50.0/http/server.ts", "0x2")
        .unwrap();
    assert_eq!(outcome, PutOutcome::AlreadyExists);
    assert_eq!(
        ledger.get("https://deno.land/std@0.50.0/http/server.ts").unwrap(),
        Some("0x1".to_string())
    );
}

#[test]
fn test_file_backed_ledger_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    {
        let ledger = SqliteLedger::open(&path).unwrap();
        ledger.put("foo", "0x1").unwrap();
    }
    let reopened = SqliteLedger::open(&path).unwrap();
    assert_eq!(reopened.get("foo").unwrap(), Some("0x1".to_string()));
}
