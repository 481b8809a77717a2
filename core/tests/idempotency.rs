//! Idempotency guard: a recorded result is replayed byte-for-byte.

use serde::{Deserialize, Serialize};

use lootvault_core::idempotency::IdempotencyGuard;
use lootvault_core::keys;
use lootvault_core::store::{KvStore, MemoryStore};

// ── Test helpers ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FakeOutcome {
    granted: Vec<String>,
    spent: i64,
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn miss_returns_none() {
    let store = MemoryStore::new();
    let guard = IdempotencyGuard::new(&store);
    let found: Option<FakeOutcome> = guard.find("u1", "req-1").unwrap();
    assert!(found.is_none());
}

#[test]
fn recorded_result_replays_identically() {
    let store = MemoryStore::new();
    let guard = IdempotencyGuard::new(&store);

    let outcome = FakeOutcome {
        granted: vec!["sword_COMMON_v1".to_string()],
        spent: -10,
    };
    let op = guard.record("u1", "req-1", &outcome).unwrap();
    store.batch(vec![op]).unwrap();

    let replay: FakeOutcome = guard.find("u1", "req-1").unwrap().expect("hit");
    assert_eq!(replay, outcome);
}

/// Request ids are scoped per user: the same id under another user is a
/// miss.
#[test]
fn request_ids_are_per_user() {
    let store = MemoryStore::new();
    let guard = IdempotencyGuard::new(&store);
    let outcome = FakeOutcome {
        granted: Vec::new(),
        spent: 0,
    };
    store
        .batch(vec![guard.record("u1", "req-1", &outcome).unwrap()])
        .unwrap();

    let other: Option<FakeOutcome> = guard.find("u2", "req-1").unwrap();
    assert!(other.is_none());
}

/// The stored snapshot is canonical JSON under the request key, so a
/// replay does not depend on in-memory state.
#[test]
fn snapshot_is_stored_under_request_key() {
    let store = MemoryStore::new();
    let guard = IdempotencyGuard::new(&store);
    let outcome = FakeOutcome {
        granted: Vec::new(),
        spent: 7,
    };
    store
        .batch(vec![guard.record("u1", "req-9", &outcome).unwrap()])
        .unwrap();

    let raw = store.get(&keys::req("u1", "req-9")).unwrap().expect("stored");
    let parsed: FakeOutcome = serde_json::from_slice(&raw).unwrap();
    assert_eq!(parsed, outcome);
}
