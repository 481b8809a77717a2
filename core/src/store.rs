//! Key-value store boundary.
//!
//! RULE: only this module (and its submodules) talks to a storage engine.
//! Ledger components read through [`KvStore`] and submit exactly one
//! atomic batch per externally-triggered operation.
//!
//! The contract deliberately mirrors the underlying engines: a batch is
//! all-or-nothing, but there is NO isolation between the reads that
//! precede a batch and a concurrent writer touching the same keys. Two
//! concurrent mutating calls for the same user can lose updates; callers
//! that need strict correctness under concurrency must serialize mutating
//! calls per user themselves. No locks or version checks live here.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::LedgerResult;

/// One entry of an atomic write set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl BatchOp {
    pub fn put(key: String, value: impl Into<Vec<u8>>) -> Self {
        BatchOp::Put {
            key,
            value: value.into(),
        }
    }

    pub fn delete(key: String) -> Self {
        BatchOp::Delete { key }
    }
}

/// The ordered key-value primitive the ledger core is layered on.
pub trait KvStore {
    /// Point read. Absent keys return `None` (entities are lazy).
    fn get(&self, key: &str) -> LedgerResult<Option<Vec<u8>>>;

    /// Single-key write, outside any batch.
    fn put(&self, key: &str, value: &[u8]) -> LedgerResult<()>;

    /// Single-key delete, outside any batch.
    fn delete(&self, key: &str) -> LedgerResult<()>;

    /// Apply a write set atomically: either every op lands or none do.
    fn batch(&self, ops: Vec<BatchOp>) -> LedgerResult<()>;

    /// All `(key, value)` pairs whose key starts with `prefix`, in key
    /// order.
    fn scan_prefix(&self, prefix: &str) -> LedgerResult<Vec<(String, Vec<u8>)>>;
}
