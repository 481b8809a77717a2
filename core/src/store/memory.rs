//! In-memory engine over an ordered map. Used by tests and as the
//! reference implementation of the [`KvStore`] contract.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use crate::error::LedgerResult;

use super::{BatchOp, KvStore};

#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> LedgerResult<()> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> LedgerResult<()> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        Ok(())
    }

    fn batch(&self, ops: Vec<BatchOp>) -> LedgerResult<()> {
        // The whole set is applied under one lock acquisition, so a
        // concurrent reader never observes a partial batch.
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> LedgerResult<Vec<(String, Vec<u8>)>> {
        let map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::new();
        let range = map.range::<String, _>((Bound::Included(prefix.to_string()), Bound::Unbounded));
        for (k, v) in range {
            if !k.starts_with(prefix) {
                break;
            }
            out.push((k.clone(), v.clone()));
        }
        Ok(out)
    }
}
