//! Idempotency guard — retried mutation requests are safe.
//!
//! Before doing any mutating work for a `(user, requestId)` pair the
//! caller asks [`IdempotencyGuard::find`]; a hit returns the frozen
//! snapshot of the original result and nothing else happens. On a miss
//! the caller computes its effects and folds [`IdempotencyGuard::record`]
//! into the same atomic batch, so the snapshot lands together with every
//! other write or not at all.
//!
//! Snapshots are canonical JSON. Integer amounts inside them serialize as
//! exact decimal strings (see [`crate::codec::string_i64`]) so a replayed
//! result is byte-identical to the first one.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::LedgerResult;
use crate::keys;
use crate::store::{BatchOp, KvStore};

pub struct IdempotencyGuard<'a, S: KvStore> {
    store: &'a S,
}

impl<'a, S: KvStore> IdempotencyGuard<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Look up a previously persisted result. `None` means the request
    /// has never been applied.
    pub fn find<T: DeserializeOwned>(
        &self,
        user: &str,
        request_id: &str,
    ) -> LedgerResult<Option<T>> {
        let key = keys::req(user, request_id);
        match self.store.get(&key)? {
            Some(buf) => {
                log::debug!("idempotent replay for request {request_id}");
                Ok(Some(serde_json::from_slice(&buf)?))
            }
            None => Ok(None),
        }
    }

    /// The op persisting `result` as the frozen snapshot for this
    /// request. Once written it is never overwritten.
    pub fn record<T: Serialize>(
        &self,
        user: &str,
        request_id: &str,
        result: &T,
    ) -> LedgerResult<BatchOp> {
        let key = keys::req(user, request_id);
        Ok(BatchOp::put(key, serde_json::to_vec(result)?))
    }
}
