//! Currency ledger — non-negative balances, planned writes only.

use std::collections::BTreeMap;

use crate::codec;
use crate::error::{LedgerError, LedgerResult};
use crate::keys;
use crate::store::{BatchOp, KvStore};
use crate::types::CurrencyCode;

#[derive(Debug, Clone)]
pub struct CurrencyAdjust {
    pub currency: CurrencyCode,
    pub delta: i64,
}

pub struct CurrencyLedger<'a, S: KvStore> {
    store: &'a S,
}

impl<'a, S: KvStore> CurrencyLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Current balance; absent keys read as 0.
    pub fn balance(&self, user: &str, currency: &str) -> LedgerResult<u64> {
        let key = keys::cur(user, currency);
        Ok(codec::decode_u64(self.store.get(&key)?.as_deref()))
    }

    /// Plan a list of adjustments for one user, failing fast on the
    /// first balance that would go negative. Adjustments apply in order
    /// against a working balance, so an earlier credit in the same plan
    /// funds a later debit. No write is issued here — the ops join the
    /// caller's atomic batch.
    pub fn plan(&self, user: &str, adjs: &[CurrencyAdjust]) -> LedgerResult<Vec<BatchOp>> {
        let mut working: BTreeMap<&str, u64> = BTreeMap::new();
        let mut ops = Vec::with_capacity(adjs.len());
        for a in adjs {
            let key = keys::cur(user, &a.currency);
            let cur = match working.get(a.currency.as_str()) {
                Some(v) => *v,
                None => codec::decode_u64(self.store.get(&key)?.as_deref()),
            };
            let next = cur as i128 + a.delta as i128;
            if next < 0 {
                return Err(LedgerError::CurrencyUnderflow {
                    currency: a.currency.clone(),
                });
            }
            working.insert(&a.currency, next as u64);
            ops.push(BatchOp::put(key, codec::encode_u64(next as u64)));
        }
        Ok(ops)
    }
}
