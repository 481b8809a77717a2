//! Stack ledger — keeps the primary stack records consistent with the
//! rarity/type/source/tag indexes and the aggregate sums.
//!
//! This is a planning component: `plan` performs every read up front,
//! validates the whole adjustment list, and returns the write set. It
//! never touches the store beyond point reads — the caller folds the ops
//! into its single atomic batch. A failed plan therefore leaves no
//! partial state anywhere.

use std::collections::{BTreeMap, BTreeSet};

use crate::codec;
use crate::error::{LedgerError, LedgerResult};
use crate::keys::{self, Dimension};
use crate::store::{BatchOp, KvStore};
use crate::types::{Rarity, StackId};

/// One requested stack mutation.
#[derive(Debug, Clone)]
pub struct StackAdjust {
    pub stack_id: StackId,
    pub rarity: Rarity,
    pub type_id: String,
    pub delta: i64,
    /// Originating box. Sticky: the first non-zero write wins.
    pub source: Option<String>,
    /// Curated tags to union into the stack's tag map. The caller passes
    /// only filterable tags; the ledger does not consult configuration.
    pub tags: Vec<String>,
}

pub struct StackLedger<'a, S: KvStore> {
    store: &'a S,
}

impl<'a, S: KvStore> StackLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Plan a list of adjustments for one user into a write set.
    ///
    /// Index invariant maintained here: an index entry for a dimension
    /// exists iff the stack's count is positive. Zeroed records stay in
    /// place; only their index entries are removed.
    pub fn plan(&self, user: &str, adjs: &[StackAdjust]) -> LedgerResult<Vec<BatchOp>> {
        if adjs.is_empty() {
            return Ok(Vec::new());
        }

        let mut ops: Vec<BatchOp> = Vec::new();
        let mut rarity_delta: BTreeMap<Rarity, i64> = BTreeMap::new();
        let mut type_delta: BTreeMap<String, i64> = BTreeMap::new();
        let mut src_delta: BTreeMap<String, i64> = BTreeMap::new();
        let mut total_items: i64 = 0;
        let mut total_stacks: i64 = 0;

        for a in adjs {
            let inv_key = keys::inv(user, &a.stack_id);
            let prev = codec::decode_u32(self.store.get(&inv_key)?.as_deref()) as i64;
            let next = prev + a.delta;
            if next < 0 {
                return Err(LedgerError::InventoryUnderflow {
                    stack_id: a.stack_id.clone(),
                });
            }
            ops.push(BatchOp::put(inv_key, codec::encode_u32(next as u32)));

            let src_map_key = keys::src_map(user, &a.stack_id);
            let existing_src = self
                .store
                .get(&src_map_key)?
                .map(|b| String::from_utf8_lossy(&b).into_owned());
            let src_for_stack = existing_src.clone().or_else(|| a.source.clone());

            if prev == 0 && next > 0 {
                ops.push(BatchOp::put(
                    keys::idx_rarity(user, a.rarity, &a.stack_id),
                    b"1".as_slice(),
                ));
                ops.push(BatchOp::put(
                    keys::idx(Dimension::Type, user, &a.type_id, &a.stack_id),
                    b"1".as_slice(),
                ));
                total_stacks += 1;
            } else if prev > 0 && next == 0 {
                ops.push(BatchOp::delete(keys::idx_rarity(user, a.rarity, &a.stack_id)));
                ops.push(BatchOp::delete(keys::idx(
                    Dimension::Type,
                    user,
                    &a.type_id,
                    &a.stack_id,
                )));
                // Tear down whatever tags the stack accumulated.
                let tag_map_key = keys::tag_map(user, &a.stack_id);
                if let Some(buf) = self.store.get(&tag_map_key)? {
                    for tag in parse_tag_map(&buf) {
                        ops.push(BatchOp::delete(keys::idx(
                            Dimension::Tag,
                            user,
                            &tag,
                            &a.stack_id,
                        )));
                    }
                    ops.push(BatchOp::delete(tag_map_key));
                }
                if let Some(src) = &existing_src {
                    ops.push(BatchOp::delete(keys::idx(
                        Dimension::Source,
                        user,
                        src,
                        &a.stack_id,
                    )));
                    ops.push(BatchOp::delete(src_map_key.clone()));
                }
                total_stacks -= 1;
            }

            if next > 0 {
                // Sticky source: first non-zero write wins.
                if let Some(src) = &src_for_stack {
                    if existing_src.is_none() {
                        ops.push(BatchOp::put(
                            keys::idx(Dimension::Source, user, src, &a.stack_id),
                            b"1".as_slice(),
                        ));
                        ops.push(BatchOp::put(src_map_key, src.as_bytes()));
                    } else if prev == 0 {
                        ops.push(BatchOp::put(
                            keys::idx(Dimension::Source, user, src, &a.stack_id),
                            b"1".as_slice(),
                        ));
                    }
                }
                // Tags accumulate (union) on every non-zero write.
                if !a.tags.is_empty() {
                    let tag_map_key = keys::tag_map(user, &a.stack_id);
                    let mut tags: BTreeSet<String> = match self.store.get(&tag_map_key)? {
                        Some(buf) => parse_tag_map(&buf).into_iter().collect(),
                        None => BTreeSet::new(),
                    };
                    let mut changed = false;
                    for t in &a.tags {
                        if tags.insert(t.clone()) {
                            ops.push(BatchOp::put(
                                keys::idx(Dimension::Tag, user, t, &a.stack_id),
                                b"1".as_slice(),
                            ));
                            changed = true;
                        }
                    }
                    if changed {
                        let sorted: Vec<&String> = tags.iter().collect();
                        ops.push(BatchOp::put(tag_map_key, serde_json::to_vec(&sorted)?));
                    }
                }
            }

            *rarity_delta.entry(a.rarity).or_default() += a.delta;
            *type_delta.entry(a.type_id.clone()).or_default() += a.delta;
            if let Some(src) = src_for_stack {
                *src_delta.entry(src).or_default() += a.delta;
            }
            total_items += a.delta;
        }

        for (tier, delta) in &rarity_delta {
            plan_sum(
                self.store,
                keys::sum(Dimension::Rarity, user, tier.as_str()),
                *delta,
                &format!("rarity {tier}"),
                &mut ops,
            )?;
        }
        for (type_id, delta) in &type_delta {
            plan_sum(
                self.store,
                keys::sum(Dimension::Type, user, type_id),
                *delta,
                &format!("type {type_id}"),
                &mut ops,
            )?;
        }
        for (src, delta) in &src_delta {
            plan_sum(
                self.store,
                keys::sum(Dimension::Source, user, src),
                *delta,
                &format!("src {src}"),
                &mut ops,
            )?;
        }
        plan_lazy_sum(
            self.store,
            keys::sum_total_items(user),
            total_items,
            "totalItems",
            &mut ops,
        )?;
        plan_lazy_sum(
            self.store,
            keys::sum_total_stacks(user),
            total_stacks,
            "totalStacks",
            &mut ops,
        )?;

        Ok(ops)
    }
}

/// Read-check-schedule one aggregate. The negative check is unreachable
/// when the per-record checks passed; if it does fire, the whole plan is
/// rejected rather than persisting a corrupt sum.
pub(crate) fn plan_sum<S: KvStore>(
    store: &S,
    key: String,
    delta: i64,
    dimension: &str,
    ops: &mut Vec<BatchOp>,
) -> LedgerResult<()> {
    if delta == 0 {
        return Ok(());
    }
    let cur = codec::decode_u64(store.get(&key)?.as_deref());
    let next = cur as i128 + delta as i128;
    if next < 0 {
        return Err(LedgerError::SumUnderflow {
            dimension: dimension.to_string(),
        });
    }
    ops.push(BatchOp::put(key, codec::encode_u64(next as u64)));
    Ok(())
}

/// Total counters are created lazily: a negative delta against an absent
/// counter is dropped instead of materializing the key.
pub(crate) fn plan_lazy_sum<S: KvStore>(
    store: &S,
    key: String,
    delta: i64,
    dimension: &str,
    ops: &mut Vec<BatchOp>,
) -> LedgerResult<()> {
    if delta == 0 {
        return Ok(());
    }
    let existing = store.get(&key)?;
    if existing.is_none() && delta < 0 {
        return Ok(());
    }
    let cur = codec::decode_u64(existing.as_deref());
    let next = cur as i128 + delta as i128;
    if next < 0 {
        return Err(LedgerError::SumUnderflow {
            dimension: dimension.to_string(),
        });
    }
    ops.push(BatchOp::put(key, codec::encode_u64(next as u64)));
    Ok(())
}

/// Tag maps are stored as a sorted JSON string array. A malformed map
/// reads as empty rather than failing the whole plan.
pub(crate) fn parse_tag_map(buf: &[u8]) -> Vec<String> {
    serde_json::from_slice(buf).unwrap_or_default()
}
