//! Salvage — bulk-convert low-tier stacks to scrap.
//!
//! Candidates come from the rarity indexes of every tier at or below the
//! requested ceiling, optionally intersected with a type filter. Stacks
//! carrying curated tags are never salvaged, whatever their rarity or
//! type. All reads precede the single atomic commit.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::GameConfig;
use crate::error::LedgerResult;
use crate::keys::{self, Dimension};
use crate::loot::CurrencyDelta;
use crate::stack_ledger::{plan_lazy_sum, plan_sum};
use crate::store::{BatchOp, KvStore};
use crate::types::{Rarity, StackId, SCRAP};

/// Greedy bonus: +1% scrap per 100 lifetime opens, capped at +100%.
const GREEDY_OPENS_PER_STEP: u64 = 100;
const GREEDY_BONUS_PER_STEP: f64 = 0.01;
const GREEDY_BONUS_CAP: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SalvageRequest {
    /// Highest tier to salvage, inclusive.
    pub max_rarity: Rarity,
    /// When non-empty, only stacks of these types are considered.
    pub type_ids: Vec<String>,
    /// Accepted for interface compatibility; stacks carrying curated
    /// tags are excluded unconditionally, so this has no further effect.
    pub static_mod_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrappedStack {
    pub stack_id: StackId,
    pub type_id: String,
    pub rarity: Rarity,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalvageOutcome {
    pub scrapped: Vec<ScrappedStack>,
    pub currencies: Vec<CurrencyDelta>,
}

pub struct SalvageResolver<'a, S: KvStore> {
    store: &'a S,
    config: &'a GameConfig,
}

impl<'a, S: KvStore> SalvageResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a GameConfig) -> Self {
        Self { store, config }
    }

    pub fn salvage(&self, user: &str, request: &SalvageRequest) -> LedgerResult<SalvageOutcome> {
        let tiers = Rarity::tiers_up_to(request.max_rarity);

        // Optional type filter: union of the type indexes' stack ids.
        let type_filter: Option<BTreeSet<StackId>> = if request.type_ids.is_empty() {
            None
        } else {
            let mut set = BTreeSet::new();
            for type_id in &request.type_ids {
                let prefix = keys::idx_prefix(Dimension::Type, user, type_id);
                for (key, _) in self.store.scan_prefix(&prefix)? {
                    let stack_id = &key[prefix.len()..];
                    if !stack_id.is_empty() {
                        set.insert(stack_id.to_string());
                    }
                }
            }
            Some(set)
        };

        // Candidates per tier. The scan that finds a stack also tells us
        // its tier, so no per-stack rarity probing is needed later.
        let mut candidates: BTreeMap<StackId, Rarity> = BTreeMap::new();
        for &tier in tiers {
            let prefix = keys::idx_prefix(Dimension::Rarity, user, tier.as_str());
            for (key, _) in self.store.scan_prefix(&prefix)? {
                let stack_id = &key[prefix.len()..];
                if stack_id.is_empty() {
                    continue;
                }
                if let Some(filter) = &type_filter {
                    if !filter.contains(stack_id) {
                        continue;
                    }
                }
                candidates.insert(stack_id.to_string(), tier);
            }
        }

        // One pass over the type dimension resolves every candidate's
        // type id for index teardown and the type sums.
        let type_prefix = keys::idx_dim_prefix(Dimension::Type, user);
        let mut type_of: BTreeMap<StackId, String> = BTreeMap::new();
        for (key, _) in self.store.scan_prefix(&type_prefix)? {
            let rest = &key[type_prefix.len()..];
            if let Some(split) = rest.find(':') {
                let (type_id, stack_id) = (&rest[..split], &rest[split + 1..]);
                if !type_id.is_empty() && candidates.contains_key(stack_id) {
                    type_of.insert(stack_id.to_string(), type_id.to_string());
                }
            }
        }

        let mut ops: Vec<BatchOp> = Vec::new();
        let mut scrapped: Vec<ScrappedStack> = Vec::new();
        let mut total_scrap: u64 = 0;
        let mut rarity_delta: BTreeMap<Rarity, i64> = BTreeMap::new();
        let mut type_delta: BTreeMap<String, i64> = BTreeMap::new();
        let mut src_delta: BTreeMap<String, i64> = BTreeMap::new();
        let mut total_items: i64 = 0;
        let mut total_stacks: i64 = 0;

        for (stack_id, &tier) in &candidates {
            // Variants are never salvaged.
            if self.store.get(&keys::tag_map(user, stack_id))?.is_some() {
                continue;
            }
            let inv_key = keys::inv(user, stack_id);
            let count = codec::decode_u32(self.store.get(&inv_key)?.as_deref()) as u64;
            if count == 0 {
                continue;
            }

            ops.push(BatchOp::put(inv_key, codec::encode_u32(0)));
            ops.push(BatchOp::delete(keys::idx_rarity(user, tier, stack_id)));
            let type_id = type_of.get(stack_id).cloned();
            if let Some(type_id) = &type_id {
                ops.push(BatchOp::delete(keys::idx(
                    Dimension::Type,
                    user,
                    type_id,
                    stack_id,
                )));
                *type_delta.entry(type_id.clone()).or_default() -= count as i64;
            }
            let src_map_key = keys::src_map(user, stack_id);
            if let Some(buf) = self.store.get(&src_map_key)? {
                let src = String::from_utf8_lossy(&buf).into_owned();
                ops.push(BatchOp::delete(keys::idx(
                    Dimension::Source,
                    user,
                    &src,
                    stack_id,
                )));
                ops.push(BatchOp::delete(src_map_key));
                *src_delta.entry(src).or_default() -= count as i64;
            }

            *rarity_delta.entry(tier).or_default() -= count as i64;
            total_items -= count as i64;
            total_stacks -= 1;
            total_scrap += self.config.salvage_rate(tier) * count;
            scrapped.push(ScrappedStack {
                stack_id: stack_id.clone(),
                type_id: type_id.unwrap_or_else(|| "Unknown".to_string()),
                rarity: tier,
                count,
            });
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

        // Greedy bonus scales the whole haul, floored after multiplying.
        let lifetime = codec::decode_u64(
            self.store.get(&keys::lifetime_opened(user))?.as_deref(),
        );
        let greedy_steps = lifetime / GREEDY_OPENS_PER_STEP;
        let greedy_bonus = (greedy_steps as f64 * GREEDY_BONUS_PER_STEP).min(GREEDY_BONUS_CAP);
        let total_with_greedy = (total_scrap as f64 * (1.0 + greedy_bonus)).floor() as u64;

        if total_with_greedy > 0 {
            let scrap_key = keys::cur(user, SCRAP);
            let balance = codec::decode_u64(self.store.get(&scrap_key)?.as_deref());
            ops.push(BatchOp::put(
                scrap_key,
                codec::encode_u64(balance + total_with_greedy),
            ));
        }

        log::debug!(
            "salvage for {user}: {} stacks, {total_with_greedy} scrap (greedy {greedy_bonus:.2})",
            scrapped.len()
        );
        self.store.batch(ops)?;

        Ok(SalvageOutcome {
            scrapped,
            currencies: vec![CurrencyDelta {
                currency: SCRAP.to_string(),
                amount: total_with_greedy as i64,
            }],
        })
    }
}
