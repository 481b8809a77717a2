//! Loot resolution — weighted drop-table draws, self-drop avoidance,
//! bounded cosmetic rolls, lucky bonuses, and the single atomic batch
//! that applies an open-boxes call.
//!
//! Every step before the commit is planning: reads and checks first, one
//! `batch` at the end. A failed call never leaves partial state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::{DropEntry, GameConfig};
use crate::currency_ledger::{CurrencyAdjust, CurrencyLedger};
use crate::error::{LedgerError, LedgerResult};
use crate::idempotency::IdempotencyGuard;
use crate::keys;
use crate::rng::RngSource;
use crate::stack_ledger::{StackAdjust, StackLedger};
use crate::store::{BatchOp, KvStore};
use crate::types::{Rarity, KEYS};
use crate::unlock::UnlockEngine;

/// Resample attempts before a self-referential draw is dropped outright.
/// The silent skip after the last attempt is intentional: a degenerate
/// table that only contains the box itself yields nothing.
const MAX_SELF_DROP_RESAMPLES: u32 = 5;

/// Shop-gated bulk sizes. Owning a tier's upgrade flag raises the allowed
/// per-request count; without any flag only single opens are allowed.
const BULK_TIERS: [(&str, u32); 3] = [
    ("upg_bulk_10", 10),
    ("upg_bulk_100", 100),
    ("upg_bulk_1000", 1000),
];

/// Lucky bonus: +0.1% chance per 1000 lifetime opens, capped at 5%.
/// One Bernoulli trial per call, not per unit opened.
const LUCKY_OPENS_PER_STEP: u64 = 1000;
const LUCKY_CHANCE_PER_STEP: f64 = 0.001;
const LUCKY_CHANCE_CAP: f64 = 0.05;

/// Bounds for the per-item cosmetic chance: the box-wide chance of at
/// least one cosmetic stays within roughly [1%, 10%].
const COSMETIC_BOX_TARGET: f64 = 0.01;
const COSMETIC_PER_ITEM_CAP: f64 = 0.10;

#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub box_id: String,
    pub count: u32,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackReward {
    pub stack_id: String,
    pub type_id: String,
    pub rarity: Rarity,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDelta {
    pub currency: String,
    #[serde(with = "codec::string_i64")]
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmeticRoll {
    pub type_id: String,
    pub mod_id: String,
    pub mod_name: String,
}

/// The frozen result of one open-boxes call. This exact value is what a
/// retried request gets back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenOutcome {
    pub stacks: Vec<StackReward>,
    /// Net currency movements; the open cost appears as a negative entry
    /// (present even at amount 0).
    pub currencies: Vec<CurrencyDelta>,
    pub unlocked: Vec<String>,
    pub cosmetics: Vec<CosmeticRoll>,
}

struct StackRoll {
    type_id: String,
    rarity: Rarity,
    count: u64,
}

pub struct LootResolver<'a, S: KvStore> {
    store: &'a S,
    config: &'a GameConfig,
}

impl<'a, S: KvStore> LootResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a GameConfig) -> Self {
        Self { store, config }
    }

    /// Open `count` boxes for a user. Retrying with the same request id
    /// returns the original outcome and performs no further mutation.
    pub fn open(
        &self,
        user: &str,
        request: &OpenRequest,
        rng: &mut dyn RngSource,
    ) -> LedgerResult<OpenOutcome> {
        let guard = IdempotencyGuard::new(self.store);
        if let Some(prior) = guard.find::<OpenOutcome>(user, &request.request_id)? {
            return Ok(prior);
        }

        if request.count == 0 {
            return Err(LedgerError::InvalidArgument("count must be > 0".into()));
        }
        let max_per = self.config.economy.max_per_request;
        if request.count > max_per {
            return Err(LedgerError::InvalidArgument(format!(
                "batch too large: max {max_per}"
            )));
        }

        let mut allowed_max = 1;
        for (upgrade_id, size) in BULK_TIERS {
            if self.store.get(&keys::upgrade_flag(user, upgrade_id))?.is_some() {
                allowed_max = size;
            }
        }
        if request.count > allowed_max {
            return Err(LedgerError::BulkLocked {
                requested: request.count,
                allowed: allowed_max,
            });
        }

        let box_def = self
            .config
            .box_def(&request.box_id)
            .ok_or_else(|| LedgerError::UnknownBox {
                box_id: request.box_id.clone(),
            })?;

        let total_cost = self.config.open_cost(box_def) * request.count as u64;
        let currency_ledger = CurrencyLedger::new(self.store);
        let balance = currency_ledger.balance(user, KEYS)?;
        if balance < total_cost {
            return Err(LedgerError::InsufficientFunds {
                currency: KEYS.to_string(),
                needed: total_cost,
                available: balance,
            });
        }

        // ── Draws ──────────────────────────────────────────────────

        let entries = &box_def.drop_table.entries;
        let cosmetics_ctx = CosmeticContext::for_box(self.config, entries);
        let filterable_tags = self.config.filterable_tags();
        let version = self.config.config_version;

        let all: Vec<usize> = (0..entries.len()).collect();
        let non_self: Vec<usize> = all
            .iter()
            .copied()
            .filter(|&i| !entries[i].is_self_drop(&box_def.id))
            .collect();

        let mut rolls: BTreeMap<String, StackRoll> = BTreeMap::new();
        let mut tags_by_stack: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut rolled_currencies: BTreeMap<String, i64> = BTreeMap::new();
        let mut cosmetics: Vec<CosmeticRoll> = Vec::new();
        let mut self_count: u32 = 0;

        for _ in 0..request.count {
            if entries.is_empty() {
                break;
            }
            let mut picked = choose_weighted(entries, &all, rng);
            if entries[picked].is_self_drop(&box_def.id) {
                let allow_self = if box_def.forbid_self_drop {
                    false
                } else if let Some(cap) = box_def.self_drop_cap {
                    self_count < cap
                } else {
                    true
                };
                if allow_self {
                    if box_def.self_drop_cap.is_some() {
                        self_count += 1;
                    }
                } else {
                    for _ in 0..MAX_SELF_DROP_RESAMPLES {
                        if !entries[picked].is_self_drop(&box_def.id) || non_self.is_empty() {
                            break;
                        }
                        picked = choose_weighted(entries, &non_self, rng);
                    }
                    if entries[picked].is_self_drop(&box_def.id) {
                        // Drop the draw: no reward for this iteration.
                        continue;
                    }
                }
            }

            match &entries[picked] {
                DropEntry::Item {
                    item_id, rarity, ..
                } => {
                    let mut applied_tag: Option<String> = None;
                    let eligible = &cosmetics_ctx.eligible_pools[picked];
                    if !eligible.is_empty() && rng.chance(cosmetics_ctx.per_item_chance) {
                        let idx = rng.below(eligible.len() as u64) as usize;
                        let mod_id = eligible[idx].clone();
                        let modifier = self.config.modifier(&mod_id);
                        let mod_name = modifier
                            .map(|m| {
                                if m.name.is_empty() {
                                    m.id.clone()
                                } else {
                                    m.name.clone()
                                }
                            })
                            .unwrap_or_else(|| mod_id.clone());
                        cosmetics.push(CosmeticRoll {
                            type_id: item_id.clone(),
                            mod_id: mod_id.clone(),
                            mod_name,
                        });
                        applied_tag = modifier.and_then(|m| m.curated_tag.clone());
                    }

                    let stack_id =
                        stack_signature(item_id, *rarity, applied_tag.as_deref(), version);
                    add_roll(&mut rolls, &stack_id, item_id, *rarity, 1);
                    if let Some(tag) = applied_tag {
                        if filterable_tags.contains(tag.as_str()) {
                            tags_by_stack.entry(stack_id).or_default().insert(tag);
                        }
                    }
                }
                DropEntry::Currency {
                    currency, amount, ..
                } => {
                    let amt = amount.roll(rng) as i64;
                    *rolled_currencies.entry(currency.clone()).or_default() += amt;
                }
                DropEntry::Box { box_id, count, .. } => {
                    let amt = count.roll(rng);
                    let stack_id = stack_signature(box_id, Rarity::Common, None, version);
                    add_roll(&mut rolls, &stack_id, box_id, Rarity::Common, amt);
                }
                DropEntry::Material {
                    material_id,
                    amount,
                    ..
                } => {
                    let amt = amount.roll(rng);
                    let stack_id = stack_signature(material_id, Rarity::Common, None, version);
                    add_roll(&mut rolls, &stack_id, material_id, Rarity::Common, amt);
                }
            }
        }

        // ── Plan ───────────────────────────────────────────────────

        let mut ops: Vec<BatchOp> = Vec::new();

        let lifetime_key = keys::lifetime_opened(user);
        let prior_opened = codec::decode_u64(self.store.get(&lifetime_key)?.as_deref());
        let lucky_steps = prior_opened / LUCKY_OPENS_PER_STEP;
        let lucky_chance = (lucky_steps as f64 * LUCKY_CHANCE_PER_STEP).min(LUCKY_CHANCE_CAP);
        let lucky_bonus: i64 = if rng.next_f64() < lucky_chance { 1 } else { 0 };
        if lucky_bonus > 0 {
            log::debug!("lucky bonus hit for {user} at {prior_opened} lifetime opens");
        }

        let stack_ledger = StackLedger::new(self.store);
        let adjustments: Vec<StackAdjust> = rolls
            .iter()
            .map(|(stack_id, roll)| StackAdjust {
                stack_id: stack_id.clone(),
                rarity: roll.rarity,
                type_id: roll.type_id.clone(),
                delta: roll.count as i64,
                source: Some(box_def.id.clone()),
                tags: tags_by_stack
                    .get(stack_id)
                    .map(|t| t.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();
        ops.extend(stack_ledger.plan(user, &adjustments)?);

        let next_opened = prior_opened + request.count as u64;
        ops.push(BatchOp::put(lifetime_key, codec::encode_u64(next_opened)));

        let unlock_engine = UnlockEngine::new(self.store, self.config);
        let unlock_plan =
            unlock_engine.prepare(user, next_opened, Some(&box_def.id), rng)?;
        ops.extend(unlock_plan.ops);

        let mut reward_by_currency: BTreeMap<String, i64> = BTreeMap::new();
        for reward in &unlock_plan.reward_currencies {
            *reward_by_currency.entry(reward.currency.clone()).or_default() +=
                reward.amount as i64;
        }

        // One read-modify-write per currency across cost, lucky bonus,
        // milestone rewards, and rolled drops.
        let mut net: BTreeMap<String, i64> = BTreeMap::new();
        *net.entry(KEYS.to_string()).or_default() += lucky_bonus - total_cost as i64;
        for (currency, amount) in &reward_by_currency {
            *net.entry(currency.clone()).or_default() += amount;
        }
        for (currency, amount) in &rolled_currencies {
            *net.entry(currency.clone()).or_default() += amount;
        }
        let currency_adjustments: Vec<CurrencyAdjust> = net
            .iter()
            .filter(|(_, delta)| **delta != 0)
            .map(|(currency, delta)| CurrencyAdjust {
                currency: currency.clone(),
                delta: *delta,
            })
            .collect();
        ops.extend(currency_ledger.plan(user, &currency_adjustments)?);

        // ── Outcome & commit ───────────────────────────────────────

        let mut currencies = vec![CurrencyDelta {
            currency: KEYS.to_string(),
            amount: -(total_cost as i64),
        }];
        if lucky_bonus > 0 {
            currencies.push(CurrencyDelta {
                currency: KEYS.to_string(),
                amount: lucky_bonus,
            });
        }
        for (currency, amount) in &reward_by_currency {
            currencies.push(CurrencyDelta {
                currency: currency.clone(),
                amount: *amount,
            });
        }
        for (currency, amount) in &rolled_currencies {
            currencies.push(CurrencyDelta {
                currency: currency.clone(),
                amount: *amount,
            });
        }

        let outcome = OpenOutcome {
            stacks: rolls
                .iter()
                .map(|(stack_id, roll)| StackReward {
                    stack_id: stack_id.clone(),
                    type_id: roll.type_id.clone(),
                    rarity: roll.rarity,
                    count: roll.count,
                })
                .collect(),
            currencies,
            unlocked: unlock_plan.newly_unlocked,
            cosmetics,
        };

        ops.push(guard.record(user, &request.request_id, &outcome)?);
        self.store.batch(ops)?;
        Ok(outcome)
    }
}

/// The stack signature: item/type id, rarity, optional curated tag, and
/// the content version, so tagged variants stay distinct stacks.
fn stack_signature(type_id: &str, rarity: Rarity, tag: Option<&str>, version: u32) -> String {
    match tag {
        Some(tag) => format!("{type_id}_{rarity}_t:{tag}_v{version}"),
        None => format!("{type_id}_{rarity}_v{version}"),
    }
}

fn add_roll(
    rolls: &mut BTreeMap<String, StackRoll>,
    stack_id: &str,
    type_id: &str,
    rarity: Rarity,
    count: u64,
) {
    rolls
        .entry(stack_id.to_string())
        .or_insert_with(|| StackRoll {
            type_id: type_id.to_string(),
            rarity,
            count: 0,
        })
        .count += count;
}

/// One weighted draw over `candidates` (indices into `entries`): draw r
/// uniformly in [0, totalWeight), subtract weights in table order, and
/// take the last candidate as the fallback for floating-point rounding.
fn choose_weighted(
    entries: &[DropEntry],
    candidates: &[usize],
    rng: &mut dyn RngSource,
) -> usize {
    let total: f64 = candidates.iter().map(|&i| entries[i].weight()).sum();
    let mut r = rng.next_f64() * total;
    for &i in candidates {
        r -= entries[i].weight();
        if r <= 0.0 {
            return i;
        }
    }
    candidates[candidates.len() - 1]
}

/// Per-box cosmetic-roll context, computed once per open call.
struct CosmeticContext {
    /// For each drop-table entry: the modifier ids an ITEM draw may roll,
    /// i.e. pool ∩ item's allowed modifiers ∩ cosmetic category. Empty
    /// for non-item entries.
    eligible_pools: Vec<Vec<String>>,
    /// Clamped so the box-wide chance of at least one cosmetic stays
    /// within roughly [1%, 10%].
    per_item_chance: f64,
}

impl CosmeticContext {
    fn for_box(config: &GameConfig, entries: &[DropEntry]) -> Self {
        let cosmetic_ids = config.cosmetic_mod_ids();
        let mut eligible_pools = Vec::with_capacity(entries.len());
        let mut total_weight = 0.0;
        let mut eligible_weight = 0.0;

        for entry in entries {
            total_weight += entry.weight();
            let pool = match entry {
                DropEntry::Item {
                    item_id,
                    static_mods_pool,
                    ..
                } => {
                    let allowed = config.allowed_mods(item_id);
                    static_mods_pool
                        .iter()
                        .filter(|id| {
                            cosmetic_ids.contains(id.as_str()) && allowed.contains(id.as_str())
                        })
                        .cloned()
                        .collect()
                }
                _ => Vec::new(),
            };
            if !pool.is_empty() {
                eligible_weight += entry.weight();
            }
            eligible_pools.push(pool);
        }

        let eligible_prob = if total_weight > 0.0 {
            eligible_weight / total_weight
        } else {
            0.0
        };
        let per_item_chance = if eligible_prob > 0.0 {
            (COSMETIC_BOX_TARGET / eligible_prob).min(COSMETIC_PER_ITEM_CAP)
        } else {
            0.0
        };

        Self {
            eligible_pools,
            per_item_chance,
        }
    }
}
