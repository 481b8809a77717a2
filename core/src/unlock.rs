//! Unlock engine — milestone thresholds plus soft/hard-pity RNG gates.
//!
//! Pure planning: `prepare` reads the profile and pity counters, decides
//! what unlocks, and returns the writes for the caller's atomic batch.
//! This component never writes directly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::{CurrencyReward, GameConfig, RngUnlockRule};
use crate::error::LedgerResult;
use crate::keys;
use crate::rng::RngSource;
use crate::store::{BatchOp, KvStore};

/// Basis-point denominator: pity draws sample an integer in [0, 10000).
const BP_SCALE: u64 = 10_000;

/// The monotonically growing per-user unlock set, stored as canonical
/// JSON with sorted ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnlockProfile {
    #[serde(default)]
    pub unlocked_box_ids: BTreeSet<String>,
}

/// Output of one planning pass.
#[derive(Debug, Default)]
pub struct UnlockPlan {
    pub ops: Vec<BatchOp>,
    /// Ids that flipped locked → unlocked on this call, in decision order.
    pub newly_unlocked: Vec<String>,
    /// Milestone rewards to apply — queued only on the call where at
    /// least one of the milestone's targets performed the transition.
    pub reward_currencies: Vec<CurrencyReward>,
}

pub struct UnlockEngine<'a, S: KvStore> {
    store: &'a S,
    config: &'a GameConfig,
}

impl<'a, S: KvStore> UnlockEngine<'a, S> {
    pub fn new(store: &'a S, config: &'a GameConfig) -> Self {
        Self { store, config }
    }

    /// Load the profile; absent or malformed profiles read as empty.
    pub fn load_profile(&self, user: &str) -> LedgerResult<UnlockProfile> {
        let key = keys::unlock_profile(user);
        Ok(match self.store.get(&key)? {
            Some(buf) => serde_json::from_slice(&buf).unwrap_or_default(),
            None => UnlockProfile::default(),
        })
    }

    /// Plan unlocks for a user whose lifetime open counter is about to
    /// become `next_lifetime`. The RNG pass only runs when the call has a
    /// source box.
    pub fn prepare(
        &self,
        user: &str,
        next_lifetime: u64,
        source_box_id: Option<&str>,
        rng: &mut dyn RngSource,
    ) -> LedgerResult<UnlockPlan> {
        let mut profile = self.load_profile(user)?;
        let mut plan = UnlockPlan::default();

        // Milestone pass. A milestone whose targets are all unlocked
        // already grants nothing, even though its requirement still holds.
        for milestone in &self.config.milestones {
            if next_lifetime < milestone.requires_opened {
                continue;
            }
            let mut any_new = false;
            for target in &milestone.unlocks {
                if profile.unlocked_box_ids.insert(target.clone()) {
                    plan.newly_unlocked.push(target.clone());
                    any_new = true;
                }
            }
            if any_new {
                log::debug!(
                    "milestone {} reached at {} opens for {user}",
                    milestone.id,
                    next_lifetime
                );
                plan.reward_currencies.extend(milestone.rewards.iter().cloned());
            }
        }

        // RNG pass. Rules roll even when their target is already
        // unlocked; the counters stay meaningful if a rule is retargeted.
        if let Some(source) = source_box_id {
            for rule in &self.config.rng_unlocks {
                match &rule.scope_box_id {
                    Some(scope) if scope != source => continue,
                    _ => {}
                }
                let tries_key = keys::pity_tries(user, &rule.id);
                let tries = codec::decode_u64(self.store.get(&tries_key)?.as_deref());

                let forced = rule
                    .hard_pity
                    .as_ref()
                    .is_some_and(|h| tries + 1 >= h.guarantee_at);
                let hit = forced || rng.below(BP_SCALE) < chance_bp(rule, tries) as u64;

                let next_tries = if hit {
                    if profile.unlocked_box_ids.insert(rule.target_box_id.clone()) {
                        log::debug!(
                            "rng unlock {} hit for {user} (tries={tries}, forced={forced})",
                            rule.id
                        );
                        plan.newly_unlocked.push(rule.target_box_id.clone());
                    }
                    if rule.reset_on_hit {
                        0
                    } else {
                        tries + 1
                    }
                } else {
                    tries + 1
                };
                plan.ops
                    .push(BatchOp::put(tries_key, codec::encode_u64(next_tries)));
            }
        }

        let profile_key = keys::unlock_profile(user);
        plan.ops
            .push(BatchOp::put(profile_key, serde_json::to_vec(&profile)?));
        Ok(plan)
    }
}

/// Current hit chance of a rule in basis points, after `tries` misses.
/// Soft pity ramps linearly from `start_at` up to its cap.
pub fn chance_bp(rule: &RngUnlockRule, tries: u64) -> u32 {
    match &rule.soft_pity {
        Some(soft) => {
            let ramp_tries = tries.saturating_sub(soft.start_at);
            let ramped = (rule.base_chance_bp as u64)
                .saturating_add(ramp_tries.saturating_mul(soft.delta_bp_per_try as u64));
            ramped.min(soft.cap_bp as u64) as u32
        }
        None => rule.base_chance_bp,
    }
}
