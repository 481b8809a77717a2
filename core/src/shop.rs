//! Upgrade purchases. Owned upgrades are per-user boolean flags; the
//! loot resolver consults them to gate bulk open tiers.

use std::collections::BTreeSet;

use crate::config::{GameConfig, UpgradeDef};
use crate::currency_ledger::{CurrencyAdjust, CurrencyLedger};
use crate::error::{LedgerError, LedgerResult};
use crate::keys;
use crate::store::{BatchOp, KvStore};
use crate::types::SCRAP;

pub struct ShopService<'a, S: KvStore> {
    store: &'a S,
    config: &'a GameConfig,
}

impl<'a, S: KvStore> ShopService<'a, S> {
    pub fn new(store: &'a S, config: &'a GameConfig) -> Self {
        Self { store, config }
    }

    /// Upgrades on offer, in config order.
    pub fn catalog(&self) -> &[UpgradeDef] {
        &self.config.economy.upgrades
    }

    /// Upgrade ids the user already owns.
    pub fn purchased_upgrades(&self, user: &str) -> LedgerResult<BTreeSet<String>> {
        let prefix = keys::upgrade_prefix(user);
        let mut owned = BTreeSet::new();
        for (key, _) in self.store.scan_prefix(&prefix)? {
            owned.insert(key[prefix.len()..].to_string());
        }
        Ok(owned)
    }

    /// Buy an upgrade with SCRAP. Returns `false` without touching the
    /// store when the upgrade is already owned; debit and flag land in
    /// one atomic batch otherwise.
    pub fn purchase(&self, user: &str, upgrade_id: &str) -> LedgerResult<bool> {
        let upgrade = self
            .config
            .upgrade(upgrade_id)
            .ok_or_else(|| LedgerError::InvalidArgument(format!("unknown upgrade {upgrade_id}")))?;

        let flag_key = keys::upgrade_flag(user, upgrade_id);
        if self.store.get(&flag_key)?.is_some() {
            return Ok(false);
        }

        let ledger = CurrencyLedger::new(self.store);
        let available = ledger.balance(user, SCRAP)?;
        if available < upgrade.cost_scrap {
            return Err(LedgerError::InsufficientFunds {
                currency: SCRAP.to_string(),
                needed: upgrade.cost_scrap,
                available,
            });
        }

        let mut ops = ledger.plan(
            user,
            &[CurrencyAdjust {
                currency: SCRAP.to_string(),
                delta: -(upgrade.cost_scrap as i64),
            }],
        )?;
        ops.push(BatchOp::put(flag_key, b"1".to_vec()));
        self.store.batch(ops)?;
        log::info!(
            "user {user} purchased upgrade {upgrade_id} for {} SCRAP",
            upgrade.cost_scrap
        );
        Ok(true)
    }
}
