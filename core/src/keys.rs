//! Typed storage-key builders.
//!
//! RULE: no other module concatenates key strings. Every key is built
//! from a typed descriptor here and serialized to its colon-delimited
//! form exactly once, at the store boundary.
//!
//! Layout over the ordered keyspace:
//!   inv:{user}:{stackId}                    stack count (u32)
//!   idx:rarity:{user}:{tier}:{stackId}      presence marker
//!   idx:type:{user}:{typeId}:{stackId}      presence marker
//!   idx:src:{user}:{boxId}:{stackId}        presence marker
//!   idx:tag:{user}:{tag}:{stackId}          presence marker
//!   srcmap:{user}:{stackId}                 sticky source box id (utf8)
//!   tagmap:{user}:{stackId}                 curated tags (json array)
//!   sum:rarity:{user}:{tier}                aggregate (u64)
//!   sum:type:{user}:{typeId}                aggregate (u64)
//!   sum:src:{user}:{boxId}                  aggregate (u64)
//!   sum:totalStacks:{user}                  aggregate (u64)
//!   sum:totalItems:{user}                   aggregate (u64)
//!   cur:{user}:{currency}                   balance (u64)
//!   req:{user}:{requestId}                  idempotency snapshot (json)
//!   ppro:{user}                             unlock profile (json)
//!   punlock:{user}:{ruleId}:tries           pity counter (u64)
//!   pstat:{user}.lifetimeOpened             lifetime counter (u64)
//!   pupg:{user}:{upgradeId}                 purchase flag

use crate::types::Rarity;

/// A secondary-index / aggregate dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Rarity,
    Type,
    Source,
    Tag,
}

impl Dimension {
    fn as_str(&self) -> &'static str {
        match self {
            Dimension::Rarity => "rarity",
            Dimension::Type => "type",
            Dimension::Source => "src",
            Dimension::Tag => "tag",
        }
    }
}

/// A typed key descriptor. `encode()` is the only place the string form
/// is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKey<'a> {
    Stack { user: &'a str, stack_id: &'a str },
    Index {
        dim: Dimension,
        user: &'a str,
        value: &'a str,
        stack_id: &'a str,
    },
    SourceMap { user: &'a str, stack_id: &'a str },
    TagMap { user: &'a str, stack_id: &'a str },
    Sum { dim: Dimension, user: &'a str, value: &'a str },
    SumTotalStacks { user: &'a str },
    SumTotalItems { user: &'a str },
    Currency { user: &'a str, currency: &'a str },
    Request { user: &'a str, request_id: &'a str },
    UnlockProfile { user: &'a str },
    PityTries { user: &'a str, rule_id: &'a str },
    LifetimeOpened { user: &'a str },
    UpgradeFlag { user: &'a str, upgrade_id: &'a str },
}

impl StorageKey<'_> {
    pub fn encode(&self) -> String {
        match self {
            StorageKey::Stack { user, stack_id } => format!("inv:{user}:{stack_id}"),
            StorageKey::Index {
                dim,
                user,
                value,
                stack_id,
            } => format!("idx:{}:{user}:{value}:{stack_id}", dim.as_str()),
            StorageKey::SourceMap { user, stack_id } => format!("srcmap:{user}:{stack_id}"),
            StorageKey::TagMap { user, stack_id } => format!("tagmap:{user}:{stack_id}"),
            StorageKey::Sum { dim, user, value } => {
                format!("sum:{}:{user}:{value}", dim.as_str())
            }
            StorageKey::SumTotalStacks { user } => format!("sum:totalStacks:{user}"),
            StorageKey::SumTotalItems { user } => format!("sum:totalItems:{user}"),
            StorageKey::Currency { user, currency } => format!("cur:{user}:{currency}"),
            StorageKey::Request { user, request_id } => format!("req:{user}:{request_id}"),
            StorageKey::UnlockProfile { user } => format!("ppro:{user}"),
            StorageKey::PityTries { user, rule_id } => {
                format!("punlock:{user}:{rule_id}:tries")
            }
            StorageKey::LifetimeOpened { user } => format!("pstat:{user}.lifetimeOpened"),
            StorageKey::UpgradeFlag { user, upgrade_id } => {
                format!("pupg:{user}:{upgrade_id}")
            }
        }
    }
}

// Shorthand builders for the common keys. These keep call sites terse
// without reintroducing stringly-typed construction.

pub fn inv(user: &str, stack_id: &str) -> String {
    StorageKey::Stack { user, stack_id }.encode()
}

pub fn idx(dim: Dimension, user: &str, value: &str, stack_id: &str) -> String {
    StorageKey::Index {
        dim,
        user,
        value,
        stack_id,
    }
    .encode()
}

pub fn idx_rarity(user: &str, tier: Rarity, stack_id: &str) -> String {
    idx(Dimension::Rarity, user, tier.as_str(), stack_id)
}

pub fn src_map(user: &str, stack_id: &str) -> String {
    StorageKey::SourceMap { user, stack_id }.encode()
}

pub fn tag_map(user: &str, stack_id: &str) -> String {
    StorageKey::TagMap { user, stack_id }.encode()
}

pub fn sum(dim: Dimension, user: &str, value: &str) -> String {
    StorageKey::Sum { dim, user, value }.encode()
}

pub fn sum_total_stacks(user: &str) -> String {
    StorageKey::SumTotalStacks { user }.encode()
}

pub fn sum_total_items(user: &str) -> String {
    StorageKey::SumTotalItems { user }.encode()
}

pub fn cur(user: &str, currency: &str) -> String {
    StorageKey::Currency { user, currency }.encode()
}

pub fn req(user: &str, request_id: &str) -> String {
    StorageKey::Request { user, request_id }.encode()
}

pub fn unlock_profile(user: &str) -> String {
    StorageKey::UnlockProfile { user }.encode()
}

pub fn pity_tries(user: &str, rule_id: &str) -> String {
    StorageKey::PityTries { user, rule_id }.encode()
}

pub fn lifetime_opened(user: &str) -> String {
    StorageKey::LifetimeOpened { user }.encode()
}

pub fn upgrade_flag(user: &str, upgrade_id: &str) -> String {
    StorageKey::UpgradeFlag { user, upgrade_id }.encode()
}

/// Scan prefix covering every `(value, stackId)` pair of one index
/// dimension value, e.g. all COMMON stacks of a user.
pub fn idx_prefix(dim: Dimension, user: &str, value: &str) -> String {
    format!("idx:{}:{user}:{value}:", dim.as_str())
}

/// Scan prefix covering a whole index dimension for one user; keys under
/// it look like `idx:{dim}:{user}:{value}:{stackId}`.
pub fn idx_dim_prefix(dim: Dimension, user: &str) -> String {
    format!("idx:{}:{user}:", dim.as_str())
}

/// Scan prefix for one user's per-value aggregates of a dimension.
pub fn sum_prefix(dim: Dimension, user: &str) -> String {
    format!("sum:{}:{user}:", dim.as_str())
}

/// Scan prefix for one user's raw stack records.
pub fn inv_prefix(user: &str) -> String {
    format!("inv:{user}:")
}

/// Scan prefix for one user's purchased-upgrade flags.
pub fn upgrade_prefix(user: &str) -> String {
    format!("pupg:{user}:")
}
