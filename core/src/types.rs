//! Shared primitive types used across the entire ledger core.

use serde::{Deserialize, Serialize};

/// A stable, unique identifier for one player account.
pub type UserId = String;

/// A stack identifier: item/type id, rarity, optional curated-tag
/// signature, and a content-version suffix, joined as one string.
/// Differently-tagged variants of the same base item are distinct stacks.
pub type StackId = String;

/// A caller-supplied request id. The core never mints these — the
/// idempotency guard keys off whatever the caller sent.
pub type RequestId = String;

/// A currency code, e.g. `KEYS` or `SCRAP`.
pub type CurrencyCode = String;

/// The currency spent to open boxes.
pub const KEYS: &str = "KEYS";

/// The currency credited by salvage.
pub const SCRAP: &str = "SCRAP";

/// Rarity tiers in their fixed total order.
/// NEVER reorder — salvage ceilings and summary views rely on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
}

impl Rarity {
    /// All tiers, lowest first.
    pub const ORDER: [Rarity; 6] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    /// The canonical uppercase name, as used in storage keys and
    /// stack-id signatures.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "COMMON",
            Rarity::Uncommon => "UNCOMMON",
            Rarity::Rare => "RARE",
            Rarity::Epic => "EPIC",
            Rarity::Legendary => "LEGENDARY",
            Rarity::Mythic => "MYTHIC",
        }
    }

    /// Tiers at or below `ceiling`, lowest first.
    pub fn tiers_up_to(ceiling: Rarity) -> &'static [Rarity] {
        let idx = Rarity::ORDER
            .iter()
            .position(|r| *r == ceiling)
            .unwrap_or(Rarity::ORDER.len() - 1);
        &Rarity::ORDER[..=idx]
    }

    /// Parse the canonical uppercase form.
    pub fn parse(s: &str) -> Option<Rarity> {
        Rarity::ORDER.iter().copied().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
