//! Strongly-typed game definitions.
//!
//! This module is the "already validated" configuration collaborator: the
//! loader/schema layer lives outside the core and hands over these structs.
//! Loosely-typed drop tables from the config files become the closed
//! [`DropEntry`] union here, so the ledger core never consumes an untyped
//! form.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::rng::RngSource;
use crate::types::Rarity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Content-version tag folded into every stack signature, so stacks
    /// minted under different content revisions stay distinct.
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    pub boxes: Vec<BoxDef>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub rng_unlocks: Vec<RngUnlockRule>,
    #[serde(default)]
    pub economy: EconomyConfig,
}

fn default_config_version() -> u32 {
    1
}

impl GameConfig {
    /// Parse a pre-validated JSON document.
    pub fn from_json(json: &str) -> LedgerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn box_def(&self, box_id: &str) -> Option<&BoxDef> {
        self.boxes.iter().find(|b| b.id == box_id)
    }

    /// Per-open cost: the economy override wins over the box definition.
    pub fn open_cost(&self, b: &BoxDef) -> u64 {
        self.economy
            .box_costs
            .get(&b.id)
            .copied()
            .unwrap_or(b.key_cost)
    }

    /// Scrap per unit for a tier, falling back to the built-in table.
    pub fn salvage_rate(&self, tier: Rarity) -> u64 {
        self.economy
            .rarity_salvage
            .get(&tier)
            .copied()
            .unwrap_or_else(|| fallback_salvage_rate(tier))
    }

    pub fn modifier(&self, mod_id: &str) -> Option<&ModifierDef> {
        self.modifiers.iter().find(|m| m.id == mod_id)
    }

    /// Ids of modifiers in the cosmetic category.
    pub fn cosmetic_mod_ids(&self) -> BTreeSet<&str> {
        self.modifiers
            .iter()
            .filter(|m| m.category == ModifierCategory::Cosmetic)
            .map(|m| m.id.as_str())
            .collect()
    }

    /// Modifiers an item allows, empty set for unknown items.
    pub fn allowed_mods(&self, item_id: &str) -> BTreeSet<&str> {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .map(|i| i.allowed_static_mods.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Curated tags that may appear in tag maps and tag indexes.
    pub fn filterable_tags(&self) -> BTreeSet<&str> {
        self.modifiers
            .iter()
            .filter(|m| m.filterable)
            .filter_map(|m| m.curated_tag.as_deref())
            .collect()
    }

    pub fn upgrade(&self, upgrade_id: &str) -> Option<&UpgradeDef> {
        self.economy.upgrades.iter().find(|u| u.id == upgrade_id)
    }
}

/// Built-in fallback scrap rates, matching the shipped economy defaults.
fn fallback_salvage_rate(tier: Rarity) -> u64 {
    match tier {
        Rarity::Common | Rarity::Uncommon => 1,
        Rarity::Rare => 5,
        Rarity::Epic => 10,
        Rarity::Legendary | Rarity::Mythic => 1,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxDef {
    pub id: String,
    /// Cost per open in KEYS unless overridden by the economy config.
    #[serde(default = "default_key_cost")]
    pub key_cost: u64,
    /// Never drop this box from its own table; resample instead.
    #[serde(default)]
    pub forbid_self_drop: bool,
    /// Allow up to this many self-drops per call, then resample.
    /// Ignored when `forbid_self_drop` is set.
    #[serde(default)]
    pub self_drop_cap: Option<u32>,
    pub drop_table: DropTable,
}

fn default_key_cost() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTable {
    pub entries: Vec<DropEntry>,
}

/// The closed union of drop-table entry kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropEntry {
    Item {
        item_id: String,
        #[serde(default = "default_rarity")]
        rarity: Rarity,
        weight: f64,
        #[serde(default)]
        static_mods_pool: Vec<String>,
    },
    Currency {
        currency: String,
        weight: f64,
        amount: AmountSpec,
    },
    Box {
        box_id: String,
        weight: f64,
        #[serde(default = "AmountSpec::one")]
        count: AmountSpec,
    },
    Material {
        material_id: String,
        weight: f64,
        #[serde(default = "AmountSpec::one")]
        amount: AmountSpec,
    },
}

fn default_rarity() -> Rarity {
    Rarity::Common
}

impl DropEntry {
    pub fn weight(&self) -> f64 {
        match self {
            DropEntry::Item { weight, .. }
            | DropEntry::Currency { weight, .. }
            | DropEntry::Box { weight, .. }
            | DropEntry::Material { weight, .. } => *weight,
        }
    }

    /// True for a BOX entry that drops the box it belongs to.
    pub fn is_self_drop(&self, own_box_id: &str) -> bool {
        matches!(self, DropEntry::Box { box_id, .. } if box_id == own_box_id)
    }
}

/// Fixed or uniformly-ranged integer amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountSpec {
    Fixed(u64),
    Range { min: u64, max: u64 },
}

impl AmountSpec {
    pub fn one() -> Self {
        AmountSpec::Fixed(1)
    }

    /// Resolve to a concrete amount, drawing from the rng for ranges.
    pub fn roll(&self, rng: &mut dyn RngSource) -> u64 {
        match self {
            AmountSpec::Fixed(n) => *n,
            AmountSpec::Range { min, max } => rng.int_between(*min, *max),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    #[serde(default)]
    pub allowed_static_mods: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierCategory {
    Cosmetic,
    Mechanical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub category: ModifierCategory,
    /// Stable label folded into the stack signature when this modifier is
    /// rolled. Cosmetic modifiers without one leave the signature alone.
    #[serde(default)]
    pub curated_tag: Option<String>,
    /// Whether the curated tag participates in tag maps and tag indexes.
    #[serde(default = "default_true")]
    pub filterable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    /// Box ids this milestone unlocks.
    #[serde(default)]
    pub unlocks: Vec<String>,
    /// Lifetime open count at which the milestone is satisfied.
    pub requires_opened: u64,
    /// Granted only on the call where at least one target flips
    /// locked → unlocked.
    #[serde(default)]
    pub rewards: Vec<CurrencyReward>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyReward {
    pub currency: String,
    pub amount: u64,
}

/// An RNG-gated unlock with soft/hard pity, probabilities in basis points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngUnlockRule {
    pub id: String,
    pub target_box_id: String,
    pub base_chance_bp: u32,
    /// Only rolls when opening this box; `None` means every box.
    #[serde(default)]
    pub scope_box_id: Option<String>,
    #[serde(default)]
    pub soft_pity: Option<SoftPity>,
    #[serde(default)]
    pub hard_pity: Option<HardPity>,
    #[serde(default)]
    pub reset_on_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftPity {
    /// Failed tries before the ramp starts.
    pub start_at: u64,
    pub delta_bp_per_try: u32,
    pub cap_bp: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardPity {
    /// The try number that always hits.
    pub guarantee_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Per-box cost overrides, winning over `BoxDef::key_cost`.
    #[serde(default)]
    pub box_costs: BTreeMap<String, u64>,
    /// Hard cap on `count` per open request.
    #[serde(default = "default_max_per_request")]
    pub max_per_request: u32,
    /// Scrap per unit by tier; missing tiers use the built-in table.
    #[serde(default)]
    pub rarity_salvage: BTreeMap<Rarity, u64>,
    /// Purchasable upgrades (including the bulk-open tiers).
    #[serde(default)]
    pub upgrades: Vec<UpgradeDef>,
}

fn default_max_per_request() -> u32 {
    1000
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            box_costs: BTreeMap::new(),
            max_per_request: default_max_per_request(),
            rarity_salvage: BTreeMap::new(),
            upgrades: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub cost_scrap: u64,
}
