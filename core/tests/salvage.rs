//! Salvage: rarity ceilings, type filters, tagged-variant exclusion,
//! index teardown, and the greedy bonus.

use lootvault_core::codec;
use lootvault_core::config::GameConfig;
use lootvault_core::keys::{self, Dimension};
use lootvault_core::salvage::{SalvageRequest, SalvageResolver};
use lootvault_core::stack_ledger::{StackAdjust, StackLedger};
use lootvault_core::store::{KvStore, MemoryStore};
use lootvault_core::types::{Rarity, SCRAP};

// ── Test helpers ────────────────────────────────────────────────────────────

const USER: &str = "u1";

fn default_config() -> GameConfig {
    GameConfig::from_json(r#"{"boxes": []}"#).expect("config parses")
}

fn seed_stack(
    store: &MemoryStore,
    stack_id: &str,
    type_id: &str,
    rarity: Rarity,
    count: i64,
    source: Option<&str>,
    tags: &[&str],
) {
    let ops = StackLedger::new(store)
        .plan(
            USER,
            &[StackAdjust {
                stack_id: stack_id.to_string(),
                rarity,
                type_id: type_id.to_string(),
                delta: count,
                source: source.map(str::to_string),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            }],
        )
        .expect("seed plan");
    store.batch(ops).expect("seed batch");
}

fn request(max_rarity: Rarity, type_ids: &[&str]) -> SalvageRequest {
    SalvageRequest {
        max_rarity,
        type_ids: type_ids.iter().map(|t| t.to_string()).collect(),
        static_mod_ids: Vec::new(),
    }
}

fn scrap_balance(store: &MemoryStore) -> u64 {
    codec::decode_u64(store.get(&keys::cur(USER, SCRAP)).unwrap().as_deref())
}

fn read_sum(store: &MemoryStore, key: &str) -> u64 {
    codec::decode_u64(store.get(key).unwrap().as_deref())
}

// ── Tests ───────────────────────────────────────────────────────────────────

/// Salvaging a COMMON stack zeroes the record, tears down every index
/// entry, decrements the aggregates, and credits scrap at the tier rate.
#[test]
fn salvage_credits_scrap_and_tears_down() {
    let store = MemoryStore::new();
    let cfg = default_config();
    seed_stack(&store, "sword_COMMON_v1", "sword", Rarity::Common, 2, Some("crate_a"), &[]);
    seed_stack(&store, "gem_RARE_v1", "gem", Rarity::Rare, 1, None, &[]);

    let outcome = SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Common, &[]))
        .unwrap();

    assert_eq!(outcome.scrapped.len(), 1);
    assert_eq!(outcome.scrapped[0].stack_id, "sword_COMMON_v1");
    assert_eq!(outcome.scrapped[0].count, 2);
    // COMMON salvages at 1 scrap per unit.
    assert_eq!(scrap_balance(&store), 2);
    assert_eq!(outcome.currencies[0].currency, SCRAP);
    assert_eq!(outcome.currencies[0].amount, 2);

    // Record zeroed, indexes and source map gone.
    assert_eq!(
        codec::decode_u32(store.get(&keys::inv(USER, "sword_COMMON_v1")).unwrap().as_deref()),
        0
    );
    assert!(store
        .get(&keys::idx_rarity(USER, Rarity::Common, "sword_COMMON_v1"))
        .unwrap()
        .is_none());
    assert!(store
        .get(&keys::idx(Dimension::Type, USER, "sword", "sword_COMMON_v1"))
        .unwrap()
        .is_none());
    assert!(store
        .get(&keys::idx(Dimension::Source, USER, "crate_a", "sword_COMMON_v1"))
        .unwrap()
        .is_none());
    assert!(store.get(&keys::src_map(USER, "sword_COMMON_v1")).unwrap().is_none());

    // Aggregates reflect only the surviving RARE gem.
    assert_eq!(read_sum(&store, &keys::sum(Dimension::Rarity, USER, "COMMON")), 0);
    assert_eq!(read_sum(&store, &keys::sum(Dimension::Type, USER, "sword")), 0);
    assert_eq!(read_sum(&store, &keys::sum(Dimension::Rarity, USER, "RARE")), 1);
    assert_eq!(read_sum(&store, &keys::sum(Dimension::Source, USER, "crate_a")), 0);
    assert_eq!(read_sum(&store, &keys::sum_total_items(USER)), 1);
    assert_eq!(read_sum(&store, &keys::sum_total_stacks(USER)), 1);
}

/// The ceiling is inclusive and never reaches above itself.
#[test]
fn ceiling_spares_higher_tiers() {
    let store = MemoryStore::new();
    let cfg = default_config();
    seed_stack(&store, "sword_COMMON_v1", "sword", Rarity::Common, 1, None, &[]);
    seed_stack(&store, "bow_UNCOMMON_v1", "bow", Rarity::Uncommon, 1, None, &[]);
    seed_stack(&store, "gem_RARE_v1", "gem", Rarity::Rare, 1, None, &[]);

    let outcome = SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Uncommon, &[]))
        .unwrap();

    let ids: Vec<&str> = outcome.scrapped.iter().map(|s| s.stack_id.as_str()).collect();
    assert_eq!(ids, vec!["bow_UNCOMMON_v1", "sword_COMMON_v1"]);
    assert_eq!(
        codec::decode_u32(store.get(&keys::inv(USER, "gem_RARE_v1")).unwrap().as_deref()),
        1
    );
}

/// Tagged variants are never salvaged, whatever the filters say.
#[test]
fn tagged_stacks_are_excluded() {
    let store = MemoryStore::new();
    let cfg = default_config();
    seed_stack(&store, "charm_COMMON_v1", "charm", Rarity::Common, 1, None, &[]);
    seed_stack(
        &store,
        "charm_COMMON_t:shiny_v1",
        "charm",
        Rarity::Common,
        1,
        None,
        &["shiny"],
    );

    let outcome = SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Mythic, &[]))
        .unwrap();

    assert_eq!(outcome.scrapped.len(), 1);
    assert_eq!(outcome.scrapped[0].stack_id, "charm_COMMON_v1");
    assert_eq!(
        codec::decode_u32(
            store
                .get(&keys::inv(USER, "charm_COMMON_t:shiny_v1"))
                .unwrap()
                .as_deref()
        ),
        1
    );
}

/// A type filter restricts candidates to the union of the named type
/// indexes.
#[test]
fn type_filter_restricts_candidates() {
    let store = MemoryStore::new();
    let cfg = default_config();
    seed_stack(&store, "sword_COMMON_v1", "sword", Rarity::Common, 1, None, &[]);
    seed_stack(&store, "shield_COMMON_v1", "shield", Rarity::Common, 1, None, &[]);
    seed_stack(&store, "bow_COMMON_v1", "bow", Rarity::Common, 1, None, &[]);

    let outcome = SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Mythic, &["sword", "bow"]))
        .unwrap();

    let mut ids: Vec<&str> = outcome.scrapped.iter().map(|s| s.stack_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["bow_COMMON_v1", "sword_COMMON_v1"]);
    assert_eq!(
        codec::decode_u32(store.get(&keys::inv(USER, "shield_COMMON_v1")).unwrap().as_deref()),
        1
    );
}

/// Tier rates come from the economy config, falling back to the
/// built-in table (RARE = 5).
#[test]
fn tier_rates_apply_per_unit() {
    let store = MemoryStore::new();
    let cfg = default_config();
    seed_stack(&store, "gem_RARE_v1", "gem", Rarity::Rare, 3, None, &[]);

    SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Rare, &[]))
        .unwrap();
    assert_eq!(scrap_balance(&store), 15);
}

#[test]
fn economy_rate_overrides_fallback() {
    let store = MemoryStore::new();
    let cfg = GameConfig::from_json(
        r#"{"boxes": [], "economy": {"rarity_salvage": {"COMMON": 10}}}"#,
    )
    .unwrap();
    seed_stack(&store, "sword_COMMON_v1", "sword", Rarity::Common, 2, None, &[]);

    SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Common, &[]))
        .unwrap();
    assert_eq!(scrap_balance(&store), 20);
}

/// The greedy bonus multiplies the whole haul: 500 lifetime opens give
/// +5%, floored after multiplying.
#[test]
fn greedy_bonus_scales_with_lifetime_opens() {
    let store = MemoryStore::new();
    let cfg = GameConfig::from_json(
        r#"{"boxes": [], "economy": {"rarity_salvage": {"COMMON": 10}}}"#,
    )
    .unwrap();
    seed_stack(&store, "sword_COMMON_v1", "sword", Rarity::Common, 2, None, &[]);
    store
        .put(&keys::lifetime_opened(USER), &codec::encode_u64(500))
        .unwrap();

    SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Common, &[]))
        .unwrap();
    // 20 scrap * 1.05 = 21.
    assert_eq!(scrap_balance(&store), 21);
}

/// Salvaging with nothing eligible is a clean no-op.
#[test]
fn empty_salvage_is_a_noop() {
    let store = MemoryStore::new();
    let cfg = default_config();

    let outcome = SalvageResolver::new(&store, &cfg)
        .salvage(USER, &request(Rarity::Mythic, &[]))
        .unwrap();
    assert!(outcome.scrapped.is_empty());
    assert_eq!(outcome.currencies[0].amount, 0);
    assert_eq!(scrap_balance(&store), 0);
    assert!(store.get(&keys::cur(USER, SCRAP)).unwrap().is_none());
}
