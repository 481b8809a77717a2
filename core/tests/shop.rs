//! Shop purchases and the bulk-open gate they feed.

use lootvault_core::codec;
use lootvault_core::config::GameConfig;
use lootvault_core::error::LedgerError;
use lootvault_core::keys;
use lootvault_core::loot::{LootResolver, OpenRequest};
use lootvault_core::rng::SeededRng;
use lootvault_core::shop::ShopService;
use lootvault_core::store::{KvStore, MemoryStore};
use lootvault_core::types::{KEYS, SCRAP};

// ── Test helpers ────────────────────────────────────────────────────────────

const USER: &str = "u1";

fn shop_config() -> GameConfig {
    GameConfig::from_json(
        r#"{
            "boxes": [{
                "id": "crate_basic",
                "key_cost": 1,
                "drop_table": {"entries": [
                    {"type": "ITEM", "item_id": "sword", "weight": 1.0}
                ]}
            }],
            "economy": {
                "upgrades": [
                    {"id": "upg_bulk_10", "name": "Bulk x10", "cost_scrap": 30},
                    {"id": "upg_bulk_100", "name": "Bulk x100", "cost_scrap": 300}
                ]
            }
        }"#,
    )
    .expect("config parses")
}

fn fund(store: &MemoryStore, currency: &str, amount: u64) {
    store
        .put(&keys::cur(USER, currency), &codec::encode_u64(amount))
        .unwrap();
}

fn scrap_balance(store: &MemoryStore) -> u64 {
    codec::decode_u64(store.get(&keys::cur(USER, SCRAP)).unwrap().as_deref())
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn purchase_debits_scrap_and_sets_flag() {
    let store = MemoryStore::new();
    let cfg = shop_config();
    fund(&store, SCRAP, 100);
    let shop = ShopService::new(&store, &cfg);

    assert!(shop.purchase(USER, "upg_bulk_10").unwrap());
    assert_eq!(scrap_balance(&store), 70);
    assert!(store
        .get(&keys::upgrade_flag(USER, "upg_bulk_10"))
        .unwrap()
        .is_some());
    assert!(shop.purchased_upgrades(USER).unwrap().contains("upg_bulk_10"));
}

/// Buying an owned upgrade is a no-op and charges nothing.
#[test]
fn repurchase_is_free_noop() {
    let store = MemoryStore::new();
    let cfg = shop_config();
    fund(&store, SCRAP, 100);
    let shop = ShopService::new(&store, &cfg);

    assert!(shop.purchase(USER, "upg_bulk_10").unwrap());
    assert!(!shop.purchase(USER, "upg_bulk_10").unwrap());
    assert_eq!(scrap_balance(&store), 70);
}

#[test]
fn unknown_upgrade_is_rejected() {
    let store = MemoryStore::new();
    let cfg = shop_config();

    let err = ShopService::new(&store, &cfg)
        .purchase(USER, "upg_nope")
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidArgument(_)));
}

#[test]
fn insufficient_scrap_is_rejected() {
    let store = MemoryStore::new();
    let cfg = shop_config();
    fund(&store, SCRAP, 29);

    let err = ShopService::new(&store, &cfg)
        .purchase(USER, "upg_bulk_10")
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            needed: 30,
            available: 29,
            ..
        }
    ));
    assert!(store
        .get(&keys::upgrade_flag(USER, "upg_bulk_10"))
        .unwrap()
        .is_none());
    assert_eq!(scrap_balance(&store), 29);
}

#[test]
fn catalog_lists_config_upgrades() {
    let store = MemoryStore::new();
    let cfg = shop_config();
    let shop = ShopService::new(&store, &cfg);
    let ids: Vec<&str> = shop.catalog().iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["upg_bulk_10", "upg_bulk_100"]);
}

/// End to end: a purchased bulk tier immediately unlocks larger opens.
#[test]
fn purchased_tier_unlocks_bulk_opens() {
    let store = MemoryStore::new();
    let cfg = shop_config();
    fund(&store, SCRAP, 100);
    fund(&store, KEYS, 100);
    let resolver = LootResolver::new(&store, &cfg);

    let err = resolver
        .open(
            USER,
            &OpenRequest {
                box_id: "crate_basic".to_string(),
                count: 10,
                request_id: "req-1".to_string(),
            },
            &mut SeededRng::new(1),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::BulkLocked { .. }));

    ShopService::new(&store, &cfg).purchase(USER, "upg_bulk_10").unwrap();

    let outcome = resolver
        .open(
            USER,
            &OpenRequest {
                box_id: "crate_basic".to_string(),
                count: 10,
                request_id: "req-2".to_string(),
            },
            &mut SeededRng::new(1),
        )
        .unwrap();
    assert_eq!(outcome.stacks[0].count, 10);
}
