//! Configuration parsing: the drop-entry union, amount specs, and the
//! layered defaults.

use lootvault_core::config::{AmountSpec, DropEntry, GameConfig};
use lootvault_core::rng::RngSource;
use lootvault_core::types::Rarity;

// ── Test helpers ────────────────────────────────────────────────────────────

struct ConstRng(f64);

impl RngSource for ConstRng {
    fn next_f64(&mut self) -> f64 {
        self.0
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn drop_entry_union_parses_all_kinds() {
    let cfg = GameConfig::from_json(
        r#"{
            "boxes": [{
                "id": "crate_mix",
                "drop_table": {"entries": [
                    {"type": "ITEM", "item_id": "sword", "rarity": "EPIC", "weight": 1.0},
                    {"type": "CURRENCY", "currency": "SCRAP", "weight": 2.0,
                     "amount": {"min": 3, "max": 9}},
                    {"type": "BOX", "box_id": "crate_inner", "weight": 0.5},
                    {"type": "MATERIAL", "material_id": "dust", "weight": 1.5, "amount": 4}
                ]}
            }]
        }"#,
    )
    .unwrap();

    let entries = &cfg.boxes[0].drop_table.entries;
    assert!(matches!(
        &entries[0],
        DropEntry::Item { item_id, rarity: Rarity::Epic, .. } if item_id == "sword"
    ));
    assert!(matches!(
        &entries[1],
        DropEntry::Currency { amount: AmountSpec::Range { min: 3, max: 9 }, .. }
    ));
    assert!(matches!(&entries[2], DropEntry::Box { .. }));
    assert!(matches!(
        &entries[3],
        DropEntry::Material { amount: AmountSpec::Fixed(4), .. }
    ));
    assert_eq!(entries[1].weight(), 2.0);
}

#[test]
fn item_defaults_to_common_rarity() {
    let cfg = GameConfig::from_json(
        r#"{
            "boxes": [{
                "id": "b",
                "drop_table": {"entries": [
                    {"type": "ITEM", "item_id": "pebble", "weight": 1.0}
                ]}
            }]
        }"#,
    )
    .unwrap();
    assert!(matches!(
        &cfg.boxes[0].drop_table.entries[0],
        DropEntry::Item { rarity: Rarity::Common, .. }
    ));
    // key_cost defaults to 1 open per key.
    assert_eq!(cfg.boxes[0].key_cost, 1);
}

#[test]
fn amount_spec_rolls_within_bounds() {
    let range = AmountSpec::Range { min: 3, max: 9 };
    assert_eq!(range.roll(&mut ConstRng(0.0)), 3);
    assert_eq!(range.roll(&mut ConstRng(0.999_999)), 9);
    assert_eq!(AmountSpec::Fixed(7).roll(&mut ConstRng(0.5)), 7);
}

#[test]
fn economy_cost_override_wins() {
    let cfg = GameConfig::from_json(
        r#"{
            "boxes": [{
                "id": "crate_basic",
                "key_cost": 10,
                "drop_table": {"entries": []}
            }],
            "economy": {"box_costs": {"crate_basic": 3}}
        }"#,
    )
    .unwrap();
    let b = cfg.box_def("crate_basic").unwrap();
    assert_eq!(cfg.open_cost(b), 3);
}

#[test]
fn omitted_economy_uses_defaults() {
    let cfg = GameConfig::from_json(r#"{"boxes": []}"#).unwrap();
    assert_eq!(cfg.economy.max_per_request, 1000);
    assert_eq!(cfg.config_version, 1);
    // Fallback salvage table.
    assert_eq!(cfg.salvage_rate(Rarity::Common), 1);
    assert_eq!(cfg.salvage_rate(Rarity::Rare), 5);
    assert_eq!(cfg.salvage_rate(Rarity::Epic), 10);
    assert_eq!(cfg.salvage_rate(Rarity::Legendary), 1);
}

#[test]
fn self_drop_is_detected_by_owning_box() {
    let entry: DropEntry = serde_json::from_str(
        r#"{"type": "BOX", "box_id": "crate_a", "weight": 1.0}"#,
    )
    .unwrap();
    assert!(entry.is_self_drop("crate_a"));
    assert!(!entry.is_self_drop("crate_b"));
}

#[test]
fn filterable_tags_respect_modifier_flags() {
    let cfg = GameConfig::from_json(
        r#"{
            "boxes": [],
            "modifiers": [
                {"id": "m1", "category": "COSMETIC", "curated_tag": "shiny"},
                {"id": "m2", "category": "COSMETIC", "curated_tag": "dull",
                 "filterable": false},
                {"id": "m3", "category": "MECHANICAL", "curated_tag": "heavy"}
            ]
        }"#,
    )
    .unwrap();
    let tags = cfg.filterable_tags();
    assert!(tags.contains("shiny"));
    assert!(!tags.contains("dull"));
    assert!(tags.contains("heavy"));

    let cosmetics = cfg.cosmetic_mod_ids();
    assert!(cosmetics.contains("m1"));
    assert!(!cosmetics.contains("m3"));
}
