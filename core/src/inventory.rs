//! Read-only inventory views over the denormalized state.
//!
//! The summary reads only aggregate-sum keys; the listing walks the
//! cheapest applicable secondary index and cross-checks remaining facets
//! with point probes. Neither ever writes.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::LedgerResult;
use crate::keys::{self, Dimension};
use crate::store::KvStore;
use crate::types::{Rarity, StackId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarityCount {
    pub rarity: Rarity,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeCount {
    pub type_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_stacks: u64,
    pub total_items: u64,
    /// Every tier in fixed order, zero-filled when absent.
    pub by_rarity: Vec<RarityCount>,
    pub by_type: Vec<TypeCount>,
}

/// Facet filter for listings. Index selection order: rarity, then type,
/// then source, then tag, then a full inventory scan.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub rarity: Option<Rarity>,
    pub type_id: Option<String>,
    pub source_box_id: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub stack_id: StackId,
    pub type_id: String,
    pub rarity: Rarity,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryPage {
    pub rows: Vec<InventoryRow>,
    /// Keyset cursor: pass back to resume after the last row's stack id.
    pub next_cursor: Option<StackId>,
}

pub struct InventoryView<'a, S: KvStore> {
    store: &'a S,
}

impl<'a, S: KvStore> InventoryView<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn summary(&self, user: &str) -> LedgerResult<InventorySummary> {
        let total_stacks =
            codec::decode_u64(self.store.get(&keys::sum_total_stacks(user))?.as_deref());
        let total_items =
            codec::decode_u64(self.store.get(&keys::sum_total_items(user))?.as_deref());

        let mut by_rarity = Vec::with_capacity(Rarity::ORDER.len());
        for tier in Rarity::ORDER {
            let key = keys::sum(Dimension::Rarity, user, tier.as_str());
            by_rarity.push(RarityCount {
                rarity: tier,
                count: codec::decode_u64(self.store.get(&key)?.as_deref()),
            });
        }

        let prefix = keys::sum_prefix(Dimension::Type, user);
        let mut by_type = Vec::new();
        for (key, value) in self.store.scan_prefix(&prefix)? {
            by_type.push(TypeCount {
                type_id: key[prefix.len()..].to_string(),
                count: codec::decode_u64(Some(&value)),
            });
        }

        Ok(InventorySummary {
            total_stacks,
            total_items,
            by_rarity,
            by_type,
        })
    }

    pub fn list(
        &self,
        user: &str,
        filter: &InventoryFilter,
        limit: usize,
        cursor: Option<&str>,
    ) -> LedgerResult<InventoryPage> {
        let prefix = if let Some(rarity) = filter.rarity {
            keys::idx_prefix(Dimension::Rarity, user, rarity.as_str())
        } else if let Some(type_id) = &filter.type_id {
            keys::idx_prefix(Dimension::Type, user, type_id)
        } else if let Some(source) = &filter.source_box_id {
            keys::idx_prefix(Dimension::Source, user, source)
        } else if let Some(tag) = &filter.tag {
            keys::idx_prefix(Dimension::Tag, user, tag)
        } else {
            keys::inv_prefix(user)
        };

        let mut rows = Vec::new();
        for (key, _) in self.store.scan_prefix(&prefix)? {
            if rows.len() >= limit {
                break;
            }
            let stack_id = &key[prefix.len()..];
            if stack_id.is_empty() {
                continue;
            }
            if let Some(cursor) = cursor {
                if stack_id <= cursor {
                    continue;
                }
            }
            if !self.matches_remaining_facets(user, stack_id, filter, &prefix)? {
                continue;
            }
            let count = codec::decode_u32(self.store.get(&keys::inv(user, stack_id))?.as_deref());
            if count == 0 {
                continue;
            }
            let (type_id, rarity) = parse_stack_meta(stack_id);
            rows.push(InventoryRow {
                stack_id: stack_id.to_string(),
                type_id,
                rarity,
                count,
            });
        }

        let next_cursor = if rows.len() == limit {
            rows.last().map(|r| r.stack_id.clone())
        } else {
            None
        };
        Ok(InventoryPage { rows, next_cursor })
    }

    /// Facets not covered by the scanned index are validated by index
    /// membership probes.
    fn matches_remaining_facets(
        &self,
        user: &str,
        stack_id: &str,
        filter: &InventoryFilter,
        scanned_prefix: &str,
    ) -> LedgerResult<bool> {
        let mut probes: Vec<String> = Vec::new();
        if let Some(rarity) = filter.rarity {
            probes.push(keys::idx_rarity(user, rarity, stack_id));
        }
        if let Some(type_id) = &filter.type_id {
            probes.push(keys::idx(Dimension::Type, user, type_id, stack_id));
        }
        if let Some(source) = &filter.source_box_id {
            probes.push(keys::idx(Dimension::Source, user, source, stack_id));
        }
        if let Some(tag) = &filter.tag {
            probes.push(keys::idx(Dimension::Tag, user, tag, stack_id));
        }
        for probe in probes {
            if probe.starts_with(scanned_prefix) {
                continue; // already proven by the scan itself
            }
            if self.store.get(&probe)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Recover type and rarity from a stack signature
/// (`{type}_{RARITY}[_t:{tag}]_v{version}`). Unparseable ids fall back
/// to an unknown COMMON stack rather than failing the listing.
fn parse_stack_meta(stack_id: &str) -> (String, Rarity) {
    let mut s = stack_id;
    if let Some(pos) = s.rfind("_v") {
        let suffix = &s[pos + 2..];
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            s = &s[..pos];
        }
    }
    if let Some(pos) = s.rfind("_t:") {
        s = &s[..pos];
    }
    if let Some(pos) = s.rfind('_') {
        if let Some(rarity) = Rarity::parse(&s[pos + 1..]) {
            return (s[..pos].to_string(), rarity);
        }
    }
    ("Unknown".to_string(), Rarity::Common)
}
