//! lootvault-core — per-user inventory and currency ledger over an
//! ordered key-value store, with loot box resolution on top.
//!
//! Ground rules that hold across every module:
//!   - Every user-facing call commits through exactly ONE atomic batch.
//!   - Validation happens before any write is planned.
//!   - All randomness flows through an injected RngSource.
//!   - Keys are built only in `keys`; integers encode only through `codec`.

pub mod codec;
pub mod config;
pub mod currency_ledger;
pub mod error;
pub mod idempotency;
pub mod inventory;
pub mod keys;
pub mod loot;
pub mod rng;
pub mod salvage;
pub mod shop;
pub mod stack_ledger;
pub mod store;
pub mod types;
pub mod unlock;
