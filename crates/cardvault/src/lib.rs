//! # Cardvault Architecture
//!
//! Cardvault is the persistence core of a collectible-card inventory: it stores
//! card records, merges duplicate adds into quantity, answers filtered
//! searches and aggregates stats, all under an explicit ownership scope.
//!
//! It is a library that happens to have a CLI client (`cardvault-cli`), not the
//! other way round. Nothing in this crate writes to stdout or exits the process.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Repository (store::CardRepository, store::CardStore)       │
//! │  - Validates input (validation.rs)                          │
//! │  - Resolves ownership and visibility (scope.rs)             │
//! │  - Logs every mutation through `tracing`                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage backends (store::StorageBackend)                   │
//! │  - SqliteBackend (production), MemBackend (tests)           │
//! │  - Atomic upsert, filtered query, stats                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use cardvault::config::{BackendKind, CardVaultConfig};
//! use cardvault::model::CardDraft;
//! use cardvault::scope::Scope;
//! use cardvault::store::{self, CardRepository};
//!
//! let config = CardVaultConfig {
//!     backend: BackendKind::Memory,
//!     ..Default::default()
//! };
//! let cards = store::open(&config).unwrap();
//!
//! cards.upsert(CardDraft::new("Charizard").with_set("Base Set"), &Scope::Admin).unwrap();
//! let merged = cards
//!     .upsert(CardDraft::new("Charizard").with_set("Base Set").with_quantity(2), &Scope::Admin)
//!     .unwrap();
//! assert_eq!(merged.quantity, 3);
//!
//! let stats = cards.aggregate_stats(&Scope::Admin).unwrap();
//! assert_eq!(stats.total_cards, 1);
//! cards.close().unwrap();
//! ```
//!
//! ## Testing Strategy
//!
//! 1. **Unit tests** beside each module, against `MemBackend` and in-memory SQLite.
//! 2. **Contract tests** (`tests/repository_contract.rs`): the same scenarios run
//!    against both backends, including concurrent upsert races.
//! 3. **CLI tests** in `cardvault-cli/tests/`, driving the binary end to end.

pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod scope;
pub mod stats;
pub mod store;
pub mod validation;

pub use error::{CardError, Result};
