//! # Storage Layer
//!
//! This module defines the repository contract for cardvault. The
//! [`CardRepository`] trait is what callers program against; [`CardStore`] is
//! its one implementation, generic over a [`StorageBackend`].
//!
//! ## Layers
//!
//! ```text
//! caller ──▶ CardRepository (CardStore)   validation, scope checks, logging
//!                 │
//!                 ▼
//!            StorageBackend               atomic row primitives
//!             ├── MemBackend              RwLock<Vec<Card>>
//!             └── SqliteBackend           one rusqlite connection
//! ```
//!
//! `CardStore` decides *what* may happen; the backend decides *how* it is
//! persisted. Every backend primitive is a single all-or-nothing unit of work,
//! so a failed or abandoned call never leaves a partial write behind.
//!
//! ## Deduplication
//!
//! Adding a card whose `(name, set_name, card_number, owner)` already exists
//! increments that row's quantity instead of creating a second row. Backends
//! serialize this per key: the memory backend under its write lock, SQLite
//! with a single `INSERT .. ON CONFLICT DO UPDATE` statement. Concurrent adds
//! of the same card therefore always sum.
//!
//! ## Selecting a Backend
//!
//! [`open`] builds the backend named in [`CardVaultConfig`] once at startup and
//! hands back an owned [`CardStore<Backend>`]. There is no global connection;
//! [`CardStore::close`] releases it.
//!
//! ## Implementations
//!
//! - [`sqlite_backend::SqliteBackend`]: Production storage in a SQLite file.
//! - [`mem_backend::MemBackend`]: For tests and throwaway sessions.

use crate::config::{BackendKind, CardVaultConfig};
use crate::error::Result;
use crate::filter::CardFilter;
use crate::model::{Card, CardDraft, CardPatch, NewCard};
use crate::scope::Scope;
use crate::stats::CollectionStats;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

pub mod backend;
pub mod card_store;
pub mod mem_backend;
pub mod sqlite_backend;

pub use backend::{StorageBackend, Upserted};
pub use card_store::CardStore;
pub use mem_backend::MemBackend;
pub use sqlite_backend::SqliteBackend;

/// Abstract interface for card storage.
///
/// Every operation runs under an explicit [`Scope`]. Rows outside the scope
/// behave as if they did not exist.
pub trait CardRepository {
    /// Add a card, or merge it into the row with the same uniqueness key.
    fn upsert(&self, draft: CardDraft, scope: &Scope) -> Result<Card>;

    /// Get a card by ID
    fn get_by_id(&self, id: &Uuid, scope: &Scope) -> Result<Card>;

    /// Apply field-level changes and refresh `updated_at`.
    fn update(&self, id: &Uuid, patch: CardPatch, scope: &Scope) -> Result<Card>;

    /// Flip `is_favorite` and refresh `updated_at`.
    fn toggle_favorite(&self, id: &Uuid, scope: &Scope) -> Result<Card>;

    /// Delete a card permanently
    fn delete(&self, id: &Uuid, scope: &Scope) -> Result<()>;

    fn search(&self, filter: &CardFilter, scope: &Scope) -> Result<Vec<Card>>;

    fn aggregate_stats(&self, scope: &Scope) -> Result<CollectionStats>;

    /// Remove every card. Admin scope only. Returns how many were removed.
    fn clear_all(&self, scope: &Scope) -> Result<usize>;
}

/// The storage variants, chosen at startup.
pub enum Backend {
    Memory(MemBackend),
    Sqlite(SqliteBackend),
}

impl StorageBackend for Backend {
    fn upsert(&self, card: NewCard, now: DateTime<Utc>) -> Result<Upserted> {
        match self {
            Backend::Memory(b) => b.upsert(card, now),
            Backend::Sqlite(b) => b.upsert(card, now),
        }
    }

    fn fetch(&self, id: &Uuid, scope: &Scope) -> Result<Option<Card>> {
        match self {
            Backend::Memory(b) => b.fetch(id, scope),
            Backend::Sqlite(b) => b.fetch(id, scope),
        }
    }

    fn modify(
        &self,
        id: &Uuid,
        scope: &Scope,
        edit: &mut dyn FnMut(&mut Card) -> Result<()>,
    ) -> Result<Option<Card>> {
        match self {
            Backend::Memory(b) => b.modify(id, scope, edit),
            Backend::Sqlite(b) => b.modify(id, scope, edit),
        }
    }

    fn remove(&self, id: &Uuid, scope: &Scope) -> Result<bool> {
        match self {
            Backend::Memory(b) => b.remove(id, scope),
            Backend::Sqlite(b) => b.remove(id, scope),
        }
    }

    fn query(&self, scope: &Scope, filter: &CardFilter) -> Result<Vec<Card>> {
        match self {
            Backend::Memory(b) => b.query(scope, filter),
            Backend::Sqlite(b) => b.query(scope, filter),
        }
    }

    fn stats(&self, scope: &Scope) -> Result<CollectionStats> {
        match self {
            Backend::Memory(b) => b.stats(scope),
            Backend::Sqlite(b) => b.stats(scope),
        }
    }

    fn remove_all(&self) -> Result<usize> {
        match self {
            Backend::Memory(b) => b.remove_all(),
            Backend::Sqlite(b) => b.remove_all(),
        }
    }

    fn close(self) -> Result<()> {
        match self {
            Backend::Memory(b) => b.close(),
            Backend::Sqlite(b) => b.close(),
        }
    }
}

/// Open the store described by `config`, creating the schema if needed.
pub fn open(config: &CardVaultConfig) -> Result<CardStore<Backend>> {
    let backend = match config.backend {
        BackendKind::Memory => Backend::Memory(MemBackend::new()),
        BackendKind::Sqlite => Backend::Sqlite(SqliteBackend::open(&config.database_path)?),
    };
    info!(backend = ?config.backend, "card store opened");
    Ok(CardStore::with_backend(backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(backend: BackendKind, database_path: PathBuf) -> CardVaultConfig {
        CardVaultConfig {
            backend,
            database_path,
            log_level: "warn".to_string(),
        }
    }

    #[test]
    fn open_memory_backend() {
        let store = open(&config(BackendKind::Memory, PathBuf::from("unused.db"))).unwrap();
        assert!(matches!(store.backend, Backend::Memory(_)));
        store.upsert(CardDraft::new("Mew"), &Scope::Admin).unwrap();
        store.close().unwrap();
    }

    #[test]
    fn open_sqlite_backend_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cards.db");

        let store = open(&config(BackendKind::Sqlite, path.clone())).unwrap();
        assert!(matches!(store.backend, Backend::Sqlite(_)));
        store.upsert(CardDraft::new("Mew"), &Scope::Admin).unwrap();
        store.close().unwrap();

        assert!(path.exists());
        let store = open(&config(BackendKind::Sqlite, path)).unwrap();
        assert_eq!(
            store.search(&CardFilter::new(), &Scope::Admin).unwrap().len(),
            1
        );
    }
}
