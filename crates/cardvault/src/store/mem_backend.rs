use super::backend::{StorageBackend, Upserted};
use crate::error::{CardError, Result};
use crate::filter::CardFilter;
use crate::model::{Card, NewCard};
use crate::scope::Scope;
use crate::stats::CollectionStats;
use crate::validation::{merged_quantity, ValidationError};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory storage backend.
///
/// Rows live in a `Vec` in insertion order behind an `RwLock`. Every write
/// holds the write lock for its whole read-check-write sequence, which is
/// what makes upserts on the same key serialize. Edits are made on a copy and
/// swapped in only once they pass all checks.
#[derive(Default)]
pub struct MemBackend {
    rows: RwLock<Vec<Card>>,
    simulate_write_error: AtomicBool,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Card>>> {
        self.rows
            .read()
            .map_err(|_| CardError::StorageUnavailable("card table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Card>>> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(CardError::StorageUnavailable(
                "Simulated write error".to_string(),
            ));
        }
        self.rows
            .write()
            .map_err(|_| CardError::StorageUnavailable("card table lock poisoned".to_string()))
    }
}

impl StorageBackend for MemBackend {
    fn upsert(&self, card: NewCard, now: DateTime<Utc>) -> Result<Upserted> {
        let mut rows = self.write()?;
        let key = card.key();

        if let Some(existing) = rows.iter_mut().find(|row| row.key() == key) {
            existing.quantity = merged_quantity(existing.quantity, card.quantity)?;
            existing.touch(now);
            return Ok(Upserted::Merged(existing.clone()));
        }

        let fresh = card.into_card(Uuid::new_v4(), now);
        rows.push(fresh.clone());
        Ok(Upserted::Inserted(fresh))
    }

    fn fetch(&self, id: &Uuid, scope: &Scope) -> Result<Option<Card>> {
        let rows = self.read()?;
        Ok(rows
            .iter()
            .find(|row| row.id == *id && scope.can_see(row.owner.as_ref()))
            .cloned())
    }

    fn modify(
        &self,
        id: &Uuid,
        scope: &Scope,
        edit: &mut dyn FnMut(&mut Card) -> Result<()>,
    ) -> Result<Option<Card>> {
        let mut rows = self.write()?;
        let Some(pos) = rows
            .iter()
            .position(|row| row.id == *id && scope.can_see(row.owner.as_ref()))
        else {
            return Ok(None);
        };

        let mut edited = rows[pos].clone();
        edit(&mut edited)?;
        if edited.quantity <= 0 {
            return Err(ValidationError::QuantityOutOfRange(edited.quantity).into());
        }

        let key = edited.key();
        if rows.iter().any(|row| row.id != *id && row.key() == key) {
            return Err(CardError::Validation(
                "another card already has this name, set, number and owner".to_string(),
            ));
        }

        rows[pos] = edited.clone();
        Ok(Some(edited))
    }

    fn remove(&self, id: &Uuid, scope: &Scope) -> Result<bool> {
        let mut rows = self.write()?;
        match rows
            .iter()
            .position(|row| row.id == *id && scope.can_see(row.owner.as_ref()))
        {
            Some(pos) => {
                rows.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn query(&self, scope: &Scope, filter: &CardFilter) -> Result<Vec<Card>> {
        let rows = self.read()?;
        let mut cards: Vec<Card> = rows
            .iter()
            .filter(|row| scope.can_see(row.owner.as_ref()) && filter.matches(row))
            .cloned()
            .collect();
        drop(rows);

        filter.sort.apply(&mut cards);
        Ok(cards)
    }

    fn stats(&self, scope: &Scope) -> Result<CollectionStats> {
        let rows = self.read()?;
        Ok(CollectionStats::from_cards(
            rows.iter().filter(|row| scope.can_see(row.owner.as_ref())),
        ))
    }

    fn remove_all(&self) -> Result<usize> {
        let mut rows = self.write()?;
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
