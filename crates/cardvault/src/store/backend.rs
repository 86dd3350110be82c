use crate::error::Result;
use crate::filter::CardFilter;
use crate::model::{Card, NewCard};
use crate::scope::Scope;
use crate::stats::CollectionStats;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of an upsert, so callers can tell a fresh row from a merge.
#[derive(Debug, Clone, PartialEq)]
pub enum Upserted {
    Inserted(Card),
    Merged(Card),
}

impl Upserted {
    pub fn into_card(self) -> Card {
        match self {
            Upserted::Inserted(card) | Upserted::Merged(card) => card,
        }
    }
}

/// Abstract interface for raw row storage.
///
/// This trait handles the "how" of storage (in-memory vs SQLite), while
/// `CardStore` handles the "what" (validation, scoping, logging).
///
/// Every method is one all-or-nothing unit of work: either its whole effect
/// is committed or none of it is. Implementations are shared between threads
/// and must serialize writers that touch the same uniqueness key.
pub trait StorageBackend: Send + Sync {
    /// Insert `card` under a store-assigned id, or, if a row with the same
    /// uniqueness key exists, add `card.quantity` to it and refresh its
    /// `updated_at`. No other field of an existing row changes.
    fn upsert(&self, card: NewCard, now: DateTime<Utc>) -> Result<Upserted>;

    /// Load a row if it exists and is visible in `scope`.
    fn fetch(&self, id: &Uuid, scope: &Scope) -> Result<Option<Card>>;

    /// Read-modify-write a visible row in one unit of work.
    ///
    /// Returns `Ok(None)` if the row is absent or hidden. If `edit` fails, or
    /// the edited row would collide with another row's uniqueness key, nothing
    /// is written.
    fn modify(
        &self,
        id: &Uuid,
        scope: &Scope,
        edit: &mut dyn FnMut(&mut Card) -> Result<()>,
    ) -> Result<Option<Card>>;

    /// Delete a visible row. Returns false if it was absent or hidden.
    fn remove(&self, id: &Uuid, scope: &Scope) -> Result<bool>;

    /// Visible rows matching `filter`, ordered per `filter.sort`.
    fn query(&self, scope: &Scope, filter: &CardFilter) -> Result<Vec<Card>>;

    /// Stats over the visible rows.
    fn stats(&self, scope: &Scope) -> Result<CollectionStats>;

    /// Delete every row regardless of owner. Returns how many were removed.
    fn remove_all(&self) -> Result<usize>;

    /// Release the underlying resources.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
