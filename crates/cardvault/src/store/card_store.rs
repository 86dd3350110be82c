use super::backend::{StorageBackend, Upserted};
use super::CardRepository;
use crate::error::{CardError, Result};
use crate::filter::CardFilter;
use crate::model::{timestamp_now, Card, CardDraft, CardPatch};
use crate::scope::Scope;
use crate::stats::CollectionStats;
use crate::validation::{validate_draft, validate_patch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The repository proper: validation, scoping and logging over a backend.
pub struct CardStore<B: StorageBackend> {
    /// The underlying storage backend.
    /// Exposed as pub(crate) for testing and internal access only.
    pub(crate) backend: B,
}

impl<B: StorageBackend> CardStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Release the backend. Any failure to flush or close is reported.
    pub fn close(self) -> Result<()> {
        self.backend.close()
    }
}

fn rejected<'a>(op: &'static str, scope: &'a Scope) -> impl Fn(&CardError) + 'a {
    move |err| {
        if err.is_storage() {
            warn!(op, scope = %scope, error = %err, "storage failure")
        } else {
            warn!(op, scope = %scope, error = %err, "request rejected")
        }
    }
}

impl<B: StorageBackend> CardRepository for CardStore<B> {
    fn upsert(&self, draft: CardDraft, scope: &Scope) -> Result<Card> {
        let mut card = validate_draft(draft)
            .map_err(CardError::from)
            .inspect_err(rejected("upsert", scope))?;
        card.owner = scope.assign_owner(card.owner.take());

        match self
            .backend
            .upsert(card, timestamp_now())
            .inspect_err(rejected("upsert", scope))?
        {
            Upserted::Inserted(card) => {
                info!(card_id = %card.id, name = %card.name, quantity = card.quantity, scope = %scope, "card added");
                Ok(card)
            }
            Upserted::Merged(card) => {
                info!(card_id = %card.id, name = %card.name, quantity = card.quantity, scope = %scope, "card merged into existing row");
                Ok(card)
            }
        }
    }

    fn get_by_id(&self, id: &Uuid, scope: &Scope) -> Result<Card> {
        debug!(card_id = %id, scope = %scope, "get card");
        self.backend
            .fetch(id, scope)?
            .ok_or(CardError::NotFound(*id))
    }

    fn update(&self, id: &Uuid, patch: CardPatch, scope: &Scope) -> Result<Card> {
        let patch = validate_patch(patch)
            .map_err(CardError::from)
            .inspect_err(rejected("update", scope))?;
        let now = timestamp_now();

        let card = self
            .backend
            .modify(id, scope, &mut |card| {
                patch.apply_to(card);
                card.touch(now);
                Ok(())
            })
            .and_then(|card| card.ok_or(CardError::NotFound(*id)))
            .inspect_err(rejected("update", scope))?;

        info!(card_id = %id, fields = ?patch.fields(), scope = %scope, "card updated");
        Ok(card)
    }

    fn toggle_favorite(&self, id: &Uuid, scope: &Scope) -> Result<Card> {
        let now = timestamp_now();
        let card = self
            .backend
            .modify(id, scope, &mut |card| {
                card.is_favorite = !card.is_favorite;
                card.touch(now);
                Ok(())
            })
            .and_then(|card| card.ok_or(CardError::NotFound(*id)))
            .inspect_err(rejected("toggle_favorite", scope))?;

        info!(card_id = %id, is_favorite = card.is_favorite, scope = %scope, "favorite toggled");
        Ok(card)
    }

    fn delete(&self, id: &Uuid, scope: &Scope) -> Result<()> {
        let removed = self
            .backend
            .remove(id, scope)
            .inspect_err(rejected("delete", scope))?;
        if !removed {
            let err = CardError::NotFound(*id);
            rejected("delete", scope)(&err);
            return Err(err);
        }
        info!(card_id = %id, scope = %scope, "card deleted");
        Ok(())
    }

    fn search(&self, filter: &CardFilter, scope: &Scope) -> Result<Vec<Card>> {
        let cards = self.backend.query(scope, filter)?;
        debug!(scope = %scope, ?filter, results = cards.len(), "search");
        Ok(cards)
    }

    fn aggregate_stats(&self, scope: &Scope) -> Result<CollectionStats> {
        let stats = self.backend.stats(scope)?;
        debug!(scope = %scope, total_cards = stats.total_cards, "stats");
        Ok(stats)
    }

    fn clear_all(&self, scope: &Scope) -> Result<usize> {
        if !scope.can_clear_all() {
            let err = CardError::Forbidden("clearing all cards requires the admin scope".to_string());
            rejected("clear_all", scope)(&err);
            return Err(err);
        }
        let removed = self
            .backend
            .remove_all()
            .inspect_err(rejected("clear_all", scope))?;
        info!(removed, "all cards cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OwnerId;
    use crate::store::mem_backend::MemBackend;
    use std::collections::BTreeSet;

    fn store() -> CardStore<MemBackend> {
        CardStore::with_backend(MemBackend::new())
    }

    fn owner(id: &str) -> Scope {
        Scope::Owner(OwnerId::new(id).unwrap())
    }

    #[test]
    fn upsert_validates_before_touching_the_store() {
        let store = store();
        let result = store.upsert(CardDraft::new("  "), &Scope::Admin);
        assert!(matches!(result, Err(CardError::Validation(_))));

        let result = store.upsert(CardDraft::new("Mew").with_quantity(0), &Scope::Admin);
        assert!(matches!(result, Err(CardError::Validation(_))));

        assert!(store.search(&CardFilter::new(), &Scope::Admin).unwrap().is_empty());
    }

    #[test]
    fn owner_scope_assigns_itself_as_owner() {
        let store = store();
        let card = store
            .upsert(
                CardDraft::new("Psyduck").with_owner(OwnerId::new("misty").unwrap()),
                &owner("brock"),
            )
            .unwrap();
        assert_eq!(card.owner.unwrap().as_str(), "brock");

        let card = store.upsert(CardDraft::new("Togepi"), &Scope::Admin).unwrap();
        assert_eq!(card.owner, None);
    }

    #[test]
    fn same_name_different_owners_are_different_rows() {
        let store = store();
        let a = store.upsert(CardDraft::new("Pikachu"), &owner("ash")).unwrap();
        let b = store.upsert(CardDraft::new("Pikachu"), &owner("gary")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(
            store.aggregate_stats(&Scope::Admin).unwrap().total_cards,
            2
        );
    }

    #[test]
    fn merge_keeps_descriptive_fields() {
        let store = store();
        store
            .upsert(
                CardDraft::new("Charizard").with_grade(9.0).with_tag("holo"),
                &Scope::Admin,
            )
            .unwrap();
        let merged = store
            .upsert(
                CardDraft::new("Charizard").with_grade(2.0).with_quantity(4),
                &Scope::Admin,
            )
            .unwrap();
        assert_eq!(merged.quantity, 5);
        assert_eq!(merged.grade, 9.0);
        assert_eq!(merged.tags, BTreeSet::from(["holo".to_string()]));
    }

    #[test]
    fn update_applies_patch_and_refreshes_updated_at() {
        let store = store();
        let card = store.upsert(CardDraft::new("Squirtle"), &Scope::Admin).unwrap();

        let patch = CardPatch {
            price: Some(12.5),
            notes: Some(Some("first edition".to_string())),
            ..Default::default()
        };
        let updated = store.update(&card.id, patch, &Scope::Admin).unwrap();
        assert_eq!(updated.price, 12.5);
        assert_eq!(updated.notes.as_deref(), Some("first edition"));
        assert!(updated.updated_at >= card.updated_at);
        assert_eq!(updated.created_at, card.created_at);
    }

    #[test]
    fn empty_patch_succeeds() {
        let store = store();
        let card = store.upsert(CardDraft::new("Oddish"), &Scope::Admin).unwrap();
        let updated = store
            .update(&card.id, CardPatch::default(), &Scope::Admin)
            .unwrap();
        assert_eq!(updated.name, "Oddish");
    }

    #[test]
    fn mutations_outside_scope_are_not_found() {
        let store = store();
        let card = store.upsert(CardDraft::new("Eevee"), &owner("gary")).unwrap();
        let ash = owner("ash");

        assert!(matches!(
            store.get_by_id(&card.id, &ash),
            Err(CardError::NotFound(_))
        ));
        assert!(matches!(
            store.update(&card.id, CardPatch::default(), &ash),
            Err(CardError::NotFound(_))
        ));
        assert!(matches!(
            store.toggle_favorite(&card.id, &ash),
            Err(CardError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&card.id, &ash),
            Err(CardError::NotFound(_))
        ));
        assert!(store.get_by_id(&card.id, &owner("gary")).is_ok());
    }

    #[test]
    fn toggle_favorite_flips() {
        let store = store();
        let card = store.upsert(CardDraft::new("Jigglypuff"), &Scope::Admin).unwrap();
        assert!(!card.is_favorite);

        let card = store.toggle_favorite(&card.id, &Scope::Admin).unwrap();
        assert!(card.is_favorite);
        let card = store.toggle_favorite(&card.id, &Scope::Admin).unwrap();
        assert!(!card.is_favorite);
    }

    #[test]
    fn delete_twice_is_not_found() {
        let store = store();
        let card = store.upsert(CardDraft::new("Magikarp"), &Scope::Admin).unwrap();
        store.delete(&card.id, &Scope::Admin).unwrap();
        assert!(matches!(
            store.delete(&card.id, &Scope::Admin),
            Err(CardError::NotFound(id)) if id == card.id
        ));
    }

    #[test]
    fn clear_all_requires_admin() {
        let store = store();
        store.upsert(CardDraft::new("Zubat"), &owner("ash")).unwrap();

        assert!(matches!(
            store.clear_all(&owner("ash")),
            Err(CardError::Forbidden(_))
        ));
        assert_eq!(store.search(&CardFilter::new(), &Scope::Admin).unwrap().len(), 1);

        assert_eq!(store.clear_all(&Scope::Admin).unwrap(), 1);
        assert!(store.search(&CardFilter::new(), &Scope::Admin).unwrap().is_empty());
    }

    #[test]
    fn storage_failures_surface_as_unavailable() {
        let store = store();
        store.backend.set_simulate_write_error(true);
        let err = store
            .upsert(CardDraft::new("Ditto"), &Scope::Admin)
            .unwrap_err();
        assert!(matches!(err, CardError::StorageUnavailable(_)));
        assert!(err.is_storage());
    }
}
