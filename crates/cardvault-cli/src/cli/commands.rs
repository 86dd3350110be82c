use super::render;
use super::setup::{CardDetails, ClearField, Commands};
use anyhow::Result;
use cardvault::filter::CardFilter;
use cardvault::model::{CardDraft, CardPatch, OwnerId};
use cardvault::scope::Scope;
use cardvault::store::CardRepository;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Serialize)]
struct Cleared {
    removed: usize,
}

#[derive(Serialize)]
struct Deleted {
    deleted: uuid::Uuid,
}

/// Run one command against `repo` and return what should be printed.
pub fn execute<R: CardRepository>(
    repo: &R,
    scope: &Scope,
    command: Commands,
    json: bool,
) -> Result<String> {
    let output = match command {
        Commands::Add {
            name,
            details,
            quantity,
            favorite,
            tags,
            owner,
        } => {
            let draft = build_draft(name, details, quantity, favorite, tags, owner)?;
            let card = repo.upsert(draft, scope)?.for_scope(scope);
            if json {
                render::json(&card)?
            } else {
                render::card_line(&card)
            }
        }

        Commands::List {
            query,
            favorites,
            tag,
            card_type,
            sort,
        } => {
            let filter = CardFilter {
                query,
                favorites_only: favorites,
                tag,
                card_type,
                sort: sort.into(),
            };
            let cards: Vec<_> = repo
                .search(&filter, scope)?
                .into_iter()
                .map(|card| card.for_scope(scope))
                .collect();
            if json {
                render::json(&cards)?
            } else {
                render::card_list(&cards)
            }
        }

        Commands::Show { id } => {
            let card = repo.get_by_id(&id, scope)?.for_scope(scope);
            if json {
                render::json(&card)?
            } else {
                render::card_detail(&card)
            }
        }

        Commands::Update {
            id,
            name,
            details,
            quantity,
            favorite,
            tags,
            clear,
        } => {
            let patch = build_patch(name, details, quantity, favorite, tags, &clear);
            let card = repo.update(&id, patch, scope)?.for_scope(scope);
            if json {
                render::json(&card)?
            } else {
                render::card_detail(&card)
            }
        }

        Commands::Favorite { id } => {
            let card = repo.toggle_favorite(&id, scope)?.for_scope(scope);
            if json {
                render::json(&card)?
            } else {
                render::card_line(&card)
            }
        }

        Commands::Delete { id } => {
            repo.delete(&id, scope)?;
            if json {
                render::json(&Deleted { deleted: id })?
            } else {
                format!("Deleted {}", id)
            }
        }

        Commands::Stats => {
            let stats = repo.aggregate_stats(scope)?;
            if json {
                render::json(&stats)?
            } else {
                render::stats(&stats)
            }
        }

        Commands::Clear => {
            let removed = repo.clear_all(scope)?;
            if json {
                render::json(&Cleared { removed })?
            } else {
                format!("Removed {} cards", removed)
            }
        }
    };
    Ok(output)
}

fn build_draft(
    name: String,
    details: CardDetails,
    quantity: Option<i64>,
    favorite: bool,
    tags: Vec<String>,
    owner: Option<String>,
) -> Result<CardDraft> {
    Ok(CardDraft {
        name,
        set_name: details.set_name,
        card_number: details.card_number,
        rarity: details.rarity,
        quantity,
        is_favorite: favorite,
        grade: details.grade,
        price: details.price,
        card_type: details.card_type,
        notes: details.notes,
        image_url: details.image_url,
        tags,
        owner: owner.map(OwnerId::new).transpose()?,
    })
}

fn build_patch(
    name: Option<String>,
    details: CardDetails,
    quantity: Option<i64>,
    favorite: Option<bool>,
    tags: Vec<String>,
    clear: &[ClearField],
) -> CardPatch {
    let cleared = |field| clear.contains(&field);
    let text = |value: Option<String>, field| {
        if cleared(field) {
            Some(None)
        } else {
            value.map(Some)
        }
    };

    let tags = if cleared(ClearField::Tags) {
        Some(BTreeSet::new())
    } else if tags.is_empty() {
        None
    } else {
        Some(tags.into_iter().collect())
    };

    CardPatch {
        name,
        set_name: details.set_name,
        card_number: text(details.card_number, ClearField::Number),
        rarity: text(details.rarity, ClearField::Rarity),
        quantity,
        is_favorite: favorite,
        grade: details.grade,
        price: details.price,
        card_type: details.card_type,
        notes: text(details.notes, ClearField::Notes),
        image_url: text(details.image_url, ClearField::ImageUrl),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::setup::SortArg;
    use cardvault::store::{CardStore, MemBackend};
    use cardvault::CardError;

    fn owner(id: &str) -> Scope {
        Scope::Owner(OwnerId::new(id).unwrap())
    }

    fn add(name: &str) -> Commands {
        Commands::Add {
            name: name.to_string(),
            details: CardDetails::default(),
            quantity: None,
            favorite: false,
            tags: vec![],
            owner: None,
        }
    }

    #[test]
    fn test_add_then_list() {
        let repo = CardStore::with_backend(MemBackend::new());
        let scope = owner("ash");
        execute(&repo, &scope, add("Pikachu"), false).unwrap();
        execute(&repo, &scope, add("Pikachu"), false).unwrap();

        let out = execute(
            &repo,
            &scope,
            Commands::List {
                query: None,
                favorites: false,
                tag: None,
                card_type: None,
                sort: SortArg::Insertion,
            },
            false,
        )
        .unwrap();
        assert!(out.contains("Pikachu [Unknown] x2"));
    }

    #[test]
    fn test_json_output_redacts_owner_for_users() {
        let repo = CardStore::with_backend(MemBackend::new());
        let out = execute(&repo, &owner("ash"), add("Eevee"), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["name"], "Eevee");
        assert!(value.get("owner").is_none());

        let out = execute(
            &repo,
            &Scope::Admin,
            Commands::List {
                query: None,
                favorites: false,
                tag: None,
                card_type: None,
                sort: SortArg::Insertion,
            },
            true,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["owner"], "ash");
    }

    #[test]
    fn test_clear_as_user_is_forbidden() {
        let repo = CardStore::with_backend(MemBackend::new());
        let err = execute(&repo, &owner("ash"), Commands::Clear, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CardError>(),
            Some(CardError::Forbidden(_))
        ));
    }

    #[test]
    fn test_build_patch_clears_fields() {
        let details = CardDetails {
            rarity: Some("Rare".to_string()),
            notes: Some("ignored".to_string()),
            ..Default::default()
        };
        let patch = build_patch(
            None,
            details,
            None,
            Some(true),
            vec![],
            &[ClearField::Notes, ClearField::Tags],
        );
        assert_eq!(patch.rarity, Some(Some("Rare".to_string())));
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.tags, Some(BTreeSet::new()));
        assert_eq!(patch.is_favorite, Some(true));
        assert_eq!(patch.card_number, None);
    }
}
