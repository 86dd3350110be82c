//! # Domain Model: Cards, Drafts and Patches
//!
//! This module defines the records cardvault stores and the shapes callers use
//! to create and change them: [`Card`], [`CardDraft`], [`CardPatch`] and the
//! [`UniquenessKey`] that the upsert engine deduplicates on.
//!
//! ## Record Lifecycle
//!
//! ```text
//! CardDraft ──validate──▶ NewCard ──upsert──▶ Card (fresh row)
//!                                      └────▶ Card (existing row, quantity += n)
//! Card ──CardPatch──▶ Card (updated_at refreshed)
//! ```
//!
//! A [`Card`] is always a *value*: the store hands out copies and never lets a
//! caller hold a reference into its rows.
//!
//! ## Uniqueness
//!
//! The tuple `(name, set_name, card_number, owner)` identifies at most one row.
//! Comparison is exact on the trimmed values, and an absent `card_number` is a
//! different key from an empty one.
//!
//! ## Timestamps
//!
//! All timestamps are UTC with microsecond precision, so a card reads back the
//! same from every backend. `updated_at` only ever moves forward, see
//! [`Card::touch`].

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::error::{CardError, Result};
use crate::scope::Scope;

/// Placeholder for `set_name` and `card_type` when none is given.
pub const UNKNOWN: &str = "Unknown";

pub const DEFAULT_GRADE: f64 = 5.0;
pub const DEFAULT_PRICE: f64 = 0.0;
pub const DEFAULT_QUANTITY: i64 = 1;

/// Identity of a card owner, as handed to us by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(CardError::Validation(
                "owner identity cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub name: String,
    pub set_name: String,
    pub card_number: Option<String>,
    pub rarity: Option<String>,
    pub quantity: i64,
    pub is_favorite: bool,
    pub grade: f64,
    pub price: f64,
    pub card_type: String,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerId>,
    pub date_added: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn key(&self) -> UniquenessKey {
        UniquenessKey {
            name: self.name.clone(),
            set_name: self.set_name.clone(),
            card_number: self.card_number.clone(),
            owner: self.owner.clone(),
        }
    }

    /// Refresh `updated_at`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }

    /// The record as a caller in `scope` should see it.
    ///
    /// Non-admin callers only ever see their own rows and public rows, so the
    /// owner field carries no information for them and is dropped.
    pub fn for_scope(mut self, scope: &Scope) -> Self {
        if !scope.is_admin() {
            self.owner = None;
        }
        self
    }
}

/// Attributes for an add operation. Only `name` is required.
///
/// ```
/// use cardvault::model::CardDraft;
///
/// let draft = CardDraft::new("Charizard")
///     .with_set("Base Set")
///     .with_number("4/102")
///     .with_quantity(2)
///     .with_tag("holo");
/// assert_eq!(draft.quantity, Some(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardDraft {
    pub name: String,
    pub set_name: Option<String>,
    pub card_number: Option<String>,
    pub rarity: Option<String>,
    pub quantity: Option<i64>,
    pub is_favorite: bool,
    pub grade: Option<f64>,
    pub price: Option<f64>,
    pub card_type: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    /// Only honoured under the admin scope; owner scopes always add to themselves.
    pub owner: Option<OwnerId>,
}

impl CardDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_set(mut self, set_name: impl Into<String>) -> Self {
        self.set_name = Some(set_name.into());
        self
    }

    pub fn with_number(mut self, card_number: impl Into<String>) -> Self {
        self.card_number = Some(card_number.into());
        self
    }

    pub fn with_rarity(mut self, rarity: impl Into<String>) -> Self {
        self.rarity = Some(rarity.into());
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn favorite(mut self) -> Self {
        self.is_favorite = true;
        self
    }

    pub fn with_grade(mut self, grade: f64) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_type(mut self, card_type: impl Into<String>) -> Self {
        self.card_type = Some(card_type.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// A validated draft with defaults filled in, ready for the upsert engine.
///
/// Produced by [`crate::validation::validate_draft`]; the store assigns the
/// id and timestamps when it turns one into a [`Card`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub name: String,
    pub set_name: String,
    pub card_number: Option<String>,
    pub rarity: Option<String>,
    pub quantity: i64,
    pub is_favorite: bool,
    pub grade: f64,
    pub price: f64,
    pub card_type: String,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub tags: BTreeSet<String>,
    pub owner: Option<OwnerId>,
}

impl NewCard {
    pub fn key(&self) -> UniquenessKey {
        UniquenessKey {
            name: self.name.clone(),
            set_name: self.set_name.clone(),
            card_number: self.card_number.clone(),
            owner: self.owner.clone(),
        }
    }

    pub fn into_card(self, id: Uuid, now: DateTime<Utc>) -> Card {
        Card {
            id,
            name: self.name,
            set_name: self.set_name,
            card_number: self.card_number,
            rarity: self.rarity,
            quantity: self.quantity,
            is_favorite: self.is_favorite,
            grade: self.grade,
            price: self.price,
            card_type: self.card_type,
            notes: self.notes,
            image_url: self.image_url,
            tags: self.tags,
            owner: self.owner,
            date_added: now,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field-level changes for an existing card. `None` leaves a field alone.
///
/// Optional text fields are doubly wrapped so a patch can clear them:
/// `Some(None)` removes the value, `Some(Some(..))` replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardPatch {
    pub name: Option<String>,
    pub set_name: Option<String>,
    #[serde(
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub card_number: Option<Option<String>>,
    #[serde(
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub rarity: Option<Option<String>>,
    pub quantity: Option<i64>,
    pub is_favorite: Option<bool>,
    pub grade: Option<f64>,
    pub price: Option<f64>,
    pub card_type: Option<String>,
    #[serde(
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<Option<String>>,
    pub tags: Option<BTreeSet<String>>,
}

/// A present field, `null` included, becomes `Some(..)`; a missing field stays
/// `None` through `#[serde(default)]`.
fn clearable<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl CardPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the fields this patch touches, for logging.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let flags = [
            (self.name.is_some(), "name"),
            (self.set_name.is_some(), "set_name"),
            (self.card_number.is_some(), "card_number"),
            (self.rarity.is_some(), "rarity"),
            (self.quantity.is_some(), "quantity"),
            (self.is_favorite.is_some(), "is_favorite"),
            (self.grade.is_some(), "grade"),
            (self.price.is_some(), "price"),
            (self.card_type.is_some(), "card_type"),
            (self.notes.is_some(), "notes"),
            (self.image_url.is_some(), "image_url"),
            (self.tags.is_some(), "tags"),
        ];
        for (set, field) in flags {
            if set {
                fields.push(field);
            }
        }
        fields
    }

    /// Copy every present field onto `card`. Assumes the patch was validated.
    pub fn apply_to(&self, card: &mut Card) {
        if let Some(name) = &self.name {
            card.name = name.clone();
        }
        if let Some(set_name) = &self.set_name {
            card.set_name = set_name.clone();
        }
        if let Some(card_number) = &self.card_number {
            card.card_number = card_number.clone();
        }
        if let Some(rarity) = &self.rarity {
            card.rarity = rarity.clone();
        }
        if let Some(quantity) = self.quantity {
            card.quantity = quantity;
        }
        if let Some(is_favorite) = self.is_favorite {
            card.is_favorite = is_favorite;
        }
        if let Some(grade) = self.grade {
            card.grade = grade;
        }
        if let Some(price) = self.price {
            card.price = price;
        }
        if let Some(card_type) = &self.card_type {
            card.card_type = card_type.clone();
        }
        if let Some(notes) = &self.notes {
            card.notes = notes.clone();
        }
        if let Some(image_url) = &self.image_url {
            card.image_url = image_url.clone();
        }
        if let Some(tags) = &self.tags {
            card.tags = tags.clone();
        }
    }
}

/// The `(name, set_name, card_number, owner)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniquenessKey {
    pub name: String,
    pub set_name: String,
    pub card_number: Option<String>,
    pub owner: Option<OwnerId>,
}

impl UniquenessKey {
    /// Stable text form used as the unique column in relational stores.
    ///
    /// JSON keeps `null` and `""` apart, which a plain `UNIQUE` over nullable
    /// columns would not.
    pub fn encode(&self) -> Result<String> {
        let tuple = (
            &self.name,
            &self.set_name,
            &self.card_number,
            self.owner.as_ref().map(OwnerId::as_str),
        );
        Ok(serde_json::to_string(&tuple)?)
    }
}

/// Current time at the precision every backend can store.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
