//! Search filters.
//!
//! A [`CardFilter`] is a set of independent predicates, all optional and ANDed
//! together. Absence of a predicate means "no restriction", so the default
//! filter matches every visible card.
//!
//! - `query`: case-insensitive substring over `name`, `set_name`,
//!   `card_number` and `rarity` (a card matches if *any* of them contains it)
//! - `favorites_only`: only cards with `is_favorite`
//! - `tag`: the card's tag set contains this exact tag
//! - `card_type`: exact match on the classification
//!
//! Visibility is not part of the filter; backends apply the scope first.
//!
//! Backends that push predicates down to a query language must reuse
//! [`text_matches`] for the query predicate so every store folds case the
//! same way.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CardError;
use crate::model::Card;

/// Result ordering for searches. Every order is stable, with insertion order
/// as the final tiebreak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Insertion,
    /// Case-insensitive by name
    Name,
    /// Most recently added first
    Newest,
}

impl SortOrder {
    /// Reorder `cards`, which must already be in insertion order.
    pub fn apply(&self, cards: &mut [Card]) {
        match self {
            SortOrder::Insertion => {}
            SortOrder::Name => cards.sort_by_cached_key(|c| c.name.to_lowercase()),
            SortOrder::Newest => cards.sort_by(|a, b| b.date_added.cmp(&a.date_added)),
        }
    }
}

impl FromStr for SortOrder {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insertion" => Ok(SortOrder::Insertion),
            "name" => Ok(SortOrder::Name),
            "newest" | "date_added" => Ok(SortOrder::Newest),
            other => Err(CardError::Validation(format!(
                "unknown sort order '{}' (expected insertion, name or newest)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardFilter {
    pub query: Option<String>,
    pub favorites_only: bool,
    pub tag: Option<String>,
    pub card_type: Option<String>,
    pub sort: SortOrder,
}

impl CardFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn favorites_only(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn card_type(mut self, card_type: impl Into<String>) -> Self {
        self.card_type = Some(card_type.into());
        self
    }

    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// The query as backends should match it: trimmed, lowercased, and
    /// `None` when blank.
    pub fn needle(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    /// Tag predicate, trimmed the same way stored tags are. A blank tag is
    /// still a predicate: no stored tag is empty, so it matches nothing.
    pub fn tag_value(&self) -> Option<&str> {
        self.tag.as_deref().map(str::trim)
    }

    /// Type predicate. Stored types are never blank, so a blank one matches
    /// nothing.
    pub fn card_type_value(&self) -> Option<&str> {
        self.card_type.as_deref().map(str::trim)
    }

    pub fn matches(&self, card: &Card) -> bool {
        if self.favorites_only && !card.is_favorite {
            return false;
        }
        if let Some(tag) = self.tag_value() {
            if !card.tags.contains(tag) {
                return false;
            }
        }
        if let Some(card_type) = self.card_type_value() {
            if card.card_type != card_type {
                return false;
            }
        }
        if let Some(needle) = self.needle() {
            let fields = [
                Some(card.name.as_str()),
                Some(card.set_name.as_str()),
                card.card_number.as_deref(),
                card.rarity.as_deref(),
            ];
            if !text_matches(&needle, fields.into_iter().flatten()) {
                return false;
            }
        }
        true
    }
}

/// True if any field contains `needle`, ignoring case.
///
/// `needle` must already be lowercased (see [`CardFilter::needle`]).
pub fn text_matches<'a>(needle: &str, fields: impl IntoIterator<Item = &'a str>) -> bool {
    fields
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCard, DEFAULT_GRADE, DEFAULT_PRICE, UNKNOWN};
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn card(name: &str, set: &str) -> Card {
        NewCard {
            name: name.to_string(),
            set_name: set.to_string(),
            card_number: None,
            rarity: None,
            quantity: 1,
            is_favorite: false,
            grade: DEFAULT_GRADE,
            price: DEFAULT_PRICE,
            card_type: UNKNOWN.to_string(),
            notes: None,
            image_url: None,
            tags: BTreeSet::new(),
            owner: None,
        }
        .into_card(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn default_filter_matches_everything() {
        assert!(CardFilter::default().matches(&card("Mew", "Promo")));
    }

    #[test]
    fn query_is_case_insensitive_across_fields() {
        let mut c = card("Charizard", "Base Set");
        c.card_number = Some("4/102".to_string());
        c.rarity = Some("Holo Rare".to_string());

        assert!(CardFilter::new().query("CHAR").matches(&c));
        assert!(CardFilter::new().query("base").matches(&c));
        assert!(CardFilter::new().query("4/10").matches(&c));
        assert!(CardFilter::new().query("holo").matches(&c));
        assert!(!CardFilter::new().query("blastoise").matches(&c));
    }

    #[test]
    fn blank_query_is_ignored() {
        assert_eq!(CardFilter::new().query("   ").needle(), None);
        assert!(CardFilter::new().query("  ").matches(&card("Mew", "Promo")));
    }

    #[test]
    fn predicates_are_anded() {
        let mut c = card("Pikachu", "Jungle");
        c.tags.insert("electric".to_string());

        let filter = CardFilter::new().query("pika").tag("electric");
        assert!(filter.matches(&c));

        let filter = filter.favorites_only();
        assert!(!filter.matches(&c));

        c.is_favorite = true;
        assert!(filter.matches(&c));
        assert!(!filter.clone().card_type("Trainer").matches(&c));
    }

    #[test]
    fn tag_is_exact_membership() {
        let mut c = card("Onix", "Base");
        c.tags.insert("rock".to_string());
        assert!(CardFilter::new().tag("rock").matches(&c));
        assert!(!CardFilter::new().tag("roc").matches(&c));
        assert!(!CardFilter::new().tag("Rock").matches(&c));
    }

    #[test]
    fn blank_tag_or_type_matches_nothing() {
        let mut c = card("Onix", "Base");
        c.tags.insert("rock".to_string());
        assert!(!CardFilter::new().tag("").matches(&c));
        assert!(!CardFilter::new().tag("  ").matches(&c));
        assert!(!CardFilter::new().card_type(" ").matches(&c));
        assert!(CardFilter::new().tag(" rock ").matches(&c));
    }

    #[test]
    fn sort_by_name_is_stable() {
        let mut cards = vec![card("beta", "1"), card("Alpha", "2"), card("alpha", "3")];
        SortOrder::Name.apply(&mut cards);
        let sets: Vec<_> = cards.iter().map(|c| c.set_name.as_str()).collect();
        assert_eq!(sets, vec!["2", "3", "1"]);
    }

    #[test]
    fn sort_newest_first() {
        let mut old = card("Old", "1");
        old.date_added = Utc::now() - Duration::days(2);
        let mut cards = vec![old, card("New", "2")];
        SortOrder::Newest.apply(&mut cards);
        assert_eq!(cards[0].name, "New");
    }

    #[test]
    fn parse_sort_order() {
        assert_eq!("name".parse::<SortOrder>().unwrap(), SortOrder::Name);
        assert_eq!("NEWEST".parse::<SortOrder>().unwrap(), SortOrder::Newest);
        assert_eq!(
            "insertion".parse::<SortOrder>().unwrap(),
            SortOrder::Insertion
        );
        assert!("price".parse::<SortOrder>().is_err());
    }
}
