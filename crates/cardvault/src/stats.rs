//! Collection statistics.
//!
//! Stats are computed over exactly the rows visible in a scope, the same rows
//! an unfiltered search returns, so `total_cards` always equals the length of
//! that search.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Card;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    /// Distinct rows
    pub total_cards: u64,
    /// Sum of `quantity`, saturating at `i64::MAX`
    pub total_quantity: i64,
    pub favorite_count: u64,
    /// Distinct `set_name` values
    pub unique_sets: u64,
    /// Set with the most rows; ties go to the smallest name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_common_set: Option<String>,
}

impl CollectionStats {
    pub fn from_cards<'a>(cards: impl IntoIterator<Item = &'a Card>) -> Self {
        let mut stats = CollectionStats::default();
        let mut sets: BTreeMap<&str, u64> = BTreeMap::new();

        for card in cards {
            stats.total_cards += 1;
            stats.total_quantity = stats.total_quantity.saturating_add(card.quantity);
            if card.is_favorite {
                stats.favorite_count += 1;
            }
            *sets.entry(card.set_name.as_str()).or_default() += 1;
        }

        stats.unique_sets = sets.len() as u64;
        // BTreeMap iterates in name order, so the first maximum wins ties.
        let mut best: Option<(&str, u64)> = None;
        for (set, count) in sets {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((set, count));
            }
        }
        stats.most_common_set = best.map(|(set, _)| set.to_string());
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCard, DEFAULT_GRADE, DEFAULT_PRICE, UNKNOWN};
    use chrono::Utc;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn card(name: &str, set: &str, quantity: i64, favorite: bool) -> Card {
        NewCard {
            name: name.to_string(),
            set_name: set.to_string(),
            card_number: None,
            rarity: None,
            quantity,
            is_favorite: favorite,
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
    fn empty_collection() {
        let stats = CollectionStats::from_cards(&[]);
        assert_eq!(stats, CollectionStats::default());
        assert_eq!(stats.most_common_set, None);
    }

    #[test]
    fn counts_rows_quantities_and_favorites() {
        let cards = vec![
            card("Bulbasaur", "Base", 1, false),
            card("Ivysaur", "Base", 3, true),
            card("Venusaur", "Jungle", 2, false),
        ];
        let stats = CollectionStats::from_cards(&cards);
        assert_eq!(stats.total_cards, 3);
        assert_eq!(stats.total_quantity, 6);
        assert_eq!(stats.favorite_count, 1);
        assert_eq!(stats.unique_sets, 2);
        assert_eq!(stats.most_common_set.as_deref(), Some("Base"));
    }

    #[test]
    fn most_common_set_ties_go_to_smallest_name() {
        let cards = vec![card("A", "Jungle", 1, false), card("B", "Fossil", 1, false)];
        let stats = CollectionStats::from_cards(&cards);
        assert_eq!(stats.most_common_set.as_deref(), Some("Fossil"));
    }

    #[test]
    fn total_quantity_saturates() {
        let cards = vec![
            card("A", "Base", i64::MAX, false),
            card("B", "Base", i64::MAX, false),
        ];
        let stats = CollectionStats::from_cards(&cards);
        assert_eq!(stats.total_quantity, i64::MAX);
        assert_eq!(stats.total_cards, 2);
    }

    #[test]
    fn serializes_camel_case() {
        let stats = CollectionStats::from_cards(&[card("A", "Base", 2, true)]);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalCards"], 1);
        assert_eq!(json["totalQuantity"], 2);
        assert_eq!(json["favoriteCount"], 1);
        assert_eq!(json["mostCommonSet"], "Base");
    }
}
