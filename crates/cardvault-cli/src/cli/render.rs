//! Output formatting. Every function returns a string; printing happens in
//! `cli::run`.

use anyhow::Result;
use cardvault::model::Card;
use cardvault::stats::CollectionStats;
use serde::Serialize;

pub fn card_line(card: &Card) -> String {
    let mut line = format!("{}  {}", card.id, card.name);
    line.push_str(&format!(" [{}", card.set_name));
    if let Some(number) = &card.card_number {
        line.push_str(&format!(" {}", number));
    }
    line.push(']');
    line.push_str(&format!(" x{}", card.quantity));
    if card.is_favorite {
        line.push_str(" *");
    }
    line
}

pub fn card_list(cards: &[Card]) -> String {
    if cards.is_empty() {
        return "No cards found.".to_string();
    }
    cards
        .iter()
        .map(card_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn card_detail(card: &Card) -> String {
    let mut rows = vec![
        ("id", card.id.to_string()),
        ("name", card.name.clone()),
        ("set", card.set_name.clone()),
    ];
    if let Some(number) = &card.card_number {
        rows.push(("number", number.clone()));
    }
    if let Some(rarity) = &card.rarity {
        rows.push(("rarity", rarity.clone()));
    }
    rows.push(("quantity", card.quantity.to_string()));
    rows.push(("favorite", if card.is_favorite { "yes" } else { "no" }.to_string()));
    rows.push(("grade", format!("{:.1}", card.grade)));
    rows.push(("price", format!("{:.2}", card.price)));
    rows.push(("type", card.card_type.clone()));
    if !card.tags.is_empty() {
        let tags: Vec<&str> = card.tags.iter().map(String::as_str).collect();
        rows.push(("tags", tags.join(", ")));
    }
    if let Some(notes) = &card.notes {
        rows.push(("notes", notes.clone()));
    }
    if let Some(url) = &card.image_url {
        rows.push(("image", url.clone()));
    }
    if let Some(owner) = &card.owner {
        rows.push(("owner", owner.to_string()));
    }
    rows.push(("added", card.date_added.format("%Y-%m-%d %H:%M").to_string()));
    rows.push(("updated", card.updated_at.format("%Y-%m-%d %H:%M").to_string()));

    rows.iter()
        .map(|(label, value)| format!("{:>9}: {}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn stats(stats: &CollectionStats) -> String {
    let mut lines = vec![
        format!("Cards:     {}", stats.total_cards),
        format!("Copies:    {}", stats.total_quantity),
        format!("Favorites: {}", stats.favorite_count),
        format!("Sets:      {}", stats.unique_sets),
    ];
    if let Some(set) = &stats.most_common_set {
        lines.push(format!("Top set:   {}", set));
    }
    lines.join("\n")
}

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardvault::model::CardDraft;
    use cardvault::scope::Scope;
    use cardvault::store::{CardRepository, CardStore, MemBackend};

    fn sample() -> Card {
        let store = CardStore::with_backend(MemBackend::new());
        store
            .upsert(
                CardDraft::new("Charizard")
                    .with_set("Base Set")
                    .with_number("4/102")
                    .with_quantity(2)
                    .favorite()
                    .with_tag("holo"),
                &Scope::Admin,
            )
            .unwrap()
    }

    #[test]
    fn test_card_line() {
        let card = sample();
        let line = card_line(&card);
        assert!(line.ends_with("Charizard [Base Set 4/102] x2 *"));
        assert!(line.starts_with(&card.id.to_string()));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(card_list(&[]), "No cards found.");
    }

    #[test]
    fn test_detail_lists_tags() {
        let detail = card_detail(&sample());
        assert!(detail.contains("     tags: holo"));
        assert!(detail.contains("    grade: 5.0"));
        assert!(!detail.contains("owner"));
    }

    #[test]
    fn test_stats_omits_missing_top_set() {
        let text = stats(&CollectionStats::default());
        assert!(text.contains("Cards:     0"));
        assert!(!text.contains("Top set"));
    }
}
