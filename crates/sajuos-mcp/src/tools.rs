//! Tool bodies, kept free of MCP types so they can be tested directly.

use serde::Serialize;
use serde_json::json;

use sajuos_core::context::{card_line, section_context};
use sajuos_core::{
    canonicalize, select_for_section, select_report, FeatureQuery, RuleCardStore, SECTIONS,
};

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

pub fn list_topics(store: &RuleCardStore) -> String {
    if store.is_empty() {
        return "No rule cards loaded. Check the rule-card path and call reload_rulecards."
            .to_string();
    }
    let mut out = format!("{} cards in {} topics\n", store.len(), store.by_topic().len());
    for topic in store.topics() {
        out.push_str(&format!("{} ({})\n", topic, store.topic(topic).len()));
    }
    out
}

pub fn get_card(store: &RuleCardStore, id: &str) -> Result<String, String> {
    store
        .get(id)
        .map(to_json)
        .ok_or_else(|| format!("No rule card with id '{}'", id))
}

pub fn get_topic_cards(store: &RuleCardStore, topic: &str, limit: Option<usize>) -> Result<String, String> {
    let cards = store.topic(topic);
    if cards.is_empty() {
        return Err(format!(
            "Unknown topic '{}'. Use list_topics to see available topics.",
            topic
        ));
    }
    let limit = limit.unwrap_or(cards.len());
    let lines: Vec<String> = cards
        .iter()
        .take(limit)
        .map(|c| format!("{:.1} {}", c.priority, card_line(c)))
        .collect();
    Ok(lines.join("\n"))
}

pub fn get_token_weights(store: &RuleCardStore, tokens: &[String]) -> String {
    let weights: Vec<_> = tokens
        .iter()
        .map(|t| {
            let token = canonicalize(t);
            let weight = store.token_weight(&token);
            json!({ "token": token, "weight": weight, "known": store.idf().contains_key(&token) })
        })
        .collect();
    to_json(&weights)
}

pub fn list_sections() -> String {
    to_json(&SECTIONS)
}

pub fn select_cards(
    store: &RuleCardStore,
    section_id: Option<&str>,
    feature_tags: &[String],
    max_cards: usize,
) -> Result<String, String> {
    let query = FeatureQuery::new(feature_tags);
    let selections = match section_id {
        Some(id) => {
            let section = sajuos_core::section(id)
                .ok_or_else(|| format!("Unknown section '{}'. Use list_sections.", id))?;
            vec![select_for_section(store, section, &query, max_cards)]
        }
        None => select_report(store, &query, max_cards),
    };

    let out: Vec<_> = selections
        .iter()
        .map(|sel| {
            json!({
                "section": sel.section.id,
                "title": sel.section.title,
                "cards": sel.cards.iter().map(|c| json!({
                    "id": c.card.id,
                    "topic": c.card.topic,
                    "priority": c.card.priority,
                    "score": c.score,
                    "matched": c.matched,
                    "topicMatch": c.topic_match,
                })).collect::<Vec<_>>(),
                "context": section_context(sel),
            })
        })
        .collect();
    Ok(to_json(&out))
}
