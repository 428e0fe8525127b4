use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::card::{explode, RuleCard};
use crate::sections::{SectionSpec, SECTIONS};
use crate::store::RuleCardStore;

/// Feature tags describing the reading a report is generated for.
#[derive(Debug, Clone, Default)]
pub struct FeatureQuery {
    tokens: HashSet<String>,
}

impl FeatureQuery {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tags
            .into_iter()
            .flat_map(|t| explode(t.as_ref()))
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CardScore {
    pub score: f64,
    /// Card tokens that matched the query, in card order
    pub matched: Vec<String>,
}

/// Sum of IDF weights over the card's distinct tag tokens present in the query.
pub fn score_card(store: &RuleCardStore, card: &RuleCard, query: &FeatureQuery) -> CardScore {
    let mut out = CardScore::default();
    for token in card.tokens() {
        if query.contains(&token) {
            out.score += store.token_weight(&token);
            out.matched.push(token);
        }
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCard<'a> {
    pub card: &'a RuleCard,
    pub score: f64,
    pub matched: Vec<String>,
    /// Whether the card was picked for its topic rather than as filler
    pub topic_match: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Selection<'a> {
    pub section: &'static SectionSpec,
    pub cards: Vec<SelectedCard<'a>>,
}

impl Selection<'_> {
    pub fn card_ids(&self) -> Vec<String> {
        self.cards.iter().map(|c| c.card.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn matches_section(card: &RuleCard, section: &SectionSpec) -> bool {
    let topic = card.topic.to_lowercase();
    let tags: Vec<String> = card.tags.iter().map(|t| t.to_lowercase()).collect();
    section
        .topics
        .iter()
        .any(|t| topic.contains(t) || tags.iter().any(|tag| tag.contains(t)))
}

fn by_relevance(a: &SelectedCard<'_>, b: &SelectedCard<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.card.priority.total_cmp(&a.card.priority))
}

/// Greedy top-K pick of rule cards for one report section.
///
/// Cards whose topic or tags contain one of the section's topic words come
/// first, ranked by query score, then priority, then file order. Any room left
/// under the quota goes to other cards that scored, then to the rest in file
/// order.
pub fn select_for_section<'a>(
    store: &'a RuleCardStore,
    section: &'static SectionSpec,
    query: &FeatureQuery,
    max_cards: usize,
) -> Selection<'a> {
    let quota = section.rulecard_quota.min(max_cards);

    let mut on_topic = Vec::new();
    let mut scored_rest = Vec::new();
    let mut unscored_rest = Vec::new();
    for card in store.cards().iter().map(|c| &**c) {
        let CardScore { score, matched } = score_card(store, card, query);
        let topic_match = matches_section(card, section);
        let selected = SelectedCard {
            card,
            score,
            matched,
            topic_match,
        };
        if topic_match {
            on_topic.push(selected);
        } else if score > 0.0 {
            scored_rest.push(selected);
        } else {
            unscored_rest.push(selected);
        }
    }
    on_topic.sort_by(by_relevance);
    scored_rest.sort_by(by_relevance);

    let cards: Vec<SelectedCard<'a>> = on_topic
        .into_iter()
        .chain(scored_rest)
        .chain(unscored_rest)
        .take(quota)
        .collect();

    tracing::debug!(
        section = section.id,
        quota,
        selected = cards.len(),
        on_topic = cards.iter().filter(|c| c.topic_match).count(),
        "selected rule cards"
    );
    Selection { section, cards }
}

/// Run [`select_for_section`] for every report section.
pub fn select_report<'a>(
    store: &'a RuleCardStore,
    query: &FeatureQuery,
    max_cards: usize,
) -> Vec<Selection<'a>> {
    SECTIONS
        .iter()
        .map(|section| select_for_section(store, section, query, max_cards))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::section;
    use std::io::Write;

    fn store(lines: &[&str]) -> (tempfile::NamedTempFile, RuleCardStore) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        let store = RuleCardStore::open(file.path()).unwrap();
        (file, store)
    }

    #[test]
    fn query_explodes_tags() {
        let q = FeatureQuery::new(["현금 흐름", "편제"]);
        assert!(q.contains("현금 흐름"));
        assert!(q.contains("흐름"));
        assert!(q.contains("편재"));
        assert!(!q.contains("편제"));
    }

    #[test]
    fn score_sums_idf_of_matches() {
        let (_f, store) = store(&[
            r#"{"id":"a","topic":"wealth","tags":["현금 흐름","편재"]}"#,
            r#"{"id":"b","topic":"wealth","tags":["현금"]}"#,
        ]);
        let q = FeatureQuery::new(["흐름", "현금"]);
        let s = score_card(&store, &store.cards()[0], &q);
        assert_eq!(s.matched, vec!["현금", "흐름"]);
        let expected = store.token_weight("현금") + store.token_weight("흐름");
        assert!((s.score - expected).abs() < 1e-12);
    }

    #[test]
    fn topic_cards_first_ranked_by_score() {
        let (_f, store) = store(&[
            r#"{"id":"h1","topic":"health","tags":["sleep"],"priority":9}"#,
            r#"{"id":"w1","topic":"wealth","tags":["cash"],"priority":9}"#,
            r#"{"id":"w2","topic":"wealth","tags":["편재"],"priority":1}"#,
            r#"{"id":"x1","topic":"misc","tags":["wealth planning"],"priority":2}"#,
        ]);
        let q = FeatureQuery::new(["편재"]);
        let sel = select_for_section(&store, section("money").unwrap(), &q, 3);
        assert_eq!(sel.card_ids(), vec!["w2", "w1", "x1"]);
        assert!(sel.cards.iter().all(|c| c.topic_match));
    }

    #[test]
    fn topic_word_inside_card_topic_matches() {
        let (_f, store) = store(&[
            r#"{"id":"other","topic":"health","tags":["sleep"]}"#,
            r#"{"id":"wm","topic":"Wealth_Management","tags":["x"]}"#,
        ]);
        let sel = select_for_section(&store, section("money").unwrap(), &FeatureQuery::default(), 10);
        assert_eq!(sel.card_ids(), vec!["wm", "other"]);
        assert!(sel.cards[0].topic_match);
        assert!(!sel.cards[1].topic_match);
    }

    #[test]
    fn fills_quota_with_scored_then_file_order() {
        let (_f, store) = store(&[
            r#"{"id":"h1","topic":"health","tags":["sleep"]}"#,
            r#"{"id":"h2","topic":"health","tags":["cash"]}"#,
            r#"{"id":"w1","topic":"wealth","tags":["stocks"]}"#,
        ]);
        let q = FeatureQuery::new(["cash"]);
        let sel = select_for_section(&store, section("money").unwrap(), &q, 10);
        assert_eq!(sel.card_ids(), vec!["w1", "h2", "h1"]);
        assert!(!sel.cards[1].topic_match);
    }

    #[test]
    fn quota_caps_selection_without_duplicates() {
        let lines: Vec<String> = (0..20)
            .map(|i| format!(r#"{{"id":"c{}","topic":"wealth","tags":["t{}"]}}"#, i, i))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (_f, store) = store(&refs);
        let sel = select_for_section(&store, section("money").unwrap(), &FeatureQuery::default(), 5);
        assert_eq!(sel.cards.len(), 5);
        let ids: HashSet<String> = sel.card_ids().into_iter().collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn empty_store_selects_nothing() {
        let store = RuleCardStore::default();
        let all = select_report(&store, &FeatureQuery::new(["cash"]), 60);
        assert_eq!(all.len(), SECTIONS.len());
        assert!(all.iter().all(Selection::is_empty));
    }
}
