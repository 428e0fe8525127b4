use crate::card::RuleCard;
use crate::select::Selection;

const SUMMARY_MAX_CHARS: usize = 100;
const CONTEXT_MAX_TAGS: usize = 3;

/// First sentence of the card's mechanism, action or interpretation,
/// whichever is present first, cut to 100 characters.
pub fn summarize(card: &RuleCard) -> String {
    let text = [&card.mechanism, &card.action, &card.interpretation]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty());
    let Some(text) = text else {
        return String::new();
    };

    let sentence = text.split('.').next().unwrap_or("").trim();
    if sentence.chars().count() > SUMMARY_MAX_CHARS {
        let cut: String = sentence.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        sentence.to_string()
    }
}

/// One compact line per card, for the section prompt.
pub fn card_line(card: &RuleCard) -> String {
    let tags: Vec<&str> = card
        .tags
        .iter()
        .take(CONTEXT_MAX_TAGS)
        .map(String::as_str)
        .collect();
    let mut line = format!("[{}] {} | {}", card.id, card.topic, tags.join(", "));
    let summary = summarize(card);
    if !summary.is_empty() {
        line.push_str(" - ");
        line.push_str(&summary);
    }
    line
}

/// Render a section's selected cards as prompt context.
pub fn section_context(selection: &Selection<'_>) -> String {
    if selection.is_empty() {
        return "No rule cards available".to_string();
    }
    selection
        .cards
        .iter()
        .map(|c| card_line(c.card))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> RuleCard {
        RuleCard {
            id: "c1".into(),
            topic: "wealth".into(),
            tags: vec!["편재".into(), "현금 흐름".into(), "투자".into(), "extra".into()],
            priority: 5.0,
            trigger: None,
            mechanism: None,
            interpretation: Some("Late money. Ignore this.".into()),
            action: Some("   ".into()),
            cautions: None,
        }
    }

    #[test]
    fn summary_skips_blank_fields() {
        assert_eq!(summarize(&card()), "Late money");
    }

    #[test]
    fn summary_truncates() {
        let mut c = card();
        c.mechanism = Some("가".repeat(150));
        let s = summarize(&c);
        assert_eq!(s.chars().count(), 100);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn line_keeps_three_tags() {
        assert_eq!(
            card_line(&card()),
            "[c1] wealth | 편재, 현금 흐름, 투자 - Late money"
        );
    }

    #[test]
    fn empty_selection_context() {
        let sel = Selection {
            section: &crate::sections::SECTIONS[0],
            cards: vec![],
        };
        assert_eq!(section_context(&sel), "No rule cards available");
    }
}
