use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of domain knowledge from the rule-card export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct RuleCard {
    pub id: String,
    /// Coarse category, e.g. "wealth" or "health"
    pub topic: String,
    /// Canonicalized tags, in source order
    pub tags: Vec<String>,
    /// Importance on a 0-10 scale
    #[serde(default)]
    pub priority: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cautions: Option<Vec<String>>,
}

impl RuleCard {
    /// Build a card from one parsed JSONL record.
    ///
    /// Returns `None` unless the record is an object with a non-empty `id`,
    /// `topic` and `tags` array. Every tag entry is kept after
    /// canonicalization, even one that ends up empty; non-string entries are
    /// rendered as their JSON text first. Optional fields of the wrong type
    /// are treated as absent.
    pub fn from_record(record: &Value) -> Option<RuleCard> {
        let obj = record.as_object()?;
        let id = non_empty_str(obj, "id")?;
        let topic = non_empty_str(obj, "topic")?;

        let raw_tags = obj.get("tags")?.as_array()?;
        if raw_tags.is_empty() {
            return None;
        }
        let tags: Vec<String> = raw_tags
            .iter()
            .map(|tag| match tag {
                Value::String(s) => canonicalize(s),
                other => canonicalize(&other.to_string()),
            })
            .collect();

        Some(RuleCard {
            id: id.to_string(),
            topic: topic.to_string(),
            tags,
            priority: normalize_priority(obj.get("priority")),
            trigger: opt_str(obj, "trigger"),
            mechanism: opt_str(obj, "mechanism"),
            interpretation: opt_str(obj, "interpretation"),
            action: opt_str(obj, "action"),
            cautions: obj.get("cautions").and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            }),
        })
    }

    /// Distinct tokens across all of this card's tags, first-seen order.
    pub fn tokens(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for tag in &self.tags {
            for token in explode(tag) {
                if !out.contains(&token) {
                    out.push(token);
                }
            }
        }
        out
    }
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn opt_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

// --- Tags ---

/// Known spelling variants in the export, mapped to their standard form.
const TAG_SYNONYMS: &[(&str, &str)] = &[
    ("정제", "정재"),
    ("편제", "편재"),
    ("겁제", "겁재"),
    ("식신생제", "식신생재"),
    ("상관생제", "상관생재"),
    ("식상생제", "식상생재"),
    ("간목", "인목"),
    ("신지금", "신금"),
];

/// Collapse whitespace runs, trim, and map known variants to their canonical spelling.
pub fn canonicalize(tag: &str) -> String {
    let collapsed = tag.split_whitespace().collect::<Vec<_>>().join(" ");
    TAG_SYNONYMS
        .iter()
        .find(|(variant, _)| *variant == collapsed)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(collapsed)
}

/// Split a tag into index tokens: the whole canonical tag, then every
/// space-separated part of at least two characters. Duplicates keep their
/// first position.
///
/// `"현금 흐름"` yields `["현금 흐름", "현금", "흐름"]`, so a single-word
/// feature tag still matches a multi-word card tag.
pub fn explode(tag: &str) -> Vec<String> {
    let whole = canonicalize(tag);
    let parts: Vec<String> = whole
        .split(' ')
        .filter(|p| p.chars().count() >= 2)
        .map(canonicalize)
        .collect();

    let mut out: Vec<String> = Vec::with_capacity(parts.len() + 1);
    for token in std::iter::once(whole).chain(parts) {
        if !token.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

// --- Priority ---

/// Coerce a raw `priority` value onto the 0-10 scale.
///
/// The export mixes 0-10 and 0-100 conventions: values above 10 are divided
/// by 10 and capped at 10. Negative values clamp to 0. Anything unparseable
/// counts as 0.
pub fn normalize_priority(raw: Option<&Value>) -> f64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    // NaN and -inf count as 0; +inf takes the >10 branch and caps at 10.
    match parsed {
        Some(v) if !v.is_nan() => {
            if v <= 10.0 {
                v.max(0.0)
            } else {
                (v / 10.0).min(10.0)
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalize_collapses_whitespace() {
        assert_eq!(canonicalize("  현금   흐름  "), "현금 흐름");
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("   "), "");
    }

    #[test]
    fn canonicalize_maps_synonyms() {
        assert_eq!(canonicalize("정제"), "정재");
        assert_eq!(canonicalize(" 신지금 "), "신금");
        assert_eq!(canonicalize("정재"), "정재");
    }

    #[test]
    fn explode_multi_word_tag() {
        assert_eq!(explode("현금 흐름"), vec!["현금 흐름", "현금", "흐름"]);
    }

    #[test]
    fn explode_single_token() {
        assert_eq!(explode("편제"), vec!["편재"]);
        assert_eq!(explode("wealth"), vec!["wealth"]);
    }

    #[test]
    fn explode_drops_short_parts_and_duplicates() {
        assert_eq!(explode("a b"), vec!["a b"]);
        assert_eq!(explode("cash a cash"), vec!["cash a cash", "cash"]);
        assert!(explode("  ").is_empty());
    }

    #[test]
    fn explode_canonicalizes_parts() {
        assert_eq!(explode("정제 흐름"), vec!["정제 흐름", "정재", "흐름"]);
    }

    #[test]
    fn priority_scales() {
        assert_eq!(normalize_priority(Some(&json!(5))), 5.0);
        assert_eq!(normalize_priority(Some(&json!("7.5"))), 7.5);
        assert_eq!(normalize_priority(Some(&json!(85))), 8.5);
        assert_eq!(normalize_priority(Some(&json!(1000))), 10.0);
        assert_eq!(normalize_priority(Some(&json!(10))), 10.0);
    }

    #[test]
    fn priority_malformed_is_zero() {
        assert_eq!(normalize_priority(Some(&json!("not-a-number"))), 0.0);
        assert_eq!(normalize_priority(Some(&Value::Null)), 0.0);
        assert_eq!(normalize_priority(None), 0.0);
        assert_eq!(normalize_priority(Some(&json!([1]))), 0.0);
        assert_eq!(normalize_priority(Some(&json!("NaN"))), 0.0);
        assert_eq!(normalize_priority(Some(&json!("-inf"))), 0.0);
    }

    #[test]
    fn priority_infinity_caps_and_negative_clamps() {
        assert_eq!(normalize_priority(Some(&json!("inf"))), 10.0);
        assert_eq!(normalize_priority(Some(&json!(-3))), 0.0);
        assert_eq!(normalize_priority(Some(&json!("-0.5"))), 0.0);
    }

    #[test]
    fn record_requires_id_topic_tags() {
        assert!(RuleCard::from_record(&json!({"topic": "wealth", "tags": ["a"]})).is_none());
        assert!(RuleCard::from_record(&json!({"id": "", "topic": "wealth", "tags": ["a"]})).is_none());
        assert!(RuleCard::from_record(&json!({"id": "c1", "topic": "wealth", "tags": []})).is_none());
        assert!(RuleCard::from_record(&json!({"id": "c1", "topic": "wealth"})).is_none());
        assert!(RuleCard::from_record(&json!(["c1"])).is_none());
    }

    #[test]
    fn blank_and_non_string_tags_are_kept() {
        let card = RuleCard::from_record(&json!({"id": "b", "topic": "wealth", "tags": ["   "]}))
            .unwrap();
        assert_eq!(card.tags, vec![""]);
        assert!(card.tokens().is_empty());

        let card = RuleCard::from_record(&json!({"id": "c", "topic": "wealth", "tags": [7, "편제"]}))
            .unwrap();
        assert_eq!(card.tags, vec!["7", "편재"]);
    }

    #[test]
    fn record_builds_card() {
        let card = RuleCard::from_record(&json!({
            "id": "c1",
            "topic": "wealth",
            "tags": ["  정제 ", "현금 흐름"],
            "priority": "85",
            "mechanism": "Cash moves.",
            "cautions": ["slow down"],
            "action": 3
        }))
        .unwrap();
        assert_eq!(card.tags, vec!["정재", "현금 흐름"]);
        assert_eq!(card.priority, 8.5);
        assert_eq!(card.mechanism.as_deref(), Some("Cash moves."));
        assert_eq!(card.cautions, Some(vec!["slow down".to_string()]));
        assert_eq!(card.action, None);
        assert_eq!(card.trigger, None);
        assert_eq!(card.tokens(), vec!["정재", "현금 흐름", "현금", "흐름"]);
    }
}
