pub mod engine;
mod parse;
mod prompt;

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::Semaphore;

use sajuos_core::context::section_context;
use sajuos_core::{
    select_for_section, select_report, FeatureQuery, ReportSettings, RuleCardStore, SectionSpec,
    Selection,
};

pub use engine::{Generator, LlmGenerator};
pub use parse::parse_llm_output;

/// Card ids carried over to the short-mode retry.
const SHORT_MODE_MAX_CARDS: usize = 20;
const SHORT_MODE_MAX_TOKENS: u32 = 1500;

const DISCLAIMER: &str = "This report offers insight grounded in Eastern philosophy and does not \
replace professional medical, legal or investment advice.";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("build LLM: {0}")]
    Build(String),
    #[error("chat: {0}")]
    Chat(String),
    #[error("LLM returned no text")]
    EmptyResponse,
    #[error("LLM output is not a JSON object")]
    UnparseableJson,
    #[error("unknown section: {0}")]
    UnknownSection(String),
}

// --- Request ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Pillars {
    /// Year pillar ganji, e.g. "병오"
    pub year: String,
    pub month: String,
    pub day: String,
    /// Hour pillar, when the birth time is known
    #[serde(default)]
    pub hour: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub target_year: i32,
    #[serde(default)]
    pub question: String,
    /// Client name, addressed in the section prompts
    #[serde(default)]
    pub name: Option<String>,
    pub pillars: Pillars,
    #[serde(default)]
    pub day_master: Option<String>,
    /// Feature tags derived from the chart; matched against rule-card tags
    #[serde(default)]
    pub feature_tags: Vec<String>,
}

impl ReportRequest {
    pub fn query(&self) -> FeatureQuery {
        FeatureQuery::new(&self.feature_tags)
    }
}

// --- Output ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn from_content(content: &Map<String, Value>) -> Self {
        match content.get("confidence").and_then(Value::as_str) {
            Some("HIGH") => Confidence::High,
            Some("LOW") => Confidence::Low,
            _ => Confidence::Medium,
        }
    }

    fn score(self) -> f64 {
        match self {
            Confidence::High => 3.0,
            Confidence::Medium => 2.0,
            Confidence::Low => 1.0,
        }
    }

    /// Average of per-section confidences; an empty report counts as MEDIUM.
    pub fn overall<I: IntoIterator<Item = Confidence>>(items: I) -> Confidence {
        let scores: Vec<f64> = items.into_iter().map(Confidence::score).collect();
        if scores.is_empty() {
            return Confidence::Medium;
        }
        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        if avg >= 2.5 {
            Confidence::High
        } else if avg >= 1.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    pub id: String,
    pub title: String,
    pub content: Map<String, Value>,
    pub rule_card_ids: Vec<String>,
    pub confidence: Confidence,
    pub latency_ms: u64,
    /// True when the section came from the short prompt or the template
    pub fallback: bool,
}

impl ReportSection {
    fn markdown(&self) -> Option<&str> {
        self.content
            .get("markdown")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    pub target_year: i32,
    pub section_count: usize,
    pub rule_cards_used_total: usize,
    pub confidence: Confidence,
    pub confidence_by_section: BTreeMap<String, Confidence>,
    pub latency_ms: u64,
    pub latency_by_section: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TocEntry {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub meta: ReportMeta,
    pub toc: Vec<TocEntry>,
    pub sections: Vec<ReportSection>,
    pub merged_markdown: String,
    pub notes: String,
}

// --- Generation ---

/// Template section used when every model call for a section failed.
pub fn fallback_section(section: &SectionSpec, target_year: i32) -> Map<String, Value> {
    let value = json!({
        "title": section.title,
        "markdown": format!(
            "## {}\n\nThe {} analysis could not be generated right now.\n\nPlease try again shortly.",
            section.title, target_year
        ),
        "highlights": ["Temporary service delay"],
        "actionItems": ["Retry in a few minutes"],
        "evidence": { "ruleCardIds": [], "topTags": [] },
        "confidence": "LOW",
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn set_evidence(content: &mut Map<String, Value>, card_ids: &[String]) {
    let evidence = content
        .entry("evidence")
        .or_insert_with(|| json!({}));
    if !evidence.is_object() {
        *evidence = json!({});
    }
    if let Some(obj) = evidence.as_object_mut() {
        obj.insert("ruleCardIds".to_string(), json!(card_ids));
        obj.entry("topTags").or_insert_with(|| json!([]));
    }
}

async fn generate_content(
    generator: &dyn Generator,
    system: &str,
    user_msg: &str,
    max_tokens: u32,
) -> Result<Map<String, Value>, ReportError> {
    let raw = generator.generate(system, user_msg, max_tokens).await?;
    parse_llm_output(&raw).ok_or(ReportError::UnparseableJson)
}

/// Generate one section from an existing card selection.
///
/// Never fails: a failed full request is retried with the short prompt (when
/// enabled), and the template section is used as the last resort.
pub async fn generate_section(
    generator: &dyn Generator,
    settings: &ReportSettings,
    request: &ReportRequest,
    selection: &Selection<'_>,
) -> ReportSection {
    let section = selection.section;
    let start = Instant::now();
    let card_ids = selection.card_ids();

    let system = prompt::system_prompt(section, request.target_year);
    let user_msg = prompt::user_message(request, &section_context(selection));

    tracing::info!(section = section.id, cards = card_ids.len(), "generating section");

    let (content, rule_card_ids, fallback) = match generate_content(
        generator,
        &system,
        &user_msg,
        settings.section_max_output_tokens,
    )
    .await
    {
        Ok(mut content) => {
            set_evidence(&mut content, &card_ids);
            (content, card_ids, false)
        }
        Err(e) => {
            tracing::warn!(section = section.id, error = %e, "section generation failed");
            let short_ids: Vec<String> =
                card_ids.into_iter().take(SHORT_MODE_MAX_CARDS).collect();
            let mut content = if settings.enable_fallback {
                let short = prompt::short_prompt(section, request.target_year);
                match generate_content(generator, "", &short, SHORT_MODE_MAX_TOKENS).await {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!(section = section.id, error = %e, "short mode failed");
                        fallback_section(section, request.target_year)
                    }
                }
            } else {
                fallback_section(section, request.target_year)
            };
            set_evidence(&mut content, &short_ids);
            content.insert("confidence".to_string(), json!("LOW"));
            (content, short_ids, true)
        }
    };

    let latency_ms = start.elapsed().as_millis() as u64;
    tracing::info!(section = section.id, latency_ms, fallback, "section done");

    ReportSection {
        id: section.id.to_string(),
        title: section.title.to_string(),
        confidence: Confidence::from_content(&content),
        content,
        rule_card_ids,
        latency_ms,
        fallback,
    }
}

/// Select cards for one section id and generate it.
pub async fn generate_single_section(
    generator: &dyn Generator,
    settings: &ReportSettings,
    store: &RuleCardStore,
    request: &ReportRequest,
    section_id: &str,
) -> Result<ReportSection, ReportError> {
    let section = sajuos_core::section(section_id)
        .ok_or_else(|| ReportError::UnknownSection(section_id.to_string()))?;
    let selection =
        select_for_section(store, section, &request.query(), settings.section_max_rulecards);
    Ok(generate_section(generator, settings, request, &selection).await)
}

/// Generate every section, at most `max_concurrency` requests at a time, and
/// assemble the report in section order.
pub async fn build_report(
    generator: &dyn Generator,
    settings: &ReportSettings,
    store: &RuleCardStore,
    request: &ReportRequest,
) -> Report {
    let start = Instant::now();
    let selections = select_report(store, &request.query(), settings.section_max_rulecards);
    let semaphore = Semaphore::new(settings.max_concurrency.max(1));
    let semaphore = &semaphore;

    tracing::info!(
        target_year = request.target_year,
        cards = store.len(),
        concurrency = settings.max_concurrency,
        "building report"
    );

    let sections: Vec<ReportSection> =
        futures::future::join_all(selections.iter().map(|selection| async move {
            let _permit = semaphore.acquire().await.ok();
            generate_section(generator, settings, request, selection).await
        }))
        .await;

    let merged_markdown = sections
        .iter()
        .filter_map(ReportSection::markdown)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let meta = ReportMeta {
        target_year: request.target_year,
        section_count: sections.len(),
        rule_cards_used_total: sections.iter().map(|s| s.rule_card_ids.len()).sum(),
        confidence: Confidence::overall(sections.iter().map(|s| s.confidence)),
        confidence_by_section: sections.iter().map(|s| (s.id.clone(), s.confidence)).collect(),
        latency_ms: start.elapsed().as_millis() as u64,
        latency_by_section: sections.iter().map(|s| (s.id.clone(), s.latency_ms)).collect(),
    };

    tracing::info!(
        sections = meta.section_count,
        cards_used = meta.rule_cards_used_total,
        latency_ms = meta.latency_ms,
        "report done"
    );

    Report {
        meta,
        toc: sections
            .iter()
            .map(|s| TocEntry {
                id: s.id.clone(),
                title: s.title.clone(),
            })
            .collect(),
        sections,
        merged_markdown,
        notes: DISCLAIMER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_confidence() {
        use Confidence::*;
        assert_eq!(Confidence::overall([High, High, Medium]), High);
        assert_eq!(Confidence::overall([High, Low]), Medium);
        assert_eq!(Confidence::overall([Low, Low, Medium]), Low);
        assert_eq!(Confidence::overall([]), Medium);
    }

    #[test]
    fn evidence_replaces_card_ids() {
        let mut content = Map::new();
        content.insert("evidence".into(), json!({"ruleCardIds": ["made-up"], "topTags": ["x"]}));
        set_evidence(&mut content, &["c1".to_string()]);
        assert_eq!(content["evidence"]["ruleCardIds"], json!(["c1"]));
        assert_eq!(content["evidence"]["topTags"], json!(["x"]));

        let mut bad = Map::new();
        bad.insert("evidence".into(), json!("nope"));
        set_evidence(&mut bad, &[]);
        assert_eq!(bad["evidence"]["ruleCardIds"], json!([]));
    }

    #[test]
    fn fallback_section_is_low_confidence() {
        let content = fallback_section(sajuos_core::section("team").unwrap(), 2026);
        assert_eq!(content["title"], "Team & Partner Risk");
        assert_eq!(Confidence::from_content(&content), Confidence::Low);
    }
}
