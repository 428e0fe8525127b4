pub mod card;
pub mod context;
pub mod error;
pub mod guidelines;
pub mod sections;
pub mod select;
pub mod store;

pub use card::{canonicalize, explode, normalize_priority, RuleCard};
pub use error::{Error, Result};
pub use sections::{section, SectionSpec, SECTIONS};
pub use select::{score_card, select_for_section, select_report, FeatureQuery, Selection};
pub use store::{RuleCardStore, SharedStore};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Env var that overrides the rule-card file location.
pub const RULECARDS_PATH_ENV: &str = "SAJUOS_RULECARDS_PATH";
pub const DEFAULT_RULECARDS_PATH: &str = "data/sajuos_master_db.jsonl";

// --- Storage ---

/// Resolve the per-user config directory (~/.sajuos/).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sajuos")
}

// --- Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportSettings {
    /// Section requests allowed in flight at once
    pub max_concurrency: usize,
    pub section_max_rulecards: usize,
    pub section_max_output_tokens: u32,
    pub temperature: f32,
    /// Retry a failed section with the short prompt before using the template
    pub enable_fallback: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            section_max_rulecards: 60,
            section_max_output_tokens: 4000,
            temperature: 0.3,
            enable_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rulecards_path: Option<String>,
    #[serde(default)]
    pub report: ReportSettings,
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Read ~/.sajuos/settings.json. A missing or unreadable file yields defaults.
pub fn read_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    match fs::read_to_string(&path)
        .map_err(Error::from)
        .and_then(|s| serde_json::from_str(&s).map_err(Error::from))
    {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

pub fn write_settings(settings: &Settings) -> Result<()> {
    fs::create_dir_all(config_dir())?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(settings_path(), json)?;
    Ok(())
}

pub fn ai_configured(settings: &Settings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

/// Rule-card file location: env override, then settings, then the default.
pub fn rulecards_path(settings: &Settings) -> PathBuf {
    resolve_rulecards_path(std::env::var(RULECARDS_PATH_ENV).ok(), settings)
}

fn resolve_rulecards_path(env_value: Option<String>, settings: &Settings) -> PathBuf {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| settings.rulecards_path.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RULECARDS_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults_fill_missing_fields() {
        let s: Settings = serde_json::from_str(r#"{"provider":"openai","model":"gpt-4o"}"#).unwrap();
        assert_eq!(s.report, ReportSettings::default());
        assert!(s.rulecards_path.is_none());
        assert!(!ai_configured(&s));
    }

    #[test]
    fn partial_report_settings() {
        let s: Settings =
            serde_json::from_str(r#"{"report":{"maxConcurrency":7}}"#).unwrap();
        assert_eq!(s.report.max_concurrency, 7);
        assert_eq!(s.report.section_max_rulecards, 60);
    }

    #[test]
    fn ollama_needs_no_key() {
        let s = Settings {
            provider: "ollama".into(),
            model: "llama3".into(),
            ..Default::default()
        };
        assert!(ai_configured(&s));
    }

    #[test]
    fn rulecards_path_precedence() {
        let mut s = Settings::default();
        assert_eq!(resolve_rulecards_path(None, &s), PathBuf::from(DEFAULT_RULECARDS_PATH));

        s.rulecards_path = Some("/srv/cards.jsonl".into());
        assert_eq!(resolve_rulecards_path(None, &s), PathBuf::from("/srv/cards.jsonl"));
        assert_eq!(
            resolve_rulecards_path(Some(" ".into()), &s),
            PathBuf::from("/srv/cards.jsonl")
        );
        assert_eq!(
            resolve_rulecards_path(Some("/env/cards.jsonl".into()), &s),
            PathBuf::from("/env/cards.jsonl")
        );
    }
}
