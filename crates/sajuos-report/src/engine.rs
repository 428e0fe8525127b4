use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use sajuos_core::Settings;

use crate::ReportError;

/// Text generation seam between report assembly and the model provider.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        user_msg: &str,
        max_tokens: u32,
    ) -> Result<String, ReportError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, ReportError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(ReportError::UnknownProvider(other.to_string())),
    }
}

/// [`Generator`] backed by the `llm` crate, configured from user settings.
#[derive(Debug, Clone)]
pub struct LlmGenerator {
    settings: Settings,
}

impl LlmGenerator {
    pub fn new(settings: Settings) -> Result<Self, ReportError> {
        map_backend(&settings.provider)?;
        Ok(Self { settings })
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(
        &self,
        system: &str,
        user_msg: &str,
        max_tokens: u32,
    ) -> Result<String, ReportError> {
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(system)
            .max_tokens(max_tokens)
            .temperature(self.settings.report.temperature);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| ReportError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(user_msg).build()];

        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| ReportError::Chat(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ReportError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_provider() {
        let settings = Settings {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        assert!(matches!(
            LlmGenerator::new(settings),
            Err(ReportError::UnknownProvider(p)) if p == "carrier-pigeon"
        ));
    }

    #[test]
    fn accepts_known_provider() {
        let settings = Settings {
            provider: "ollama".into(),
            model: "llama3".into(),
            ..Default::default()
        };
        assert!(LlmGenerator::new(settings).is_ok());
    }
}
