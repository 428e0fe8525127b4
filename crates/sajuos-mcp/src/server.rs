use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Deserialize;

use sajuos_core::{guidelines::GUIDELINES, Settings, SharedStore};
use sajuos_report::{ReportRequest, LlmGenerator};

use crate::tools;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetCardRequest {
    /// Rule card id, e.g. "w-001"
    id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetTopicCardsRequest {
    /// Topic name as listed by list_topics, e.g. "wealth"
    topic: String,
    /// Maximum number of cards to return (highest priority first). Default: all.
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct TokenWeightsRequest {
    /// Tag tokens to look up. Each is canonicalized first; unknown tokens weigh 0.
    tokens: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SelectCardsRequest {
    /// Section id ("exec", "money", "business", "team", "health", "calendar", "sprint"). Omit to select for every section.
    section: Option<String>,
    /// Feature tags describing the chart; matched against rule-card tags with IDF weighting
    #[serde(default)]
    feature_tags: Vec<String>,
    /// Per-section card cap. Default: the configured sectionMaxRulecards.
    max_cards: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateSectionRequest {
    /// Section id to generate
    section: String,
    /// Chart, question and feature tags for the reading
    request: ReportRequest,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateReportRequest {
    /// Chart, question and feature tags for the reading
    request: ReportRequest,
}

// --- Server ---

#[derive(Clone)]
pub struct SajuosServer {
    store: Arc<SharedStore>,
    settings: Arc<Settings>,
    tool_router: ToolRouter<Self>,
}

fn text_result(result: Result<String, String>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
        Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
    }
}

#[tool_router]
impl SajuosServer {
    pub fn new(store: Arc<SharedStore>, settings: Settings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            tool_router: Self::tool_router(),
        }
    }

    fn generator(&self) -> Result<LlmGenerator, String> {
        if !sajuos_core::ai_configured(&self.settings) {
            return Err(
                "AI provider is not configured. Set provider, model and apiKey in ~/.sajuos/settings.json."
                    .to_string(),
            );
        }
        LlmGenerator::new((*self.settings).clone()).map_err(|e| e.to_string())
    }

    #[tool(description = "List rule-card topics with card counts")]
    fn list_topics(&self) -> Result<CallToolResult, McpError> {
        text_result(Ok(tools::list_topics(&self.store.snapshot())))
    }

    #[tool(description = "Get the full JSON of one rule card by id")]
    fn get_card(
        &self,
        Parameters(req): Parameters<GetCardRequest>,
    ) -> Result<CallToolResult, McpError> {
        text_result(tools::get_card(&self.store.snapshot(), &req.id))
    }

    #[tool(
        description = "Get the cards of one topic, highest priority first. Each line: `priority [id] topic | tags - summary`."
    )]
    fn get_topic_cards(
        &self,
        Parameters(req): Parameters<GetTopicCardsRequest>,
    ) -> Result<CallToolResult, McpError> {
        text_result(tools::get_topic_cards(&self.store.snapshot(), &req.topic, req.limit))
    }

    #[tool(
        description = "Look up IDF weights of tag tokens. Rare tokens weigh more than common ones; tokens not in the knowledge base weigh 0."
    )]
    fn get_token_weights(
        &self,
        Parameters(req): Parameters<TokenWeightsRequest>,
    ) -> Result<CallToolResult, McpError> {
        text_result(Ok(tools::get_token_weights(&self.store.snapshot(), &req.tokens)))
    }

    #[tool(description = "List report sections with their titles, rule-card quotas and topics")]
    fn list_sections(&self) -> Result<CallToolResult, McpError> {
        text_result(Ok(tools::list_sections()))
    }

    #[tool(
        description = "Select rule cards for one report section (or all sections) given feature tags. Returns the ranked cards with scores and the compressed prompt context."
    )]
    fn select_cards(
        &self,
        Parameters(req): Parameters<SelectCardsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let max_cards = req
            .max_cards
            .unwrap_or(self.settings.report.section_max_rulecards);
        text_result(tools::select_cards(
            &self.store.snapshot(),
            req.section.as_deref(),
            &req.feature_tags,
            max_cards,
        ))
    }

    #[tool(description = "Get the writing rules every report section follows")]
    fn get_guidelines(&self) -> Result<CallToolResult, McpError> {
        text_result(Ok(GUIDELINES.to_string()))
    }

    #[tool(
        description = "Re-read the rule-card JSONL file and publish the new index. On failure the previous cards stay in use."
    )]
    fn reload_rulecards(&self) -> Result<CallToolResult, McpError> {
        text_result(
            self.store
                .reload()
                .map(|store| format!("Reloaded {} rule cards", store.len()))
                .map_err(|e| format!("Reload failed, keeping previous cards: {}", e)),
        )
    }

    #[tool(
        description = "Generate one premium report section with the configured LLM. Returns the section JSON; on model failure a short or template section is returned with confidence LOW."
    )]
    async fn generate_section(
        &self,
        Parameters(req): Parameters<GenerateSectionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let generator = match self.generator() {
            Ok(g) => g,
            Err(e) => return text_result(Err(e)),
        };
        let store = self.store.snapshot();
        let result = sajuos_report::generate_single_section(
            &generator,
            &self.settings.report,
            &store,
            &req.request,
            &req.section,
        )
        .await;
        text_result(
            result
                .map_err(|e| e.to_string())
                .and_then(|section| serde_json::to_string_pretty(&section).map_err(|e| e.to_string())),
        )
    }

    #[tool(
        description = "Generate the full premium report (all sections) with the configured LLM. Slow: one model call per section."
    )]
    async fn generate_report(
        &self,
        Parameters(req): Parameters<GenerateReportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let generator = match self.generator() {
            Ok(g) => g,
            Err(e) => return text_result(Err(e)),
        };
        let store = self.store.snapshot();
        let report =
            sajuos_report::build_report(&generator, &self.settings.report, &store, &req.request)
                .await;
        text_result(serde_json::to_string_pretty(&report).map_err(|e| e.to_string()))
    }
}

const INSTRUCTIONS: &str = r#"SajuOS rule-card server. The knowledge base is a set of rule cards (topic, tags, priority, mechanism/action text) used as evidence for premium saju business reports.

## Workflow
1. `list_topics` and `list_sections` to see what the knowledge base covers.
2. `select_cards` with the chart's feature tags to get ranked evidence per section, including a compressed context block ready for a prompt.
3. `generate_section` or `generate_report` to have the configured LLM write sections from that evidence.
4. `reload_rulecards` after the JSONL export changes."#;

#[tool_handler]
impl ServerHandler for SajuosServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!("{}\n\n## Writing rules\n{}", INSTRUCTIONS, GUIDELINES);
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
