mod server;
mod tools;

use std::sync::Arc;

use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use sajuos_core::{RuleCardStore, SharedStore};

use crate::server::SajuosServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // Handle `sajuos-mcp init` subcommand
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init_settings();
    }

    let settings = sajuos_core::read_settings();
    let path = sajuos_core::rulecards_path(&settings);
    let store = match RuleCardStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            // Serve anyway so reload_rulecards can pick the file up later.
            tracing::error!(path = %path.display(), error = %e, "failed to load rule cards");
            RuleCardStore::new(&path)
        }
    };
    if !sajuos_core::ai_configured(&settings) {
        tracing::warn!("no AI provider configured; generate_section and generate_report are unavailable");
    }

    let server = SajuosServer::new(Arc::new(SharedStore::new(store)), settings);
    let service = server
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

/// Write a default ~/.sajuos/settings.json unless one already exists.
fn init_settings() -> Result<(), Box<dyn std::error::Error>> {
    let path = sajuos_core::config_dir().join("settings.json");
    if path.exists() {
        eprintln!("Settings already exist at {}", path.display());
        return Ok(());
    }
    sajuos_core::write_settings(&sajuos_core::Settings::default())?;
    eprintln!("Wrote {}", path.display());
    eprintln!("Set provider, model and apiKey there to enable report generation.");
    Ok(())
}
