use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deepbrief_core::{AppConfig, ResearchOptions};
use deepbrief_engine::build_engine;

/// Thin runner: one research run for the topic given on the command line.
/// Endpoints and API keys come from the environment (see AppConfig).
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("deepbrief_engine=info".parse()?),
        )
        .init();

    let topic = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if topic.is_empty() {
        anyhow::bail!("usage: deepbrief <research topic>");
    }

    info!("deepbrief starting...");

    let config = AppConfig::from_env()?;
    let options = ResearchOptions::default();

    let engine = build_engine(&config, options)?;
    let report = engine.run(&topic).await?;

    println!("{}", report.summary);
    info!(
        sources = report.sources.len(),
        loops = report.loops_completed,
        insufficient = report.insufficient_sources,
        "Run complete"
    );
    Ok(())
}
