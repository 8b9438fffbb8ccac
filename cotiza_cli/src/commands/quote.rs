use crate::cli::Cli;
use crate::commands::{create_engine, load_settings, spinner, Result};
use crate::output::{format_output, OutputData};
use cotiza_core::plans::parse_provider_csv;
use cotiza_core::{LineItem, QuotingPipeline, StaticPlans};
use std::path::Path;
use std::sync::Arc;

pub async fn run(cli: &Cli, file: &Path, sources: Option<&str>, plan: Option<&str>) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let items = LineItem::parse_list(&content)?;
    tracing::debug!(target: "cotiza_cli", file = %file.display(), items = items.len(), "items loaded");

    let settings = load_settings(cli)?;
    let engine = create_engine(&settings)?;
    let pipeline = QuotingPipeline::new(
        engine,
        settings.quoting.clone(),
        Arc::new(StaticPlans::from_settings(&settings)),
    );
    let providers = sources.and_then(parse_provider_csv);

    let progress = spinner(format!("Quoting {} items...", items.len()));
    let order = pipeline
        .quote_order(items, providers.as_deref(), plan)
        .await;
    progress.finish_and_clear();

    format_output(&OutputData::Order(order), &cli.output)
}
