use crate::cli::Cli;
use crate::commands::{create_engine, load_settings, spinner, Result};
use crate::output::{format_output, OutputData};
use cotiza_core::error::QuoteError;
use cotiza_core::plans::parse_provider_csv;
use cotiza_core::{PlanLimitsSource, SearchRequest, StaticPlans};

pub async fn run(
    cli: &Cli,
    query: &str,
    sources: Option<&str>,
    limit: Option<usize>,
    max_results: Option<usize>,
    plan: Option<&str>,
) -> Result<()> {
    if query.trim().is_empty() {
        return Err(QuoteError::EmptyQuery.into());
    }

    let settings = load_settings(cli)?;
    let engine = create_engine(&settings)?;
    let limits = plan.map(|name| StaticPlans::from_settings(&settings).get_limits(Some(name)));

    let request = SearchRequest {
        query: query.to_string(),
        providers: sources.and_then(parse_provider_csv),
        limit_per_provider: limit,
        max_results,
    };

    let progress = spinner(format!("Searching stores for '{}'...", query.trim()));
    let result = engine.handle(&request, limits.as_ref()).await;
    progress.finish_and_clear();

    format_output(&OutputData::Aggregated(result?), &cli.output)
}
