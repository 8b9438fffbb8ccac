use crate::cli::{Cli, OutputFormat};
use crate::commands::{create_engine, load_settings, Result};
use crate::output::{format_output, OutputData};
use owo_colors::OwoColorize;

pub async fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let engine = create_engine(&settings)?;
    let providers = engine.registry().list_providers();

    if providers.is_empty() {
        println!("{}", "No stores enabled".yellow());
        return Ok(());
    }

    if cli.output == OutputFormat::Pretty {
        println!("{}", "Store Catalogue".bold().cyan());
        println!();
    }
    format_output(&OutputData::ProviderList(providers), &cli.output)?;

    if cli.output == OutputFormat::Pretty {
        println!();
        println!(
            "{} {}",
            "Default stores:".dimmed(),
            settings.engine.default_providers.join(", ")
        );
        println!(
            "{} Use {} to pick stores for a search",
            "Tip:".green().bold(),
            "cotiza search \"<item>\" -s id1,id2".cyan()
        );
    }
    Ok(())
}
