use crate::cli::{Cli, ConfigAction, OutputFormat};
use crate::commands::{load_settings, CommandError, Result};
use crate::output::{format_output, OutputData};
use cotiza_core::config::Settings;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(cli: &Cli, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => {
            println!("{}", config_path(cli).display());
            Ok(())
        }
        ConfigAction::Init { force } => init_config(cli, force),
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Settings::default_path)
}

fn show_config(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let path = config_path(cli);

    if cli.output != OutputFormat::Pretty {
        return format_output(
            &OutputData::ConfigInfo(serde_json::to_value(&settings)?),
            &cli.output,
        );
    }

    println!();
    println!("{}", "Effective Settings".bold().cyan());
    println!("{}", "==================".cyan());
    println!();
    if path.exists() {
        println!("Config file: {}", path.display().dimmed());
    } else {
        println!(
            "Config file: {} {}",
            path.display().dimmed(),
            "(not found, using defaults)".yellow()
        );
    }
    println!();
    println!("{}", settings.to_toml()?);

    let plans = settings.plan_names();
    println!("{} {}", "Plans:".bold(), plans.join(", "));
    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = config_path(cli);
    if path.exists() && !force {
        return Err(CommandError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    let settings = load_settings(cli)?;
    settings.save(&path)?;
    println!("{} {}", "Wrote".green().bold(), path.display());
    Ok(())
}
