use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cotiza")]
#[command(about = "Cotiza - compare school and office supply prices across Chilean stores")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  cotiza providers                          List the store catalogue
  cotiza search \"carpeta azul\"              Search the default stores
  cotiza search \"tempera 12\" -s jamila,dimeiggs
  cotiza quote lista.yaml                   Quote every item of a supply list

\x1b[1;36mConfiguration:\x1b[0m
  cotiza config path                        Where the config file lives
  cotiza config init                        Write a config file with the defaults
  RUST_LOG=cotiza_core=debug cotiza ...     Trace store requests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Config file (defaults to <config dir>/cotiza/config.toml)
    #[arg(long, global = true, env = "COTIZA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered stores
    #[command(alias = "ls")]
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  cotiza providers                 Table of stores
  cotiza providers --output json   Machine-readable catalogue")]
    Providers,

    /// Search several stores for one product and rank the offers
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  cotiza search \"cuaderno college 100 hojas\"
  cotiza search \"lapiz grafito\" -s dimeiggs,jamila --limit 3
  cotiza search \"goma\" --plan demo --output json")]
    Search {
        /// Product description
        query: String,
        /// Comma-separated store ids (defaults from config or plan)
        #[arg(short = 's', long = "sources")]
        sources: Option<String>,
        /// Maximum hits per store
        #[arg(short, long)]
        limit: Option<usize>,
        /// Maximum hits overall
        #[arg(long)]
        max_results: Option<usize>,
        /// Plan whose store cap applies (demo, free, basic, pro or a configured one)
        #[arg(long)]
        plan: Option<String>,
    },

    /// Quote every line item of a JSON or YAML list
    #[command(after_help = "\x1b[1;33mItem file:\x1b[0m
  - detalle: Cuaderno college 100 hojas
    cantidad: 3
  - detalle: Lectura complementaria - Papelucho   (skipped)

\x1b[1;33mExamples:\x1b[0m
  cotiza quote lista.yaml
  cotiza quote lista.json -s dimeiggs,libreria_nacional --plan basic")]
    Quote {
        /// Path to the item list
        file: PathBuf,
        /// Comma-separated store ids (defaults from config or plan)
        #[arg(short = 's', long = "sources")]
        sources: Option<String>,
        /// Plan whose item and store caps apply (anonymous demo when absent)
        #[arg(long)]
        plan: Option<String>,
    },

    /// Inspect or write the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Show the effective settings
    Show,
    /// Print the config file path
    Path,
    /// Write the effective settings to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Colored tables
    Pretty,
    /// JSON (wire shape)
    Json,
    /// YAML
    Yaml,
    /// Plain tab-separated text
    Text,
}
