use crate::cli::OutputFormat;
use crate::commands::Result;
use cotiza_core::{AggregatedResult, OrderQuote, ProviderInfo};
use serde::Serialize;
use serde_json::Value;

mod pretty;
use pretty::{print_aggregated, print_order, print_providers};

/// What a command produced. JSON and YAML carry the inner value unchanged,
/// so `--output json` prints the library wire shapes.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutputData {
    ProviderList(Vec<ProviderInfo>),
    Aggregated(AggregatedResult),
    Order(OrderQuote),
    ConfigInfo(Value),
}

pub fn format_output(data: &OutputData, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(data)?);
        }
        OutputFormat::Text => {
            format_text_output(data)?;
        }
        OutputFormat::Pretty => {
            format_pretty_output(data)?;
        }
    }
    Ok(())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn format_text_output(data: &OutputData) -> Result<()> {
    match data {
        OutputData::ProviderList(providers) => {
            for p in providers {
                println!("{}\t{}\t{}", p.id, p.available, p.description);
            }
        }
        OutputData::Aggregated(result) => {
            println!("{}\t{}", result.status, result.query);
            for hit in &result.hits {
                println!(
                    "{}\t{}\t{:.2}\t{}\t{}",
                    hit.provider,
                    opt(hit.price),
                    hit.rank_relevance(),
                    hit.title,
                    hit.url
                );
            }
            for failure in &result.providers_failed {
                println!("failed\t{}\t{}", failure.provider(), failure.error());
            }
        }
        OutputData::Order(order) => {
            for line in &order.items {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    line.quote.status,
                    line.item.effective_quantity(),
                    opt(line.quote.unit_price),
                    opt(line.quote.line_total),
                    line.item.detail.as_deref().unwrap_or("")
                );
            }
            let resume = &order.resume;
            println!(
                "subtotal\t{}\t{}\tpriced {}/{}",
                resume.subtotal, resume.currency, resume.items_priced, resume.items_total
            );
        }
        OutputData::ConfigInfo(config) => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

fn format_pretty_output(data: &OutputData) -> Result<()> {
    match data {
        OutputData::ProviderList(providers) => print_providers(providers),
        OutputData::Aggregated(result) => print_aggregated(result),
        OutputData::Order(order) => print_order(order),
        OutputData::ConfigInfo(config) => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Truncate to `max_width` characters, marking the cut with "...".
pub fn truncate_text(text: &str, max_width: usize) -> String {
    if text.chars().count() <= max_width {
        text.to_string()
    } else if max_width > 3 {
        let kept: String = text.chars().take(max_width - 3).collect();
        format!("{}...", kept)
    } else {
        text.chars().take(max_width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_characters() {
        assert_eq!(truncate_text("Lápiz", 10), "Lápiz");
        assert_eq!(truncate_text("Témpera sólida", 8), "Témpe...");
        assert_eq!(truncate_text("abcdef", 2), "ab");
    }

    #[test]
    fn json_output_is_the_bare_result() {
        let data = OutputData::Aggregated(AggregatedResult::empty("goma"));
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["query"], "goma");
        assert_eq!(value["status"], "no_results");
        assert!(value.get("type").is_none());
    }
}
