//! Terminal rendering: bold headers, dimmed metadata, one table per result.

use super::truncate_text;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};
use cotiza_core::{AggregatedResult, AggregationStatus, OrderQuote, ProviderInfo};
use owo_colors::OwoColorize;

const TITLE_WIDTH: usize = 60;

/// `2990` -> `$2.990` (CLP uses `.` as thousands separator).
pub fn format_clp(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("${}", grouped)
}

fn price_cell(price: Option<u64>) -> Cell {
    match price {
        Some(p) => Cell::new(format_clp(p)).set_alignment(CellAlignment::Right),
        None => Cell::new("-").set_alignment(CellAlignment::Right),
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_providers(providers: &[ProviderInfo]) {
    let mut t = table(vec!["Id", "Description", "Base URL", "Available"]);
    for p in providers {
        t.add_row(vec![
            Cell::new(&p.id),
            Cell::new(truncate_text(&p.description, TITLE_WIDTH)),
            Cell::new(&p.base_url),
            Cell::new(if p.available { "yes" } else { "no" }),
        ]);
    }
    println!("{}", t);
}

fn status_label(status: AggregationStatus) -> String {
    match status {
        AggregationStatus::Ok => status.as_str().green().bold().to_string(),
        AggregationStatus::Partial => status.as_str().yellow().bold().to_string(),
        AggregationStatus::NoResults => status.as_str().dimmed().to_string(),
        AggregationStatus::Error => status.as_str().red().bold().to_string(),
    }
}

pub fn print_aggregated(result: &AggregatedResult) {
    println!(
        "{} {}  {}",
        "Search:".bold().cyan(),
        result.query.yellow(),
        status_label(result.status)
    );
    let mut meta = format!("stores: {}", result.providers_queried.join(", "));
    if let Some(ms) = result.duration_ms {
        meta.push_str(&format!("  ({} ms)", ms));
    }
    println!("{}", meta.dimmed());
    if result.was_limited {
        println!(
            "{}",
            format!(
                "Plan limit: {} of {} requested stores searched",
                result.providers_queried.len(),
                result.original_provider_count.unwrap_or_default()
            )
            .yellow()
        );
    }
    println!();

    if result.hits.is_empty() {
        println!("   {}", "No results".dimmed());
    } else {
        let mut t = table(vec!["#", "Product", "Store", "Price", "Match"]);
        for (i, hit) in result.hits.iter().enumerate() {
            t.add_row(vec![
                Cell::new(i + 1),
                Cell::new(format!("{}\n{}", truncate_text(&hit.title, TITLE_WIDTH), hit.url)),
                Cell::new(&hit.provider),
                price_cell(hit.price),
                Cell::new(format!("{:.0}%", hit.rank_relevance() * 100.0))
                    .set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{}", t);
    }

    if result.has_errors() {
        println!();
        for failure in &result.providers_failed {
            println!(
                "   {} {} {}",
                "✗".red(),
                failure.provider().bold(),
                truncate_text(failure.error(), 100).dimmed()
            );
        }
    }
}

pub fn print_order(order: &OrderQuote) {
    let resume = &order.resume;
    println!("{}", "Order Quote".bold().cyan());
    println!(
        "{}",
        format!("stores: {}", resume.providers_used.join(", ")).dimmed()
    );
    println!();

    let mut t = table(vec!["Item", "Qty", "Status", "Best offer", "Unit", "Total"]);
    for line in &order.items {
        let detail = line.item.detail.as_deref().unwrap_or("(no detail)");
        let offer = line
            .quote
            .best_hit
            .as_ref()
            .map(|h| format!("{} ({})", truncate_text(&h.title, 40), h.provider))
            .or_else(|| line.quote.reason.clone())
            .unwrap_or_default();
        t.add_row(vec![
            Cell::new(truncate_text(detail, 40)),
            Cell::new(line.item.effective_quantity()).set_alignment(CellAlignment::Right),
            Cell::new(line.quote.status.as_str()),
            Cell::new(offer),
            price_cell(line.quote.unit_price),
            price_cell(line.quote.line_total),
        ]);
    }
    println!("{}", t);
    println!();

    println!(
        "{} {} {}",
        "Subtotal:".bold(),
        format_clp(resume.subtotal).green().bold(),
        resume.currency.dimmed()
    );
    println!(
        "{}",
        format!(
            "{} priced, {} missing, {} items, {} units",
            resume.items_priced, resume.items_missing, resume.items_total, resume.total_items_qty
        )
        .dimmed()
    );
    if resume.items_limit_applied {
        println!(
            "{}",
            format!(
                "Plan limit: quoted {} of {} items",
                resume.items_total,
                resume.total_items_found.unwrap_or_default()
            )
            .yellow()
        );
    }
    if resume.was_limited {
        println!(
            "{}",
            format!(
                "Plan limit: {} of {} requested stores searched",
                resume.providers_used.len(),
                resume.original_provider_count.unwrap_or_default()
            )
            .yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clp_grouping() {
        assert_eq!(format_clp(0), "$0");
        assert_eq!(format_clp(990), "$990");
        assert_eq!(format_clp(2990), "$2.990");
        assert_eq!(format_clp(1_234_567), "$1.234.567");
    }
}
