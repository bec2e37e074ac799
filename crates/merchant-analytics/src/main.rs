//! CLI entry point for the merchant transaction dashboard.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use merchant_analytics::{
    AnalyticsConfig, DashboardReport, FilterCriteria, GroupAggregate, Session,
};
use std::path::Path;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Merchant card-transaction analytics dashboard",
    long_about = "Summarizes a merchant card-transaction CSV: metric cards, top merchants,\n\
                  device usage, card frequency trend, the largest rows, and a filtered\n\
                  CSV export.\n\n\
                  REQUIRED COLUMNS:\n  \
                  merchant_name, device_name, masked_card_no, occurrences, total_amount\n\n\
                  EXAMPLES:\n  \
                  # Whole-file dashboard\n  \
                  merchant-analytics -i transactions.csv\n\n  \
                  # Two merchants, amounts between 100 and 5000, exported\n  \
                  merchant-analytics -i transactions.csv -m 'Shop LAGOS' -m Cafe \\\n      \
                  --min-amount 100 --max-amount 5000 --export filtered.csv\n\n  \
                  # Machine-readable report\n  \
                  merchant-analytics -i transactions.csv --json | jq .filtered"
)]
struct Args {
    /// Path to the transactions CSV
    #[arg(short, long)]
    input: Option<String>,

    /// Keep only this merchant (repeatable)
    #[arg(short, long = "merchant")]
    merchants: Vec<String>,

    /// Keep only this device (repeatable)
    #[arg(short, long = "device")]
    devices: Vec<String>,

    /// Smallest total_amount to keep (inclusive)
    #[arg(long)]
    min_amount: Option<f64>,

    /// Largest total_amount to keep (inclusive)
    #[arg(long)]
    max_amount: Option<f64>,

    /// Smallest occurrences to keep
    #[arg(long)]
    min_occurrences: Option<u64>,

    /// First transaction date to keep (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last transaction date to keep (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Number of entries in the top-N rankings and the largest-rows table
    #[arg(long, default_value = "10")]
    top_n: usize,

    /// Amounts strictly above this count as high value
    #[arg(long, default_value = "5000")]
    high_value_threshold: f64,

    /// Write the filtered rows to this CSV file
    #[arg(short, long)]
    export: Option<String>,

    /// Output JSON to stdout instead of the text dashboard
    ///
    /// Disables all logs; only the report is written.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled so that stdout
/// only holds the JSON report.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    let config = AnalyticsConfig::builder()
        .top_n(args.top_n)
        .high_value_threshold(args.high_value_threshold)
        .build()?;

    let mut session = Session::new(config);

    if let Some(input) = &args.input {
        if !Path::new(input).exists() {
            return Err(anyhow!("Input file not found: {}", input));
        }
        info!("Loading transactions from: {}", input);
        let bytes = std::fs::read(input).with_context(|| format!("Reading {}", input))?;
        session.upload(&bytes)?;
    }

    // Halts with the upload prompt when no file was given.
    let dataset = session.dataset()?.clone();

    let criteria = build_criteria(&args);
    if let (Some(min), Some(max)) = (criteria.min_amount, criteria.max_amount)
        && min > max
    {
        return Err(anyhow!("--min-amount ({}) is above --max-amount ({})", min, max));
    }
    session.set_filters(criteria);

    let report = session.report()?;

    if let Some(path) = &args.export {
        session.view()?.write_csv_file(path)?;
    }

    if args.json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print_dashboard(&report, dataset.merchant_options().len(), args.export.as_deref());
    }

    Ok(())
}

fn build_criteria(args: &Args) -> FilterCriteria {
    FilterCriteria {
        merchants: args.merchants.clone(),
        devices: args.devices.clone(),
        min_amount: args.min_amount,
        max_amount: args.max_amount,
        min_occurrences: args.min_occurrences,
        start_date: args.start_date,
        end_date: args.end_date,
    }
}

/// Text rendition of the dashboard.
///
/// Uses `println!` on purpose: this is the program's output, not logging,
/// and must show regardless of log level.
fn print_dashboard(report: &DashboardReport, merchant_count: usize, export: Option<&str>) {
    let m = &report.filtered;

    println!("\n{}", "=".repeat(80));
    println!("MERCHANT TRANSACTION DASHBOARD");
    println!("{}\n", "=".repeat(80));

    println!("METRICS");
    println!("{}", "-".repeat(40));
    println!("  Rows:                  {} of {}", m.record_count, report.overall.record_count);
    println!("  Total Transactions:    {}", m.total_transactions);
    println!("  Total Amount:          {:.2}", m.total_amount);
    println!("  Avg Transaction Value: {:.2}", m.avg_transaction_value);
    match m.success_rate {
        Some(rate) => println!("  Success Rate:          {:.1}%", rate),
        None => println!("  Success Rate:          n/a (no status column)"),
    }
    println!("  Unique Merchants:      {} (of {})", m.distinct_merchants, merchant_count);
    println!("  Unique Devices:        {}", m.distinct_devices);
    println!("  Unique Cards:          {}", m.distinct_cards);
    println!("  High-Value Rows:       {}", m.high_value_count);
    println!("  Zero-Amount Rows:      {}", m.zero_amount_count);
    if m.missing_amount_count > 0 {
        println!("  Unreadable Amounts:    {}", m.missing_amount_count);
    }
    println!();

    print_ranking("TOP MERCHANTS BY TRANSACTIONS", &report.top_merchants_by_transactions, |g| {
        g.occurrences.to_string()
    });
    print_ranking("TOP MERCHANTS BY AMOUNT", &report.top_merchants_by_amount, |g| {
        format!("{:.2}", g.total_amount)
    });
    print_ranking("DEVICE USAGE", &report.device_usage, |g| g.occurrences.to_string());
    print_ranking("TOP CARDS BY FREQUENCY", &report.top_cards, |g| {
        format!("{} ({:.2})", g.occurrences, g.total_amount)
    });

    println!("CARD FREQUENCY TREND");
    println!("{}", "-".repeat(40));
    match &report.card_regression {
        Some(fit) => {
            println!(
                "  occurrences = {:.4} + {:.6} * amount  (R² {:.3}, {} cards)",
                fit.intercept, fit.slope, fit.r_squared, fit.n_samples
            );
        }
        None => println!("  Not enough distinct cards for a trendline"),
    }
    if let Some(r) = report.amount_occurrence_correlation {
        println!("  Amount/occurrence correlation: {:.3}", r);
    }
    println!();

    if let (Some(first), Some(last)) = (report.daily_totals.first(), report.daily_totals.last()) {
        println!("DAILY TOTALS");
        println!("{}", "-".repeat(40));
        println!(
            "  {} days, {} to {}",
            report.daily_totals.len(),
            first.date,
            last.date
        );
        if let Some(peak) = report
            .daily_totals
            .iter()
            .max_by(|a, b| a.total_amount.total_cmp(&b.total_amount))
        {
            println!("  Peak day: {} ({:.2})", peak.date, peak.total_amount);
        }
        println!();
    }

    println!("LARGEST TRANSACTIONS");
    println!("{}", "-".repeat(40));
    if report.largest_transactions.is_empty() {
        println!("  (no rows)");
    }
    for row in &report.largest_transactions {
        let amount = row
            .total_amount
            .map_or_else(|| "n/a".to_string(), |a| format!("{:.2}", a));
        let occurrences = row
            .occurrences
            .map_or_else(|| "n/a".to_string(), |o| o.to_string());
        println!(
            "  {:<24} {:<10} {:<16} {:>6} {:>14}",
            truncate_str(&row.merchant_name, 24),
            truncate_str(&row.device_name, 10),
            truncate_str(&row.masked_card_no, 16),
            occurrences,
            amount
        );
    }
    println!();

    if !report.warnings.is_empty() {
        println!("WARNINGS");
        println!("{}", "-".repeat(40));
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
        println!();
    }

    if let Some(path) = export {
        println!("Filtered data saved to {}", path);
    }
    println!("{}", "=".repeat(80));
}

fn print_ranking(title: &str, groups: &[GroupAggregate], value: impl Fn(&GroupAggregate) -> String) {
    println!("{}", title);
    println!("{}", "-".repeat(40));
    if groups.is_empty() {
        println!("  (no rows)");
    }
    for (rank, group) in groups.iter().enumerate() {
        println!("  {:>2}. {:<30} {}", rank + 1, truncate_str(&group.key, 30), value(group));
    }
    println!();
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
