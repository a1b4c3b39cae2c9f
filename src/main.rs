// Entry point: one linear pass over the FWA extracts.
//
// load -> clean -> aggregate -> reconcile -> render -> publish
//
// A missing or empty input aborts before anything is written. Everything
// after loading degrades instead of failing: unknown values render as a
// dash, empty charts are left out, and each output location is written
// independently.
mod cleaner;
mod config;
mod error;
mod loader;
mod output;
mod reconcile;
mod render;
mod reports;
mod schema;
mod types;
mod util;

use anyhow::{Context, Result};
use config::{Config, ALL_HITS_FILE, PRESENTED_HITS_FILE, PROVIDER_HITS_FILE};
use error::DashboardError;
use reconcile::Reconciler;
use render::DashboardView;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use types::{DashboardMetrics, HitSource, RawTable};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load(config: &Config, file: &str, label: &str) -> Result<RawTable> {
    let (table, report) = loader::load_table(&config.input(file), label)?;
    println!(
        "Loaded {}: {} of {} rows kept ({} blank, {} unreadable)",
        label,
        util::format_int(table.rows.len()),
        util::format_int(report.total_rows),
        util::format_int(report.blank_rows),
        util::format_int(report.parse_errors)
    );
    Ok(table)
}

fn note_cleaning(label: &str, report: &cleaner::CleanReport) {
    if report.missing_concept > 0 {
        println!(
            "Note: {} {} rows skipped for a blank Concept.",
            util::format_int(report.missing_concept),
            label
        );
    }
    if report.bad_cells() > 0 {
        println!(
            "Note: {} {} cells unreadable and treated as unknown ({} currency, {} counts, {} dates).",
            util::format_int(report.bad_cells()),
            label,
            util::format_int(report.bad_currency),
            util::format_int(report.bad_counts),
            util::format_int(report.bad_dates)
        );
    }
    if !report.unknown_columns.is_empty() {
        println!(
            "Note: {} columns not recognised: {}",
            label,
            report.unknown_columns.join(", ")
        );
    }
}

/// Returns `Ok(false)` when no output location could be written.
fn run(config: &Config) -> Result<bool> {
    let all_table = load(config, ALL_HITS_FILE, HitSource::All.label())?;
    let presented_table = load(config, PRESENTED_HITS_FILE, HitSource::Presented.label())?;
    let provider_table = load(config, PROVIDER_HITS_FILE, "All Provider Hits")?;

    let (all_hits, all_report) = cleaner::clean_hits(&all_table)?;
    note_cleaning(&all_table.label, &all_report);
    let (presented_hits, presented_report) = cleaner::clean_hits(&presented_table)?;
    note_cleaning(&presented_table.label, &presented_report);
    let (provider_hits, provider_report) = cleaner::clean_provider_hits(&provider_table)?;
    note_cleaning(&provider_table.label, &provider_report);
    if presented_hits.is_empty() {
        // Every row lacked a concept; there is nothing to present.
        return Err(DashboardError::EmptySource {
            label: presented_table.label.clone(),
            path: config.input(PRESENTED_HITS_FILE),
        }
        .into());
    }

    let mut all = reports::summarize_concepts(&all_hits);
    let mut presented = reports::summarize_concepts(&presented_hits);
    reports::sort_by_delivery(&mut all);
    reports::sort_by_delivery(&mut presented);

    let headline = reports::headline_metrics(&all, &presented);
    let cadence = reports::delivery_cadence(&presented_hits, config.baseline);
    let presented_timeline = reports::delivery_timeline(&presented_hits);
    let all_timeline = reports::delivery_timeline(&all_hits);
    let distributions = reports::provider_distributions(&provider_hits);

    let findings = Reconciler::new(config.tolerance).reconcile(&provider_hits, &all);
    let flagged = reconcile::notable(&findings).len();
    if flagged > 0 {
        println!(
            "Note: {} provider-level totals do not exactly match the All Hits summary.",
            util::format_int(flagged)
        );
    }
    output::missing_whitepapers(config, presented.iter().map(|s| s.concept.as_str()));

    println!("\nAggregate Summary\n");
    output::preview_table_rows(&render::headline_preview(&headline), 4);
    println!(
        "Delivery Cadence (average successive interval: {})\n",
        render::format_interval(cadence.average_interval_days)
    );
    output::preview_table_rows(&render::cadence_preview(&cadence), 10);

    let view = DashboardView {
        headline: &headline,
        presented: &presented,
        all: &all,
        cadence: &cadence,
        presented_timeline: &presented_timeline,
        all_timeline: &all_timeline,
        distributions: &distributions,
        findings: &findings,
        as_of: chrono::Local::now().date_naive(),
    };
    let html = render::render_dashboard(&view, config);

    let metrics = DashboardMetrics {
        headline,
        cadence,
        reconciliation: findings,
    };
    let outcomes = output::publish(&html, &metrics, config);
    let written: Vec<String> = outcomes
        .iter()
        .filter(|o| o.is_ok())
        .map(|o| o.dashboard.display().to_string())
        .collect();
    for failed in outcomes.iter().filter(|o| !o.is_ok()) {
        if let Err(e) = &failed.result {
            eprintln!("Write error: {}", e);
        }
    }
    if written.is_empty() {
        return Ok(false);
    }
    println!("Wrote dashboard to: {}", written.join(", "));
    Ok(true)
}

fn main() -> ExitCode {
    init_logging();

    let root = match std::env::current_dir().context("cannot determine the working directory") {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = Config::from_env(root);
    info!("generating dashboard in {}", config.root.display());

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("no output location could be written");
            ExitCode::FAILURE
        }
        Err(e) => {
            match e.downcast_ref::<DashboardError>() {
                Some(d) if d.is_fatal_input() => {
                    eprintln!("Failed to load required input: {}", d)
                }
                _ => {
                    error!("dashboard generation failed: {:#}", e);
                    eprintln!("Error: {:#}", e);
                }
            }
            ExitCode::FAILURE
        }
    }
}
