//! finboard - financial dashboard for a training-institute back office
//!
//! Aggregates payments, expenses and enrollments into per-currency totals,
//! period-over-period trends and chart feeds, then renders the result as a
//! Markdown or JSON report. `--watch` keeps refreshing until Ctrl-C.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, mandatory feed failure, write failure, etc.)

mod aggregation;
mod cli;
mod config;
mod engine;
mod error;
mod models;
mod report;
mod source;

use aggregation::{Clock, FixedClock, SystemClock};
use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use engine::{Aggregator, AggregatorOptions, RefreshController, RefreshOutcome, RefreshPhase};
use indicatif::{ProgressBar, ProgressStyle};
use models::{DashboardSnapshot, Metric};
use source::{DataSource, FixtureSource, HttpSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("finboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", redacted(&args));

    if let Err(e) = run(args).await {
        error!("Dashboard failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .finboard.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set the API URL, endpoints, base currency and refresh interval.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Args with the token masked, for debug logging.
fn redacted(args: &Args) -> Args {
    let mut args = args.clone();
    if args.token.is_some() {
        args.token = Some("***".to_string());
    }
    args
}

/// Build the dashboard and render it once, or keep it fresh in watch mode.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let source = build_source(&args, &config)?;
    let clock = build_clock(&args)?;

    let aggregator = Aggregator::new(
        source,
        AggregatorOptions {
            base_currency: config.dashboard.base_currency,
            chart_months: config.dashboard.chart_months,
            activity_limit: config.dashboard.activity_limit,
        },
    );
    let mut controller = RefreshController::new(aggregator, clock);

    if config.refresh.enabled {
        run_watch(&mut controller, &config, args.quiet).await
    } else {
        run_once(&controller, &config, args.quiet).await
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

fn build_source(args: &Args, config: &Config) -> Result<Arc<dyn DataSource>> {
    if let Some(ref fixture) = args.fixture {
        info!("Using fixture: {}", fixture.display());
        let source = FixtureSource::load(fixture)
            .with_context(|| format!("Failed to load fixture {}", fixture.display()))?;
        return Ok(Arc::new(source));
    }

    info!("Using back-office API at {}", config.api.base_url);
    if config.api.token.is_none() {
        warn!("No API token configured; requests are sent unauthenticated");
    }
    let source = HttpSource::new(&config.api).context("Failed to set up API client")?;
    Ok(Arc::new(source))
}

/// System clock, or a fixed one at noon UTC of `--as-of`.
fn build_clock(args: &Args) -> Result<Arc<dyn Clock>> {
    match args.as_of {
        Some(date) => {
            let noon = date
                .and_hms_opt(12, 0, 0)
                .context("Invalid --as-of date")?;
            info!("Aggregating as of {}", date);
            Ok(Arc::new(FixedClock(Utc.from_utc_datetime(&noon))))
        }
        None => Ok(Arc::new(SystemClock)),
    }
}

/// Single run: load, render, exit.
async fn run_once(controller: &RefreshController, config: &Config, quiet: bool) -> Result<()> {
    let spinner = spinner("Loading dashboard...", quiet);
    let outcome = controller.mount().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let view = controller.view();
    match (outcome, view.snapshot) {
        (RefreshOutcome::Ready, Some(snapshot)) => emit(&snapshot, config, quiet),
        _ => anyhow::bail!(view
            .error
            .unwrap_or_else(|| "Dashboard could not be loaded".to_string())),
    }
}

/// Watch mode: render every fresh snapshot until Ctrl-C.
async fn run_watch(controller: &mut RefreshController, config: &Config, quiet: bool) -> Result<()> {
    let interval = Duration::from_secs(config.refresh.interval_seconds);

    let spinner_bar = spinner("Loading dashboard...", quiet);
    controller.mount().await;
    if let Some(pb) = spinner_bar {
        pb.finish_and_clear();
    }

    let mut rx = controller.subscribe();
    let mut rendered = 0;
    let initial = rx.borrow_and_update().clone();
    match (initial.phase, initial.snapshot) {
        (RefreshPhase::Ready, Some(snapshot)) => {
            emit(&snapshot, config, quiet)?;
            rendered = initial.sequence;
        }
        _ => eprintln!(
            "⚠️  Initial load failed: {}",
            initial.error.as_deref().unwrap_or("unknown error")
        ),
    }

    controller.start_auto_refresh(interval);
    if !quiet {
        eprintln!(
            "🔄 Refreshing every {}s. Press Ctrl-C to stop.",
            interval.as_secs()
        );
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut loading: Option<ProgressBar> = None;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                match view.phase {
                    RefreshPhase::Loading => {
                        if loading.is_none() {
                            loading = spinner("Refreshing...", quiet);
                        }
                    }
                    RefreshPhase::Ready => {
                        if let Some(pb) = loading.take() {
                            pb.finish_and_clear();
                        }
                        if let Some(snapshot) = view.snapshot.filter(|_| view.sequence > rendered) {
                            emit(&snapshot, config, quiet)?;
                            rendered = view.sequence;
                        }
                    }
                    RefreshPhase::Error => {
                        if let Some(pb) = loading.take() {
                            pb.finish_and_clear();
                        }
                        eprintln!(
                            "⚠️  Refresh failed, keeping last snapshot: {}",
                            view.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    RefreshPhase::Idle => {}
                }
            }
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    if let Some(pb) = loading {
        pb.finish_and_clear();
    }
    controller.stop_auto_refresh();
    if !quiet {
        eprintln!("\n👋 Stopped watching.");
    }
    Ok(())
}

/// Render a snapshot and write it to the configured output.
fn emit(snapshot: &DashboardSnapshot, config: &Config, quiet: bool) -> Result<()> {
    let content = report::render(snapshot, config.report.format)?;

    match config.report.output {
        Some(ref output) => {
            let path = Path::new(output);
            report::write_report(&content, path)?;
            if !quiet {
                print_summary(snapshot);
                println!("\n✅ Dashboard saved to: {}", path.display());
            }
        }
        None => println!("{}", content),
    }

    for feed in &snapshot.degraded {
        warn!("{} feed unavailable, shown with defaults", feed);
    }
    Ok(())
}

fn print_summary(snapshot: &DashboardSnapshot) {
    println!("\n📊 Dashboard Summary:");
    for (currency, income) in snapshot.income.iter() {
        println!(
            "   {}: 💰 income {} | ↩️  refunds {} | 💸 expenses {} | 📈 profit {}",
            currency,
            income,
            snapshot.refunds.get(currency),
            snapshot.expenses.get(currency),
            snapshot.profit.get(currency)
        );
    }
    match snapshot.trend(Metric::ActiveStudents, None) {
        Some(trend) => println!(
            "   🎓 Active students: {} ({} vs last year)",
            snapshot.active_students,
            trend.indicator.as_str()
        ),
        None => println!("   🎓 Active students: {}", snapshot.active_students),
    }
    if !snapshot.degraded.is_empty() {
        println!("   ⚠️  Degraded feeds: {}", snapshot.degraded.len());
    }
}

fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}
