//! ChurnLens - customer churn insights dashboard
//!
//! A CLI tool that reads precomputed churn predictions and renders
//! overall churn metrics, churn drivers, churn by country group and
//! the list of at-risk customers.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid arguments, config, data source not loadable, etc.)

mod analysis;
mod cli;
mod config;
mod data;
mod models;
mod report;
mod session;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use data::DatasetCache;
use report::generator::{format_count, format_percent};
use report::ReportOptions;
use session::{Session, SessionCommand};
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
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

    // Load configuration first so `[general] verbose` can set the log level
    let config = match load_config(&args) {
        Ok(mut config) => {
            config.merge_with_args(&args);
            config
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("ChurnLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_dashboard(&args, config) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .churnlens.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to change the data path, threshold, display limit and format.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the data, render the dashboard and optionally stay interactive.
/// Returns the process exit code.
fn run_dashboard(args: &Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Step 1: Load the predictions once for the whole session
    let mut cache = DatasetCache::new().with_progress(!args.quiet);
    let dataset = match cache.get_or_load(&config.data.path) {
        Ok(dataset) => dataset,
        Err(e) => {
            // Halt before any aggregate is computed.
            if e.is_not_found() {
                error!("Data source missing: {}", config.data.path.display());
            } else {
                error!("Data source unreadable: {}", e);
            }
            eprintln!("❌ {}", e.user_message());
            return Ok(1);
        }
    };
    info!("Loaded {} customer rows", dataset.len());
    debug!("{} dataset(s) cached for this session", cache.len());

    let mut session = Session::new(
        dataset,
        config.dashboard.default_threshold,
        config.dashboard.display_limit,
    );

    // Step 2: Run every query and render
    let options = ReportOptions {
        feature_chart_limit: config.dashboard.feature_chart_limit,
        include_insights: config.report.include_insights,
    };
    let report = report::build_report(&session, &options, start_time.elapsed().as_secs_f64());

    report::write_report(&report, config.report.format, &config.general.output)?;

    // Print summary
    if !args.quiet {
        let overview = &report.overview;
        println!("\n📈 Overall Churn Insights:");
        println!("   Total customers: {}", format_count(overview.total_customers));
        println!(
            "   Actual churn rate: {} | Predicted churn rate: {}",
            format_percent(overview.actual_churn_rate),
            format_percent(overview.predicted_churn_rate)
        );
        println!(
            "   Predicted churners: {}",
            format_count(overview.predicted_churners)
        );
        println!(
            "   At-risk (>= {:.2}): {}",
            report.at_risk.threshold,
            format_count(report.at_risk.total_matches)
        );
        println!(
            "\n✅ Dashboard ({}) saved to: {}",
            config.report.format,
            config.general.output.display()
        );
    }

    // Step 3: Threshold changes re-run only the at-risk query
    if args.interactive {
        let stdin = io::stdin();
        let stdout = io::stdout();
        run_interactive(&mut session, stdin.lock(), stdout.lock())?;
    }

    Ok(0)
}

/// Read thresholds line by line and print the refreshed at-risk section
/// after each one.
fn run_interactive<R: BufRead, W: Write>(session: &mut Session, input: R, mut output: W) -> Result<()> {
    writeln!(
        output,
        "\nEnter a churn probability threshold (0.0 - 1.0), or q to quit. Current: {:.2}",
        session.threshold()
    )?;

    for line in input.lines() {
        let line = line.context("Failed to read threshold input")?;

        match SessionCommand::parse(&line) {
            Ok(SessionCommand::Threshold(threshold)) => {
                let view = session.set_threshold(threshold);
                write!(output, "\n{}", report::generate_at_risk_section(&view))?;
            }
            Ok(SessionCommand::Quit) => break,
            Ok(SessionCommand::Skip) => continue,
            Err(e) => {
                warn!("Ignoring input '{}': {}", line.trim(), e);
                writeln!(output, "⚠️  {}", e)?;
            }
        }

        output.flush()?;
    }

    Ok(())
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
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
