use anyhow::{bail, Context, Result};
use attack_runner::config::DEFAULT_CONFIG_PATH;
use attack_runner::inventory::validate_composition;
use attack_runner::units::{self, format_duration, UNIT_CATALOG};
use attack_runner::{AttackPipeline, AttackPlan, Coordinates, HaltReason, RunnerConfig, TroopMap};
use clap::{Parser, Subcommand};
use core_logic::{setup_logger, shutdown_signal, RESULT_TARGET};
use dotenv::dotenv;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Debug output on console and in the log file
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value = "logs/metrics.json")]
    export_metrics: String,

    /// Per-attempt results of a run, as JSON
    #[arg(long, default_value = "logs/results.json")]
    export_results: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit every command in a plan file
    Run {
        #[arg(short, long)]
        plan: String,
    },
    /// Check a plan file offline
    Validate {
        #[arg(short, long)]
        plan: String,
    },
    /// Estimate travel time between two coordinates
    Travel {
        #[arg(long)]
        from: Coordinates,
        #[arg(long)]
        to: Coordinates,
        /// e.g. `light=50,spy=1`
        #[arg(long)]
        troops: String,
    },
    /// Print the unit speed table
    Units,
}

fn parse_troops(raw: &str) -> Result<TroopMap> {
    let mut troops = TroopMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (unit, count) = pair
            .split_once('=')
            .with_context(|| format!("expected unit=count, got '{}'", pair))?;
        let count: i64 = count
            .trim()
            .parse()
            .with_context(|| format!("invalid count for '{}'", unit.trim()))?;
        troops.insert(unit.trim().to_string(), count);
    }
    Ok(troops)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let _log_guard = setup_logger(args.verbose);

    match &args.command {
        Commands::Units => {
            println!("{:<10} {:>12}", "unit", "min/field");
            for unit in UNIT_CATALOG {
                println!("{:<10} {:>12}", unit.name, unit.minutes_per_field);
            }
            Ok(())
        }
        Commands::Travel { from, to, troops } => {
            let troops = parse_troops(troops)?;
            let travel = RunnerConfig::from_path(&args.config)
                .map(|c| c.world.travel())
                .unwrap_or_default();
            let Some(slowest) = units::slowest_unit(&troops) else {
                bail!("no troops with a positive count");
            };
            let distance = from.distance_to(to);
            let duration = travel
                .travel_time(distance, &troops)
                .context("world speed must be positive")?;
            println!(
                "{} -> {}: {:.2} fields at {} pace, {}",
                from,
                to,
                distance,
                slowest.name,
                format_duration(duration)
            );
            Ok(())
        }
        Commands::Validate { plan } => validate_plan(&args.config, plan),
        Commands::Run { plan } => run_plan(&args, plan).await,
    }
}

fn validate_plan(config_path: &str, plan_path: &str) -> Result<()> {
    let config = RunnerConfig::from_path(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    let plan = AttackPlan::from_path(plan_path)
        .with_context(|| format!("Failed to load plan from {}", plan_path))?;
    let travel = config.world.travel();

    let mut invalid = 0;
    for (i, request) in plan.attacks.iter().enumerate() {
        let mut errors = validate_composition(&request.troops).errors;
        if !config.world.bounds.contains(&request.target) {
            errors.push(format!("target {} is outside the world", request.target));
        }

        if errors.is_empty() {
            let eta = request
                .distance()
                .and_then(|d| travel.travel_time(d, &request.troops))
                .map(format_duration)
                .unwrap_or_else(|| "-".to_string());
            println!("#{:<3} ok      {} -> {} ({}, travel {})", i + 1, request.origin, request.target, request.command, eta);
        } else {
            invalid += 1;
            println!("#{:<3} invalid {} -> {}: {}", i + 1, request.origin, request.target, errors.join("; "));
        }
    }

    if invalid > 0 {
        bail!("{} of {} commands are invalid", invalid, plan.len());
    }
    Ok(())
}

async fn run_plan(args: &Args, plan_path: &str) -> Result<()> {
    let config = RunnerConfig::from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    let plan = AttackPlan::from_path(plan_path)
        .with_context(|| format!("Failed to load plan from {}", plan_path))?;
    if plan.is_empty() {
        warn!("Plan {} contains no commands", plan_path);
        return Ok(());
    }
    if config.session.cookie.is_none() {
        warn!("No session cookie configured; requests will be anonymous");
    }

    let pipeline = AttackPipeline::connect(&config).context("Failed to build pipeline")?;
    for request in plan.into_requests() {
        pipeline.queue.add_to_queue(request);
    }

    let shutdown = shutdown_signal();
    let queue = pipeline.queue.clone();
    let watcher = tokio::spawn(async move {
        shutdown.cancelled().await;
        warn!("Ctrl+C received, stopping after the current command");
        queue.stop();
    });

    let outcome = pipeline.queue.process_queue(&config.queue.options()).await;
    watcher.abort();

    if let Err(e) = pipeline.metrics.export_to_file(&args.export_metrics).await {
        warn!("Failed to export metrics to {}: {}", args.export_metrics, e);
    }
    let results = serde_json::to_string_pretty(&pipeline.queue.results())?;
    if let Err(e) = tokio::fs::write(&args.export_results, results).await {
        warn!("Failed to export results to {}: {}", args.export_results, e);
    }

    let summary = outcome?;
    info!(
        target: RESULT_TARGET,
        "Batch done: {} sent, {} failed, {} still queued",
        summary.sent,
        summary.failed,
        summary.remaining
    );
    if summary.halted == HaltReason::Challenge {
        error!("Automation challenge detected; solve it in the browser before resuming");
        bail!("batch aborted by an automation challenge");
    }
    Ok(())
}
