//! GlobalMuon Simulator CLI
//!
//! Run deterministic reconstruction scenarios against generated truth.

use clap::Parser;
use globalmuon_core::{GlobalMuonConfig, MuonHitsOption};
use globalmuon_sim::scenarios::ScenarioId;
use globalmuon_sim::{ScenarioResult, ScenarioRunner, SimError, SimExport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "globalmuon-sim")]
#[command(about = "Deterministic simulation of global muon reconstruction")]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (single_muon, dense_jet, noisy_stations, off_axis, mixed, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Events per scenario
    #[arg(short, long, default_value = "100")]
    events: u64,

    /// Muon hits included in the refit (tracker_only, all, first, selected, combined or 0-4);
    /// defaults to the configured option
    #[arg(short, long)]
    mode: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export reconstructed candidates to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Print χ² distributions of true and fake pairs instead of running the scenarios
    #[arg(long)]
    match_analysis: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", err);
    }

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    }
}

/// Returns whether every scenario passed.
fn run(args: &Args) -> Result<bool, SimError> {
    if !args.json {
        info!("GlobalMuon Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().map_err(|e| {
            SimError::InvalidArgument(format!(
                "{}; available scenarios: single_muon, dense_jet, noisy_stations, off_axis, mixed, all",
                e
            ))
        })?]
    };

    let config = match &args.config {
        Some(path) => GlobalMuonConfig::from_json_file(path)?,
        None => GlobalMuonConfig::default(),
    };
    let option: MuonHitsOption = match &args.mode {
        Some(mode) => mode.parse().map_err(SimError::InvalidArgument)?,
        None => config.builder.hits_option,
    };

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let runner = ScenarioRunner::new(seed)
        .with_config(config)
        .with_option(option)
        .with_events(args.events);

    if args.match_analysis {
        let analyses: Vec<_> = scenarios
            .iter()
            .map(|s| serde_json::json!({ "scenario": s.name(), "analysis": runner.run_match_analysis(*s) }))
            .collect();
        let text = serde_json::to_string_pretty(&analyses).map_err(std::io::Error::from)?;
        println!("{}", text);
        return Ok(true);
    }

    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            return Err(SimError::InvalidArgument(
                "--export only supports a single scenario, not 'all'".to_string(),
            ));
        }
        let scenario = scenarios[0];
        info!("Running with export to: {}", export_path);

        let mut export = SimExport::new(scenario.name(), seed, option);
        let result = runner.run_with_export(scenario, Some(&mut export));
        export.write_to_file(export_path)?;
        report(&result);
        return Ok(result.passed);
    }

    let results: Vec<ScenarioResult> = scenarios
        .iter()
        .map(|scenario| {
            let result = runner.run(*scenario);
            if !args.json {
                report(&result);
            }
            result
        })
        .collect();

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": total - passed,
            "mode": option.name(),
            "results": results,
        });
        let text = serde_json::to_string_pretty(&summary).map_err(std::io::Error::from)?;
        println!("{}", text);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("Results: {}/{} passed", passed, total);
    }

    Ok(passed == total)
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED: efficiency {:.1}%, fake rate {:.1}%",
            result.scenario,
            result.seed,
            result.metrics.efficiency() * 100.0,
            result.metrics.fake_rate() * 100.0
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario,
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}
