use physim::{bench_collisions, bench_gravity, bench_leapfrog};
use physim::{LogSink, Scenario, ScenarioConfig};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Run a physics scenario described in a YAML file")]
struct Args {
    /// Scenario file, looked up in `scenarios/` unless it is an existing path
    #[arg(short, long, default_value = "double_pendulum.yaml")]
    file_name: String,

    /// Log every n-th frame
    #[arg(short, long, default_value_t = 10)]
    every: usize,

    /// Time gravity and collision kernels instead of running a scenario
    #[arg(long)]
    bench: bool,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn scenario_path(file_name: &str) -> PathBuf {
    let direct = PathBuf::from(file_name);
    if direct.is_file() {
        return direct;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = scenario_path(file_name);
    let scenario_cfg = ScenarioConfig::from_path(&config_path)
        .with_context(|| format!("failed to load scenario {}", config_path.display()))?;
    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.bench {
        bench_gravity();
        bench_leapfrog();
        bench_collisions();
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let scenario = Scenario::build(&scenario_cfg)
        .with_context(|| format!("invalid scenario {}", args.file_name))?;

    let mut sink = LogSink::new(args.every);
    let summary = match scenario.run(&mut sink) {
        Ok(summary) => summary,
        Err(e) => {
            error!(kind = scenario.kind, "{e}");
            return Err(e).context("simulation failed");
        }
    };

    info!(
        kind = scenario.kind,
        steps = summary.steps,
        frames = summary.frames,
        final_time = summary.final_time,
        "done"
    );

    Ok(())
}
