use keel_clock::SystemClock;
use keel_runner::{Keeper, RunnerConfig, RunnerError, VaultBootstrap, YieldSimulation};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

fn print_help() {
    eprintln!(
        r#"Keel - multi-strategy yield vault keeper

USAGE:
    keel [OPTIONS]

OPTIONS:
    --config <PATH>     Load runner configuration from JSON file (default: bundled demo)
    --steps <N>         Run N simulated steps on a manual clock, then exit
    --live              Run the keeper on wall-clock time until Ctrl-C
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Simulate the demo vault for a week
    keel --steps 28

    # Keep a configured vault live
    keel --config vault.json --live
"#
    );
}

struct Args {
    config_path: Option<String>,
    steps: Option<usize>,
    live: bool,
}

fn parse_args() -> Result<Option<Args>, RunnerError> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        steps: None,
        live: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--config" | "-c" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| RunnerError::InvalidArgument("--config requires a path".into()))?;
                parsed.config_path = Some(path.clone());
            }
            "--steps" | "-s" => {
                i += 1;
                let steps = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| RunnerError::InvalidArgument("--steps requires a number".into()))?;
                parsed.steps = Some(steps);
            }
            "--live" => parsed.live = true,
            other => {
                return Err(RunnerError::InvalidArgument(format!("unknown argument '{}'", other)));
            }
        }
        i += 1;
    }

    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let mut config = match &args.config_path {
        Some(path) => RunnerConfig::from_file(path)?,
        None => RunnerConfig::demo()?,
    };

    if args.live {
        run_live(config).await
    } else {
        if let Some(steps) = args.steps {
            config.simulation.steps = steps;
        }
        let results = YieldSimulation::new(&config)?.run();
        println!("{}", serde_json::to_string_pretty(&results)?);
        Ok(())
    }
}

/// Keeper on wall-clock time; strategies accrue yield for real elapsed time
async fn run_live(config: RunnerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bootstrap = VaultBootstrap::with_clock(&config, Arc::new(SystemClock))?;
    let keeper = Keeper::new(bootstrap.vault.clone(), config.keeper.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let strategies = bootstrap.strategies.clone();
    let interval_ms = config.keeper.interval_ms;
    let accrual_rx = shutdown_rx.clone();
    let accrual = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
        let mut last = Instant::now();
        loop {
            interval.tick().await;
            if *accrual_rx.borrow() {
                break;
            }
            let elapsed = chrono::Duration::from_std(last.elapsed()).unwrap_or_default();
            last = Instant::now();
            for (_, strategy) in &strategies {
                strategy.accrue(elapsed);
            }
        }
    });

    let keeper_handle = tokio::spawn(keeper.run(shutdown_rx));

    log::info!("Keeper running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(true);

    let stats = keeper_handle.await?;
    accrual.await?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!("{}", bootstrap.vault.snapshot()?.to_json()?);
    Ok(())
}
