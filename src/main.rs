//! agc-cosim entry point: CLI wiring and config-driven co-simulation.

use std::path::Path;
use std::process;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agc_cosim::config::ScenarioConfig;
use agc_cosim::runner::run_scenario;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    curve_path: Option<String>,
    out: Option<String>,
    seed_override: Option<u64>,
}

fn print_help() {
    eprintln!("agc-cosim: dispatch / dynamics co-simulation with AGC");
    eprintln!();
    eprintln!("Usage: agc-cosim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>   Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>     Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --curve <path>      Load / PV / wind multipliers CSV (overrides the scenario)");
    eprintln!("  --out <path>        Export per-second results to CSV");
    eprintln!("  --seed <u64>        Override random seed");
    eprintln!("  --help              Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

fn take_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires a {what} argument");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        curve_path: None,
        out: None,
        seed_override: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path = Some(take_value(&args, i, "--scenario", "path"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(take_value(&args, i, "--preset", "name"));
            }
            "--curve" => {
                i += 1;
                cli.curve_path = Some(take_value(&args, i, "--curve", "path"));
            }
            "--out" => {
                i += 1;
                cli.out = Some(take_value(&args, i, "--out", "path"));
            }
            "--seed" => {
                i += 1;
                let raw = take_value(&args, i, "--seed", "u64");
                if let Ok(s) = raw.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    // RUST_LOG=debug shows every AGC write
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = parse_args();
    init_tracing();

    // --scenario takes priority, then --preset, then baseline default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::baseline()
    };

    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }
    if let Some(path) = cli.curve_path {
        scenario.curve.path = Some(path);
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let output = match run_scenario(&scenario, cli.out.as_deref().map(Path::new)) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    println!("{}", output.kpi);
    for (k, recorder) in output.recorders.iter().enumerate() {
        let recorder = recorder.borrow();
        for (id, peak) in recorder.peaks() {
            println!("recorder {k}: peak current {id} = {peak:.4} pu");
        }
    }
    for (k, responder) in output.responders.iter().enumerate() {
        let responder = responder.borrow();
        let summary = responder.summary();
        match summary.engaged_at {
            Some(t) => println!(
                "ffr {k}: {} engaged at t={t:.2}s, peak injection = {:.4} pu, peak absorption = {:.4} pu, energy = {:.4} pu.s, {} trace samples",
                responder.storage,
                summary.peak_injection,
                summary.peak_absorption,
                summary.energy_pu_s,
                responder.trace().len()
            ),
            None => println!(
                "ffr {k}: {} never left the {:.3} Hz deadband",
                responder.storage, responder.deadband_hz
            ),
        }
    }
    if let Some(ref path) = cli.out {
        eprintln!("Results written to {path}");
    }
}
