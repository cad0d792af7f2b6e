// RepWatch: Host Capture Replay
//
// Replays a raw IMU capture through the pipeline with the stub classifier
// and prints the repetition tally.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use repwatch::aggregator::AggregationPolicy;
use repwatch::capture;
use repwatch::ei::default_classifier;
use repwatch::engine::{EngineConfig, LogSink, RepEngine};
use repwatch::events::PostureClass;

#[derive(Parser)]
#[command(name = "repwatch", version)]
#[command(about = "Replay a raw IMU capture through the push-up counter")]
struct Args {
    /// Capture of little-endian f32 frames: ax ay az gx gy gz
    capture: PathBuf,

    /// Aggregation policy for per-window verdicts
    #[arg(long, default_value = "weighted", value_parser = parse_policy)]
    policy: AggregationPolicy,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_policy(name: &str) -> Result<AggregationPolicy, String> {
    AggregationPolicy::from_name(name)
        .ok_or_else(|| format!("unknown policy '{name}' (expected 'weighted' or 'latest')"))
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = EngineConfig::default();
    config.repetition.policy = args.policy;
    config.validate()?;

    let bytes = std::fs::read(&args.capture)
        .with_context(|| format!("reading capture {}", args.capture.display()))?;
    log::info!(
        "Replaying {} ({} bytes, policy {})",
        args.capture.display(),
        bytes.len(),
        args.policy.name()
    );

    let mut engine = RepEngine::new(config);
    let mut classifier = default_classifier();
    let summary = capture::replay(&bytes, &mut engine, &mut classifier, &mut LogSink);

    println!(
        "{} frames, {} windows evaluated, {} abandoned",
        summary.frames, summary.windows_evaluated, summary.abandoned
    );
    if summary.trailing_bytes > 0 {
        println!("ignored {} trailing bytes", summary.trailing_bytes);
    }
    println!("repetitions: {}", summary.counters.total);
    for class in PostureClass::ALL {
        println!("  {:<13} {}", class.label(), summary.counters.count(class));
    }
    println!("  {:<13} {}", "unclassified", summary.counters.unclassified);
    Ok(())
}
