use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
};

use clap::{Parser, Subcommand};
use log::{info, warn};
use pitlane::{
    PitlaneError, StrategyConfig, StrategyEngine,
    strategy::StrategicRecommendation,
    telemetry::{ReplayTelemetryProducer, TelemetryProducer, collect_recommendations},
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a telemetry recording through the strategy engine
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        /// Write recommendations as JSON Lines instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit a recommendation every N snapshots
        #[arg(short, long, default_value_t = 1)]
        every: usize,
    },
    /// Print the pit-stop analysis for the final snapshot of a recording
    Pit {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig, PitlaneError> {
    match path {
        Some(path) => StrategyConfig::from_file(path),
        None => Ok(StrategyConfig::from_local_file()
            .unwrap_or_else(|e| {
                warn!("Could not load local config: {}", e);
                None
            })
            .unwrap_or_default()),
    }
}

fn replay(
    input: &Path,
    output: Option<PathBuf>,
    config: StrategyConfig,
    every: usize,
    running: Arc<AtomicBool>,
) -> Result<(), PitlaneError> {
    let producer = ReplayTelemetryProducer::from_file(input)?;
    let mut engine = StrategyEngine::new(config);
    let (recommendation_tx, recommendation_rx) = mpsc::channel::<StrategicRecommendation>();

    let consumer = match output {
        Some(output_file) => {
            thread::spawn(move || writer::write_recommendations(&output_file, recommendation_rx))
        }
        None => thread::spawn(move || {
            let mut count = 0;
            for recommendation in &recommendation_rx {
                count += 1;
                println!(
                    "[{}] {} (confidence {:.2}, risk {})",
                    recommendation.timestamp_ms,
                    recommendation.primary_strategy,
                    recommendation.confidence_level,
                    recommendation.risk_assessment
                );
            }
            Ok::<usize, PitlaneError>(count)
        }),
    };

    let processed =
        collect_recommendations(producer, &mut engine, recommendation_tx, every, running)?;
    let emitted = consumer
        .join()
        .map_err(|_| PitlaneError::TelemetryProducerError {
            description: "Recommendation consumer thread panicked".to_string(),
        })??;

    info!("Replayed {} snapshots, {} recommendations", processed, emitted);
    Ok(())
}

fn pit(input: &Path, config: StrategyConfig) -> Result<(), PitlaneError> {
    let mut producer = ReplayTelemetryProducer::from_file(input)?;
    let mut engine = StrategyEngine::new(config);
    producer.start()?;

    let mut last = None;
    while let Some(snapshot) = producer.telemetry()? {
        if let Some(previous) = last.replace(snapshot) {
            engine.add_snapshot(previous);
        }
    }

    let Some(snapshot) = last else {
        return Err(PitlaneError::InvalidTelemetryFile {
            path: input.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "no snapshots"),
        });
    };

    let recommendation = engine.generate_recommendation(snapshot);
    if let Some(pit_stop) = recommendation.pit_stop {
        let output = serde_json::to_string_pretty(&pit_stop)
            .map_err(|e| PitlaneError::ConfigSerializeError { source: e })?;
        println!("{}", output);
    }
    Ok(())
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    let running = Arc::new(AtomicBool::new(true));
    let handler_running = running.clone();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        handler_running.store(false, Ordering::SeqCst);
    })
    .expect("Could not set Ctrl-C handler");

    match &cli.command {
        Commands::Replay {
            input,
            output,
            config,
            every,
        } => {
            let config = load_config(config.as_deref()).expect("Error while loading config");
            replay(input, output.clone(), config, *every, running)
                .expect("Error while replaying telemetry");
        }
        Commands::Pit { input, config } => {
            let config = load_config(config.as_deref()).expect("Error while loading config");
            pit(input, config).expect("Error while analyzing pit stop");
        }
    };
}
