use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tempo_tracker::{
    analysis::{AnalysisResult, FeatureTrack},
    AudioLoader, Config, OfflineAnalyzer, TempoMethod,
};

#[derive(Parser)]
#[command(
    name = "tempo-tracker",
    version,
    about = "Estimate the tempo of audio files or live input",
    long_about = "Tempo-Tracker detects beats from short-time energy and spectral flux and reports a tempo for each, offline for audio files or live from the default input device."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one or more audio files (WAV, MP3, FLAC, OGG, M4A)
    Analyze {
        /// Audio files to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Primary tempo method (interval, autocorrelation)
        #[arg(short, long)]
        method: Option<TempoMethod>,
    },

    /// Detect beats from the default input device (requires the `capture` feature)
    Listen {
        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(short, long)]
        seconds: Option<u64>,
    },

    /// Write the default configuration to a TOML file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting Tempo-Tracker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Command::Analyze { files, method } => analyze(config, files, method).await,
        Command::Listen { seconds } => listen(config, seconds).await,
        Command::InitConfig { path } => {
            Config::default().save_to_file(&path)?;
            info!("Default configuration written to {:?}", path);
            Ok(())
        }
    }
}

async fn analyze(mut config: Config, files: Vec<PathBuf>, method: Option<TempoMethod>) -> Result<()> {
    if let Some(method) = method {
        config.analysis.tempo_method = method;
    }
    let analyzer = OfflineAnalyzer::with_config(config.analysis.clone())?;

    let mut names = Vec::new();
    let mut buffers = Vec::new();
    for path in &files {
        match AudioLoader::load(path).await {
            Ok(loaded) => {
                names.push(path.display().to_string());
                buffers.push(loaded.buffer);
            }
            Err(e) => warn!("Skipping {:?}: {}", path, e.user_message()),
        }
    }

    if buffers.is_empty() {
        anyhow::bail!("None of the {} input file(s) could be loaded", files.len());
    }

    let threads = config.batch.threads;
    let results = tokio::task::spawn_blocking(move || {
        analyzer.analyze_batch_with_threads(&buffers, threads)
    })
    .await??;

    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(result) => print_result(name, &result),
            Err(e) => warn!("{}: {}", name, e.user_message()),
        }
    }

    Ok(())
}

fn print_result(name: &str, result: &AnalysisResult) {
    println!("{} ({:.2}s @ {} Hz)", name, result.duration, result.sample_rate);
    print_track(&result.energy);
    print_track(&result.flux);
    println!("  combined: {:.1} BPM", result.combined_bpm());
    if let Some(gap) = result.disagreement_bpm() {
        println!("  energy/flux disagreement: {:.1} BPM", gap);
    }
}

fn print_track(track: &FeatureTrack) {
    println!(
        "  {:<6} {:>4} beats  {:>6.1} BPM ({})  cross-check {:>6.1} BPM ({})",
        track.kind().to_string(),
        track.beats.len(),
        track.tempo.bpm,
        track.tempo.method,
        track.cross_check.bpm,
        track.cross_check.method
    );
}

#[cfg(feature = "capture")]
async fn listen(config: Config, seconds: Option<u64>) -> Result<()> {
    use std::time::Duration;
    use tempo_tracker::realtime::LiveCapture;

    let (capture, mut beats) = LiveCapture::open(config.streaming)?;
    let handle = capture.handle().clone();
    handle.start();
    info!("Listening at {} Hz, press Ctrl-C to stop", capture.sample_rate());

    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                while let Some(beat) = beats.try_recv() {
                    println!(
                        "beat {:>4} at {:>7.2}s  energy {:>8.3}  tempo {:>6.1} BPM",
                        beat.index, beat.timestamp, beat.energy, beat.tempo_bpm
                    );
                }
                if !handle.is_running() {
                    warn!("Session ended by the capture stream");
                    break;
                }
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    capture.pause()?;
    let summary = handle.stop().or_else(|| handle.last_summary());
    if let Some(summary) = summary {
        println!(
            "Session started {}: {:.1}s, {} beats, average tempo {:.1} BPM",
            summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            summary.duration_secs,
            summary.beat_count,
            summary.average_tempo_bpm
        );
    }
    if handle.dropped_events() > 0 {
        warn!("{} beat events were dropped", handle.dropped_events());
    }

    Ok(())
}

#[cfg(not(feature = "capture"))]
async fn listen(_config: Config, _seconds: Option<u64>) -> Result<()> {
    anyhow::bail!("Live input is not available: rebuild with `--features capture`")
}
