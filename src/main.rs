use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};

use greenscreen_compositor::{
    config::Config,
    pipeline::{ChromaKeyEngine, InterruptSignal, PipelineState, RunRequest},
};

#[derive(Parser)]
#[command(
    name = "greenscreen-compositor",
    version,
    about = "Replace the greenscreen in a filmed clip with a reference clip",
    long_about = "Keys out the green backdrop of a filmed clip frame by frame, composites the subject over the matching frame of a reference clip and re-attaches the reference audio. Press Ctrl-C to stop early; frames staged so far are kept."
)]
struct Cli {
    /// Reference clip: background frames, frame rate and audio
    #[arg(short, long)]
    reference: PathBuf,

    /// Filmed greenscreen clip
    #[arg(short, long)]
    filmed: PathBuf,

    /// Output video file path
    #[arg(short, long, default_value = "output.avi")]
    output: PathBuf,

    /// Output path for the video with audio (defaults to the output path as .mp4)
    #[arg(long)]
    muxed: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    info!("Starting greenscreen-compositor v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)
                .with_context(|| format!("loading {}", config_path.display()))?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.video.processing_threads)
        .build_global()
    {
        warn!("Could not size the worker pool: {}", e);
    }

    let request = RunRequest {
        reference: cli.reference,
        filmed: cli.filmed,
        output: cli.output,
        muxed: cli.muxed,
    };

    let engine = ChromaKeyEngine::new(config);
    let outcome = engine
        .run(&request, Box::new(InterruptSignal::ctrl_c()))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    match outcome.state {
        PipelineState::Complete => {
            if let Some(video) = &outcome.video {
                info!("Video saved to: {:?}", video);
            }
            match &outcome.muxed {
                Some(muxed) => info!("Video with audio saved to: {:?}", muxed),
                None => info!("No audio attached"),
            }
        }
        _ => info!(
            "Stopped early: {} frames kept in {:?}",
            outcome.frames_staged, outcome.staging_dir
        ),
    }

    Ok(())
}
