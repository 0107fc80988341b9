// Composite a single foreground image over a background image

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use greenscreen_compositor::{
    config::Config,
    keying::ChromaKeyCompositor,
    video::{FrameSource, MemoryClip},
};

#[derive(Parser)]
#[command(
    name = "key-still",
    version,
    about = "Key the greenscreen out of one image and place it over another"
)]
struct Cli {
    /// Greenscreen image
    #[arg(short, long)]
    foreground: PathBuf,

    /// Replacement background image
    #[arg(short, long)]
    background: PathBuf,

    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    config.keying.validate()?;

    let foreground = load_still(&cli.foreground, config.video.default_fps)?;
    let background = load_still(&cli.background, config.video.default_fps)?;

    let compositor = ChromaKeyCompositor::new(config.keying);
    let result = compositor.composite(&foreground, &background)?;

    result
        .save(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!(
        "Saved {}x{} composite to {:?}",
        result.width(),
        result.height(),
        cli.output
    );
    Ok(())
}

fn load_still(path: &Path, fps: f64) -> Result<greenscreen_compositor::Frame> {
    let mut clip = MemoryClip::from_image(path, fps)?;
    clip.next_frame()?
        .with_context(|| format!("{} has no frames", path.display()))
}
