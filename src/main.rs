// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use webcam_recorder::{QualityPreset, Resolution};

mod cli;

#[derive(Parser)]
#[command(name = "webcam-recorder")]
#[command(about = "USB webcam preview and recording")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List {
        /// Use the synthetic test-pattern backend instead of real devices
        #[arg(long)]
        synthetic: bool,
    },

    /// Record a video
    Record {
        /// Camera index to use (from 'webcam-recorder list')
        #[arg(short, long)]
        camera: Option<u32>,

        /// Capture resolution, e.g. 1280x720
        #[arg(short, long)]
        resolution: Option<Resolution>,

        /// Target frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Preferred codec tag (avc1, mp4v, X264, MJPG, XVID)
        #[arg(long)]
        codec: Option<String>,

        /// Quality preset scaling the bitrate
        #[arg(short, long, value_enum)]
        quality: Option<QualityPreset>,

        /// Recording duration in seconds (default: until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Output directory (default: last used, then ~/Videos/webcam-recorder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the synthetic test-pattern backend instead of real devices
        #[arg(long)]
        synthetic: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=webcam_recorder=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { synthetic } => cli::list_cameras(synthetic),
        Commands::Record {
            camera,
            resolution,
            fps,
            codec,
            quality,
            duration,
            output,
            synthetic,
        } => cli::record_video(cli::RecordArgs {
            camera,
            resolution,
            fps,
            codec,
            quality,
            duration,
            output,
            synthetic,
        }),
    }
}
