use std::path::PathBuf;

use clap::Parser;
use reddit_media::config::Overrides;

/// Download every image, gif and video referenced by saved Reddit post JSON
#[derive(Parser)]
#[command(name = "reddit-media")]
#[command(about = "Extracts media from saved Reddit JSON and downloads it at the highest available resolution", long_about = None)]
pub struct Cli {
    /// Directory holding the `.json` files to scan (default: ./input)
    #[arg(short, long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Exact directory to write into, instead of a timestamped one
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Parent of the timestamped run directory (default: ./downloads)
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Number of parallel downloads (default: 16)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-download timeout in seconds (default: 30)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Optional TOML config file
    #[arg(short, long, value_name = "FILE", env = "REDDIT_MEDIA_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            input_dir: self.input.clone(),
            output_root: self.output_root.clone(),
            output_dir: self.output.clone(),
            workers: self.workers,
            timeout_secs: self.timeout,
        }
    }
}
