use clap::Parser;
use std::path::PathBuf;

/// Create an EdenFS image and pack host files into its root.
#[derive(Parser)]
pub struct Cli {
    /// Directory whose regular files are copied into the image root
    #[arg(long, short)]
    pub source: Option<PathBuf>,

    /// Output directory for the image
    #[arg(long, short = 'O')]
    pub out_dir: PathBuf,

    /// Image size in 512-byte blocks
    #[arg(long, default_value_t = 16 * 2048)]
    pub blocks: u32,
}
