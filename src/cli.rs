//! `clap` argument grammars for the three thin CLI collaborators.
//! Argument parsing is kept out of the library's core, so these structs
//! are the only thing the `src/bin/*` entry points need to dispatch from.

use std::path::PathBuf;

use clap::Parser;

/// `packer [-z <percent>] [-s] <archive> (<file> <item>)+`
#[derive(Parser, Debug)]
#[command(author, version, about = "Packs files into a Pack archive", long_about = None)]
pub struct PackerArgs {
    /// Compression threshold as an integer percent (0-100). 0 always
    /// compresses if the codec succeeds; 100 never stores compressed.
    #[arg(short = 'z', long = "zip-threshold", default_value_t = 10, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub zip_threshold_percent: u8,

    /// Use the fast codec instead of the default high-ratio codec.
    #[arg(short = 's', long = "speed")]
    pub prefer_speed: bool,

    /// Print per-item and summary progress.
    #[arg(short = 'p', long = "progress")]
    pub print_progress: bool,

    /// Output archive path.
    pub archive_path: PathBuf,

    /// Alternating `<file-path> <item-path>` pairs.
    #[arg(required = true, num_args = 2.., value_names = ["FILE_PATH", "ITEM_PATH"])]
    pub pairs: Vec<String>,
}

/// `unpacker <archive>`
#[derive(Parser, Debug)]
#[command(author, version, about = "Unpacks a Pack archive", long_about = None)]
pub struct UnpackerArgs {
    /// Archive to extract.
    pub archive_path: PathBuf,

    /// Directory to extract into (defaults to the current directory).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Reader thread slots to unpack with concurrently.
    #[arg(short = 't', long = "threads", default_value_t = 4)]
    pub thread_count: u32,

    /// Print per-item and summary progress.
    #[arg(short = 'p', long = "progress")]
    pub print_progress: bool,
}

/// `pack-info <archive>`
#[derive(Parser, Debug)]
#[command(author, version, about = "Prints Pack archive header and item metadata", long_about = None)]
pub struct PackInfoArgs {
    /// Archive to inspect.
    pub archive_path: PathBuf,
}
