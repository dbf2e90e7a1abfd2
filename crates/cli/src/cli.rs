use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a config file; defaults to the per-user config location.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Overrides the listen address from the config file.
    #[arg(short, long, value_name = "ADDR", env = "TESSERA_LISTEN")]
    pub listen: Option<String>,

    /// Overrides the data directory from the config file.
    #[arg(short, long, value_name = "PATH", env = "TESSERA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hashes a file into pieces, persists its hash tree, and serves it until interrupted.
    Seed {
        /// Path to the file to share.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Overrides the piece size (bytes) from the config file.
        #[arg(short, long, value_name = "BYTES")]
        piece_size: Option<usize>,
    },

    /// Downloads a file by root hash from a list of candidate hosts, in order.
    Download {
        /// Root hash of the file to download, hex-encoded.
        #[arg(value_name = "ROOT_HASH")]
        root_hash: String,

        /// Number of pieces the file is divided into.
        #[arg(value_name = "PIECE_COUNT")]
        piece_count: u64,

        /// Candidate hosts, tried in order until one serves the file.
        #[arg(value_name = "HOST", required = true)]
        hosts: Vec<String>,
    },

    /// Runs the server loop only, serving whatever this node already holds.
    Serve,
}
