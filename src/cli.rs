use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ossbridge")]
#[command(about = "Object storage operations against the configured OSS backend", long_about = None)]
pub struct Cli {
    /// TOML config file (default: OSS_* environment variables / .env)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a bucket unless it already exists
    MakeBucket {
        bucket: String,
    },

    /// Delete a bucket
    RemoveBucket {
        bucket: String,
    },

    /// Check whether a bucket exists
    BucketExists {
        bucket: String,
    },

    /// Upload a local file
    Put {
        /// Local file to upload
        file: PathBuf,

        /// Target bucket (default: configured bucket)
        #[arg(short, long)]
        bucket: Option<String>,

        /// Object name passed to the naming rule (default: local file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Single unconditional put without ETag retries
        #[arg(long)]
        cover: bool,
    },

    /// Show object metadata
    Stat {
        key: String,

        #[arg(short, long)]
        bucket: Option<String>,
    },

    /// Server-side copy of an object
    Copy {
        bucket: String,
        key: String,
        dest_bucket: String,

        /// Destination key (default: same as source)
        dest_key: Option<String>,
    },

    /// Delete one or more objects
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,

        #[arg(short, long)]
        bucket: Option<String>,
    },

    /// Print the public link of an object
    Link {
        key: String,

        #[arg(short, long)]
        bucket: Option<String>,
    },

    /// Issue a browser direct-upload token
    Token {
        #[arg(short, long)]
        bucket: Option<String>,

        /// Token lifetime in seconds (default: args.expire_time)
        #[arg(short, long)]
        expire: Option<u64>,
    },
}
