mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ossemu_storage::config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_BUCKETS, DEFAULT_MAX_OBJECT_SIZE, DEFAULT_STORE_ROOT,
};
use ossemu_storage::{OssStore, StoreConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ossemu", about = "Local object storage emulator")]
struct Cli {
    #[arg(long, env = "OSSEMU_STORE", default_value = DEFAULT_STORE_ROOT)]
    store: PathBuf,

    #[arg(long, env = "OSSEMU_MAX_OBJECT_SIZE", default_value_t = DEFAULT_MAX_OBJECT_SIZE)]
    max_object_size: u64,

    #[arg(long, env = "OSSEMU_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long, env = "OSSEMU_MAX_BUCKETS", default_value_t = DEFAULT_MAX_BUCKETS)]
    max_buckets: usize,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create a bucket
    Mb {
        bucket: String,
        #[arg(long)]
        acl: Option<String>,
    },
    /// Remove an empty bucket
    Rb { bucket: String },
    /// List buckets
    Buckets,
    /// List objects in a bucket
    Ls {
        bucket: String,
        #[arg(long, default_value = "")]
        prefix: String,
        #[arg(long, default_value = "")]
        delimiter: String,
        #[arg(long)]
        max_keys: Option<usize>,
        #[arg(long, default_value = "")]
        marker: String,
    },
    /// Upload a file as an object
    Put {
        bucket: String,
        key: String,
        file: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download an object, optionally a byte range such as `bytes=0-99`
    Get {
        bucket: String,
        key: String,
        #[arg(long)]
        range: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print object metadata
    Head { bucket: String, key: String },
    /// Delete an object
    Rm { bucket: String, key: String },
    /// Copy an object
    Cp {
        src_bucket: String,
        src_key: String,
        dst_bucket: String,
        dst_key: String,
    },
    /// Upload a file through a multipart upload
    Mpu {
        bucket: String,
        key: String,
        file: PathBuf,
        #[arg(long, default_value_t = 5 * 1024 * 1024)]
        part_size: u64,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// List in-flight multipart uploads
    Uploads {
        bucket: String,
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Abort a multipart upload
    Abort {
        bucket: String,
        key: String,
        upload_id: String,
    },
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive("ossemu=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = StoreConfig::new(cli.store)
        .with_max_object_size(cli.max_object_size)
        .with_chunk_size(cli.chunk_size)
        .with_max_buckets(cli.max_buckets);
    let store = OssStore::new(config).await?;
    info!(root = %store.config().root.display(), "using store");

    commands::run(&store, cli.command).await
}
