//! `pricegate-serve`: HTTP prediction service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pricegate_core::{init_tracing, wants_json, DEFAULT_MODEL_NAME};
use pricegate_serve::{serve, AppState, ModelSource};
use pricegate_store::FsObjectStore;
use tracing::Level;

#[derive(Parser)]
#[command(name = "pricegate-serve")]
#[command(about = "Serve house-price predictions from one model artifact", long_about = None)]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PRICEGATE_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Serve this artifact file instead of the store's latest version
    #[arg(long, env = "PRICEGATE_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Version label reported for --model-path
    #[arg(long, default_value = pricegate_serve::LOCAL_VERSION)]
    model_version: String,

    /// Root directory of the filesystem object store
    #[arg(long, env = "PRICEGATE_STORAGE_ROOT", default_value = "storage")]
    storage_root: PathBuf,

    /// Bucket name inside the object store
    #[arg(long, env = "PRICEGATE_BUCKET", default_value = "house-price-mlops")]
    bucket: String,

    /// Model name used for storage keys
    #[arg(long, default_value = DEFAULT_MODEL_NAME)]
    model_name: String,

    /// Log format (`text` or `json`)
    #[arg(long, env = "PRICEGATE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    init_tracing(wants_json(args.log_format.as_deref()), level);

    let source = match args.model_path {
        Some(path) => ModelSource::Path {
            path,
            version: args.model_version,
        },
        None => {
            let store = FsObjectStore::new(&args.storage_root, &args.bucket)
                .with_context(|| format!("open object store at {:?}", args.storage_root))?;
            ModelSource::Latest {
                store: Arc::new(store),
                model_name: args.model_name,
            }
        }
    };

    let state = AppState::load(&source).await;
    serve(args.bind, state)
        .await
        .with_context(|| format!("serve on {}", args.bind))
}
