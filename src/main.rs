//! blogkv CLI - manage blobs and backups in a blog's key-value store
//!
//! Works against a local JSON store file by default, or a remote REST
//! namespace when built with the `http-store` feature.

use blogkv::backup::{BackupArchive, BackupClient, BackupService};
use blogkv::blob::extension_of;
use blogkv::{BlobStore, Config, FileStore, KvStore, Upload};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blogkv")]
#[command(about = "Chunked blob storage and paged backup for a blog's key-value store")]
#[command(version)]
struct Cli {
    /// Path to the store file (default: $BLOGKV_STORE or <data dir>/blogkv/store.json)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Base URL of a remote KV namespace instead of a local file
    #[cfg(feature = "http-store")]
    #[arg(long, env = "BLOGKV_HTTP_URL")]
    remote: Option<String>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    // === Blob Commands ===
    /// Upload a file
    Upload {
        /// File to upload
        path: PathBuf,
        /// MIME type (guessed from the extension if omitted)
        #[arg(short, long)]
        content_type: Option<String>,
    },

    /// Download a blob
    Get {
        /// Storage filename
        filename: String,
        /// Where to write the bytes
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Delete a blob and all of its chunks
    Delete {
        /// Storage filename
        filename: String,
    },

    /// List blobs, newest first
    List {
        /// Also report whether each blob is referenced
        #[arg(short, long)]
        usage: bool,
    },

    // === Backup Commands ===
    /// Show the keys a full backup would contain
    Keys,

    /// Export the whole store to a backup file
    Backup {
        /// Backup file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Restore a backup file into the store
    Restore {
        /// Backup file to read
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    if let Err(e) = run(cli).await {
        let _ = output(
            &format,
            &serde_json::json!({
                "status": "error",
                "message": format!("{:#}", e)
            }),
        );
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let store = open_store(&cli).await?;

    match cli.command {
        Commands::Upload { path, content_type } => {
            let bytes = tokio::fs::read(&path).await?;
            let original_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let content_type = content_type.unwrap_or_else(|| guess_content_type(&original_name));
            let blobs = BlobStore::new(store, config)?;
            let receipt = blobs
                .upload(Upload::new(bytes, content_type, original_name))
                .await?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "url": receipt.url,
                    "filename": receipt.filename
                }),
            )?;
        }

        Commands::Get { filename, output: path } => {
            let blobs = BlobStore::new(store, config)?;
            let blob = blobs.fetch(&filename).await?;
            tokio::fs::write(&path, &blob.bytes).await?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "filename": filename,
                    "contentType": blob.meta.content_type,
                    "size": blob.bytes.len(),
                    "path": path.display().to_string()
                }),
            )?;
        }

        Commands::Delete { filename } => {
            let blobs = BlobStore::new(store, config)?;
            blobs.delete(&filename).await?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "filename": filename
                }),
            )?;
        }

        Commands::List { usage } => {
            let blobs = BlobStore::new(store, config)?;
            let images = if usage {
                serde_json::to_value(blobs.list_usage().await?)?
            } else {
                serde_json::to_value(blobs.list().await?)?
            };
            let count = images.as_array().map(|a| a.len()).unwrap_or(0);
            output(
                &cli.format,
                &serde_json::json!({
                    "count": count,
                    "images": images
                }),
            )?;
        }

        Commands::Keys => {
            let service = BackupService::new(store, config)?;
            let plan = service.enumerate_keys().await?;
            output(&cli.format, &serde_json::to_value(plan)?)?;
        }

        Commands::Backup { output: path } => {
            let service = BackupService::new(store, config.clone())?;
            let client = BackupClient::new(service, &config);
            let archive = client.export_all().await?;
            tokio::fs::write(&path, serde_json::to_vec(&archive)?).await?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "keys": archive.data.len(),
                    "path": path.display().to_string()
                }),
            )?;
        }

        Commands::Restore { input } => {
            let raw = tokio::fs::read_to_string(&input).await?;
            let archive: BackupArchive = serde_json::from_str(&raw)?;
            let service = BackupService::new(store, config.clone())?;
            let client = BackupClient::new(service, &config);
            let summary = client.import_all(&archive).await?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "restoredKeys": summary.restored_keys,
                    "attempts": summary.attempts
                }),
            )?;
        }
    }

    Ok(())
}

async fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn KvStore>> {
    #[cfg(feature = "http-store")]
    if let Some(url) = &cli.remote {
        let token = std::env::var("BLOGKV_HTTP_TOKEN").ok();
        return Ok(Arc::new(blogkv::HttpStore::new(url, token)?));
    }

    let path = match &cli.store {
        Some(path) => path.clone(),
        None => blogkv::config::default_store_path()?,
    };
    Ok(Arc::new(FileStore::open(path).await?))
}

fn guess_content_type(name: &str) -> String {
    let mime = match extension_of(name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("bmp") => "image/bmp",
        Some("glb") => "model/gltf-binary",
        Some("gltf") => "model/gltf+json",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

fn output(format: &OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(value)?);
        }
        OutputFormat::Text => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}
