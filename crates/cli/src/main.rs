//! `docvault`: store, fetch and maintain chunked documents from the command line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docvault::{BatchReport, DocumentVault, SweepStats};
use docvault_core::config::AppConfig;
use docvault_core::payload::base64_body;
use docvault_core::{DocumentDescriptor, DocumentId, DocumentMetadata, encode_payload};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "Chunked document storage for record-size-limited stores")]
#[command(version)]
struct Cli {
    /// Config file path (optional; DOCVAULT_ environment variables override it)
    #[arg(long, env = "DOCVAULT_CONFIG", default_value = "docvault.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// File to store
    file: PathBuf,

    /// Stored filename (default: the input file name)
    #[arg(long)]
    filename: Option<String>,

    /// MIME type of the document
    #[arg(long, default_value = docvault_core::DEFAULT_CONTENT_TYPE)]
    content_type: String,

    /// Readable prefix of the generated id
    #[arg(long)]
    label: Option<String>,

    /// Owner reference as key=value (repeatable)
    #[arg(long = "ref", value_parser = parse_owner_ref)]
    refs: Vec<(String, String)>,

    /// Store bare base64 instead of a data URI
    #[arg(long)]
    bare: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file and print its document id
    Store(StoreArgs),
    /// Reconstruct a document into a local file
    Get {
        id: String,
        /// Output directory (default: vault.download_dir)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print document metadata
    Show {
        id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print a document as a data URI
    Inline { id: String },
    /// Check that documents are complete and consistent
    Verify {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// List documents by owner reference, newest first
    Find { key: String, value: String },
    /// Reconstruct many documents into a directory
    Export {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Output directory (default: vault.download_dir)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Documents processed concurrently (default: vault.batch_concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Delete chunks left behind by interrupted stores
    Sweep {
        /// Report without deleting
        #[arg(long)]
        dry_run: bool,
        /// Minimum orphan age in seconds (default: sweep.grace_period_secs)
        #[arg(long)]
        grace_period_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();
    let mut config = load_config(&config)?;

    if let Commands::Sweep {
        dry_run,
        grace_period_secs,
    } = &command
    {
        config.sweep.dry_run |= *dry_run;
        if let Some(secs) = grace_period_secs {
            config.sweep.grace_period_secs = *secs;
        }
    }

    let vault = DocumentVault::from_config(&config)
        .await
        .context("failed to open document vault")?;
    tracing::debug!(store = %config.store.describe(), "Opened document vault");

    match command {
        Commands::Store(args) => handle_store_command(&vault, args).await,
        Commands::Get { id, output } => {
            let dir = output.unwrap_or_else(|| config.vault.download_dir.clone());
            let path = vault
                .download_to_local(&parse_id(&id)?, &dir)
                .await
                .with_context(|| format!("failed to download document {id}"))?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Show { id, json } => {
            let metadata = vault.metadata(&parse_id(&id)?).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            } else {
                print_metadata(&metadata);
            }
            Ok(())
        }
        Commands::Inline { id } => {
            println!("{}", vault.render_inline(&parse_id(&id)?).await?);
            Ok(())
        }
        Commands::Verify { ids } => handle_verify_command(&vault, &ids).await,
        Commands::Find { key, value } => {
            let documents = vault.find_documents(&key, &value).await?;
            if documents.is_empty() {
                println!("No documents found.");
            }
            for metadata in documents {
                println!(
                    "{}  {}  {}  {}",
                    metadata.document_id,
                    metadata.created_at,
                    metadata.filename,
                    format_bytes(metadata.original_size)
                );
            }
            Ok(())
        }
        Commands::Export {
            ids,
            output,
            concurrency,
        } => {
            let ids = ids.iter().map(|id| parse_id(id)).collect::<Result<Vec<_>>>()?;
            let dir = output.unwrap_or_else(|| config.vault.download_dir.clone());
            let concurrency = concurrency.unwrap_or(config.vault.batch_concurrency as usize);
            let report = vault.export_batch(&ids, &dir, concurrency).await;
            print_export_report(&report);
            if report.failed() > 0 {
                anyhow::bail!("{} of {} documents failed to export", report.failed(), report.len());
            }
            Ok(())
        }
        Commands::Sweep { .. } => {
            let stats = vault.sweeper(&config.sweep).run().await?;
            print_sweep_stats(&stats, config.sweep.dry_run);
            Ok(())
        }
    }
}

/// Load configuration from an optional TOML file plus `DOCVAULT_` environment variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path.display());
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("DOCVAULT_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .context("invalid configuration")?;
    Ok(config)
}

async fn handle_store_command(vault: &DocumentVault, args: StoreArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let filename = match args.filename {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("cannot derive a filename; use --filename"))?,
    };

    let mut descriptor = DocumentDescriptor::new(filename).with_content_type(&args.content_type);
    if let Some(label) = args.label {
        descriptor = descriptor.with_label(label);
    }
    for (key, value) in args.refs {
        descriptor = descriptor.with_ref(key, value);
    }

    let uri = encode_payload(&bytes, &args.content_type);
    let payload = if args.bare { base64_body(&uri) } else { uri.as_str() };

    let id = vault
        .store(payload, &descriptor)
        .await
        .context("failed to store document")?;
    println!("{id}");
    Ok(())
}

async fn handle_verify_command(vault: &DocumentVault, ids: &[String]) -> Result<()> {
    let mut failed = 0usize;
    for id in ids {
        match vault.verify(&parse_id(id)?).await {
            Ok(metadata) => println!("ok      {id}  ({} chunks)", metadata.total_chunks),
            Err(e) => {
                failed += 1;
                let hint = if e.is_retryable() { " (retryable)" } else { "" };
                println!("FAILED  {id}  {e}{hint}");
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} documents failed verification", ids.len());
    }
    Ok(())
}

fn parse_id(id: &str) -> Result<DocumentId> {
    DocumentId::parse(id).with_context(|| format!("invalid document id: {id}"))
}

fn parse_owner_ref(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s}"))?;
    if key.is_empty() || key.contains('.') {
        return Err(format!("invalid reference key: {key:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn print_metadata(metadata: &DocumentMetadata) {
    println!("Document {}", metadata.document_id);
    println!("  Filename: {}", metadata.filename);
    println!("  Content type: {}", metadata.content_type);
    println!("  Chunks: {}", metadata.total_chunks);
    println!(
        "  Payload size: {}",
        format_bytes(metadata.original_size)
    );
    println!("  Created: {}", metadata.created_at);
    if !metadata.owner_refs.is_empty() {
        println!("  Owner refs:");
        for (key, value) in &metadata.owner_refs {
            println!("    {key}: {value}");
        }
    }
}

fn print_export_report(report: &BatchReport<PathBuf>) {
    for item in &report.items {
        match &item.outcome {
            Ok(path) => println!("ok      {}  {}", item.document_id, path.display()),
            Err(e) => println!("FAILED  {}  {e}", item.document_id),
        }
    }
    println!(
        "Exported {} of {} documents.",
        report.succeeded(),
        report.len()
    );
}

fn print_sweep_stats(stats: &SweepStats, dry_run: bool) {
    if dry_run {
        println!("Orphan sweep (dry run)");
    } else {
        println!("Orphan sweep");
    }
    println!("  Chunks scanned: {}", stats.scanned_chunks);
    println!("  Orphaned documents: {}", stats.orphaned_documents);
    println!("  Chunks deleted: {}", stats.deleted_chunks);
    println!("  Skipped (within grace period): {}", stats.skipped_recent);
    println!("  Errors: {}", stats.errors);
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}
