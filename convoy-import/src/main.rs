//! convoy-import - Main entry point
//!
//! Imports exported support conversations into the chat platform.
//!
//! ```text
//! convoy-import [--config FILE] [--adapter NAME] [--messages FILE]
//!               [--resume] [--status-file FILE] [--plan NAME] INPUT
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use convoy_common::{config, logging};
use convoy_import::models::ImportSummary;
use convoy_import::services::{ConversationImporter, HttpChatClient, Pipeline, StatusRegistry};
use convoy_import::{AdapterRegistry, CliOverrides, ImportConfig};

/// Command-line arguments for convoy-import
#[derive(Parser, Debug)]
#[command(name = "convoy-import")]
#[command(about = "Import exported support conversations into a chat platform")]
#[command(version)]
struct Args {
    /// Conversations file (JSON array)
    input: PathBuf,

    /// Bootstrap TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vendor adapter (zendesk, groovehq, helpscout, tidio, whmcs, gorgias)
    #[arg(short, long, env = "CONVOY_ADAPTER")]
    adapter: Option<String>,

    /// Separate messages export, grouped with INPUT by the adapter
    #[arg(short, long)]
    messages: Option<PathBuf>,

    /// Skip conversations already imported by a previous run
    #[arg(long)]
    resume: bool,

    /// Checkpoint file
    #[arg(long, env = "CONVOY_STATUS_FILE")]
    status_file: Option<PathBuf>,

    /// Website plan (basic, pro, unlimited)
    #[arg(long)]
    plan: Option<String>,

    /// Target website identifier
    #[arg(long)]
    website_id: Option<String>,

    /// Plugin URN, used as the default message origin
    #[arg(long)]
    plugin_urn: Option<String>,

    /// Plugin token identifier
    #[arg(long)]
    identifier: Option<String>,

    /// Plugin token key
    #[arg(long)]
    key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init_tracing(&toml_config.logging, "convoy_import")?;

    info!("Starting convoy-import v{}", env!("CARGO_PKG_VERSION"));

    let import_config = ImportConfig::resolve(
        &toml_config,
        &CliOverrides {
            website_id: args.website_id.clone(),
            plugin_urn: args.plugin_urn.clone(),
            identifier: args.identifier.clone(),
            key: args.key.clone(),
            website_plan: args.plan.clone(),
            status_path: args.status_file.clone(),
            resume: args.resume,
        },
    )?;

    let adapter = match args.adapter.as_deref() {
        Some(name) => Some(AdapterRegistry::with_builtin().resolve(name)?),
        None => None,
    };
    let groups = adapter.as_ref().is_some_and(|a| a.capabilities().group);
    if args.messages.is_some() && !groups {
        bail!("--messages requires an adapter that groups conversations (tidio, gorgias)");
    }

    info!(
        plan = import_config.plan.name,
        resume = import_config.resume,
        adapter = adapter.as_ref().map(|a| a.name()).unwrap_or("none"),
        "Configuration resolved"
    );

    let registry = StatusRegistry::load(&import_config.status_path).with_context(|| {
        format!(
            "Failed to load status file {}",
            import_config.status_path.display()
        )
    })?;
    let client = HttpChatClient::new(import_config.chat_client_config())
        .context("Failed to initialize chat API client")?;

    let importer = ConversationImporter::new(
        Arc::new(client),
        adapter,
        registry,
        import_config.importer_settings(),
    );

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel_token.clone()));

    let mut pipeline =
        Pipeline::new(importer, import_config.backpressure).with_cancel_token(cancel_token);

    let summary = if groups {
        pipeline
            .import_grouped(&args.input, args.messages.as_deref())
            .await?
    } else {
        pipeline.import_file(&args.input).await?
    };

    print_summary(&summary);
    Ok(())
}

/// Cancel the import between conversations on Ctrl+C
async fn cancel_on_ctrl_c(token: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("Received Ctrl+C, stopping after the current conversation");
            token.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}

fn print_summary(summary: &ImportSummary) {
    println!("Processed: {}", summary.processed);
    println!("Imported:  {}", summary.imported);
    println!("Skipped:   {}", summary.skipped);
    println!("Failed:    {}", summary.failed);
    for failure in &summary.failures {
        println!(
            "  - {}: {}",
            failure.conversation_id.as_deref().unwrap_or("(no id)"),
            failure.reason
        );
    }
    if summary.closed_early {
        println!("Stopped before the end of the input");
    }
}
