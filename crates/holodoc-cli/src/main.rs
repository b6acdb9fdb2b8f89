//! holodoc: command-line client for the HoloDoc document-matching server.
//!
//! `match` runs a full capture through a [`Session`] (optimistic record,
//! match-or-create, optional edit, reconciliation). The other commands issue
//! one request and print the reply.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use holodoc_core::{
    CameraFrame, DocumentEvent, DocumentFields, DocumentId, DocumentRecord, DocumentService,
    Endpoint, EventEnvelope, PendingEdit, Reply, Rgb, SuccessPolicy,
};
use holodoc_sync::{HttpDocumentService, ServerConfig, Session};

#[derive(Parser)]
#[command(name = "holodoc")]
#[command(author, version, about = "Client for the HoloDoc document-matching server")]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ~/.config/holodoc/server.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server host, overrides the config
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port, overrides the config
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Success policy: strict or body-present
    #[arg(long, global = true)]
    policy: Option<SuccessPolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers
    Ping,

    /// Match an image against known documents, creating one if needed
    Match {
        /// JPEG or PNG image of the page
        image: PathBuf,

        #[command(flatten)]
        fields: FieldArgs,

        /// Print session events as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Replace the metadata of a known document (all four fields)
    Update {
        /// Document id
        id: String,

        #[command(flatten)]
        fields: UpdateArgs,
    },

    /// Replace the photo of a known document
    Photo {
        /// Document id
        id: String,

        /// JPEG or PNG image
        image: PathBuf,
    },

    /// Link two documents
    Link { first: String, second: String },

    /// Remove a document from its link group
    Unlink { id: String },

    /// Ask whether two documents are linked
    Connected { first: String, second: String },

    /// Set the background colour the page detector ignores
    Background { r: u8, g: u8, b: u8 },

    /// Show or persist the server configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML-ready values
    Show,
    /// Write the effective configuration to the config file
    Save,
    /// Print the config file location
    Path,
}

#[derive(clap::Args, Default)]
struct FieldArgs {
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    date: Option<String>,
}

// The server overwrites every field, so an update must carry all of them
#[derive(clap::Args)]
struct UpdateArgs {
    #[arg(long)]
    label: String,
    #[arg(long)]
    author: String,
    #[arg(long)]
    description: String,
    #[arg(long)]
    date: String,
}

impl From<UpdateArgs> for DocumentFields {
    fn from(args: UpdateArgs) -> Self {
        DocumentFields::new(args.label, args.author, args.description, args.date)
    }
}

impl FieldArgs {
    fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.author.is_none()
            && self.description.is_none()
            && self.date.is_none()
    }

    fn apply(self, mut fields: DocumentFields) -> DocumentFields {
        if let Some(label) = self.label {
            fields.label = label;
        }
        if let Some(author) = self.author {
            fields.author = author;
        }
        if let Some(description) = self.description {
            fields.description = description;
        }
        if let Some(date) = self.date {
            fields.date = date;
        }
        fields
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ServerConfig::default_config_path);
    let config = effective_config(&cli, &config_path)?;

    match cli.command {
        Commands::Ping => {
            let service = HttpDocumentService::new(config)?;
            report(service.ping().await)
        }
        Commands::Match {
            image,
            fields,
            events,
        } => cmd_match(config, &image, fields, events).await,
        Commands::Update { id, fields } => {
            let service = HttpDocumentService::new(config)?;
            let edit = PendingEdit {
                identity: DocumentId::new(id)?,
                fields: fields.into(),
            };
            report(service.update_document(&edit).await)
        }
        Commands::Photo { id, image } => {
            let service = HttpDocumentService::new(config)?;
            let frame = load_frame(&image)?;
            report(service.update_photo(&DocumentId::new(id)?, &frame).await)
        }
        Commands::Link { first, second } => {
            let service = HttpDocumentService::new(config)?;
            report(
                service
                    .create_link(&DocumentId::new(first)?, &DocumentId::new(second)?)
                    .await,
            )
        }
        Commands::Unlink { id } => {
            let service = HttpDocumentService::new(config)?;
            report(service.remove_link(&DocumentId::new(id)?).await)
        }
        Commands::Connected { first, second } => {
            let service = HttpDocumentService::new(config)?;
            report(
                service
                    .are_connected(&DocumentId::new(first)?, &DocumentId::new(second)?)
                    .await,
            )
        }
        Commands::Background { r, g, b } => {
            let service = HttpDocumentService::new(config)?;
            report(service.set_background_color(Rgb::new(r, g, b)).await)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("host           = {}", config.host);
                println!("port           = {}", config.port);
                println!("content_type   = {}", config.content_type);
                println!("timeout_secs   = {}", config.timeout_secs);
                println!("success_policy = {}", config.success_policy);
                println!("jpeg_quality   = {}", config.jpeg_quality);
                println!("base_url       = {}", config.base_url());
                Ok(())
            }
            ConfigAction::Save => {
                config.save(&config_path)?;
                println!("Saved {}", config_path.display());
                Ok(())
            }
            ConfigAction::Path => {
                println!("{}", config_path.display());
                Ok(())
            }
        },
    }
}

/// Initialize tracing on stderr, or a daily-rotated file when `LOG_FILE` is set.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - env filter (default: holodoc crates at info)
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "holodoc_core=info,holodoc_sync=info,holodoc=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("holodoc.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

fn effective_config(cli: &Cli, path: &Path) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(_) if path.exists() => ServerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        // Not written yet, `config save` creates it
        Some(_) => ServerConfig::from_env(),
        None => ServerConfig::load()?,
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(policy) = cli.policy {
        config.success_policy = policy;
    }
    config.validate()?;
    Ok(config)
}

fn load_frame(path: &Path) -> anyhow::Result<CameraFrame> {
    CameraFrame::open(path).with_context(|| format!("reading {}", path.display()))
}

fn report<T: Debug>(reply: Reply<T>) -> anyhow::Result<()> {
    if !reply.success {
        match reply.failure {
            Some(failure) => bail!("request failed: {}", failure),
            None => bail!("request failed"),
        }
    }
    if let Some(failure) = &reply.failure {
        eprintln!("warning: {}", failure);
    }
    match reply.answer {
        Some(answer) => println!("{:#?}", answer),
        None => println!("ok"),
    }
    Ok(())
}

/// Result of a `match` run: the final record and every session event.
struct MatchReport {
    record: Option<DocumentRecord>,
    events: Vec<EventEnvelope>,
}

impl MatchReport {
    /// First failure the user has to hear about.
    fn failure(&self) -> Option<String> {
        self.events.iter().find_map(|envelope| match &envelope.payload {
            DocumentEvent::IngestFailed { reason, .. } => Some(format!("match failed: {}", reason)),
            DocumentEvent::SyncFailed {
                operation, reason, ..
            } if operation == Endpoint::UpdateDocument.operation() => {
                Some(format!("update failed: {}", reason))
            }
            _ => None,
        })
    }
}

async fn run_match(
    service: Arc<dyn DocumentService>,
    frame: CameraFrame,
    fields: FieldArgs,
) -> anyhow::Result<MatchReport> {
    let mut session = Session::new(service);
    let mut events = session.subscribe();

    let entity = session.capture(frame);
    session.settle().await;

    let current = session
        .record(entity)
        .filter(|record| record.is_durable())
        .map(|record| record.fields().clone());
    if let Some(current) = current {
        if !fields.is_empty() {
            session.edit(entity, fields.apply(current))?;
            session.settle().await;
        }
    }

    let mut collected = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        collected.push(envelope);
    }
    Ok(MatchReport {
        record: session.record(entity).cloned(),
        events: collected,
    })
}

async fn cmd_match(
    config: ServerConfig,
    image: &Path,
    fields: FieldArgs,
    print_events: bool,
) -> anyhow::Result<()> {
    let frame = load_frame(image)?;
    let service: Arc<dyn DocumentService> = Arc::new(HttpDocumentService::new(config)?);
    let report = run_match(service, frame, fields).await?;

    if print_events {
        for envelope in &report.events {
            println!("{}", serde_json::to_string(envelope)?);
        }
    }
    if let Some(failure) = report.failure() {
        bail!("{}", failure);
    }
    if let Some(record) = &report.record {
        println!("{}", record);
    }
    Ok(())
}
