use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schema_ledger::config::Config;
use schema_ledger::models::{CreateSchemaInput, CreateTransformationInput, NewTermSet, Status};
use schema_ledger::tree::{self, Forest, NestedMap, TermStore};
use schema_ledger::{api, db};

#[derive(Parser)]
#[command(name = "schema-ledger")]
#[command(about = "Versioned schema term trees and cross-schema field mappings")]
struct Cli {
    /// Database file (overrides SCHEMA_LEDGER_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address (overrides SCHEMA_LEDGER_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port for HTTP API (overrides SCHEMA_LEDGER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Register a schema definition from a JSON file
    Import {
        file: PathBuf,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        version: String,
        /// published or retired
        #[arg(short, long, default_value = "published")]
        status: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Print the published shape of a schema as JSON
    Export {
        name: String,
        /// Defaults to the latest registered version
        #[arg(short, long)]
        version: Option<String>,
    },
    /// List every registered schema
    List,
    /// Render the term tree under a term set
    Tree { iri: String },
    /// Flatten a definition file and render it without touching the database
    Preview {
        file: PathBuf,
        #[arg(short, long, default_value = "preview")]
        name: String,
        #[arg(short, long, default_value = "0.0.1")]
        version: String,
    },
    /// Create a transformation from a mapping file
    Map {
        /// iri of the source schema root
        #[arg(long)]
        source: String,
        /// iri of the target schema root
        #[arg(long)]
        target: String,
        file: PathBuf,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Set the status of a term set and everything below it
    Status {
        iri: String,
        status: String,
        #[arg(long)]
        actor: Option<String>,
    },
}

/// Initialize tracing with output to stderr (for one-shot commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "schema_ledger=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // stdout carries the command's JSON output
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_database(config: &Config) -> anyhow::Result<db::Database> {
    let db = match &config.db_path {
        Some(path) => db::Database::open(path.clone()),
        None => db::Database::open_default(),
    }
    .context("Failed to open database")?;
    db.migrate()?;
    Ok(db)
}

fn read_json_object(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    anyhow::ensure!(value.is_object(), "{} must contain a JSON object", path.display());
    Ok(value)
}

fn parse_status(raw: &str) -> anyhow::Result<Status> {
    Status::from_str(raw).ok_or_else(|| anyhow::anyhow!("unknown status '{}'", raw))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting schema ledger server on {}", config.bind_addr());

    let db = open_database(&config)?;
    let app = api::create_router_with_config(db, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Schema ledger listening on http://{}", config.bind_addr());

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = !matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(use_stderr);

    let mut config = Config::from_env();
    if let Some(path) = cli.db {
        config.db_path = Some(path);
    }

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await?;
        }
        Some(Commands::Import {
            file,
            name,
            version,
            status,
            actor,
        }) => {
            let db = open_database(&config)?;
            let entry = db.create_schema(CreateSchemaInput {
                schema_name: name,
                version,
                status: Some(parse_status(&status)?),
                metadata: read_json_object(&file)?,
                updated_by: actor,
            })?;
            print_json(&entry)?;
        }
        Some(Commands::Export { name, version }) => {
            let db = open_database(&config)?;
            print_json(&db.export_schema(&name, version.as_deref())?)?;
        }
        Some(Commands::List) => {
            let db = open_database(&config)?;
            for entry in db.list_schemas()? {
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.schema_name,
                    entry.version,
                    entry.status.as_str(),
                    entry.schema_iri
                );
            }
        }
        Some(Commands::Tree { iri }) => {
            let db = open_database(&config)?;
            print!("{}", db.term_set_tree(&iri)?);
        }
        Some(Commands::Preview {
            file,
            name,
            version,
        }) => {
            let definition: NestedMap = serde_json::from_value(read_json_object(&file)?)?;
            let mut forest = Forest::new();
            let root = forest.insert_term_set(NewTermSet::root(
                &name,
                &version,
                Status::Published,
                None,
            )?)?;
            let summary = tree::flatten(&mut forest, &definition, root.id, Status::Published, None)?;
            print!("{}", tree::render_tree(&forest, root.id)?);
            eprintln!(
                "{} term sets, {} terms, {} entries skipped",
                forest.term_set_count(),
                forest.term_count(),
                summary.skipped
            );
        }
        Some(Commands::Map {
            source,
            target,
            file,
            actor,
        }) => {
            let db = open_database(&config)?;
            let result = db.create_transformation(CreateTransformationInput {
                source_schema: source,
                target_schema: target,
                schema_mapping: read_json_object(&file)?,
                status: None,
                updated_by: actor,
            })?;
            print_json(&result)?;
        }
        Some(Commands::Status { iri, status, actor }) => {
            let db = open_database(&config)?;
            let changed = db.set_term_set_status(&iri, parse_status(&status)?, actor.as_deref())?;
            println!("{} nodes updated under {}", changed, iri);
        }
        None => serve(config).await?,
    }

    Ok(())
}
