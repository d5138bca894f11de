use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use planet_catalog_core::{CatalogService, NewPlanet, PlanetId};
use planet_catalog_store_sqlite::SqliteStore;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "planets")]
#[command(about = "Planet catalog CLI")]
struct Cli {
    #[arg(long, default_value = "./planets.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    Planet {
        #[command(subcommand)]
        command: PlanetCommand,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate,
    Seed,
}

#[derive(Debug, Subcommand)]
enum PlanetCommand {
    Create(CreateArgs),
    Get(IdArgs),
    GetByName(NameArgs),
    List(ListArgs),
    Remove(IdArgs),
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    climate: String,
    #[arg(long)]
    terrain: String,
}

#[derive(Debug, Args)]
struct IdArgs {
    #[arg(long)]
    id: PlanetId,
}

#[derive(Debug, Args)]
struct NameArgs {
    #[arg(long)]
    name: String,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    climate: Option<String>,
    #[arg(long)]
    terrain: Option<String>,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("Opening planet catalog at {}", cli.db.display());
    let mut store = SqliteStore::open(&cli.db)?;
    match cli.command {
        Command::Db { command } => run_db(command, &mut store),
        Command::Planet { command } => {
            store.migrate()?;
            run_planet(command, CatalogService::new(store))
        }
    }
}

fn run_db(command: DbCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let status = store.schema_status()?;
            emit_json(serde_json::json!({
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions,
                "up_to_date": status.pending_versions.is_empty()
            }))
        }
        DbCommand::Migrate => {
            let before = store.schema_status()?;
            store.migrate()?;
            let after = store.schema_status()?;
            emit_json(serde_json::json!({
                "before_version": before.current_version,
                "applied_versions": before.pending_versions,
                "after_version": after.current_version,
                "up_to_date": after.pending_versions.is_empty()
            }))
        }
        DbCommand::Seed => {
            store.migrate()?;
            let summary = store.seed_fixtures()?;
            emit_json(serde_json::to_value(&summary).context("failed to serialize seed summary")?)
        }
    }
}

fn run_planet(command: PlanetCommand, catalog: CatalogService<SqliteStore>) -> Result<()> {
    match command {
        PlanetCommand::Create(args) => {
            let planet = catalog.create(NewPlanet::new(args.name, args.climate, args.terrain))?;
            emit_json(serde_json::json!({ "planet": planet }))
        }
        PlanetCommand::Get(args) => {
            let planet = catalog.get(args.id)?;
            emit_json(serde_json::json!({ "planet": planet }))
        }
        PlanetCommand::GetByName(args) => {
            let planet = catalog.get_by_name(&args.name)?;
            emit_json(serde_json::json!({ "planet": planet }))
        }
        PlanetCommand::List(args) => {
            let planets = catalog.list(args.climate.as_deref(), args.terrain.as_deref())?;
            emit_json(serde_json::json!({ "planets": planets }))
        }
        PlanetCommand::Remove(args) => {
            catalog.remove(args.id)?;
            emit_json(serde_json::json!({ "removed": args.id }))
        }
    }
}
