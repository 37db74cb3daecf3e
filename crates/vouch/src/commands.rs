use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;
use vouch_core::{Action, LifecycleError, LifecycleOrchestrator, RequestKind, TransactionalStore};
use vouch_schema::{Catalog, Record, Value};

use crate::config::Settings;

type Orchestrator = LifecycleOrchestrator<Catalog>;

fn open(settings: &Settings) -> Result<Orchestrator> {
    let catalog = Catalog::load(&settings.catalog)
        .with_context(|| format!("Failed to load catalog {}", settings.catalog.display()))?;
    let store = TransactionalStore::open(&settings.database_url())
        .with_context(|| format!("Failed to open database {}", settings.database.display()))?;
    Ok(LifecycleOrchestrator::new(catalog, store))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `--data` / `--key` argument: inline JSON, or `@path` to a JSON file.
fn parse_record(arg: &str) -> Result<Record> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("Expected a JSON object")
}

/// A key value from the command line. `7` is an integer, `"7"` and `abc`
/// are text.
fn parse_scalar(arg: &str) -> Result<Value> {
    match serde_json::from_str::<serde_json::Value>(arg) {
        Ok(json) => Value::from_json("value", json).context("Expected a scalar value"),
        Err(_) => Ok(Value::Text(arg.to_string())),
    }
}

pub fn init(settings: &Settings) -> Result<bool> {
    let orchestrator = open(settings)?;
    let mut entities = Vec::new();
    for module in orchestrator.metadata().modules() {
        orchestrator.ensure_relations(module.entity_name())?;
        entities.push(module.entity_name().to_string());
    }
    info!("Initialized {} module(s) in {}", entities.len(), settings.database.display());

    print_json(&serde_json::json!({
        "database": settings.database,
        "catalog": settings.catalog,
        "entities": entities,
    }))?;
    Ok(true)
}

pub fn read(settings: &Settings, entity: &str, field: &str, value: &str) -> Result<bool> {
    let orchestrator = open(settings)?;
    let rows = orchestrator.fetch_by_key(field, parse_scalar(value)?, entity)?;
    print_json(&rows)?;
    Ok(true)
}

pub fn read_all(settings: &Settings, entity: &str) -> Result<bool> {
    let orchestrator = open(settings)?;
    let rows = orchestrator.fetch_all(entity)?;
    print_json(&rows)?;
    Ok(true)
}

pub fn submit(settings: &Settings, entity: &str, kind: RequestKind, data: &str) -> Result<bool> {
    let actor = settings.actor()?;
    let record = parse_record(data)?;
    let orchestrator = open(settings)?;
    let status = orchestrator.submit(&record, entity, kind, &actor)?;
    print_json(&status)?;
    Ok(status.is_success())
}

pub fn decide(
    settings: &Settings,
    entity: &str,
    action: Action,
    key: &str,
    remarks: Option<&str>,
) -> Result<bool> {
    let actor = settings.actor()?;
    let key = parse_record(key)?;
    let orchestrator = open(settings)?;
    let status = orchestrator.decide(entity, action, &key, remarks, &actor)?;
    print_json(&status)?;
    Ok(status.is_success())
}

pub fn rectify(settings: &Settings, entity: &str, data: &str) -> Result<bool> {
    let actor = settings.actor()?;
    let record = parse_record(data)?;
    let orchestrator = open(settings)?;
    let status = orchestrator.rectify(&record, entity, &actor)?;
    print_json(&status)?;
    Ok(status.is_success())
}

pub fn show_config(settings: &Settings) -> Result<bool> {
    print_json(&serde_json::json!({
        "home": settings.home,
        "config": {
            "path": settings.config_path,
            "loaded": settings.config_loaded,
        },
        "database": {
            "path": settings.database,
            "exists": settings.database.exists(),
        },
        "catalog": {
            "path": settings.catalog,
            "exists": settings.catalog.exists(),
        },
        "actor": settings.actor,
    }))?;
    Ok(true)
}

/// Print a failed command as `{"error": {"code", "message"}}`.
pub fn print_error(err: &anyhow::Error) {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<LifecycleError>())
        .map(LifecycleError::code)
        .unwrap_or("COMMAND_FAILED");
    let payload = serde_json::json!({
        "error": {
            "code": code,
            "message": format!("{:#}", err),
        }
    });
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:#}", err),
    }
}
