use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use keepsake_backend::discover_saves;
use keepsake_controller::{
    ControllerConfig, FileBackend, FileBackendConfig, Location, ObserverRegistry, SaveController,
    SaveMode,
};

use crate::cli::*;

/// Settings read from `--config`, with `--root` applied on top.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub backend: FileBackendConfig,
    pub controller: ControllerConfig,
}

impl CliConfig {
    pub fn resolve(root: Option<&Path>, file: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        if let Some(root) = root {
            config.backend.root = root.to_path_buf();
        }
        Ok(config)
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::resolve(cli.root.as_deref(), cli.config.as_deref())?;
    debug!(save_dir = %config.backend.save_dir().display(), "configuration resolved");
    let format = cli.format;
    match cli.command {
        Command::List => cmd_list(&config, format),
        Command::Chunks(args) => cmd_chunks(&config, args, format).await,
        Command::Show(args) => cmd_show(&config, args, format).await,
        Command::Get(args) => cmd_get(&config, args, format).await,
        Command::Put(args) => cmd_put(&config, args, format).await,
        Command::Rm(args) => cmd_rm(&config, args, format).await,
        Command::Delete(args) => cmd_delete(&config, args, format).await,
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_list(config: &CliConfig, format: OutputFormat) -> anyhow::Result<()> {
    let slots = discover_saves(&config.backend)?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "saves": slots })),
        OutputFormat::Text if slots.is_empty() => {
            println!("No saves in {}.", config.backend.save_dir().display());
        }
        OutputFormat::Text => {
            for slot in &slots {
                println!("{}", slot.bold());
            }
        }
    }
    Ok(())
}

async fn cmd_chunks(
    config: &CliConfig,
    args: SlotArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let save = open_existing(config, &args.slot).await?;
    let chunks: Vec<(String, usize)> = save.view(|store| {
        store
            .iter()
            .map(|(id, chunk)| (id.to_string(), chunk.len()))
            .collect()
    });
    match format {
        OutputFormat::Json => {
            let map: Map<String, Value> = chunks
                .into_iter()
                .map(|(id, count)| (id, json!(count)))
                .collect();
            println!("{}", Value::Object(map));
        }
        OutputFormat::Text => {
            println!("{} ({} chunks)", save.name().bold(), chunks.len());
            for (id, count) in chunks {
                println!("  {}  {} records", id.cyan(), count);
            }
        }
    }
    Ok(())
}

async fn cmd_show(config: &CliConfig, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let save = open_existing(config, &args.slot).await?;
    let rows = records(&save, args.chunk.as_deref());
    match format {
        OutputFormat::Json => {
            let mut out: Map<String, Value> = Map::new();
            for (chunk, object, payload) in rows {
                let entry = out
                    .entry(chunk)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(objects) = entry {
                    objects.insert(object, payload_value(&payload));
                }
            }
            println!("{}", Value::Object(out));
        }
        OutputFormat::Text if rows.is_empty() => println!("No records."),
        OutputFormat::Text => {
            for (chunk, object, payload) in rows {
                println!("{}/{} = {}", chunk.cyan(), object.yellow(), payload);
            }
        }
    }
    Ok(())
}

async fn cmd_get(config: &CliConfig, args: RecordArgs, format: OutputFormat) -> anyhow::Result<()> {
    let location = Location::new(args.chunk, args.object);
    let save = open_existing(config, &args.slot).await?;
    let Some(payload) = save.view(|store| store.payload(&location).map(str::to_string)) else {
        bail!("no record at {location}");
    };
    match format {
        OutputFormat::Json => println!("{}", payload_value(&payload)),
        OutputFormat::Text => println!("{payload}"),
    }
    Ok(())
}

async fn cmd_put(config: &CliConfig, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value: Value = serde_json::from_str(&args.value)
        .with_context(|| format!("value is not valid JSON: {}", args.value))?;
    let location = Location::new(args.chunk, args.object);
    let created = put_record(config, &args.slot, &location, &value).await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({ "slot": args.slot, "location": location.to_string(), "created": created })
        ),
        OutputFormat::Text => {
            let note = if created { " (new save)" } else { "" };
            println!("{} Wrote {}{}", "✓".green(), location.to_string().yellow(), note);
        }
    }
    Ok(())
}

async fn cmd_rm(config: &CliConfig, args: RecordArgs, format: OutputFormat) -> anyhow::Result<()> {
    let location = Location::new(args.chunk, args.object);
    let removed = remove_record(config, &args.slot, &location).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "removed": removed })),
        OutputFormat::Text if removed => {
            println!("{} Removed {}", "✓".green(), location.to_string().yellow());
        }
        OutputFormat::Text => println!("No record at {location}."),
    }
    Ok(())
}

async fn cmd_delete(
    config: &CliConfig,
    args: SlotArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let deleted = delete_slot(config, &args.slot).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "deleted": deleted })),
        OutputFormat::Text if deleted => {
            println!("{} Deleted save {}", "✓".green(), args.slot.bold());
        }
        OutputFormat::Text => println!("No save named {}.", args.slot.bold()),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Save access
// ---------------------------------------------------------------------------

async fn open(config: &CliConfig, slot: &str) -> anyhow::Result<Arc<SaveController>> {
    let backend = FileBackend::new(&config.backend, slot)?;
    let save = SaveController::builder(Arc::new(backend))
        .observers(Arc::new(ObserverRegistry::new()))
        .config(config.controller.clone())
        .build();
    save.initialize().await?;
    Ok(save)
}

async fn open_existing(config: &CliConfig, slot: &str) -> anyhow::Result<Arc<SaveController>> {
    let save = open(config, slot).await?;
    if !save.exists() {
        bail!(
            "no save named {slot:?} in {}",
            config.backend.save_dir().display()
        );
    }
    save.load(SaveMode::PersistentOnly).await?;
    Ok(save)
}

fn records(save: &SaveController, only: Option<&str>) -> Vec<(String, String, String)> {
    save.view(|store| {
        store
            .iter()
            .filter(|(id, _)| only.map_or(true, |c| c == *id))
            .flat_map(|(id, chunk)| {
                chunk
                    .iter()
                    .map(move |(object, payload)| (id.to_string(), object.clone(), payload.clone()))
            })
            .collect()
    })
}

/// Returns whether the save had to be created.
async fn put_record(
    config: &CliConfig,
    slot: &str,
    location: &Location,
    value: &Value,
) -> anyhow::Result<bool> {
    let save = open(config, slot).await?;
    let created = !save.exists();
    if created {
        save.create().await?;
    } else {
        save.load(SaveMode::PersistentOnly).await?;
    }
    if !save.write(location, value)? {
        bail!("chunk {} is reserved for unassigned objects", location.chunk_id());
    }
    save.save(SaveMode::PersistentOnly).await?;
    Ok(created)
}

async fn remove_record(
    config: &CliConfig,
    slot: &str,
    location: &Location,
) -> anyhow::Result<bool> {
    let save = open_existing(config, slot).await?;
    let removed = save.with_data(|store| store.remove(location)).is_some();
    if removed {
        save.save(SaveMode::PersistentOnly).await?;
    }
    Ok(removed)
}

async fn delete_slot(config: &CliConfig, slot: &str) -> anyhow::Result<bool> {
    let save = open(config, slot).await?;
    if !save.exists() {
        return Ok(false);
    }
    save.delete().await?;
    Ok(true)
}

/// Payloads are usually JSON; anything else is shown as a string.
fn payload_value(payload: &str) -> Value {
    serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_string()))
}
