/*!
Harvest state CLI - inspect and edit the state directory of a resumable harvest.

Operators use this to see where a harvester will resume, to reset a resource
type before re-harvesting it, or to seed a starting point by hand.
*/

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use harvest_state::observability::init_observability_with_filter;
use harvest_state::{HarvestStateStore, JsonStateStore, StateValue};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "harvest-state")]
#[command(about = "Inspect and edit harvest state")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// State directory containing state.json
    #[arg(
        short,
        long,
        global = true,
        env = "HARVEST_STATE_DIR",
        default_value = "./state"
    )]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a recorded value
    Get {
        /// Resource type the state belongs to
        resource_type: String,
        /// State key
        key: String,
    },
    /// Record a value, stored verbatim as a string unless --json is given
    Set {
        /// Resource type the state belongs to
        resource_type: String,
        /// State key
        key: String,
        /// Value to record
        value: String,
        /// Parse the value as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recorded value
    Clear {
        /// Resource type the state belongs to
        resource_type: String,
        /// State key
        key: String,
    },
    /// List recorded state
    Show {
        /// Only show this resource type
        #[arg(short, long)]
        resource_type: Option<String>,
    },
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Resource Type")]
    resource_type: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json)?;

    let mut store = JsonStateStore::new(&cli.dir);
    debug!("Using state file {}", store.state_path().display());

    match cli.command {
        Commands::Get { resource_type, key } => get_state(&mut store, &resource_type, &key)?,
        Commands::Set {
            resource_type,
            key,
            value,
            json,
        } => set_state(&mut store, &resource_type, &key, &value, json)?,
        Commands::Clear { resource_type, key } => {
            clear_state(&mut store, &resource_type, &key)?
        }
        Commands::Show { resource_type } => show_state(&mut store, resource_type.as_deref())?,
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<(), anyhow::Error> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    init_observability_with_filter(json, filter)?;
    Ok(())
}

fn get_state(
    store: &mut JsonStateStore,
    resource_type: &str,
    key: &str,
) -> Result<(), anyhow::Error> {
    let value = store
        .get_state(resource_type, key)?
        .ok_or_else(|| anyhow!("No state recorded for {resource_type}/{key}"))?;

    println!("{}", format_value(&value));
    Ok(())
}

fn set_state(
    store: &mut JsonStateStore,
    resource_type: &str,
    key: &str,
    raw_value: &str,
    as_json: bool,
) -> Result<(), anyhow::Error> {
    let value = parse_value(raw_value, as_json)?;
    info!("Setting {}/{} to {}", resource_type, key, value);

    store
        .set_state(resource_type, key, Some(value))
        .with_context(|| format!("Failed to record state in {}", store.directory().display()))?;
    Ok(())
}

fn clear_state(
    store: &mut JsonStateStore,
    resource_type: &str,
    key: &str,
) -> Result<(), anyhow::Error> {
    info!("Clearing {}/{}", resource_type, key);

    store
        .clear_state(resource_type, key)
        .with_context(|| format!("Failed to clear state in {}", store.directory().display()))?;
    Ok(())
}

fn show_state(
    store: &mut JsonStateStore,
    resource_type: Option<&str>,
) -> Result<(), anyhow::Error> {
    let snapshot = store.snapshot()?;

    let rows: Vec<StateRow> = snapshot
        .entries()
        .filter(|(ns, _, _)| resource_type.map_or(true, |wanted| wanted == *ns))
        .map(|(ns, key, value)| StateRow {
            resource_type: ns.to_string(),
            key: key.to_string(),
            value: format_value(value),
        })
        .collect();

    if rows.is_empty() {
        println!("No state recorded");
    } else {
        println!("{}", Table::new(rows));
    }

    Ok(())
}

/// Turn command-line input into a state value
///
/// Without `as_json` the text is kept exactly as typed, so ids like
/// `123456789012345678901234` are never rewritten as floats.
fn parse_value(raw: &str, as_json: bool) -> Result<StateValue, anyhow::Error> {
    if as_json {
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON value: {raw}"))
    } else {
        Ok(StateValue::String(raw.to_string()))
    }
}

/// Strings print bare so shell callers can use them directly
fn format_value(value: &StateValue) -> String {
    match value {
        StateValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
