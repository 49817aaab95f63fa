//! Lumen CLI: inspect enrichment plans and photo state.
//!
//! Usage:
//!   lumen order --manifest enrichers.yaml [--only id,...]
//!   lumen plan --manifest enrichers.yaml --photo <id> [--capability name,...] [--db path]
//!   lumen status --photo <id> [--db path]
//!   lumen active <list|enable|disable> [--db path]

use clap::{Parser, Subcommand};
use lumen::enrichment::graph;
use lumen::storage::OpenStore;
use lumen::{
    ActiveCapabilityProvider, Capability, CapabilitySet, DescriptorSet, DiffCalculator, EnricherId,
    EnricherManifest, LumenConfig, Photo, PhotoId, PhotoStore, SqlitePhotoStore,
    StaticActiveCapabilities, StoredActiveCapabilities,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen", version, about = "Dependency-ordered photo enrichment")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the execution order of a manifest's enrichers
    Order {
        /// Enricher manifest (YAML list of descriptors)
        #[arg(long)]
        manifest: PathBuf,
        /// Order only these enricher ids
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },
    /// Show which enrichers a photo would re-run
    Plan {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        photo: i64,
        /// Force these capabilities instead of diffing against the active set
        #[arg(long, value_delimiter = ',')]
        capability: Vec<String>,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show a stored photo's applied capabilities
    Status {
        #[arg(long)]
        photo: i64,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Manage active capabilities
    Active {
        #[command(subcommand)]
        action: ActiveAction,
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ActiveAction {
    /// List configured capabilities and whether each is active
    List,
    /// Switch a capability on
    Enable { name: String },
    /// Switch a capability off
    Disable { name: String },
}

/// Get the default database path (~/.local/share/lumen/lumen.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let lumen_dir = data_dir.join("lumen");
    std::fs::create_dir_all(&lumen_dir).ok();
    lumen_dir.join("lumen.db")
}

fn load_config(path: Option<&PathBuf>) -> Result<LumenConfig, String> {
    match path {
        Some(path) => LumenConfig::from_path(path).map_err(|e| e.to_string()),
        None => Ok(LumenConfig::default()),
    }
}

fn open_store(db: Option<PathBuf>, config: &LumenConfig) -> Result<Arc<SqlitePhotoStore>, String> {
    let db_path = db
        .or_else(|| config.database.clone())
        .unwrap_or_else(default_db_path);
    let store = SqlitePhotoStore::open(&db_path)
        .map_err(|e| format!("failed to open database at {}: {}", db_path.display(), e))?;
    Ok(Arc::new(store))
}

fn load_descriptors(manifest: &PathBuf) -> Result<DescriptorSet, String> {
    EnricherManifest::from_path(manifest)
        .map_err(|e| e.to_string())?
        .descriptor_set()
        .map_err(|e| e.to_string())
}

fn load_photo(store: &dyn PhotoStore, id: i64) -> Result<Photo, String> {
    store
        .load_photo(PhotoId::new(id))
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("photo {} not found", id))
}

fn join_ids(ids: &[EnricherId]) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter().map(EnricherId::as_str).collect::<Vec<_>>().join(" -> ")
}

fn cmd_order(manifest: &PathBuf, only: &[String]) -> Result<(), String> {
    let descriptors = load_descriptors(manifest)?;
    let order = if only.is_empty() {
        graph::sort_all(&descriptors)
    } else {
        let selection: Vec<EnricherId> = only.iter().map(|id| EnricherId::new(id.as_str())).collect();
        graph::sort(&descriptors, &selection)
    }
    .map_err(|e| e.to_string())?;

    for (position, id) in order.iter().enumerate() {
        let capability = descriptors.get(id).map(|d| d.capability.to_string()).unwrap_or_default();
        println!("{:>3}  {:<24}  {}", position + 1, id.as_str(), capability);
    }
    Ok(())
}

fn cmd_plan(
    config: &LumenConfig,
    manifest: &PathBuf,
    photo_id: i64,
    capabilities: &[String],
    db: Option<PathBuf>,
) -> Result<(), String> {
    let descriptors = load_descriptors(manifest)?;
    let store = open_store(db, config)?;
    let photo = load_photo(store.as_ref(), photo_id)?;
    let diff = DiffCalculator::new(&descriptors);

    let (missing, expanded) = if capabilities.is_empty() {
        let active = if config.active.is_empty() {
            StoredActiveCapabilities::new(store.clone()).active_capabilities()
        } else {
            StaticActiveCapabilities::from_config(config).and_then(|p| p.active_capabilities())
        }
        .map_err(|e| e.to_string())?;
        let registered = active.intersection(descriptors.capabilities());
        let active_ids = descriptors.enrichers_for(registered).map_err(|e| e.to_string())?;
        let missing = diff.calculate_missing(&photo, &active_ids).map_err(|e| e.to_string())?;
        let expanded = diff.expand_with_dependencies(&missing).map_err(|e| e.to_string())?;
        (missing, expanded)
    } else {
        let targets = CapabilitySet::parse_names(capabilities).map_err(|e| e.to_string())?;
        let requested = descriptors.enrichers_for(targets).map_err(|e| e.to_string())?;
        let expanded = diff.expand_with_dependencies(&requested).map_err(|e| e.to_string())?;
        (requested, expanded)
    };
    let order = graph::sort(&descriptors, &expanded).map_err(|e| e.to_string())?;

    println!("photo:    {} ({})", photo_id, photo.name);
    println!("applied:  {}", photo.applied);
    println!("missing:  {}", join_ids(&missing));
    println!("run:      {}", join_ids(&order));
    Ok(())
}

fn cmd_status(config: &LumenConfig, photo_id: i64, db: Option<PathBuf>) -> Result<(), String> {
    let store = open_store(db, config)?;
    let photo = load_photo(store.as_ref(), photo_id)?;
    println!("photo:    {} ({})", photo_id, photo.name);
    match photo.absolute_path() {
        Some(path) => println!("file:     {}", path.display()),
        None => println!("file:     (none)"),
    }
    println!("hash:     {}", photo.image_hash.as_deref().unwrap_or("(none)"));
    println!("applied:  {}", photo.applied);
    Ok(())
}

/// Canonical settings-row name for a capability typed on the command line
fn setting_name(input: &str) -> Result<String, String> {
    input
        .trim()
        .parse::<Capability>()
        .map(|capability| capability.to_string())
        .map_err(|e| e.to_string())
}

fn cmd_active(config: &LumenConfig, action: ActiveAction, db: Option<PathBuf>) -> Result<(), String> {
    let store = open_store(db, config)?;
    match action {
        ActiveAction::List => {
            let settings = store.enricher_settings().map_err(|e| e.to_string())?;
            if settings.is_empty() {
                println!("No enrichers configured.");
                return Ok(());
            }
            println!("{:<24}  {:>6}", "NAME", "ACTIVE");
            println!("{}", "-".repeat(32));
            for setting in settings {
                println!("{:<24}  {:>6}", setting.name, if setting.is_active { "yes" } else { "no" });
            }
        }
        ActiveAction::Enable { name } => {
            let name = setting_name(&name)?;
            store.set_enricher_active(&name, true).map_err(|e| e.to_string())?;
            println!("Enabled '{}'", name);
        }
        ActiveAction::Disable { name } => {
            let name = setting_name(&name)?;
            store.set_enricher_active(&name, false).map_err(|e| e.to_string())?;
            println!("Disabled '{}'", name);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("LUMEN_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Order { manifest, only } => cmd_order(&manifest, &only),
        Commands::Plan {
            manifest,
            photo,
            capability,
            db,
        } => cmd_plan(&config, &manifest, photo, &capability, db),
        Commands::Status { photo, db } => cmd_status(&config, photo, db),
        Commands::Active { action, db } => cmd_active(&config, action, db),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
