use anyhow::{Context, Result};
use apicache::api::HttpTransport;
use apicache::cache::EntityId;
use apicache::config::Config;
use apicache::resource::get_registry;
use apicache::{ApiContext, TaskOutcome};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Fetch API resources into a normalized cache and print it
#[derive(Parser, Debug)]
#[command(name = "apicache", version, about, long_about = None)]
struct Args {
    /// API base URL
    #[arg(long)]
    api_root: Option<String>,

    /// Personal access token
    #[arg(long)]
    token: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known resources
    Resources,
    /// Fetch one entity
    Get {
        /// Resource path, e.g. `linodes` or `linodes/backups`
        resource: String,
        id: String,
        /// Ancestor ids for nested resources, outermost first
        #[arg(long = "parent")]
        parents: Vec<String>,
    },
    /// Fetch a page (or every page) of a collection
    List {
        resource: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Fetch every page starting at --page
        #[arg(long)]
        all: bool,
        #[arg(long = "parent")]
        parents: Vec<String>,
    },
    /// Delete an entity
    Delete {
        resource: String,
        id: String,
        #[arg(long = "parent")]
        parents: Vec<String>,
    },
    /// Run a named entity action (e.g. `enable_backups`)
    Perform {
        resource: String,
        id: String,
        action: String,
        #[arg(long = "parent")]
        parents: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("apicache started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("apicache").join("apicache.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".apicache").join("apicache.log");
    }
    PathBuf::from("apicache.log")
}

fn ids(parents: &[String]) -> Vec<EntityId> {
    parents.iter().map(|p| EntityId::from(p.as_str())).collect()
}

/// Root slice name of a resource path
fn root_of(resource: &str) -> &str {
    resource.split('/').find(|p| !p.is_empty()).unwrap_or(resource)
}

fn print_slice(ctx: &ApiContext, resource: &str) -> Result<()> {
    let root = root_of(resource);
    let slice = ctx
        .slice(root)
        .with_context(|| format!("No cache slice for {}", root))?;
    println!("{}", serde_json::to_string_pretty(&slice)?);
    Ok(())
}

fn report(outcome: TaskOutcome) {
    if let TaskOutcome::Failed(failure) = outcome {
        eprintln!("error: {}", failure);
    }
}

// Single-threaded: tasks interleave only at network I/O
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = setup_logging(args.log_level)?;

    let mut config = Config::load();
    let api_root = config.effective_api_root(args.api_root.as_deref());
    let token = config.effective_token(args.token.as_deref());

    let registry = get_registry()?.clone();
    let transport = HttpTransport::new(&api_root, token)?;
    let ctx = ApiContext::new(registry, Arc::new(transport))?;

    match args.command {
        Command::Resources => {
            for config in ctx.registry().iter() {
                println!("{}", config.plural_name());
                for child in config.sub_resources() {
                    println!("{}/{}", config.plural_name(), child.plural_name());
                }
            }
        }
        Command::Get {
            resource,
            id,
            parents,
        } => {
            let task = ctx.actions(&resource)?.fetch_one(id, &ids(&parents))?;
            report(ctx.dispatch(task).await);
            print_slice(&ctx, &resource)?;
        }
        Command::List {
            resource,
            page,
            all,
            parents,
        } => {
            let actions = ctx.actions(&resource)?;
            let task = if all {
                actions.fetch_all(page, &ids(&parents))?
            } else {
                actions.fetch_page(page, &ids(&parents))?
            };
            report(ctx.dispatch(task).await);
            print_slice(&ctx, &resource)?;
            if let Err(e) = config.set_last_resource(&resource) {
                tracing::warn!("Failed to save config: {}", e);
            }
        }
        Command::Delete {
            resource,
            id,
            parents,
        } => {
            let task = ctx.actions(&resource)?.delete(id, &ids(&parents))?;
            report(ctx.dispatch(task).await);
            print_slice(&ctx, &resource)?;
        }
        Command::Perform {
            resource,
            id,
            action,
            parents,
        } => {
            let task = ctx
                .actions(&resource)?
                .perform(id, &action, None, &ids(&parents))?;
            report(ctx.dispatch(task).await);
            print_slice(&ctx, &resource)?;
        }
    }

    Ok(())
}
