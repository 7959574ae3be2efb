use crate::cli::Cli;
use crate::config::Config;
use reqgraph_schema::{Schema, SchemaLoadOptions};
use reqgraph_store::{ElementError, ElementService, ElementStore, Properties};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Everything a command needs once startup has succeeded.
pub struct Context {
    pub config: Config,
    pub service: ElementService,
}

impl Context {
    pub fn schema(&self) -> &Schema {
        self.service.schema()
    }
}

pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // A second init (in-process tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn load_config_or_exit(path: Option<&str>) -> Config {
    Config::load(path.map(Path::new)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// Load the schema named by the command line, the config, or the bundled
/// vocabulary. Exits before any command runs if loading fails.
pub fn load_schema_or_exit(cli: &Cli, config: &Config) -> Schema {
    let mut options = SchemaLoadOptions::default();
    if let Some(min_classes) = config.min_classes {
        options.min_classes = min_classes;
    }
    let source = cli
        .schema
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| config.schema.clone());

    let loaded = match &source {
        Some(path) => Schema::load(path, &options),
        None => Schema::from_json_str(reqgraph_schema::BUNDLED_SCHEMA, &options),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("error: schema load failed: {e}");
        std::process::exit(1);
    })
}

pub fn open_context_or_exit(cli: &Cli) -> Context {
    let config = load_config_or_exit(cli.config.as_deref());
    init_tracing(config.log_filter());
    let schema = load_schema_or_exit(cli, &config);
    let data_dir = cli
        .data_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.data_dir());
    tracing::debug!(data_dir = %data_dir.display(), classes = schema.class_count(), "store opened");

    let store = ElementStore::new(data_dir, Arc::new(schema));
    Context {
        config,
        service: ElementService::new(Arc::new(store)),
    }
}

/// Unwrap an element operation, or print `error: [kind] message` and exit.
pub fn element_or_exit<T>(result: Result<T, ElementError>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("error: [{}] {e}", e.kind().as_str());
        std::process::exit(1);
    })
}

pub fn or_exit<T, E: Display>(result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn parse_props_or_exit(text: &str) -> Properties {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(properties)) => properties,
        Ok(other) => {
            eprintln!("error: properties must be a JSON object, got {other}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: invalid properties JSON: {e}");
            std::process::exit(1);
        }
    }
}

pub fn print_json(payload: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}
