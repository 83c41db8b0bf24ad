use std::io::BufRead;

use tracing::{info, warn};
use tracing_subscriber::{filter::Directive, fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use blobgate_storage::{EngineType, Store};

use crate::cli::Options;

pub fn init_tracing(opts: &Options) {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let fmt_layer = fmt::layer().with_filter(log_filter);
    let subscriber = Registry::default().with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

/// Loads a plain KEY=VALUE env file into the process environment. Missing
/// files are fine; everything else is reported.
pub fn read_env_file(path: &str) -> eyre::Result<()> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            warn!(path, "no env file found, relying on the process environment");
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    };

    for line in std::io::BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!(line, "skipping malformed env file line");
            continue;
        };
        std::env::set_var(key.trim(), value.trim());
    }

    info!(path, "environment loaded");
    Ok(())
}

/// Opens the durable store. The word `memory` selects the in-RAM engine.
pub fn init_store(store_path: &str) -> eyre::Result<Store> {
    let store = if store_path == "memory" {
        Store::new(store_path, EngineType::InMemory)?
    } else {
        Store::new(store_path, EngineType::RedB)?
    };
    Ok(store)
}
