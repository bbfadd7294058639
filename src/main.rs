//! Compiles every schema document found in the configured schema directory
//! and reports one line per schema.
//!
//! Settings come from `protoslot.toml` (or any other format `config` knows)
//! and `PROTOSLOT_*` environment variables. The log filter is `RUST_LOG` if
//! set, otherwise the configured `log_filter`.

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use protoslot::settings::DEFAULT_FILE;
use protoslot::{PrototypeCompiler, Result, SchemaKeeper, Settings};

fn load_schemas(keeper: &SchemaKeeper, directory: &Path) -> Result<usize> {
    let entries = fs::read_dir(directory)
        .map_err(|e| protoslot::ProtoError::Document(format!("{}: {}", directory.display(), e)))?;
    let mut loaded = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let document = match fs::read_to_string(&path) {
            Ok(document) => document,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable schema document");
                continue;
            }
        };
        match keeper.load_json(&document) {
            Ok(schema) => {
                info!(file = %path.display(), schema = %schema.id, "loaded schema");
                loaded += 1;
            }
            Err(e) => warn!(file = %path.display(), error = %e, "skipping malformed schema document"),
        }
    }
    Ok(loaded)
}

fn main() -> ExitCode {
    let settings = match Settings::load(DEFAULT_FILE) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    let directory = settings
        .schema_directory
        .clone()
        .unwrap_or_else(|| Path::new(".").to_path_buf());
    let keeper = Arc::new(SchemaKeeper::new());
    match load_schemas(&keeper, &directory) {
        Ok(count) => info!(directory = %directory.display(), schemas = count, "schema directory read"),
        Err(e) => {
            error!(error = %e, "cannot read schema directory");
            return ExitCode::FAILURE;
        }
    }

    let ids = keeper.ids();
    let compiler = PrototypeCompiler::new(keeper).with_settings(settings);
    let mut failed = 0;
    for id in ids {
        match compiler.get_prototype(&id) {
            Ok(prototype) => println!(
                "{} v{}: {} slots, keys {:?}, bases {:?}",
                prototype.schema_id(),
                prototype.version(),
                prototype.slot_names().len(),
                prototype.key_slot_names(),
                prototype.base_schema_ids(),
            ),
            Err(e) => {
                println!("{}: {}", id, e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
