// used to layer a settings file under PROTOSLOT_* environment variables
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use std::path::PathBuf;

use crate::error::{ProtoError, Result};

/// Base name of the settings file, looked up with any extension `config` knows.
pub const DEFAULT_FILE: &str = "protoslot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Slot names refused on top of the built-in reserved names.
    pub reserved_slot_names: Vec<String>,
    /// Where the binary looks for `*.json` schema documents.
    pub schema_directory: Option<PathBuf>,
    /// An `EnvFilter` directive, `RUST_LOG` takes precedence.
    pub log_filter: String,
    /// Limit for collection slots that declare none.
    pub default_result_limit: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reserved_slot_names: Vec::new(),
            schema_directory: None,
            log_filter: "info".to_string(),
            default_result_limit: None,
        }
    }
}

impl Settings {
    /// Reads `file` (optional) and then the `PROTOSLOT_` environment.
    pub fn load(file: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("PROTOSLOT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("reserved_slot_names"),
            )
            .build()?;
        Self::checked(config.try_deserialize()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::checked(config.try_deserialize()?)
    }

    fn checked(settings: Settings) -> Result<Self> {
        if settings.default_result_limit == Some(0) {
            return Err(ProtoError::Config(
                "default_result_limit must be at least 1".to_string(),
            ));
        }
        Ok(settings)
    }
}
