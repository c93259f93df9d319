/// Player configuration loading
///
/// Settings are layered: built-in defaults, then an optional TOML file, then
/// `TAPEDECK_`-prefixed environment variables. Nested keys use a double
/// underscore, e.g. `TAPEDECK_PLAYBACK__SEEK_GUARD_MS=150`.
use crate::error::{PlayerError, Result};
use std::path::Path;
use tapedeck_core::PlayerSettings;

/// Default file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tapedeck.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TAPEDECK";

/// Load settings from `path` (required if given) or `tapedeck.toml` (if present)
pub fn load(path: Option<&Path>) -> Result<PlayerSettings> {
    load_with_env(path, ENV_PREFIX)
}

fn load_with_env(path: Option<&Path>, prefix: &str) -> Result<PlayerSettings> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(config::File::from(default_path));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let settings: PlayerSettings = builder
        .build()
        .map_err(|e| PlayerError::Config(e.to_string()))?
        .try_deserialize()
        .map_err(|e| PlayerError::Config(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}
