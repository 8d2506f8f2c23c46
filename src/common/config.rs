//! User configuration, read from a TOML file under the standard config
//! directory. Every field has a working default so a missing or broken file
//! never prevents startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number spaces per display instead of across all displays.
    pub local_numbering: bool,
    /// Explicit path to the external switch tool, bypassing discovery.
    pub external_tool: Option<PathBuf>,
    /// Alternate file to watch for space changes.
    pub watch_path: Option<PathBuf>,
}

impl Config {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("spaceline").join("config.toml"))
    }

    /// Read the default config file. Absent file means defaults; a file
    /// that fails to parse is reported and also means defaults.
    pub fn load() -> Config {
        match Config::path() {
            Some(path) => Config::load_from(&path),
            None => Config::default(),
        }
    }

    pub fn load_from(path: &std::path::Path) -> Config {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Config::default(),
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unparseable config file");
                Config::default()
            }
        }
    }
}
