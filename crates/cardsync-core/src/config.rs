//! Configuration and credentials
//!
//! Both live in a base directory passed on the command line:
//!
//! - `config.toml`: the cards root (`path`, relative to the base directory),
//!   the deck table (`decks`, folder name to remote deck id) and optionally
//!   the API URL.
//! - `credentials.toml`: `[mochi] token = "..."`. Falls back to
//!   `~/.config/cardsync/credentials.toml`.
//!
//! Environment variables (CARDSYNC_* prefix) take precedence over files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::remote::DEFAULT_API_URL;

/// Environment variable prefix
const ENV_PREFIX: &str = "CARDSYNC";

/// Deck folder name to remote deck id
pub type DeckTable = BTreeMap<String, String>;

/// Sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Cards root; relative paths are resolved against the base directory
    pub path: PathBuf,

    /// Synced deck folders and their remote deck ids
    #[serde(default)]
    pub decks: DeckTable,

    /// Remote API endpoint
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(skip)]
    base: PathBuf,
}

impl Config {
    pub const FILE_NAME: &'static str = "config.toml";

    /// Load `config.toml` from the base directory
    pub fn load(base: &Path) -> Result<Self> {
        let path = base.join(Self::FILE_NAME);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::load_from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.base = base.to_path_buf();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // CARDSYNC_API_URL
        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            self.api_url = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Absolute (or base-relative) cards root
    pub fn cards_root(&self) -> PathBuf {
        self.base.join(&self.path)
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Remote deck id of a configured deck folder
    pub fn deck_id(&self, deck: &str) -> Option<&str> {
        self.decks.get(deck).map(String::as_str)
    }
}

/// API credentials
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub mochi: MochiCredentials,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MochiCredentials {
    #[serde(default)]
    pub token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.mochi.token.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("Credentials").field("token", &token).finish()
    }
}

impl Credentials {
    pub const FILE_NAME: &'static str = "credentials.toml";

    /// Load credentials for a base directory
    ///
    /// Order of precedence (highest to lowest):
    /// 1. CARDSYNC_TOKEN
    /// 2. `<base>/credentials.toml`
    /// 3. `~/.config/cardsync/credentials.toml`
    pub fn load(base: &Path) -> Result<Self> {
        let candidates = [Some(base.join(Self::FILE_NAME)), Self::user_file_path()];

        let mut credentials = Credentials::default();
        if let Some(path) = candidates.iter().flatten().find(|path| path.exists()) {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read credentials file: {:?}", path))?;
            credentials = Self::load_from_str(&content)
                .with_context(|| format!("Failed to parse credentials file: {:?}", path))?;
        } else {
            credentials.apply_env_overrides();
        }

        if credentials.mochi.token.is_empty() {
            bail!(
                "No API token found. Set {}_TOKEN or add [mochi] token to {:?}",
                ENV_PREFIX,
                base.join(Self::FILE_NAME)
            );
        }
        Ok(credentials)
    }

    /// Parse credentials TOML, then apply environment overrides
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut credentials: Credentials =
            toml::from_str(toml_content).context("Failed to parse credentials TOML")?;
        credentials.apply_env_overrides();
        Ok(credentials)
    }

    fn apply_env_overrides(&mut self) {
        // CARDSYNC_TOKEN
        if let Ok(val) = std::env::var(format!("{}_TOKEN", ENV_PREFIX)) {
            if !val.is_empty() {
                self.mochi.token = val;
            }
        }
    }

    /// Per-user credentials file
    pub fn user_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cardsync").join(Self::FILE_NAME))
    }
}
