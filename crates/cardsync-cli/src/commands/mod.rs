//! Command handlers

pub mod backup;
pub mod fetch;
pub mod relocate;
pub mod show;
pub mod sync;

use anyhow::{Context, Result};
use std::path::Path;

use cardsync_core::{Config, Credentials, MochiClient};

/// Client for the configured API, authenticated from the base directory
fn client(base: &Path, config: &Config) -> Result<MochiClient> {
    let credentials = Credentials::load(base)?;
    MochiClient::new(config.api_url(), credentials.mochi.token)
        .context("Failed to create API client")
}

fn load_config(base: &Path) -> Result<Config> {
    Config::load(base).with_context(|| {
        format!(
            "No usable configuration in {:?}. Pass --base or set CARDSYNC_BASE.",
            base
        )
    })
}
