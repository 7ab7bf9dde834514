//! Configuration resolution for meelo-matcher
//!
//! Settings come from three tiers, highest priority first:
//! 1. Environment variables (`API_URL`, `API_KEYS`, `MEELO_PUSH_GENRES`, ...)
//! 2. TOML configuration file (`matcher.toml`)
//! 3. Built-in defaults

use meelo_common::config::{load_toml_config, resolve_config_path, LoggingConfig};
use meelo_common::models::AlbumType;
use meelo_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "MEELO_MATCHER_CONFIG";

/// Default config file name under the platform config directory
pub const CONFIG_FILE_NAME: &str = "matcher.toml";

/// Matcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    /// Base URL of the catalog API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Key sent in the `x-api-key` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Collect genres from every provider and push them to the catalog
    pub push_genres: bool,

    /// Stored album types that a provider-resolved type may replace
    ///
    /// `Other` is always replaceable and does not need to be listed.
    pub overridable_album_types: Vec<AlbumType>,

    /// Maximum year difference between a placeholder release date and a
    /// resolved one before the resolved date is considered a mismatch
    pub release_date_tolerance_years: u32,

    /// Request budget of the anchor provider (MusicBrainz)
    pub anchor_requests_per_second: u32,

    /// Timeout of every outbound provider HTTP call
    pub http_timeout_secs: u64,

    /// Port of the status HTTP surface
    pub port: u16,

    /// Number of tasks the runner pulls ahead of the one being matched
    pub prefetch: usize,

    /// Provider names to leave out (case-insensitive)
    pub disabled_providers: Vec<String>,

    /// Folder holding `<provider name>.png` icons uploaded at registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_icons_dir: Option<PathBuf>,

    /// AcoustID key enabling fingerprint-based song search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acoustid_api_key: Option<String>,

    pub logging: LoggingConfig,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            push_genres: true,
            overridable_album_types: vec![AlbumType::StudioRecording, AlbumType::LiveRecording],
            release_date_tolerance_years: 2,
            anchor_requests_per_second: 1,
            http_timeout_secs: 30,
            port: 6789,
            prefetch: 2,
            disabled_providers: Vec::new(),
            provider_icons_dir: None,
            acoustid_api_key: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl MatcherSettings {
    /// Load settings from the resolved TOML file, then apply ENV overrides
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_config_path, CONFIG_PATH_ENV, CONFIG_FILE_NAME);
        let mut settings: MatcherSettings = load_toml_config(&path)?;
        settings.apply_env(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("API_URL").filter(|v| is_valid_value(v)) {
            self.api_url = Some(url.trim().trim_end_matches('/').to_string());
        }

        // API_KEYS is a comma-separated list shared with the catalog; the
        // first entry is ours
        if let Some(keys) = lookup("API_KEYS") {
            if let Some(key) = keys.split(',').map(str::trim).find(|k| !k.is_empty()) {
                self.api_key = Some(key.to_string());
            }
        }

        if let Some(flag) = lookup("MEELO_PUSH_GENRES") {
            match parse_flag(&flag) {
                Some(value) => self.push_genres = value,
                None => warn!(value = %flag, "Ignoring invalid MEELO_PUSH_GENRES"),
            }
        }

        if let Some(key) = lookup("ACOUSTID_API_KEY").filter(|v| is_valid_value(v)) {
            self.acoustid_api_key = Some(key.trim().to_string());
        }

        if let Some(port) = lookup("MEELO_MATCHER_PORT") {
            match port.trim().parse() {
                Ok(value) => self.port = value,
                Err(_) => warn!(value = %port, "Ignoring invalid MEELO_MATCHER_PORT"),
            }
        }
    }

    /// Check settings needed to talk to the catalog
    pub fn validate(&self) -> Result<()> {
        if !self.api_url.as_deref().is_some_and(is_valid_value) {
            return Err(Error::Config(
                "Catalog API URL not configured. Set API_URL or `api_url` in matcher.toml"
                    .to_string(),
            ));
        }
        if !self.api_key.as_deref().is_some_and(is_valid_value) {
            return Err(Error::Config(
                "Catalog API key not configured. Set API_KEYS or `api_key` in matcher.toml"
                    .to_string(),
            ));
        }
        if self.anchor_requests_per_second == 0 {
            return Err(Error::Config(
                "anchor_requests_per_second must be at least 1".to_string(),
            ));
        }
        info!("Configuration validated");
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn is_provider_enabled(&self, name: &str) -> bool {
        !self
            .disabled_providers
            .iter()
            .any(|disabled| disabled.eq_ignore_ascii_case(name))
    }

    /// Whether a stored album type may be replaced by a resolved one
    pub fn is_album_type_resolvable(&self, stored: AlbumType) -> bool {
        stored == AlbumType::Other || self.overridable_album_types.contains(&stored)
    }
}

/// Validate a setting value (non-empty, non-whitespace)
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
