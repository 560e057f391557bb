//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "app": { "loggingEnabled": true },
//!   "categorization": {
//!     "recategorize": false,
//!     "skipInvalidRules": true,
//!     "autoCategorize": true
//!   }
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    categorization: CategorizationSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default = "default_true")]
    logging_enabled: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            logging_enabled: true,
            other: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategorizationSettings {
    #[serde(default)]
    recategorize: bool,
    #[serde(default = "default_true")]
    skip_invalid_rules: bool,
    #[serde(default = "default_true")]
    auto_categorize: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for CategorizationSettings {
    fn default() -> Self {
        Self {
            recategorize: false,
            skip_invalid_rules: true,
            auto_categorize: true,
            other: HashMap::new(),
        }
    }
}

/// Haushalt configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Re-score already categorized transactions during a categorization run
    pub recategorize: bool,
    /// Skip stored rules that fail to decode instead of aborting the run
    pub skip_invalid_rules: bool,
    /// Categorize transactions as soon as they are created
    pub auto_categorize: bool,
    pub logging_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recategorize: false,
            skip_invalid_rules: true,
            auto_categorize: true,
            logging_enabled: true,
        }
    }
}

/// Parse a boolean environment override
fn env_flag(name: &str) -> Option<bool> {
    match std::env::var(name).ok().as_deref() {
        Some("true" | "1" | "yes" | "TRUE" | "YES") => Some(true),
        Some("false" | "0" | "no" | "FALSE" | "NO") => Some(false),
        _ => None,
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

impl Config {
    /// Load config from the data directory
    ///
    /// `HAUSHALT_LOGGING` overrides `app.loggingEnabled`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;

        Ok(Self {
            recategorize: raw.categorization.recategorize,
            skip_invalid_rules: raw.categorization.skip_invalid_rules,
            auto_categorize: raw.categorization.auto_categorize,
            logging_enabled: env_flag("HAUSHALT_LOGGING").unwrap_or(raw.app.logging_enabled),
        })
    }

    /// Save config, preserving settings this crate does not manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir)?;

        settings.app.logging_enabled = self.logging_enabled;
        settings.categorization.recategorize = self.recategorize;
        settings.categorization.skip_invalid_rules = self.skip_invalid_rules;
        settings.categorization.auto_categorize = self.auto_categorize;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join("settings.json"), content)?;
        Ok(())
    }
}
