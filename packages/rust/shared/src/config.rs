//! Application configuration for regsync.
//!
//! User config lives at `~/.regsync/regsync.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RegSyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "regsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".regsync";

// ---------------------------------------------------------------------------
// Config structs (matching regsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Corpus identity and source settings.
    #[serde(default)]
    pub corpus: CorpusSectionConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// `[corpus]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSectionConfig {
    /// CFR title number.
    #[serde(default = "default_cfr_title")]
    pub cfr_title: u32,

    /// CFR part number.
    #[serde(default = "default_cfr_part")]
    pub cfr_part: u32,

    /// Prefix for derived document codes (e.g., "osha" → "osha-1926-501").
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,

    /// Stable business key for the aggregate manual.
    #[serde(default = "default_manual_code")]
    pub manual_code: String,

    /// Display title for the manual.
    #[serde(default = "default_manual_title")]
    pub manual_title: String,

    /// Category applied to the manual and its documents.
    #[serde(default = "default_manual_category")]
    pub manual_category: String,

    /// Description stored on the manual.
    #[serde(default = "default_manual_description")]
    pub manual_description: String,

    /// Base URL of the corpus provider.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for CorpusSectionConfig {
    fn default() -> Self {
        Self {
            cfr_title: default_cfr_title(),
            cfr_part: default_cfr_part(),
            code_prefix: default_code_prefix(),
            manual_code: default_manual_code(),
            manual_title: default_manual_title(),
            manual_category: default_manual_category(),
            manual_description: default_manual_description(),
            base_url: default_base_url(),
        }
    }
}

fn default_cfr_title() -> u32 {
    29
}
fn default_cfr_part() -> u32 {
    1926
}
fn default_code_prefix() -> String {
    "osha".into()
}
fn default_manual_code() -> String {
    "osha-29cfr1926".into()
}
fn default_manual_title() -> String {
    "OSHA Construction Standards (29 CFR 1926)".into()
}
fn default_manual_category() -> String {
    "Safety & Compliance".into()
}
fn default_manual_description() -> String {
    "The complete Safety and Health Regulations for Construction, imported \
     from the Electronic Code of Federal Regulations (eCFR). Automatically \
     monitored for updates."
        .into()
}
fn default_base_url() -> String {
    "https://www.ecfr.gov".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libsql database file. Leading `~` expands to home.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.regsync/regsync.db".into()
}

impl StorageConfig {
    /// Resolve the configured db path, expanding a leading `~`.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            let home = dirs::home_dir()
                .ok_or_else(|| RegSyncError::config("could not determine home directory"))?;
            return Ok(home.join(rest));
        }
        Ok(PathBuf::from(&self.db_path))
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound on the assembly transaction, in seconds.
    #[serde(default = "default_assembly_timeout")]
    pub assembly_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            assembly_timeout_secs: default_assembly_timeout(),
        }
    }
}

fn default_assembly_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Corpus config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime corpus configuration consumed by the sync engine.
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// CFR title number.
    pub cfr_title: u32,
    /// CFR part number.
    pub cfr_part: u32,
    /// Prefix for derived document codes.
    pub code_prefix: String,
    /// Manual business key.
    pub manual_code: String,
    /// Manual display title.
    pub manual_title: String,
    /// Category applied to the manual and its documents.
    pub manual_category: String,
    /// Description stored on the manual.
    pub manual_description: String,
    /// Assembly transaction bound in seconds.
    pub assembly_timeout_secs: u64,
}

impl From<&AppConfig> for CorpusConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            cfr_title: config.corpus.cfr_title,
            cfr_part: config.corpus.cfr_part,
            code_prefix: config.corpus.code_prefix.clone(),
            manual_code: config.corpus.manual_code.clone(),
            manual_title: config.corpus.manual_title.clone(),
            manual_category: config.corpus.manual_category.clone(),
            manual_description: config.corpus.manual_description.clone(),
            assembly_timeout_secs: config.sync.assembly_timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.regsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RegSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.regsync/regsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RegSyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RegSyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RegSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RegSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RegSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("cfr_title"));
        assert!(toml_str.contains("osha-29cfr1926"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.corpus.cfr_title, 29);
        assert_eq!(parsed.corpus.cfr_part, 1926);
        assert_eq!(parsed.sync.assembly_timeout_secs, 120);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[corpus]
cfr_title = 40
cfr_part = 60
code_prefix = "epa"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.corpus.cfr_title, 40);
        assert_eq!(config.corpus.code_prefix, "epa");
        // Untouched fields keep their defaults.
        assert_eq!(config.corpus.base_url, "https://www.ecfr.gov");
        assert_eq!(config.storage.db_path, "~/.regsync/regsync.db");
    }

    #[test]
    fn corpus_config_from_app_config() {
        let app = AppConfig::default();
        let corpus = CorpusConfig::from(&app);
        assert_eq!(corpus.cfr_title, 29);
        assert_eq!(corpus.cfr_part, 1926);
        assert_eq!(corpus.manual_code, "osha-29cfr1926");
        assert_eq!(corpus.assembly_timeout_secs, 120);
    }

    #[test]
    fn db_path_without_tilde_is_passed_through() {
        let storage = StorageConfig {
            db_path: "/tmp/regsync-test.db".into(),
        };
        let resolved = storage.resolved_db_path().expect("resolve");
        assert_eq!(resolved, PathBuf::from("/tmp/regsync-test.db"));
    }
}
