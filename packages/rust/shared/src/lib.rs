//! Shared types, error model, hashing, and configuration for regsync.
//!
//! This crate is the foundation depended on by all other regsync crates.
//! It provides:
//! - [`RegSyncError`]: the unified error type
//! - Domain types ([`ParsedSection`], [`SyncStateRecord`], [`SyncReport`])
//! - Content hashing ([`content_hash`])
//! - Configuration ([`AppConfig`], [`CorpusConfig`], config loading)

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CorpusConfig, CorpusSectionConfig, StorageConfig, SyncConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{RegSyncError, Result};
pub use hash::content_hash;
pub use types::{
    ManualChangeType, ParsedSection, SubpartInfo, SyncReport, SyncStateRecord, SyncStatus,
    UpdateCheck,
};
