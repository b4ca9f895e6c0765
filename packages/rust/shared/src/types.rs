//! Core domain types for regsync manuals and sync state.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SyncStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of the per-corpus sync state machine.
///
/// `Never → Syncing → {Success, Error}`; both terminal states transition
/// back to `Syncing` on the next trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Never,
    Syncing,
    Success,
    Error,
}

impl SyncStatus {
    /// Stored database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "NEVER",
            Self::Syncing => "SYNCING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }

    /// Parse the stored representation. Unknown values map to `Never`.
    pub fn parse(s: &str) -> Self {
        match s {
            "SYNCING" => Self::Syncing,
            "SUCCESS" => Self::Success,
            "ERROR" => Self::Error,
            _ => Self::Never,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SyncStateRecord
// ---------------------------------------------------------------------------

/// Persisted sync state for one (CFR title, part) corpus key.
///
/// Created on the first sync attempt, mutated by every sync, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStateRecord {
    /// CFR title number (e.g., 29).
    pub cfr_title: u32,
    /// CFR part number (e.g., 1926).
    pub cfr_part: u32,
    /// Outcome of the last sync attempt.
    pub status: SyncStatus,
    /// RFC 3339 timestamp of the last successful sync.
    pub last_synced_at: Option<String>,
    /// Upstream revision marker (`latest_amended_on`) at the last sync.
    pub last_amended_date: Option<String>,
    /// Hash of the whole fetched corpus at the last sync.
    pub last_content_hash: Option<String>,
    /// The manual produced by the last successful sync.
    pub manual_id: Option<String>,
    /// Section count from the last successful sync.
    pub section_count: u32,
    /// Human-readable message from the last failure.
    pub last_error: Option<String>,
}

impl SyncStateRecord {
    /// A NEVER-shaped default for corpora that have not been synced yet.
    pub fn never(cfr_title: u32, cfr_part: u32) -> Self {
        Self {
            cfr_title,
            cfr_part,
            status: SyncStatus::Never,
            last_synced_at: None,
            last_amended_date: None,
            last_content_hash: None,
            manual_id: None,
            section_count: 0,
            last_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SubpartInfo & ParsedSection
// ---------------------------------------------------------------------------

/// A subpart grouping derived from heading text (letter + title).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubpartInfo {
    /// Subpart designator, uppercased (e.g., "M"). "?" for ungrouped.
    pub letter: String,
    /// Subpart title (e.g., "Fall Protection").
    pub title: String,
}

impl SubpartInfo {
    /// The fallback grouping for sections outside any recognized subpart.
    pub fn general() -> Self {
        Self {
            letter: "?".into(),
            title: "General".into(),
        }
    }
}

/// A section extracted from the corpus markup. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct ParsedSection {
    /// Subpart designator this section falls under.
    pub subpart_letter: String,
    /// Subpart title this section falls under.
    pub subpart_title: String,
    /// Short section number with the part prefix stripped (e.g., "501").
    pub section_number: String,
    /// Fully qualified citation (e.g., "1926.501").
    pub section_citation: String,
    /// Display title (e.g., "§1926.501 — Duty to have fall protection.").
    pub title: String,
    /// Rendered semantic HTML content.
    pub content: String,
    /// Truncated SHA-256 of `content`.
    pub content_hash: String,
    /// Strictly increasing position in document order, starting at 1.
    pub sort_order: u32,
}

// ---------------------------------------------------------------------------
// Manual change log
// ---------------------------------------------------------------------------

/// Why a manual version entry was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualChangeType {
    /// First version created alongside the manual itself.
    Initial,
    /// At least one new document was added in this sync.
    DocumentAdded,
    /// Only existing documents were updated in this sync.
    MetadataUpdated,
}

impl ManualChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::DocumentAdded => "DOCUMENT_ADDED",
            Self::MetadataUpdated => "METADATA_UPDATED",
        }
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// Result of a full sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Aggregate manual the corpus was synced into.
    pub manual_id: String,
    /// Total sections extracted from the corpus.
    pub total_sections: u32,
    /// Sections that created a new document.
    pub new_sections: u32,
    /// Sections that created a new version of an existing document.
    pub updated_sections: u32,
    /// Sections whose content hash was unchanged.
    pub unchanged_sections: u32,
    /// Distinct subpart groups seen.
    pub subpart_count: u32,
    /// Upstream `latest_amended_on` at sync time.
    pub source_amended_date: Option<String>,
}

/// Result of a lightweight update check (no mutation).
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCheck {
    /// True when the stored revision marker is absent or stale.
    pub has_updates: bool,
    /// Live `latest_amended_on` from the corpus provider.
    pub source_date: Option<String>,
    /// The revision marker stored at the last sync.
    pub stored_date: Option<String>,
    /// Current sync status for the corpus key.
    pub sync_status: SyncStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            SyncStatus::Never,
            SyncStatus::Syncing,
            SyncStatus::Success,
            SyncStatus::Error,
        ] {
            assert_eq!(SyncStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_maps_to_never() {
        assert_eq!(SyncStatus::parse("HALTED"), SyncStatus::Never);
        assert_eq!(SyncStatus::parse(""), SyncStatus::Never);
    }

    #[test]
    fn never_record_shape() {
        let state = SyncStateRecord::never(29, 1926);
        assert_eq!(state.status, SyncStatus::Never);
        assert_eq!(state.section_count, 0);
        assert!(state.manual_id.is_none());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn general_fallback_grouping() {
        let general = SubpartInfo::general();
        assert_eq!(general.letter, "?");
        assert_eq!(general.title, "General");
    }

    #[test]
    fn report_serializes() {
        let report = SyncReport {
            manual_id: "m1".into(),
            total_sections: 3,
            new_sections: 3,
            updated_sections: 0,
            unchanged_sections: 0,
            subpart_count: 2,
            source_amended_date: Some("2025-07-01".into()),
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"total_sections\":3"));
        assert!(json.contains("2025-07-01"));
    }
}
