//! Sync orchestration: fetch → parse → assemble → state update.
//!
//! [`SyncEngine`] owns the sync state lifecycle for one corpus key:
//! `NEVER → SYNCING → {SUCCESS, ERROR}`, with both terminal states
//! returning to `SYNCING` on the next trigger. Fetch and parse failures
//! abort before any document/manual mutation; assembly failures roll back
//! the whole transaction. Every failure records an ERROR state with the
//! message and re-throws to the caller. There is no automatic retry.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use regsync_markup::{parse_tree, walk};
use regsync_shared::{
    CorpusConfig, RegSyncError, Result, SyncReport, SyncStateRecord, SyncStatus, UpdateCheck,
    content_hash,
};
use regsync_source::CorpusSource;
use regsync_storage::Storage;

use crate::manual::{AssemblyOutcome, assemble_manual};

/// Drives the full sync workflow for one corpus key.
pub struct SyncEngine<S: CorpusSource> {
    source: S,
    storage: Storage,
    config: CorpusConfig,
}

impl<S: CorpusSource> SyncEngine<S> {
    /// Create an engine over a corpus source and storage handle.
    pub fn new(source: S, storage: Storage, config: CorpusConfig) -> Self {
        Self {
            source,
            storage,
            config,
        }
    }

    /// The underlying storage handle, for read-side consumers.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Current sync state, or a NEVER-shaped default if none exists yet.
    pub async fn sync_status(&self) -> Result<SyncStateRecord> {
        let state = self
            .storage
            .get_sync_state(self.config.cfr_title, self.config.cfr_part)
            .await?;
        Ok(state
            .unwrap_or_else(|| SyncStateRecord::never(self.config.cfr_title, self.config.cfr_part)))
    }

    /// Compare the stored revision marker against live metadata.
    ///
    /// Read-only: performs no sync and mutates nothing.
    pub async fn check_for_updates(&self) -> Result<UpdateCheck> {
        let meta = self.source.title_meta().await?;
        let state = self
            .storage
            .get_sync_state(self.config.cfr_title, self.config.cfr_part)
            .await?;

        let stored_date = state.as_ref().and_then(|s| s.last_amended_date.clone());
        let sync_status = state.map(|s| s.status).unwrap_or(SyncStatus::Never);
        let has_updates = match &stored_date {
            None => true,
            Some(stored) => meta.latest_amended_on.as_deref() != Some(stored.as_str()),
        };

        Ok(UpdateCheck {
            has_updates,
            source_date: meta.latest_amended_on,
            stored_date,
            sync_status,
        })
    }

    /// Run a full sync: fetch, parse, assemble, and record the outcome.
    ///
    /// Refuses to start while another sync for the same corpus key is in
    /// flight (stored status SYNCING).
    #[instrument(skip_all, fields(title = self.config.cfr_title, part = self.config.cfr_part))]
    pub async fn sync_now(&self, actor: &str) -> Result<SyncReport> {
        let (title, part) = (self.config.cfr_title, self.config.cfr_part);

        if let Some(state) = self.storage.get_sync_state(title, part).await? {
            if state.status == SyncStatus::Syncing {
                return Err(RegSyncError::SyncInProgress { title, part });
            }
        }

        self.storage.mark_syncing(title, part).await?;
        info!("starting corpus sync");

        match self.run_sync(actor).await {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Err(state_err) =
                    self.storage.mark_error(title, part, &err.to_string()).await
                {
                    warn!(error = %state_err, "failed to record sync error state");
                }
                Err(err)
            }
        }
    }

    /// The fallible body of a sync; the caller records ERROR on failure.
    async fn run_sync(&self, actor: &str) -> Result<SyncReport> {
        // 1. Revision metadata and working date.
        let meta = self.source.title_meta().await?;
        let date = meta
            .up_to_date_as_of
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

        // 2. Full corpus markup.
        let xml = self.source.part_markup(&date).await?;
        info!(kib = xml.len() / 1024, %date, "corpus markup fetched");

        // 3. Structural extraction.
        let tree = parse_tree(&xml)?;
        let sections = walk(&tree, self.config.cfr_part);
        info!(sections = sections.len(), "sections parsed");

        if sections.is_empty() {
            return Err(RegSyncError::parse(
                "no sections extracted from corpus markup — possible upstream format change",
            ));
        }

        // 4. Assembly inside one bounded transaction.
        let outcome = self.assemble(&sections, actor).await?;

        // 5. Record success.
        self.storage
            .mark_success(
                self.config.cfr_title,
                self.config.cfr_part,
                meta.latest_amended_on.as_deref(),
                &content_hash(&xml),
                &outcome.manual_id,
                sections.len() as u32,
            )
            .await?;

        info!(
            total = sections.len(),
            new = outcome.new_sections,
            updated = outcome.updated_sections,
            unchanged = outcome.unchanged_sections,
            "sync complete"
        );

        Ok(SyncReport {
            manual_id: outcome.manual_id,
            total_sections: sections.len() as u32,
            new_sections: outcome.new_sections,
            updated_sections: outcome.updated_sections,
            unchanged_sections: outcome.unchanged_sections,
            subpart_count: outcome.subpart_count,
            source_amended_date: meta.latest_amended_on,
        })
    }

    /// Run the assembly phase under the transaction and time bound.
    async fn assemble(
        &self,
        sections: &[regsync_shared::ParsedSection],
        actor: &str,
    ) -> Result<AssemblyOutcome> {
        let bound = Duration::from_secs(self.config.assembly_timeout_secs);

        self.storage.begin_assembly().await?;

        let assembled = tokio::time::timeout(
            bound,
            assemble_manual(&self.storage, &self.config, sections, actor),
        )
        .await;

        match assembled {
            Err(_elapsed) => {
                if let Err(e) = self.storage.rollback_assembly().await {
                    warn!(error = %e, "rollback after timeout failed");
                }
                Err(RegSyncError::Timeout {
                    seconds: self.config.assembly_timeout_secs,
                })
            }
            Ok(Err(err)) => {
                if let Err(e) = self.storage.rollback_assembly().await {
                    warn!(error = %e, "rollback after assembly failure failed");
                }
                Err(err)
            }
            Ok(Ok(outcome)) => {
                self.storage.commit_assembly().await?;
                Ok(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use regsync_shared::AppConfig;
    use regsync_source::TitleMeta;
    use uuid::Uuid;

    use crate::versioning::document_code;

    // -----------------------------------------------------------------------
    // Test harness
    // -----------------------------------------------------------------------

    /// In-memory corpus source backed by swappable fixture XML.
    #[derive(Clone)]
    struct StubSource {
        xml: Arc<Mutex<String>>,
        amended: Arc<Mutex<Option<String>>>,
        fail_fetch: Arc<Mutex<Option<String>>>,
    }

    impl StubSource {
        fn new(xml: &str) -> Self {
            Self {
                xml: Arc::new(Mutex::new(xml.to_string())),
                amended: Arc::new(Mutex::new(Some("2025-06-17".to_string()))),
                fail_fetch: Arc::new(Mutex::new(None)),
            }
        }

        fn set_xml(&self, xml: &str) {
            *self.xml.lock().unwrap() = xml.to_string();
        }

        fn set_amended(&self, date: Option<&str>) {
            *self.amended.lock().unwrap() = date.map(String::from);
        }

        fn fail_next_fetch(&self, message: &str) {
            *self.fail_fetch.lock().unwrap() = Some(message.to_string());
        }
    }

    impl CorpusSource for StubSource {
        async fn title_meta(&self) -> Result<TitleMeta> {
            Ok(TitleMeta {
                latest_amended_on: self.amended.lock().unwrap().clone(),
                up_to_date_as_of: Some("2025-08-01".to_string()),
            })
        }

        async fn part_markup(&self, _date: &str) -> Result<String> {
            if let Some(message) = self.fail_fetch.lock().unwrap().take() {
                return Err(RegSyncError::fetch(message));
            }
            Ok(self.xml.lock().unwrap().clone())
        }
    }

    fn fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/xml")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
    }

    async fn engine_with(xml: &str) -> (SyncEngine<StubSource>, StubSource) {
        let tmp = std::env::temp_dir().join(format!("regsync_core_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        let source = StubSource::new(xml);
        let config = CorpusConfig::from(&AppConfig::default());
        (SyncEngine::new(source.clone(), storage, config), source)
    }

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn first_sync_builds_the_full_hierarchy() {
        let (engine, _source) = engine_with(&fixture("part-sample.xml")).await;
        let report = engine.sync_now("admin").await.expect("first sync");

        assert_eq!(report.total_sections, 3);
        assert_eq!(report.new_sections, 3);
        assert_eq!(report.updated_sections, 0);
        assert_eq!(report.unchanged_sections, 0);
        assert_eq!(report.subpart_count, 2);
        assert_eq!(report.source_amended_date.as_deref(), Some("2025-06-17"));

        // Manual at version 2: INITIAL plus one bump for the new documents.
        let manual = engine
            .storage()
            .get_manual_by_code("osha-29cfr1926")
            .await
            .unwrap()
            .expect("manual exists");
        assert_eq!(manual.current_version, 2);

        let log = engine.storage().list_manual_versions(&manual.id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].change_type, "INITIAL");
        assert_eq!(log[1].change_type, "DOCUMENT_ADDED");
        assert!(
            log[1]
                .structure_json
                .as_deref()
                .unwrap_or("")
                .contains("\"total_sections\":3")
        );

        // Two chapters, keyed by subpart letter.
        let chapters = engine.storage().list_chapters(&manual.id).await.unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].subpart_letter, "C");
        assert_eq!(
            chapters[0].title,
            "Subpart C — General Safety and Health Provisions"
        );
        assert_eq!(chapters[1].subpart_letter, "M");

        // Three documents, each at version 1.
        for number in ["20", "500", "501"] {
            let code = document_code("osha", 1926, number);
            let doc = engine
                .storage()
                .get_document_by_code(&code)
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("document {code} missing"));
            let versions = engine.storage().list_document_versions(&doc.id).await.unwrap();
            assert_eq!(versions.len(), 1, "{code} should have exactly one version");
            assert_eq!(versions[0].version_no, 1);
        }

        // Links stamped with the pre-bump manual version.
        let links = engine.storage().list_links(&manual.id).await.unwrap();
        assert_eq!(links.len(), 3);
        assert!(links.iter().all(|l| l.added_in_version == 1));

        // Sync state reflects the success.
        let state = engine.sync_status().await.unwrap();
        assert_eq!(state.status, SyncStatus::Success);
        assert_eq!(state.section_count, 3);
        assert_eq!(state.manual_id, Some(manual.id));
        assert!(state.last_content_hash.is_some());
    }

    #[tokio::test]
    async fn resync_with_unchanged_corpus_is_idempotent() {
        let (engine, _source) = engine_with(&fixture("part-sample.xml")).await;
        engine.sync_now("admin").await.expect("first sync");
        let report = engine.sync_now("admin").await.expect("second sync");

        assert_eq!(report.new_sections, 0);
        assert_eq!(report.updated_sections, 0);
        assert_eq!(report.unchanged_sections, 3);

        let manual = engine
            .storage()
            .get_manual_by_code("osha-29cfr1926")
            .await
            .unwrap()
            .unwrap();
        // No bump, no new log entries, no new document versions.
        assert_eq!(manual.current_version, 2);
        assert_eq!(
            engine.storage().list_manual_versions(&manual.id).await.unwrap().len(),
            2
        );

        let doc = engine
            .storage()
            .get_document_by_code("osha-1926-501")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            engine.storage().list_document_versions(&doc.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn editing_one_section_versions_exactly_one_document() {
        let (engine, source) = engine_with(&fixture("part-sample.xml")).await;
        engine.sync_now("admin").await.expect("first sync");

        source.set_xml(&fixture("part-sample-edited.xml"));
        let report = engine.sync_now("admin").await.expect("second sync");

        assert_eq!(report.new_sections, 0);
        assert_eq!(report.updated_sections, 1);
        assert_eq!(report.unchanged_sections, 2);

        let manual = engine
            .storage()
            .get_manual_by_code("osha-29cfr1926")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(manual.current_version, 3);

        let log = engine.storage().list_manual_versions(&manual.id).await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].change_type, "METADATA_UPDATED");

        // The edited section is at version 2; the others stay at 1.
        let edited = engine
            .storage()
            .get_document_by_code("osha-1926-501")
            .await
            .unwrap()
            .unwrap();
        let versions = engine.storage().list_document_versions(&edited.id).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_ne!(versions[0].content_hash, versions[1].content_hash);

        for number in ["20", "500"] {
            let doc = engine
                .storage()
                .get_document_by_code(&document_code("osha", 1926, number))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(
                engine.storage().list_document_versions(&doc.id).await.unwrap().len(),
                1
            );
        }
    }

    #[tokio::test]
    async fn version_numbers_are_strictly_increasing_across_syncs() {
        let (engine, source) = engine_with(&fixture("part-sample.xml")).await;
        engine.sync_now("admin").await.unwrap();

        source.set_xml(&fixture("part-sample-edited.xml"));
        engine.sync_now("admin").await.unwrap();

        // Reverting the edit is itself a content change: version 3.
        source.set_xml(&fixture("part-sample.xml"));
        engine.sync_now("admin").await.unwrap();

        let doc = engine
            .storage()
            .get_document_by_code("osha-1926-501")
            .await
            .unwrap()
            .unwrap();
        let versions = engine.storage().list_document_versions(&doc.id).await.unwrap();
        let numbers: Vec<u32> = versions.iter().map(|v| v.version_no).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        // Reverted content hashes back to the original.
        assert_eq!(versions[0].content_hash, versions[2].content_hash);
    }

    #[tokio::test]
    async fn reserved_section_stores_the_placeholder() {
        let (engine, _source) = engine_with(&fixture("reserved-section.xml")).await;
        engine.sync_now("admin").await.expect("sync");

        let doc = engine
            .storage()
            .get_document_by_code("osha-1926-2")
            .await
            .unwrap()
            .expect("reserved document exists");
        let version_id = doc.current_version_id.expect("current version set");
        let (content, hash) = engine
            .storage()
            .get_version_content(&version_id)
            .await
            .unwrap()
            .unwrap();

        assert!(content.contains("<p><em>[Reserved]</em></p>"));
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, regsync_shared::content_hash(&content));
    }

    // -----------------------------------------------------------------------
    // Failure paths
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn zero_sections_fails_fast_without_creating_anything() {
        let (engine, _source) = engine_with(&fixture("no-sections.xml")).await;

        let err = engine.sync_now("admin").await.unwrap_err();
        assert!(matches!(err, RegSyncError::Parse { .. }));

        let state = engine.sync_status().await.unwrap();
        assert_eq!(state.status, SyncStatus::Error);
        assert!(
            state
                .last_error
                .as_deref()
                .unwrap_or("")
                .contains("no sections")
        );

        assert!(
            engine
                .storage()
                .get_manual_by_code("osha-29cfr1926")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn malformed_markup_fails_fast() {
        let (engine, _source) = engine_with("<DIV5><SECTION></DIV5>").await;

        let err = engine.sync_now("admin").await.unwrap_err();
        assert!(matches!(err, RegSyncError::Parse { .. }));
        assert_eq!(engine.sync_status().await.unwrap().status, SyncStatus::Error);
    }

    #[tokio::test]
    async fn fetch_failure_sets_error_state_and_rethrows() {
        let (engine, source) = engine_with(&fixture("part-sample.xml")).await;
        source.fail_next_fetch("corpus markup returned HTTP 503");

        let err = engine.sync_now("admin").await.unwrap_err();
        assert!(matches!(err, RegSyncError::Fetch(_)));

        let state = engine.sync_status().await.unwrap();
        assert_eq!(state.status, SyncStatus::Error);
        assert!(state.last_error.as_deref().unwrap_or("").contains("503"));

        // Fetch failures never touch document/manual state.
        assert!(
            engine
                .storage()
                .get_manual_by_code("osha-29cfr1926")
                .await
                .unwrap()
                .is_none()
        );

        // The error state is recoverable: the next trigger runs normally.
        let report = engine.sync_now("admin").await.expect("recovery sync");
        assert_eq!(report.new_sections, 3);
    }

    #[tokio::test]
    async fn concurrent_trigger_is_rejected_while_syncing() {
        let (engine, _source) = engine_with(&fixture("part-sample.xml")).await;

        // Simulate an in-flight sync holding the SYNCING state.
        engine.storage().mark_syncing(29, 1926).await.unwrap();

        let err = engine.sync_now("admin").await.unwrap_err();
        assert!(matches!(err, RegSyncError::SyncInProgress { title: 29, part: 1926 }));

        // The guard itself must not clobber the state.
        assert_eq!(
            engine.sync_status().await.unwrap().status,
            SyncStatus::Syncing
        );
    }

    // -----------------------------------------------------------------------
    // Chapter reassignment (documented "stuck link" behavior)
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn link_stays_in_original_chapter_when_subpart_moves() {
        let (engine, source) = engine_with(&fixture("part-sample.xml")).await;
        engine.sync_now("admin").await.expect("first sync");

        let manual = engine
            .storage()
            .get_manual_by_code("osha-29cfr1926")
            .await
            .unwrap()
            .unwrap();
        let doc = engine
            .storage()
            .get_document_by_code("osha-1926-501")
            .await
            .unwrap()
            .unwrap();
        let original_link = engine
            .storage()
            .get_link(&manual.id, &doc.id)
            .await
            .unwrap()
            .unwrap();
        let chapter_m = engine
            .storage()
            .get_chapter(&manual.id, "M")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(original_link.chapter_id, chapter_m.id);

        // Upstream moves §1926.501 under Subpart C with identical content.
        source.set_xml(&fixture("part-sample-moved.xml"));
        let report = engine.sync_now("admin").await.expect("second sync");
        assert_eq!(report.unchanged_sections, 3);

        // The link is not moved to the new chapter: the document stays in
        // its original chapter.
        let link_after = engine
            .storage()
            .get_link(&manual.id, &doc.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link_after.id, original_link.id);
        assert_eq!(link_after.chapter_id, chapter_m.id);
        assert_eq!(link_after.sort_order, original_link.sort_order);
    }

    // -----------------------------------------------------------------------
    // Status & update checks
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn status_defaults_to_never_before_first_sync() {
        let (engine, _source) = engine_with(&fixture("part-sample.xml")).await;
        let state = engine.sync_status().await.unwrap();
        assert_eq!(state.status, SyncStatus::Never);
        assert_eq!(state.cfr_title, 29);
        assert_eq!(state.cfr_part, 1926);
        assert_eq!(state.section_count, 0);
    }

    #[tokio::test]
    async fn check_for_updates_compares_revision_markers() {
        let (engine, source) = engine_with(&fixture("part-sample.xml")).await;

        // Never synced: always has updates.
        let check = engine.check_for_updates().await.unwrap();
        assert!(check.has_updates);
        assert_eq!(check.sync_status, SyncStatus::Never);
        assert!(check.stored_date.is_none());

        engine.sync_now("admin").await.expect("sync");

        // Markers match: nothing new.
        let check = engine.check_for_updates().await.unwrap();
        assert!(!check.has_updates);
        assert_eq!(check.stored_date.as_deref(), Some("2025-06-17"));
        assert_eq!(check.sync_status, SyncStatus::Success);

        // Upstream amends: updates available again.
        source.set_amended(Some("2025-09-30"));
        let check = engine.check_for_updates().await.unwrap();
        assert!(check.has_updates);
        assert_eq!(check.source_date.as_deref(), Some("2025-09-30"));
    }
}
