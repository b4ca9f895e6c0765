//! libSQL storage layer for manuals, documents, and sync state.
//!
//! The [`Storage`] struct wraps a libSQL database holding every persisted
//! entity: per-corpus sync state, manuals with their append-only version
//! log, chapters, versioned documents, and document links.
//!
//! The assembly phase (version management + manual assembly) runs inside an
//! explicit transaction controlled via [`Storage::begin_assembly`] /
//! [`Storage::commit_assembly`] / [`Storage::rollback_assembly`]; the sync
//! orchestrator owns that boundary. Sync-state writes happen outside it so
//! failure records survive a rollback.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use uuid::Uuid;

use regsync_shared::{RegSyncError, Result, SyncStateRecord, SyncStatus};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A manual row.
#[derive(Debug, Clone)]
pub struct ManualRow {
    pub id: String,
    pub code: String,
    pub title: String,
    pub current_version: u32,
}

/// A document row joined with its current version's hash.
#[derive(Debug, Clone)]
pub struct DocumentHead {
    pub id: String,
    pub code: String,
    pub title: String,
    pub current_version_id: Option<String>,
    pub current_hash: Option<String>,
}

/// A chapter row.
#[derive(Debug, Clone)]
pub struct ChapterRow {
    pub id: String,
    pub subpart_letter: String,
    pub title: String,
    pub sort_order: u32,
}

/// A document link row.
#[derive(Debug, Clone)]
pub struct DocumentLinkRow {
    pub id: String,
    pub chapter_id: String,
    pub document_id: String,
    pub sort_order: u32,
    pub added_in_version: u32,
}

/// A document version row (number + hash; content loaded separately).
#[derive(Debug, Clone)]
pub struct DocumentVersionRow {
    pub version_no: u32,
    pub content_hash: String,
}

/// A manual version log row.
#[derive(Debug, Clone)]
pub struct ManualVersionRow {
    pub version: u32,
    pub change_type: String,
    pub structure_json: Option<String>,
}

fn storage_err(e: impl std::fmt::Display) -> RegSyncError {
    RegSyncError::Storage(e.to_string())
}

fn upsert_err(e: impl std::fmt::Display) -> RegSyncError {
    RegSyncError::upsert(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RegSyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    RegSyncError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Assembly transaction boundary
    // -----------------------------------------------------------------------

    /// Begin the assembly transaction. Writes until commit/rollback are
    /// atomic.
    pub async fn begin_assembly(&self) -> Result<()> {
        self.conn
            .execute("BEGIN IMMEDIATE", params![])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Commit the assembly transaction.
    pub async fn commit_assembly(&self) -> Result<()> {
        self.conn
            .execute("COMMIT", params![])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Roll back the assembly transaction, discarding all of its writes.
    pub async fn rollback_assembly(&self) -> Result<()> {
        self.conn
            .execute("ROLLBACK", params![])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sync state
    // -----------------------------------------------------------------------

    /// Get the sync state for a corpus key, if one exists.
    pub async fn get_sync_state(
        &self,
        cfr_title: u32,
        cfr_part: u32,
    ) -> Result<Option<SyncStateRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT cfr_title, cfr_part, sync_status, last_synced_at, last_amended_date,
                        last_content_hash, manual_id, section_count, last_error
                 FROM sync_state WHERE cfr_title = ?1 AND cfr_part = ?2",
                params![cfr_title, cfr_part],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(SyncStateRecord {
                cfr_title: row.get::<u32>(0).map_err(storage_err)?,
                cfr_part: row.get::<u32>(1).map_err(storage_err)?,
                status: SyncStatus::parse(&row.get::<String>(2).map_err(storage_err)?),
                last_synced_at: row.get::<String>(3).ok(),
                last_amended_date: row.get::<String>(4).ok(),
                last_content_hash: row.get::<String>(5).ok(),
                manual_id: row.get::<String>(6).ok(),
                section_count: row.get::<u32>(7).map_err(storage_err)?,
                last_error: row.get::<String>(8).ok(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Mark a corpus as SYNCING, creating the state row on first use.
    pub async fn mark_syncing(&self, cfr_title: u32, cfr_part: u32) -> Result<()> {
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO sync_state (id, cfr_title, cfr_part, sync_status)
                 VALUES (?1, ?2, ?3, 'SYNCING')
                 ON CONFLICT(cfr_title, cfr_part) DO UPDATE SET
                   sync_status = 'SYNCING',
                   last_error = NULL",
                params![id.as_str(), cfr_title, cfr_part],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Record a successful sync.
    pub async fn mark_success(
        &self,
        cfr_title: u32,
        cfr_part: u32,
        last_amended_date: Option<&str>,
        corpus_hash: &str,
        manual_id: &str,
        section_count: u32,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE sync_state SET
                   sync_status = 'SUCCESS',
                   last_synced_at = ?1,
                   last_amended_date = ?2,
                   last_content_hash = ?3,
                   manual_id = ?4,
                   section_count = ?5,
                   last_error = NULL
                 WHERE cfr_title = ?6 AND cfr_part = ?7",
                params![
                    now.as_str(),
                    last_amended_date,
                    corpus_hash,
                    manual_id,
                    section_count,
                    cfr_title,
                    cfr_part
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Record a failed sync with its message.
    pub async fn mark_error(&self, cfr_title: u32, cfr_part: u32, message: &str) -> Result<()> {
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO sync_state (id, cfr_title, cfr_part, sync_status, last_error)
                 VALUES (?1, ?2, ?3, 'ERROR', ?4)
                 ON CONFLICT(cfr_title, cfr_part) DO UPDATE SET
                   sync_status = 'ERROR',
                   last_error = excluded.last_error",
                params![id.as_str(), cfr_title, cfr_part, message],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Manuals
    // -----------------------------------------------------------------------

    /// Get a manual by its business code.
    pub async fn get_manual_by_code(&self, code: &str) -> Result<Option<ManualRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, code, title, current_version FROM manuals WHERE code = ?1",
                params![code],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(ManualRow {
                id: row.get::<String>(0).map_err(storage_err)?,
                code: row.get::<String>(1).map_err(storage_err)?,
                title: row.get::<String>(2).map_err(storage_err)?,
                current_version: row.get::<u32>(3).map_err(storage_err)?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Insert a new manual at version 1. Returns the generated id.
    pub async fn insert_manual(
        &self,
        code: &str,
        title: &str,
        description: &str,
        category: &str,
        created_by: &str,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO manuals (id, code, title, description, category, current_version, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
                params![id.as_str(), code, title, description, category, created_by, now.as_str()],
            )
            .await
            .map_err(upsert_err)?;
        Ok(id)
    }

    /// Set a manual's current version counter.
    pub async fn set_manual_version(&self, manual_id: &str, version: u32) -> Result<()> {
        self.conn
            .execute(
                "UPDATE manuals SET current_version = ?1 WHERE id = ?2",
                params![version, manual_id],
            )
            .await
            .map_err(upsert_err)?;
        Ok(())
    }

    /// Append an entry to a manual's version log.
    pub async fn insert_manual_version(
        &self,
        manual_id: &str,
        version: u32,
        change_type: &str,
        change_notes: &str,
        structure_json: &str,
        created_by: &str,
    ) -> Result<()> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO manual_versions (id, manual_id, version, change_type, change_notes, structure_json, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    manual_id,
                    version,
                    change_type,
                    change_notes,
                    structure_json,
                    created_by,
                    now.as_str()
                ],
            )
            .await
            .map_err(upsert_err)?;
        Ok(())
    }

    /// List a manual's version log in ascending version order.
    pub async fn list_manual_versions(&self, manual_id: &str) -> Result<Vec<ManualVersionRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT version, change_type, structure_json FROM manual_versions
                 WHERE manual_id = ?1 ORDER BY version",
                params![manual_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(ManualVersionRow {
                version: row.get::<u32>(0).map_err(storage_err)?,
                change_type: row.get::<String>(1).map_err(storage_err)?,
                structure_json: row.get::<String>(2).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Chapters
    // -----------------------------------------------------------------------

    /// Get a chapter by its subpart letter within a manual.
    pub async fn get_chapter(
        &self,
        manual_id: &str,
        subpart_letter: &str,
    ) -> Result<Option<ChapterRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, subpart_letter, title, sort_order FROM chapters
                 WHERE manual_id = ?1 AND subpart_letter = ?2",
                params![manual_id, subpart_letter],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_chapter(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Insert a new chapter. Returns the generated id.
    pub async fn insert_chapter(
        &self,
        manual_id: &str,
        subpart_letter: &str,
        title: &str,
        sort_order: u32,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO chapters (id, manual_id, subpart_letter, title, sort_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), manual_id, subpart_letter, title, sort_order],
            )
            .await
            .map_err(upsert_err)?;
        Ok(id)
    }

    /// Update a chapter's title and sort order in place.
    pub async fn update_chapter(&self, chapter_id: &str, title: &str, sort_order: u32) -> Result<()> {
        self.conn
            .execute(
                "UPDATE chapters SET title = ?1, sort_order = ?2 WHERE id = ?3",
                params![title, sort_order, chapter_id],
            )
            .await
            .map_err(upsert_err)?;
        Ok(())
    }

    /// List chapters for a manual in sort order.
    pub async fn list_chapters(&self, manual_id: &str) -> Result<Vec<ChapterRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, subpart_letter, title, sort_order FROM chapters
                 WHERE manual_id = ?1 ORDER BY sort_order",
                params![manual_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_chapter(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Documents & versions
    // -----------------------------------------------------------------------

    /// Get a document by its business code, joined with the hash of its
    /// current version.
    pub async fn get_document_by_code(&self, code: &str) -> Result<Option<DocumentHead>> {
        let mut rows = self
            .conn
            .query(
                "SELECT d.id, d.code, d.title, d.current_version_id, v.content_hash
                 FROM documents d
                 LEFT JOIN document_versions v ON v.id = d.current_version_id
                 WHERE d.code = ?1",
                params![code],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(DocumentHead {
                id: row.get::<String>(0).map_err(storage_err)?,
                code: row.get::<String>(1).map_err(storage_err)?,
                title: row.get::<String>(2).map_err(storage_err)?,
                current_version_id: row.get::<String>(3).ok(),
                current_hash: row.get::<String>(4).ok(),
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Insert a new document. Returns the generated id.
    pub async fn insert_document(
        &self,
        code: &str,
        title: &str,
        category: &str,
        subcategory: &str,
        created_by: &str,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO documents (id, code, title, category, subcategory, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id.as_str(), code, title, category, subcategory, created_by, now.as_str()],
            )
            .await
            .map_err(upsert_err)?;
        Ok(id)
    }

    /// Repoint a document's current version and refresh its display fields.
    pub async fn update_document_head(
        &self,
        document_id: &str,
        current_version_id: &str,
        title: &str,
        subcategory: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE documents SET current_version_id = ?1, title = ?2, subcategory = ?3
                 WHERE id = ?4",
                params![current_version_id, title, subcategory, document_id],
            )
            .await
            .map_err(upsert_err)?;
        Ok(())
    }

    /// Highest version number recorded for a document, or 0 if none.
    pub async fn latest_version_no(&self, document_id: &str) -> Result<u32> {
        let mut rows = self
            .conn
            .query(
                "SELECT MAX(version_no) FROM document_versions WHERE document_id = ?1",
                params![document_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<u32>(0).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Insert an immutable document version. Returns the generated id.
    pub async fn insert_document_version(
        &self,
        document_id: &str,
        version_no: u32,
        content: &str,
        content_hash: &str,
        notes: &str,
        created_by: &str,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO document_versions (id, document_id, version_no, content, content_hash, notes, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    document_id,
                    version_no,
                    content,
                    content_hash,
                    notes,
                    created_by,
                    now.as_str()
                ],
            )
            .await
            .map_err(upsert_err)?;
        Ok(id)
    }

    /// List a document's versions in ascending version order.
    pub async fn list_document_versions(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentVersionRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT version_no, content_hash FROM document_versions
                 WHERE document_id = ?1 ORDER BY version_no",
                params![document_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(DocumentVersionRow {
                version_no: row.get::<u32>(0).map_err(storage_err)?,
                content_hash: row.get::<String>(1).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    /// Content and hash of a specific version, for inspection.
    pub async fn get_version_content(
        &self,
        version_id: &str,
    ) -> Result<Option<(String, String)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content, content_hash FROM document_versions WHERE id = ?1",
                params![version_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some((
                row.get::<String>(0).map_err(storage_err)?,
                row.get::<String>(1).map_err(storage_err)?,
            ))),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Document links
    // -----------------------------------------------------------------------

    /// Get the link for a (manual, document) pair, if one exists.
    pub async fn get_link(
        &self,
        manual_id: &str,
        document_id: &str,
    ) -> Result<Option<DocumentLinkRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, chapter_id, document_id, sort_order, added_in_version
                 FROM document_links WHERE manual_id = ?1 AND document_id = ?2",
                params![manual_id, document_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(DocumentLinkRow {
                id: row.get::<String>(0).map_err(storage_err)?,
                chapter_id: row.get::<String>(1).map_err(storage_err)?,
                document_id: row.get::<String>(2).map_err(storage_err)?,
                sort_order: row.get::<u32>(3).map_err(storage_err)?,
                added_in_version: row.get::<u32>(4).map_err(storage_err)?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Insert a document link. Returns the generated id.
    pub async fn insert_link(
        &self,
        manual_id: &str,
        chapter_id: &str,
        document_id: &str,
        sort_order: u32,
        title_override: &str,
        added_in_version: u32,
    ) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO document_links (id, manual_id, chapter_id, document_id, sort_order, title_override, added_in_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.as_str(),
                    manual_id,
                    chapter_id,
                    document_id,
                    sort_order,
                    title_override,
                    added_in_version
                ],
            )
            .await
            .map_err(upsert_err)?;
        Ok(id)
    }

    /// List links for a manual in sort order.
    pub async fn list_links(&self, manual_id: &str) -> Result<Vec<DocumentLinkRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, chapter_id, document_id, sort_order, added_in_version
                 FROM document_links WHERE manual_id = ?1 ORDER BY sort_order",
                params![manual_id],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(DocumentLinkRow {
                id: row.get::<String>(0).map_err(storage_err)?,
                chapter_id: row.get::<String>(1).map_err(storage_err)?,
                document_id: row.get::<String>(2).map_err(storage_err)?,
                sort_order: row.get::<u32>(3).map_err(storage_err)?,
                added_in_version: row.get::<u32>(4).map_err(storage_err)?,
            });
        }
        Ok(results)
    }
}

/// Convert a database row to a [`ChapterRow`].
fn row_to_chapter(row: &libsql::Row) -> Result<ChapterRow> {
    Ok(ChapterRow {
        id: row.get::<String>(0).map_err(storage_err)?,
        subpart_letter: row.get::<String>(1).map_err(storage_err)?,
        title: row.get::<String>(2).map_err(storage_err)?,
        sort_order: row.get::<u32>(3).map_err(storage_err)?,
    })
}
