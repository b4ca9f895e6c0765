//! Per-document version management.
//!
//! Maps a parsed section onto its persisted document and version records.
//! Document codes are the stable business key: derived deterministically
//! from the corpus key and section number, never regenerated. A new version
//! is created if and only if the rendered content hash differs from the
//! current version's hash.

use tracing::debug;

use regsync_shared::{CorpusConfig, ParsedSection, Result};
use regsync_storage::Storage;

/// Classification of one section during a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionOutcome {
    /// A document was created for this section.
    New,
    /// A new version was appended to an existing document.
    Updated,
    /// The content hash matched the current version; no writes.
    Unchanged,
}

/// Derive the stable business code for a section's document.
///
/// The result depends only on the corpus key and the short section number,
/// never on the section's current subpart grouping.
pub fn document_code(prefix: &str, part: u32, section_number: &str) -> String {
    format!("{prefix}-{part}-{section_number}")
}

/// Apply one parsed section to the document store.
///
/// Must run inside the active assembly transaction. Returns the resolved
/// document id (for link assembly) and the outcome classification.
pub async fn apply_section(
    storage: &Storage,
    config: &CorpusConfig,
    section: &ParsedSection,
    actor: &str,
) -> Result<(String, SectionOutcome)> {
    let code = document_code(&config.code_prefix, config.cfr_part, &section.section_number);
    let subcategory = format!("Subpart {}", section.subpart_letter);

    match storage.get_document_by_code(&code).await? {
        Some(doc) => {
            if doc.current_hash.as_deref() == Some(section.content_hash.as_str()) {
                Ok((doc.id, SectionOutcome::Unchanged))
            } else {
                let next_version = storage.latest_version_no(&doc.id).await? + 1;
                let version_id = storage
                    .insert_document_version(
                        &doc.id,
                        next_version,
                        &section.content,
                        &section.content_hash,
                        "Updated via corpus sync",
                        actor,
                    )
                    .await?;
                storage
                    .update_document_head(&doc.id, &version_id, &section.title, &subcategory)
                    .await?;

                debug!(code, version = next_version, "document updated");
                Ok((doc.id, SectionOutcome::Updated))
            }
        }
        None => {
            let document_id = storage
                .insert_document(
                    &code,
                    &section.title,
                    &config.manual_category,
                    &subcategory,
                    actor,
                )
                .await?;
            let version_id = storage
                .insert_document_version(
                    &document_id,
                    1,
                    &section.content,
                    &section.content_hash,
                    "Initial version via corpus import",
                    actor,
                )
                .await?;
            storage
                .update_document_head(&document_id, &version_id, &section.title, &subcategory)
                .await?;

            debug!(code, "document created");
            Ok((document_id, SectionOutcome::New))
        }
    }
}
