//! Manual assembly: chapters, document links, and the manual version log.
//!
//! Runs inside the assembly transaction opened by the sync orchestrator.
//! Chapters are keyed by subpart letter and their titles updated in place;
//! document links are created once per (manual, document) pair and never
//! moved afterwards, even when a section's subpart grouping changes.

use tracing::{info, instrument};

use regsync_shared::{CorpusConfig, ManualChangeType, ParsedSection, Result};
use regsync_storage::Storage;

use crate::versioning::{self, SectionOutcome};

/// Counts produced by one assembly pass.
#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    /// The manual the sections were assembled into.
    pub manual_id: String,
    /// Sections that created a new document.
    pub new_sections: u32,
    /// Sections that appended a new document version.
    pub updated_sections: u32,
    /// Sections left untouched.
    pub unchanged_sections: u32,
    /// Distinct subpart groups processed.
    pub subpart_count: u32,
}

/// Sections grouped under one subpart letter, in first-seen order.
struct SubpartGroup<'a> {
    letter: String,
    title: String,
    sections: Vec<&'a ParsedSection>,
}

/// Group sections by subpart letter, preserving first-seen order.
fn group_by_subpart(sections: &[ParsedSection]) -> Vec<SubpartGroup<'_>> {
    let mut groups: Vec<SubpartGroup<'_>> = Vec::new();
    for section in sections {
        match groups
            .iter_mut()
            .find(|g| g.letter == section.subpart_letter)
        {
            Some(group) => group.sections.push(section),
            None => groups.push(SubpartGroup {
                letter: section.subpart_letter.clone(),
                title: section.subpart_title.clone(),
                sections: vec![section],
            }),
        }
    }
    groups
}

/// Synchronize parsed sections into the manual hierarchy.
///
/// Creates the manual (with its INITIAL version entry) on first run, then
/// per subpart group: find-or-create the chapter, apply each section via the
/// version manager, and ensure a document link exists. Bumps the manual
/// version and appends a version log entry only when at least one section
/// was created or updated.
#[instrument(skip_all, fields(sections = sections.len()))]
pub async fn assemble_manual(
    storage: &Storage,
    config: &CorpusConfig,
    sections: &[ParsedSection],
    actor: &str,
) -> Result<AssemblyOutcome> {
    let groups = group_by_subpart(sections);

    // --- Find or create the manual ---
    let (manual_id, base_version) = match storage.get_manual_by_code(&config.manual_code).await? {
        Some(manual) => (manual.id, manual.current_version),
        None => {
            let id = storage
                .insert_manual(
                    &config.manual_code,
                    &config.manual_title,
                    &config.manual_description,
                    &config.manual_category,
                    actor,
                )
                .await?;
            let snapshot =
                serde_json::json!({ "chapters": [], "documents": [] }).to_string();
            storage
                .insert_manual_version(
                    &id,
                    1,
                    ManualChangeType::Initial.as_str(),
                    "Initial import from corpus",
                    &snapshot,
                    actor,
                )
                .await?;
            info!(manual_id = %id, code = %config.manual_code, "manual created");
            (id, 1)
        }
    };

    let mut new_sections = 0u32;
    let mut updated_sections = 0u32;
    let mut unchanged_sections = 0u32;

    // --- Process each subpart group as a chapter ---
    let mut subpart_sort = 0u32;
    for group in &groups {
        subpart_sort += 1;
        let chapter_title = format!("Subpart {} — {}", group.letter, group.title);

        let chapter_id = match storage.get_chapter(&manual_id, &group.letter).await? {
            Some(chapter) => {
                if chapter.title != chapter_title || chapter.sort_order != subpart_sort {
                    storage
                        .update_chapter(&chapter.id, &chapter_title, subpart_sort)
                        .await?;
                }
                chapter.id
            }
            None => {
                storage
                    .insert_chapter(&manual_id, &group.letter, &chapter_title, subpart_sort)
                    .await?
            }
        };

        // --- Process each section as a document ---
        for section in &group.sections {
            let (document_id, outcome) =
                versioning::apply_section(storage, config, section, actor).await?;

            match outcome {
                SectionOutcome::New => new_sections += 1,
                SectionOutcome::Updated => updated_sections += 1,
                SectionOutcome::Unchanged => unchanged_sections += 1,
            }

            // Link once per (manual, document); existing links are never
            // moved or reordered.
            if storage.get_link(&manual_id, &document_id).await?.is_none() {
                storage
                    .insert_link(
                        &manual_id,
                        &chapter_id,
                        &document_id,
                        section.sort_order,
                        &section.title,
                        base_version,
                    )
                    .await?;
            }
        }
    }

    // --- Bump manual version if anything changed ---
    if new_sections + updated_sections > 0 {
        let next_version = base_version + 1;
        storage.set_manual_version(&manual_id, next_version).await?;

        let change_type = if new_sections > 0 {
            ManualChangeType::DocumentAdded
        } else {
            ManualChangeType::MetadataUpdated
        };
        let letters: Vec<&str> = groups.iter().map(|g| g.letter.as_str()).collect();
        let snapshot = serde_json::json!({
            "subparts": letters,
            "total_sections": sections.len(),
        })
        .to_string();
        let notes =
            format!("corpus sync: {new_sections} new, {updated_sections} updated sections");

        storage
            .insert_manual_version(
                &manual_id,
                next_version,
                change_type.as_str(),
                &notes,
                &snapshot,
                actor,
            )
            .await?;

        info!(version = next_version, "manual version bumped");
    }

    Ok(AssemblyOutcome {
        manual_id,
        new_sections,
        updated_sections,
        unchanged_sections,
        subpart_count: groups.len() as u32,
    })
}
