//! Structural extraction: node tree → ordered list of parsed sections.
//!
//! The walker descends the tree recursively, threading the current subpart
//! grouping as an explicit argument. Subpart-like containers replace that
//! context for their children when their heading matches the subpart
//! heuristic; section-like containers are extracted; everything else is
//! recursed into unchanged.

use tracing::{debug, instrument};

use regsync_shared::{ParsedSection, SubpartInfo, content_hash};

use crate::subpart::extract_subpart_info;
use crate::translate::{render, text_content};
use crate::tree::{XmlElement, XmlNode};

/// Walk a parsed markup tree and extract every section in document order.
///
/// `part` is the corpus part number whose prefix is stripped from section
/// citations (e.g., "1926.501" → "501"). Sections receive strictly
/// increasing `sort_order` values starting at 1.
#[instrument(skip_all, fields(part = part))]
pub fn walk(root: &XmlElement, part: u32) -> Vec<ParsedSection> {
    let mut sections = Vec::new();
    let mut sort_counter = 0u32;

    walk_children(
        &root.children,
        part,
        None,
        &mut sections,
        &mut sort_counter,
    );

    debug!(sections = sections.len(), "structural walk complete");
    sections
}

/// Recursive descent over sibling nodes.
///
/// `current_subpart` is threaded explicitly so recursive calls stay
/// independent of one another; `None` means no grouping has been seen yet
/// and extraction falls back to the default.
fn walk_children(
    nodes: &[XmlNode],
    part: u32,
    current_subpart: Option<&SubpartInfo>,
    sections: &mut Vec<ParsedSection>,
    sort_counter: &mut u32,
) {
    for node in nodes {
        let XmlNode::Element(el) = node else {
            continue;
        };

        if el.is_tag("SUBPART") || el.is_tag("DIV5") {
            // A grouping container: derive its subpart from the heading
            // children, else keep inheriting the enclosing context.
            let own = subpart_from_headings(&el.children);
            let ctx = own.as_ref().or(current_subpart);
            walk_children(&el.children, part, ctx, sections, sort_counter);
            continue;
        }

        if el.is_tag("SECTION") || el.is_tag("DIV8") {
            if let Some(section) =
                extract_section(&el.children, part, current_subpart, *sort_counter + 1)
            {
                *sort_counter += 1;
                sections.push(section);
            }
            continue;
        }

        walk_children(&el.children, part, current_subpart, sections, sort_counter);
    }
}

/// Try the subpart heuristic against a container's heading children.
fn subpart_from_headings(nodes: &[XmlNode]) -> Option<SubpartInfo> {
    for node in nodes {
        let XmlNode::Element(el) = node else {
            continue;
        };
        if el.is_tag("HEAD") || el.is_tag("HD") {
            let heading = text_content(node);
            if let Some(info) = extract_subpart_info(&heading) {
                return Some(info);
            }
        }
    }
    None
}

/// Extract one section from a section container's children.
///
/// Returns `None` when no section number is present; such containers are
/// structural wrappers only and are dropped without error.
fn extract_section(
    nodes: &[XmlNode],
    part: u32,
    current_subpart: Option<&SubpartInfo>,
    sort_order: u32,
) -> Option<ParsedSection> {
    let mut citation = String::new();
    let mut title = String::new();
    let mut body = String::new();

    for node in nodes {
        let XmlNode::Element(el) = node else {
            continue;
        };

        if el.is_tag("SECTNO") {
            citation = text_content(node).replace('§', "").trim().to_string();
        } else if el.is_tag("SUBJECT") {
            title = text_content(node).trim().to_string();
        } else if el.is_tag("RESERVED") {
            let reserved_text = text_content(node).trim().to_string();
            if title.is_empty() {
                title = if reserved_text.is_empty() {
                    "[Reserved]".to_string()
                } else {
                    reserved_text
                };
            }
            body.push_str("<p><em>[Reserved]</em></p>\n");
        } else {
            body.push_str(&render(node));
        }
    }

    if citation.is_empty() {
        return None;
    }

    let short_number = citation
        .strip_prefix(&format!("{part}."))
        .unwrap_or(&citation)
        .to_string();
    let subpart = current_subpart.cloned().unwrap_or_else(SubpartInfo::general);

    let display_title = format!("§{citation} — {title}");
    let content = format!(
        "<div class=\"section\" data-section=\"{citation}\">\n<h2>{display_title}</h2>\n{body}\n</div>"
    );
    let hash = content_hash(&content);

    Some(ParsedSection {
        subpart_letter: subpart.letter,
        subpart_title: subpart.title,
        section_number: short_number,
        section_citation: citation,
        title: display_title,
        content,
        content_hash: hash,
        sort_order,
    })
}
