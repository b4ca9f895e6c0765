//! Markup-to-semantic-HTML translation.
//!
//! Renders a node subtree into rich-text HTML using a fixed tag-mapping
//! table. Recursion is pure: each call receives only its subtree, so
//! sibling renders cannot affect one another. Unrecognized tags pass their
//! rendered children through unchanged, so unknown markup never loses data.

use crate::tree::{XmlElement, XmlNode};

/// Render a node subtree to semantic HTML.
pub fn render(node: &XmlNode) -> String {
    match node {
        XmlNode::Text(text) => escape_html(text),
        XmlNode::Element(el) => {
            let inner: String = el.children.iter().map(render).collect();
            map_tag(&el.name, &inner, el)
        }
    }
}

/// Render a slice of sibling nodes in document order.
pub fn render_nodes(nodes: &[XmlNode]) -> String {
    nodes.iter().map(render).collect()
}

/// Concatenated raw text of a subtree, unrendered and unescaped.
pub fn text_content(node: &XmlNode) -> String {
    match node {
        XmlNode::Text(text) => text.clone(),
        XmlNode::Element(el) => el.children.iter().map(text_content).collect(),
    }
}

/// Map one source tag to its semantic HTML form.
fn map_tag(tag: &str, inner: &str, el: &XmlElement) -> String {
    match tag.to_ascii_uppercase().as_str() {
        // Heading level chosen by the source-level code carried on the tag.
        "HD" => match el.attr("SOURCE").unwrap_or("") {
            "HD1" | "HED" => format!("<h3>{inner}</h3>\n"),
            "HD2" => format!("<h4>{inner}</h4>\n"),
            "HD3" => format!("<h5>{inner}</h5>\n"),
            _ => format!("<h4>{inner}</h4>\n"),
        },
        "HEAD" => format!("<h3>{inner}</h3>\n"),
        "P" => format!("<p>{inner}</p>\n"),
        "FP" => format!("<p class=\"flush\">{inner}</p>\n"),
        "NOTE" => format!("<div class=\"note\">{inner}</div>\n"),
        "EXTRACT" => format!("<blockquote>{inner}</blockquote>\n"),
        "CITA" => format!("<cite>{inner}</cite>\n"),
        // Inline emphasis selected by the type code attribute.
        "E" => match el.attr("T").unwrap_or("") {
            "04" => format!("<strong>{inner}</strong>"),
            _ => format!("<em>{inner}</em>"),
        },
        "SU" => format!("<sup>{inner}</sup>"),
        // Accent wrapper: content only.
        "AC" => inner.to_string(),
        "AUTH" | "SOURCE" => format!("<div class=\"authority\"><small>{inner}</small></div>\n"),
        "FTNT" => format!("<div class=\"footnote\"><small>{inner}</small></div>\n"),
        "SIG" => format!("<div class=\"signature\"><small>{inner}</small></div>\n"),
        // Handled by section extraction, suppressed from body content.
        "SECAUTH" | "SECTNO" | "SUBJECT" => String::new(),
        // Table-of-contents and page-break artifacts.
        "CONTENTS" | "PRTPAGE" => String::new(),
        // Structural wrappers: children only.
        "SUBPART" | "DIV5" | "DIV6" | "DIV7" | "DIV8" | "DIV9" => inner.to_string(),
        "GPH" | "GID" => "<p class=\"graphic\">[Graphic — see source corpus]</p>\n".to_string(),
        "MATH" => "<p class=\"formula\">[Mathematical formula — see source corpus]</p>\n"
            .to_string(),
        "APPENDIX" => format!("<div class=\"appendix\">{inner}</div>\n"),
        "RESERVED" => "<p><em>[Reserved]</em></p>\n".to_string(),
        // Unknown tags: pass rendered children through unchanged.
        _ => inner.to_string(),
    }
}

/// Escape text content for HTML embedding.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
