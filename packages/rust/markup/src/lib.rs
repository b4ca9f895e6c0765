//! Corpus markup handling: XML tree parsing, semantic HTML translation,
//! subpart heading heuristics, and structural section extraction.
//!
//! The pipeline is: raw XML → [`parse_tree`] → node tree → [`walk`] →
//! ordered [`ParsedSection`](regsync_shared::ParsedSection) list. The walker
//! calls [`render`] and [`extract_subpart_info`] internally.

pub mod subpart;
pub mod translate;
pub mod tree;
pub mod walker;

pub use subpart::extract_subpart_info;
pub use translate::{render, text_content};
pub use tree::{XmlElement, XmlNode, parse_tree};
pub use walker::walk;
