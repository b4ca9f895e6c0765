//! Source markup adapter: raw XML text → ordered, attributed node tree.
//!
//! Built on `quick-xml`'s event reader. The tree preserves document order,
//! element attributes, and text content with entities unescaped. Malformed
//! input is a hard stop; no partial tree is ever returned.

use quick_xml::Reader;
use quick_xml::events::Event;

use regsync_shared::{RegSyncError, Result};

/// A node in the parsed markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// A text leaf, entities already unescaped.
    Text(String),
    /// A tagged element with attributes and ordered children.
    Element(XmlElement),
}

/// A tagged element carrying an attribute map and ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// Tag name as written in the source.
    pub name: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    /// Look up an attribute value, case-insensitive on the key.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True when the tag name matches, ignoring ASCII case.
    pub fn is_tag(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Synthetic root element name wrapping all top-level nodes.
const DOCUMENT_ROOT: &str = "#document";

/// Parse raw markup text into an ordered node tree.
///
/// Returns a synthetic `#document` root whose children are the top-level
/// nodes of the input. Any well-formedness violation (mismatched or
/// unclosed tags, bad entities) returns a parse error.
pub fn parse_tree(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = vec![XmlElement::new(DOCUMENT_ROOT.into(), Vec::new())];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attrs = read_attrs(e, &reader)?;
                stack.push(XmlElement::new(name, attrs));
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attrs = read_attrs(e, &reader)?;
                let el = XmlElement::new(name, attrs);
                push_child(&mut stack, XmlNode::Element(el));
            }
            Ok(Event::End(_)) => {
                // quick-xml validates end-tag names against the open stack,
                // so an End event always closes the innermost element.
                let el = stack.pop().expect("element stack underflow");
                if stack.is_empty() {
                    return Err(RegSyncError::parse("unbalanced closing tag"));
                }
                push_child(&mut stack, XmlNode::Element(el));
            }
            Ok(Event::Text(ref t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| parse_err(&reader, &e.to_string()))?;
                if !text.is_empty() {
                    push_child(&mut stack, XmlNode::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(ref t)) => {
                let text = String::from_utf8_lossy(t.as_ref()).to_string();
                if !text.is_empty() {
                    push_child(&mut stack, XmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, doctypes, and processing instructions
            // carry nothing downstream cares about.
            Ok(_) => {}
            Err(e) => return Err(parse_err(&reader, &e.to_string())),
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(RegSyncError::parse(format!(
            "unexpected end of input with {} unclosed element(s)",
            stack.len() - 1
        )));
    }

    Ok(stack.pop().expect("document root"))
}

/// Decode an element's attributes in document order.
fn read_attrs(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| parse_err(reader, &err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| parse_err(reader, &err.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn push_child(stack: &mut [XmlElement], node: XmlNode) {
    stack
        .last_mut()
        .expect("element stack underflow")
        .children
        .push(node);
}

fn parse_err(reader: &Reader<&[u8]>, message: &str) -> RegSyncError {
    RegSyncError::parse(format!(
        "malformed markup at byte {}: {message}",
        reader.buffer_position()
    ))
}
