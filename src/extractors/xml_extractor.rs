//! Structured sub-document extraction
//!
//! Matched elements are serialized and re-parsed as standalone XML
//! documents with quick-xml, giving a typed element tree.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::ElementRef;
use serde::Serialize;

use super::{collapse, select, Extract, Value};
use crate::error::{Error, Result};
use crate::field::FieldSpec;

/// HTML elements the serializer writes without an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// One element of a parsed structured sub-document.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct XmlElement {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    /// Concatenated direct text content, trimmed
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// First direct child with the given tag name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let mut attributes = IndexMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Markup(format!("bad attribute in <{name}>: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
            attributes.insert(key, value);
        }
        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }
}

/// Parse markup into its root element.
pub fn parse_xml(markup: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(true);
    // Void elements never get an end tag; nesting is tracked on our own stack
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let element = XmlElement::open(&e)?;
                if VOID_ELEMENTS.contains(&element.name.as_str()) {
                    attach(&mut stack, &mut root, element);
                } else {
                    stack.push(element);
                }
            }
            Ok(Event::Empty(e)) => {
                let element = XmlElement::open(&e)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Markup("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(text.trim());
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Markup(format!(
                    "XML parse error at {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Markup(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| Error::Markup("document has no root element".to_string()))
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

/// Matched element(s) parsed as structured sub-documents.
pub struct XmlExtractor;

impl Extract for XmlExtractor {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn extract(&self, node: ElementRef<'_>, spec: &FieldSpec) -> Result<Value> {
        let Some(selector) = spec.selector.as_deref() else {
            return Ok(collapse(vec![], spec.repeated));
        };

        let mut values = Vec::new();
        for element in select(node, selector)? {
            values.push(Value::Element(parse_xml(&element.html())?));
            if !spec.repeated {
                break;
            }
        }

        Ok(collapse(values, spec.repeated))
    }
}
