//! Extraction strategies
//!
//! Each strategy turns a document node plus a [`FieldSpec`] into a [`Value`].
//! Strategies never fail because a selector matched nothing: a single-valued
//! field yields [`Value::Null`] and a repeated field yields an empty list.

mod attr_extractor;
mod html_extractor;
mod items_extractor;
mod text_extractor;
mod xml_extractor;

pub use attr_extractor::AttrExtractor;
pub use html_extractor::HtmlExtractor;
pub use items_extractor::ItemsExtractor;
pub use text_extractor::TextExtractor;
pub use xml_extractor::{parse_xml, XmlElement, XmlExtractor};

use scraper::{ElementRef, Selector};

use crate::error::{Error, Result};
use crate::field::FieldSpec;
use crate::item::Item;

/// A resolved field value.
#[derive(Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Element(XmlElement),
    Item(Item),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            Value::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Value::Item(item) => Some(item),
            _ => None,
        }
    }

    /// Text values of a list, `None` for non-text entries.
    pub fn texts(&self) -> Vec<Option<&str>> {
        self.as_list()
            .map(|values| values.iter().map(Value::as_text).collect())
            .unwrap_or_default()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map(Value::Text).unwrap_or(Value::Null)
    }
}

/// An extraction strategy.
///
/// The default `extract` is the abstract base contract: calling it on a
/// strategy that does not override it is a programmer error.
pub trait Extract: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str {
        "custom"
    }

    fn extract(&self, node: ElementRef<'_>, spec: &FieldSpec) -> Result<Value> {
        let _ = (node, spec);
        Err(Error::Misconfigured(format!(
            "{} strategy does not implement extract",
            self.name()
        )))
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Descendants of `node` matching `selector`, in document order.
pub(crate) fn select<'a>(node: ElementRef<'a>, selector: &str) -> Result<Vec<ElementRef<'a>>> {
    let selector = parse_selector(selector)?;
    Ok(node.select(&selector).collect())
}

/// Trimmed text content of an element
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// First value (or null) unless the field is repeated.
pub(crate) fn collapse(values: Vec<Value>, repeated: bool) -> Value {
    if repeated {
        Value::List(values)
    } else {
        values.into_iter().next().unwrap_or(Value::Null)
    }
}
