//! Field declarations.

use std::fmt;
use std::sync::Arc;

use scraper::ElementRef;

use crate::error::Result;
use crate::extractors::{
    AttrExtractor, Extract, HtmlExtractor, ItemsExtractor, TextExtractor, Value, XmlExtractor,
};
use crate::item::ItemType;

/// Post-processing applied to an extracted value: coercions and cleaning hooks.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// What a field extracts.
#[derive(Clone)]
pub enum FieldKind {
    Text,
    Attribute,
    Html,
    /// Structured sub-document (XML element tree)
    Xml,
    /// Nested items of the given type
    Items(ItemType),
    /// User-supplied strategy
    Custom(Arc<dyn Extract>),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => f.write_str("Text"),
            FieldKind::Attribute => f.write_str("Attribute"),
            FieldKind::Html => f.write_str("Html"),
            FieldKind::Xml => f.write_str("Xml"),
            FieldKind::Items(item_type) => write!(f, "Items({})", item_type.name()),
            FieldKind::Custom(strategy) => write!(f, "Custom({})", strategy.name()),
        }
    }
}

/// Declaration of one field.
///
/// `selector: None` selects nothing (the attribute strategy instead reads
/// the item's own node).
#[derive(Clone)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub selector: Option<String>,
    pub attr: Option<String>,
    pub repeated: bool,
    pub coerce: Option<Transform>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            selector: None,
            attr: None,
            repeated: false,
            coerce: None,
        }
    }

    pub fn text(selector: impl Into<String>) -> Self {
        Self::new(FieldKind::Text).with_selector(selector)
    }

    pub fn attribute(selector: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::new(FieldKind::Attribute)
            .with_selector(selector)
            .with_attr(attr)
    }

    pub fn html(selector: impl Into<String>) -> Self {
        Self::new(FieldKind::Html).with_selector(selector)
    }

    pub fn xml(selector: impl Into<String>) -> Self {
        Self::new(FieldKind::Xml).with_selector(selector)
    }

    pub fn items(item_type: ItemType, selector: impl Into<String>) -> Self {
        Self::new(FieldKind::Items(item_type)).with_selector(selector)
    }

    pub fn custom(strategy: impl Extract + 'static) -> Self {
        Self::new(FieldKind::Custom(Arc::new(strategy)))
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn with_coerce<F>(mut self, coerce: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.coerce = Some(Arc::new(coerce));
        self
    }

    /// The strategy implementing this field's kind.
    pub fn strategy(&self) -> &dyn Extract {
        match &self.kind {
            FieldKind::Text => &TextExtractor,
            FieldKind::Attribute => &AttrExtractor,
            FieldKind::Html => &HtmlExtractor,
            FieldKind::Xml => &XmlExtractor,
            FieldKind::Items(_) => &ItemsExtractor,
            FieldKind::Custom(strategy) => strategy.as_ref(),
        }
    }

    /// Run the strategy against `node`.
    pub fn extract(&self, node: ElementRef<'_>) -> Result<Value> {
        self.strategy().extract(node, self)
    }

    /// Run the strategy against the node of an item of `owner`. Nested
    /// items inherit the owner's cancellation token.
    pub(crate) fn extract_for(&self, node: ElementRef<'_>, owner: &ItemType) -> Result<Value> {
        match &self.kind {
            FieldKind::Items(nested) => {
                let nested = nested.with_cancellation(owner.cancellation_token().clone());
                ItemsExtractor.extract_items(node, self.selector.as_deref(), &nested)
            }
            _ => self.extract(node),
        }
    }

    /// Apply the coercion, if any.
    pub fn coerce(&self, value: Value) -> Value {
        match &self.coerce {
            Some(coerce) => coerce(value),
            None => value,
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("kind", &self.kind)
            .field("selector", &self.selector)
            .field("attr", &self.attr)
            .field("repeated", &self.repeated)
            .field("coerce", &self.coerce.is_some())
            .finish()
    }
}
