//! Item schemas: ordered field declarations plus meta configuration.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::extractors::parse_selector;
use crate::fetcher::BackendConfig;
use crate::field::FieldSpec;

/// Per-type configuration.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    /// Selector for item roots; `None` means one item per document
    pub selector: Option<String>,
    /// Base for relative paths and links; empty means paths must be absolute
    pub base_url: String,
    /// Extra fetch parameters (see [`FetchRequest::with_extras`](crate::fetcher::FetchRequest::with_extras))
    pub extras: IndexMap<String, JsonValue>,
    pub backend: BackendConfig,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extras.insert(name.into(), value.into());
        self
    }

    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }
}

/// The ordered fields of an item type and its meta.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, FieldSpec>,
    meta: Meta,
}

impl Schema {
    /// Build a schema, checking that every selector parses.
    pub fn new(fields: IndexMap<String, FieldSpec>, meta: Meta) -> Result<Self> {
        if let Some(selector) = meta.selector.as_deref() {
            parse_selector(selector)?;
        }
        for spec in fields.values() {
            if let Some(selector) = spec.selector.as_deref() {
                parse_selector(selector)?;
            }
        }
        Ok(Self { fields, meta })
    }

    pub fn fields(&self) -> &IndexMap<String, FieldSpec> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn selector(&self) -> Option<&str> {
        self.meta.selector.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.meta.base_url
    }
}

/// Merge inherited declarations with a type's own.
///
/// A name keeps the position of its first appearance, scanning ancestors in
/// declared order and then `own`. Its declaration comes from `own` if
/// present, else from the earliest-listed ancestor declaring it.
pub fn merge_fields<T: Clone>(
    ancestors: &[&IndexMap<String, T>],
    own: &IndexMap<String, T>,
) -> IndexMap<String, T> {
    let mut merged: IndexMap<String, T> = IndexMap::new();
    for ancestor in ancestors {
        for (name, spec) in ancestor.iter() {
            if !merged.contains_key(name) {
                merged.insert(name.clone(), spec.clone());
            }
        }
    }
    for (name, spec) in own {
        // Replacing keeps the slot's original position
        merged.insert(name.clone(), spec.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn map(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_inherited_fields_keep_position() {
        let parent = map(&[("title", "parent"), ("body", "parent")]);
        let own = map(&[("author", "child")]);

        let merged = merge_fields(&[&parent], &own);
        let names: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(names, ["title", "body", "author"]);
    }

    #[test]
    fn test_override_keeps_ancestor_position() {
        let parent = map(&[("title", "parent"), ("body", "parent")]);
        let own = map(&[("extra", "child"), ("title", "child")]);

        let merged = merge_fields(&[&parent], &own);
        let entries: Vec<_> = merged.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            entries,
            [("title", "child"), ("body", "parent"), ("extra", "child")]
        );
    }

    #[test]
    fn test_earlier_ancestor_wins() {
        let first = map(&[("name", "first")]);
        let second = map(&[("id", "second"), ("name", "second")]);

        let merged = merge_fields(&[&first, &second], &IndexMap::new());
        let entries: Vec<_> = merged.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(entries, [("name", "first"), ("id", "second")]);
    }

    #[test]
    fn test_schema_rejects_bad_selector() {
        let mut fields = IndexMap::new();
        fields.insert("broken".to_string(), FieldSpec::text("li[["));

        let err = Schema::new(fields, Meta::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));

        let err = Schema::new(IndexMap::new(), Meta::new().selector(">>")).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn test_meta_builder() {
        let meta = Meta::new()
            .selector("li")
            .base_url("https://example.com/")
            .extra("timeout_ms", 500);
        assert_eq!(meta.selector.as_deref(), Some("li"));
        assert_eq!(meta.base_url, "https://example.com/");
        assert_eq!(meta.extras["timeout_ms"], JsonValue::from(500));
    }
}
