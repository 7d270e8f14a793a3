//! Nested item extraction
//!
//! Builds one item of the nested type per matched element. Purely local:
//! no document is fetched.

use scraper::ElementRef;

use super::{select, Extract, Value};
use crate::error::{Error, Result};
use crate::field::{FieldKind, FieldSpec};
use crate::item::{Item, ItemType};

/// List of nested items rooted at the matched elements.
pub struct ItemsExtractor;

impl ItemsExtractor {
    /// One `item_type` item per element matching `selector` under `node`.
    pub fn extract_items(
        &self,
        node: ElementRef<'_>,
        selector: Option<&str>,
        item_type: &ItemType,
    ) -> Result<Value> {
        let Some(selector) = selector else {
            return Ok(Value::List(vec![]));
        };

        let items = select(node, selector)?
            .into_iter()
            .map(|el| Item::from_node(item_type, el).map(Value::Item))
            .collect::<Result<Vec<_>>>()?;

        Ok(Value::List(items))
    }
}

impl Extract for ItemsExtractor {
    fn name(&self) -> &'static str {
        "items"
    }

    fn extract(&self, node: ElementRef<'_>, spec: &FieldSpec) -> Result<Value> {
        let FieldKind::Items(item_type) = &spec.kind else {
            return Err(Error::Misconfigured(
                "items strategy needs a nested item type".to_string(),
            ));
        };
        self.extract_items(node, spec.selector.as_deref(), item_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemType;
    use scraper::Html;

    fn link_type() -> ItemType {
        ItemType::builder("Link")
            .field("label", FieldSpec::text("span"))
            .field("href", FieldSpec::attribute("a", "href"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_nested_items() {
        let document = Html::parse_document(
            r#"<ul class="menu">
                <li><span>Home</span><a href="/home">go</a></li>
                <li><span>About</span><a href="/about">go</a></li>
            </ul>"#,
        );

        let spec = FieldSpec::items(link_type(), "ul.menu li");
        let value = ItemsExtractor.extract(document.root_element(), &spec).unwrap();

        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 2);
        let second = items[1].as_item().unwrap();
        assert_eq!(second.text("label"), Some("About"));
        assert_eq!(second.text("href"), Some("/about"));
    }

    #[test]
    fn test_nested_items_without_selector() {
        let document = Html::parse_document("<ul><li>1</li></ul>");

        let spec = FieldSpec::new(FieldKind::Items(link_type()));
        let value = ItemsExtractor.extract(document.root_element(), &spec).unwrap();
        assert_eq!(value, Value::List(vec![]));
    }

    #[test]
    fn test_items_strategy_needs_type() {
        let document = Html::parse_document("<ul><li>1</li></ul>");

        let err = ItemsExtractor
            .extract(document.root_element(), &FieldSpec::text("li"))
            .unwrap_err();
        assert!(matches!(err, Error::Misconfigured(_)));
    }
}
