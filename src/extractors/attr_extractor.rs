//! Attribute value extraction

use scraper::ElementRef;

use super::{collapse, select, Extract, Value};
use crate::error::Result;
use crate::field::FieldSpec;

/// Value of `spec.attr` on the matched element(s).
///
/// Without a selector the node itself is read. Elements lacking the
/// attribute contribute [`Value::Null`].
pub struct AttrExtractor;

impl Extract for AttrExtractor {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn extract(&self, node: ElementRef<'_>, spec: &FieldSpec) -> Result<Value> {
        let Some(attr) = spec.attr.as_deref() else {
            return Ok(Value::Null);
        };

        let elements = match spec.selector.as_deref() {
            Some(selector) => select(node, selector)?,
            None => vec![node],
        };
        if elements.is_empty() {
            return Ok(Value::Null);
        }

        let values = elements
            .into_iter()
            .map(|el| Value::from(el.value().attr(attr).map(String::from)))
            .collect();

        Ok(collapse(values, spec.repeated))
    }
}
