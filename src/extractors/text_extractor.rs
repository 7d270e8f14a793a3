//! Text content extraction
//!
//! Selects elements by CSS selector and returns their trimmed text.

use scraper::ElementRef;

use super::{collapse, select, text_of, Extract, Value};
use crate::error::Result;
use crate::field::FieldSpec;

/// Trimmed text of the matched element(s).
///
/// A field without a selector selects nothing.
pub struct TextExtractor;

impl Extract for TextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(&self, node: ElementRef<'_>, spec: &FieldSpec) -> Result<Value> {
        let Some(selector) = spec.selector.as_deref() else {
            return Ok(collapse(vec![], spec.repeated));
        };

        let values = select(node, selector)?
            .into_iter()
            .map(|el| Value::Text(text_of(el)))
            .collect();

        Ok(collapse(values, spec.repeated))
    }
}
