//! Raw markup extraction

use scraper::ElementRef;

use super::{collapse, select, Extract, Value};
use crate::error::Result;
use crate::field::FieldSpec;

/// Outer HTML of the matched element(s).
pub struct HtmlExtractor;

impl Extract for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extract(&self, node: ElementRef<'_>, spec: &FieldSpec) -> Result<Value> {
        let Some(selector) = spec.selector.as_deref() else {
            return Ok(collapse(vec![], spec.repeated));
        };

        let values = select(node, selector)?
            .into_iter()
            .map(|el| Value::Text(el.html()))
            .collect();

        Ok(collapse(values, spec.repeated))
    }
}
