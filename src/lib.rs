//! Declarative item extraction from HTML/XML documents
//!
//! Describe an item type once (fields bound to CSS selectors), then resolve
//! typed items from documents fetched over the network:
//! - Text, attribute, markup and structured (XML) field strategies
//! - Nested items, related items and concurrently fetched sub-pages
//! - Schema inheritance with ordered fields
//! - Pluggable fetch backends: reqwest, ureq on a bounded worker pool,
//!   headless Chromium (feature `chromium`)

pub mod config;
pub mod error;
pub mod extractors;
pub mod fetcher;
pub mod field;
pub mod item;
pub mod lazy;
pub mod schema;
pub mod urls;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{BackendKind, MetaConfig};
pub use error::{Error, Result};
pub use extractors::{Extract, Value, XmlElement};
pub use fetcher::{BackendConfig, FetchRequest, Fetcher, ProxyPool};
pub use field::{FieldKind, FieldSpec};
pub use item::{Item, ItemType, ItemTypeBuilder, Source};
pub use lazy::{PageFailure, RelatedItem, SubPage, SubPages};
pub use schema::{Meta, Schema};
