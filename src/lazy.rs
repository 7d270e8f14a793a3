//! Lazily resolved fields
//!
//! Related-item and sub-page fields involve fetching further documents, so
//! they are resolved on first access and memoized per item instance. The
//! local part (narrowing the item's node, reading link attributes, building
//! related items from a sub-node) happens when the item is built; only the
//! I/O is deferred.

use std::fmt;

use futures::future::join_all;
use scraper::ElementRef;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::extractors::{parse_selector, select};
use crate::item::{Item, ItemType, Source};
use crate::urls::build_url;

/// Items of another type, built from part of this item's node or from a
/// document it links to.
///
/// - no `selector`, no `attr`: this item's own markup
/// - `selector` only: the first matching descendant, in place
/// - `attr`: the document at the URL read from that attribute (of the
///   narrowed node if a selector is set, else of this item's node)
#[derive(Debug, Clone)]
pub struct RelatedItem {
    pub item_type: ItemType,
    pub selector: Option<String>,
    pub attr: Option<String>,
}

impl RelatedItem {
    pub fn new(item_type: ItemType) -> Self {
        Self {
            item_type,
            selector: None,
            attr: None,
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = Some(attr.into());
        self
    }

    fn source(&self, node: ElementRef<'_>, owner: &ItemType) -> Result<RelatedSource> {
        let narrowed = match self.selector.as_deref() {
            Some(selector) => match select(node, selector)?.into_iter().next() {
                Some(el) => el,
                None => return Ok(RelatedSource::Nothing),
            },
            None => node,
        };
        Ok(match self.attr.as_deref() {
            Some(attr) => match narrowed.value().attr(attr) {
                Some(link) => RelatedSource::Link(link.to_string()),
                None => RelatedSource::Nothing,
            },
            None => {
                let target = self.item_type.with_cancellation(owner.cancellation_token().clone());
                RelatedSource::Local(target.instantiate_at(narrowed)?)
            }
        })
    }
}

/// One item per linked page, fetched concurrently.
#[derive(Debug, Clone)]
pub struct SubPages {
    pub item_type: ItemType,
    pub link_selector: String,
    /// Attribute holding the link, `href` by default
    pub attr: String,
}

impl SubPages {
    pub fn new(item_type: ItemType, link_selector: impl Into<String>) -> Self {
        Self {
            item_type,
            link_selector: link_selector.into(),
            attr: "href".to_string(),
        }
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attr = attr.into();
        self
    }

    fn links(&self, node: ElementRef<'_>) -> Result<Vec<String>> {
        if self.link_selector.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(select(node, &self.link_selector)?
            .into_iter()
            .filter_map(|el| el.value().attr(&self.attr))
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// A lazily resolved field declaration.
#[derive(Debug, Clone)]
pub enum LazyField {
    Related(RelatedItem),
    SubPages(SubPages),
}

impl LazyField {
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            LazyField::Related(related) => {
                if let Some(selector) = related.selector.as_deref() {
                    parse_selector(selector)?;
                }
            }
            LazyField::SubPages(sub_pages) => {
                if !sub_pages.link_selector.trim().is_empty() {
                    parse_selector(&sub_pages.link_selector)?;
                }
            }
        }
        Ok(())
    }
}

/// A sub-page that failed to fetch or build.
#[derive(Debug)]
pub struct PageFailure {
    pub url: String,
    pub error: Error,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

impl std::error::Error for PageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Outcome of one sub-page fetch, in link order.
pub type SubPage = std::result::Result<Item, PageFailure>;

pub(crate) enum RelatedSource {
    Nothing,
    /// Built from a sub-node of the owning item's document
    Local(Vec<Item>),
    Link(String),
}

/// Per-instance state of one lazy field.
pub(crate) enum LazySlot {
    Related {
        spec: RelatedItem,
        source: RelatedSource,
        cell: OnceCell<Vec<Item>>,
    },
    SubPages {
        spec: SubPages,
        links: Vec<String>,
        cell: OnceCell<Vec<SubPage>>,
    },
}

impl LazySlot {
    pub(crate) fn prepare(
        field: &LazyField,
        node: ElementRef<'_>,
        owner: &ItemType,
    ) -> Result<Self> {
        Ok(match field {
            LazyField::Related(spec) => LazySlot::Related {
                source: spec.source(node, owner)?,
                spec: spec.clone(),
                cell: OnceCell::new(),
            },
            LazyField::SubPages(spec) => LazySlot::SubPages {
                links: spec.links(node)?,
                spec: spec.clone(),
                cell: OnceCell::new(),
            },
        })
    }

    pub(crate) fn is_resolved(&self) -> bool {
        match self {
            LazySlot::Related {
                source: RelatedSource::Link(_),
                cell,
                ..
            } => cell.initialized(),
            LazySlot::Related { .. } => true,
            LazySlot::SubPages { cell, .. } => cell.initialized(),
        }
    }

    /// Related items, resolved on first call.
    pub(crate) async fn related(&self, name: &str, owner: &ItemType) -> Result<&[Item]> {
        let LazySlot::Related { spec, source, cell } = self else {
            return Err(Error::Misconfigured(format!(
                "{name:?} is a sub-page field, not a related item"
            )));
        };
        let link = match source {
            RelatedSource::Nothing => return Ok(&[][..]),
            RelatedSource::Local(items) => return Ok(items.as_slice()),
            RelatedSource::Link(link) => link,
        };
        if cell.initialized() {
            debug!(field = name, "related items cached");
        }
        let items = cell
            .get_or_try_init(|| async {
                debug!(field = name, item_type = %spec.item_type.name(), "fetching related items");
                let target = spec.item_type.with_cancellation(owner.cancellation_token().clone());
                match build_url(owner.base_url(), link) {
                    Ok(url) => target.resolve_all(Source::Request(target.request(url))).await,
                    Err(error) => Err(error),
                }
            })
            .await?;
        Ok(items)
    }

    /// Sub-page outcomes, fetched concurrently on first call.
    pub(crate) async fn sub_pages(&self, name: &str, owner: &ItemType) -> Result<&[SubPage]> {
        let LazySlot::SubPages { spec, links, cell } = self else {
            return Err(Error::Misconfigured(format!(
                "{name:?} is a related item field, not sub-pages"
            )));
        };
        if cell.initialized() {
            debug!(field = name, "sub-pages cached");
        }
        let pages = cell
            .get_or_try_init(|| async {
                debug!(field = name, links = links.len(), "fetching sub-pages");
                let target = spec.item_type.with_cancellation(owner.cancellation_token().clone());
                let target = &target;
                let tasks = links.iter().map(|link| async move {
                    let result = match build_url(owner.base_url(), link) {
                        Ok(url) => target.resolve_page(&url).await.map_err(|error| (url, error)),
                        Err(error) => Err((link.clone(), error)),
                    };
                    result.map_err(|(url, error)| {
                        warn!(url = %url, error = %error, "sub-page failed");
                        PageFailure { url, error }
                    })
                });
                Ok::<_, Error>(join_all(tasks).await)
            })
            .await?;
        Ok(pages)
    }
}

impl fmt::Debug for LazySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazySlot::Related { spec, source, cell } => {
                let resolved = match source {
                    RelatedSource::Nothing => Some(0),
                    RelatedSource::Local(items) => Some(items.len()),
                    RelatedSource::Link(_) => cell.get().map(Vec::len),
                };
                f.debug_struct("Related")
                    .field("item_type", &spec.item_type.name())
                    .field("resolved", &resolved)
                    .finish()
            }
            LazySlot::SubPages { spec, links, cell } => f
                .debug_struct("SubPages")
                .field("item_type", &spec.item_type.name())
                .field("links", links)
                .field("resolved", &cell.initialized())
                .finish(),
        }
    }
}
