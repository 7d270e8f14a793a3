//! Item types and items
//!
//! An [`ItemType`] is a built schema: ordered fields, cleaning hooks, lazy
//! fields, meta and a fetcher. An [`Item`] is one instance extracted from a
//! document node.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use scraper::{ElementRef, Html};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};
use crate::extractors::{parse_selector, Value};
use crate::fetcher::{FetchRequest, Fetcher};
use crate::field::{FieldSpec, Transform};
use crate::lazy::{LazyField, LazySlot, RelatedItem, SubPage, SubPages};
use crate::schema::{merge_fields, Meta, Schema};
use crate::urls;

/// Where [`ItemType::resolve_all`] reads its document from.
#[derive(Debug, Clone)]
pub enum Source {
    /// Document text already in hand
    Content(String),
    /// A request to fetch with the type's backend
    Request(FetchRequest),
}

struct ItemTypeInner {
    name: String,
    schema: Schema,
    hooks: IndexMap<String, Transform>,
    lazy: IndexMap<String, LazyField>,
    fetcher: Fetcher,
}

/// A built item schema. Cheap to clone.
#[derive(Clone)]
pub struct ItemType {
    inner: Arc<ItemTypeInner>,
    cancel: CancellationToken,
}

impl ItemType {
    pub fn builder(name: impl Into<String>) -> ItemTypeBuilder {
        ItemTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn meta(&self) -> &Meta {
        self.inner.schema.meta()
    }

    pub fn base_url(&self) -> &str {
        self.inner.schema.base_url()
    }

    pub fn lazy_fields(&self) -> &IndexMap<String, LazyField> {
        &self.inner.lazy
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The same type, with every fetch it (or any item it produces) makes
    /// abandoned once `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> ItemType {
        ItemType {
            inner: Arc::clone(&self.inner),
            cancel: token,
        }
    }

    /// A GET request for `url` carrying this type's extra fetch parameters.
    pub fn request(&self, url: impl Into<String>) -> FetchRequest {
        FetchRequest::get(url).with_extras(&self.meta().extras)
    }

    /// All items in the document read from `source`.
    ///
    /// With a meta selector, one item per match in document order; without,
    /// a single item rooted at the document root. Empty content yields no items.
    pub async fn resolve_all(&self, source: Source) -> Result<Vec<Item>> {
        let text = match source {
            Source::Content(text) => text,
            Source::Request(request) => self.fetch(request).await?,
        };
        let items = self.instantiate_all(&text)?;
        info!(item_type = %self.name(), count = items.len(), "resolved items");
        Ok(items)
    }

    /// Fetch the document at `path` (joined to the base URL) and resolve all items.
    pub async fn resolve_all_from(&self, path: &str) -> Result<Vec<Item>> {
        let url = urls::join(self.base_url(), path)?;
        self.resolve_all(Source::Request(self.request(url))).await
    }

    /// The item at position `index` of the document at `path`.
    pub async fn resolve_one(&self, path: &str, index: usize) -> Result<Item> {
        let items = self.resolve_all_from(path).await?;
        items
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::NotFound {
                type_name: self.name().to_string(),
                index,
            })
    }

    /// One item rooted at the whole document at `url`.
    pub(crate) async fn resolve_page(&self, url: &str) -> Result<Item> {
        let text = self.fetch(self.request(url)).await?;
        let document = Html::parse_document(&text);
        Item::from_node(self, document.root_element())
    }

    async fn fetch(&self, request: FetchRequest) -> Result<String> {
        self.inner
            .fetcher
            .fetch_cancellable(request, &self.cancel)
            .await
    }

    fn instantiate_all(&self, text: &str) -> Result<Vec<Item>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let document = Html::parse_document(text);
        self.instantiate_at(document.root_element())
    }

    /// Items under `node` (itself included) matching the meta selector, or a
    /// single item rooted at `node` without one.
    pub(crate) fn instantiate_at(&self, node: ElementRef<'_>) -> Result<Vec<Item>> {
        let Some(selector) = self.schema().selector() else {
            return Ok(vec![Item::from_node(self, node)?]);
        };
        let selector = parse_selector(selector)?;
        std::iter::once(node)
            .filter(|el| selector.matches(el))
            .chain(node.select(&selector))
            .map(|el| Item::from_node(self, el))
            .collect()
    }

    fn hook(&self, field: &str) -> Option<&Transform> {
        self.inner.hooks.get(field)
    }
}

impl fmt::Debug for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemType")
            .field("name", &self.inner.name)
            .field("fields", &self.inner.schema.fields().keys().collect::<Vec<_>>())
            .field("lazy", &self.inner.lazy.keys().collect::<Vec<_>>())
            .field("meta", self.inner.schema.meta())
            .finish()
    }
}

/// Declares an [`ItemType`].
///
/// ```no_run
/// use dataland::{FieldSpec, ItemType, Meta};
///
/// let row = ItemType::builder("Row")
///     .field("column1", FieldSpec::text("td.c1").repeated())
///     .meta(Meta::new().selector("table tr"))
///     .build()
///     .unwrap();
/// ```
pub struct ItemTypeBuilder {
    name: String,
    fields: IndexMap<String, FieldSpec>,
    hooks: IndexMap<String, Transform>,
    lazy: IndexMap<String, LazyField>,
    ancestors: Vec<ItemType>,
    meta: Option<Meta>,
}

impl ItemTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            hooks: IndexMap::new(),
            lazy: IndexMap::new(),
            ancestors: Vec::new(),
            meta: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Cleaning hook for `field`, run after extraction and before coercion.
    pub fn clean<F>(mut self, field: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.hooks.insert(field.into(), Arc::new(hook));
        self
    }

    pub fn related(mut self, name: impl Into<String>, related: RelatedItem) -> Self {
        self.lazy.insert(name.into(), LazyField::Related(related));
        self
    }

    pub fn sub_pages(mut self, name: impl Into<String>, sub_pages: SubPages) -> Self {
        self.lazy.insert(name.into(), LazyField::SubPages(sub_pages));
        self
    }

    /// Inherit fields, hooks, lazy fields and meta from `parent`. Earlier
    /// parents take precedence over later ones.
    pub fn extends(mut self, parent: &ItemType) -> Self {
        self.ancestors.push(parent.clone());
        self
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn build(self) -> Result<ItemType> {
        let fields = merge_fields(
            &self
                .ancestors
                .iter()
                .map(|a| a.schema().fields())
                .collect::<Vec<_>>(),
            &self.fields,
        );
        let hooks = merge_fields(
            &self
                .ancestors
                .iter()
                .map(|a| &a.inner.hooks)
                .collect::<Vec<_>>(),
            &self.hooks,
        );
        let lazy = merge_fields(
            &self
                .ancestors
                .iter()
                .map(|a| a.lazy_fields())
                .collect::<Vec<_>>(),
            &self.lazy,
        );

        if let Some(name) = lazy.keys().find(|name| fields.contains_key(*name)) {
            return Err(Error::Misconfigured(format!(
                "{name:?} is declared both as a field and as a lazy field of {}",
                self.name
            )));
        }
        for field in lazy.values() {
            field.validate()?;
        }

        let meta = match self.meta {
            Some(meta) => meta,
            None => self
                .ancestors
                .first()
                .map(|a| a.meta().clone())
                .unwrap_or_default(),
        };
        let fetcher = meta.backend.fetcher();
        let schema = Schema::new(fields, meta)?;

        Ok(ItemType {
            inner: Arc::new(ItemTypeInner {
                name: self.name,
                schema,
                hooks,
                lazy,
                fetcher,
            }),
            cancel: CancellationToken::new(),
        })
    }
}

/// One extracted item.
///
/// Eager fields are computed at construction. Related-item and sub-page
/// fields are resolved on first access and cached for the life of the item.
pub struct Item {
    item_type: ItemType,
    markup: String,
    values: IndexMap<String, Value>,
    lazy: IndexMap<String, LazySlot>,
}

impl Item {
    /// Build an item rooted at `node`: extract, clean then coerce each field
    /// in schema order.
    pub fn from_node(item_type: &ItemType, node: ElementRef<'_>) -> Result<Item> {
        let mut values = IndexMap::with_capacity(item_type.schema().fields().len());
        for (name, spec) in item_type.schema().fields() {
            let mut value = spec.extract_for(node, item_type)?;
            if let Some(hook) = item_type.hook(name) {
                value = hook(value);
            }
            values.insert(name.clone(), spec.coerce(value));
        }

        let lazy = item_type
            .lazy_fields()
            .iter()
            .map(|(name, field)| {
                LazySlot::prepare(field, node, item_type).map(|slot| (name.clone(), slot))
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        Ok(Item {
            item_type: item_type.clone(),
            markup: node.html(),
            values,
            lazy,
        })
    }

    /// Build an item from an element's markup.
    ///
    /// A full document (`<html>` or doctype) is rooted at its root element;
    /// anything else is parsed as a body fragment and rooted at its first
    /// top-level element.
    pub fn from_markup(item_type: &ItemType, markup: &str) -> Result<Item> {
        let head: String = markup.trim_start().chars().take(9).collect();
        let head = head.to_ascii_lowercase();
        if head.starts_with("<!doctype") || head.starts_with("<html") {
            let document = Html::parse_document(markup);
            return Item::from_node(item_type, document.root_element());
        }

        let fragment = Html::parse_fragment(markup);
        let node = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)
            .ok_or_else(|| Error::InvalidSource(format!("no element in {markup:?}")))?;
        Item::from_node(item_type, node)
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn type_name(&self) -> &str {
        self.item_type.name()
    }

    /// Outer markup of the node this item was built from.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    /// Assign a field. Lazy fields are derived and cannot be assigned.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let name = name.into();
        if self.lazy.contains_key(&name) {
            return Err(Error::ImmutableField { field: name });
        }
        self.values.insert(name, value.into());
        Ok(())
    }

    /// Items of a related-item field, fetched on first access.
    pub async fn related(&self, name: &str) -> Result<&[Item]> {
        self.slot(name)?.related(name, &self.item_type).await
    }

    /// Sub-page outcomes of a sub-page field, in link order, fetched on
    /// first access. Failed pages are reported individually.
    pub async fn sub_pages(&self, name: &str) -> Result<&[SubPage]> {
        self.slot(name)?.sub_pages(name, &self.item_type).await
    }

    /// Whether a lazy field has been resolved and cached.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.lazy.get(name).is_some_and(LazySlot::is_resolved)
    }

    fn slot(&self, name: &str) -> Result<&LazySlot> {
        self.lazy.get(name).ok_or_else(|| {
            Error::Misconfigured(format!("{} has no lazy field {name:?}", self.type_name()))
        })
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.values == other.values
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("type", &self.type_name())
            .field("values", &self.values)
            .field("lazy", &self.lazy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::BackendConfig;
    use crate::testing::MockBackend;

    const TABLE: &str = r#"<html><body><table>
        <tr><td class="c1">1</td><td class="c2">a</td></tr>
        <tr><td class="c1">2</td><td class="c2">b</td></tr>
    </table></body></html>"#;

    fn mock_meta(backend: &MockBackend) -> Meta {
        Meta::new()
            .base_url("https://example.com/")
            .backend(BackendConfig::asynchronous(backend.clone()))
    }

    fn row_type(meta: Meta) -> ItemType {
        ItemType::builder("Row")
            .field("column1", FieldSpec::text("td.c1"))
            .field("column2", FieldSpec::text("td.c2"))
            .meta(meta.selector("table tr"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_all_from_content() {
        let rows = row_type(Meta::new())
            .resolve_all(Source::Content(TABLE.to_string()))
            .await
            .unwrap();

        let column1: Vec<_> = rows.iter().map(|r| r.text("column1")).collect();
        assert_eq!(column1, [Some("1"), Some("2")]);
        assert_eq!(rows[1].text("column2"), Some("b"));
    }

    #[tokio::test]
    async fn test_resolve_all_without_selector() {
        let page = ItemType::builder("Page")
            .field("cells", FieldSpec::text("td").repeated())
            .build()
            .unwrap();

        let items = page.resolve_all(Source::Content(TABLE.to_string())).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].get("cells").unwrap().texts(),
            [Some("1"), Some("a"), Some("2"), Some("b")]
        );
    }

    #[tokio::test]
    async fn test_empty_content_yields_no_items() {
        let rows = row_type(Meta::new());
        assert!(rows.resolve_all(Source::Content(String::new())).await.unwrap().is_empty());
        assert!(rows
            .resolve_all(Source::Content("  \n".to_string()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_resolve_one() {
        let backend = MockBackend::new().with_page("https://example.com/table", TABLE);
        let rows = row_type(mock_meta(&backend));

        let second = rows.resolve_one("/table", 1).await.unwrap();
        assert_eq!(second.text("column1"), Some("2"));
        assert_eq!(backend.requests()[0].url, "https://example.com/table");
    }

    #[tokio::test]
    async fn test_resolve_one_repeated_text() {
        let backend = MockBackend::new().with_page(
            "https://example.com/",
            r#"<html><div class="column1"><li>1</li><li>2</li></div></html>"#,
        );
        let columns = ItemType::builder("Columns")
            .field("column1", FieldSpec::text("div.column1 li").repeated())
            .meta(mock_meta(&backend))
            .build()
            .unwrap();

        let item = columns.resolve_one("/", 0).await.unwrap();
        assert_eq!(item.get("column1").unwrap().texts(), [Some("1"), Some("2")]);
    }

    #[tokio::test]
    async fn test_resolve_one_out_of_range() {
        let backend = MockBackend::new().with_page("https://example.com/table", TABLE);
        let rows = row_type(mock_meta(&backend));

        let err = rows.resolve_one("/table", 2).await.unwrap_err();
        match err {
            Error::NotFound { type_name, index } => {
                assert_eq!(type_name, "Row");
                assert_eq!(index, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_relative_path_without_base_url() {
        let rows = row_type(Meta::new());
        let err = rows.resolve_all_from("/table").await.unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        let backend = MockBackend::new().with_failure("https://example.com/table");
        let rows = row_type(mock_meta(&backend));

        let err = rows.resolve_all_from("table").await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_meta_extras_shape_request() {
        let backend = MockBackend::new().with_page("https://example.com/table?page=3", TABLE);
        let rows = row_type(
            mock_meta(&backend)
                .extra("params", serde_json::json!({"page": 3}))
                .extra("headers", serde_json::json!({"Accept": "text/html"})),
        );

        let items = rows.resolve_all_from("/table").await.unwrap();
        assert_eq!(items.len(), 2);

        let sent = &backend.requests()[0];
        assert_eq!(sent.url, "https://example.com/table?page=3");
        assert!(sent
            .headers
            .contains(&("Accept".to_string(), "text/html".to_string())));
    }

    #[tokio::test]
    async fn test_cancelled_resolution() {
        let backend = MockBackend::new().with_page("https://example.com/table", TABLE);
        let token = CancellationToken::new();
        let rows = row_type(mock_meta(&backend)).with_cancellation(token.clone());
        token.cancel();

        let err = rows.resolve_all_from("/table").await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_clean_hook_then_coerce() {
        let price = ItemType::builder("Price")
            .field(
                "amount",
                FieldSpec::text("span").with_coerce(|v| match v {
                    Value::Text(s) => Value::Text(format!("{s} EUR")),
                    other => other,
                }),
            )
            .clean("amount", |v| match v {
                Value::Text(s) => Value::Text(s.trim_start_matches('€').to_string()),
                other => other,
            })
            .build()
            .unwrap();

        let item = Item::from_markup(&price, "<div><span>€12</span></div>").unwrap();
        assert_eq!(item.text("amount"), Some("12 EUR"));
    }

    #[test]
    fn test_inheritance() {
        let base = ItemType::builder("Base")
            .field("title", FieldSpec::text("h1"))
            .field("body", FieldSpec::text("p"))
            .clean("title", |v| match v {
                Value::Text(s) => Value::Text(s.to_uppercase()),
                other => other,
            })
            .meta(Meta::new().selector("article"))
            .build()
            .unwrap();
        let post = ItemType::builder("Post")
            .extends(&base)
            .field("author", FieldSpec::text(".author"))
            .field("body", FieldSpec::html("p"))
            .build()
            .unwrap();

        let names: Vec<_> = post.schema().field_names().collect();
        assert_eq!(names, ["title", "body", "author"]);
        assert_eq!(post.schema().selector(), Some("article"));

        let item = Item::from_markup(
            &post,
            r#"<article><h1>Hello</h1><p>text</p><span class="author">me</span></article>"#,
        )
        .unwrap();
        assert_eq!(item.text("title"), Some("HELLO"));
        assert_eq!(item.text("body"), Some("<p>text</p>"));
        assert_eq!(item.text("author"), Some("me"));
    }

    #[test]
    fn test_inheritance_from_several_parents() {
        let root = ItemType::builder("Root")
            .field("id", FieldSpec::text(".id"))
            .field("title", FieldSpec::text("h1"))
            .meta(Meta::new().selector("article"))
            .build()
            .unwrap();
        let left = ItemType::builder("Left")
            .extends(&root)
            .field("title", FieldSpec::text("h2"))
            .field("summary", FieldSpec::text(".left"))
            .build()
            .unwrap();
        let right = ItemType::builder("Right")
            .field("summary", FieldSpec::text(".right"))
            .field("tags", FieldSpec::text(".tag"))
            .field("id", FieldSpec::text(".other-id"))
            .meta(Meta::new().selector("section"))
            .build()
            .unwrap();
        let child = ItemType::builder("Child")
            .extends(&left)
            .extends(&right)
            .field("tags", FieldSpec::html(".tag"))
            .field("extra", FieldSpec::text("em"))
            .build()
            .unwrap();

        let names: Vec<_> = child.schema().field_names().collect();
        assert_eq!(names, ["id", "title", "summary", "tags", "extra"]);
        assert_eq!(child.schema().selector(), Some("article"));

        let item = Item::from_markup(
            &child,
            r#"<article>
                <span class="id">7</span><span class="other-id">8</span>
                <h1>Root</h1><h2>Left</h2>
                <p class="left">L</p><p class="right">R</p>
                <b class="tag">a</b><em>e</em>
            </article>"#,
        )
        .unwrap();
        assert_eq!(item.text("id"), Some("7"));
        assert_eq!(item.text("title"), Some("Left"));
        assert_eq!(item.text("summary"), Some("L"));
        assert_eq!(item.text("tags"), Some(r#"<b class="tag">a</b>"#));
        assert_eq!(item.text("extra"), Some("e"));
    }

    #[test]
    fn test_from_markup_without_element() {
        let rows = row_type(Meta::new());
        let err = Item::from_markup(&rows, "just text").unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
    }

    #[test]
    fn test_from_markup_document() {
        let page = ItemType::builder("Page")
            .field("title", FieldSpec::text("title"))
            .build()
            .unwrap();

        let item = Item::from_markup(&page, "<!DOCTYPE html><html><head><title>T</title></head></html>")
            .unwrap();
        assert_eq!(item.text("title"), Some("T"));
    }

    #[test]
    fn test_build_rejects_invalid_selector() {
        let err = ItemType::builder("Broken")
            .field("x", FieldSpec::text("td[["))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn test_build_rejects_duplicate_lazy_name() {
        let target = ItemType::builder("Target").build().unwrap();
        let err = ItemType::builder("Dup")
            .field("detail", FieldSpec::text("p"))
            .related("detail", RelatedItem::new(target))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Misconfigured(_)));
    }

    #[test]
    fn test_set_field() {
        let rows = ItemType::builder("Row")
            .field("column1", FieldSpec::text(".c1"))
            .field("column2", FieldSpec::text(".c2"))
            .build()
            .unwrap();
        let mut item = Item::from_markup(&rows, r#"<div><span class="c1">1</span></div>"#).unwrap();
        assert_eq!(item.text("column1"), Some("1"));
        assert_eq!(item.get("column2"), Some(&Value::Null));

        item.set("column2", "x").unwrap();
        assert_eq!(item.text("column2"), Some("x"));
    }
}
