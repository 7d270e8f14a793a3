//! URL helpers: joining, absoluteness checks and query merging.

use url::Url;

use crate::error::Result;

/// Join a possibly-relative `path` against `base`.
///
/// An empty base means `path` must already be absolute.
pub fn join(base: &str, path: &str) -> Result<String> {
    if base.is_empty() {
        return Ok(Url::parse(path)?.to_string());
    }
    let base = Url::parse(base)?;
    Ok(base.join(path)?.to_string())
}

/// Whether `url` carries its own host.
pub fn is_absolute(url: &str) -> bool {
    Url::parse(url).map(|u| u.has_host()).unwrap_or(false)
}

/// Resolve a link found in a document against the schema's base URL.
///
/// Empty links stay empty; absolute links are returned untouched.
pub fn build_url(base: &str, path: &str) -> Result<String> {
    let path = path.trim();
    if path.is_empty() || is_absolute(path) {
        return Ok(path.to_string());
    }
    join(base, path)
}

/// Append `params` to the query string of `url`, keeping existing pairs.
pub fn url_concat<K, V>(url: &str, params: &[(K, V)]) -> Result<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return Ok(url.to_string());
    }
    let mut parsed = Url::parse(url)?;
    parsed
        .query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_relative() {
        assert_eq!(
            join("https://stallman.org/", "/archives").unwrap(),
            "https://stallman.org/archives"
        );
        assert_eq!(
            join("https://base.com/dir/", "relative/path").unwrap(),
            "https://base.com/dir/relative/path"
        );
    }

    #[test]
    fn test_join_without_base() {
        assert_eq!(
            join("", "https://example.com/a").unwrap(),
            "https://example.com/a"
        );
        assert!(join("", "/a").is_err());
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("http://gooble.com/res1"));
        assert!(!is_absolute("/res1"));
        assert!(!is_absolute("res1"));
    }

    #[test]
    fn test_build_url() {
        assert_eq!(
            build_url("http://gooble.com", "/res1").unwrap(),
            "http://gooble.com/res1"
        );
        assert_eq!(
            build_url("http://gooble.com", "https://other.org/x").unwrap(),
            "https://other.org/x"
        );
        assert_eq!(build_url("http://gooble.com", "").unwrap(), "");
    }

    #[test]
    fn test_url_concat_preserves_existing_query() {
        let url = url_concat("https://example.com/search?q=rust", &[("page", "2")]).unwrap();
        assert_eq!(url, "https://example.com/search?q=rust&page=2");

        let untouched = url_concat::<&str, &str>("https://example.com/?a=1", &[]).unwrap();
        assert_eq!(untouched, "https://example.com/?a=1");
    }
}
