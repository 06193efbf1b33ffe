// src/utils/url.rs

//! Repository URL helpers.

use url::Url;

use crate::models::keys;

/// Remote URL of a node's tree document.
///
/// # Examples
/// ```
/// use content_sync::utils::url::node_json_url;
///
/// assert_eq!(
///     node_json_url("http://localhost:4502", "/content/site"),
///     "http://localhost:4502/content/site.infinity.json"
/// );
/// assert_eq!(
///     node_json_url("http://localhost:4502/", "/content/site.1.json"),
///     "http://localhost:4502/content/site.1.json"
/// );
/// ```
pub fn node_json_url(endpoint: &str, path: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if path.ends_with(keys::JSON_EXTENSION) {
        format!("{base}{path}")
    } else {
        format!("{base}{path}{}", keys::INFINITY_JSON)
    }
}

/// Content id of a page URL: its path with the file extension removed.
///
/// Query and fragment are ignored; an empty path yields `/`. Relative
/// inputs are read as paths.
pub fn id_from_url(raw: &str) -> Option<String> {
    let path = match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("http://localhost/").ok()?;
            base.join(raw).ok()?.path().to_string()
        }
        Err(_) => return None,
    };

    if path.is_empty() || path == "/" {
        return Some("/".to_string());
    }
    let last_slash = path.rfind('/');
    match path.rfind('.') {
        Some(dot) if last_slash.is_none_or(|slash| dot > slash) => Some(path[..dot].to_string()),
        _ => Some(path),
    }
}
