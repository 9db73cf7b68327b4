//! Origins for URL allowlists

use url::Url;

/// Reduce an absolute URL to `scheme://host`, the unit a script-URL
/// allowlist trusts. Port, path, query and fragment are dropped.
///
/// Returns `None` when `input` is not an absolute URL.
pub fn allowlist_origin(input: &str) -> Option<String> {
    let url = Url::parse(input).ok()?;
    Some(format!("{}://{}", url.scheme(), url.host_str().unwrap_or("")))
}
