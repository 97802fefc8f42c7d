//! Externally visible base URL for links into the public directory

use axum::http::HeaderMap;

/// Route segment the public directory is mounted under
pub const PUBLIC_ROUTE: &str = "public";

/// Normalize a configured URL prefix to either `""` or `/<prefix>`
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        String::new()
    } else if prefix.starts_with('/') {
        prefix.to_string()
    } else {
        format!("/{}", prefix)
    }
}

/// Derive the base URL a caller reached us through
///
/// Prefers `x-forwarded-proto` / `x-forwarded-host`, falls back to `host`,
/// and returns `None` when no host information is present at all.
pub fn resolve_base_url(headers: &HeaderMap, url_prefix: &str) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };

    let host = header("x-forwarded-host").or_else(|| header("host"))?;
    let protocol = header("x-forwarded-proto").unwrap_or("http");

    Some(format!("{}://{}{}", protocol, host, normalize_prefix(url_prefix)))
}

/// Base URL derived from static configuration when request headers carry no host
///
/// `public_dir_url` points at the public directory itself, so a trailing
/// `/public` is dropped before the prefix is appended.
pub fn fallback_base_url(public_dir_url: &str, url_prefix: &str) -> String {
    let trimmed = public_dir_url.trim_end_matches('/');
    let origin = trimmed
        .strip_suffix(&format!("/{}", PUBLIC_ROUTE))
        .unwrap_or(trimmed);
    format!("{}{}", origin, normalize_prefix(url_prefix))
}

/// Shareable URL for a file stored under the public root
pub fn public_asset_url(base_url: &str, relative_path: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        PUBLIC_ROUTE,
        encode_segments(relative_path)
    )
}

/// Percent-encode each `/`-separated segment on its own
pub fn encode_segments(relative_path: &str) -> String {
    relative_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
