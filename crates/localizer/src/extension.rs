//! File extension resolution for downloaded assets

use reqwest::Url;

/// Longest extension accepted from a URL path
const MAX_URL_EXTENSION_LEN: usize = 8;

/// Map a MIME type to its canonical file extension
///
/// Parameters such as `; charset=...` are ignored. Generic binary types carry
/// no information about the payload and map to nothing.
pub fn mime_to_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let ext = match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/avif" => "avif",
        "image/heic" => "heic",
        "image/tiff" => "tiff",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/x-matroska" => "mkv",
        "video/mpeg" => "mpeg",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => return None,
    };
    Some(ext)
}

/// Extension of the last path segment of `url`, lowercased
pub fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let file_name = parsed.path_segments()?.last()?;
    let (stem, ext) = file_name.rsplit_once('.')?;

    let valid = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= MAX_URL_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Pick an extension: reported content type first, then the URL, then `fallback`
pub fn resolve_extension(url: &str, content_type: Option<&str>, fallback: &str) -> String {
    content_type
        .and_then(mime_to_extension)
        .map(str::to_string)
        .or_else(|| url_extension(url))
        .unwrap_or_else(|| fallback.to_string())
}
