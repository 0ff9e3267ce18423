//! MIME normalization for inscription payloads.
//!
//! Preference order: declared content type, then filename extension, then
//! content sniffing (HTML signature, JSON validity, printable ratio).

/// Generic types that carry no routing information on their own.
const GENERIC_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream", ""];

/// Normalize a declared content type against the payload and filename.
pub fn normalize_content_type(
    declared: Option<&str>,
    file_name: Option<&str>,
    payload: &[u8],
) -> String {
    if let Some(declared) = declared {
        let base = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if !GENERIC_TYPES.contains(&base.as_str()) {
            return base;
        }
    }

    if let Some(name) = file_name {
        if let Some(by_ext) = from_extension(name) {
            return by_ext.to_string();
        }
    }

    sniff(payload).to_string()
}

/// Map a filename extension to a MIME type.
pub fn from_extension(name: &str) -> Option<&'static str> {
    let ext = name.rsplit('.').next()?.to_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "md" => "text/markdown",
        "txt" => "text/plain",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

/// Sniff a payload's type from its content.
pub fn sniff(payload: &[u8]) -> &'static str {
    if payload.is_empty() {
        return "application/octet-stream";
    }

    if looks_like_html(payload) {
        return "text/html";
    }

    if serde_json::from_slice::<serde_json::Value>(payload).is_ok() {
        return "application/json";
    }

    if printable_ratio(payload) >= 0.5 {
        return "text/plain";
    }

    "application/octet-stream"
}

/// True when the normalized type names an image.
pub fn is_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// True when the normalized type is textual.
pub fn is_text(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type == "application/json"
        || content_type == "application/yaml"
}

/// Strip a single trailing script-terminator byte from a text payload.
///
/// Inscription envelopes occasionally leave one NUL terminator that is not
/// part of the payload; exactly one is removed, never more.
pub fn strip_trailing_terminator(payload: &[u8]) -> &[u8] {
    match payload.last() {
        Some(0x00) => &payload[..payload.len() - 1],
        _ => payload,
    }
}

fn looks_like_html(payload: &[u8]) -> bool {
    let head: Vec<u8> = payload
        .iter()
        .take(256)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    let head = String::from_utf8_lossy(&head);
    let trimmed = head.trim_start();
    trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html")
}

fn printable_ratio(payload: &[u8]) -> f64 {
    let printable = payload
        .iter()
        .filter(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
        .count();
    printable as f64 / payload.len() as f64
}
