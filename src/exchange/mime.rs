//! MIME type labels for responses.
//!
//! Labels follow the host's short vocabulary ("HTML", "JSON", "script", ...)
//! rather than full media types. An empty string means "could not tell".

/// Maps a `Content-Type` header value to a short label.
pub(crate) fn stated_mime_type(content_type: Option<&str>) -> String {
    let Some(ct) = content_type else {
        return String::new();
    };
    let essence = ct
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let label = match essence.as_str() {
        "" => "",
        "text/html" | "application/xhtml+xml" => "HTML",
        "application/json" | "text/json" => "JSON",
        "text/css" => "CSS",
        "text/plain" => "text",
        "image/png" => "PNG",
        "image/jpeg" | "image/jpg" => "JPEG",
        "image/gif" => "GIF",
        "image/svg+xml" => "XML",
        "application/x-amf" => "AMF",
        e if e.contains("javascript") || e.contains("ecmascript") => "script",
        e if e.ends_with("+json") => "JSON",
        e if e.ends_with("/xml") || e.ends_with("+xml") => "XML",
        e if e.starts_with("image/") => "image",
        e if e.starts_with("text/") => "text",
        _ => "unknown",
    };
    label.to_string()
}

/// Guesses a label from the body bytes alone.
pub(crate) fn inferred_mime_type(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    if body.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "PNG".to_string();
    }
    if body.starts_with(b"\xff\xd8\xff") {
        return "JPEG".to_string();
    }
    if body.starts_with(b"GIF87a") || body.starts_with(b"GIF89a") {
        return "GIF".to_string();
    }

    let Ok(text) = std::str::from_utf8(body) else {
        return String::new();
    };
    let trimmed = text.trim_start();
    let head: String = trimmed.chars().take(64).collect::<String>().to_ascii_lowercase();

    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        "HTML".to_string()
    } else if head.starts_with("<?xml") {
        "XML".to_string()
    } else if (head.starts_with('{') || head.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        "JSON".to_string()
    } else if head.starts_with('<') && trimmed.contains("</") {
        "HTML".to_string()
    } else {
        "text".to_string()
    }
}
