//! Content-type and disposition helpers.

/// Fallback content type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Lowercased extension of `file_name`, without the dot.
pub fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Content type for a vault file.
///
/// The filename's extension decides; when it has none, the stored `type`
/// field is tried as an extension.
pub fn content_type_for(file_name: &str, stored_type: &str) -> &'static str {
    let ext = extension(file_name).unwrap_or_else(|| stored_type.to_ascii_lowercase());
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        _ => OCTET_STREAM,
    }
}

/// `Content-Disposition` value forcing a download under the original name.
///
/// Printable ASCII names are quoted directly; anything else uses the
/// RFC 5987 `filename*` form.
pub fn attachment_disposition(file_name: &str) -> String {
    let plain = file_name
        .bytes()
        .all(|b| (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\');
    if plain {
        format!("attachment; filename=\"{file_name}\"")
    } else {
        format!("attachment; filename*=UTF-8''{}", percent_encode(file_name))
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
