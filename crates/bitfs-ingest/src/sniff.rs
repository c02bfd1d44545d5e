//! Best-effort content-type detection from magic numbers.

/// MIME type recognised from the leading bytes, if any.
pub fn sniff(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Declared type wins; sniff only as a fallback.
pub fn resolve_content_type(declared: Option<&str>, data: &[u8]) -> Option<String> {
    match declared {
        Some(ct) => Some(ct.to_string()),
        None => sniff(data),
    }
}
