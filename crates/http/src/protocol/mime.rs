//! Content type lookup by file suffix.

/// Fallback for unknown or missing suffixes.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Returns the content type for `path` based on the text after its last `.`.
///
/// ```
/// # use tinyweb_http::protocol::content_type;
/// assert_eq!(content_type("/index.html"), "text/html");
/// assert_eq!(content_type("/README"), "text/plain");
/// ```
pub fn content_type(path: &str) -> &'static str {
    let Some((_, suffix)) = path.rsplit_once('.') else {
        return DEFAULT_CONTENT_TYPE;
    };

    match suffix {
        "html" => "text/html",
        "xml" => "text/xml",
        "xhtml" => "application/xhtml+xml",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        "pdf" => "application/pdf",
        "word" => "application/nsword",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "au" => "audio/basic",
        "mpeg" | "mpg" => "video/mpeg",
        "avi" => "video/x-msvideo",
        "gz" => "application/x-gzip",
        "tar" => "application/x-tar",
        "css" => "text/css",
        "js" => "text/javascript",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
