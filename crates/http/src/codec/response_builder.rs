//! Static file response building.
//!
//! [`ResponseBuilder::build`] resolves the status code of the requested path,
//! writes the status line and headers into the outbound [`RingBuffer`], and maps
//! the file so its bytes can be written to the socket straight from the mapping.
//!
//! Error codes are answered with the canned page of the document root
//! (`/400.html`, `/403.html`, `/404.html`). When even that page can not be
//! mapped, a small html error body is written into the buffer instead.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use http::StatusCode;
use tracing::{debug, warn};

use crate::buffer::RingBuffer;
use crate::codec::MappedFile;
use crate::protocol::{content_type, BufferError};

/// The `Keep-Alive` header advertised on persistent connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub max: u32,
    pub timeout_secs: u64,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self { max: 6, timeout_secs: 120 }
    }
}

#[derive(Debug)]
pub struct ResponseBuilder {
    doc_root: PathBuf,
    keep_alive_header: KeepAlive,

    path: String,
    keep_alive: bool,
    code: Option<StatusCode>,
    mapped: Option<MappedFile>,
}

impl ResponseBuilder {
    pub fn new(doc_root: impl Into<PathBuf>, keep_alive_header: KeepAlive) -> Self {
        Self {
            doc_root: doc_root.into(),
            keep_alive_header,
            path: String::new(),
            keep_alive: false,
            code: None,
            mapped: None,
        }
    }

    /// Prepares the next response, releasing the mapping of the previous one.
    ///
    /// A pre-assigned `code` (e.g. `400` for a malformed request) is kept as is;
    /// otherwise the code is resolved from the file system by [`build`](Self::build).
    pub fn init(&mut self, path: &str, keep_alive: bool, code: Option<StatusCode>) {
        self.unmap();
        self.path = path.to_string();
        self.keep_alive = keep_alive;
        self.code = code;
    }

    pub fn doc_root(&self) -> &Path {
        &self.doc_root
    }

    /// The path that is served, rewritten to the canned page for error codes.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The response code, resolved after [`build`](Self::build).
    pub fn code(&self) -> Option<StatusCode> {
        self.code
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// The mapped body, to be written after the buffered head.
    pub fn mapped_file(&self) -> Option<&[u8]> {
        self.mapped.as_ref().map(MappedFile::as_slice)
    }

    pub fn mapped_len(&self) -> usize {
        self.mapped.as_ref().map_or(0, MappedFile::len)
    }

    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            debug!(path = %self.path, "released file mapping");
        }
    }

    /// Writes the status line and headers (and an inline body on mapping
    /// failure) into `buf`.
    ///
    /// # Errors
    ///
    /// Only fails when `buf` can't grow to hold the response head.
    pub fn build(&mut self, buf: &mut RingBuffer) -> Result<(), BufferError> {
        let code = match self.code {
            Some(code) if code.is_client_error() || code.is_server_error() => code,
            _ => self.resolve_code(),
        };
        let code = if is_supported(code) { code } else { StatusCode::BAD_REQUEST };
        self.code = Some(code);

        if let Some(page) = error_page(code) {
            self.path = page.to_string();
        }

        add_status_line(buf, code)?;
        self.add_headers(buf)?;
        self.add_content(buf, code)
    }

    fn file_path(&self) -> PathBuf {
        self.doc_root.join(self.path.trim_start_matches('/'))
    }

    fn resolve_code(&self) -> StatusCode {
        if self.path.split('/').any(|segment| segment == "..") {
            warn!(path = %self.path, "path escapes the document root");
            return StatusCode::FORBIDDEN;
        }

        match fs::metadata(self.file_path()) {
            Ok(metadata) if metadata.is_dir() => StatusCode::NOT_FOUND,
            Ok(metadata) if !is_world_readable(&metadata) => StatusCode::FORBIDDEN,
            Ok(_) => StatusCode::OK,
            Err(e) => {
                debug!(path = %self.path, cause = %e, "can't stat requested file");
                StatusCode::NOT_FOUND
            }
        }
    }

    fn add_headers(&self, buf: &mut RingBuffer) -> Result<(), BufferError> {
        if self.keep_alive {
            let KeepAlive { max, timeout_secs } = self.keep_alive_header;
            buf.append(b"Connection: keep-alive\r\n")?;
            buf.append(format!("Keep-Alive: max={max}, timeout={timeout_secs}\r\n").as_bytes())?;
        } else {
            buf.append(b"Connection: close\r\n")?;
        }
        buf.append(format!("Content-Type: {}\r\n", content_type(&self.path)).as_bytes())
    }

    fn add_content(&mut self, buf: &mut RingBuffer, code: StatusCode) -> Result<(), BufferError> {
        let file_path = self.file_path();

        let length = match fs::metadata(&file_path) {
            Ok(metadata) if metadata.len() == 0 => 0,
            Ok(_) => match MappedFile::open(&file_path) {
                Ok(mapped) => {
                    let length = mapped.len();
                    self.mapped = Some(mapped);
                    length
                }
                Err(e) => {
                    warn!(path = %file_path.display(), cause = %e, "can't map file");
                    return add_error_content(buf, code, "File NotFound!");
                }
            },
            Err(e) => {
                warn!(path = %file_path.display(), cause = %e, "can't open file");
                return add_error_content(buf, code, "File NotFound!");
            }
        };

        debug!(code = code.as_u16(), path = %self.path, length, "built response");
        buf.append(format!("Content-Length: {length}\r\n\r\n").as_bytes())
    }
}

fn add_status_line(buf: &mut RingBuffer, code: StatusCode) -> Result<(), BufferError> {
    let reason = code.canonical_reason().unwrap_or("Bad Request");
    buf.append(format!("HTTP/1.1 {} {reason}\r\n", code.as_u16()).as_bytes())
}

fn is_supported(code: StatusCode) -> bool {
    matches!(code, StatusCode::OK | StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND)
}

fn error_page(code: StatusCode) -> Option<&'static str> {
    match code {
        StatusCode::BAD_REQUEST => Some("/400.html"),
        StatusCode::FORBIDDEN => Some("/403.html"),
        StatusCode::NOT_FOUND => Some("/404.html"),
        _ => None,
    }
}

#[cfg(unix)]
fn is_world_readable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o004 != 0
}

#[cfg(not(unix))]
fn is_world_readable(_metadata: &Metadata) -> bool {
    true
}

fn add_error_content(buf: &mut RingBuffer, code: StatusCode, message: &str) -> Result<(), BufferError> {
    let reason = code.canonical_reason().unwrap_or("Bad Request");
    let body = format!(
        "<html><title>Error</title><body bgcolor=\"ffffff\">{} : {reason}\n<p>{message}</p><hr><em>TinyWebServer</em></body></html>",
        code.as_u16()
    );

    buf.append(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())?;
    buf.append(body.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    const INDEX: &str = "<html>index</html>";
    const PAGE_400: &str = "<html>400 bad request</html>";
    const PAGE_403: &str = "<html>403 forbidden page</html>";
    const PAGE_404: &str = "<html>404 page is missing</html>";

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn doc_root() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "index.html", INDEX);
        write_file(dir.path(), "400.html", PAGE_400);
        write_file(dir.path(), "403.html", PAGE_403);
        write_file(dir.path(), "404.html", PAGE_404);
        write_file(dir.path(), "empty.txt", "");
        fs::create_dir(dir.path().join("images")).unwrap();
        dir
    }

    fn head(buf: &mut RingBuffer) -> String {
        String::from_utf8(buf.take_all()).unwrap()
    }

    #[test]
    fn serve_existing_file() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/index.html", true, None);
        builder.build(&mut buf).unwrap();

        assert_eq!(builder.code(), Some(StatusCode::OK));
        assert_eq!(
            head(&mut buf),
            "HTTP/1.1 200 OK\r\n\
             Connection: keep-alive\r\n\
             Keep-Alive: max=6, timeout=120\r\n\
             Content-Type: text/html\r\n\
             Content-Length: 18\r\n\r\n"
        );
        assert_eq!(builder.mapped_file(), Some(INDEX.as_bytes()));
    }

    #[test]
    fn missing_file_serves_404_page() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/missing.png", false, None);
        builder.build(&mut buf).unwrap();

        assert_eq!(builder.code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(builder.path(), "/404.html");
        assert_eq!(
            head(&mut buf),
            format!(
                "HTTP/1.1 404 Not Found\r\nConnection: close\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n",
                PAGE_404.len()
            )
        );
        assert_eq!(builder.mapped_file(), Some(PAGE_404.as_bytes()));
    }

    #[test]
    fn directory_is_not_found() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/images", false, None);
        builder.build(&mut buf).unwrap();

        assert_eq!(builder.code(), Some(StatusCode::NOT_FOUND));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_forbidden() {
        use std::os::unix::fs::PermissionsExt;

        let root = doc_root();
        write_file(root.path(), "secret.html", "top secret");
        fs::set_permissions(root.path().join("secret.html"), fs::Permissions::from_mode(0o640)).unwrap();

        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/secret.html", false, None);
        builder.build(&mut buf).unwrap();

        assert_eq!(builder.code(), Some(StatusCode::FORBIDDEN));
        assert!(head(&mut buf).ends_with(&format!("Content-Length: {}\r\n\r\n", PAGE_403.len())));
        assert_eq!(builder.mapped_len(), PAGE_403.len());
    }

    #[test]
    fn parent_segments_are_forbidden() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path().join("images"), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/../index.html", false, None);
        builder.build(&mut buf).unwrap();

        assert_eq!(builder.code(), Some(StatusCode::FORBIDDEN));
        assert!(head(&mut buf).starts_with("HTTP/1.1 403 Forbidden\r\n"));
    }

    #[test]
    fn preassigned_bad_request() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/index.html", false, Some(StatusCode::BAD_REQUEST));
        builder.build(&mut buf).unwrap();

        assert_eq!(builder.code(), Some(StatusCode::BAD_REQUEST));
        assert!(head(&mut buf).starts_with("HTTP/1.1 400 Bad Request\r\nConnection: close\r\n"));
        assert_eq!(builder.mapped_file(), Some(PAGE_400.as_bytes()));
    }

    #[test]
    fn unsupported_code_falls_back_to_bad_request() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/index.html", false, Some(StatusCode::IM_A_TEAPOT));
        builder.build(&mut buf).unwrap();

        assert_eq!(builder.code(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(builder.path(), "/400.html");
    }

    #[test]
    fn missing_canned_page_writes_inline_body() {
        let root = doc_root();
        fs::remove_file(root.path().join("404.html")).unwrap();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/nothing.html", false, None);
        builder.build(&mut buf).unwrap();

        let response = head(&mut buf);
        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        assert!(head.ends_with(&format!("Content-Length: {}", body.len())));
        assert!(body.contains("404 : Not Found\n<p>File NotFound!</p>"));
        assert_eq!(builder.mapped_file(), None);
    }

    #[test]
    fn empty_file_is_not_mapped() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive::default());
        let mut buf = RingBuffer::new();

        builder.init("/empty.txt", false, None);
        builder.build(&mut buf).unwrap();

        let response = head(&mut buf);
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.ends_with("Content-Length: 0\r\n\r\n"));
        assert_eq!(builder.mapped_file(), None);
    }

    #[test]
    fn init_releases_previous_mapping() {
        let root = doc_root();
        let mut builder = ResponseBuilder::new(root.path(), KeepAlive { max: 10, timeout_secs: 30 });
        let mut buf = RingBuffer::new();

        builder.init("/index.html", true, None);
        builder.build(&mut buf).unwrap();
        assert!(head(&mut buf).contains("Keep-Alive: max=10, timeout=30\r\n"));
        assert!(builder.mapped_file().is_some());

        builder.init("/index.html", true, None);
        assert_eq!(builder.mapped_file(), None);
        assert_eq!(builder.code(), None);
    }
}
