//! Incremental HTTP/1.1 request parser working directly on a [`RingBuffer`].
//!
//! The parser is a four state machine:
//!
//! ```text
//! RequestLine --line--> Headers --blank line--> Body --body read--> Finished
//! ```
//!
//! Each call to [`RequestParser::parse`] consumes as many complete lines as the
//! buffer holds. When the next line terminator (or a declared body) has not
//! arrived yet the parser returns [`ParseStatus::Incomplete`] without touching
//! its state, and the caller re-invokes it after the next successful read.
//!
//! A line is only retired from the buffer after it has been accepted, so a
//! malformed request line leaves both the parser and the buffer unchanged.

use tracing::{debug, trace};

use crate::buffer::RingBuffer;
use crate::codec::decode_form;
use crate::handler::UserVerifier;
use crate::protocol::{HttpError, ParseError, ParsedRequest};
use crate::ensure;

/// Served for an empty path or `/`.
pub const DEFAULT_DOCUMENT: &str = "/index.html";

/// Extensionless paths that are served as their `.html` page.
const DEFAULT_HTML: [&str; 6] = ["/index", "/register", "/login", "/welcome", "/video", "/picture"];

const REGISTER_PAGE: &str = "/register.html";
const LOGIN_PAGE: &str = "/login.html";
const WELCOME_PAGE: &str = "/welcome.html";
const ERROR_PAGE: &str = "/error.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body,
    Finished,
}

/// Outcome of one [`RequestParser::parse`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// More bytes are needed, call again after the next read.
    Incomplete,
    /// The request is complete and available through [`RequestParser::request`].
    Finished,
}

#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    request: ParsedRequest,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self { state: ParseState::RequestLine, request: ParsedRequest::default() }
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn request(&self) -> &ParsedRequest {
        &self.request
    }

    pub fn is_finished(&self) -> bool {
        self.state == ParseState::Finished
    }

    /// Prepares the parser for the next request on the same connection.
    pub fn reset(&mut self) {
        self.state = ParseState::RequestLine;
        self.request.reset();
    }

    /// Advances the state machine with the bytes readable in `buf`.
    ///
    /// Form posts to the login and register pages are checked with `verifier`
    /// and their path is rewritten to the welcome or error page.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::RequestError`] for a malformed request line, an
    /// invalid `Content-Length` or an undecodable form body; the caller answers
    /// those with `400 Bad Request`.
    pub fn parse(&mut self, buf: &mut RingBuffer, verifier: &dyn UserVerifier) -> Result<ParseStatus, HttpError> {
        loop {
            match self.state {
                ParseState::Finished => return Ok(ParseStatus::Finished),

                ParseState::RequestLine => {
                    let Some((line, consumed)) = next_line(buf) else {
                        return Ok(ParseStatus::Incomplete);
                    };
                    self.parse_request_line(&line)?;
                    buf.consume(consumed)?;
                    self.state = ParseState::Headers;
                }

                ParseState::Headers => {
                    let Some((line, consumed)) = next_line(buf) else {
                        return Ok(ParseStatus::Incomplete);
                    };
                    buf.consume(consumed)?;
                    if !self.parse_header(&line) {
                        self.state = ParseState::Body;
                    }
                }

                ParseState::Body => {
                    if !self.parse_body(buf)? {
                        return Ok(ParseStatus::Incomplete);
                    }
                    self.apply_form(verifier)?;
                    self.state = ParseState::Finished;
                    debug!(
                        method = %self.request.method,
                        path = %self.request.path,
                        version = %self.request.version,
                        "request parsed"
                    );
                }
            }
        }
    }

    fn parse_request_line(&mut self, line: &str) -> Result<(), ParseError> {
        let malformed = || ParseError::malformed_request_line(line);

        let (method, rest) = line.split_once(' ').ok_or_else(malformed)?;
        let (path, version) = rest.split_once(' ').ok_or_else(malformed)?;
        let version = version.strip_prefix("HTTP/").ok_or_else(malformed)?;

        ensure!(!method.is_empty() && !version.is_empty(), malformed());
        ensure!(!path.contains(' ') && !version.contains(' '), malformed());

        self.request.method = method.to_string();
        self.request.path = normalize_path(path);
        self.request.version = version.to_string();

        trace!(line = %line, path = %self.request.path, "parsed request line");
        Ok(())
    }

    /// Returns false on the blank line (or any line without a colon) ending the header section.
    fn parse_header(&mut self, line: &str) -> bool {
        let Some((name, value)) = line.split_once(':') else {
            return false;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);

        trace!(name = %name, value = %value, "parsed header");
        self.request.headers.insert(name.to_string(), value.to_string());
        true
    }

    /// Returns false while a declared body has not been fully received.
    fn parse_body(&mut self, buf: &mut RingBuffer) -> Result<bool, HttpError> {
        match self.request.content_length()? {
            Some(length) => {
                if buf.readable() < length {
                    trace!(length, readable = buf.readable(), "waiting for the rest of the body");
                    return Ok(false);
                }
                self.request.body = String::from_utf8_lossy(&buf.peek_prefix(length)).into_owned();
                buf.consume(length)?;
            }

            // a POST without a length carries its body on the remaining line
            None if self.request.method == "POST" => match next_line(buf) {
                Some((line, consumed)) => {
                    self.request.body = line;
                    buf.consume(consumed)?;
                }
                None => {
                    self.request.body = String::from_utf8_lossy(&buf.take_all()).into_owned();
                }
            },

            None => {}
        }
        Ok(true)
    }

    fn apply_form(&mut self, verifier: &dyn UserVerifier) -> Result<(), ParseError> {
        if !self.request.is_form_post() {
            return Ok(());
        }

        self.request.form = decode_form(&self.request.body)?;

        let is_login = match self.request.path.as_str() {
            REGISTER_PAGE => false,
            LOGIN_PAGE => true,
            _ => return Ok(()),
        };

        let username = self.request.form_value("username");
        let password = self.request.form_value("password");
        let verified = verifier.verify(username, password, is_login);
        debug!(username = %username, is_login, verified, "verified form credentials");

        self.request.path = if verified { WELCOME_PAGE } else { ERROR_PAGE }.to_string();
        Ok(())
    }
}

/// Returns the next line without its terminator, and the bytes to retire for it.
fn next_line(buf: &RingBuffer) -> Option<(String, usize)> {
    let length = buf.find_crlf()?;
    let line = String::from_utf8_lossy(&buf.peek_prefix(length)).into_owned();
    Some((line, length + 2))
}

fn normalize_path(raw: &str) -> String {
    let path = raw.split_once('?').map_or(raw, |(path, _query)| path);
    if path.is_empty() || path == "/" {
        return DEFAULT_DOCUMENT.to_string();
    }

    let mut path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    if DEFAULT_HTML.contains(&path.as_str()) {
        path.push_str(".html");
    }
    path
}
