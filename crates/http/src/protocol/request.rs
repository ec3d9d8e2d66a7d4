//! Parsed HTTP request representation.
//!
//! [`ParsedRequest`] is filled in incrementally by the
//! [`RequestParser`](crate::codec::RequestParser) as line boundaries are found
//! and stays untouched once the parser reports the request as finished, until
//! the parser is reset for the next request on the same connection.

use std::collections::HashMap;

use crate::protocol::ParseError;

/// The `Content-Type` that triggers form decoding of a POST body.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Represents a request read from the connection.
///
/// Header names are kept exactly as received (no case normalization); when a
/// name appears twice the last value wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) version: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: String,
    pub(crate) form: HashMap<String, String>,
}

impl ParsedRequest {
    /// The request method as received, e.g. `GET`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The normalized request path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The version after `HTTP/`, e.g. `1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Looks a header up by its exact, case-sensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The decoded `application/x-www-form-urlencoded` fields of a POST body.
    pub fn form(&self) -> &HashMap<String, String> {
        &self.form
    }

    /// Returns the form field `key`, or an empty string when it is absent.
    pub fn form_value(&self, key: &str) -> &str {
        self.form.get(key).map_or("", String::as_str)
    }

    /// Keep-alive is only honoured for HTTP/1.1 requests that ask for it explicitly.
    pub fn is_keep_alive(&self) -> bool {
        self.header("Connection") == Some("keep-alive") && self.version == "1.1"
    }

    /// Returns true for a POST carrying an url-encoded form body.
    pub fn is_form_post(&self) -> bool {
        self.method == "POST" && self.header("Content-Type") == Some(FORM_URLENCODED)
    }

    /// Parses the `Content-Length` header, if present.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidContentLength`] when the value is not a number.
    pub fn content_length(&self) -> Result<Option<usize>, ParseError> {
        self.header("Content-Length")
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_e| ParseError::invalid_content_length(format!("value {value} is not usize")))
            })
            .transpose()
    }

    pub(crate) fn reset(&mut self) {
        self.method.clear();
        self.path.clear();
        self.version.clear();
        self.headers.clear();
        self.body.clear();
        self.form.clear();
    }
}
