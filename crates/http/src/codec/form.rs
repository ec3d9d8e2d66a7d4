//! `application/x-www-form-urlencoded` body decoding.
//!
//! A single left-to-right scan over the body:
//!
//! - `=` ends the key of the current pair (later `=` are kept literally)
//! - `+` becomes a space
//! - `%XY` becomes the byte with hex value `XY`
//! - `&` commits the current pair
//!
//! A trailing pair without `&` is committed once the scan ends. A segment with
//! no `=` becomes a key with an empty value, empty segments are skipped.
//!
//! Escapes that are truncated or contain non-hex digits are rejected with
//! [`ParseError::InvalidPercentEncoding`], and decoded keys or values that are
//! not UTF-8 are rejected with [`ParseError::InvalidForm`].

use std::collections::HashMap;
use std::mem;

use tracing::trace;

use crate::protocol::ParseError;

/// Decodes an url-encoded form body into its fields, last duplicate wins.
///
/// ```
/// # use tinyweb_http::codec::decode_form;
/// let form = decode_form("a=1&b=hello+world&c=%41").unwrap();
/// assert_eq!(form["b"], "hello world");
/// assert_eq!(form["c"], "A");
/// ```
///
/// # Errors
///
/// See the module documentation.
pub fn decode_form(body: &str) -> Result<HashMap<String, String>, ParseError> {
    let bytes = body.as_bytes();
    let mut form = HashMap::new();

    let mut key: Option<Vec<u8>> = None;
    let mut current = Vec::with_capacity(bytes.len());

    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'=' if key.is_none() => key = Some(mem::take(&mut current)),
            b'+' => current.push(b' '),
            b'%' => {
                let high = bytes.get(index + 1).copied().and_then(hex_value);
                let low = bytes.get(index + 2).copied().and_then(hex_value);
                match (high, low) {
                    (Some(high), Some(low)) => current.push((high << 4) | low),
                    _ => return Err(ParseError::invalid_percent_encoding(index)),
                }
                index += 2;
            }
            b'&' => commit(&mut form, key.take(), mem::take(&mut current))?,
            byte => current.push(byte),
        }
        index += 1;
    }

    if key.is_some() || !current.is_empty() {
        commit(&mut form, key, current)?;
    }

    Ok(form)
}

fn commit(form: &mut HashMap<String, String>, key: Option<Vec<u8>>, current: Vec<u8>) -> Result<(), ParseError> {
    let (key, value) = match key {
        Some(key) => (key, current),
        None => (current, Vec::new()),
    };

    if key.is_empty() && value.is_empty() {
        return Ok(());
    }

    let key = String::from_utf8(key).map_err(|e| ParseError::invalid_form(format!("key is not utf-8: {e}")))?;
    let value = String::from_utf8(value).map_err(|e| ParseError::invalid_form(format!("value of {key} is not utf-8: {e}")))?;

    trace!(key = %key, value = %value, "decoded form field");
    form.insert(key, value);
    Ok(())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
