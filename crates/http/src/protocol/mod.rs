//! Core HTTP protocol types shared by the codec and connection layers.
//!
//! # Architecture
//!
//! - **Request** ([`request`]): the incrementally parsed request
//!   - [`ParsedRequest`]: method, path, version, headers, body and form fields
//!
//! - **Content types** ([`mime`]): the fixed suffix to MIME table
//!   - [`content_type`]: lookup with a `text/plain` fallback
//!
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: Top-level error of a connection
//!   - [`ParseError`]: Request parsing errors, answered with `400 Bad Request`
//!   - [`BufferError`]: Buffer range, capacity and socket I/O errors
//!
//! Resource errors (missing or unreadable files) are not Rust errors: the
//! response builder resolves them into `404`/`403` status codes.

mod request;
pub use request::ParsedRequest;
pub use request::FORM_URLENCODED;

mod mime;
pub use mime::content_type;
pub use mime::DEFAULT_CONTENT_TYPE;

mod error;
pub use error::BufferError;
pub use error::HttpError;
pub use error::ParseError;
