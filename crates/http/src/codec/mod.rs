//! Request decoding and response encoding on top of [`RingBuffer`](crate::buffer::RingBuffer)
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestParser`]: incremental request line, header and body state machine
//!   - [`decode_form`]: `application/x-www-form-urlencoded` body decoding
//!
//! - Response handling:
//!   - [`ResponseBuilder`]: status resolution, head encoding and file mapping
//!   - [`MappedFile`]: the owned read-only mapping handed out as the response body
//!
//! # Example
//!
//! ```no_run
//! use tinyweb_http::buffer::RingBuffer;
//! use tinyweb_http::codec::{KeepAlive, ParseStatus, RequestParser, ResponseBuilder};
//! use tinyweb_http::handler::make_verifier;
//!
//! let mut inbound = RingBuffer::new();
//! inbound.append(b"GET / HTTP/1.1\r\n\r\n").unwrap();
//!
//! let verifier = make_verifier(|_: &str, _: &str, _: bool| false);
//! let mut parser = RequestParser::new();
//! if parser.parse(&mut inbound, &verifier).unwrap() == ParseStatus::Finished {
//!     let mut outbound = RingBuffer::new();
//!     let mut builder = ResponseBuilder::new("./resources", KeepAlive::default());
//!     builder.init(parser.request().path(), parser.request().is_keep_alive(), None);
//!     builder.build(&mut outbound).unwrap();
//! }
//! ```

mod form;
mod mapped_file;
mod request_parser;
mod response_builder;

pub use form::decode_form;
pub use mapped_file::MappedFile;
pub use request_parser::{ParseState, ParseStatus, RequestParser, DEFAULT_DOCUMENT};
pub use response_builder::{KeepAlive, ResponseBuilder};
