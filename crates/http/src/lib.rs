//! The connection core of the tinyweb static HTTP server
//!
//! This crate implements the hot path that runs once per accepted connection and
//! again on every readiness event: a growable ring buffer for socket I/O, an
//! incremental HTTP/1.1 request parser working directly on that buffer, a
//! response builder that serves static files from a memory mapping, and a
//! deadline index that drives idle connection eviction.
//!
//! The crate does not own sockets or threads. The `tinyweb` server crate drives
//! it from a tokio runtime, but any non-blocking [`std::io::Read`] /
//! [`std::io::Write`] pair works.
//!
//! # Features
//!
//! - HTTP/1.1 request line, header and `Content-Length` body parsing
//! - Resumable parsing across partial reads and buffer wraparound
//! - `application/x-www-form-urlencoded` form decoding
//! - Static files written straight from a read-only memory mapping
//! - Canned `400`/`403`/`404` pages
//! - Keep-alive connections and pipelined requests
//!
//! # Example
//!
//! ```no_run
//! use std::io::Cursor;
//! use std::sync::Arc;
//! use tinyweb_http::connection::{ConnectionLimits, HttpConnection, ProcessOutcome, WriteOutcome};
//! use tinyweb_http::handler::make_verifier;
//!
//! let verifier = Arc::new(make_verifier(|name: &str, pwd: &str, _is_login: bool| name == "root" && pwd == "secret"));
//! let mut connection = HttpConnection::new("./resources", verifier, ConnectionLimits::default());
//!
//! let mut socket = Cursor::new(b"GET /index HTTP/1.1\r\nConnection: keep-alive\r\n\r\n".to_vec());
//! connection.on_readable(&mut socket).unwrap();
//!
//! if connection.process().unwrap() == ProcessOutcome::ResponseReady {
//!     let mut out = Vec::new();
//!     match connection.on_writable(&mut out).unwrap() {
//!         WriteOutcome::KeepAlive => println!("response sent, waiting for the next request"),
//!         WriteOutcome::Close => connection.close(),
//!         WriteOutcome::Pending => println!("socket is full, wait until it is writable"),
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`buffer`]: The ring buffer shared by reads, parsing and writes
//! - [`codec`]: Request parsing, form decoding and response building
//! - [`connection`]: The per-connection request/response pipeline
//! - [`handler`]: The credential check collaborator of the login/register pages
//! - [`protocol`]: Request type, content types and errors
//! - [`timer`]: The deadline index of idle connections
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type of a connection
//! - [`protocol::ParseError`]: Request parsing errors, answered with `400`
//! - [`protocol::BufferError`]: Buffer limits and socket errors, the connection is torn down
//! - [`timer::TimerError`]: Misuse of timer ids
//!
//! # Limitations
//!
//! - HTTP/1.1 only, no chunked transfer encoding
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Each connection buffer is capped, 1 MiB by default
//!
//! # Safety
//!
//! The only unsafe code is the file mapping in [`codec::MappedFile`]; served
//! files must not be truncated while a response is being written.

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod timer;

mod utils;
pub(crate) use utils::ensure;
