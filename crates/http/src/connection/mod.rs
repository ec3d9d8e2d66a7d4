//! The per-connection request/response pipeline.
//!
//! # Components
//!
//! - [`HttpConnection`]: couples the inbound and outbound buffers, the request
//!   parser and the response builder of one client, and exposes the
//!   `on_readable` / `process` / `on_writable` / `close` entry points the
//!   server drives on socket readiness
//! - [`ConnectionLimits`]: buffer sizes and the keep-alive advertisement
//!
//! Requests on one connection are strictly sequential: the next request is
//! only parsed after the previous response was fully written.

mod http_connection;

pub use http_connection::{ConnectionLimits, HttpConnection, ProcessOutcome, WriteOutcome};
