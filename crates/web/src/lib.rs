//! A tiny static HTTP server on top of the `tinyweb-http` connection core
//!
//! The server owns what the core leaves out: the tokio accept loop, one task
//! per connection driving [`HttpConnection`](tinyweb_http::connection::HttpConnection)
//! on socket readiness, an idle connection reaper fed by the shared deadline
//! index, and the user table behind the login and register pages.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tinyweb::{MemoryUserStore, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let users = Arc::new(MemoryUserStore::with_users([("root", "123456")]));
//!
//!     Server::builder()
//!         .address("127.0.0.1:9006")
//!         .doc_root("./resources")
//!         .verifier(users)
//!         .idle_timeout(Duration::from_secs(60))
//!         .build()
//!         .unwrap()
//!         .start()
//!         .await;
//! }
//! ```

mod config;
mod server;
mod socket;
mod user_store;

pub use config::ServerConfig;
pub use config::DEFAULT_IDLE_TIMEOUT;
pub use config::DEFAULT_KEEP_ALIVE_MAX;
pub use config::DEFAULT_MAX_CONNECTIONS;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
pub use user_store::MemoryUserStore;
