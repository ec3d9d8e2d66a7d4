use std::sync::Arc;
use tinyweb::{MemoryUserStore, Server};
use tracing::Level;

#[tokio::main]
async fn main() {
    let doc_root = concat!(env!("CARGO_MANIFEST_DIR"), "/resources");
    let users = Arc::new(MemoryUserStore::with_users([("root", "123456")]));

    Server::builder()
        .address("127.0.0.1:9006")
        .doc_root(doc_root)
        .verifier(users)
        .log_level(Level::DEBUG)
        .build()
        .unwrap()
        .start()
        .await;
}
