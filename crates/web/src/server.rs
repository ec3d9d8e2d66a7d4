use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tinyweb_http::connection::{HttpConnection, ProcessOutcome, WriteOutcome};
use tinyweb_http::handler::UserVerifier;
use tinyweb_http::protocol::{BufferError, HttpError};
use tinyweb_http::timer::SharedDeadlineIndex;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::socket::TryIo;
use crate::{MemoryUserStore, ServerConfig};

const SERVER_BUSY: &[u8] = b"Server busy!";

pub struct ServerBuilder {
    address: Option<io::Result<Vec<SocketAddr>>>,
    doc_root: Option<PathBuf>,
    verifier: Option<Arc<dyn UserVerifier + Send + Sync>>,
    config: ServerConfig,
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("address", &self.address)
            .field("doc_root", &self.doc_root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, doc_root: None, verifier: None, config: ServerConfig::default() }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    /// The directory the static files and the canned error pages are served from.
    pub fn doc_root(mut self, doc_root: impl Into<PathBuf>) -> Self {
        self.doc_root = Some(doc_root.into());
        self
    }

    /// Checks the login and register forms, an empty [`MemoryUserStore`] by default.
    pub fn verifier(mut self, verifier: Arc<dyn UserVerifier + Send + Sync>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.config.idle_timeout = idle_timeout;
        self
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.config.max_connections = max_connections;
        self
    }

    pub fn buffer_capacity(mut self, initial: usize, max: usize) -> Self {
        self.config.initial_buffer_capacity = initial;
        self.config.max_buffer_capacity = max;
        self
    }

    /// Requests served on one persistent connection, the last one is answered
    /// with `Connection: close`.
    pub fn keep_alive_max(mut self, keep_alive_max: u32) -> Self {
        self.config.keep_alive_max = keep_alive_max;
        self
    }

    pub fn log_level(mut self, log_level: Level) -> Self {
        self.config.log_level = log_level;
        self
    }

    /// # Errors
    ///
    /// Fails when the address or the document root is missing, or the address
    /// doesn't resolve.
    pub fn build(self) -> Result<Server, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::invalid_address)?;
        let doc_root = self.doc_root.ok_or(ServerBuildError::MissingDocRoot)?;
        let verifier = self.verifier.unwrap_or_else(|| Arc::new(MemoryUserStore::new()));

        Ok(Server { address, doc_root, verifier, config: self.config })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,
    #[error("address can't be resolved: {source}")]
    InvalidAddress { source: io::Error },
    #[error("document root must be set")]
    MissingDocRoot,
}

impl ServerBuildError {
    fn invalid_address(source: io::Error) -> Self {
        Self::InvalidAddress { source }
    }
}

/// A static file server: a tokio accept loop, one task per connection and an
/// idle connection reaper.
pub struct Server {
    address: Vec<SocketAddr>,
    doc_root: PathBuf,
    verifier: Arc<dyn UserVerifier + Send + Sync>,
    config: ServerConfig,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("doc_root", &self.doc_root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// State shared by the accept loop and the connection tasks.
struct Shared {
    doc_root: PathBuf,
    verifier: Arc<dyn UserVerifier + Send + Sync>,
    config: ServerConfig,
    timers: SharedDeadlineIndex,
    live_connections: AtomicUsize,
    next_id: AtomicU64,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Installs the log subscriber, binds the address and serves forever.
    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(self.config.log_level).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            warn!("a global log subscriber is already installed");
        }

        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        self.serve(tcp_listener).await;
    }

    /// Serves connections accepted from `tcp_listener` forever.
    pub async fn serve(self, tcp_listener: TcpListener) {
        let shared = Arc::new(Shared {
            doc_root: self.doc_root,
            verifier: self.verifier,
            config: self.config,
            timers: SharedDeadlineIndex::new(),
            live_connections: AtomicUsize::new(0),
            next_id: AtomicU64::new(0),
        });

        tokio::spawn(reap_idle_connections(shared.timers.clone(), shared.config.idle_timeout));

        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            if shared.live_connections.load(Ordering::Acquire) >= shared.config.max_connections {
                warn!(%remote_addr, max = shared.config.max_connections, "server busy, reject connection");
                tokio::spawn(reject(tcp_stream));
                continue;
            }

            let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
            let expired = Arc::new(Notify::new());
            let notify = Arc::clone(&expired);
            if let Err(e) = shared.timers.add(id, shared.config.idle_timeout, move || notify.notify_one()) {
                error!(id, cause = %e, "can't register connection timer");
                continue;
            }

            shared.live_connections.fetch_add(1, Ordering::AcqRel);
            debug!(id, %remote_addr, "accepted connection");
            tokio::spawn(serve_connection(Arc::clone(&shared), id, tcp_stream, expired));
        }
    }
}

async fn reject(mut tcp_stream: TcpStream) {
    if let Err(e) = tcp_stream.write_all(SERVER_BUSY).await {
        debug!(cause = %e, "failed to send busy notice");
    }
}

/// Sleeps until the earliest connection deadline and fires the expired ones.
async fn reap_idle_connections(timers: SharedDeadlineIndex, idle_timeout: Duration) {
    loop {
        let wait = timers.next_deadline(Instant::now()).unwrap_or(idle_timeout);
        trace!(?wait, live = timers.len(), "reaper sleeping");
        tokio::time::sleep(wait).await;
    }
}

async fn serve_connection(shared: Arc<Shared>, id: u64, tcp_stream: TcpStream, expired: Arc<Notify>) {
    let mut connection = HttpConnection::new(
        shared.doc_root.clone(),
        Arc::clone(&shared.verifier),
        shared.config.connection_limits(),
    );

    tokio::select! {
        result = drive(&shared, id, &tcp_stream, &mut connection) => match result {
            Ok(()) => debug!(id, "finished process, connection shutdown"),
            Err(e) => error!(id, cause = %e, "service has error, connection shutdown"),
        },
        () = expired.notified() => info!(id, "idle timeout, connection shutdown"),
    }

    connection.close();
    shared.timers.remove(id);
    shared.live_connections.fetch_sub(1, Ordering::AcqRel);
}

/// Runs request/response cycles until the peer leaves or a response asks to close.
async fn drive(shared: &Shared, id: u64, tcp_stream: &TcpStream, connection: &mut HttpConnection) -> Result<(), HttpError> {
    loop {
        if connection.process()? == ProcessOutcome::NeedMoreData {
            if !read_request(tcp_stream, connection).await? {
                return Ok(());
            }
            refresh(shared, id);
            continue;
        }

        match write_response(tcp_stream, connection).await? {
            WriteOutcome::KeepAlive => refresh(shared, id),
            _ => return Ok(()),
        }
    }
}

/// Returns false once the peer closed the connection.
async fn read_request(tcp_stream: &TcpStream, connection: &mut HttpConnection) -> Result<bool, HttpError> {
    loop {
        tcp_stream.readable().await.map_err(BufferError::io)?;
        match connection.on_readable(&mut TryIo(tcp_stream)) {
            Ok(n) => {
                trace!(bytes = n, "read request bytes");
                return Ok(true);
            }
            Err(HttpError::PeerClosed) => return Ok(false),
            Err(e) if e.is_would_block() => {}
            Err(e) => return Err(e),
        }
    }
}

async fn write_response(tcp_stream: &TcpStream, connection: &mut HttpConnection) -> Result<WriteOutcome, HttpError> {
    loop {
        tcp_stream.writable().await.map_err(BufferError::io)?;
        match connection.on_writable(&mut TryIo(tcp_stream))? {
            WriteOutcome::Pending => trace!(pending = connection.pending_output(), "socket full"),
            outcome => return Ok(outcome),
        }
    }
}

fn refresh(shared: &Shared, id: u64) {
    if let Err(e) = shared.timers.refresh(id, shared.config.idle_timeout) {
        warn!(id, cause = %e, "can't refresh connection timer");
    }
}
