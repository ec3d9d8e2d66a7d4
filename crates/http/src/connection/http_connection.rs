use std::fmt;
use std::io::{self, IoSlice, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::{RingBuffer, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_CAPACITY};
use crate::codec::{KeepAlive, ParseStatus, RequestParser, ResponseBuilder};
use crate::handler::UserVerifier;
use crate::protocol::{BufferError, HttpError};

/// Per-connection sizes handed down from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub initial_buffer_capacity: usize,
    pub max_buffer_capacity: usize,
    pub keep_alive: KeepAlive,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: DEFAULT_INITIAL_CAPACITY,
            max_buffer_capacity: DEFAULT_MAX_CAPACITY,
            keep_alive: KeepAlive::default(),
        }
    }
}

/// Result of [`HttpConnection::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The request is incomplete, wait until the socket is readable again.
    NeedMoreData,
    /// A response is queued, wait until the socket is writable.
    ResponseReady,
}

/// Result of [`HttpConnection::on_writable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The socket stopped accepting bytes before the response was written.
    Pending,
    /// The response was written and the connection stays open for the next request.
    KeepAlive,
    /// The response was written and the connection must be closed.
    Close,
}

/// The request/response cycle of one client connection.
///
/// The connection owns its inbound and outbound buffers, parser and response
/// builder, and never touches the socket on its own: the caller invokes
/// [`on_readable`](Self::on_readable), [`process`](Self::process) and
/// [`on_writable`](Self::on_writable) when the socket is ready, and
/// [`close`](Self::close) on teardown.
///
/// A file response is written as the buffered head followed by the mapped
/// file, in one vectored write per call. Responses without a file body are
/// written straight from the outbound buffer.
pub struct HttpConnection {
    inbound: RingBuffer,
    outbound: RingBuffer,
    parser: RequestParser,
    builder: ResponseBuilder,
    verifier: Arc<dyn UserVerifier + Send + Sync>,
    file_offset: usize,
    max_requests: u32,
    served: u32,
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("inbound", &self.inbound.readable())
            .field("outbound", &self.outbound.readable())
            .field("parser", &self.parser.state())
            .field("path", &self.builder.path())
            .field("file_offset", &self.file_offset)
            .field("served", &self.served)
            .finish_non_exhaustive()
    }
}

impl HttpConnection {
    pub fn new(doc_root: impl Into<PathBuf>, verifier: Arc<dyn UserVerifier + Send + Sync>, limits: ConnectionLimits) -> Self {
        Self {
            inbound: RingBuffer::with_limit(limits.initial_buffer_capacity, limits.max_buffer_capacity),
            outbound: RingBuffer::with_limit(limits.initial_buffer_capacity, limits.max_buffer_capacity),
            parser: RequestParser::new(),
            builder: ResponseBuilder::new(doc_root, limits.keep_alive),
            verifier,
            file_offset: 0,
            max_requests: limits.keep_alive.max,
            served: 0,
        }
    }

    /// Returns true if unparsed bytes are buffered, e.g. a pipelined request.
    pub fn has_pending_input(&self) -> bool {
        !self.inbound.is_empty()
    }

    /// Bytes of the current response that have not been written yet.
    pub fn pending_output(&self) -> usize {
        self.outbound.readable() + self.remaining_file().len()
    }

    /// Reads what `reader` has available into the inbound buffer.
    ///
    /// Reading stops once the buffer reached its size limit; the rest stays in
    /// the reader until [`process`](Self::process) has consumed the buffered
    /// requests.
    ///
    /// # Errors
    ///
    /// - [`HttpError::PeerClosed`] when the peer closed before sending anything
    /// - a would-block [`HttpError::BufferError`] when nothing could be read yet
    /// - [`BufferError::CapacityExceeded`] when the buffer is full and nothing was
    ///   read, i.e. a single request does not fit
    /// - any other [`HttpError::BufferError`] means the connection must be torn down
    pub fn on_readable<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<usize, HttpError> {
        let mut total = 0;
        loop {
            match self.inbound.read_from(reader) {
                Ok(0) if total == 0 => return Err(HttpError::PeerClosed),
                Ok(0) => return Ok(total),
                Ok(n) => total += n,
                Err(e) if e.is_would_block() && total > 0 => return Ok(total),
                Err(BufferError::CapacityExceeded { .. }) if total > 0 => {
                    trace!(total, "inbound buffer full, parse before reading on");
                    return Ok(total);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Parses the buffered request and queues its response once it is complete.
    ///
    /// The connection is kept alive for at most `keep_alive.max` requests of
    /// [`ConnectionLimits`]; the last one is answered with `Connection: close`.
    /// A malformed request is answered with `400 Bad Request` and the
    /// connection is closed after that response.
    ///
    /// # Errors
    ///
    /// Returns a [`HttpError::BufferError`] when the response head can't be buffered.
    pub fn process(&mut self) -> Result<ProcessOutcome, HttpError> {
        match self.parser.parse(&mut self.inbound, self.verifier.as_ref()) {
            Ok(ParseStatus::Incomplete) => return Ok(ProcessOutcome::NeedMoreData),
            Ok(ParseStatus::Finished) => {
                let request = self.parser.request();
                let keep_alive = request.is_keep_alive() && self.served.saturating_add(1) < self.max_requests;
                self.builder.init(request.path(), keep_alive, None);
            }
            Err(HttpError::RequestError { source }) => {
                warn!(cause = %source, "bad request");
                self.inbound.clear();
                self.builder.init(self.parser.request().path(), false, Some(StatusCode::BAD_REQUEST));
            }
            Err(e) => return Err(e),
        }

        self.file_offset = 0;
        self.builder.build(&mut self.outbound)?;
        Ok(ProcessOutcome::ResponseReady)
    }

    /// Writes as much of the queued response as `writer` accepts.
    ///
    /// # Errors
    ///
    /// Returns a [`HttpError::BufferError`] for write errors other than would-block.
    pub fn on_writable<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<WriteOutcome, HttpError> {
        loop {
            if self.pending_output() == 0 {
                return Ok(self.finish_response());
            }

            if self.remaining_file().is_empty() {
                match self.outbound.write_to(writer) {
                    Ok(0) => return Err(BufferError::io(io::ErrorKind::WriteZero).into()),
                    Ok(_) => continue,
                    Err(e) if e.is_would_block() => return Ok(WriteOutcome::Pending),
                    Err(e) => {
                        error!(cause = %e, "failed to write response");
                        return Err(e.into());
                    }
                }
            }

            let result = {
                let [head, tail] = self.outbound.as_io_slices();
                writer.write_vectored(&[head, tail, IoSlice::new(self.remaining_file())])
            };

            let written = match result {
                Ok(0) => return Err(BufferError::io(io::ErrorKind::WriteZero).into()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(WriteOutcome::Pending),
                Err(e) => {
                    error!(cause = %e, "failed to write response");
                    return Err(BufferError::io(e).into());
                }
            };

            let from_buffer = written.min(self.outbound.readable());
            self.outbound.consume(from_buffer)?;
            self.file_offset += written - from_buffer;
        }
    }

    /// Releases the mapping and buffers of the connection.
    pub fn close(&mut self) {
        self.builder.unmap();
        self.inbound.clear();
        self.outbound.clear();
        self.parser.reset();
        self.file_offset = 0;
        self.served = 0;
        debug!("connection state released");
    }

    fn remaining_file(&self) -> &[u8] {
        self.builder.mapped_file().and_then(|file| file.get(self.file_offset..)).unwrap_or_default()
    }

    fn finish_response(&mut self) -> WriteOutcome {
        info!(
            code = self.builder.code().map_or(0, |code| code.as_u16()),
            path = %self.builder.path(),
            "response sent"
        );

        self.builder.unmap();
        self.file_offset = 0;
        self.served = self.served.saturating_add(1);

        if self.builder.is_keep_alive() {
            self.parser.reset();
            WriteOutcome::KeepAlive
        } else {
            WriteOutcome::Close
        }
    }
}
