use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("buffer error: {source}")]
    BufferError {
        #[from]
        source: BufferError,
    },

    #[error("peer closed the connection")]
    PeerClosed,
}

impl HttpError {
    /// Returns true if the error only means the socket is not ready yet.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::BufferError { source } if source.is_would_block())
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed request line: {line:?}")]
    MalformedRequestLine { line: String },

    #[error("invalid percent encoding at byte {position} of form body")]
    InvalidPercentEncoding { position: usize },

    #[error("invalid form body: {reason}")]
    InvalidForm { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },
}

impl ParseError {
    pub fn malformed_request_line<S: ToString>(line: S) -> Self {
        Self::MalformedRequestLine { line: line.to_string() }
    }

    pub fn invalid_percent_encoding(position: usize) -> Self {
        Self::InvalidPercentEncoding { position }
    }

    pub fn invalid_form<S: ToString>(str: S) -> Self {
        Self::InvalidForm { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("can't consume {requested} bytes, only {readable} readable")]
    OutOfRange { requested: usize, readable: usize },

    #[error("buffer needs {required} bytes, exceed the limit {max_capacity}")]
    CapacityExceeded { required: usize, max_capacity: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl BufferError {
    pub fn out_of_range(requested: usize, readable: usize) -> Self {
        Self::OutOfRange { requested, readable }
    }

    pub fn capacity_exceeded(required: usize, max_capacity: usize) -> Self {
        Self::CapacityExceeded { required, max_capacity }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Returns true for the recoverable `WouldBlock`/`Interrupted` socket conditions.
    pub fn is_would_block(&self) -> bool {
        match self {
            Self::Io { source } => matches!(source.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted),
            _ => false,
        }
    }
}
