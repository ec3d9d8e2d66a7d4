//! Byte buffers shared by the request parser and the response builder.
//!
//! - [`RingBuffer`]: circular buffer with a scatter-read entry point used for
//!   both the inbound and the outbound side of a connection

mod ring_buffer;

pub use ring_buffer::RingBuffer;
pub use ring_buffer::{DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_CAPACITY};
