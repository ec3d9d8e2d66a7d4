use std::io::{self, IoSlice, IoSliceMut, Read, Write};

use tokio::net::TcpStream;

/// Adapts a tokio [`TcpStream`] to the non-blocking [`Read`]/[`Write`] the
/// connection core expects: every call is a single `try_*` attempt that
/// reports [`io::ErrorKind::WouldBlock`] when the socket is not ready.
#[derive(Debug)]
pub(crate) struct TryIo<'a>(pub(crate) &'a TcpStream);

impl Read for TryIo<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_read(buf)
    }

    fn read_vectored(&mut self, bufs: &mut [IoSliceMut<'_>]) -> io::Result<usize> {
        self.0.try_read_vectored(bufs)
    }
}

impl Write for TryIo<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.try_write(buf)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.0.try_write_vectored(bufs)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
