use std::{
    io::{self, PipeReader, PipeWriter},
    os::fd::{AsFd, AsRawFd},
    path::PathBuf,
};

use tracing::{debug, trace};

use crate::{
    error::{MempipeError, Resource, Result},
    fd_path::FdPathResolver,
};

/// An anonymous pipe whose ends are closed exactly once.
///
/// Both ends are created close-on-exec, so spawned programs only reach the
/// pipe through a descriptor path and never inherit a stray write end that
/// would keep readers from seeing end-of-data.
#[derive(Debug)]
pub struct PipeChannel {
    reader: Option<PipeReader>,
    writer: Option<PipeWriter>,
}

impl PipeChannel {
    pub fn open() -> Result<Self> {
        let (reader, writer) = io::pipe().map_err(MempipeError::exhausted(Resource::Pipe))?;

        debug!(
            reader = reader.as_raw_fd(),
            writer = writer.as_raw_fd(),
            "opened pipe channel"
        );

        Ok(Self {
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn reader(&self) -> Option<&PipeReader> {
        self.reader.as_ref()
    }

    pub fn reader_mut(&mut self) -> Option<&mut PipeReader> {
        self.reader.as_mut()
    }

    pub fn writer(&self) -> Option<&PipeWriter> {
        self.writer.as_ref()
    }

    pub fn take_reader(&mut self) -> Option<PipeReader> {
        self.reader.take()
    }

    pub fn take_writer(&mut self) -> Option<PipeWriter> {
        self.writer.take()
    }

    /// Path that reopens the read end. Only valid while the read end is open.
    pub fn reader_path(&self, resolver: &dyn FdPathResolver) -> Option<PathBuf> {
        self.reader
            .as_ref()
            .and_then(|reader| resolver.resolve(reader.as_fd()))
    }

    /// Path that reopens the write end. Only valid while the write end is open.
    pub fn writer_path(&self, resolver: &dyn FdPathResolver) -> Option<PathBuf> {
        self.writer
            .as_ref()
            .and_then(|writer| resolver.resolve(writer.as_fd()))
    }

    /// Switches the read end to non-blocking mode, so reads on an empty pipe
    /// fail with `WouldBlock` instead of waiting for a writer.
    pub fn set_reader_nonblocking(&self) -> Result<()> {
        let Some(reader) = &self.reader else {
            return Err(io::Error::from(io::ErrorKind::NotConnected).into());
        };

        let fd = reader.as_raw_fd();

        // SAFETY: `fd` is owned by `reader` and stays open for both calls.
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            if flags == -1 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
                return Err(io::Error::last_os_error().into());
            }
        }

        Ok(())
    }

    pub fn close_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            trace!(fd = reader.as_raw_fd(), "closing read end");
        }
    }

    pub fn close_writer(&mut self) {
        if let Some(writer) = self.writer.take() {
            trace!(fd = writer.as_raw_fd(), "closing write end");
        }
    }

    /// Closes both ends. Ends that were already closed or taken are skipped.
    pub fn close(&mut self) {
        self.close_reader();
        self.close_writer();
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        self.close();
    }
}
