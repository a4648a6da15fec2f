//! Capturing what a program writes to a path, without touching disk.

use std::{
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use tracing::{debug, trace, warn};

use crate::{
    channel::PipeChannel,
    error::{MempipeError, Result},
    fd_path::{FdPathResolver, ProcFdResolver},
};

const CHUNK_SIZE: usize = 64 * 1024;

pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(1);

/// Exposes the write end of an anonymous pipe as a path and collects what
/// gets written into it.
///
/// There is no background thread: only the caller knows whether the writing
/// program is still alive, so the caller drives [`capture_iteration`] or
/// [`capture_loop`]. A writer outpacing the capture blocks once the pipe is
/// full.
///
/// [`capture_iteration`]: Self::capture_iteration
/// [`capture_loop`]: Self::capture_loop
#[derive(Debug)]
pub struct PipedPathWrite {
    channel: PipeChannel,
    path: Option<PathBuf>,
    chunks: Vec<Vec<u8>>,
    scratch: Box<[u8]>,
    data: Option<Box<[u8]>>,
}

impl PipedPathWrite {
    pub fn open() -> Result<Self> {
        let resolver = ProcFdResolver::current().ok_or(MempipeError::Unsupported)?;
        Self::open_with(resolver)
    }

    pub fn open_with(resolver: &dyn FdPathResolver) -> Result<Self> {
        let channel = PipeChannel::open()?;
        channel.set_reader_nonblocking()?;

        let path = channel
            .writer_path(resolver)
            .ok_or(MempipeError::Unsupported)?;

        debug!(?path, "capturing writes through pipe");

        Ok(Self {
            channel,
            path: Some(path),
            chunks: Vec::new(),
            scratch: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
            data: None,
        })
    }

    /// Path to hand to the writing program. `None` once closed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Moves whatever currently sits in the pipe into the capture buffer.
    ///
    /// Never blocks. Returns the number of bytes captured, which is zero when
    /// nothing was waiting or the capture is already closed.
    pub fn capture_iteration(&mut self) -> Result<usize> {
        let Some(reader) = self.channel.reader_mut() else {
            return Ok(0);
        };

        let mut chunk = Vec::new();

        loop {
            match reader.read(&mut self.scratch) {
                Ok(0) => break,
                Ok(read) => chunk.extend_from_slice(&self.scratch[..read]),
                Err(error) if error.kind() == ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        }

        let captured = chunk.len();
        if captured > 0 {
            trace!(captured, "captured chunk");
            self.chunks.push(chunk);
        }

        Ok(captured)
    }

    /// Captures for as long as `is_alive` holds, pausing briefly whenever the
    /// pipe is empty.
    pub fn capture_loop<F: FnMut() -> bool>(&mut self, is_alive: F) -> Result<()> {
        self.capture_loop_with_idle(is_alive, DEFAULT_IDLE_INTERVAL)
    }

    pub fn capture_loop_with_idle<F: FnMut() -> bool>(
        &mut self,
        mut is_alive: F,
        idle: Duration,
    ) -> Result<()> {
        while is_alive() {
            if self.capture_iteration()? == 0 && !idle.is_zero() {
                thread::sleep(idle);
            }
        }

        Ok(())
    }

    /// Bytes captured so far, across all chunks.
    pub fn captured_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Stops capturing and assembles the captured buffer.
    ///
    /// The path is cleared before any descriptor is closed. Data still
    /// buffered in the pipe is collected first. Calling this again is a
    /// no-op.
    pub fn close(&mut self) {
        if self.channel.is_closed() {
            return;
        }

        self.path = None;

        if let Err(error) = self.capture_iteration() {
            warn!(%error, "failed to drain pipe before closing");
        }

        self.channel.close_reader();
        self.channel.close_writer();

        let data = self.chunks.concat().into_boxed_slice();
        self.chunks = Vec::new();
        self.scratch = Box::default();

        debug!(len = data.len(), "capture finished");
        self.data = Some(data);
    }

    /// The captured buffer, available once closed.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn finish(mut self) -> Box<[u8]> {
        self.close();
        self.data.take().unwrap_or_default()
    }
}

impl Drop for PipedPathWrite {
    fn drop(&mut self) {
        self.close();
    }
}
