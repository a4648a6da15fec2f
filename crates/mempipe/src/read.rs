//! Feeding a buffer to a program that only reads from paths.

use std::{
    io::{self, Write},
    panic,
    path::{Path, PathBuf},
    sync::mpsc,
    thread::{self, JoinHandle},
};

use tracing::{debug, error, warn};

use crate::{
    channel::PipeChannel,
    error::{MempipeError, Resource, Result},
    fd_path::{FdPathResolver, ProcFdResolver},
};

/// Exposes a buffer as a readable path backed by an anonymous pipe.
///
/// A background thread writes the buffer into the pipe while the program
/// holding [`path`](Self::path) reads it out. The pipe holds only a bounded
/// amount of data: if nobody reads the path, the feeder stays blocked on a
/// full pipe and [`close`](Self::close) will not return. Use
/// [`disconnect`](Self::disconnect) once the reading program has exited to
/// unblock it.
#[derive(Debug)]
pub struct PipedPathRead {
    channel: PipeChannel,
    path: Option<PathBuf>,
    feeder: Option<JoinHandle<io::Result<()>>>,
}

impl PipedPathRead {
    pub fn open<D: Into<Vec<u8>>>(data: D) -> Result<Self> {
        let resolver = ProcFdResolver::current().ok_or(MempipeError::Unsupported)?;
        Self::open_with(data, resolver)
    }

    pub fn open_with<D: Into<Vec<u8>>>(data: D, resolver: &dyn FdPathResolver) -> Result<Self> {
        let data = data.into();
        let mut channel = PipeChannel::open()?;
        let path = channel
            .reader_path(resolver)
            .ok_or(MempipeError::Unsupported)?;

        let Some(mut writer) = channel.take_writer() else {
            unreachable!("freshly opened channel has a write end");
        };

        let (started_tx, started_rx) = mpsc::sync_channel(1);
        let feeder = thread::Builder::new()
            .name("mempipe-feeder".into())
            .spawn(move || {
                let _ = started_tx.send(());

                writer.write_all(&data)?;
                writer.flush()?;

                debug!(len = data.len(), "feeder finished writing");
                Ok(())
            })
            .map_err(MempipeError::exhausted(Resource::Thread))?;

        // The sender is dropped without sending only if the thread died first,
        // which `close` reports when joining.
        let _ = started_rx.recv();

        debug!(?path, "feeding buffer through pipe");

        Ok(Self {
            channel,
            path: Some(path),
            feeder: Some(feeder),
        })
    }

    /// Path to hand to the reading program. `None` once closed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the feeder thread has written (or failed to write) everything.
    pub fn is_finished(&self) -> bool {
        self.feeder.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Closes this process's read end ahead of [`close`](Self::close).
    ///
    /// Once every external reader is gone as well, a feeder still blocked on a
    /// full pipe fails with `BrokenPipe` instead of waiting forever. The path
    /// stops resolving.
    pub fn disconnect(&mut self) {
        self.path = None;
        self.channel.close_reader();
    }

    /// Waits for the feeder, then closes both ends of the pipe.
    ///
    /// Blocks until the whole buffer has been consumed (or the pipe has been
    /// disconnected). The feeder's write error is returned by the first call
    /// only; further calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        match self.release() {
            Some(Ok(result)) => result.map_err(MempipeError::from),
            Some(Err(payload)) => panic::resume_unwind(payload),
            None => Ok(()),
        }
    }

    fn release(&mut self) -> Option<thread::Result<io::Result<()>>> {
        self.path = None;

        let joined = self.feeder.take().map(JoinHandle::join);
        self.channel.close();

        joined
    }
}

impl Drop for PipedPathRead {
    fn drop(&mut self) {
        match self.release() {
            Some(Ok(Err(error))) => warn!(%error, "feeder did not deliver the whole buffer"),
            Some(Err(_)) => error!("feeder thread panicked"),
            Some(Ok(Ok(()))) | None => {}
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        error::Error,
        fs::File,
        io::{ErrorKind, Read},
    };

    use super::PipedPathRead;
    use crate::{channel::PipeChannel, error::MempipeError};

    fn read_path(feed: &PipedPathRead) -> Result<Vec<u8>, Box<dyn Error>> {
        let mut file = File::open(feed.path().expect("open feed has a path"))?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        Ok(contents)
    }

    #[test]
    fn reader_sees_the_whole_buffer() -> Result<(), Box<dyn Error>> {
        let data: Vec<u8> = (0..=255).collect();
        let mut feed = PipedPathRead::open(data.clone())?;

        assert_eq!(data, read_path(&feed)?);

        feed.close()?;
        Ok(())
    }

    #[test]
    fn strings_are_fed_as_utf8() -> Result<(), Box<dyn Error>> {
        let mut feed = PipedPathRead::open("grüße")?;

        assert_eq!("grüße".as_bytes(), read_path(&feed)?.as_slice());

        feed.close()?;
        Ok(())
    }

    #[test]
    fn empty_buffer_reads_as_end_of_data() -> Result<(), Box<dyn Error>> {
        let mut feed = PipedPathRead::open(Vec::new())?;

        assert!(read_path(&feed)?.is_empty());

        feed.close()?;
        Ok(())
    }

    #[test]
    fn buffer_larger_than_the_pipe_does_not_block_the_caller() -> Result<(), Box<dyn Error>> {
        let data = vec![0x5a; 4 * 1024 * 1024];
        let mut feed = PipedPathRead::open(data.clone())?;

        // Nobody reads yet, so the feeder is parked on a full pipe.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!feed.is_finished());

        assert_eq!(data, read_path(&feed)?);

        feed.close()?;
        assert!(feed.is_finished());
        Ok(())
    }

    #[test]
    fn close_twice_is_harmless() -> Result<(), Box<dyn Error>> {
        let mut feed = PipedPathRead::open("twice")?;
        read_path(&feed)?;

        feed.close()?;
        feed.close()?;

        assert_eq!(None, feed.path());
        Ok(())
    }

    #[test]
    fn dropping_after_a_feeder_panic_does_not_propagate() -> Result<(), Box<dyn Error>> {
        let feeder = std::thread::spawn(|| -> std::io::Result<()> { panic!("feeder failed") });
        let feed = PipedPathRead {
            channel: PipeChannel::open()?,
            path: None,
            feeder: Some(feeder),
        };

        drop(feed);
        Ok(())
    }

    #[test]
    fn close_reraises_a_feeder_panic() -> Result<(), Box<dyn Error>> {
        let feeder = std::thread::spawn(|| -> std::io::Result<()> { panic!("feeder failed") });
        let mut feed = PipedPathRead {
            channel: PipeChannel::open()?,
            path: None,
            feeder: Some(feeder),
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| feed.close()));

        assert!(result.is_err());
        assert!(feed.is_finished());
        Ok(())
    }

    #[test]
    fn disconnect_unblocks_an_abandoned_feeder() -> Result<(), Box<dyn Error>> {
        let mut feed = PipedPathRead::open(vec![1u8; 1024 * 1024])?;

        feed.disconnect();

        match feed.close() {
            Err(MempipeError::Io(error)) => assert_eq!(ErrorKind::BrokenPipe, error.kind()),
            other => panic!("expected a broken pipe, got {other:?}"),
        }
        Ok(())
    }
}
