use std::{
    fs::File,
    io,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing_subscriber::fmt::MakeWriter;

/// Serializes log lines written to a shared file.
#[derive(Clone, Debug)]
pub struct LogWriter(Arc<Mutex<File>>);

impl LogWriter {
    #[inline]
    pub fn new(f: File) -> Self {
        Self(Arc::new(Mutex::new(f)))
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard<'a>;

    #[inline]
    fn make_writer(&'a self) -> Self::Writer {
        // A writer that panicked mid-line leaves nothing worth protecting.
        LogWriterGuard(self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

#[derive(Debug)]
pub struct LogWriterGuard<'a>(MutexGuard<'a, File>);

impl io::Write for LogWriterGuard<'_> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }

    #[inline]
    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        self.0.write_vectored(bufs)
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf)
    }
}
