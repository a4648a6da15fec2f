//! Paths that resolve to descriptors already open in this process.
//!
//! On Linux every open descriptor `n` of process `pid` is reachable as
//! `/proc/<pid>/fd/<n>`. Opening that path from *another* process reopens the
//! same pipe or file, which is what lets an unmodified program read from or
//! write into a pipe owned by us. `/proc/self` cannot be used here since it
//! would resolve against the program opening the path.

use std::{
    fmt,
    os::fd::{AsRawFd, BorrowedFd},
    path::{Path, PathBuf},
    process,
    sync::OnceLock,
};

use tracing::debug;

pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Turns an open descriptor into a path another process can open.
pub trait FdPathResolver: fmt::Debug + Send + Sync {
    fn resolve(&self, fd: BorrowedFd<'_>) -> Option<PathBuf>;
}

/// Resolves descriptors through `<proc_root>/<pid>/fd`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcFdResolver {
    fd_dir: Box<Path>,
}

impl ProcFdResolver {
    pub fn new<P: AsRef<Path>>(proc_root: P) -> Self {
        let fd_dir = proc_root
            .as_ref()
            .join(process::id().to_string())
            .join("fd")
            .into_boxed_path();

        Self { fd_dir }
    }

    /// The resolver for the default proc root, probed once per process.
    ///
    /// Returns `None` when the descriptor directory does not exist, e.g. on
    /// platforms without procfs.
    pub fn current() -> Option<&'static ProcFdResolver> {
        static CURRENT: OnceLock<Option<ProcFdResolver>> = OnceLock::new();

        CURRENT
            .get_or_init(|| {
                let resolver = ProcFdResolver::new(DEFAULT_PROC_ROOT);
                let available = resolver.is_available();

                debug!(fd_dir = ?resolver.fd_dir, available, "probed descriptor directory");

                available.then_some(resolver)
            })
            .as_ref()
    }

    pub fn fd_dir(&self) -> &Path {
        &self.fd_dir
    }

    pub fn is_available(&self) -> bool {
        self.fd_dir.is_dir()
    }
}

impl FdPathResolver for ProcFdResolver {
    fn resolve(&self, fd: BorrowedFd<'_>) -> Option<PathBuf> {
        Some(self.fd_dir.join(fd.as_raw_fd().to_string()))
    }
}
