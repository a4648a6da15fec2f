//! Hand in-memory buffers to programs that insist on file paths.
//!
//! Some programs only accept input or output as a path on disk. This crate
//! synthesizes such paths for byte buffers:
//!
//! - [`PipedPathRead`] feeds a buffer through an anonymous pipe whose read end
//!   is reachable as `/proc/<pid>/fd/<n>`.
//! - [`PipedPathWrite`] exposes the write end of a pipe the same way and
//!   collects whatever the program writes into it.
//! - [`TempPassthrough`] falls back to a real temporary file for programs that
//!   need to seek or `stat` their input.
//!
//! Every type acquires its resources when opened and releases them on
//! `close` or drop. A path is only valid while its owner is open.
//!
//! ```no_run
//! # fn main() -> Result<(), mempipe::MempipeError> {
//! use std::process::Command;
//!
//! let mut feed = mempipe::PipedPathRead::open("hello")?;
//! let status = Command::new("cat").arg(feed.path().unwrap()).status()?;
//! feed.close()?;
//! # let _ = status;
//! # Ok(())
//! # }
//! ```
//!
//! Only POSIX platforms are supported. Pipes additionally need procfs.

pub mod channel;
pub mod error;
pub mod fd_path;
pub mod read;
pub mod settings;
pub mod strategy;
pub mod temp;
pub mod write;

pub use self::{
    channel::PipeChannel,
    error::{MempipeError, Resource},
    fd_path::{FdPathResolver, ProcFdResolver},
    read::PipedPathRead,
    settings::Settings,
    strategy::{Capture, Feed, Strategy},
    temp::{Access, TempPassthrough},
    write::PipedPathWrite,
};
