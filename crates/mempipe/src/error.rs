use std::io;

use strum_macros::Display;
use thiserror::Error;

/// An OS resource that a fake path needs before it can be handed out.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum Resource {
    Pipe,
    TempFile,
    Mapping,
    Thread,
}

#[derive(Debug, Error)]
pub enum MempipeError {
    #[error("the OS refused to allocate a {resource}")]
    ResourceExhausted {
        resource: Resource,
        #[source]
        source: io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("descriptor paths are not available on this platform")]
    Unsupported,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl MempipeError {
    pub(crate) fn exhausted(resource: Resource) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::ResourceExhausted { resource, source }
    }
}

pub type Result<T, E = MempipeError> = std::result::Result<T, E>;
