//! errors an embedding host can get back from an [`Instance`](super::Instance)

use thiserror::Error;

use crate::core::ValueKind;

/// instance creation failed; there is nothing to clean up
#[derive(Error, Debug)]
#[error("creating the interpreter instance failed: {message}")]
pub struct InitError {
    pub message: String,
}

/// A chunk could not be loaded. The instance stays usable, but the host
/// must not assume the chunk defined anything.
#[derive(Error, Debug)]
pub enum LoadError {
    /// the source did not parse; the message is the rendered diagnostic
    #[error("{message}")]
    Parse { message: String },

    /// the chunk raised while it ran
    #[error("{message}")]
    Runtime { message: String },

    #[error("reading script: {0}")]
    Io(#[from] std::io::Error),
}

/// A named call could not even start. Nothing was pushed and nothing ran;
/// the caller decides whether this is fatal.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("global '{0}' is not defined")]
    Undefined(String),

    #[error("global '{name}' is a {kind} value, not callable")]
    NotCallable { name: String, kind: ValueKind },
}
