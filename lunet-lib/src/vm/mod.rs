//! The tree-walking runtime that executes parsed chunks.
//!
//! [`Interp`] owns the global environment and the call-frame stack. Failure
//! inside script code is a raised error *value* ([`Error::Raised`]); frames
//! are deliberately not popped while such an error travels outward, so the
//! embedding layer can still render a traceback before it cleans up.

use std::collections::HashMap;
use std::mem;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::core::{render_traceback, Frame, Value};

pub mod builtins;
pub mod env;
pub use env::Env;

mod eval;

/// default call-frame budget; [`Interp::set_max_depth`] overrides it
pub const DEFAULT_MAX_DEPTH: usize = 200;

#[derive(Error, Debug)]
pub enum Error {
    /// a script-level raise, carrying the error value
    #[error("{0}")]
    Raised(Value),

    /// the call-frame budget ran out. Reported separately from script
    /// raises, because it is resource exhaustion and not script behavior
    #[error("stack overflow (more than {0} nested calls)")]
    DepthExceeded(usize),
}

impl Error {
    /// the value a protected boundary reports for this failure
    pub fn into_value(self) -> Value {
        match self {
            Error::Raised(v) => v,
            e @ Error::DepthExceeded(_) => Value::Str(e.to_string()),
        }
    }
}

pub type Result<T> = StdResult<T, Error>;

macro_rules! raise {
    ($interp:expr, $line:expr, $msg:literal $(, $args:expr)*) => {
        return Err($interp.error_at($line, format!($msg $(, $args)*)))
    };
}
pub(crate) use raise;

/// one interpreter, holding the script environment
pub struct Interp {
    /// the global environment scripts define their functions in
    pub globals: HashMap<String, Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) chunk_name: String,
    max_depth: usize,
}

impl Interp {
    /// creates an empty interpreter; the standard environment is installed
    /// separately via [`builtins::install`]
    pub fn new() -> Self {
        Interp {
            globals: HashMap::new(),
            frames: Vec::new(),
            chunk_name: "?".into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// sets the call-frame budget, returns the previous one
    pub fn set_max_depth(&mut self, depth: usize) -> usize {
        mem::replace(&mut self.max_depth, depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Renders `message` plus the live call frames, innermost first.
    ///
    /// `skip` drops that many innermost frames, which lets a message
    /// handler hide its own activation.
    pub fn traceback(&self, message: &str, skip: usize) -> String {
        render_traceback(message, &self.frames, skip)
    }

    /// error value positioned at a line of the current chunk
    pub(crate) fn error_at(&self, line: usize, msg: String) -> Error {
        Error::Raised(Value::Str(format!("{}:{}: {}", self.chunk_name, line, msg)))
    }

    /// Error value positioned at the call site of the currently running
    /// native function. Useful for host functions registered on an instance.
    pub fn error_from_native(&self, msg: String) -> Error {
        match self.frames.last().and_then(|f| f.call_site.as_ref()) {
            Some((chunk, line)) => Error::Raised(Value::Str(format!("{}:{}: {}", chunk, line, msg))),
            None => Error::Raised(Value::Str(msg)),
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}
