//! Call-frame bookkeeping for tracebacks.
//!
//! The interpreter pushes a [`Frame`] for every activation, script or
//! native. Frames are not popped while an error unwinds, so a message
//! handler that runs at the protected-call boundary still sees the whole
//! chain that led to the raise.

use std::fmt::Write;

/// one activation record
#[derive(Debug, Clone)]
pub struct Frame {
    /// name of the callable running in this frame
    pub func: String,
    /// chunk and line the call came from; `None` for calls issued by the host
    pub call_site: Option<(String, usize)>,
}

impl Frame {
    pub fn new(func: impl Into<String>, call_site: Option<(String, usize)>) -> Self {
        Frame {
            func: func.into(),
            call_site,
        }
    }
}

/// Renders an error message plus the live frames, innermost first.
///
/// `skip` drops that many innermost frames; a message handler passes 1 so
/// its own activation does not show up in its output.
pub fn render_traceback(message: &str, frames: &[Frame], skip: usize) -> String {
    let mut out = String::new();
    let _ = write!(out, "{}\nstack traceback:", message);
    for frame in frames.iter().rev().skip(skip) {
        match &frame.call_site {
            Some((chunk, line)) => {
                let _ = write!(out, "\n\t{}:{}: in function '{}'", chunk, line, frame.func);
            }
            None => {
                let _ = write!(out, "\n\tin function '{}'", frame.func);
            }
        }
    }
    out.push_str("\n\t[host]: in ?");
    out
}
