//! The embedding layer: everything a host program needs to drive one
//! interpreter.
//!
//! An [`Instance`] owns the interpreter and the value [`Stack`] the host
//! talks to it through. The call protocol comes in two flavors:
//!
//! * [`Instance::call`] / [`Instance::call_unprotected`] offer no isolation.
//!   A script-side failure panics, by contract; use them only for calls
//!   trusted not to fail.
//! * [`Instance::pcall`] / [`Instance::call_protected`] trap the failure and
//!   report it as a [`Status`] plus an error value on the stack, optionally
//!   after routing it through a message handler such as
//!   [`traceback_handler`].
//!
//! Stack discipline, in either flavor: a successful call nets the declared
//! number of results; a trapped failure nets exactly one error value, which
//! the caller must pop before it touches relative indices again.

use std::path::Path;

use strum_macros::Display;
use tracing::debug;

use crate::core::{NativeFn, Value};
use crate::parser;
use crate::vm::{self, builtins, Interp};

pub mod error;
pub use error::*;

pub mod stack;
pub use stack::Stack;

/// the part of the standard environment written in lunet itself
const PRELUDE: &str = include_str!("prelude.lun");

/// outcome of a protected call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Status {
    /// the declared number of results is on the stack
    Ok,
    /// the callee raised; one error value is on the stack
    RuntimeError,
    /// The call-frame budget ran out; one error value is on the stack.
    /// The message handler is not consulted for this failure.
    MemoryError,
    /// the message handler itself failed; one fixed error value is on the stack
    ErrorInHandler,
    /// Reserved. This runtime has no finalizers, so the status is never
    /// produced, but call sites can still match on the complete protocol.
    FinalizationError,
}

/// how many results a call should leave on the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCount {
    /// pad with nil, or drop surplus, down to exactly this many
    Exactly(usize),
    /// keep however many values the callee returned
    All,
}

/// The stock message handler: swaps the raised error value for a rendered
/// traceback seeded with the error's text. Its own activation is skipped,
/// so the traceback starts at the frame that raised.
pub fn traceback_handler() -> Value {
    Value::Native(NativeFn::new("traceback", |interp: &mut Interp, args: &[Value]| {
        let text = args.first().cloned().unwrap_or(Value::Nil).to_string();
        Ok(vec![Value::Str(interp.traceback(&text, 1))])
    }))
}

/// One embedded interpreter plus the host-visible value stack.
///
/// Not reentrant-safe: an instance must be driven by one thread at a time.
/// Dropping it releases the environment and everything still on the stack.
pub struct Instance {
    interp: Interp,
    stack: Stack,
}

impl Instance {
    /// Creates an instance with the standard environment installed.
    ///
    /// On failure there is no instance to clean up; the host should give up
    /// on the workflow.
    pub fn new() -> Result<Self, InitError> {
        let mut interp = Interp::new();
        builtins::install(&mut interp.globals);
        let mut instance = Instance {
            interp,
            stack: Stack::new(),
        };
        instance
            .load("<prelude>", PRELUDE)
            .map_err(|e| InitError {
                message: e.to_string(),
            })?;
        Ok(instance)
    }

    /// sets the call-frame budget, returns the previous one
    pub fn set_max_depth(&mut self, depth: usize) -> usize {
        self.interp.set_max_depth(depth)
    }

    /// Compiles and immediately runs a chunk of source text. On success the
    /// chunk's function definitions (and global assignments) are visible to
    /// later calls.
    pub fn load(&mut self, name: &str, source: &str) -> Result<(), LoadError> {
        debug!(chunk = name, "loading chunk");
        let chunk = parser::parse(source).map_err(|e| LoadError::Parse {
            message: e.to_string(),
        })?;
        self.interp.run_chunk(name, &chunk).map_err(|e| {
            self.interp.frames.clear();
            LoadError::Runtime {
                message: e.to_string(),
            }
        })
    }

    /// reads a script file and loads it as a chunk named after the file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load(&name, &source)
    }

    // ------------------------------------------------------------------
    // globals
    // ------------------------------------------------------------------

    pub fn get_global(&self, name: &str) -> Option<&Value> {
        self.interp.globals.get(name)
    }

    pub fn set_global(&mut self, name: &str, val: impl Into<Value>) {
        self.interp.globals.insert(name.to_owned(), val.into());
    }

    /// makes a host function callable from script code
    pub fn register_native(
        &mut self,
        name: &str,
        func: impl Fn(&mut Interp, &[Value]) -> vm::Result<Vec<Value>> + 'static,
    ) {
        self.interp
            .globals
            .insert(name.to_owned(), Value::Native(NativeFn::new(name, func)));
    }

    // ------------------------------------------------------------------
    // stack
    // ------------------------------------------------------------------

    /// read access to the value stack, mostly useful for diagnostics
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn push(&mut self, val: impl Into<Value>) {
        self.stack.push(val.into());
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// relative stack read; `-1` is the top, `0` the bottom
    pub fn get(&self, idx: isize) -> Option<&Value> {
        self.stack.get(idx)
    }

    /// truncates (or nil-pads) the stack to the given depth
    pub fn set_depth(&mut self, depth: usize) {
        self.stack.set_depth(depth);
    }

    /// pushes the named global, or nil when there is none
    pub fn push_global(&mut self, name: &str) {
        let val = self.interp.globals.get(name).cloned().unwrap_or(Value::Nil);
        self.stack.push(val);
    }

    // ------------------------------------------------------------------
    // calls
    // ------------------------------------------------------------------

    /// Unprotected call primitive. Expects a callable and `nargs` arguments
    /// on top of the stack, consumes them, and leaves the declared results.
    ///
    /// # Panics
    ///
    /// Panics on any script-side failure. This call form offers no
    /// isolation: a raise is a host bug by contract, and takes the process
    /// down with a traceback. Use [`Instance::pcall`] for anything that may
    /// fail.
    pub fn call(&mut self, nargs: usize, nresults: ResultCount) {
        match self.consume_call(nargs) {
            Ok(vals) => self.push_results(vals, nresults),
            Err(e) => {
                let trace = self.interp.traceback(&e.into_value().to_string(), 0);
                panic!("unprotected script call failed: {}", trace);
            }
        }
    }

    /// Protected call primitive. Expects the same stack layout as
    /// [`Instance::call`]; `handler` is the absolute slot of a callable
    /// pushed before the callee, or `None` to keep the raw error value.
    ///
    /// On [`Status::Ok`] the declared results are on the stack. On any
    /// other status exactly one error value is on the stack, and the
    /// caller must pop it before continuing; the handler slot, if any,
    /// stays where the caller pushed it.
    pub fn pcall(&mut self, nargs: usize, nresults: ResultCount, handler: Option<usize>) -> Status {
        let saved_frames = self.interp.frames.len();
        let handler_val = handler.map(|slot| {
            self.stack
                .get(slot as isize)
                .cloned()
                .unwrap_or_else(|| panic!("no message handler at stack slot {}", slot))
        });
        match self.consume_call(nargs) {
            Ok(vals) => {
                debug!(status = %Status::Ok, "protected call finished");
                self.push_results(vals, nresults);
                Status::Ok
            }
            Err(e) => {
                let (mut status, mut err_val) = match e {
                    vm::Error::Raised(val) => (Status::RuntimeError, val),
                    overflow @ vm::Error::DepthExceeded(_) => {
                        (Status::MemoryError, overflow.into_value())
                    }
                };
                if status == Status::RuntimeError {
                    if let Some(handler) = handler_val {
                        match self.interp.call_value(&handler, &[err_val.clone()]) {
                            Ok(vals) => {
                                err_val = vals.into_iter().next().unwrap_or(Value::Nil);
                            }
                            Err(_) => {
                                status = Status::ErrorInHandler;
                                err_val = Value::Str("error in message handler".into());
                            }
                        }
                    }
                }
                self.interp.frames.truncate(saved_frames);
                debug!(status = %status, "protected call failed");
                self.stack.push(err_val);
                status
            }
        }
    }

    /// Looks `name` up, pushes it with the arguments, and calls it
    /// unprotected. `Err` means the global is missing or not callable;
    /// in that case nothing was pushed and nothing ran.
    ///
    /// # Panics
    ///
    /// Like [`Instance::call`], panics when the callee raises.
    pub fn call_unprotected(
        &mut self,
        name: &str,
        args: &[Value],
        nresults: ResultCount,
    ) -> Result<(), LookupError> {
        let callee = self.lookup_callable(name)?.clone();
        self.stack.push(callee);
        for arg in args {
            self.stack.push(arg.clone());
        }
        self.call(args.len(), nresults);
        Ok(())
    }

    /// Looks `name` up and calls it protected, optionally through a message
    /// handler. The handler is pushed below the callee for the duration of
    /// the call and removed afterwards, so the net stack effect is the
    /// declared results on [`Status::Ok`] and exactly one error value
    /// otherwise. `Err` means the lookup failed before anything ran.
    pub fn call_protected(
        &mut self,
        name: &str,
        args: &[Value],
        nresults: ResultCount,
        handler: Option<Value>,
    ) -> Result<Status, LookupError> {
        let callee = self.lookup_callable(name)?.clone();
        let base = self.stack.depth();
        let handler_slot = handler.map(|h| {
            self.stack.push(h);
            base
        });
        self.stack.push(callee);
        for arg in args {
            self.stack.push(arg.clone());
        }
        let status = self.pcall(args.len(), nresults, handler_slot);
        if handler_slot.is_some() {
            // drop the handler slot and close the gap; results stay on top
            self.stack.remove(base);
        }
        Ok(status)
    }

    fn lookup_callable(&self, name: &str) -> Result<&Value, LookupError> {
        match self.interp.globals.get(name) {
            None => Err(LookupError::Undefined(name.to_owned())),
            Some(val) if !val.is_callable() => Err(LookupError::NotCallable {
                name: name.to_owned(),
                kind: val.kind(),
            }),
            Some(val) => Ok(val),
        }
    }

    /// pops callee + args off the stack and runs the call
    fn consume_call(&mut self, nargs: usize) -> vm::Result<Vec<Value>> {
        assert!(
            self.stack.depth() > nargs,
            "the stack must hold a callable and {} arguments",
            nargs
        );
        let callee_slot = self.stack.depth() - nargs - 1;
        let args = self.stack.split_off(callee_slot + 1);
        let callee = self.stack.pop().unwrap();
        self.interp.call_value(&callee, &args)
    }

    fn push_results(&mut self, mut vals: Vec<Value>, nresults: ResultCount) {
        if let ResultCount::Exactly(n) = nresults {
            vals.resize(n, Value::Nil);
        }
        for val in vals {
            self.stack.push(val);
        }
    }
}
