//! A small embeddable scripting language, plus the embedding layer a host
//! program drives it through.
//!
//! What you do to run script code from a host:
//! 1. create an [`embed::Instance`]; the standard environment comes
//!    pre-installed
//! 1. load one or more chunks with [`embed::Instance::load`] or
//!    [`embed::Instance::load_file`]; loading runs the chunk, which is how
//!    its function definitions end up in the global environment
//! 1. call script functions either by name
//!    ([`embed::Instance::call_unprotected`] /
//!    [`embed::Instance::call_protected`]) or through the stack primitives
//!    ([`embed::Instance::push_global`], [`embed::Instance::call`],
//!    [`embed::Instance::pcall`])
//! 1. read results off the value stack with relative indices, then restore
//!    the stack depth
//!
//! ```
//! use lunet_lib::core::Value;
//! use lunet_lib::embed::{Instance, ResultCount};
//!
//! let mut vm = Instance::new().unwrap();
//! vm.load("demo", "fn swap(a, b) { return b, a; }").unwrap();
//!
//! vm.call_unprotected("swap", &["red".into(), "green".into()], ResultCount::Exactly(2))
//!     .unwrap();
//! assert_eq!(vm.get(-2), Some(&Value::from("green")));
//! assert_eq!(vm.get(-1), Some(&Value::from("red")));
//! vm.set_depth(0);
//! ```

pub mod core;
pub mod embed;
pub mod parser;
pub mod vm;
