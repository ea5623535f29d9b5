//! Calls functions defined by a script, the four canonical ways:
//! unprotected with and without results, protected without a handler, and
//! protected with the traceback message handler installed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lunet_lib::core::Value;
use lunet_lib::embed::{traceback_handler, Instance, ResultCount, Status};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// script defining hello, swap and fail
    #[arg(default_value = "host/scripts/functions.lun")]
    script: PathBuf,

    /// show the bridge's debug events
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // create the interpreter instance; the standard environment comes with it
    let mut vm = Instance::new().context("creating the interpreter instance")?;

    // load the functions
    vm.load_file(&cli.script)
        .with_context(|| format!("loading {}", cli.script.display()))?;

    call_hello(&mut vm);
    call_swap(&mut vm);
    pcall_fail(&mut vm);
    pcall_swap(&mut vm);

    // dropping the instance releases everything
    Ok(())
}

/// calls hello() unprotected, no arguments, no results
fn call_hello(vm: &mut Instance) {
    // push the function
    vm.push_global("hello");
    if vm.get(-1).map_or(true, Value::is_nil) {
        eprintln!("global function hello not found");
        vm.pop();
        return;
    }

    // call with no arguments
    vm.call(0, ResultCount::Exactly(0));
}

/// calls swap("red", "green") unprotected and reads both results
fn call_swap(vm: &mut Instance) {
    // push the function
    vm.push_global("swap");

    // push arguments
    vm.push("red");
    vm.push("green");

    // call (2 arguments, 2 results)
    vm.call(2, ResultCount::Exactly(2));

    // get results
    let first = vm.get(-2).cloned().unwrap_or(Value::Nil);
    let second = vm.get(-1).cloned().unwrap_or(Value::Nil);

    println!("swap() returned {} and {}", first, second);

    // pop the results
    vm.set_depth(vm.depth() - 2);
}

/// calls fail() protected, without a message handler
fn pcall_fail(vm: &mut Instance) {
    // push the function
    vm.push_global("fail");
    if vm.get(-1).map_or(true, Value::is_nil) {
        eprintln!("global function fail not found");
        vm.pop();
        return;
    }

    // call with no arguments, no results
    let status = vm.pcall(0, ResultCount::Exactly(0), None);

    // on anything but Ok exactly one error value waits on the stack
    match status {
        Status::Ok => {}
        Status::RuntimeError => {
            let err = vm.pop().unwrap_or(Value::Nil);
            eprintln!("error: {}", err);
        }
        Status::MemoryError => {
            vm.pop();
            eprintln!("out of call frames");
        }
        Status::ErrorInHandler => {
            vm.pop();
            eprintln!("the message handler failed");
        }
        Status::FinalizationError => {
            vm.pop();
            eprintln!("a finalizer failed");
        }
    }
}

/// calls swap with a missing argument, protected, with the traceback handler
fn pcall_swap(vm: &mut Instance) {
    let top = vm.depth();

    // push the message handler and remember its slot
    vm.push(traceback_handler());
    let handler_slot = vm.depth() - 1;

    // push the function
    vm.push_global("swap");

    // push arguments
    vm.push("red");
    // the second argument stays missing on purpose, to provoke an error

    // call (1 argument, 2 results)
    let status = vm.pcall(1, ResultCount::Exactly(2), Some(handler_slot));

    match status {
        Status::Ok => { /* the two results would be read here */ }
        Status::RuntimeError => {
            // the handler already swapped the error for a traceback
            let err = vm.pop().unwrap_or(Value::Nil);
            eprintln!("{}", err);
        }
        Status::MemoryError => eprintln!("out of call frames"),
        Status::ErrorInHandler => eprintln!("the message handler failed"),
        Status::FinalizationError => eprintln!("a finalizer failed"),
    }

    // revert the stack
    vm.set_depth(top);
}
