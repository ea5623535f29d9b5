//! The native half of the standard environment.
//!
//! Everything here is installed into the globals of a fresh interpreter;
//! the other half of the standard environment is written in lunet itself
//! and loaded by the embedding layer.

use std::collections::HashMap;

use crate::core::{NativeFn, Value};
use crate::vm::{Error, Interp, Result};

pub fn install(globals: &mut HashMap<String, Value>) {
    register(globals, "print", print);
    register(globals, "error", error);
    register(globals, "type", type_of);
    register(globals, "tostring", tostring);
    register(globals, "len", len);
    register(globals, "put", put);
    register(globals, "upper", upper);
    register(globals, "lower", lower);
    register(globals, "abs", abs);
    register(globals, "floor", floor);
}

fn register(
    globals: &mut HashMap<String, Value>,
    name: &str,
    func: fn(&mut Interp, &[Value]) -> Result<Vec<Value>>,
) {
    globals.insert(name.to_owned(), Value::Native(NativeFn::new(name, func)));
}

/// missing arguments read as nil, like everywhere else in the language
fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Nil)
}

fn bad_arg(interp: &Interp, func: &str, i: usize, expected: &str, got: &Value) -> Error {
    interp.error_from_native(format!(
        "bad argument #{} to '{}' ({} expected, got {})",
        i + 1,
        func,
        expected,
        got.kind()
    ))
}

fn print(_: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    let line: Vec<String> = args.iter().map(ToString::to_string).collect();
    println!("{}", line.join("\t"));
    Ok(vec![])
}

/// raises its argument as an error value. String messages get the position
/// of the `error` call prepended
fn error(interp: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    let val = match arg(args, 0) {
        Value::Str(msg) => match interp.frames.last().and_then(|f| f.call_site.clone()) {
            Some((chunk, line)) => Value::Str(format!("{}:{}: {}", chunk, line, msg)),
            None => Value::Str(msg),
        },
        other => other,
    };
    Err(Error::Raised(val))
}

fn type_of(_: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    let val = arg(args, 0);
    let name = if val.is_callable() {
        "function".to_owned()
    } else {
        val.kind().to_string()
    };
    Ok(vec![Value::Str(name)])
}

fn tostring(_: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    Ok(vec![Value::Str(arg(args, 0).to_string())])
}

fn len(interp: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    match arg(args, 0) {
        Value::Str(s) => Ok(vec![Value::Num(s.len() as f64)]),
        Value::Table(t) => Ok(vec![Value::Num(t.len() as f64)]),
        other => Err(bad_arg(interp, "len", 0, "string or table", &other)),
    }
}

/// `put(t, key, val)` returns a copy of `t` with `key` bound to `val`;
/// tables are persistent, the original is untouched
fn put(interp: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    let table = match arg(args, 0) {
        Value::Table(t) => t,
        other => return Err(bad_arg(interp, "put", 0, "table", &other)),
    };
    let key = match arg(args, 1) {
        Value::Str(k) => k,
        other => return Err(bad_arg(interp, "put", 1, "string", &other)),
    };
    Ok(vec![Value::Table(table.update(key, arg(args, 2)))])
}

fn upper(interp: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    match arg(args, 0) {
        Value::Str(s) => Ok(vec![Value::Str(s.to_uppercase())]),
        other => Err(bad_arg(interp, "upper", 0, "string", &other)),
    }
}

fn lower(interp: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    match arg(args, 0) {
        Value::Str(s) => Ok(vec![Value::Str(s.to_lowercase())]),
        other => Err(bad_arg(interp, "lower", 0, "string", &other)),
    }
}

fn abs(interp: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    match arg(args, 0) {
        Value::Num(n) => Ok(vec![Value::Num(n.abs())]),
        other => Err(bad_arg(interp, "abs", 0, "number", &other)),
    }
}

fn floor(interp: &mut Interp, args: &[Value]) -> Result<Vec<Value>> {
    match arg(args, 0) {
        Value::Num(n) => Ok(vec![Value::Num(n.floor())]),
        other => Err(bad_arg(interp, "floor", 0, "number", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_prefixes_string_messages_with_the_call_site() {
        use crate::core::Frame;
        let mut interp = Interp::new();
        interp
            .frames
            .push(Frame::new("error", Some(("demo.lun".into(), 7))));
        let err = error(&mut interp, &["boom".into()]).unwrap_err();
        assert_eq!(err.into_value().to_string(), "demo.lun:7: boom");
    }

    #[test]
    fn error_passes_non_string_values_through() {
        let mut interp = Interp::new();
        let err = error(&mut interp, &[Value::Num(42.0)]).unwrap_err();
        assert_eq!(err.into_value(), Value::Num(42.0));
    }

    #[test]
    fn put_leaves_the_original_table_alone() {
        let mut interp = Interp::new();
        let t = Value::Table(crate::core::Table::new());
        let out = put(&mut interp, &[t.clone(), "k".into(), Value::Num(1.0)]).unwrap();
        let Value::Table(updated) = &out[0] else {
            panic!("put should return a table")
        };
        assert_eq!(updated.len(), 1);
        let Value::Table(original) = &t else { unreachable!() };
        assert_eq!(original.len(), 0);
    }

    #[test]
    fn type_reports_callables_as_functions() {
        let mut interp = Interp::new();
        install(&mut interp.globals);
        let f = interp.globals["print"].clone();
        let out = type_of(&mut interp, &[f]).unwrap();
        assert_eq!(out[0], Value::from("function"));
    }
}
