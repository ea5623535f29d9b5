//! the exec/eval functions that walk the AST

use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::core::{BinOp, Block, Chunk, Expr, FnDef, Frame, Stmt, UnOp, Value};

use super::{raise, Env, Error, Interp, Result};

/// how a statement left the surrounding block
enum Flow {
    Normal,
    Return(Vec<Value>),
}

impl Interp {
    /// Executes a chunk top to bottom against a fresh scope. Function
    /// definitions land in the global environment; top-level `let`s die
    /// with the chunk.
    pub fn run_chunk(&mut self, name: &str, chunk: &Chunk) -> Result<()> {
        self.chunk_name = name.to_owned();
        let mut env = Env::new();
        for stmt in &chunk.0 {
            if let Flow::Return(_) = self.exec_stmt(stmt, &mut env)? {
                // a top-level return just ends the chunk
                break;
            }
        }
        Ok(())
    }

    /// Calls a callable value with the given arguments, on behalf of the
    /// host. Multiple return values come back as a Vec.
    pub fn call_value(&mut self, callee: &Value, args: &[Value]) -> Result<Vec<Value>> {
        self.invoke(callee, args, None)
    }

    pub(crate) fn invoke(
        &mut self,
        callee: &Value,
        args: &[Value],
        call_site: Option<(String, usize)>,
    ) -> Result<Vec<Value>> {
        if self.frames.len() >= self.max_depth() {
            return Err(Error::DepthExceeded(self.max_depth()));
        }
        match callee {
            Value::Fn(def) => {
                trace!(func = %def.name, argc = args.len(), "calling script function");
                self.frames.push(Frame::new(def.name.clone(), call_site));
                // arity is the callee's business: a missing argument is an
                // ordinary runtime error raised here, never checked up front
                // by the host
                for (i, param) in def.params.iter().enumerate() {
                    if i >= args.len() {
                        return Err(Error::Raised(Value::Str(format!(
                            "{}:{}: missing argument #{} ('{}') to '{}'",
                            def.chunk,
                            def.line,
                            i + 1,
                            param,
                            def.name
                        ))));
                    }
                }
                let saved_chunk = mem::replace(&mut self.chunk_name, def.chunk.clone());
                let mut env = Env::new();
                // extra arguments are dropped
                for (param, arg) in def.params.iter().zip(args) {
                    env.define(param.clone(), arg.clone());
                }
                let flow = self.exec_block(&def.body, &mut env);
                self.chunk_name = saved_chunk;
                match flow {
                    Ok(Flow::Return(vals)) => {
                        self.frames.pop();
                        Ok(vals)
                    }
                    Ok(Flow::Normal) => {
                        self.frames.pop();
                        Ok(vec![])
                    }
                    // the frame stays in place for the traceback
                    Err(e) => Err(e),
                }
            }
            Value::Native(native) => {
                trace!(func = %native.name, argc = args.len(), "calling native function");
                self.frames.push(Frame::new(native.name.clone(), call_site));
                let res = native.invoke(self, args);
                if res.is_ok() {
                    self.frames.pop();
                }
                res
            }
            other => {
                let msg = format!("attempt to call a {} value", other.kind());
                Err(match call_site {
                    Some((chunk, line)) => {
                        Error::Raised(Value::Str(format!("{}:{}: {}", chunk, line, msg)))
                    }
                    None => Error::Raised(Value::Str(msg)),
                })
            }
        }
    }

    fn exec_block(&mut self, block: &Block, env: &mut Env) -> Result<Flow> {
        env.open();
        let mut result = Flow::Normal;
        for stmt in &block.0 {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                ret @ Flow::Return(_) => {
                    result = ret;
                    break;
                }
            }
        }
        env.close();
        Ok(result)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &mut Env) -> Result<Flow> {
        match stmt {
            Stmt::Fn(line, decl) => {
                let def = FnDef {
                    name: decl.name.clone(),
                    params: decl.params.clone(),
                    body: decl.body.clone(),
                    line: *line,
                    chunk: self.chunk_name.clone(),
                };
                self.globals.insert(decl.name.clone(), Value::Fn(Rc::new(def)));
                Ok(Flow::Normal)
            }
            Stmt::Let(_, name, expr) => {
                let val = self.eval_expr(expr, env)?;
                env.define(name.clone(), val);
                Ok(Flow::Normal)
            }
            Stmt::Assign(_, name, expr) => {
                let val = self.eval_expr(expr, env)?;
                if env.contains(name) {
                    env.assign(name, val);
                } else {
                    // assignment to an unbound name creates a global
                    self.globals.insert(name.clone(), val);
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(_, exprs) => {
                // a lone call in return position forwards all its results
                let vals = match exprs.as_slice() {
                    [only @ Expr::Call(..)] => self.eval_call_expr(only, env)?,
                    _ => exprs
                        .iter()
                        .map(|e| self.eval_expr(e, env))
                        .collect::<Result<Vec<_>>>()?,
                };
                Ok(Flow::Return(vals))
            }
            Stmt::If(_, cond, then_block, else_block) => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.exec_block(then_block, env)
                } else if let Some(block) = else_block {
                    self.exec_block(block, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Expr(_, expr) => {
                if let Expr::Call(..) = expr {
                    self.eval_call_expr(expr, env)?;
                } else {
                    self.eval_expr(expr, env)?;
                }
                Ok(Flow::Normal)
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr, env: &mut Env) -> Result<Value> {
        use Expr::*;
        Ok(match expr {
            Nil(_) => Value::Nil,
            Bool(_, b) => Value::Bool(*b),
            Num(_, n) => Value::Num(*n),
            Str(_, s) => Value::Str(s.clone()),
            Symbol(line, name) => match env.get(name).or_else(|| self.globals.get(name)) {
                Some(val) => val.clone(),
                None => raise!(self, *line, "undefined variable '{}'", name),
            },
            Table(_, entries) => {
                let mut table = crate::core::Table::new();
                for (key, e) in entries {
                    let val = self.eval_expr(e, env)?;
                    table.insert(key.clone(), val);
                }
                Value::Table(table)
            }
            Field(line, obj, key) => match self.eval_expr(obj, env)? {
                Value::Table(t) => t.get(key).cloned().unwrap_or(Value::Nil),
                other => raise!(self, *line, "attempt to index a {} value", other.kind()),
            },
            Call(..) => {
                let mut vals = self.eval_call_expr(expr, env)?;
                // in value position a call collapses to its first result
                if vals.is_empty() {
                    Value::Nil
                } else {
                    vals.swap_remove(0)
                }
            }
            Unary(line, UnOp::Neg, e) => match self.eval_expr(e, env)? {
                Value::Num(n) => Value::Num(-n),
                other => raise!(self, *line, "attempt to negate a {} value", other.kind()),
            },
            Binary(line, op, lhs, rhs) => {
                let a = self.eval_expr(lhs, env)?;
                let b = self.eval_expr(rhs, env)?;
                self.apply_binop(*line, *op, a, b)?
            }
        })
    }

    fn eval_call_expr(&mut self, expr: &Expr, env: &mut Env) -> Result<Vec<Value>> {
        let Expr::Call(line, callee, args) = expr else {
            unreachable!("eval_call_expr on a non-call expression");
        };
        let func = self.eval_expr(callee, env)?;
        let mut argv = Vec::with_capacity(args.len());
        for a in args {
            argv.push(self.eval_expr(a, env)?);
        }
        let site = Some((self.chunk_name.clone(), *line));
        self.invoke(&func, &argv, site)
    }

    fn apply_binop(&self, line: usize, op: BinOp, a: Value, b: Value) -> Result<Value> {
        use BinOp::*;
        use Value::*;
        Ok(match op {
            Concat => {
                let l = self.concat_operand(line, a)?;
                let r = self.concat_operand(line, b)?;
                Str(l + &r)
            }
            Add | Sub | Mul | Div => match (a, b) {
                (Num(x), Num(y)) => Num(match op {
                    Add => x + y,
                    Sub => x - y,
                    Mul => x * y,
                    Div => x / y,
                    _ => unreachable!(),
                }),
                (x, y) => {
                    let offender = if matches!(x, Num(_)) { y } else { x };
                    raise!(
                        self,
                        line,
                        "attempt to perform arithmetic on a {} value",
                        offender.kind()
                    )
                }
            },
            Eq => Bool(a == b),
            Neq => Bool(a != b),
            Lt | Le | Gt | Ge => match (&a, &b) {
                (Num(x), Num(y)) => Bool(compare(op, x, y)),
                (Str(x), Str(y)) => Bool(compare(op, x, y)),
                _ => raise!(self, line, "attempt to compare {} with {}", a.kind(), b.kind()),
            },
        })
    }

    fn concat_operand(&self, line: usize, v: Value) -> Result<String> {
        match v {
            Value::Str(s) => Ok(s),
            Value::Num(_) => Ok(v.to_string()),
            other => raise!(self, line, "attempt to concatenate a {} value", other.kind()),
        }
    }
}

fn compare<T: PartialOrd>(op: BinOp, a: &T, b: &T) -> bool {
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::vm::builtins;

    fn interp_for(src: &str) -> Interp {
        let mut interp = Interp::new();
        builtins::install(&mut interp.globals);
        let chunk = parser::parse(src).expect("test chunk parses");
        interp.run_chunk("test.lun", &chunk).expect("test chunk runs");
        interp
    }

    fn call(interp: &mut Interp, name: &str, args: &[Value]) -> Result<Vec<Value>> {
        let f = interp.globals[name].clone();
        interp.call_value(&f, args)
    }

    #[test]
    fn chunk_defines_globals() {
        let interp = interp_for("fn id(x) { return x; }\nanswer = 41 + 1;");
        assert!(matches!(interp.globals["id"], Value::Fn(_)));
        assert_eq!(interp.globals["answer"], Value::Num(42.0));
    }

    #[test]
    fn top_level_lets_die_with_the_chunk() {
        let interp = interp_for("let hidden = 1;\nseen = 2;");
        assert!(!interp.globals.contains_key("hidden"));
        assert!(interp.globals.contains_key("seen"));
    }

    #[test]
    fn calls_return_multiple_values() {
        let mut interp = interp_for("fn swap(a, b) { return b, a; }");
        let vals = call(&mut interp, "swap", &["red".into(), "green".into()]).unwrap();
        assert_eq!(vals, vec![Value::from("green"), Value::from("red")]);
    }

    #[test]
    fn return_forwards_a_lone_call() {
        let src = "fn swap(a, b) { return b, a; }\n\
                   fn swap2(a, b) { return swap(a, b); }";
        let mut interp = interp_for(src);
        let vals = call(&mut interp, "swap2", &[Value::Num(1.0), Value::Num(2.0)]).unwrap();
        assert_eq!(vals.len(), 2);
    }

    #[test]
    fn missing_argument_raises() {
        let mut interp = interp_for("fn swap(a, b) { return b, a; }");
        let err = call(&mut interp, "swap", &["red".into()]).unwrap_err();
        let val = match err {
            Error::Raised(val) => val,
            other => panic!("expected a raise, got {other:?}"),
        };
        let text = val.to_string();
        assert!(text.contains("missing argument #2 ('b') to 'swap'"), "{text}");
        assert!(text.starts_with("test.lun:1:"), "{text}");
    }

    #[test]
    fn frames_survive_a_raise_until_cleared() {
        let src = "fn inner() { error(\"boom\"); }\n\
                   fn outer() { inner(); }";
        let mut interp = interp_for(src);
        let err = call(&mut interp, "outer", &[]).unwrap_err();
        let text = interp.traceback(&err.into_value().to_string(), 0);
        assert!(text.contains("in function 'inner'"), "{text}");
        assert!(text.contains("in function 'outer'"), "{text}");
        // the error() native itself is the innermost frame
        assert!(text.contains("in function 'error'"), "{text}");
    }

    #[test]
    fn runaway_recursion_exhausts_the_frame_budget() {
        let mut interp = interp_for("fn forever() { forever(); }");
        interp.set_max_depth(20);
        let err = call(&mut interp, "forever", &[]).unwrap_err();
        assert!(matches!(err, Error::DepthExceeded(20)));
    }

    #[test]
    fn tables_support_literals_fields_and_put() {
        let src = "fn pick(t) { return t.color; }\n\
                   conf = { color: \"red\", size: 2 };\n\
                   conf2 = put(conf, \"color\", \"blue\");";
        let mut interp = interp_for(src);
        let updated = interp.globals["conf2"].clone();
        let vals = call(&mut interp, "pick", &[updated]).unwrap();
        assert_eq!(vals, vec![Value::from("blue")]);
        // put works on a copy, the original table is untouched
        let original = interp.globals["conf"].clone();
        let vals = call(&mut interp, "pick", &[original]).unwrap();
        assert_eq!(vals, vec![Value::from("red")]);
    }

    #[test]
    fn concat_and_comparisons_branch() {
        let src = r#"
fn describe(n) {
    if n < 10 {
        return "small " .. n;
    } else {
        return "big " .. n;
    }
}
"#;
        let mut interp = interp_for(src);
        let vals = call(&mut interp, "describe", &[Value::Num(5.0)]).unwrap();
        assert_eq!(vals, vec![Value::from("small 5")]);
        let vals = call(&mut interp, "describe", &[Value::Num(12.0)]).unwrap();
        assert_eq!(vals, vec![Value::from("big 12")]);
    }

    #[test]
    fn unary_negation_feeds_numeric_builtins() {
        let mut interp = interp_for("fn f(n) { return abs(-n) + floor(1.5); }");
        let vals = call(&mut interp, "f", &[Value::Num(3.0)]).unwrap();
        assert_eq!(vals, vec![Value::Num(4.0)]);
    }

    #[test]
    fn string_builtins_compose() {
        let mut interp = interp_for("fn shout(s) { return upper(s) .. \"!\" .. len(s); }");
        let vals = call(&mut interp, "shout", &["hey".into()]).unwrap();
        assert_eq!(vals, vec![Value::from("HEY!3")]);
    }

    #[test]
    fn arithmetic_type_errors_name_the_offender() {
        let mut interp = interp_for("fn add(a, b) { return a + b; }");
        let err = call(&mut interp, "add", &[Value::Num(1.0), "x".into()]).unwrap_err();
        let text = err.into_value().to_string();
        assert!(text.contains("attempt to perform arithmetic on a string value"), "{text}");
    }

    #[test]
    fn calling_a_non_callable_raises() {
        let mut interp = interp_for("not_a_fn = 42;");
        let err = call(&mut interp, "not_a_fn", &[]).unwrap_err();
        let text = err.into_value().to_string();
        assert!(text.contains("attempt to call a number value"), "{text}");
    }
}
