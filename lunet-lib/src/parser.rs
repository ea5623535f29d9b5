//! Turns source text into a [`Chunk`](crate::core::Chunk).
//!
//! The pest grammar lives in `grammar.pest`; this module lowers the parse
//! tree into the AST and records the source line of every node on the way.

use once_cell::sync::Lazy;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::core::*;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct LunParser;

pub type ParseError = pest::error::Error<Rule>;
pub type ParseResult<T> = Result<T, ParseError>;

pub type Pair<'a> = pest::iterators::Pair<'a, Rule>;
pub type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    // lowest precedence first
    PrattParser::new()
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::neq, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::concat, Assoc::Right))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left) | Op::infix(Rule::div, Assoc::Left))
        .op(Op::prefix(Rule::neg))
        .op(Op::postfix(Rule::call_args) | Op::postfix(Rule::field))
});

pub fn parse(src: &str) -> ParseResult<Chunk> {
    let mut pairs = LunParser::parse(Rule::file, src)?;
    let file = pairs.next().unwrap();
    let stmts = file
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(parse_stmt)
        .collect::<ParseResult<_>>()?;
    Ok(Chunk(stmts))
}

fn line_of(pair: &Pair) -> usize {
    pair.as_span().start_pos().line_col().0
}

fn parse_stmt(pair: Pair) -> ParseResult<Stmt> {
    assert!(matches!(pair.as_rule(), Rule::stmt));
    let line = line_of(&pair);
    let child = get_single_child(pair.into_inner());
    match child.as_rule() {
        Rule::fn_def => parse_fn_def(line, child),
        Rule::let_stmt => {
            let mut inner = child.into_inner();
            let name = inner.next().unwrap().as_str().to_owned();
            let value = parse_expr(inner.next().unwrap())?;
            Ok(Stmt::Let(line, name, value))
        }
        Rule::assign => {
            let mut inner = child.into_inner();
            let name = inner.next().unwrap().as_str().to_owned();
            let value = parse_expr(inner.next().unwrap())?;
            Ok(Stmt::Assign(line, name, value))
        }
        Rule::return_stmt => {
            let values = match child.into_inner().next() {
                Some(list) => parse_expr_list(list)?,
                None => vec![],
            };
            Ok(Stmt::Return(line, values))
        }
        Rule::if_stmt => {
            let mut inner = child.into_inner();
            let cond = parse_expr(inner.next().unwrap())?;
            let then_block = parse_block(inner.next().unwrap())?;
            let else_block = inner.next().map(parse_block).transpose()?;
            Ok(Stmt::If(line, cond, then_block, else_block))
        }
        Rule::expr_stmt => {
            let expr = parse_expr(get_single_child(child.into_inner()))?;
            Ok(Stmt::Expr(line, expr))
        }
        _ => unreachable!(),
    }
}

fn parse_fn_def(line: usize, pair: Pair) -> ParseResult<Stmt> {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_owned();
    let mut params = vec![];
    let mut body = None;
    for p in inner {
        match p.as_rule() {
            Rule::params => params = p.into_inner().map(|s| s.as_str().to_owned()).collect(),
            Rule::block => body = Some(parse_block(p)?),
            _ => unreachable!(),
        }
    }
    Ok(Stmt::Fn(
        line,
        FnDecl {
            name,
            params,
            body: body.unwrap(),
        },
    ))
}

fn parse_block(pair: Pair) -> ParseResult<Block> {
    assert!(matches!(pair.as_rule(), Rule::block));
    let stmts = pair
        .into_inner()
        .map(parse_stmt)
        .collect::<ParseResult<_>>()?;
    Ok(Block(stmts))
}

fn parse_expr_list(pair: Pair) -> ParseResult<Vec<Expr>> {
    assert!(matches!(pair.as_rule(), Rule::expr_list));
    pair.into_inner().map(parse_expr).collect()
}

fn parse_expr(pair: Pair) -> ParseResult<Expr> {
    assert!(matches!(pair.as_rule(), Rule::expr));
    PRATT
        .map_primary(parse_primary)
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::neg => Ok(Expr::Unary(line_of(&op), UnOp::Neg, Box::new(rhs?))),
            _ => unreachable!(),
        })
        .map_postfix(|lhs, op| {
            let line = line_of(&op);
            match op.as_rule() {
                Rule::call_args => {
                    let args = match op.into_inner().next() {
                        Some(list) => parse_expr_list(list)?,
                        None => vec![],
                    };
                    Ok(Expr::Call(line, Box::new(lhs?), args))
                }
                Rule::field => {
                    let name = get_single_child(op.into_inner()).as_str().to_owned();
                    Ok(Expr::Field(line, Box::new(lhs?), name))
                }
                _ => unreachable!(),
            }
        })
        .map_infix(|lhs, op, rhs| {
            let bin_op = match op.as_rule() {
                Rule::concat => BinOp::Concat,
                Rule::add => BinOp::Add,
                Rule::sub => BinOp::Sub,
                Rule::mul => BinOp::Mul,
                Rule::div => BinOp::Div,
                Rule::eq => BinOp::Eq,
                Rule::neq => BinOp::Neq,
                Rule::lt => BinOp::Lt,
                Rule::le => BinOp::Le,
                Rule::gt => BinOp::Gt,
                Rule::ge => BinOp::Ge,
                _ => unreachable!(),
            };
            Ok(Expr::Binary(
                line_of(&op),
                bin_op,
                Box::new(lhs?),
                Box::new(rhs?),
            ))
        })
        .parse(pair.into_inner())
}

fn parse_primary(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    Ok(match pair.as_rule() {
        Rule::nil => Expr::Nil(line),
        Rule::true_lit => Expr::Bool(line, true),
        Rule::false_lit => Expr::Bool(line, false),
        Rule::number => Expr::Num(line, pair.as_str().parse().unwrap()),
        Rule::string => {
            let raw = get_single_child(pair.into_inner()).as_str();
            Expr::Str(line, unescape(raw))
        }
        Rule::symbol => Expr::Symbol(line, pair.as_str().to_owned()),
        Rule::table => {
            let entries = pair
                .into_inner()
                .map(|entry| {
                    let mut inner = entry.into_inner();
                    let key = inner.next().unwrap().as_str().to_owned();
                    let value = parse_expr(inner.next().unwrap())?;
                    Ok((key, value))
                })
                .collect::<ParseResult<_>>()?;
            Expr::Table(line, entries)
        }
        // a parenthesized expression surfaces as a nested expr pair
        Rule::expr => parse_expr(pair)?,
        _ => unreachable!(),
    })
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn get_single_child(pairs: Pairs) -> Pair {
    let children: Vec<Pair> = pairs.collect();
    assert!(
        children.len() == 1,
        "get_single_child found {} children in {:#?}",
        children.len(),
        children
    );
    children[0].clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_function_definition() {
        let chunk = parse("fn swap(a, b) {\n    return b, a;\n}\n").unwrap();
        assert_eq!(chunk.0.len(), 1);
        let Stmt::Fn(line, decl) = &chunk.0[0] else {
            panic!("expected a fn statement")
        };
        assert_eq!(*line, 1);
        assert_eq!(decl.name, "swap");
        assert_eq!(decl.params, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn records_source_lines() {
        let chunk = parse("x = 1;\n\ny = 2;\n").unwrap();
        let lines: Vec<usize> = chunk
            .0
            .iter()
            .map(|s| match s {
                Stmt::Assign(line, ..) => *line,
                _ => panic!("expected assignments"),
            })
            .collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn operator_precedence() {
        let chunk = parse("x = 1 + 2 * 3;").unwrap();
        let Stmt::Assign(_, _, Expr::Binary(_, BinOp::Add, _, rhs)) = &chunk.0[0] else {
            panic!("expected + at the top")
        };
        assert!(matches!(**rhs, Expr::Binary(_, BinOp::Mul, ..)));
    }

    #[test]
    fn postfix_calls_chain() {
        let chunk = parse("x = f(1)(2);").unwrap();
        let Stmt::Assign(_, _, Expr::Call(_, callee, _)) = &chunk.0[0] else {
            panic!("expected a call")
        };
        assert!(matches!(**callee, Expr::Call(..)));
    }

    #[test]
    fn string_escapes() {
        let chunk = parse(r#"x = "a\"b\n";"#).unwrap();
        let Stmt::Assign(_, _, Expr::Str(_, s)) = &chunk.0[0] else {
            panic!("expected a string")
        };
        assert_eq!(s, "a\"b\n");
    }

    #[test]
    fn keywords_are_not_symbols() {
        assert!(parse("let return = 1;").is_err());
        assert!(parse("nilish = 1;").is_ok());
    }

    #[test]
    fn reports_syntax_errors() {
        let err = parse("fn broken( {").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn comments_are_skipped() {
        let chunk = parse("# a comment\nx = 1; # trailing\n").unwrap();
        assert_eq!(chunk.0.len(), 1);
    }
}
