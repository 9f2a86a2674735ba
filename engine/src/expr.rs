//! Arithmetic over written messages.
//!
//! The payload of an output `c!expr -> P` is either a bound variable,
//! passed through verbatim, or an arithmetic expression over unsigned
//! values. A bound variable that is not an integer literal when used
//! in arithmetic is reported with its source position and treated as
//! zero; the trace continues.

use std::fmt;

use crate::diag::{DiagSink, SourcePos};
use crate::status::Status;

pub type Value = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
        }
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Var { name: String, pos: SourcePos },
    Lit(Value),
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    pub fn var(name: impl Into<String>, pos: SourcePos) -> Self {
        Expr::Var { name: name.into(), pos }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn eval(&self, status: &Status, diags: &DiagSink) -> Value {
        match self {
            Expr::Lit(value) => *value,
            Expr::Var { name, pos } => {
                let Some(bound) = status.lookup(name) else {
                    diags.report(*pos, format!("{name} is not bound"));
                    return 0;
                };
                match bound.parse::<Value>() {
                    Ok(v) => v,
                    Err(_) => {
                        diags.report(
                            *pos,
                            format!(
                                "bound variable {name} is not of integer type"
                            ),
                        );
                        0
                    }
                }
            }
            Expr::Binary { op, left, right } => {
                let a = left.eval(status, diags);
                let b = right.eval(status, diags);
                match op {
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    BinOp::Mul => a.wrapping_mul(b),
                    BinOp::Div => a.checked_div(b).unwrap_or_else(|| {
                        diags.report(self.pos(), "division by zero".to_string());
                        0
                    }),
                    BinOp::Mod => a.checked_rem(b).unwrap_or_else(|| {
                        diags.report(self.pos(), "division by zero".to_string());
                        0
                    }),
                }
            }
        }
    }

    fn pos(&self) -> SourcePos {
        match self {
            Expr::Var { pos, .. } => *pos,
            Expr::Lit(_) => SourcePos::default(),
            Expr::Binary { left, .. } => left.pos(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var { name, .. } => write!(f, "{name}"),
            Expr::Lit(value) => write!(f, "{value}"),
            Expr::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::Prng;

    fn status_with(bindings: &[(&str, &str)]) -> Status {
        Status::new(Prng::seeded(0)).bind(
            bindings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn arithmetic_over_bindings() {
        let st = status_with(&[("x", "6"), ("y", "4")]);
        let diags = DiagSink::new();
        let e = Expr::binary(
            BinOp::Add,
            Expr::binary(
                BinOp::Mul,
                Expr::var("x", SourcePos::default()),
                Expr::Lit(2),
            ),
            Expr::binary(
                BinOp::Mod,
                Expr::var("y", SourcePos::default()),
                Expr::Lit(3),
            ),
        );
        assert_eq!(e.eval(&st, &diags), 13);
        assert!(diags.is_empty());
    }

    #[test]
    fn non_integer_binding_reports_and_yields_zero() {
        let st = status_with(&[("x", "\"hi\"")]);
        let diags = DiagSink::new();
        let e = Expr::binary(
            BinOp::Add,
            Expr::var("x", SourcePos::new(3, 7)),
            Expr::Lit(1),
        );
        assert_eq!(e.eval(&st, &diags), 1);
        let reported = diags.drain();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].pos, SourcePos::new(3, 7));
        assert!(reported[0].message.contains("not of integer type"));
    }

    #[test]
    fn division_by_zero_is_zero() {
        let st = status_with(&[]);
        let diags = DiagSink::new();
        let e = Expr::binary(BinOp::Div, Expr::Lit(5), Expr::Lit(0));
        assert_eq!(e.eval(&st, &diags), 0);
        assert_eq!(diags.drain().len(), 1);
    }
}
