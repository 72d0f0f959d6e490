//! Expression trees for function bodies
//!
//! These are the expressions the front end hands over for each statement,
//! branch condition and construction-site argument. They are side-effect free:
//! writes happen through [`Statement`](super::Statement), so evaluating an
//! expression only reads the abstract state.

use super::{KindId, SiteId, SourceLoc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators shared by predicates and body expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// Less than comparison (<)
    Lt,
    /// Less than or equal comparison (<=)
    LtEq,
    /// Greater than comparison (>)
    Gt,
    /// Greater than or equal comparison (>=)
    GtEq,
    /// Equality comparison (==)
    Eq,
    /// Inequality comparison (!=)
    NotEq,
}

impl CompareOp {
    /// The operator that holds exactly when this one does not: `!(a < b)` is `a >= b`
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::GtEq,
            CompareOp::LtEq => CompareOp::Gt,
            CompareOp::Gt => CompareOp::LtEq,
            CompareOp::GtEq => CompareOp::Lt,
            CompareOp::Eq => CompareOp::NotEq,
            CompareOp::NotEq => CompareOp::Eq,
        }
    }

    /// The operator with operands swapped: `a < b` is `b > a`
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::NotEq => CompareOp::NotEq,
        }
    }

    /// Evaluate on concrete integers
    pub fn holds(self, left: i128, right: i128) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::LtEq => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::GtEq => left >= right,
            CompareOp::Eq => left == right,
            CompareOp::NotEq => left != right,
        }
    }
}

/// Integer arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Truncating division
    Div,
    /// Remainder (sign follows the dividend)
    Rem,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Integer negation
    Neg,
    /// Boolean negation
    Not,
}

/// Boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicOp {
    /// Short-circuit conjunction
    And,
    /// Short-circuit disjunction
    Or,
}

/// Value sorts tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sort {
    /// Integer of any width
    Int,
    /// Boolean
    Bool,
    /// Immutable text (tracked by length)
    Text,
    /// Anything the engine does not model
    Opaque,
}

/// A body expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal
    Int(i128),
    /// Boolean literal
    Bool(bool),
    /// String literal
    Str(String),
    /// Local variable or parameter read
    Var(String),
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        expr: Box<Expr>,
    },
    /// Integer arithmetic
    Arith {
        /// Operator
        op: ArithOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Comparison producing a boolean
    Compare {
        /// Operator
        op: CompareOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Short-circuit boolean connective
    Logic {
        /// Connective
        op: LogicOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Length of a text value
    Len(Box<Expr>),
    /// Text concatenation
    Concat(Box<Expr>, Box<Expr>),
    /// Construction of a refinement-kind instance from a raw value
    Construct {
        /// Construction-site identity
        site: SiteId,
        /// Kind being constructed
        kind: KindId,
        /// Raw argument
        arg: Box<Expr>,
        /// Source position of the call, if known
        #[serde(default)]
        loc: Option<SourceLoc>,
    },
    /// Underlying-value projection of a refinement-kind instance (`x.value`)
    Value(Box<Expr>),
    /// Call into code the engine cannot see; yields the top of `returns`
    Call {
        /// Callee name, for diagnostics only
        callee: String,
        /// Arguments (passed by value; by-reference passing is a `Statement::Escape`)
        args: Vec<Expr>,
        /// Sort of the returned value
        returns: Sort,
    },
}

impl Expr {
    /// Variable read
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    /// Integer arithmetic node
    pub fn arith(op: ArithOp, left: Expr, right: Expr) -> Self {
        Expr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Comparison node
    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Conjunction node
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::Logic {
            op: LogicOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Disjunction node
    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Logic {
            op: LogicOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Boolean negation node
    pub fn not(expr: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    /// Construction node without a source location
    pub fn construct(site: SiteId, kind: KindId, arg: Expr) -> Self {
        Expr::Construct {
            site,
            kind,
            arg: Box::new(arg),
            loc: None,
        }
    }

    /// `.value` projection node
    pub fn value_of(expr: Expr) -> Self {
        Expr::Value(Box::new(expr))
    }

    /// Visit every construction node in evaluation order (inner arguments first)
    pub fn for_each_construct<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        match self {
            Expr::Int(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Var(_) => {}
            Expr::Unary { expr, .. } | Expr::Len(expr) | Expr::Value(expr) => {
                expr.for_each_construct(f)
            }
            Expr::Arith { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logic { left, right, .. }
            | Expr::Concat(left, right) => {
                left.for_each_construct(f);
                right.for_each_construct(f);
            }
            Expr::Construct { arg, .. } => {
                arg.for_each_construct(f);
                f(self);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.for_each_construct(f);
                }
            }
        }
    }

    /// The variable this expression designates as an assignable location, looking
    /// through `.value` projections (`x` and `x.value` track the same value)
    pub fn tracked_var(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            Expr::Value(inner) => inner.tracked_var(),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Lt => write!(f, "<"),
            CompareOp::LtEq => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::GtEq => write!(f, ">="),
            CompareOp::Eq => write!(f, "=="),
            CompareOp::NotEq => write!(f, "!="),
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Add => write!(f, "+"),
            ArithOp::Sub => write!(f, "-"),
            ArithOp::Mul => write!(f, "*"),
            ArithOp::Div => write!(f, "/"),
            ArithOp::Rem => write!(f, "%"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => write!(f, "-{}", expr),
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => write!(f, "!{}", expr),
            Expr::Arith { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Compare { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Logic {
                op: LogicOp::And,
                left,
                right,
            } => write!(f, "({} && {})", left, right),
            Expr::Logic {
                op: LogicOp::Or,
                left,
                right,
            } => write!(f, "({} || {})", left, right),
            Expr::Len(expr) => write!(f, "len({})", expr),
            Expr::Concat(l, r) => write!(f, "({} ++ {})", l, r),
            Expr::Construct { kind, arg, .. } => write!(f, "{}({})", kind, arg),
            Expr::Value(expr) => write!(f, "{}.value", expr),
            Expr::Call { callee, args, .. } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
