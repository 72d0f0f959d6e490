//! Refinement-kind declarations as handed over by the front end
//!
//! A declaration is an opaque record: the kind's identity, its underlying type
//! and the predicate tree(s) from its `require` clauses. Nothing about the host
//! language's class syntax survives into this module.

use super::{ArithOp, CompareOp, KindId, SourceLoc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-width integer types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntType {
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
}

impl IntType {
    /// Smallest representable value
    pub fn min_value(self) -> i128 {
        match self {
            IntType::I8 => i8::MIN as i128,
            IntType::I16 => i16::MIN as i128,
            IntType::I32 => i32::MIN as i128,
            IntType::I64 => i64::MIN as i128,
            IntType::U8 | IntType::U16 | IntType::U32 | IntType::U64 => 0,
        }
    }

    /// Largest representable value
    pub fn max_value(self) -> i128 {
        match self {
            IntType::I8 => i8::MAX as i128,
            IntType::I16 => i16::MAX as i128,
            IntType::I32 => i32::MAX as i128,
            IntType::I64 => i64::MAX as i128,
            IntType::U8 => u8::MAX as i128,
            IntType::U16 => u16::MAX as i128,
            IntType::U32 => u32::MAX as i128,
            IntType::U64 => u64::MAX as i128,
        }
    }
}

/// The type wrapped by a refinement kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnderlyingType {
    /// Fixed-width integer
    Int(IntType),
    /// Boolean
    Bool,
    /// Immutable string
    Text,
    /// Floating point (no supported grammar)
    Float,
    /// Any other host type
    Opaque {
        /// Host type name, for diagnostics
        name: String,
        /// Whether every value reachable from this type is immutable
        deeply_immutable: bool,
    },
}

impl UnderlyingType {
    /// Whether values of this type can change after construction
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            UnderlyingType::Opaque {
                deeply_immutable: false,
                ..
            }
        )
    }
}

/// Predicate tree from a declaration's `require` clause
///
/// `Value` is the single underlying-value parameter; every other name reference
/// (`Field`, `Ident`) is foreign to the predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateExpr {
    /// The underlying value
    Value,
    /// Another property of the declaring class
    Field(String),
    /// Any other named entity (top-level constant, function parameter, ...)
    Ident(String),
    /// Integer literal
    Int(i128),
    /// Boolean literal
    Bool(bool),
    /// String literal
    Str(String),
    /// Integer negation
    Neg(Box<PredicateExpr>),
    /// Logical negation
    Not(Box<PredicateExpr>),
    /// Integer arithmetic
    Arith {
        /// Operator
        op: ArithOp,
        /// Left operand
        left: Box<PredicateExpr>,
        /// Right operand
        right: Box<PredicateExpr>,
    },
    /// Comparison
    Compare {
        /// Operator
        op: CompareOp,
        /// Left operand
        left: Box<PredicateExpr>,
        /// Right operand
        right: Box<PredicateExpr>,
    },
    /// Logical AND of predicates
    And(Box<PredicateExpr>, Box<PredicateExpr>),
    /// Logical OR of predicates
    Or(Box<PredicateExpr>, Box<PredicateExpr>),
    /// Length of a text operand
    Len(Box<PredicateExpr>),
    /// Method or function call, e.g. `isNotEmpty(value)`
    Call {
        /// Callee name
        name: String,
        /// Arguments, receiver first
        args: Vec<PredicateExpr>,
    },
}

impl PredicateExpr {
    /// Comparison node
    pub fn compare(op: CompareOp, left: PredicateExpr, right: PredicateExpr) -> Self {
        PredicateExpr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `value op constant`
    pub fn value_cmp(op: CompareOp, constant: i128) -> Self {
        Self::compare(op, PredicateExpr::Value, PredicateExpr::Int(constant))
    }

    /// Conjunction node
    pub fn and(left: PredicateExpr, right: PredicateExpr) -> Self {
        PredicateExpr::And(Box::new(left), Box::new(right))
    }

    /// Disjunction node
    pub fn or(left: PredicateExpr, right: PredicateExpr) -> Self {
        PredicateExpr::Or(Box::new(left), Box::new(right))
    }

    /// First name reference other than the underlying value, if any
    pub fn foreign_reference(&self) -> Option<&str> {
        match self {
            PredicateExpr::Field(name) | PredicateExpr::Ident(name) => Some(name),
            PredicateExpr::Value
            | PredicateExpr::Int(_)
            | PredicateExpr::Bool(_)
            | PredicateExpr::Str(_) => None,
            PredicateExpr::Neg(e) | PredicateExpr::Not(e) | PredicateExpr::Len(e) => {
                e.foreign_reference()
            }
            PredicateExpr::Arith { left, right, .. }
            | PredicateExpr::Compare { left, right, .. }
            | PredicateExpr::And(left, right)
            | PredicateExpr::Or(left, right) => left
                .foreign_reference()
                .or_else(|| right.foreign_reference()),
            PredicateExpr::Call { args, .. } => args.iter().find_map(|a| a.foreign_reference()),
        }
    }
}

/// One refinement-kind declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementDecl {
    /// Kind identity assigned by the front end
    pub id: KindId,
    /// Class name, for diagnostics
    pub name: String,
    /// Wrapped type
    pub underlying: UnderlyingType,
    /// `require` clauses; several clauses form a conjunction
    pub predicates: Vec<PredicateExpr>,
    /// Declaration position, if known
    #[serde(default)]
    pub location: Option<SourceLoc>,
}

impl RefinementDecl {
    /// Declaration with a single predicate and no location
    pub fn new(id: KindId, name: &str, underlying: UnderlyingType, predicate: PredicateExpr) -> Self {
        Self {
            id,
            name: name.to_string(),
            underlying,
            predicates: vec![predicate],
            location: None,
        }
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntType::I8 => "i8",
            IntType::I16 => "i16",
            IntType::I32 => "i32",
            IntType::I64 => "i64",
            IntType::U8 => "u8",
            IntType::U16 => "u16",
            IntType::U32 => "u32",
            IntType::U64 => "u64",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for UnderlyingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnderlyingType::Int(t) => write!(f, "{}", t),
            UnderlyingType::Bool => write!(f, "bool"),
            UnderlyingType::Text => write!(f, "string"),
            UnderlyingType::Float => write!(f, "float"),
            UnderlyingType::Opaque { name, .. } => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for PredicateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateExpr::Value => write!(f, "value"),
            PredicateExpr::Field(name) => write!(f, "this.{}", name),
            PredicateExpr::Ident(name) => write!(f, "{}", name),
            PredicateExpr::Int(n) => write!(f, "{}", n),
            PredicateExpr::Bool(b) => write!(f, "{}", b),
            PredicateExpr::Str(s) => write!(f, "{:?}", s),
            PredicateExpr::Neg(e) => write!(f, "-{}", e),
            PredicateExpr::Not(e) => write!(f, "!{}", e),
            PredicateExpr::Arith { op, left, right } => write!(f, "({} {} {})", left, op, right),
            PredicateExpr::Compare { op, left, right } => write!(f, "{} {} {}", left, op, right),
            PredicateExpr::And(p, q) => write!(f, "({} && {})", p, q),
            PredicateExpr::Or(p, q) => write!(f, "({} || {})", p, q),
            PredicateExpr::Len(e) => write!(f, "len({})", e),
            PredicateExpr::Call { name, args } => {
                write!(f, "{}(", name)?;
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
