//! Classified refinement kinds

use crate::domain::{AbstractValue, Interval, Lattice};
use crate::ir::{KindId, PredicateExpr, Sort, SourceLoc, UnderlyingType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate sub-grammar a kind was recognized in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grammar {
    /// Conjunction of integer bounds on the value
    IntervalConjunction,
    /// Boolean constant constraint on the value
    BooleanConstant,
    /// Conjunction of bounds on the length of a text value
    LengthConjunction,
}

/// Why a predicate fell outside every supported grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The predicate reads something other than the underlying value
    ForeignReference(String),
    /// `||` (or a negated `&&`) splits the region in two
    Disjunction,
    /// `!=` (or a negated `==`) carves a hole out of the region
    NonConvex(String),
    /// An operand that must be constant depends on the value
    NonConstantOperand(String),
    /// Operation with no counterpart in the kind's grammar
    UnsupportedOperation(String),
    /// No grammar exists for the underlying type
    UnsupportedUnderlying(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ForeignReference(name) => {
                write!(f, "predicate references `{}`, not only the underlying value", name)
            }
            RejectReason::Disjunction => write!(f, "disjunctions are not supported"),
            RejectReason::NonConvex(what) => write!(f, "non-convex comparison `{}`", what),
            RejectReason::NonConstantOperand(what) => {
                write!(f, "operand of `{}` must be a constant", what)
            }
            RejectReason::UnsupportedOperation(what) => {
                write!(f, "unsupported operation `{}`", what)
            }
            RejectReason::UnsupportedUnderlying(ty) => {
                write!(f, "no predicate grammar for underlying type `{}`", ty)
            }
        }
    }
}

/// Outcome of classifying one declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KindStatus {
    /// Recognized; construction sites are analyzed
    Supported {
        /// Grammar the predicate was recognized in
        grammar: Grammar,
        /// Values satisfying the predicate (`⊥` when unsatisfiable)
        region: AbstractValue,
    },
    /// Outside every grammar; runtime checks stay, sites are `Unknown`
    Unsupported {
        /// Rejection reason
        reason: RejectReason,
    },
    /// Declaration error: the underlying type is mutable
    Invalid {
        /// Offending type name
        type_name: String,
    },
}

/// A classified refinement kind. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementKind {
    /// Kind identity
    pub id: KindId,
    /// Class name
    pub name: String,
    /// Wrapped type
    pub underlying: UnderlyingType,
    /// `require` clauses, conjoined
    pub predicates: Vec<PredicateExpr>,
    /// Classification result
    pub status: KindStatus,
    /// Declaration position
    pub location: Option<SourceLoc>,
}

impl RefinementKind {
    /// Check if construction sites of this kind are analyzed
    pub fn is_supported(&self) -> bool {
        matches!(self.status, KindStatus::Supported { .. })
    }

    /// Allowed region, for supported kinds
    pub fn region(&self) -> Option<&AbstractValue> {
        match &self.status {
            KindStatus::Supported { region, .. } => Some(region),
            _ => None,
        }
    }

    /// Recognized grammar, for supported kinds
    pub fn grammar(&self) -> Option<Grammar> {
        match &self.status {
            KindStatus::Supported { grammar, .. } => Some(*grammar),
            _ => None,
        }
    }

    /// Supported, but no value satisfies the predicate
    pub fn is_unsatisfiable(&self) -> bool {
        self.region().map_or(false, |r| r.is_bottom())
    }

    /// Sort of the underlying value
    pub fn sort(&self) -> Sort {
        match self.underlying {
            UnderlyingType::Int(_) => Sort::Int,
            UnderlyingType::Bool => Sort::Bool,
            UnderlyingType::Text => Sort::Text,
            UnderlyingType::Float | UnderlyingType::Opaque { .. } => Sort::Opaque,
        }
    }

    /// Every value the underlying type can hold
    pub fn type_range(&self) -> AbstractValue {
        match self.underlying {
            UnderlyingType::Int(ty) => AbstractValue::Int(Interval::range_of(ty)),
            _ => AbstractValue::top_of(self.sort()),
        }
    }

    /// What a value of this kind is known to satisfy after construction:
    /// the region for supported kinds, the type range otherwise
    pub fn invariant(&self) -> AbstractValue {
        match self.region() {
            Some(region) => region.clone(),
            None => self.type_range(),
        }
    }
}

impl fmt::Display for RefinementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.underlying)
    }
}
