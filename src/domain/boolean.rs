//! Four-point boolean lattice: `⊥ < {true, false} < ⊤`

use super::Lattice;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract boolean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolValue {
    /// No value
    Bottom,
    /// Definitely `true`
    True,
    /// Definitely `false`
    False,
    /// Either
    Top,
}

impl BoolValue {
    /// Abstraction of a concrete boolean
    pub fn from_bool(b: bool) -> Self {
        if b {
            BoolValue::True
        } else {
            BoolValue::False
        }
    }

    /// Whether `b` is in the concretization
    pub fn may_be(self, b: bool) -> bool {
        match self {
            BoolValue::Bottom => false,
            BoolValue::Top => true,
            BoolValue::True => b,
            BoolValue::False => !b,
        }
    }

    /// The concrete value, if exactly one
    pub fn as_bool(self) -> Option<bool> {
        match self {
            BoolValue::True => Some(true),
            BoolValue::False => Some(false),
            _ => None,
        }
    }

    /// Logical negation
    pub fn not(self) -> Self {
        match self {
            BoolValue::True => BoolValue::False,
            BoolValue::False => BoolValue::True,
            other => other,
        }
    }

    /// Logical conjunction
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (BoolValue::Bottom, _) | (_, BoolValue::Bottom) => BoolValue::Bottom,
            (BoolValue::False, _) | (_, BoolValue::False) => BoolValue::False,
            (BoolValue::True, BoolValue::True) => BoolValue::True,
            _ => BoolValue::Top,
        }
    }

    /// Logical disjunction
    pub fn or(self, other: Self) -> Self {
        self.not().and(other.not()).not()
    }
}

impl Lattice for BoolValue {
    fn bottom() -> Self {
        BoolValue::Bottom
    }

    fn top() -> Self {
        BoolValue::Top
    }

    fn is_bottom(&self) -> bool {
        *self == BoolValue::Bottom
    }

    fn is_top(&self) -> bool {
        *self == BoolValue::Top
    }

    fn leq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (BoolValue::Bottom, _) | (_, BoolValue::Top)
        ) || self == other
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (BoolValue::Bottom, x) | (x, BoolValue::Bottom) => *x,
            (a, b) if a == b => *a,
            _ => BoolValue::Top,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (BoolValue::Top, x) | (x, BoolValue::Top) => *x,
            (a, b) if a == b => *a,
            _ => BoolValue::Bottom,
        }
    }

    // finite height: join is a widening
    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }

    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

impl fmt::Display for BoolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolValue::Bottom => write!(f, "⊥"),
            BoolValue::True => write!(f, "true"),
            BoolValue::False => write!(f, "false"),
            BoolValue::Top => write!(f, "⊤"),
        }
    }
}
