//! Sort-tagged abstract values
//!
//! Distinct sorts have disjoint concretizations: the meet of an integer and a
//! boolean element is `⊥`, their join is `⊤`.

use super::{BoolValue, Interval, Lattice};
use crate::ir::{CompareOp, Sort};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract value of any tracked sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sort", content = "value", rename_all = "snake_case")]
pub enum AbstractValue {
    /// No value (unreachable)
    Bottom,
    /// Integer interval; never empty
    Int(Interval),
    /// Boolean; never `BoolValue::Bottom`
    Bool(BoolValue),
    /// Text, abstracted by its length; within `[0, +∞]` and never empty
    Text(Interval),
    /// Any value of any sort
    Top,
}

impl AbstractValue {
    /// Integer element, `Bottom` when the interval is empty
    pub fn int(interval: Interval) -> Self {
        if interval.is_bottom() {
            AbstractValue::Bottom
        } else {
            AbstractValue::Int(interval)
        }
    }

    /// Boolean element, `Bottom` for `BoolValue::Bottom`
    pub fn boolean(value: BoolValue) -> Self {
        if value.is_bottom() {
            AbstractValue::Bottom
        } else {
            AbstractValue::Bool(value)
        }
    }

    /// Text element with the given length interval (clamped to `[0, +∞]`)
    pub fn text(length: Interval) -> Self {
        let length = length.meet(&Interval::at_least(0));
        if length.is_bottom() {
            AbstractValue::Bottom
        } else {
            AbstractValue::Text(length)
        }
    }

    /// Integer constant
    pub fn int_const(value: i128) -> Self {
        AbstractValue::Int(Interval::constant(value))
    }

    /// Boolean constant
    pub fn bool_const(value: bool) -> Self {
        AbstractValue::Bool(BoolValue::from_bool(value))
    }

    /// Top element restricted to one sort
    pub fn top_of(sort: Sort) -> Self {
        match sort {
            Sort::Int => AbstractValue::Int(Interval::top()),
            Sort::Bool => AbstractValue::Bool(BoolValue::Top),
            Sort::Text => AbstractValue::Text(Interval::at_least(0)),
            Sort::Opaque => AbstractValue::Top,
        }
    }

    /// Sort of this value; `None` for the sort-less `Top` and `Bottom`
    pub fn sort(&self) -> Option<Sort> {
        match self {
            AbstractValue::Int(_) => Some(Sort::Int),
            AbstractValue::Bool(_) => Some(Sort::Bool),
            AbstractValue::Text(_) => Some(Sort::Text),
            AbstractValue::Top | AbstractValue::Bottom => None,
        }
    }

    /// Integer view: `Top` reads as the full interval, other sorts as empty
    pub fn as_interval(&self) -> Interval {
        match self {
            AbstractValue::Int(i) => *i,
            AbstractValue::Top => Interval::top(),
            _ => Interval::bottom(),
        }
    }

    /// Boolean view: `Top` reads as `BoolValue::Top`, other sorts as `Bottom`
    pub fn as_bool(&self) -> BoolValue {
        match self {
            AbstractValue::Bool(b) => *b,
            AbstractValue::Top => BoolValue::Top,
            _ => BoolValue::Bottom,
        }
    }

    /// Length view of a text value: `Top` reads as `[0, +∞]`
    pub fn as_length(&self) -> Interval {
        match self {
            AbstractValue::Text(len) => *len,
            AbstractValue::Top => Interval::at_least(0),
            _ => Interval::bottom(),
        }
    }

    /// Abstract comparison for values of the same scalar sort
    pub fn compare(&self, op: CompareOp, other: &Self) -> BoolValue {
        if self.is_bottom() || other.is_bottom() {
            return BoolValue::Bottom;
        }
        match (self, other) {
            (AbstractValue::Bool(a), AbstractValue::Bool(b)) => match (op, a.as_bool(), b.as_bool()) {
                (CompareOp::Eq, Some(x), Some(y)) => BoolValue::from_bool(x == y),
                (CompareOp::NotEq, Some(x), Some(y)) => BoolValue::from_bool(x != y),
                _ => BoolValue::Top,
            },
            (AbstractValue::Int(_), _) | (_, AbstractValue::Int(_)) => {
                self.as_interval().compare(op, &other.as_interval())
            }
            _ => BoolValue::Top,
        }
    }

    /// Pointwise widening with interval thresholds
    pub fn widen_with_thresholds(&self, other: &Self, thresholds: &[i128]) -> Self {
        match (self, other) {
            (AbstractValue::Int(a), AbstractValue::Int(b)) => {
                AbstractValue::int(a.widen_with_thresholds(b, thresholds))
            }
            (AbstractValue::Text(a), AbstractValue::Text(b)) => {
                AbstractValue::text(a.widen_with_thresholds(b, thresholds))
            }
            _ => self.widen(other),
        }
    }
}

impl Lattice for AbstractValue {
    fn bottom() -> Self {
        AbstractValue::Bottom
    }

    fn top() -> Self {
        AbstractValue::Top
    }

    fn is_bottom(&self) -> bool {
        match self {
            AbstractValue::Bottom => true,
            AbstractValue::Int(i) | AbstractValue::Text(i) => i.is_bottom(),
            AbstractValue::Bool(b) => b.is_bottom(),
            AbstractValue::Top => false,
        }
    }

    fn is_top(&self) -> bool {
        matches!(self, AbstractValue::Top)
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        match (self, other) {
            (_, AbstractValue::Top) => true,
            (AbstractValue::Int(a), AbstractValue::Int(b)) => a.leq(b),
            (AbstractValue::Bool(a), AbstractValue::Bool(b)) => a.leq(b),
            (AbstractValue::Text(a), AbstractValue::Text(b)) => a.leq(b),
            _ => false,
        }
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        match (self, other) {
            (AbstractValue::Int(a), AbstractValue::Int(b)) => AbstractValue::int(a.join(b)),
            (AbstractValue::Bool(a), AbstractValue::Bool(b)) => AbstractValue::boolean(a.join(b)),
            (AbstractValue::Text(a), AbstractValue::Text(b)) => AbstractValue::text(a.join(b)),
            _ => AbstractValue::Top,
        }
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (AbstractValue::Top, x) | (x, AbstractValue::Top) => x.clone(),
            (AbstractValue::Int(a), AbstractValue::Int(b)) => AbstractValue::int(a.meet(b)),
            (AbstractValue::Bool(a), AbstractValue::Bool(b)) => AbstractValue::boolean(a.meet(b)),
            (AbstractValue::Text(a), AbstractValue::Text(b)) => AbstractValue::text(a.meet(b)),
            _ => AbstractValue::Bottom,
        }
    }

    fn widen(&self, other: &Self) -> Self {
        match (self, other) {
            (AbstractValue::Int(a), AbstractValue::Int(b)) => AbstractValue::int(a.widen(b)),
            (AbstractValue::Text(a), AbstractValue::Text(b)) => AbstractValue::text(a.widen(b)),
            _ => self.join(other),
        }
    }

    fn narrow(&self, other: &Self) -> Self {
        match (self, other) {
            (AbstractValue::Top, x) => x.clone(),
            (AbstractValue::Int(a), AbstractValue::Int(b)) => AbstractValue::int(a.narrow(b)),
            (AbstractValue::Bool(a), AbstractValue::Bool(b)) => AbstractValue::boolean(a.narrow(b)),
            (AbstractValue::Text(a), AbstractValue::Text(b)) => AbstractValue::text(a.narrow(b)),
            (_, x) if x.is_bottom() => AbstractValue::Bottom,
            _ => self.clone(),
        }
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractValue::Bottom => write!(f, "⊥"),
            AbstractValue::Int(i) => write!(f, "{}", i),
            AbstractValue::Bool(b) => write!(f, "{}", b),
            AbstractValue::Text(len) => write!(f, "text(len {})", len),
            AbstractValue::Top => write!(f, "⊤"),
        }
    }
}
