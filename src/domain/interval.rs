//! # Interval Domain
//!
//! Values are approximated by `[low, high]` over the mathematical integers
//! extended with `-∞` and `+∞`. Bounds are `i128`, which holds every `i64` and
//! `u64` value exactly; arithmetic that would leave `i128` saturates to the
//! matching infinity.
//!
//! # Lattice Structure
//!
//! - **Order** (`⊑`): `[l₁, h₁] ⊑ [l₂, h₂]` iff `l₂ ≤ l₁ ∧ h₁ ≤ h₂`
//! - **Join** (`⊔`): convex hull
//! - **Meet** (`⊓`): intersection
//! - **Bottom** (`⊥`): the empty interval, stored as `[+∞, -∞]`
//! - **Top** (`⊤`): `[-∞, +∞]`
//!
//! Widening jumps a growing bound to the nearest enclosing threshold, or to
//! infinity when no threshold encloses it. Narrowing only replaces infinite
//! bounds, so a descending sequence stops after one step per bound.

use super::{BoolValue, Lattice};
use crate::ir::{CompareOp, IntType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Interval bound: negative infinity, finite value, or positive infinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bound {
    /// Negative infinity (`-∞`)
    NegInf,
    /// Finite integer value
    Finite(i128),
    /// Positive infinity (`+∞`)
    PosInf,
}

impl Bound {
    /// Extract finite value, if any
    pub fn as_finite(self) -> Option<i128> {
        match self {
            Bound::Finite(n) => Some(n),
            _ => None,
        }
    }

    /// Check if this bound is finite
    pub fn is_finite(self) -> bool {
        matches!(self, Bound::Finite(_))
    }

    fn from_checked(value: Option<i128>, positive_overflow: bool) -> Bound {
        match value {
            Some(n) => Bound::Finite(n),
            None if positive_overflow => Bound::PosInf,
            None => Bound::NegInf,
        }
    }

    /// Addition of bounds. `∞ + (-∞)` never arises from well-formed intervals;
    /// it resolves to `+∞`.
    pub fn add(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::from_checked(a.checked_add(b), a > 0),
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => Bound::PosInf,
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
        }
    }

    /// Negation of bound
    pub fn neg(self) -> Bound {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::Finite(n) => Bound::from_checked(n.checked_neg(), true),
            Bound::PosInf => Bound::NegInf,
        }
    }

    fn signum(self) -> i32 {
        match self {
            Bound::NegInf => -1,
            Bound::PosInf => 1,
            Bound::Finite(n) => n.signum() as i32,
        }
    }

    fn infinity(sign: i32) -> Bound {
        if sign < 0 {
            Bound::NegInf
        } else {
            Bound::PosInf
        }
    }

    /// Product of bounds; `0 · ∞ = 0`
    pub fn mul(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => {
                Bound::from_checked(a.checked_mul(b), (a < 0) == (b < 0))
            }
            _ => {
                let sign = self.signum() * other.signum();
                if sign == 0 {
                    Bound::Finite(0)
                } else {
                    Bound::infinity(sign)
                }
            }
        }
    }

    /// Truncating quotient of bounds; the divisor is never zero
    fn div(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::from_checked(a.checked_div(b), true),
            (Bound::Finite(_), _) => Bound::Finite(0),
            _ => Bound::infinity(self.signum() * other.signum()),
        }
    }

    /// `self + delta` for finite `delta`
    fn offset(self, delta: i128) -> Bound {
        self.add(Bound::Finite(delta))
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Bound::NegInf, Bound::NegInf) => Ordering::Equal,
            (Bound::NegInf, _) => Ordering::Less,
            (_, Bound::NegInf) => Ordering::Greater,
            (Bound::PosInf, Bound::PosInf) => Ordering::Equal,
            (Bound::PosInf, _) => Ordering::Greater,
            (_, Bound::PosInf) => Ordering::Less,
            (Bound::Finite(a), Bound::Finite(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-∞"),
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::PosInf => write!(f, "+∞"),
        }
    }
}

/// Integer interval `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    low: Bound,
    high: Bound,
}

impl Interval {
    /// Create an interval `[low, high]`; empty when `low > high` or when a bound
    /// admits no integer (`low = +∞` or `high = -∞`)
    pub fn new(low: Bound, high: Bound) -> Self {
        if low > high || low == Bound::PosInf || high == Bound::NegInf {
            Self::bottom()
        } else {
            Self { low, high }
        }
    }

    /// Create an interval from finite bounds `[min, max]`
    pub fn from_bounds(min: i128, max: i128) -> Self {
        Self::new(Bound::Finite(min), Bound::Finite(max))
    }

    /// Create a singleton interval `[c, c]`
    pub fn constant(c: i128) -> Self {
        Self::from_bounds(c, c)
    }

    /// `[c, +∞]`
    pub fn at_least(c: i128) -> Self {
        Self::new(Bound::Finite(c), Bound::PosInf)
    }

    /// `[-∞, c]`
    pub fn at_most(c: i128) -> Self {
        Self::new(Bound::NegInf, Bound::Finite(c))
    }

    /// Every value of an integer type
    pub fn range_of(ty: IntType) -> Self {
        Self::from_bounds(ty.min_value(), ty.max_value())
    }

    /// Get the lower bound
    pub fn low(&self) -> Bound {
        self.low
    }

    /// Get the upper bound
    pub fn high(&self) -> Bound {
        self.high
    }

    /// The single value this interval holds, if it is a singleton
    pub fn as_constant(&self) -> Option<i128> {
        match (self.low, self.high) {
            (Bound::Finite(l), Bound::Finite(h)) if l == h => Some(l),
            _ => None,
        }
    }

    /// Check if interval contains a value
    pub fn contains(&self, value: i128) -> bool {
        if self.is_bottom() {
            return false;
        }
        let v = Bound::Finite(value);
        self.low <= v && v <= self.high
    }

    /// Addition of intervals: `[a, b] + [c, d] = [a+c, b+d]`
    pub fn add(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self::new(self.low.add(other.low), self.high.add(other.high))
    }

    /// Subtraction of intervals: `[a, b] - [c, d] = [a-d, b-c]`
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Negation of interval: `-[a, b] = [-b, -a]`
    pub fn neg(&self) -> Self {
        if self.is_bottom() {
            return Self::bottom();
        }
        Self::new(self.high.neg(), self.low.neg())
    }

    /// Multiplication: hull of the four corner products
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self::hull(&[
            self.low.mul(other.low),
            self.low.mul(other.high),
            self.high.mul(other.low),
            self.high.mul(other.high),
        ])
    }

    /// Truncating division. Division by zero does not produce a value, so the
    /// zero divisor is cut out and a divisor of exactly `[0, 0]` yields `⊥`.
    pub fn div(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let negative = other.meet(&Self::at_most(-1));
        let positive = other.meet(&Self::at_least(1));
        self.div_nonzero(&negative).join(&self.div_nonzero(&positive))
    }

    fn div_nonzero(&self, divisor: &Self) -> Self {
        if divisor.is_bottom() {
            return Self::bottom();
        }
        Self::hull(&[
            self.low.div(divisor.low),
            self.low.div(divisor.high),
            self.high.div(divisor.low),
            self.high.div(divisor.high),
        ])
    }

    /// Remainder with the dividend's sign: `|r| < |divisor|` and `|r| <= |dividend|`
    pub fn rem(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        if let (Some(a), Some(b)) = (self.as_constant(), other.as_constant()) {
            return match a.checked_rem(b) {
                Some(r) => Self::constant(r),
                None if b == 0 => Self::bottom(),
                None => Self::constant(0),
            };
        }
        let nonzero = other
            .meet(&Self::at_most(-1))
            .join(&other.meet(&Self::at_least(1)));
        if nonzero.is_bottom() {
            return Self::bottom();
        }
        // largest magnitude the remainder can reach: max |divisor| - 1
        let magnitude = std::cmp::max(nonzero.low.neg(), nonzero.high).offset(-1);
        let bound = Self::new(magnitude.neg(), magnitude);
        let sign_range = if self.low >= Bound::Finite(0) {
            Self::new(Bound::Finite(0), self.high)
        } else if self.high <= Bound::Finite(0) {
            Self::new(self.low, Bound::Finite(0))
        } else {
            *self
        };
        sign_range.meet(&bound)
    }

    fn hull(bounds: &[Bound]) -> Self {
        let low = bounds.iter().copied().min().unwrap_or(Bound::PosInf);
        let high = bounds.iter().copied().max().unwrap_or(Bound::NegInf);
        Self::new(low, high)
    }

    /// Abstract comparison `self op other`
    pub fn compare(&self, op: CompareOp, other: &Self) -> BoolValue {
        if self.is_bottom() || other.is_bottom() {
            return BoolValue::Bottom;
        }
        let always = match op {
            CompareOp::Lt => self.high < other.low,
            CompareOp::LtEq => self.high <= other.low,
            CompareOp::Gt => self.low > other.high,
            CompareOp::GtEq => self.low >= other.high,
            CompareOp::Eq => self.as_constant().is_some() && self == other,
            CompareOp::NotEq => self.meet(other).is_bottom(),
        };
        let never = match op {
            CompareOp::Lt => self.low >= other.high,
            CompareOp::LtEq => self.low > other.high,
            CompareOp::Gt => self.high <= other.low,
            CompareOp::GtEq => self.high < other.low,
            CompareOp::Eq => self.meet(other).is_bottom(),
            CompareOp::NotEq => self.as_constant().is_some() && self == other,
        };
        match (always, never) {
            (true, _) => BoolValue::True,
            (false, true) => BoolValue::False,
            (false, false) => BoolValue::Top,
        }
    }

    /// Restrict `self` to the values `v` for which `v op w` holds for some `w` in `other`
    pub fn refine(&self, op: CompareOp, other: &Self) -> Self {
        if other.is_bottom() {
            return Self::bottom();
        }
        match op {
            CompareOp::Lt => self.meet(&Self::new(Bound::NegInf, other.high.offset(-1))),
            CompareOp::LtEq => self.meet(&Self::new(Bound::NegInf, other.high)),
            CompareOp::Gt => self.meet(&Self::new(other.low.offset(1), Bound::PosInf)),
            CompareOp::GtEq => self.meet(&Self::new(other.low, Bound::PosInf)),
            CompareOp::Eq => self.meet(other),
            CompareOp::NotEq => match other.as_constant() {
                Some(c) if self.low == Bound::Finite(c) => {
                    Self::new(self.low.offset(1), self.high)
                }
                Some(c) if self.high == Bound::Finite(c) => {
                    Self::new(self.low, self.high.offset(-1))
                }
                _ => *self,
            },
        }
    }

    /// Widening that stops growing bounds at the nearest enclosing threshold.
    /// `thresholds` must be sorted ascending.
    pub fn widen_with_thresholds(&self, other: &Self, thresholds: &[i128]) -> Self {
        if self.is_bottom() {
            return *other;
        }
        if other.is_bottom() {
            return *self;
        }
        let low = if other.low < self.low {
            thresholds
                .iter()
                .rev()
                .map(|&t| Bound::Finite(t))
                .find(|&t| t <= other.low)
                .unwrap_or(Bound::NegInf)
        } else {
            self.low
        };
        let high = if other.high > self.high {
            thresholds
                .iter()
                .map(|&t| Bound::Finite(t))
                .find(|&t| t >= other.high)
                .unwrap_or(Bound::PosInf)
        } else {
            self.high
        };
        Self::new(low, high)
    }
}

impl Lattice for Interval {
    fn bottom() -> Self {
        Self {
            low: Bound::PosInf,
            high: Bound::NegInf,
        }
    }

    fn top() -> Self {
        Self {
            low: Bound::NegInf,
            high: Bound::PosInf,
        }
    }

    fn is_bottom(&self) -> bool {
        self.low > self.high
    }

    fn is_top(&self) -> bool {
        self.low == Bound::NegInf && self.high == Bound::PosInf
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other.low <= self.low && self.high <= other.high
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return *other;
        }
        if other.is_bottom() {
            return *self;
        }
        Self::new(self.low.min(other.low), self.high.max(other.high))
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self::new(self.low.max(other.low), self.high.min(other.high))
    }

    fn widen(&self, other: &Self) -> Self {
        self.widen_with_thresholds(other, &[])
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let low = if self.low == Bound::NegInf {
            other.low
        } else {
            self.low
        };
        let high = if self.high == Bound::PosInf {
            other.high
        } else {
            self.high
        };
        Self::new(low, high)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "⊥")
        } else {
            write!(f, "[{}, {}]", self.low, self.high)
        }
    }
}
