//! # Abstract Domains
//!
//! Lattices the engine reasons with, one per supported grammar:
//!
//! - [`Interval`] for integer kinds (and, over lengths, for text kinds)
//! - [`BoolValue`] for boolean kinds
//!
//! [`AbstractValue`] tags an element with its sort so a single
//! [`AbstractState`](crate::analysis::AbstractState) can hold values of every
//! domain. [`DomainRegistry`] maps each supported refinement kind to its domain,
//! allowed region and widening thresholds.

pub mod boolean;
pub mod interval;
pub mod registry;
pub mod value;

pub use boolean::BoolValue;
pub use interval::{Bound, Interval};
pub use registry::{DomainKind, DomainRegistry, RegistryEntry};
pub use value::AbstractValue;

use std::fmt;

/// Complete lattice with widening and narrowing.
///
/// - `⊥ ⊑ x ⊑ ⊤` for every `x`
/// - `a ⊑ a.widen(b)` and `b ⊑ a.widen(b)`; a widened ascending chain stabilizes
/// - `a.meet(b) ⊑ a.narrow(b) ⊑ a`
pub trait Lattice: Clone + PartialEq + fmt::Debug {
    /// Least element (`⊥`): no concrete value
    fn bottom() -> Self;

    /// Greatest element (`⊤`): every concrete value
    fn top() -> Self;

    /// Check if this is the bottom element
    fn is_bottom(&self) -> bool;

    /// Check if this is the top element
    fn is_top(&self) -> bool;

    /// Partial order (`⊑`)
    fn leq(&self, other: &Self) -> bool;

    /// Least upper bound (`⊔`)
    fn join(&self, other: &Self) -> Self;

    /// Greatest lower bound (`⊓`)
    fn meet(&self, other: &Self) -> Self;

    /// Widening (`∇`)
    fn widen(&self, other: &Self) -> Self;

    /// Narrowing (`△`)
    fn narrow(&self, other: &Self) -> Self;
}
