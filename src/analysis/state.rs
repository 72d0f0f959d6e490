//! Abstract states: one abstract value per variable at one program point

use crate::domain::{AbstractValue, Lattice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Map from variable to abstract value, plus reachability.
///
/// An unreachable state is `⊥` regardless of its map (which is kept empty).
/// A variable absent from a reachable state reads as the top of its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbstractState {
    values: BTreeMap<String, AbstractValue>,
    reachable: bool,
}

impl AbstractState {
    /// The `⊥` state: no execution reaches this point
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Reachable state with the given variable values
    pub fn from_values(values: impl IntoIterator<Item = (String, AbstractValue)>) -> Self {
        let mut state = Self {
            values: BTreeMap::new(),
            reachable: true,
        };
        for (name, value) in values {
            state.set(&name, value);
        }
        state
    }

    /// Check if some execution may reach this point
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Value of a variable, if tracked
    pub fn get(&self, name: &str) -> Option<&AbstractValue> {
        self.values.get(name)
    }

    /// Variable values in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AbstractValue)> {
        self.values.iter()
    }

    /// Overwrite a variable. Writing `⊥` makes the whole state unreachable.
    pub fn set(&mut self, name: &str, value: AbstractValue) {
        if !self.reachable {
            return;
        }
        if value.is_bottom() {
            self.mark_unreachable();
        } else {
            self.values.insert(name.to_string(), value);
        }
    }

    /// Drop every value and become `⊥`
    pub fn mark_unreachable(&mut self) {
        self.values.clear();
        self.reachable = false;
    }

    /// Pointwise join at a merge point
    pub fn join(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a.join(b))
    }

    /// Pointwise widening with interval thresholds
    pub fn widen(&self, other: &Self, thresholds: &[i128]) -> Self {
        self.combine(other, |a, b| a.widen_with_thresholds(b, thresholds))
    }

    /// Pointwise narrowing
    pub fn narrow(&self, other: &Self) -> Self {
        if !self.reachable || !other.reachable {
            return Self::unreachable();
        }
        let mut result = self.clone();
        for (name, ours) in &self.values {
            let narrowed = match other.values.get(name) {
                Some(theirs) => ours.narrow(theirs),
                None => ours.clone(),
            };
            result.set(name, narrowed);
        }
        for (name, theirs) in &other.values {
            if !self.values.contains_key(name) {
                result.set(name, theirs.clone());
            }
        }
        result
    }

    /// Join-like combination where `⊥` is the identity and a variable
    /// tracked on one side only becomes `⊤`
    fn combine(&self, other: &Self, op: impl Fn(&AbstractValue, &AbstractValue) -> AbstractValue) -> Self {
        if !self.reachable {
            return other.clone();
        }
        if !other.reachable {
            return self.clone();
        }
        let values = self
            .values
            .iter()
            .filter_map(|(name, ours)| {
                other
                    .values
                    .get(name)
                    .map(|theirs| (name.clone(), op(ours, theirs)))
            })
            .collect();
        Self {
            values,
            reachable: true,
        }
    }

    /// Variables whose value differs between `self` and `other`
    pub fn changed_vars(&self, other: &Self) -> Vec<String> {
        let mut names: Vec<String> = self
            .values
            .iter()
            .filter(|(name, ours)| other.values.get(name.as_str()) != Some(ours))
            .map(|(name, _)| name.clone())
            .collect();
        for name in other.values.keys() {
            if !self.values.contains_key(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

impl fmt::Display for AbstractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.reachable {
            return write!(f, "⊥");
        }
        write!(f, "{{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}
