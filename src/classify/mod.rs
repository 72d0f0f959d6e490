//! # Predicate Classifier
//!
//! Decides, per refinement-kind declaration, whether its predicate falls inside
//! the grammar supported for its underlying type:
//!
//! | Underlying | Grammar | Region |
//! |---|---|---|
//! | integer | [`Grammar::IntervalConjunction`] | interval, met with the type range |
//! | boolean | [`Grammar::BooleanConstant`] | [`BoolValue`](crate::domain::BoolValue) |
//! | text | [`Grammar::LengthConjunction`] | interval over the length |
//!
//! Rejection is never fatal: the kind is marked unsupported, its construction
//! sites stay `Unknown`, and its runtime checks stay. A mutable underlying type
//! is a declaration error instead.

mod grammar;
pub mod kind;

pub use kind::{Grammar, KindStatus, RefinementKind, RejectReason};

use crate::domain::{AbstractValue, BoolValue, Interval, Lattice};
use crate::error::{Error, Result};
use crate::ir::{KindId, PredicateExpr, RefinementDecl, UnderlyingType};
use std::collections::BTreeMap;

/// Classifies refinement-kind declarations
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl Classifier {
    /// Create a classifier
    pub fn new() -> Self {
        Classifier
    }

    /// Classify one declaration
    pub fn classify(&self, decl: &RefinementDecl) -> RefinementKind {
        let status = Self::status(decl);
        match &status {
            KindStatus::Supported { grammar, region } => {
                tracing::debug!(kind = %decl.name, ?grammar, %region, "refinement kind supported");
            }
            KindStatus::Unsupported { reason } => {
                tracing::warn!(kind = %decl.name, %reason, "refinement kind not analyzable");
            }
            KindStatus::Invalid { type_name } => {
                tracing::warn!(kind = %decl.name, %type_name, "refinement kind wraps a mutable type");
            }
        }

        RefinementKind {
            id: decl.id,
            name: decl.name.clone(),
            underlying: decl.underlying.clone(),
            predicates: decl.predicates.clone(),
            status,
            location: decl.location.clone(),
        }
    }

    /// Classify every declaration into a table
    pub fn classify_all(&self, decls: &[RefinementDecl]) -> Result<KindTable> {
        KindTable::from_kinds(decls.iter().map(|d| self.classify(d)))
    }

    fn status(decl: &RefinementDecl) -> KindStatus {
        if decl.underlying.is_mutable() {
            return KindStatus::Invalid {
                type_name: decl.underlying.to_string(),
            };
        }

        if let Some(name) = decl.predicates.iter().find_map(|p| p.foreign_reference()) {
            return KindStatus::Unsupported {
                reason: RejectReason::ForeignReference(name.to_string()),
            };
        }

        match Self::region(&decl.underlying, &decl.predicates) {
            Ok((grammar, region)) => KindStatus::Supported { grammar, region },
            Err(reason) => KindStatus::Unsupported { reason },
        }
    }

    fn region(
        underlying: &UnderlyingType,
        predicates: &[PredicateExpr],
    ) -> std::result::Result<(Grammar, AbstractValue), RejectReason> {
        match underlying {
            UnderlyingType::Int(ty) => {
                let mut region = Interval::range_of(*ty);
                for pred in predicates {
                    region = region.meet(&grammar::int_region(pred, false)?);
                }
                Ok((Grammar::IntervalConjunction, AbstractValue::int(region)))
            }
            UnderlyingType::Bool => {
                let mut region = BoolValue::Top;
                for pred in predicates {
                    region = region.meet(&grammar::bool_region(pred, false)?);
                }
                Ok((Grammar::BooleanConstant, AbstractValue::boolean(region)))
            }
            UnderlyingType::Text => {
                let mut region = Interval::at_least(0);
                for pred in predicates {
                    region = region.meet(&grammar::length_region(pred, false)?);
                }
                Ok((Grammar::LengthConjunction, AbstractValue::text(region)))
            }
            UnderlyingType::Float | UnderlyingType::Opaque { .. } => {
                Err(RejectReason::UnsupportedUnderlying(underlying.to_string()))
            }
        }
    }
}

/// Classified kinds keyed by identity. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct KindTable {
    kinds: BTreeMap<KindId, RefinementKind>,
}

impl KindTable {
    /// Build a table, rejecting duplicate identities
    pub fn from_kinds(kinds: impl IntoIterator<Item = RefinementKind>) -> Result<Self> {
        let mut table: BTreeMap<KindId, RefinementKind> = BTreeMap::new();
        for kind in kinds {
            if let Some(previous) = table.get(&kind.id) {
                return Err(Error::DuplicateKind {
                    id: kind.id.0,
                    name: format!("{} / {}", previous.name, kind.name),
                });
            }
            table.insert(kind.id, kind);
        }
        Ok(Self { kinds: table })
    }

    /// Look up a kind
    pub fn get(&self, id: KindId) -> Option<&RefinementKind> {
        self.kinds.get(&id)
    }

    /// All kinds in identity order
    pub fn iter(&self) -> impl Iterator<Item = &RefinementKind> {
        self.kinds.values()
    }

    /// Kinds whose sites are analyzed
    pub fn supported(&self) -> impl Iterator<Item = &RefinementKind> {
        self.iter().filter(|k| k.is_supported())
    }

    /// Number of kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
