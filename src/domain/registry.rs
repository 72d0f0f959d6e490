//! # Abstract Domain Registry
//!
//! A closed set of domains ([`DomainKind`]) and, per refinement kind, the entry
//! the analysis and the verifier read: the value sort, the type range, and for
//! analyzable kinds the domain and allowed region.
//!
//! The registry is built once from the classified kind table and is read-only
//! afterwards, so bodies can be analyzed in parallel against it. Building it
//! runs [`DomainRegistry::self_check`], which rejects a domain whose widening
//! does not over-approximate its operands or does not stabilize.

use super::{AbstractValue, BoolValue, Bound, Interval, Lattice};
use crate::classify::{Grammar, KindTable};
use crate::engine::AnalysisOptions;
use crate::error::{Error, Result};
use crate::ir::{KindId, Sort};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Registered abstract domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DomainKind {
    /// Integer intervals
    Interval,
    /// Four-point booleans
    Boolean,
    /// Intervals over text length
    Length,
}

impl DomainKind {
    /// Every registered domain
    pub const ALL: [DomainKind; 3] = [DomainKind::Interval, DomainKind::Boolean, DomainKind::Length];

    /// Domain reasoning about a grammar
    pub fn for_grammar(grammar: Grammar) -> Self {
        match grammar {
            Grammar::IntervalConjunction => DomainKind::Interval,
            Grammar::BooleanConstant => DomainKind::Boolean,
            Grammar::LengthConjunction => DomainKind::Length,
        }
    }

    /// Upper bound on strict increases along a widened ascending chain
    fn widening_height(self, thresholds: &[i128]) -> usize {
        match self {
            DomainKind::Boolean => 2,
            // leaving ⊥, then each bound visits every threshold at most once before infinity
            DomainKind::Interval | DomainKind::Length => 2 * (thresholds.len() + 1) + 1,
        }
    }

    /// Ascending probe chain used by the self-check
    fn probe_chain(self, length: usize) -> Vec<AbstractValue> {
        match self {
            DomainKind::Boolean => vec![
                AbstractValue::Bottom,
                AbstractValue::Bool(BoolValue::True),
                AbstractValue::Bool(BoolValue::False),
                AbstractValue::Bool(BoolValue::Top),
            ],
            DomainKind::Interval => (0..length)
                .map(|k| {
                    let k = 1i128 << k.min(120);
                    AbstractValue::int(Interval::from_bounds(-k, k))
                })
                .collect(),
            DomainKind::Length => (0..length)
                .map(|k| AbstractValue::text(Interval::from_bounds(0, 1i128 << k.min(120))))
                .collect(),
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainKind::Interval => write!(f, "interval"),
            DomainKind::Boolean => write!(f, "boolean"),
            DomainKind::Length => write!(f, "length"),
        }
    }
}

/// What the engine knows about one refinement kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Kind identity
    pub kind: KindId,
    /// Kind name
    pub name: String,
    /// Sort of the underlying value
    pub sort: Sort,
    /// Every value of the underlying type
    pub type_range: AbstractValue,
    /// Domain, for analyzable kinds
    pub domain: Option<DomainKind>,
    /// Allowed region, for analyzable kinds
    pub region: Option<AbstractValue>,
}

impl RegistryEntry {
    /// Check if construction sites of this kind are analyzed
    pub fn is_analyzed(&self) -> bool {
        self.domain.is_some()
    }

    /// What a constructed value of this kind is known to satisfy
    pub fn invariant(&self) -> AbstractValue {
        self.region.clone().unwrap_or_else(|| self.type_range.clone())
    }
}

/// Per-kind domain registry
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    entries: BTreeMap<KindId, RegistryEntry>,
    thresholds: Vec<i128>,
}

impl DomainRegistry {
    /// Build the registry from classified kinds and self-check every domain in use
    pub fn build(kinds: &KindTable, options: &AnalysisOptions) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut thresholds = BTreeSet::new();

        for kind in kinds.iter() {
            let domain = kind.grammar().map(DomainKind::for_grammar);
            let region = kind.region().cloned();

            if options.widening_thresholds {
                for value in region.iter().chain(std::iter::once(&kind.type_range())) {
                    let interval = match value {
                        AbstractValue::Int(i) | AbstractValue::Text(i) => i,
                        _ => continue,
                    };
                    for bound in [interval.low(), interval.high()] {
                        if let Bound::Finite(n) = bound {
                            thresholds.insert(n);
                        }
                    }
                }
            }

            entries.insert(
                kind.id,
                RegistryEntry {
                    kind: kind.id,
                    name: kind.name.clone(),
                    sort: kind.sort(),
                    type_range: kind.type_range(),
                    domain,
                    region,
                },
            );
        }

        if options.widening_thresholds {
            thresholds.insert(0);
        }

        let registry = Self {
            entries,
            thresholds: thresholds.into_iter().collect(),
        };
        registry.self_check(options.max_widening_iterations)?;

        tracing::debug!(
            kinds = registry.entries.len(),
            analyzed = registry.entries.values().filter(|e| e.is_analyzed()).count(),
            thresholds = registry.thresholds.len(),
            "domain registry built"
        );
        Ok(registry)
    }

    /// Entry for a kind
    pub fn entry(&self, kind: KindId) -> Option<&RegistryEntry> {
        self.entries.get(&kind)
    }

    /// All entries in identity order
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    /// Sorted widening thresholds (empty when threshold widening is off)
    pub fn thresholds(&self) -> &[i128] {
        &self.thresholds
    }

    /// Domains referenced by at least one analyzed kind
    pub fn domains_in_use(&self) -> BTreeSet<DomainKind> {
        self.entries.values().filter_map(|e| e.domain).collect()
    }

    /// Widen `old` by `new` with this registry's thresholds
    pub fn widen(&self, old: &AbstractValue, new: &AbstractValue) -> AbstractValue {
        old.widen_with_thresholds(new, &self.thresholds)
    }

    /// Check the widening contract of every registered domain: each widened
    /// step covers both operands, and an ascending chain stabilizes within
    /// the domain's height bound (never more than `max_iterations` probes).
    pub fn self_check(&self, max_iterations: usize) -> Result<()> {
        for domain in DomainKind::ALL {
            self.check_domain(domain, max_iterations)?;
        }
        Ok(())
    }

    fn check_domain(&self, domain: DomainKind, max_iterations: usize) -> Result<()> {
        let failure = |reason: String| Error::RegistrySelfCheck {
            domain: domain.to_string(),
            reason,
        };

        let bottom = AbstractValue::bottom();
        let top = AbstractValue::top();
        if !bottom.leq(&top) {
            return Err(failure("bottom is not below top".to_string()));
        }

        let height = domain.widening_height(&self.thresholds);
        let chain = domain.probe_chain(max_iterations.max(1));
        let mut acc = AbstractValue::bottom();
        let mut increases = 0usize;

        for probe in &chain {
            let next = self.widen(&acc, probe);
            if !acc.leq(&next) || !probe.leq(&next) {
                return Err(failure(format!(
                    "widen({}, {}) = {} does not cover both operands",
                    acc, probe, next
                )));
            }
            if next != acc {
                increases += 1;
                if increases > height {
                    return Err(failure(format!(
                        "widened chain still increasing after {} steps",
                        increases
                    )));
                }
            }
            acc = next;
        }

        if self.widen(&acc, &acc) != acc {
            return Err(failure(format!("widening is not stable at {}", acc)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::ir::{CompareOp, IntType, PredicateExpr, RefinementDecl, UnderlyingType};

    fn table() -> KindTable {
        let decls = vec![
            RefinementDecl::new(
                KindId(0),
                "Pos",
                UnderlyingType::Int(IntType::I32),
                PredicateExpr::value_cmp(CompareOp::Gt, 0),
            ),
            RefinementDecl::new(KindId(1), "Yes", UnderlyingType::Bool, PredicateExpr::Value),
            RefinementDecl::new(
                KindId(2),
                "Ratio",
                UnderlyingType::Float,
                PredicateExpr::value_cmp(CompareOp::Gt, 0),
            ),
        ];
        Classifier::new().classify_all(&decls).unwrap()
    }

    #[test]
    fn test_entries_per_kind() {
        let registry = DomainRegistry::build(&table(), &AnalysisOptions::default()).unwrap();
        assert_eq!(registry.entry(KindId(0)).unwrap().domain, Some(DomainKind::Interval));
        assert_eq!(registry.entry(KindId(1)).unwrap().domain, Some(DomainKind::Boolean));

        let ratio = registry.entry(KindId(2)).unwrap();
        assert!(!ratio.is_analyzed());
        assert_eq!(ratio.invariant(), AbstractValue::Top);
    }

    #[test]
    fn test_thresholds_from_regions() {
        let registry = DomainRegistry::build(&table(), &AnalysisOptions::default()).unwrap();
        let t = registry.thresholds();
        assert!(t.contains(&0));
        assert!(t.contains(&1));
        assert!(t.contains(&(i32::MAX as i128)));
        assert!(t.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_thresholds_disabled() {
        let options = AnalysisOptions {
            widening_thresholds: false,
            ..Default::default()
        };
        let registry = DomainRegistry::build(&table(), &options).unwrap();
        assert!(registry.thresholds().is_empty());
        assert_eq!(registry.domains_in_use().len(), 2);
    }

    #[test]
    fn test_self_check_passes_for_registered_domains() {
        let registry = DomainRegistry::default();
        assert!(registry.self_check(64).is_ok());
        assert!(registry.self_check(1).is_ok());
    }
}
