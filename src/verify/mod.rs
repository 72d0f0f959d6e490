//! # Construction-Site Verifier
//!
//! Compares the abstract value of each construction-site argument with the
//! allowed region of the kind being constructed:
//!
//! | Check | Outcome |
//! |---|---|
//! | `arg ⊑ region` | [`VerificationOutcome::Proved`] |
//! | `arg ⊓ region = ⊥` | [`VerificationOutcome::Refuted`] |
//! | otherwise | [`VerificationOutcome::Unknown`] |
//!
//! The argument is first met with the range of the kind's underlying type,
//! since every argument the front end passes already has that type. A site in
//! dead code has argument `⊥` and is vacuously proved; a live argument that
//! falls entirely outside the type range stays `Unknown`.
//!
//! `Proved` and `Refuted` are sound with respect to the abstraction; anything
//! the analysis cannot decide is `Unknown`. Verification is a pure function of
//! the site snapshot.

use crate::analysis::{BodyAnalysis, ConstructionSite};
use crate::domain::{AbstractValue, DomainRegistry, Lattice};
use crate::ir::{KindId, SiteId, SourceLoc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a site was left undecided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownReason {
    /// The kind is not registered
    UnregisteredKind,
    /// The kind's predicate was rejected, so its sites are never analyzed
    KindNotAnalyzed,
    /// The argument's sort differs from the kind's underlying sort
    SortMismatch,
    /// The argument lies entirely outside the underlying type's range
    OutsideTypeRange,
    /// The argument overlaps the region without being contained in it
    NotProved,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::UnregisteredKind => write!(f, "kind is not registered"),
            UnknownReason::KindNotAnalyzed => write!(f, "kind predicate is not analyzable"),
            UnknownReason::SortMismatch => write!(f, "argument sort differs from the underlying type"),
            UnknownReason::OutsideTypeRange => {
                write!(f, "argument lies outside the underlying type's range")
            }
            UnknownReason::NotProved => write!(f, "argument may violate the predicate"),
        }
    }
}

/// Verification outcome of one construction site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Every possible argument satisfies the predicate
    Proved,
    /// Undecided; the runtime check stays
    Unknown(UnknownReason),
    /// No possible argument satisfies the predicate
    Refuted,
}

impl VerificationOutcome {
    /// Check if the site is proved
    pub fn is_proved(&self) -> bool {
        matches!(self, VerificationOutcome::Proved)
    }

    /// Check if the site is refuted
    pub fn is_refuted(&self) -> bool {
        matches!(self, VerificationOutcome::Refuted)
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationOutcome::Proved => write!(f, "proved"),
            VerificationOutcome::Unknown(reason) => write!(f, "unknown ({})", reason),
            VerificationOutcome::Refuted => write!(f, "refuted"),
        }
    }
}

/// Verdict for one construction site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteVerdict {
    /// Site identity
    pub site: SiteId,
    /// Constructed kind
    pub kind: KindId,
    /// Kind name, empty for unregistered kinds
    pub kind_name: String,
    /// Enclosing function
    pub function: String,
    /// Outcome
    pub outcome: VerificationOutcome,
    /// Whether some execution reaches the site
    pub reachable: bool,
    /// Argument value compared against the region
    pub argument: AbstractValue,
    /// Allowed region, for analyzed kinds
    pub region: Option<AbstractValue>,
    /// Source position
    pub location: Option<SourceLoc>,
}

/// Verifies construction sites against the domain registry
#[derive(Debug, Clone, Copy)]
pub struct SiteVerifier<'a> {
    registry: &'a DomainRegistry,
}

impl<'a> SiteVerifier<'a> {
    /// Create a verifier
    pub fn new(registry: &'a DomainRegistry) -> Self {
        Self { registry }
    }

    /// Verify one site
    pub fn verify(&self, site: &ConstructionSite) -> SiteVerdict {
        let entry = self.registry.entry(site.kind);
        let reachable = site.is_reachable();

        let (outcome, argument, region) = match entry {
            None => (
                VerificationOutcome::Unknown(UnknownReason::UnregisteredKind),
                site.value.clone(),
                None,
            ),
            Some(entry) => match &entry.region {
                None => (
                    VerificationOutcome::Unknown(UnknownReason::KindNotAnalyzed),
                    site.value.clone(),
                    None,
                ),
                Some(region) => {
                    let (outcome, argument) = Self::decide(&site.value, &entry.type_range, region);
                    (outcome, argument, Some(region.clone()))
                }
            },
        };

        tracing::trace!(
            site = %site.site,
            function = %site.function,
            %argument,
            %outcome,
            "construction site verified"
        );

        SiteVerdict {
            site: site.site,
            kind: site.kind,
            kind_name: entry.map(|e| e.name.clone()).unwrap_or_default(),
            function: site.function.clone(),
            outcome,
            reachable,
            argument,
            region,
            location: site.location.clone(),
        }
    }

    fn decide(
        value: &AbstractValue,
        type_range: &AbstractValue,
        region: &AbstractValue,
    ) -> (VerificationOutcome, AbstractValue) {
        if let (Some(found), Some(expected)) = (value.sort(), type_range.sort()) {
            if found != expected {
                return (
                    VerificationOutcome::Unknown(UnknownReason::SortMismatch),
                    value.clone(),
                );
            }
        }

        let argument = value.meet(type_range);
        // only dead code may be vacuously proved; an ill-typed argument is not
        if argument.is_bottom() && !value.is_bottom() {
            return (
                VerificationOutcome::Unknown(UnknownReason::OutsideTypeRange),
                value.clone(),
            );
        }

        let outcome = if argument.leq(region) {
            VerificationOutcome::Proved
        } else if argument.meet(region).is_bottom() {
            VerificationOutcome::Refuted
        } else {
            VerificationOutcome::Unknown(UnknownReason::NotProved)
        };
        (outcome, argument)
    }

    /// Verify every site of an analyzed body, in site order
    pub fn verify_body(&self, analysis: &BodyAnalysis) -> Vec<SiteVerdict> {
        analysis.sites.iter().map(|s| self.verify(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AbstractState;
    use crate::classify::Classifier;
    use crate::domain::Interval;
    use crate::engine::AnalysisOptions;
    use crate::ir::{CompareOp, Expr, IntType, PredicateExpr, RefinementDecl, UnderlyingType};

    fn registry() -> DomainRegistry {
        let decls = vec![
            RefinementDecl::new(
                KindId(0),
                "Pos",
                UnderlyingType::Int(IntType::I64),
                PredicateExpr::value_cmp(CompareOp::Gt, 0),
            ),
            RefinementDecl::new(
                KindId(1),
                "Bounded",
                UnderlyingType::Int(IntType::I64),
                PredicateExpr::compare(
                    CompareOp::Lt,
                    PredicateExpr::Value,
                    PredicateExpr::Field("max".to_string()),
                ),
            ),
        ];
        let table = Classifier::new().classify_all(&decls).unwrap();
        DomainRegistry::build(&table, &AnalysisOptions::default()).unwrap()
    }

    fn site(kind: u32, value: AbstractValue) -> ConstructionSite {
        ConstructionSite {
            site: SiteId(0),
            kind: KindId(kind),
            function: "f".to_string(),
            argument: Expr::var("x"),
            value: value.clone(),
            state: AbstractState::from_values([("x".to_string(), value)]),
            location: None,
        }
    }

    #[test]
    fn test_literal_proved() {
        let registry = registry();
        let verdict = SiteVerifier::new(&registry).verify(&site(0, AbstractValue::int_const(5)));
        assert_eq!(verdict.outcome, VerificationOutcome::Proved);
        assert!(verdict.reachable);
        assert_eq!(verdict.kind_name, "Pos");
    }

    #[test]
    fn test_untracked_unknown() {
        let registry = registry();
        let verdict = SiteVerifier::new(&registry).verify(&site(0, AbstractValue::Top));
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Unknown(UnknownReason::NotProved)
        );
    }

    #[test]
    fn test_non_positive_refuted() {
        let registry = registry();
        let value = AbstractValue::int(Interval::at_most(0));
        let verdict = SiteVerifier::new(&registry).verify(&site(0, value));
        assert_eq!(verdict.outcome, VerificationOutcome::Refuted);
    }

    #[test]
    fn test_rejected_kind_always_unknown() {
        let registry = registry();
        let verdict = SiteVerifier::new(&registry).verify(&site(1, AbstractValue::int_const(5)));
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Unknown(UnknownReason::KindNotAnalyzed)
        );
    }

    #[test]
    fn test_sort_mismatch_unknown() {
        let registry = registry();
        let verdict = SiteVerifier::new(&registry).verify(&site(0, AbstractValue::bool_const(true)));
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Unknown(UnknownReason::SortMismatch)
        );
    }

    #[test]
    fn test_argument_outside_type_range_unknown() {
        let decl = RefinementDecl::new(
            KindId(0),
            "Small",
            UnderlyingType::Int(IntType::U8),
            PredicateExpr::value_cmp(CompareOp::LtEq, 100),
        );
        let table = Classifier::new().classify_all(&[decl]).unwrap();
        let registry = DomainRegistry::build(&table, &AnalysisOptions::default()).unwrap();

        let value = AbstractValue::int(Interval::from_bounds(-5, -1));
        let verdict = SiteVerifier::new(&registry).verify(&site(0, value.clone()));
        assert_eq!(
            verdict.outcome,
            VerificationOutcome::Unknown(UnknownReason::OutsideTypeRange)
        );
        assert!(verdict.reachable);
        assert_eq!(verdict.argument, value);
    }

    #[test]
    fn test_dead_site_vacuously_proved() {
        let registry = registry();
        let dead = ConstructionSite::unreachable(SiteId(3), KindId(0), "f", &Expr::var("x"), None);
        let verdict = SiteVerifier::new(&registry).verify(&dead);
        assert_eq!(verdict.outcome, VerificationOutcome::Proved);
        assert!(!verdict.reachable);
    }

    #[test]
    fn test_verification_is_idempotent() {
        let registry = registry();
        let verifier = SiteVerifier::new(&registry);
        let s = site(0, AbstractValue::int(Interval::from_bounds(-3, 3)));
        assert_eq!(verifier.verify(&s), verifier.verify(&s));
    }
}
