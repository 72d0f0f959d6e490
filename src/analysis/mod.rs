//! # Transfer Function Engine
//!
//! Forward, intraprocedural abstract interpretation of one function body.
//! The result records the abstract state at every construction site, which is
//! all the [`verify`](crate::verify) stage needs.
//!
//! ## Program point states
//!
//! Every block ends the analysis either [`PointStatus::Stable`] with a reachable
//! in-state, or [`PointStatus::Unreachable`] (`⊥`) when no execution reaches it.

mod fixpoint;
pub mod state;
pub mod transfer;

pub use state::AbstractState;
pub use transfer::Transfer;

use crate::domain::{AbstractValue, DomainRegistry};
use crate::engine::AnalysisOptions;
use crate::error::{Error, Result};
use crate::ir::{ControlFlowGraph, Expr, FunctionBody, KindId, LocalType, SiteId, SourceLoc};
use fixpoint::Fixpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of one construction site after the fixpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionSite {
    /// Site identity
    pub site: SiteId,
    /// Kind being constructed
    pub kind: KindId,
    /// Enclosing function
    pub function: String,
    /// Raw argument expression
    pub argument: Expr,
    /// Abstract value of the argument (`⊥` in dead code)
    pub value: AbstractValue,
    /// State visible at the call
    pub state: AbstractState,
    /// Source position
    pub location: Option<SourceLoc>,
}

impl ConstructionSite {
    /// Snapshot of a site no execution reaches
    pub fn unreachable(
        site: SiteId,
        kind: KindId,
        function: &str,
        argument: &Expr,
        location: Option<SourceLoc>,
    ) -> Self {
        Self {
            site,
            kind,
            function: function.to_string(),
            argument: argument.clone(),
            value: AbstractValue::Bottom,
            state: AbstractState::unreachable(),
            location,
        }
    }

    /// Check if some execution reaches the site
    pub fn is_reachable(&self) -> bool {
        self.state.is_reachable() && !matches!(self.value, AbstractValue::Bottom)
    }
}

/// Status of a program point after analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointStatus {
    /// Fixpoint reached
    Stable,
    /// No execution reaches the point
    Unreachable,
}

/// A loop header where the iteration safeguard forced values to top
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeguardTrip {
    /// Loop header block
    pub block: usize,
    /// Header visits when the safeguard last fired
    pub visits: usize,
    /// Variables forced to top
    pub forced: Vec<String>,
}

/// Analysis result for one function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyAnalysis {
    /// Function name
    pub function: String,
    /// Every construction site of the body, ordered by site id
    pub sites: Vec<ConstructionSite>,
    /// Stable in-state per block reachable in the CFG
    pub block_states: BTreeMap<usize, AbstractState>,
    /// Block visits across all phases
    pub iterations: usize,
    /// Visits per loop header in the ascending phase
    pub header_visits: BTreeMap<usize, usize>,
    /// Loop headers where the iteration safeguard fired
    pub safeguard_trips: Vec<SafeguardTrip>,
}

impl BodyAnalysis {
    /// In-state of a block; `⊥` for blocks no execution reaches
    pub fn state_at(&self, block: usize) -> AbstractState {
        self.block_states
            .get(&block)
            .cloned()
            .unwrap_or_else(AbstractState::unreachable)
    }

    /// Final status of a block
    pub fn status(&self, block: usize) -> PointStatus {
        match self.block_states.get(&block) {
            Some(state) if state.is_reachable() => PointStatus::Stable,
            _ => PointStatus::Unreachable,
        }
    }

    /// Snapshot of one site
    pub fn site(&self, site: SiteId) -> Option<&ConstructionSite> {
        self.sites.iter().find(|s| s.site == site)
    }
}

/// Analyze one function body against the registry
pub fn analyze_body(
    body: &FunctionBody,
    registry: &DomainRegistry,
    options: &AnalysisOptions,
) -> Result<BodyAnalysis> {
    let span = tracing::info_span!("analyze_body", function = %body.name);
    let _enter = span.enter();

    let cfg = ControlFlowGraph::build(body)?;
    check_kinds(body, registry)?;

    let solution = Fixpoint::new(body, &cfg, registry, options).solve();

    tracing::debug!(
        blocks = body.blocks.len(),
        loops = cfg.loop_count(),
        iterations = solution.iterations,
        sites = solution.sites.len(),
        "body analyzed"
    );

    Ok(BodyAnalysis {
        function: body.name.clone(),
        sites: solution.sites,
        block_states: solution.block_states,
        iterations: solution.iterations,
        header_visits: solution.header_visits.into_iter().collect(),
        safeguard_trips: solution.trips,
    })
}

/// Every kind a body mentions must be registered
fn check_kinds(body: &FunctionBody, registry: &DomainRegistry) -> Result<()> {
    let unknown = |kind: KindId| match registry.entry(kind) {
        Some(_) => Ok(()),
        None => Err(Error::UnknownKind { id: kind.0 }),
    };

    for local in body.params.iter().chain(body.locals.iter()) {
        if let LocalType::Refined(kind) = local.ty {
            unknown(kind)?;
        }
    }

    let mut result = Ok(());
    body.for_each_construct(&mut |expr| {
        if let Expr::Construct { kind, .. } = expr {
            if result.is_ok() {
                result = unknown(*kind);
            }
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KindTable;
    use crate::domain::Interval;
    use crate::ir::{ArithOp, BasicBlock, CompareOp, IntType, Local, Statement, Terminator};

    fn registry() -> DomainRegistry {
        DomainRegistry::build(&KindTable::default(), &AnalysisOptions::default()).unwrap()
    }

    /// `i = 0; while (i < 10) { i = i + 1 }`
    fn bounded_loop() -> FunctionBody {
        FunctionBody {
            name: "bounded".to_string(),
            params: Vec::new(),
            locals: vec![Local::new("i", LocalType::Int(IntType::I64))],
            blocks: vec![
                BasicBlock::new(0, vec![Statement::assign("i", Expr::Int(0))], Terminator::Goto(1)),
                BasicBlock::new(
                    1,
                    Vec::new(),
                    Terminator::Branch {
                        cond: Expr::compare(CompareOp::Lt, Expr::var("i"), Expr::Int(10)),
                        then: 2,
                        otherwise: 3,
                    },
                ),
                BasicBlock::new(
                    2,
                    vec![Statement::assign(
                        "i",
                        Expr::arith(ArithOp::Add, Expr::var("i"), Expr::Int(1)),
                    )],
                    Terminator::Goto(1),
                ),
                BasicBlock::new(3, Vec::new(), Terminator::Return(None)),
            ],
            entry: 0,
        }
    }

    #[test]
    fn test_narrowing_recovers_loop_bound() {
        let analysis = analyze_body(&bounded_loop(), &registry(), &AnalysisOptions::default()).unwrap();
        assert_eq!(
            analysis.state_at(1).get("i"),
            Some(&AbstractValue::int(Interval::from_bounds(0, 10)))
        );
        assert_eq!(
            analysis.state_at(3).get("i"),
            Some(&AbstractValue::int_const(10))
        );
        assert!(analysis.header_visits.contains_key(&1));
        assert!(analysis.safeguard_trips.is_empty());
    }

    #[test]
    fn test_without_narrowing_exit_stays_widened() {
        let options = AnalysisOptions {
            narrowing_passes: 0,
            ..AnalysisOptions::default()
        };
        let analysis = analyze_body(&bounded_loop(), &registry(), &options).unwrap();
        assert_eq!(
            analysis.state_at(3).get("i"),
            Some(&AbstractValue::int(Interval::at_least(10)))
        );
    }

    #[test]
    fn test_dead_block_is_unreachable() {
        let body = FunctionBody {
            name: "dead".to_string(),
            params: Vec::new(),
            locals: Vec::new(),
            blocks: vec![
                BasicBlock::new(
                    0,
                    Vec::new(),
                    Terminator::Branch {
                        cond: Expr::Bool(true),
                        then: 2,
                        otherwise: 1,
                    },
                ),
                BasicBlock::new(1, Vec::new(), Terminator::Goto(2)),
                BasicBlock::new(2, Vec::new(), Terminator::Return(None)),
            ],
            entry: 0,
        };
        let analysis = analyze_body(&body, &registry(), &AnalysisOptions::default()).unwrap();
        assert_eq!(analysis.status(0), PointStatus::Stable);
        assert_eq!(analysis.status(1), PointStatus::Unreachable);
        assert_eq!(analysis.status(2), PointStatus::Stable);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let body = FunctionBody {
            name: "f".to_string(),
            params: vec![Local::new("p", LocalType::Refined(KindId(9)))],
            locals: Vec::new(),
            blocks: vec![BasicBlock::new(0, Vec::new(), Terminator::Return(None))],
            entry: 0,
        };
        let result = analyze_body(&body, &registry(), &AnalysisOptions::default());
        assert_eq!(result, Err(Error::UnknownKind { id: 9 }));
    }
}
