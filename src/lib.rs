//! # vrefine - Refinement-Kind Verification
//!
//! An abstract-interpretation engine for refinement kinds: value classes that
//! wrap one underlying value and declare a predicate it must satisfy. At every
//! construction site the engine decides whether the argument provably
//! satisfies the predicate, provably violates it, or cannot be decided, and
//! tells the host compiler which runtime checks may be erased.
//!
//! ## Quick Start
//!
//! ```rust
//! use vrefine::ir::{
//!     BasicBlock, CompareOp, Expr, FunctionBody, IntType, KindId, PredicateExpr,
//!     RefinementDecl, SiteId, Statement, Terminator, UnderlyingType,
//! };
//! use vrefine::{AnalysisOptions, Engine, VerificationOutcome};
//!
//! # fn main() -> vrefine::Result<()> {
//! // value class Pos(val value: Long) { init { require(value > 0) } }
//! let pos = RefinementDecl::new(
//!     KindId(0),
//!     "Pos",
//!     UnderlyingType::Int(IntType::I64),
//!     PredicateExpr::value_cmp(CompareOp::Gt, 0),
//! );
//!
//! // fun f() = Pos(5)
//! let body = FunctionBody {
//!     name: "f".to_string(),
//!     params: Vec::new(),
//!     locals: Vec::new(),
//!     blocks: vec![BasicBlock::new(
//!         0,
//!         vec![Statement::Eval(Expr::construct(SiteId(0), KindId(0), Expr::Int(5)))],
//!         Terminator::Return(None),
//!     )],
//!     entry: 0,
//! };
//!
//! let engine = Engine::new(AnalysisOptions::default())?;
//! let report = engine.run(&[pos], &[body])?;
//!
//! let site = report.site(SiteId(0)).expect("site reported");
//! assert_eq!(site.verdict.outcome, VerificationOutcome::Proved);
//! assert_eq!(report.erasable_sites(), vec![SiteId(0)]);
//! assert!(!report.blocks_compilation());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! RefinementDecl → Classifier → DomainRegistry
//!                                     ↓
//! FunctionBody → analyze_body → SiteVerifier → Reporter → AnalysisReport
//! ```
//!
//! ### Main Components
//!
//! - [`classify`] - Predicate Classifier: maps each declaration to a supported
//!   grammar and allowed region, or rejects it
//! - [`domain`] - Abstract domains and the per-kind [`DomainRegistry`]
//! - [`analysis`] - Transfer Function Engine: forward fixpoint over one body
//! - [`verify`] - Construction-Site Verifier
//! - [`report`] - Diagnostics and erasure directives
//! - [`engine`] - Pipeline driver with parallel body analysis
//!
//! ## Error Handling
//!
//! Analysis outcomes are never errors. Rejected kinds, refuted constructions
//! and iteration-bound trips all surface as [`Diagnostic`]s. [`Error`] is
//! returned only for malformed input (unknown blocks, duplicate kind ids) and
//! infrastructure failures.
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber.

/// Version of the vrefine engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod analysis;
pub mod classify;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ir;
pub mod report;
pub mod verify;

// Re-export main types
pub use analysis::{analyze_body, AbstractState, BodyAnalysis, ConstructionSite};
pub use classify::{Classifier, KindTable, RefinementKind};
pub use domain::{AbstractValue, BoolValue, DomainRegistry, Interval, Lattice};
pub use engine::{AnalysisOptions, ClassifiedKinds, Engine, OverflowModel};
pub use error::{Error, Result};
pub use report::{AnalysisReport, Diagnostic, DiagnosticCode, Reporter, Severity, UnknownPolicy};
pub use verify::{SiteVerdict, SiteVerifier, UnknownReason, VerificationOutcome};
