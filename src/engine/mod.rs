//! # Engine
//!
//! Pipeline driver: classify declarations once, build and self-check the
//! domain registry, then analyze, verify and report every function body.
//!
//! Bodies are analyzed on a Rayon pool sized by
//! [`AnalysisOptions::max_parallelism`]. The kind table and registry are
//! read-only after classification and shared by reference across workers.
//! Reports follow the input order of the bodies.
//!
//! # Example
//! ```ignore
//! let engine = Engine::new(AnalysisOptions::default())?;
//! let report = engine.run(&declarations, &bodies)?;
//! if report.blocks_compilation() {
//!     for diag in report.diagnostics() {
//!         eprintln!("{}", diag);
//!     }
//! }
//! ```

pub mod options;

pub use options::{AnalysisOptions, OverflowModel};

use crate::analysis::analyze_body;
use crate::classify::{Classifier, KindTable};
use crate::domain::DomainRegistry;
use crate::error::{Error, Result};
use crate::ir::{FunctionBody, RefinementDecl};
use crate::report::{AnalysisReport, BodyReport, Reporter};
use crate::verify::SiteVerifier;
use rayon::prelude::*;

/// Classified kinds and the registry built from them
#[derive(Debug, Clone)]
pub struct ClassifiedKinds {
    /// Classified kinds by identity
    pub kinds: KindTable,
    /// Domain registry for the supported kinds
    pub registry: DomainRegistry,
}

/// Refinement verification engine
#[derive(Debug, Clone)]
pub struct Engine {
    options: AnalysisOptions,
}

impl Engine {
    /// Create an engine; fails on invalid options
    pub fn new(options: AnalysisOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Engine options
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Classify every declaration and build the registry
    pub fn classify(&self, decls: &[RefinementDecl]) -> Result<ClassifiedKinds> {
        let kinds = Classifier::new().classify_all(decls)?;
        let registry = DomainRegistry::build(&kinds, &self.options)?;
        tracing::debug!(
            kinds = kinds.len(),
            supported = kinds.supported().count(),
            thresholds = registry.thresholds().len(),
            "refinement kinds classified"
        );
        Ok(ClassifiedKinds { kinds, registry })
    }

    /// Analyze, verify and report every body
    pub fn analyze(&self, classified: &ClassifiedKinds, bodies: &[FunctionBody]) -> Result<AnalysisReport> {
        let reporter = Reporter::new(&self.options);
        let kinds = classified
            .kinds
            .iter()
            .map(|k| reporter.report_kind(k))
            .collect();

        let bodies = match bodies.len() {
            0 => Vec::new(),
            1 => vec![self.report_body(classified, &reporter, &bodies[0])?],
            n => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.options.max_parallelism.min(n))
                    .build()
                    .map_err(|e| Error::ThreadPool(e.to_string()))?;

                pool.install(|| {
                    bodies
                        .par_iter()
                        .map(|body| self.report_body(classified, &reporter, body))
                        .collect::<Result<Vec<BodyReport>>>()
                })?
            }
        };

        Ok(AnalysisReport { kinds, bodies })
    }

    /// Classify, then analyze
    pub fn run(&self, decls: &[RefinementDecl], bodies: &[FunctionBody]) -> Result<AnalysisReport> {
        let classified = self.classify(decls)?;
        self.analyze(&classified, bodies)
    }

    fn report_body(
        &self,
        classified: &ClassifiedKinds,
        reporter: &Reporter,
        body: &FunctionBody,
    ) -> Result<BodyReport> {
        let analysis = analyze_body(body, &classified.registry, &self.options)?;
        let verifier = SiteVerifier::new(&classified.registry);

        let sites = verifier
            .verify_body(&analysis)
            .iter()
            .map(|verdict| reporter.report_site(verdict))
            .collect();
        let diagnostics = analysis
            .safeguard_trips
            .iter()
            .map(|trip| reporter.report_safeguard(&analysis.function, trip))
            .collect();

        Ok(BodyReport {
            function: analysis.function,
            sites,
            diagnostics,
            iterations: analysis.iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        BasicBlock, CompareOp, Expr, IntType, KindId, PredicateExpr, SiteId, Statement, Terminator,
        UnderlyingType,
    };

    fn pos() -> RefinementDecl {
        RefinementDecl::new(
            KindId(0),
            "Pos",
            UnderlyingType::Int(IntType::I64),
            PredicateExpr::value_cmp(CompareOp::Gt, 0),
        )
    }

    fn body(name: &str, site: u32, literal: i128) -> FunctionBody {
        FunctionBody {
            name: name.to_string(),
            params: Vec::new(),
            locals: Vec::new(),
            blocks: vec![BasicBlock::new(
                0,
                vec![Statement::Eval(Expr::construct(
                    SiteId(site),
                    KindId(0),
                    Expr::Int(literal),
                ))],
                Terminator::Return(None),
            )],
            entry: 0,
        }
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = AnalysisOptions {
            max_parallelism: 0,
            ..AnalysisOptions::default()
        };
        assert!(Engine::new(options).is_err());
    }

    #[test]
    fn test_report_order_follows_input() {
        let engine = Engine::new(AnalysisOptions::default()).unwrap();
        let bodies: Vec<_> = (0..8).map(|i| body(&format!("f{}", i), i, i as i128)).collect();
        let report = engine.run(&[pos()], &bodies).unwrap();

        let names: Vec<_> = report.bodies.iter().map(|b| b.function.as_str()).collect();
        assert_eq!(names, vec!["f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7"]);
        // Pos(0) is refuted, the rest are proved
        assert!(report.blocks_compilation());
        assert_eq!(report.erasable_sites().len(), 7);
    }

    #[test]
    fn test_malformed_body_is_error() {
        let engine = Engine::new(AnalysisOptions::default()).unwrap();
        let mut bad = body("bad", 0, 1);
        bad.blocks[0].terminator = Terminator::Goto(9);
        assert!(matches!(
            engine.run(&[pos()], &[bad]),
            Err(Error::UnknownBlock { target: 9, .. })
        ));
    }
}
