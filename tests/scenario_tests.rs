//! # Construction-Site Scenarios
//!
//! End-to-end runs of the engine over small bodies covering every verdict:
//! proved literals, untracked arguments, refuted branches, loops that need
//! widening and narrowing, and kinds whose predicate is rejected.

use vrefine::ir::{
    ArithOp, BasicBlock, CompareOp, Expr, FunctionBody, IntType, KindId, Local, LocalType,
    PredicateExpr, RefinementDecl, SiteId, Sort, Statement, Terminator, UnderlyingType,
};
use vrefine::{
    AnalysisOptions, AnalysisReport, DiagnosticCode, Engine, Severity, UnknownReason,
    VerificationOutcome,
};

const POS: KindId = KindId(0);
const OFFSET: KindId = KindId(1);
const BATCH_SIZE: KindId = KindId(2);
const BOUNDED: KindId = KindId(3);

/// `Pos(v: Long) { require(v > 0) }` and friends
fn declarations() -> Vec<RefinementDecl> {
    vec![
        RefinementDecl::new(
            POS,
            "Pos",
            UnderlyingType::Int(IntType::I64),
            PredicateExpr::value_cmp(CompareOp::Gt, 0),
        ),
        RefinementDecl::new(
            OFFSET,
            "Offset",
            UnderlyingType::Int(IntType::I64),
            PredicateExpr::value_cmp(CompareOp::GtEq, 0),
        ),
        RefinementDecl::new(
            BATCH_SIZE,
            "BatchSize",
            UnderlyingType::Int(IntType::I64),
            PredicateExpr::value_cmp(CompareOp::Gt, 0),
        ),
        // require(value < max), where max is another property
        RefinementDecl::new(
            BOUNDED,
            "Bounded",
            UnderlyingType::Int(IntType::I64),
            PredicateExpr::compare(
                CompareOp::Lt,
                PredicateExpr::Value,
                PredicateExpr::Field("max".to_string()),
            ),
        ),
    ]
}

fn straight_line(name: &str, params: Vec<Local>, statements: Vec<Statement>) -> FunctionBody {
    FunctionBody {
        name: name.to_string(),
        params,
        locals: Vec::new(),
        blocks: vec![BasicBlock::new(0, statements, Terminator::Return(None))],
        entry: 0,
    }
}

fn run(bodies: &[FunctionBody]) -> AnalysisReport {
    Engine::new(AnalysisOptions::default())
        .unwrap()
        .run(&declarations(), bodies)
        .unwrap()
}

fn outcome(report: &AnalysisReport, site: u32) -> VerificationOutcome {
    report
        .site(SiteId(site))
        .unwrap_or_else(|| panic!("site {} not reported", site))
        .verdict
        .outcome
}

/// `Pos(5)` is proved and its check erased
#[test]
fn test_literal_construction_proved() {
    let body = straight_line(
        "literal",
        Vec::new(),
        vec![Statement::Eval(Expr::construct(SiteId(0), POS, Expr::Int(5)))],
    );
    let report = run(&[body]);

    assert_eq!(outcome(&report, 0), VerificationOutcome::Proved);
    assert_eq!(report.erasable_sites(), vec![SiteId(0)]);
    assert!(!report.blocks_compilation());
}

/// `Pos(x)` with nothing known about `x` stays unknown and keeps its check
#[test]
fn test_untracked_argument_unknown() {
    let from_param = straight_line(
        "param",
        vec![Local::new("x", LocalType::Int(IntType::I64))],
        vec![Statement::Eval(Expr::construct(SiteId(0), POS, Expr::var("x")))],
    );
    let from_call = straight_line(
        "call",
        Vec::new(),
        vec![Statement::Eval(Expr::construct(
            SiteId(1),
            POS,
            Expr::Call {
                callee: "readLong".to_string(),
                args: Vec::new(),
                returns: Sort::Int,
            },
        ))],
    );
    let report = run(&[from_param, from_call]);

    for site in [0, 1] {
        assert_eq!(
            outcome(&report, site),
            VerificationOutcome::Unknown(UnknownReason::NotProved),
            "site {} should be unknown",
            site
        );
        let diag = report.site(SiteId(site)).unwrap().diagnostic.as_ref().unwrap();
        assert_eq!(diag.code, DiagnosticCode::I0201);
        assert_eq!(diag.severity, Severity::Info);
    }
    assert!(report.erasable_sites().is_empty());
    assert!(!report.blocks_compilation());
}

/// `if (v <= 0) { Pos(v) }` is refuted and blocks compilation
#[test]
fn test_construction_under_contradicting_branch_refuted() {
    let body = FunctionBody {
        name: "guarded".to_string(),
        params: vec![Local::new("v", LocalType::Int(IntType::I64))],
        locals: Vec::new(),
        blocks: vec![
            BasicBlock::new(
                0,
                Vec::new(),
                Terminator::Branch {
                    cond: Expr::compare(CompareOp::LtEq, Expr::var("v"), Expr::Int(0)),
                    then: 1,
                    otherwise: 2,
                },
            ),
            BasicBlock::new(
                1,
                vec![Statement::Eval(Expr::construct(SiteId(0), POS, Expr::var("v")))],
                Terminator::Goto(2),
            ),
            BasicBlock::new(2, Vec::new(), Terminator::Return(None)),
        ],
        entry: 0,
    };
    let report = run(&[body]);

    assert_eq!(outcome(&report, 0), VerificationOutcome::Refuted);
    assert!(report.blocks_compilation());
    let diag = report.site(SiteId(0)).unwrap().diagnostic.as_ref().unwrap();
    assert_eq!(diag.code, DiagnosticCode::E0202);
    assert_eq!(diag.function.as_deref(), Some("guarded"));
}

/// The opposite branch proves the same construction
#[test]
fn test_construction_under_confirming_branch_proved() {
    let body = FunctionBody {
        name: "guarded".to_string(),
        params: vec![Local::new("v", LocalType::Int(IntType::I64))],
        locals: Vec::new(),
        blocks: vec![
            BasicBlock::new(
                0,
                Vec::new(),
                Terminator::Branch {
                    cond: Expr::compare(CompareOp::LtEq, Expr::var("v"), Expr::Int(0)),
                    then: 2,
                    otherwise: 1,
                },
            ),
            BasicBlock::new(
                1,
                vec![Statement::Eval(Expr::construct(SiteId(0), POS, Expr::var("v")))],
                Terminator::Goto(2),
            ),
            BasicBlock::new(2, Vec::new(), Terminator::Return(None)),
        ],
        entry: 0,
    };
    let report = run(&[body]);
    assert_eq!(outcome(&report, 0), VerificationOutcome::Proved);
}

/// ```text
/// fun advance(batchSize: BatchSize, n: Long) {
///     var offset = Offset(0)
///     while (offset.value < n) {
///         offset = Offset(offset.value + batchSize.value)
///     }
/// }
/// ```
fn offset_loop() -> FunctionBody {
    FunctionBody {
        name: "advance".to_string(),
        params: vec![
            Local::new("batchSize", LocalType::Refined(BATCH_SIZE)),
            Local::new("n", LocalType::Int(IntType::I64)),
        ],
        locals: vec![Local::new("offset", LocalType::Refined(OFFSET))],
        blocks: vec![
            BasicBlock::new(
                0,
                vec![Statement::assign(
                    "offset",
                    Expr::construct(SiteId(0), OFFSET, Expr::Int(0)),
                )],
                Terminator::Goto(1),
            ),
            BasicBlock::new(
                1,
                Vec::new(),
                Terminator::Branch {
                    cond: Expr::compare(
                        CompareOp::Lt,
                        Expr::value_of(Expr::var("offset")),
                        Expr::var("n"),
                    ),
                    then: 2,
                    otherwise: 3,
                },
            ),
            BasicBlock::new(
                2,
                vec![Statement::assign(
                    "offset",
                    Expr::construct(
                        SiteId(1),
                        OFFSET,
                        Expr::arith(
                            ArithOp::Add,
                            Expr::value_of(Expr::var("offset")),
                            Expr::value_of(Expr::var("batchSize")),
                        ),
                    ),
                )],
                Terminator::Goto(1),
            ),
            BasicBlock::new(3, Vec::new(), Terminator::Return(None)),
        ],
        entry: 0,
    }
}

/// Accumulating a positive batch size onto a non-negative offset is proved
/// once the loop stabilizes
#[test]
fn test_loop_accumulation_proved() {
    let report = run(&[offset_loop()]);

    assert_eq!(outcome(&report, 0), VerificationOutcome::Proved);
    assert_eq!(outcome(&report, 1), VerificationOutcome::Proved);
    assert_eq!(report.erasable_sites(), vec![SiteId(0), SiteId(1)]);
    assert!(
        report.bodies[0].diagnostics.is_empty(),
        "loop should stabilize without the safeguard"
    );
}

/// Without threshold widening the loop still converges and proves the site
#[test]
fn test_loop_accumulation_proved_without_thresholds() {
    let options = AnalysisOptions {
        widening_thresholds: false,
        ..AnalysisOptions::default()
    };
    let report = Engine::new(options)
        .unwrap()
        .run(&declarations(), &[offset_loop()])
        .unwrap();
    assert_eq!(outcome(&report, 1), VerificationOutcome::Proved);
}

/// A predicate reading another field is rejected with a warning, and every
/// site of the kind stays unknown with its check kept
#[test]
fn test_foreign_reference_rejected() {
    let body = straight_line(
        "bounded",
        Vec::new(),
        vec![
            Statement::Eval(Expr::construct(SiteId(0), BOUNDED, Expr::Int(5))),
            Statement::Eval(Expr::construct(SiteId(1), BOUNDED, Expr::Int(-5))),
        ],
    );
    let report = run(&[body]);

    let kind = report.kinds.iter().find(|k| k.kind == BOUNDED).unwrap();
    assert!(!kind.analyzed);
    assert_eq!(kind.diagnostics.len(), 1);
    assert_eq!(kind.diagnostics[0].code, DiagnosticCode::W0101);
    assert_eq!(kind.diagnostics[0].severity, Severity::Warning);
    assert!(kind.diagnostics[0].message.contains("max"));

    for site in [0, 1] {
        assert_eq!(
            outcome(&report, site),
            VerificationOutcome::Unknown(UnknownReason::KindNotAnalyzed)
        );
        assert!(!report.site(SiteId(site)).unwrap().erase_check);
    }
    assert!(!report.blocks_compilation());
}

/// A construction in dead code is vacuously proved and flagged unreachable
#[test]
fn test_dead_construction_vacuously_proved() {
    let body = FunctionBody {
        name: "dead".to_string(),
        params: Vec::new(),
        locals: Vec::new(),
        blocks: vec![
            BasicBlock::new(
                0,
                Vec::new(),
                Terminator::Branch {
                    cond: Expr::Bool(false),
                    then: 1,
                    otherwise: 2,
                },
            ),
            BasicBlock::new(
                1,
                vec![Statement::Eval(Expr::construct(SiteId(0), POS, Expr::Int(-1)))],
                Terminator::Goto(2),
            ),
            BasicBlock::new(2, Vec::new(), Terminator::Return(None)),
        ],
        entry: 0,
    };
    let report = run(&[body]);

    let site = report.site(SiteId(0)).unwrap();
    assert_eq!(site.verdict.outcome, VerificationOutcome::Proved);
    assert!(!site.verdict.reachable);
    assert!(!report.blocks_compilation());
}

/// A value that went through a construction carries the kind's predicate
#[test]
fn test_constructed_value_carries_predicate() {
    // val p = Pos(x); Pos(p.value)
    let body = FunctionBody {
        name: "reuse".to_string(),
        params: vec![Local::new("x", LocalType::Int(IntType::I64))],
        locals: vec![Local::new("p", LocalType::Refined(POS))],
        blocks: vec![BasicBlock::new(
            0,
            vec![
                Statement::assign("p", Expr::construct(SiteId(0), POS, Expr::var("x"))),
                Statement::Eval(Expr::construct(
                    SiteId(1),
                    POS,
                    Expr::value_of(Expr::var("p")),
                )),
            ],
            Terminator::Return(None),
        )],
        entry: 0,
    };
    let report = run(&[body]);

    assert!(matches!(outcome(&report, 0), VerificationOutcome::Unknown(_)));
    assert_eq!(outcome(&report, 1), VerificationOutcome::Proved);
}

/// Escaping a variable forgets what was known about it
#[test]
fn test_escaped_value_reverts_to_top() {
    let body = FunctionBody {
        name: "escape".to_string(),
        params: Vec::new(),
        locals: vec![Local::new("x", LocalType::Int(IntType::I64))],
        blocks: vec![BasicBlock::new(
            0,
            vec![
                Statement::assign("x", Expr::Int(5)),
                Statement::Escape("x".to_string()),
                Statement::Eval(Expr::construct(SiteId(0), POS, Expr::var("x"))),
            ],
            Terminator::Return(None),
        )],
        entry: 0,
    };
    let report = run(&[body]);
    assert!(matches!(outcome(&report, 0), VerificationOutcome::Unknown(_)));
}
