use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vrefine::ir::{
    ArithOp, BasicBlock, CompareOp, Expr, FunctionBody, IntType, KindId, Local, LocalType,
    PredicateExpr, RefinementDecl, SiteId, Statement, Terminator, UnderlyingType,
};
use vrefine::{analyze_body, AnalysisOptions, Engine};

fn declarations() -> Vec<RefinementDecl> {
    vec![
        RefinementDecl::new(
            KindId(0),
            "Offset",
            UnderlyingType::Int(IntType::I64),
            PredicateExpr::value_cmp(CompareOp::GtEq, 0),
        ),
        RefinementDecl::new(
            KindId(1),
            "Percent",
            UnderlyingType::Int(IntType::I32),
            PredicateExpr::and(
                PredicateExpr::value_cmp(CompareOp::GtEq, 0),
                PredicateExpr::value_cmp(CompareOp::LtEq, 100),
            ),
        ),
    ]
}

/// `depth` nested counting loops, each constructing an `Offset` and a `Percent`
fn nested_loops(name: &str, depth: usize) -> FunctionBody {
    let mut blocks = Vec::new();
    let mut locals = Vec::new();
    let exit = 2 * depth + 1;

    blocks.push(BasicBlock::new(0, Vec::new(), Terminator::Goto(1)));
    for level in 0..depth {
        let var = format!("i{}", level);
        let header = 2 * level + 1;
        let body = header + 1;
        locals.push(Local::new(&var, LocalType::Int(IntType::I64)));

        // header: reset inner counter on entry, then test it
        blocks.push(BasicBlock::new(
            header,
            Vec::new(),
            Terminator::Branch {
                cond: Expr::compare(CompareOp::Lt, Expr::var(&var), Expr::Int(100)),
                then: body,
                otherwise: if level == 0 { exit } else { header - 2 },
            },
        ));

        let site = (2 * level) as u32;
        let mut statements = vec![
            Statement::Eval(Expr::construct(SiteId(site), KindId(0), Expr::var(&var))),
            Statement::Eval(Expr::construct(SiteId(site + 1), KindId(1), Expr::var(&var))),
            Statement::assign(&var, Expr::arith(ArithOp::Add, Expr::var(&var), Expr::Int(1))),
        ];
        let next = if level + 1 < depth {
            let inner = format!("i{}", level + 1);
            statements.push(Statement::assign(&inner, Expr::Int(0)));
            header + 2
        } else {
            header
        };
        blocks.push(BasicBlock::new(body, statements, Terminator::Goto(next)));
    }
    blocks.push(BasicBlock::new(exit, Vec::new(), Terminator::Return(None)));

    // initialize the outer counter in the entry block
    blocks[0].statements.push(Statement::assign("i0", Expr::Int(0)));

    FunctionBody {
        name: name.to_string(),
        params: Vec::new(),
        locals,
        blocks,
        entry: 0,
    }
}

fn fixpoint_benchmark(c: &mut Criterion) {
    let engine = Engine::new(AnalysisOptions::default()).unwrap();
    let classified = engine.classify(&declarations()).unwrap();
    let options = AnalysisOptions::default();

    let mut group = c.benchmark_group("analyze_body");
    for depth in [1, 4, 8] {
        let body = nested_loops("nested", depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &body, |b, body| {
            b.iter(|| analyze_body(black_box(body), &classified.registry, &options).unwrap())
        });
    }
    group.finish();
}

fn pipeline_benchmark(c: &mut Criterion) {
    let engine = Engine::new(AnalysisOptions::default()).unwrap();
    let decls = declarations();
    let bodies: Vec<_> = (0..64)
        .map(|i| nested_loops(&format!("f{}", i), 1 + i % 4))
        .collect();

    c.bench_function("run 64 bodies", |b| {
        b.iter(|| engine.run(black_box(&decls), black_box(&bodies)).unwrap())
    });
}

criterion_group!(benches, fixpoint_benchmark, pipeline_benchmark);
criterion_main!(benches);
