//! # Transfer Functions
//!
//! Abstract semantics of expressions, statements and branch conditions over
//! [`AbstractState`]. Every function here is monotone in the input state.
//!
//! Integer arithmetic is evaluated over the mathematical integers and then fit
//! to the type of the operands according to the [`OverflowModel`]:
//! trapping overflow clamps to the type range (overflowing executions stop),
//! wrapping overflow widens an escaping result to the whole type range.

use super::{AbstractState, ConstructionSite};
use crate::domain::{AbstractValue, BoolValue, DomainRegistry, Interval, Lattice};
use crate::engine::{AnalysisOptions, OverflowModel};
use crate::ir::{
    ArithOp, CompareOp, Expr, FunctionBody, KindId, LocalType, LogicOp, Sort, Statement, UnaryOp,
};

/// Abstract semantics for one function body
pub struct Transfer<'a> {
    body: &'a FunctionBody,
    registry: &'a DomainRegistry,
    overflow: OverflowModel,
}

impl<'a> Transfer<'a> {
    /// Create the transfer functions for a body
    pub fn new(body: &'a FunctionBody, registry: &'a DomainRegistry, options: &AnalysisOptions) -> Self {
        Self {
            body,
            registry,
            overflow: options.overflow,
        }
    }

    /// Most general value a variable of this type can hold
    pub fn declared_top(&self, ty: &LocalType) -> AbstractValue {
        match ty {
            LocalType::Int(t) => AbstractValue::Int(Interval::range_of(*t)),
            LocalType::Bool => AbstractValue::top_of(Sort::Bool),
            LocalType::Text => AbstractValue::top_of(Sort::Text),
            LocalType::Refined(kind) => self
                .registry
                .entry(*kind)
                .map_or(AbstractValue::Top, |e| e.invariant()),
            LocalType::Opaque => AbstractValue::Top,
        }
    }

    fn declared_top_of(&self, name: &str) -> AbstractValue {
        self.body
            .local_type(name)
            .map_or(AbstractValue::Top, |ty| self.declared_top(ty))
    }

    /// State on entry: every parameter and local at the top of its declared type
    pub fn entry_state(&self) -> AbstractState {
        AbstractState::from_values(
            self.body
                .params
                .iter()
                .chain(self.body.locals.iter())
                .map(|l| (l.name.clone(), self.declared_top(&l.ty))),
        )
    }

    /// Range of the integer type an arithmetic expression is computed in, if
    /// any operand has a declared integer type
    fn arith_range(&self, expr: &Expr) -> Option<Interval> {
        match expr {
            Expr::Var(name) => match self.body.local_type(name)? {
                LocalType::Int(t) => Some(Interval::range_of(*t)),
                LocalType::Refined(kind) => match self.registry.entry(*kind)?.type_range {
                    AbstractValue::Int(range) => Some(range),
                    _ => None,
                },
                _ => None,
            },
            Expr::Construct { kind, .. } => match self.registry.entry(*kind)?.type_range {
                AbstractValue::Int(range) => Some(range),
                _ => None,
            },
            Expr::Value(inner) => self.arith_range(inner),
            Expr::Unary {
                op: UnaryOp::Neg,
                expr,
            } => self.arith_range(expr),
            Expr::Arith { left, right, .. } => {
                self.arith_range(left).or_else(|| self.arith_range(right))
            }
            _ => None,
        }
    }

    fn fit(&self, value: Interval, range: Option<Interval>) -> Interval {
        let Some(range) = range else {
            return value;
        };
        match self.overflow {
            OverflowModel::Trapping => value.meet(&range),
            OverflowModel::Wrapping if value.is_bottom() || value.leq(&range) => value,
            OverflowModel::Wrapping => range,
        }
    }

    /// Evaluate an expression
    pub fn eval(&self, expr: &Expr, state: &AbstractState) -> AbstractValue {
        self.eval_in(expr, state, None)
    }

    /// Evaluate an expression, recording every construction site it evaluates
    pub(crate) fn eval_in(
        &self,
        expr: &Expr,
        state: &AbstractState,
        mut sites: Option<&mut Vec<ConstructionSite>>,
    ) -> AbstractValue {
        if !state.is_reachable() {
            return AbstractValue::Bottom;
        }
        match expr {
            Expr::Int(n) => AbstractValue::int_const(*n),
            Expr::Bool(b) => AbstractValue::bool_const(*b),
            Expr::Str(s) => AbstractValue::text(Interval::constant(s.chars().count() as i128)),
            Expr::Var(name) => state
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.declared_top_of(name)),
            Expr::Unary {
                op: UnaryOp::Neg,
                expr: inner,
            } => {
                let v = self.eval_in(inner, state, sites);
                if v.is_bottom() {
                    return AbstractValue::Bottom;
                }
                AbstractValue::int(self.fit(v.as_interval().neg(), self.arith_range(expr)))
            }
            Expr::Unary {
                op: UnaryOp::Not,
                expr: inner,
            } => {
                let v = self.eval_in(inner, state, sites);
                AbstractValue::boolean(v.as_bool().not())
            }
            Expr::Arith { op, left, right } => {
                let l = self.eval_in(left, state, sites.as_deref_mut());
                let r = self.eval_in(right, state, sites);
                if l.is_bottom() || r.is_bottom() {
                    return AbstractValue::Bottom;
                }
                let (a, b) = (l.as_interval(), r.as_interval());
                let raw = match op {
                    ArithOp::Add => a.add(&b),
                    ArithOp::Sub => a.sub(&b),
                    ArithOp::Mul => a.mul(&b),
                    ArithOp::Div => a.div(&b),
                    ArithOp::Rem => a.rem(&b),
                };
                AbstractValue::int(self.fit(raw, self.arith_range(expr)))
            }
            Expr::Compare { op, left, right } => {
                let l = self.eval_in(left, state, sites.as_deref_mut());
                let r = self.eval_in(right, state, sites);
                AbstractValue::boolean(l.compare(*op, &r))
            }
            Expr::Logic { op, left, right } => {
                let l = self.eval_in(left, state, sites.as_deref_mut()).as_bool();
                // the right operand only runs when the left one does not decide
                let deciding = *op == LogicOp::Or;
                let continued = self.assume(left, !deciding, state);
                let r = if l.may_be(!deciding) {
                    self.eval_in(right, &continued, sites).as_bool()
                } else {
                    BoolValue::Bottom
                };
                let short = if l.may_be(deciding) {
                    BoolValue::from_bool(deciding)
                } else {
                    BoolValue::Bottom
                };
                AbstractValue::boolean(short.join(&r))
            }
            Expr::Len(inner) => {
                let v = self.eval_in(inner, state, sites);
                AbstractValue::int(v.as_length())
            }
            Expr::Concat(left, right) => {
                let l = self.eval_in(left, state, sites.as_deref_mut()).as_length();
                let r = self.eval_in(right, state, sites).as_length();
                AbstractValue::text(l.add(&r))
            }
            Expr::Construct { site, kind, arg, loc } => {
                let value = self.eval_in(arg, state, sites.as_deref_mut());
                if let Some(sites) = sites {
                    sites.push(ConstructionSite {
                        site: *site,
                        kind: *kind,
                        function: self.body.name.clone(),
                        argument: arg.as_ref().clone(),
                        value: value.clone(),
                        state: state.clone(),
                        location: loc.clone(),
                    });
                }
                self.construct(*kind, &value)
            }
            Expr::Value(inner) => self.eval_in(inner, state, sites),
            Expr::Call { args, returns, .. } => {
                for arg in args {
                    if self.eval_in(arg, state, sites.as_deref_mut()).is_bottom() {
                        return AbstractValue::Bottom;
                    }
                }
                AbstractValue::top_of(*returns)
            }
        }
    }

    /// A constructed value satisfies its kind's invariant afterwards, either
    /// because it was proved or because the runtime check passed
    fn construct(&self, kind: KindId, arg: &AbstractValue) -> AbstractValue {
        let Some(entry) = self.registry.entry(kind) else {
            return AbstractValue::Top;
        };
        let invariant = entry.invariant();
        if arg.is_bottom() {
            return AbstractValue::Bottom;
        }
        match arg.sort() {
            Some(sort) if sort != entry.sort => invariant,
            _ => arg.meet(&invariant),
        }
    }

    /// Apply one statement
    pub fn apply(&self, stmt: &Statement, state: &mut AbstractState) {
        self.apply_in(stmt, state, None)
    }

    pub(crate) fn apply_in(
        &self,
        stmt: &Statement,
        state: &mut AbstractState,
        sites: Option<&mut Vec<ConstructionSite>>,
    ) {
        if !state.is_reachable() {
            return;
        }
        match stmt {
            Statement::Assign { target, value } => {
                let v = self.eval_in(value, state, sites);
                let declared = self.declared_top_of(target);
                let stored = match (&v, &declared) {
                    (AbstractValue::Int(i), AbstractValue::Int(range)) => {
                        AbstractValue::int(self.fit(*i, Some(*range)))
                    }
                    _ if v.is_bottom() => AbstractValue::Bottom,
                    _ => {
                        let met = v.meet(&declared);
                        if met.is_bottom() {
                            declared
                        } else {
                            met
                        }
                    }
                };
                state.set(target, stored);
            }
            Statement::Eval(expr) => {
                if self.eval_in(expr, state, sites).is_bottom() {
                    state.mark_unreachable();
                }
            }
            Statement::Escape(name) => {
                let top = self.declared_top_of(name);
                state.set(name, top);
            }
        }
    }

    /// Refine `state` under the assumption that `cond` evaluates to `truth`
    pub fn assume(&self, cond: &Expr, truth: bool, state: &AbstractState) -> AbstractState {
        if !state.is_reachable() {
            return state.clone();
        }
        if !self.eval(cond, state).as_bool().may_be(truth) {
            return AbstractState::unreachable();
        }
        match cond {
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => self.assume(expr, !truth, state),
            Expr::Logic { op, left, right } => {
                // `a && b` holds iff both hold; `a || b` fails iff both fail
                let conjunctive = (*op == LogicOp::And) == truth;
                if conjunctive {
                    let first = self.assume(left, truth, state);
                    self.assume(right, truth, &first)
                } else {
                    let decided = self.assume(left, truth, state);
                    let continued = self.assume(left, !truth, state);
                    decided.join(&self.assume(right, truth, &continued))
                }
            }
            Expr::Compare { op, left, right } => {
                let op = if truth { *op } else { op.negate() };
                let rv = self.eval(right, state);
                let refined = self.refine_operand(left, op, &rv, state);
                let lv = self.eval(left, &refined);
                self.refine_operand(right, op.flip(), &lv, &refined)
            }
            Expr::Var(_) | Expr::Value(_) => {
                self.refine_operand(cond, CompareOp::Eq, &AbstractValue::bool_const(truth), state)
            }
            _ => state.clone(),
        }
    }

    /// Narrow the variable designated by `operand` (`x`, `x.value` or `len(x)`)
    /// to values `v` with `v op w` for some `w` in `other`
    fn refine_operand(
        &self,
        operand: &Expr,
        op: CompareOp,
        other: &AbstractValue,
        state: &AbstractState,
    ) -> AbstractState {
        let mut result = state.clone();
        if let Some(name) = operand.tracked_var() {
            let current = self.eval(operand, state);
            let refined = match (&current, other) {
                (AbstractValue::Int(mine), AbstractValue::Int(theirs)) => {
                    AbstractValue::int(mine.refine(op, theirs))
                }
                (AbstractValue::Bool(mine), AbstractValue::Bool(theirs)) => {
                    match (op, theirs.as_bool()) {
                        (CompareOp::Eq, Some(b)) => AbstractValue::boolean(mine.meet(&BoolValue::from_bool(b))),
                        (CompareOp::NotEq, Some(b)) => AbstractValue::boolean(mine.meet(&BoolValue::from_bool(!b))),
                        _ => current.clone(),
                    }
                }
                _ => current.clone(),
            };
            result.set(name, refined);
        } else if let Expr::Len(inner) = operand {
            if let (Some(name), AbstractValue::Int(theirs)) = (inner.tracked_var(), other) {
                let length = self.eval(inner, state).as_length();
                result.set(name, AbstractValue::text(length.refine(op, theirs)));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::ir::{IntType, Local, PredicateExpr, RefinementDecl, SiteId, UnderlyingType};

    fn registry() -> DomainRegistry {
        let decls = vec![RefinementDecl::new(
            KindId(0),
            "Pos",
            UnderlyingType::Int(IntType::I32),
            PredicateExpr::value_cmp(CompareOp::Gt, 0),
        )];
        let table = Classifier::new().classify_all(&decls).unwrap();
        DomainRegistry::build(&table, &AnalysisOptions::default()).unwrap()
    }

    fn body() -> FunctionBody {
        FunctionBody {
            name: "f".to_string(),
            params: vec![
                Local::new("x", LocalType::Int(IntType::I32)),
                Local::new("b", LocalType::Bool),
                Local::new("s", LocalType::Text),
                Local::new("p", LocalType::Refined(KindId(0))),
            ],
            locals: vec![Local::new("y", LocalType::Int(IntType::U8))],
            blocks: vec![],
            entry: 0,
        }
    }

    fn interval(lo: i128, hi: i128) -> AbstractValue {
        AbstractValue::int(Interval::from_bounds(lo, hi))
    }

    #[test]
    fn test_entry_state_uses_declared_types() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let s = t.entry_state();
        assert_eq!(s.get("y"), Some(&interval(0, 255)));
        assert_eq!(s.get("p"), Some(&interval(1, i32::MAX as i128)));
        assert_eq!(s.get("b"), Some(&AbstractValue::Bool(BoolValue::Top)));
    }

    #[test]
    fn test_trapping_arithmetic_clamps_to_type() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let s = t.entry_state();
        let e = Expr::arith(ArithOp::Add, Expr::value_of(Expr::var("p")), Expr::Int(1));
        assert_eq!(t.eval(&e, &s), interval(2, i32::MAX as i128));
    }

    #[test]
    fn test_wrapping_arithmetic_goes_to_type_range() {
        let (body, registry) = (body(), registry());
        let options = AnalysisOptions {
            overflow: OverflowModel::Wrapping,
            ..Default::default()
        };
        let t = Transfer::new(&body, &registry, &options);
        let s = t.entry_state();
        let e = Expr::arith(ArithOp::Add, Expr::value_of(Expr::var("p")), Expr::Int(1));
        assert_eq!(t.eval(&e, &s), interval(i32::MIN as i128, i32::MAX as i128));
    }

    #[test]
    fn test_construct_meets_region() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let s = t.entry_state();
        let e = Expr::construct(SiteId(0), KindId(0), Expr::var("x"));
        assert_eq!(t.eval(&e, &s), interval(1, i32::MAX as i128));

        let mut sites = Vec::new();
        t.eval_in(&e, &s, Some(&mut sites));
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].value, interval(i32::MIN as i128, i32::MAX as i128));
    }

    #[test]
    fn test_assume_comparison() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let s = t.entry_state();
        let cond = Expr::compare(CompareOp::LtEq, Expr::var("x"), Expr::Int(0));
        assert_eq!(t.assume(&cond, true, &s).get("x"), Some(&interval(i32::MIN as i128, 0)));
        assert_eq!(t.assume(&cond, false, &s).get("x"), Some(&interval(1, i32::MAX as i128)));
    }

    #[test]
    fn test_assume_conjunction_and_disjunction() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let s = t.entry_state();
        let range = Expr::and(
            Expr::compare(CompareOp::GtEq, Expr::var("x"), Expr::Int(0)),
            Expr::compare(CompareOp::Lt, Expr::var("x"), Expr::Int(10)),
        );
        assert_eq!(t.assume(&range, true, &s).get("x"), Some(&interval(0, 9)));

        let outside = Expr::or(
            Expr::compare(CompareOp::Lt, Expr::var("x"), Expr::Int(0)),
            Expr::compare(CompareOp::GtEq, Expr::var("x"), Expr::Int(10)),
        );
        assert_eq!(t.assume(&outside, false, &s).get("x"), Some(&interval(0, 9)));
    }

    #[test]
    fn test_assume_bool_and_length() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let s = t.entry_state();
        let refined = t.assume(&Expr::not(Expr::var("b")), true, &s);
        assert_eq!(refined.get("b"), Some(&AbstractValue::bool_const(false)));

        let cond = Expr::compare(CompareOp::Gt, Expr::Len(Box::new(Expr::var("s"))), Expr::Int(3));
        let refined = t.assume(&cond, true, &s);
        assert_eq!(refined.get("s"), Some(&AbstractValue::text(Interval::at_least(4))));
    }

    #[test]
    fn test_infeasible_branch_is_unreachable() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let s = t.entry_state();
        let cond = Expr::compare(CompareOp::LtEq, Expr::value_of(Expr::var("p")), Expr::Int(0));
        assert!(!t.assume(&cond, true, &s).is_reachable());
    }

    #[test]
    fn test_escape_reverts_to_top() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let mut s = t.entry_state();
        t.apply(&Statement::assign("y", Expr::Int(3)), &mut s);
        assert_eq!(s.get("y"), Some(&interval(3, 3)));
        t.apply(&Statement::Escape("y".to_string()), &mut s);
        assert_eq!(s.get("y"), Some(&interval(0, 255)));
    }

    #[test]
    fn test_division_by_zero_stops_execution() {
        let (body, registry) = (body(), registry());
        let t = Transfer::new(&body, &registry, &AnalysisOptions::default());
        let mut s = t.entry_state();
        t.apply(
            &Statement::assign("x", Expr::arith(ArithOp::Div, Expr::var("x"), Expr::Int(0))),
            &mut s,
        );
        assert!(!s.is_reachable());
    }
}
