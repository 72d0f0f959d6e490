//! Recognizers for the supported predicate grammars
//!
//! Each recognizer walks a predicate tree and computes the region of values
//! satisfying it, or rejects the tree. Negation is pushed inward: `!(a && b)`
//! becomes a disjunction and is rejected, `!(a || b)` becomes a conjunction.

use super::RejectReason;
use crate::domain::{BoolValue, Interval, Lattice};
use crate::ir::{ArithOp, CompareOp, PredicateExpr};

type Recognized<T> = std::result::Result<T, RejectReason>;

/// The term a linear comparison constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    /// The integer value itself
    Value,
    /// The length of the text value
    Length,
}

/// `coefficient · subject + offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Linear {
    coefficient: i128,
    offset: i128,
}

impl Linear {
    fn constant(offset: i128) -> Self {
        Self {
            coefficient: 0,
            offset,
        }
    }

    fn is_constant(&self) -> bool {
        self.coefficient == 0
    }
}

fn overflow(pred: &PredicateExpr) -> RejectReason {
    RejectReason::UnsupportedOperation(format!("{} (constant overflow)", pred))
}

fn linear(pred: &PredicateExpr, subject: Subject) -> Recognized<Linear> {
    match pred {
        PredicateExpr::Int(n) => Ok(Linear::constant(*n)),
        PredicateExpr::Value if subject == Subject::Value => Ok(Linear {
            coefficient: 1,
            offset: 0,
        }),
        PredicateExpr::Len(inner) if subject == Subject::Length => length_term(inner, pred),
        PredicateExpr::Call { name, args } if subject == Subject::Length && is_length_call(name) => {
            match args.as_slice() {
                [receiver] => length_term(receiver, pred),
                _ => Err(RejectReason::UnsupportedOperation(pred.to_string())),
            }
        }
        PredicateExpr::Neg(inner) => {
            let l = linear(inner, subject)?;
            Ok(Linear {
                coefficient: -l.coefficient,
                offset: l.offset.checked_neg().ok_or_else(|| overflow(pred))?,
            })
        }
        PredicateExpr::Arith { op, left, right } => {
            let l = linear(left, subject)?;
            let r = linear(right, subject)?;
            match op {
                ArithOp::Add | ArithOp::Sub => {
                    let sign = if *op == ArithOp::Add { 1 } else { -1 };
                    Ok(Linear {
                        coefficient: l.coefficient + sign * r.coefficient,
                        offset: l
                            .offset
                            .checked_add(sign * r.offset)
                            .ok_or_else(|| overflow(pred))?,
                    })
                }
                ArithOp::Mul | ArithOp::Div | ArithOp::Rem => {
                    if !l.is_constant() || !r.is_constant() {
                        return Err(RejectReason::NonConstantOperand(pred.to_string()));
                    }
                    let folded = match op {
                        ArithOp::Mul => l.offset.checked_mul(r.offset),
                        ArithOp::Div => l.offset.checked_div(r.offset),
                        _ => l.offset.checked_rem(r.offset),
                    };
                    folded.map(Linear::constant).ok_or_else(|| overflow(pred))
                }
            }
        }
        PredicateExpr::Field(name) | PredicateExpr::Ident(name) => {
            Err(RejectReason::ForeignReference(name.clone()))
        }
        _ => Err(RejectReason::UnsupportedOperation(pred.to_string())),
    }
}

fn is_length_call(name: &str) -> bool {
    matches!(name, "len" | "length")
}

fn length_term(receiver: &PredicateExpr, whole: &PredicateExpr) -> Recognized<Linear> {
    match receiver {
        PredicateExpr::Value => Ok(Linear {
            coefficient: 1,
            offset: 0,
        }),
        PredicateExpr::Str(s) => Ok(Linear::constant(s.chars().count() as i128)),
        _ => Err(RejectReason::UnsupportedOperation(whole.to_string())),
    }
}

/// Region of `left op right` as a bound on the subject
fn comparison_region(
    op: CompareOp,
    left: &PredicateExpr,
    right: &PredicateExpr,
    negated: bool,
    subject: Subject,
    whole: &PredicateExpr,
) -> Recognized<Interval> {
    let op = if negated { op.negate() } else { op };
    let l = linear(left, subject)?;
    let r = linear(right, subject)?;

    // coefficient · s + offset  op  0
    let coefficient = l.coefficient - r.coefficient;
    let offset = l.offset.checked_sub(r.offset).ok_or_else(|| overflow(whole))?;

    let (op, bound) = match coefficient {
        0 => {
            return Ok(if op.holds(offset, 0) {
                Interval::top()
            } else {
                Interval::bottom()
            })
        }
        1 => (op, offset.checked_neg().ok_or_else(|| overflow(whole))?),
        -1 => (op.flip(), offset),
        _ => return Err(RejectReason::NonConstantOperand(whole.to_string())),
    };

    if op == CompareOp::NotEq {
        let shown = if negated {
            format!("!({})", whole)
        } else {
            whole.to_string()
        };
        return Err(RejectReason::NonConvex(shown));
    }
    Ok(Interval::top().refine(op, &Interval::constant(bound)))
}

/// Region of an integer predicate (`IntervalConjunction`)
pub(super) fn int_region(pred: &PredicateExpr, negated: bool) -> Recognized<Interval> {
    bound_region(pred, negated, Subject::Value)
}

/// Region of a text predicate as a length interval (`LengthConjunction`)
pub(super) fn length_region(pred: &PredicateExpr, negated: bool) -> Recognized<Interval> {
    bound_region(pred, negated, Subject::Length)
}

fn bound_region(pred: &PredicateExpr, negated: bool, subject: Subject) -> Recognized<Interval> {
    match pred {
        PredicateExpr::Bool(b) => Ok(if *b != negated {
            Interval::top()
        } else {
            Interval::bottom()
        }),
        PredicateExpr::Not(inner) => bound_region(inner, !negated, subject),
        PredicateExpr::And(p, q) if !negated => {
            Ok(bound_region(p, false, subject)?.meet(&bound_region(q, false, subject)?))
        }
        PredicateExpr::Or(p, q) if negated => {
            Ok(bound_region(p, true, subject)?.meet(&bound_region(q, true, subject)?))
        }
        PredicateExpr::And(..) | PredicateExpr::Or(..) => Err(RejectReason::Disjunction),
        PredicateExpr::Compare { op, left, right } => {
            comparison_region(*op, left, right, negated, subject, pred)
        }
        PredicateExpr::Call { name, args } if subject == Subject::Length => {
            let empty = match name.as_str() {
                "isEmpty" => true,
                "isNotEmpty" => false,
                _ => return Err(RejectReason::UnsupportedOperation(pred.to_string())),
            };
            if !matches!(args.as_slice(), [PredicateExpr::Value]) {
                return Err(RejectReason::UnsupportedOperation(pred.to_string()));
            }
            Ok(if empty != negated {
                Interval::constant(0)
            } else {
                Interval::at_least(1)
            })
        }
        PredicateExpr::Field(name) | PredicateExpr::Ident(name) => {
            Err(RejectReason::ForeignReference(name.clone()))
        }
        _ => Err(RejectReason::UnsupportedOperation(pred.to_string())),
    }
}

/// Region of a boolean predicate (`BooleanConstant`)
pub(super) fn bool_region(pred: &PredicateExpr, negated: bool) -> Recognized<BoolValue> {
    match pred {
        PredicateExpr::Value => Ok(BoolValue::from_bool(!negated)),
        PredicateExpr::Bool(b) => Ok(if *b != negated {
            BoolValue::Top
        } else {
            BoolValue::Bottom
        }),
        PredicateExpr::Not(inner) => bool_region(inner, !negated),
        PredicateExpr::And(p, q) if !negated => Ok(bool_region(p, false)?.meet(&bool_region(q, false)?)),
        PredicateExpr::Or(p, q) if negated => Ok(bool_region(p, true)?.meet(&bool_region(q, true)?)),
        PredicateExpr::And(..) | PredicateExpr::Or(..) => Err(RejectReason::Disjunction),
        PredicateExpr::Compare {
            op: op @ (CompareOp::Eq | CompareOp::NotEq),
            left,
            right,
        } => {
            let constant = match (left.as_ref(), right.as_ref()) {
                (PredicateExpr::Value, PredicateExpr::Bool(b))
                | (PredicateExpr::Bool(b), PredicateExpr::Value) => *b,
                (PredicateExpr::Field(name), _)
                | (PredicateExpr::Ident(name), _)
                | (_, PredicateExpr::Field(name))
                | (_, PredicateExpr::Ident(name)) => {
                    return Err(RejectReason::ForeignReference(name.clone()))
                }
                _ => return Err(RejectReason::NonConstantOperand(pred.to_string())),
            };
            let equal = (*op == CompareOp::Eq) != negated;
            Ok(BoolValue::from_bool(constant == equal))
        }
        PredicateExpr::Field(name) | PredicateExpr::Ident(name) => {
            Err(RejectReason::ForeignReference(name.clone()))
        }
        _ => Err(RejectReason::UnsupportedOperation(pred.to_string())),
    }
}
