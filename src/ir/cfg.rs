//! # Function Bodies and Control Flow Graphs
//!
//! A [`FunctionBody`] is the front end's rendition of one function: typed locals,
//! basic blocks of statements, and a terminator per block. [`ControlFlowGraph`]
//! validates a body and recovers the edges, a reverse-postorder visiting order and
//! the loop back-edges the fixpoint engine widens at.

use super::{Expr, IntType, KindId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Declared type of a local or parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalType {
    /// Raw integer
    Int(IntType),
    /// Raw boolean
    Bool,
    /// Raw string
    Text,
    /// Instance of a refinement kind
    Refined(KindId),
    /// Anything else
    Opaque,
}

/// A typed local variable or parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    /// Variable name, unique within the body
    pub name: String,
    /// Declared type
    pub ty: LocalType,
}

impl Local {
    /// Create a local
    pub fn new(name: &str, ty: LocalType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// A statement inside a basic block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// `target = value`
    Assign {
        /// Written variable
        target: String,
        /// Assigned expression
        value: Expr,
    },
    /// Expression evaluated for its construction sites (result discarded)
    Eval(Expr),
    /// The variable is passed by reference to code the engine cannot see
    Escape(String),
}

impl Statement {
    /// `target = value`
    pub fn assign(target: &str, value: Expr) -> Self {
        Statement::Assign {
            target: target.to_string(),
            value,
        }
    }

    /// Expressions read by this statement
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Statement::Assign { value, .. } => Some(value),
            Statement::Eval(expr) => Some(expr),
            Statement::Escape(_) => None,
        }
    }
}

/// How control leaves a basic block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    /// Unconditional jump
    Goto(usize),
    /// Two-way branch on a boolean condition
    Branch {
        /// Branch condition
        cond: Expr,
        /// Successor when the condition holds
        then: usize,
        /// Successor when it does not
        otherwise: usize,
    },
    /// Function return
    Return(Option<Expr>),
    /// Control never leaves (throw, abort)
    Unreachable,
}

impl Terminator {
    /// Successor block ids in edge order
    pub fn successors(&self) -> Vec<usize> {
        match self {
            Terminator::Goto(target) => vec![*target],
            Terminator::Branch {
                then, otherwise, ..
            } => {
                if then == otherwise {
                    vec![*then]
                } else {
                    vec![*then, *otherwise]
                }
            }
            Terminator::Return(_) | Terminator::Unreachable => Vec::new(),
        }
    }
}

/// A basic block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Unique block ID
    pub id: usize,
    /// Straight-line statements
    pub statements: Vec<Statement>,
    /// Block exit
    pub terminator: Terminator,
}

impl BasicBlock {
    /// Create a block
    pub fn new(id: usize, statements: Vec<Statement>, terminator: Terminator) -> Self {
        Self {
            id,
            statements,
            terminator,
        }
    }
}

/// One function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionBody {
    /// Function name, for diagnostics
    pub name: String,
    /// Parameters, which hold values on entry
    pub params: Vec<Local>,
    /// Other locals, unassigned on entry
    #[serde(default)]
    pub locals: Vec<Local>,
    /// Basic blocks in any order
    pub blocks: Vec<BasicBlock>,
    /// Entry block id
    pub entry: usize,
}

impl FunctionBody {
    /// Declared type of a parameter or local
    pub fn local_type(&self, name: &str) -> Option<&LocalType> {
        self.params
            .iter()
            .chain(self.locals.iter())
            .find(|l| l.name == name)
            .map(|l| &l.ty)
    }

    /// Visit every construction node of the body, block by block
    pub fn for_each_construct<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        for block in &self.blocks {
            for stmt in &block.statements {
                if let Some(expr) = stmt.expr() {
                    expr.for_each_construct(f);
                }
            }
            match &block.terminator {
                Terminator::Branch { cond, .. } => cond.for_each_construct(f),
                Terminator::Return(Some(expr)) => expr.for_each_construct(f),
                _ => {}
            }
        }
    }

    /// Every construction-site id in the body
    pub fn construction_sites(&self) -> Vec<super::SiteId> {
        let mut sites = Vec::new();
        self.for_each_construct(&mut |e| {
            if let Expr::Construct { site, .. } = e {
                sites.push(*site);
            }
        });
        sites
    }
}

/// Control Flow Graph recovered from a [`FunctionBody`]
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    /// Entry block ID
    pub entry: usize,
    /// Successor block IDs per block
    successors: HashMap<usize, Vec<usize>>,
    /// Predecessor block IDs per block
    predecessors: HashMap<usize, Vec<usize>>,
    /// Reachable blocks in reverse postorder from the entry
    rpo: Vec<usize>,
    /// Edges closing a cycle in the DFS from the entry
    back_edges: HashSet<(usize, usize)>,
    /// Targets of back edges
    loop_headers: HashSet<usize>,
}

impl ControlFlowGraph {
    /// Validate `body` and build its CFG
    pub fn build(body: &FunctionBody) -> Result<Self> {
        let mut cfg = ControlFlowGraph {
            entry: body.entry,
            ..Default::default()
        };

        for block in &body.blocks {
            if cfg.successors.insert(block.id, Vec::new()).is_some() {
                return Err(Error::DuplicateBlock {
                    function: body.name.clone(),
                    block: block.id,
                });
            }
            cfg.predecessors.entry(block.id).or_default();
        }

        if !cfg.successors.contains_key(&body.entry) {
            return Err(Error::MissingEntry {
                function: body.name.clone(),
                entry: body.entry,
            });
        }

        for block in &body.blocks {
            for target in block.terminator.successors() {
                if !cfg.successors.contains_key(&target) {
                    return Err(Error::UnknownBlock {
                        function: body.name.clone(),
                        from: block.id,
                        target,
                    });
                }
                cfg.add_edge(block.id, target);
            }
            for stmt in &block.statements {
                let written = match stmt {
                    Statement::Assign { target, .. } => Some(target),
                    Statement::Escape(name) => Some(name),
                    Statement::Eval(_) => None,
                };
                if let Some(name) = written {
                    if body.local_type(name).is_none() {
                        return Err(Error::UndeclaredVariable {
                            function: body.name.clone(),
                            name: name.clone(),
                        });
                    }
                }
            }
        }

        cfg.compute_order();
        Ok(cfg)
    }

    /// Add an edge between blocks
    fn add_edge(&mut self, from: usize, to: usize) {
        let succs = self.successors.entry(from).or_default();
        if !succs.contains(&to) {
            succs.push(to);
        }
        let preds = self.predecessors.entry(to).or_default();
        if !preds.contains(&from) {
            preds.push(from);
        }
    }

    /// Depth-first search from the entry: postorder plus back-edge classification
    fn compute_order(&mut self) {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut order = Vec::new();
        let mut back_edges = HashSet::new();

        // (block, index of the next successor to explore)
        let mut stack = vec![(self.entry, 0usize)];
        visited.insert(self.entry);
        on_stack.insert(self.entry);

        while let Some((block_id, next)) = stack.pop() {
            let succs = self.successors(block_id);
            if let Some(&succ) = succs.get(next) {
                stack.push((block_id, next + 1));
                if on_stack.contains(&succ) {
                    back_edges.insert((block_id, succ));
                } else if visited.insert(succ) {
                    on_stack.insert(succ);
                    stack.push((succ, 0));
                }
            } else {
                on_stack.remove(&block_id);
                order.push(block_id);
            }
        }
        order.reverse();

        self.loop_headers = back_edges.iter().map(|&(_, to)| to).collect();
        self.back_edges = back_edges;
        self.rpo = order;
    }

    /// Successors of a block
    pub fn successors(&self, block: usize) -> &[usize] {
        self.successors.get(&block).map_or(&[], |s| s.as_slice())
    }

    /// Predecessors of a block
    pub fn predecessors(&self, block: usize) -> &[usize] {
        self.predecessors.get(&block).map_or(&[], |p| p.as_slice())
    }

    /// Reachable blocks in reverse postorder
    pub fn reverse_postorder(&self) -> &[usize] {
        &self.rpo
    }

    /// Whether `block` is reachable from the entry
    pub fn is_reachable(&self, block: usize) -> bool {
        self.rpo.contains(&block)
    }

    /// Check if this is a loop header (target of a back edge)
    pub fn is_loop_header(&self, block: usize) -> bool {
        self.loop_headers.contains(&block)
    }

    /// Whether `from -> to` closes a loop
    pub fn is_back_edge(&self, from: usize, to: usize) -> bool {
        self.back_edges.contains(&(from, to))
    }

    /// Number of loop headers
    pub fn loop_count(&self) -> usize {
        self.loop_headers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CompareOp, Expr};

    fn body(blocks: Vec<BasicBlock>) -> FunctionBody {
        FunctionBody {
            name: "f".to_string(),
            params: vec![Local::new("x", LocalType::Int(IntType::I32))],
            locals: vec![],
            blocks,
            entry: 0,
        }
    }

    #[test]
    fn test_linear_cfg() {
        let cfg = ControlFlowGraph::build(&body(vec![
            BasicBlock::new(0, vec![], Terminator::Goto(1)),
            BasicBlock::new(1, vec![], Terminator::Return(None)),
        ]))
        .unwrap();

        assert_eq!(cfg.reverse_postorder(), &[0, 1]);
        assert_eq!(cfg.predecessors(1), &[0]);
        assert_eq!(cfg.loop_count(), 0);
    }

    #[test]
    fn test_loop_header_detected() {
        // 0 -> 1; 1 -> {2, 3}; 2 -> 1
        let cond = Expr::compare(CompareOp::Lt, Expr::var("x"), Expr::Int(10));
        let cfg = ControlFlowGraph::build(&body(vec![
            BasicBlock::new(0, vec![], Terminator::Goto(1)),
            BasicBlock::new(
                1,
                vec![],
                Terminator::Branch {
                    cond,
                    then: 2,
                    otherwise: 3,
                },
            ),
            BasicBlock::new(2, vec![], Terminator::Goto(1)),
            BasicBlock::new(3, vec![], Terminator::Return(None)),
        ]))
        .unwrap();

        assert!(cfg.is_loop_header(1));
        assert!(cfg.is_back_edge(2, 1));
        assert!(!cfg.is_back_edge(0, 1));
        assert_eq!(cfg.reverse_postorder()[0], 0);
    }

    #[test]
    fn test_unreachable_block_excluded_from_order() {
        let cfg = ControlFlowGraph::build(&body(vec![
            BasicBlock::new(0, vec![], Terminator::Return(None)),
            BasicBlock::new(1, vec![], Terminator::Goto(0)),
        ]))
        .unwrap();

        assert!(cfg.is_reachable(0));
        assert!(!cfg.is_reachable(1));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let err = ControlFlowGraph::build(&body(vec![BasicBlock::new(
            0,
            vec![],
            Terminator::Goto(4),
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::UnknownBlock { target: 4, .. }));
    }

    #[test]
    fn test_undeclared_write_rejected() {
        let err = ControlFlowGraph::build(&body(vec![BasicBlock::new(
            0,
            vec![Statement::assign("y", Expr::Int(1))],
            Terminator::Return(None),
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::UndeclaredVariable { .. }));
    }

    #[test]
    fn test_long_chain_does_not_exhaust_stack() {
        let n = 100_000;
        let mut blocks: Vec<_> = (0..n)
            .map(|i| BasicBlock::new(i, vec![], Terminator::Goto(i + 1)))
            .collect();
        blocks.push(BasicBlock::new(n, vec![], Terminator::Goto(n / 2)));

        let cfg = ControlFlowGraph::build(&body(blocks)).unwrap();

        let rpo = cfg.reverse_postorder();
        assert_eq!(rpo.len(), n + 1);
        assert!(rpo.iter().copied().eq(0..=n));
        assert!(cfg.is_back_edge(n, n / 2));
        assert_eq!(cfg.loop_count(), 1);
    }

    #[test]
    fn test_nested_loops_classified() {
        // 0 -> 1; 1 -> {2, 4}; 2 -> {3, 1}; 3 -> 2; 4 return
        let cond = || Expr::compare(CompareOp::Lt, Expr::var("x"), Expr::Int(10));
        let branch = |then, otherwise| Terminator::Branch {
            cond: cond(),
            then,
            otherwise,
        };
        let cfg = ControlFlowGraph::build(&body(vec![
            BasicBlock::new(0, vec![], Terminator::Goto(1)),
            BasicBlock::new(1, vec![], branch(2, 4)),
            BasicBlock::new(2, vec![], branch(3, 1)),
            BasicBlock::new(3, vec![], Terminator::Goto(2)),
            BasicBlock::new(4, vec![], Terminator::Return(None)),
        ]))
        .unwrap();

        assert!(cfg.is_back_edge(2, 1));
        assert!(cfg.is_back_edge(3, 2));
        assert!(!cfg.is_back_edge(1, 2));
        assert_eq!(cfg.loop_count(), 2);
        assert_eq!(cfg.reverse_postorder(), &[0, 1, 4, 2, 3]);
    }
}
