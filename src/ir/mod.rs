//! # Analysis Input Model
//!
//! Everything the engine consumes from the external front end:
//!
//! - [`RefinementDecl`]: one refinement-kind declaration (underlying type plus
//!   predicate tree referencing only the underlying value)
//! - [`FunctionBody`]: basic blocks, branches and loop back-edges of one function,
//!   with construction sites embedded in its expressions as [`Expr::Construct`]
//!
//! All types derive `serde` so the front end can hand them over as JSON.

pub mod cfg;
pub mod decl;
pub mod expr;

pub use cfg::{BasicBlock, ControlFlowGraph, FunctionBody, Local, LocalType, Statement, Terminator};
pub use decl::{IntType, PredicateExpr, RefinementDecl, UnderlyingType};
pub use expr::{ArithOp, CompareOp, Expr, LogicOp, Sort, UnaryOp};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a refinement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KindId(pub u32);

/// Identity of a construction site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(pub u32);

/// Source position (1-based line and column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    /// Source file, if known
    #[serde(default)]
    pub file: Option<String>,
    /// Line number
    pub line: usize,
    /// Column number
    pub col: usize,
}

impl SourceLoc {
    /// Position without a file
    pub fn new(line: usize, col: usize) -> Self {
        Self {
            file: None,
            line,
            col,
        }
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site#{}", self.0)
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.col),
            None => write!(f, "{}:{}", self.line, self.col),
        }
    }
}
