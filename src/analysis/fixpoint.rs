//! # Fixpoint Iteration
//!
//! Worklist iteration over the CFG in reverse postorder:
//!
//! 1. **Ascending phase**: block in-states grow by join; at loop headers the
//!    first `widening_delay` visits join, later visits widen. A header visited
//!    more than `max_widening_iterations` times forces every still-changing
//!    variable to the top of its declared type.
//! 2. **Descending phase**: `narrowing_passes` sweeps in reverse postorder
//!    recompute every in-state from its predecessors and narrow loop headers.
//! 3. **Collection**: one final sweep records the state at every construction site.
//!
//! Branch refinement is applied per edge, so a loop exit edge refines the
//! already-widened header state.

use super::{AbstractState, ConstructionSite, SafeguardTrip, Transfer};
use crate::domain::{AbstractValue, DomainRegistry, Lattice};
use crate::engine::AnalysisOptions;
use crate::ir::{BasicBlock, ControlFlowGraph, Expr, FunctionBody, Terminator};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Fixpoint solver state for one body
pub(super) struct Fixpoint<'a> {
    body: &'a FunctionBody,
    cfg: &'a ControlFlowGraph,
    transfer: Transfer<'a>,
    registry: &'a DomainRegistry,
    options: &'a AnalysisOptions,
    blocks: HashMap<usize, &'a BasicBlock>,
    /// In-state per visited block
    in_states: HashMap<usize, AbstractState>,
    /// State flowing along each edge
    edges: HashMap<(usize, usize), AbstractState>,
    /// Visits per loop header
    header_visits: HashMap<usize, usize>,
    /// Total block visits
    iterations: usize,
    trips: Vec<SafeguardTrip>,
}

impl<'a> Fixpoint<'a> {
    pub(super) fn new(
        body: &'a FunctionBody,
        cfg: &'a ControlFlowGraph,
        registry: &'a DomainRegistry,
        options: &'a AnalysisOptions,
    ) -> Self {
        Self {
            body,
            cfg,
            transfer: Transfer::new(body, registry, options),
            registry,
            options,
            blocks: body.blocks.iter().map(|b| (b.id, b)).collect(),
            in_states: HashMap::new(),
            edges: HashMap::new(),
            header_visits: HashMap::new(),
            iterations: 0,
            trips: Vec::new(),
        }
    }

    /// Run all phases
    pub(super) fn solve(mut self) -> Solution {
        self.ascend();
        for _ in 0..self.options.narrowing_passes {
            if !self.descend() {
                break;
            }
        }
        let sites = self.collect_sites();

        let block_states = self
            .cfg
            .reverse_postorder()
            .iter()
            .map(|&id| (id, self.in_state(id)))
            .collect();

        Solution {
            block_states,
            sites,
            iterations: self.iterations,
            trips: self.trips,
            header_visits: self.header_visits,
        }
    }

    fn in_state(&self, block: usize) -> AbstractState {
        self.in_states
            .get(&block)
            .cloned()
            .unwrap_or_else(AbstractState::unreachable)
    }

    /// Join of the states flowing into `block` along every incoming edge
    fn incoming(&self, block: usize) -> AbstractState {
        let mut joined = if block == self.cfg.entry {
            self.transfer.entry_state()
        } else {
            AbstractState::unreachable()
        };
        for &pred in self.cfg.predecessors(block) {
            if let Some(edge) = self.edges.get(&(pred, block)) {
                joined = joined.join(edge);
            }
        }
        joined
    }

    /// Run a block from its in-state and update its outgoing edges.
    /// Returns the successors whose incoming edge changed.
    fn run_block(&mut self, id: usize) -> Vec<usize> {
        let Some(block) = self.blocks.get(&id).copied() else {
            return Vec::new();
        };
        let mut state = self.in_state(id);
        for stmt in &block.statements {
            self.transfer.apply(stmt, &mut state);
        }
        tracing::trace!(function = %self.body.name, block = id, out = %state, "block transfer");

        let outgoing: Vec<(usize, AbstractState)> = match &block.terminator {
            Terminator::Goto(target) => vec![(*target, state)],
            Terminator::Branch {
                cond,
                then,
                otherwise,
            } => {
                if self.transfer.eval(cond, &state).is_bottom() {
                    state.mark_unreachable();
                }
                if then == otherwise {
                    vec![(*then, state)]
                } else {
                    vec![
                        (*then, self.transfer.assume(cond, true, &state)),
                        (*otherwise, self.transfer.assume(cond, false, &state)),
                    ]
                }
            }
            Terminator::Return(_) | Terminator::Unreachable => Vec::new(),
        };

        let mut changed = Vec::new();
        for (target, edge_state) in outgoing {
            if self.edges.get(&(id, target)) != Some(&edge_state) {
                self.edges.insert((id, target), edge_state);
                changed.push(target);
            }
        }
        changed
    }

    fn ascend(&mut self) {
        let order: HashMap<usize, usize> = self
            .cfg
            .reverse_postorder()
            .iter()
            .enumerate()
            .map(|(i, &b)| (b, i))
            .collect();
        let mut worklist: BTreeSet<(usize, usize)> = BTreeSet::new();

        self.in_states.insert(self.cfg.entry, self.transfer.entry_state());
        worklist.insert((0, self.cfg.entry));

        while let Some((_, id)) = worklist.pop_first() {
            self.iterations += 1;
            for succ in self.run_block(id) {
                if self.update_in_state(succ) {
                    if let Some(&rank) = order.get(&succ) {
                        worklist.insert((rank, succ));
                    }
                }
            }
        }

        for (&header, &visits) in &self.header_visits {
            tracing::debug!(
                function = %self.body.name,
                header,
                visits,
                "loop header stabilized"
            );
        }
    }

    /// Recompute the in-state of `block` from its incoming edges. Returns
    /// whether it changed.
    fn update_in_state(&mut self, block: usize) -> bool {
        let new = self.incoming(block);
        let old = self.in_state(block);

        let next = if self.cfg.is_loop_header(block) {
            let visits = {
                let v = self.header_visits.entry(block).or_insert(0);
                *v += 1;
                *v
            };
            let merged = if visits > self.options.widening_delay {
                old.widen(&new, self.registry.thresholds())
            } else {
                old.join(&new)
            };
            if visits > self.options.max_widening_iterations {
                self.force_top(block, visits, &old, merged)
            } else {
                merged
            }
        } else {
            new
        };

        if next == old {
            return false;
        }
        self.in_states.insert(block, next);
        true
    }

    /// Iteration safeguard: every variable still changing at `header` goes to
    /// the top of its declared type
    fn force_top(
        &mut self,
        header: usize,
        visits: usize,
        old: &AbstractState,
        merged: AbstractState,
    ) -> AbstractState {
        let changing = old.changed_vars(&merged);
        if changing.is_empty() {
            return merged;
        }
        let mut forced = merged;
        for name in &changing {
            let top = self
                .body
                .local_type(name)
                .map_or(AbstractValue::Top, |ty| {
                    self.transfer.declared_top(ty)
                });
            forced.set(name, top);
        }

        tracing::warn!(
            function = %self.body.name,
            header,
            visits,
            forced = ?changing,
            "fixpoint iteration bound exceeded; forcing changing values to top"
        );
        match self.trips.iter_mut().find(|t| t.block == header) {
            Some(trip) => {
                trip.visits = visits;
                for name in changing {
                    if !trip.forced.contains(&name) {
                        trip.forced.push(name);
                    }
                }
            }
            None => self.trips.push(SafeguardTrip {
                block: header,
                visits,
                forced: changing,
            }),
        }
        forced
    }

    /// One descending sweep. Returns whether any in-state changed.
    fn descend(&mut self) -> bool {
        let order = self.cfg.reverse_postorder().to_vec();
        let mut changed = false;
        for id in order {
            let new = self.incoming(id);
            let old = self.in_state(id);
            let next = if self.cfg.is_loop_header(id) {
                old.narrow(&new)
            } else {
                new
            };
            if next != old {
                changed = true;
                self.in_states.insert(id, next);
            }
            self.iterations += 1;
            self.run_block(id);
        }
        changed
    }

    /// Record the state at every construction site, reachable or not
    fn collect_sites(&self) -> Vec<ConstructionSite> {
        let mut sites = Vec::new();
        for &id in self.cfg.reverse_postorder() {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            let mut state = self.in_state(id);
            for stmt in &block.statements {
                self.transfer.apply_in(stmt, &mut state, Some(&mut sites));
            }
            match &block.terminator {
                Terminator::Branch { cond, .. } => {
                    self.transfer.eval_in(cond, &state, Some(&mut sites));
                }
                Terminator::Return(Some(expr)) => {
                    self.transfer.eval_in(expr, &state, Some(&mut sites));
                }
                _ => {}
            }
        }

        // sites never evaluated above sit in dead code
        let seen: BTreeSet<_> = sites.iter().map(|s| s.site).collect();
        let mut missing = Vec::new();
        self.body.for_each_construct(&mut |expr| {
            if let Expr::Construct {
                site,
                kind,
                arg,
                loc,
            } = expr
            {
                if !seen.contains(site) {
                    missing.push(ConstructionSite::unreachable(
                        *site,
                        *kind,
                        &self.body.name,
                        arg,
                        loc.clone(),
                    ));
                }
            }
        });
        sites.extend(missing);
        sites.sort_by_key(|s| s.site);
        sites
    }
}

/// Result of solving one body
pub(super) struct Solution {
    pub(super) block_states: BTreeMap<usize, AbstractState>,
    pub(super) sites: Vec<ConstructionSite>,
    pub(super) iterations: usize,
    pub(super) trips: Vec<SafeguardTrip>,
    pub(super) header_visits: HashMap<usize, usize>,
}
