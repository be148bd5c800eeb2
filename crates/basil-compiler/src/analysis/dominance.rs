//! Dominator tree and dominance frontiers
//!
//! Iterative set-based dominance over reverse postorder:
//! `Dom(entry) = {entry}`, `Dom(n) = {n} ∪ ⋂ Dom(p)` for reachable
//! predecessors `p`, repeated until no set changes. Unreachable blocks have no
//! dominator set and take no part in the tree.

use super::cfg::ControlFlowGraph;
use crate::ir::BlockId;
use std::collections::BTreeSet;

/// Dominance facts for one function, keyed by dense CFG index
#[derive(Debug, Clone)]
pub struct DominatorTree {
    ids: Vec<BlockId>,
    dom: Vec<Option<BTreeSet<usize>>>,
    idom: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    frontier: Vec<BTreeSet<usize>>,
}

impl DominatorTree {
    pub fn compute(cfg: &ControlFlowGraph) -> Self {
        let n = cfg.len();
        let rpo = cfg.reverse_postorder();
        let entry = cfg.entry();

        let all: BTreeSet<usize> = rpo.iter().copied().collect();
        let mut dom: Vec<Option<BTreeSet<usize>>> = (0..n)
            .map(|b| cfg.is_reachable(b).then(|| all.clone()))
            .collect();
        dom[entry] = Some(BTreeSet::from([entry]));

        let mut changed = true;
        let mut rounds = 0;
        while changed {
            changed = false;
            rounds += 1;
            for &b in rpo.iter().skip(1) {
                let mut new_set: Option<BTreeSet<usize>> = None;
                for &p in cfg.predecessors(b) {
                    let Some(pdom) = &dom[p] else { continue };
                    new_set = Some(match new_set {
                        None => pdom.clone(),
                        Some(acc) => acc.intersection(pdom).copied().collect(),
                    });
                }
                let mut new_set = new_set.unwrap_or_default();
                new_set.insert(b);
                if dom[b].as_ref() != Some(&new_set) {
                    dom[b] = Some(new_set);
                    changed = true;
                }
            }
        }
        log::trace!("dominator sets converged after {} rounds", rounds);

        // idom(n): the strict dominator of n that dominates no other strict
        // dominator of n
        let mut idom = vec![None; n];
        for &b in rpo.iter().skip(1) {
            let Some(set) = &dom[b] else { continue };
            let strict: Vec<usize> = set.iter().copied().filter(|&d| d != b).collect();
            idom[b] = strict.iter().copied().find(|&d| {
                strict.iter().all(|&m| {
                    m == d || !dom[m].as_ref().is_some_and(|mset| mset.contains(&d))
                })
            });
        }

        let mut children = vec![Vec::new(); n];
        for &b in rpo {
            if let Some(parent) = idom[b] {
                children[parent].push(b);
            }
        }
        for list in &mut children {
            list.sort_unstable();
        }

        let mut tree = Self {
            ids: (0..n).map(|i| cfg.block_id(i)).collect(),
            dom,
            idom,
            children,
            frontier: vec![BTreeSet::new(); n],
        };
        tree.compute_frontiers(cfg);
        tree
    }

    /// For each edge `n -> s`, walk up the tree from `n` while the runner does
    /// not strictly dominate `s`, adding `s` to each runner's frontier
    fn compute_frontiers(&mut self, cfg: &ControlFlowGraph) {
        for &b in cfg.reverse_postorder() {
            for &s in cfg.successors(b) {
                let mut runner = Some(b);
                while let Some(r) = runner {
                    if self.strictly_dominates(r, s) {
                        break;
                    }
                    self.frontier[r].insert(s);
                    runner = self.idom[r];
                }
            }
        }
    }

    /// Dominator set of a block (`None` when unreachable)
    pub fn dominators(&self, idx: usize) -> Option<&BTreeSet<usize>> {
        self.dom[idx].as_ref()
    }

    pub fn idom(&self, idx: usize) -> Option<usize> {
        self.idom[idx]
    }

    /// Children in the dominator tree, in function order
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// `a` dominates `b` (reflexive)
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        self.dom[b].as_ref().is_some_and(|set| set.contains(&a))
    }

    pub fn strictly_dominates(&self, a: usize, b: usize) -> bool {
        a != b && self.dominates(a, b)
    }

    pub fn dominance_frontier(&self, idx: usize) -> &BTreeSet<usize> {
        &self.frontier[idx]
    }

    /// Number of idom edges in the tree
    pub fn edge_count(&self) -> usize {
        self.idom.iter().filter(|i| i.is_some()).count()
    }

    /// Blocks with a dominator set but no immediate dominator
    pub fn roots(&self) -> Vec<usize> {
        (0..self.ids.len())
            .filter(|&i| self.dom[i].is_some() && self.idom[i].is_none())
            .collect()
    }

    pub fn idom_block(&self, idx: usize) -> Option<BlockId> {
        self.idom[idx].map(|i| self.ids[i])
    }

    /// Dominator set as block ids, ascending by dense index
    pub fn dominator_ids(&self, idx: usize) -> Vec<BlockId> {
        self.dom[idx]
            .iter()
            .flatten()
            .map(|&i| self.ids[i])
            .collect()
    }

    pub fn frontier_ids(&self, idx: usize) -> Vec<BlockId> {
        self.frontier[idx].iter().map(|&i| self.ids[i]).collect()
    }
}
