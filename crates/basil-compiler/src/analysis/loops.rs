//! Natural loop detection
//!
//! A back edge `n -> h` exists when `h` dominates `n`. Its natural loop is `h`
//! plus every block that reaches `n` backwards without passing through `h`.
//! One record per back edge; loops sharing a header are not merged.

use super::cfg::ControlFlowGraph;
use super::dominance::DominatorTree;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalLoop {
    /// Dense index of the loop header
    pub header: usize,
    /// Source of the back edge
    pub latch: usize,
    /// Member blocks, header and latch included
    pub blocks: BTreeSet<usize>,
}

impl NaturalLoop {
    pub fn contains(&self, idx: usize) -> bool {
        self.blocks.contains(&idx)
    }
}

/// All natural loops of a function
#[derive(Debug, Clone, Default)]
pub struct LoopInfo {
    loops: Vec<NaturalLoop>,
}

impl LoopInfo {
    pub fn compute(cfg: &ControlFlowGraph, dom: &DominatorTree) -> Self {
        let mut loops = Vec::new();
        for &latch in cfg.reverse_postorder() {
            for &header in cfg.successors(latch) {
                if !dom.dominates(header, latch) {
                    continue;
                }
                let mut blocks: BTreeSet<usize> = cfg
                    .reaches_backwards(latch, header)
                    .into_iter()
                    .filter(|&b| cfg.is_reachable(b))
                    .collect();
                blocks.insert(header);
                loops.push(NaturalLoop {
                    header,
                    latch,
                    blocks,
                });
            }
        }
        loops.sort_by_key(|l| (l.header, l.latch));
        log::trace!("found {} natural loops", loops.len());
        Self { loops }
    }

    pub fn loops(&self) -> &[NaturalLoop] {
        &self.loops
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Back edges `(latch, header)`
    pub fn back_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.loops.iter().map(|l| (l.latch, l.header))
    }

    pub fn is_back_edge(&self, from: usize, to: usize) -> bool {
        self.loops.iter().any(|l| l.latch == from && l.header == to)
    }

    /// Loops whose body includes `idx`
    pub fn loops_containing(&self, idx: usize) -> impl Iterator<Item = &NaturalLoop> {
        self.loops.iter().filter(move |l| l.contains(idx))
    }

    /// Number of distinct loop headers whose loops contain `idx`
    pub fn loop_depth(&self, idx: usize) -> usize {
        self.loops_containing(idx)
            .map(|l| l.header)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_header(&self, idx: usize) -> bool {
        self.loops.iter().any(|l| l.header == idx)
    }
}
