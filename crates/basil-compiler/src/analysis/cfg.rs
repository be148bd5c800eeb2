//! Control-flow graph construction from IR terminators
//!
//! Blocks are numbered densely in function order (index 0 is the entry).
//! Successors come from terminator operands; predecessors are the transpose,
//! recorded in function block order and then terminator order. Phi incoming
//! lists follow that order.

use crate::error::IrError;
use crate::ir::{BlockId, IrFunction};
use rustc_hash::{FxHashMap, FxHashSet};

/// Control-flow graph of one function
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    /// Dense index -> block id
    ids: Vec<BlockId>,
    index: FxHashMap<BlockId, usize>,
    succs: Vec<Vec<usize>>,
    preds: Vec<Vec<usize>>,
    reachable: Vec<bool>,
    rpo: Vec<usize>,
}

impl ControlFlowGraph {
    /// Build the CFG, failing on an empty function or a dangling edge
    pub fn build(func: &IrFunction) -> Result<Self, IrError> {
        if func.blocks.is_empty() {
            return Err(IrError::EmptyFunction {
                function: func.name.clone(),
            });
        }

        let mut index = FxHashMap::default();
        let mut ids = Vec::with_capacity(func.blocks.len());
        for (idx, block) in func.blocks.iter().enumerate() {
            if index.insert(block.id, idx).is_some() {
                return Err(IrError::DuplicateBlock {
                    function: func.name.clone(),
                    block: block.id,
                });
            }
            ids.push(block.id);
        }

        let n = ids.len();
        let mut succs = vec![Vec::new(); n];
        let mut preds = vec![Vec::new(); n];
        for (idx, block) in func.blocks.iter().enumerate() {
            if !block.is_terminated() {
                return Err(IrError::MissingTerminator {
                    function: func.name.clone(),
                    block: block.id,
                });
            }
            for target in block.successors() {
                let Some(&t) = index.get(&target) else {
                    return Err(IrError::UnknownBlock {
                        function: func.name.clone(),
                        block: block.id,
                        target,
                    });
                };
                succs[idx].push(t);
                preds[t].push(idx);
            }
        }

        let rpo = compute_rpo(&succs);
        let mut reachable = vec![false; n];
        for &b in &rpo {
            reachable[b] = true;
        }

        log::trace!(
            "cfg for '{}': {} blocks, {} reachable",
            func.name,
            n,
            rpo.len()
        );

        Ok(Self {
            ids,
            index,
            succs,
            preds,
            reachable,
            rpo,
        })
    }

    /// Number of blocks (reachable or not)
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dense index of the entry block
    pub fn entry(&self) -> usize {
        0
    }

    pub fn block_id(&self, idx: usize) -> BlockId {
        self.ids[idx]
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.succs[idx]
    }

    /// Predecessors in recorded order
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.preds[idx]
    }

    /// Predecessor block ids of `id`, in recorded order
    pub fn predecessor_ids(&self, id: BlockId) -> Vec<BlockId> {
        self.index_of(id)
            .map(|idx| self.preds[idx].iter().map(|&p| self.ids[p]).collect())
            .unwrap_or_default()
    }

    pub fn successor_ids(&self, id: BlockId) -> Vec<BlockId> {
        self.index_of(id)
            .map(|idx| self.succs[idx].iter().map(|&s| self.ids[s]).collect())
            .unwrap_or_default()
    }

    pub fn is_reachable(&self, idx: usize) -> bool {
        self.reachable[idx]
    }

    /// Reachable blocks in reverse postorder (entry first)
    pub fn reverse_postorder(&self) -> &[usize] {
        &self.rpo
    }

    pub fn reachable_count(&self) -> usize {
        self.rpo.len()
    }

    /// Blocks that the entry cannot reach, in function order
    pub fn unreachable_blocks(&self) -> Vec<BlockId> {
        (0..self.len())
            .filter(|&i| !self.reachable[i])
            .map(|i| self.ids[i])
            .collect()
    }

    /// All edges `(from, to)` in function order
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.succs
            .iter()
            .enumerate()
            .flat_map(|(from, succs)| succs.iter().map(move |&to| (from, to)))
    }

    /// Blocks found walking predecessors from `from`, never entering `avoid`
    pub(crate) fn reaches_backwards(&self, from: usize, avoid: usize) -> FxHashSet<usize> {
        let mut seen = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(b) = stack.pop() {
            if b == avoid || !seen.insert(b) {
                continue;
            }
            stack.extend(self.preds[b].iter().copied());
        }
        seen
    }
}

/// Reverse postorder from the entry, visiting successors in terminator order
fn compute_rpo(succs: &[Vec<usize>]) -> Vec<usize> {
    let mut order = Vec::with_capacity(succs.len());
    let mut seen = vec![false; succs.len()];
    let mut stack = vec![(0usize, false)];

    while let Some((block, expanded)) = stack.pop() {
        if expanded {
            order.push(block);
            continue;
        }
        if seen[block] {
            continue;
        }
        seen[block] = true;
        stack.push((block, true));
        for &child in succs[block].iter().rev() {
            if !seen[child] {
                stack.push((child, false));
            }
        }
    }

    order.reverse();
    order
}
