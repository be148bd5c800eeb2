//! Control-flow analysis over IR functions
//!
//! - `ControlFlowGraph` - successors, predecessors, reachability, RPO
//! - `DominatorTree` - dominator sets, immediate dominators, frontiers
//! - `LoopInfo` - natural loops from back edges
//!
//! All tables are dense, indexed by block position, and recomputed wholesale
//! whenever the optimizer changes the block structure.

pub mod cfg;
pub mod dominance;
pub mod graph;
pub mod loops;

pub use cfg::ControlFlowGraph;
pub use dominance::DominatorTree;
pub use graph::{CfgDescription, CfgEdge, CfgNode, EdgeKind};
pub use loops::{LoopInfo, NaturalLoop};

use crate::error::IrError;
use crate::ir::IrFunction;

/// Per-function analysis facts
#[derive(Debug, Clone)]
pub struct FunctionAnalysis {
    pub cfg: ControlFlowGraph,
    pub dominators: DominatorTree,
    pub loops: LoopInfo,
}

impl FunctionAnalysis {
    pub fn compute(func: &IrFunction) -> Result<Self, IrError> {
        let cfg = ControlFlowGraph::build(func)?;
        let dominators = DominatorTree::compute(&cfg);
        let loops = LoopInfo::compute(&cfg, &dominators);
        Ok(Self {
            cfg,
            dominators,
            loops,
        })
    }

    /// Loop nesting depth of a block, 0 outside loops or for unknown ids
    pub fn loop_depth_of(&self, id: crate::ir::BlockId) -> usize {
        self.cfg
            .index_of(id)
            .map(|idx| self.loops.loop_depth(idx))
            .unwrap_or(0)
    }
}
