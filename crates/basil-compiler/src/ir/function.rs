//! IR Functions
//!
//! Functions in the IR contain parameters, local variables, and basic blocks.
//! The first block is the entry.

use super::block::{BasicBlock, BlockId};
use super::types::IrType;
use super::value::{Register, RegisterId, Variable};
use crate::error::IrError;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize};

/// An IR function
#[derive(Debug, Clone, Serialize)]
pub struct IrFunction {
    /// Function name
    pub name: String,
    /// Parameters, in declaration order
    pub params: Vec<Variable>,
    /// Return type (`Void` for subs)
    pub return_ty: IrType,
    /// Local variable declarations
    pub locals: Vec<Variable>,
    /// Basic blocks (in order); the first is the entry
    pub blocks: Vec<BasicBlock>,
    /// Owning class for methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub is_async: bool,
    pub is_iterator: bool,
    /// Documentation comment carried to generated code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Block lookup map for fast access
    #[serde(skip)]
    block_map: FxHashMap<BlockId, usize>,
    #[serde(skip)]
    next_register: u32,
    #[serde(skip)]
    next_block: u32,
}

/// Serialized form; the lookup tables are rebuilt on load
#[derive(Deserialize)]
struct RawFunction {
    name: String,
    #[serde(default)]
    params: Vec<Variable>,
    return_ty: IrType,
    #[serde(default)]
    locals: Vec<Variable>,
    #[serde(default)]
    blocks: Vec<BasicBlock>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    is_async: bool,
    #[serde(default)]
    is_iterator: bool,
    #[serde(default)]
    doc: Option<String>,
}

impl<'de> Deserialize<'de> for IrFunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawFunction::deserialize(deserializer)?;
        let mut func = IrFunction {
            name: raw.name,
            params: raw.params,
            return_ty: raw.return_ty,
            locals: raw.locals,
            blocks: raw.blocks,
            class: raw.class,
            is_async: raw.is_async,
            is_iterator: raw.is_iterator,
            doc: raw.doc,
            block_map: FxHashMap::default(),
            next_register: 0,
            next_block: 0,
        };
        func.rebuild_index();
        Ok(func)
    }
}

impl IrFunction {
    /// Create a new function
    pub fn new(name: impl Into<String>, params: Vec<Variable>, return_ty: IrType) -> Self {
        Self {
            name: name.into(),
            params,
            return_ty,
            locals: Vec::new(),
            blocks: Vec::new(),
            class: None,
            is_async: false,
            is_iterator: false,
            doc: None,
            block_map: FxHashMap::default(),
            next_register: 0,
            next_block: 0,
        }
    }

    /// Add a local variable
    pub fn add_local(&mut self, local: Variable) {
        self.locals.push(local);
    }

    /// Add a basic block and return its ID
    ///
    /// # Panics
    /// Panics if a block with the same id already exists.
    pub fn add_block(&mut self, block: BasicBlock) -> BlockId {
        let id = block.id;
        assert!(
            !self.block_map.contains_key(&id),
            "function '{}': block {} added twice",
            self.name,
            id
        );
        self.block_map.insert(id, self.blocks.len());
        self.next_block = self.next_block.max(id.0 + 1);
        if let Some(max) = block
            .instructions
            .iter()
            .filter_map(|i| i.dest())
            .map(|r| r.id.0 + 1)
            .max()
        {
            self.next_register = self.next_register.max(max);
        }
        self.blocks.push(block);
        id
    }

    /// Insert a block at `position` in block order
    ///
    /// # Panics
    /// Panics if the id is taken or `position` is the entry slot.
    pub fn insert_block(&mut self, position: usize, block: BasicBlock) -> BlockId {
        assert!(position > 0, "function '{}': cannot replace the entry block", self.name);
        let id = block.id;
        assert!(
            !self.block_map.contains_key(&id),
            "function '{}': block {} added twice",
            self.name,
            id
        );
        self.blocks.insert(position.min(self.blocks.len()), block);
        self.rebuild_index();
        id
    }

    /// Create and add a new empty block with a fresh id
    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.add_block(BasicBlock::new(id))
    }

    /// Id the next created block will get
    pub fn next_block_id(&self) -> BlockId {
        BlockId(self.next_block)
    }

    /// Allocate a fresh register of the given type
    pub fn new_register(&mut self, ty: IrType) -> Register {
        let id = RegisterId(self.next_register);
        self.next_register += 1;
        Register::new(id, ty)
    }

    /// Allocate a fresh register carrying a name hint
    pub fn new_named_register(&mut self, ty: IrType, name: impl Into<String>) -> Register {
        let mut reg = self.new_register(ty);
        reg.name = Some(name.into());
        reg
    }

    /// Get a block by ID
    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.block_map.get(&id).map(|&idx| &self.blocks[idx])
    }

    /// Get a mutable block by ID
    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.block_map
            .get(&id)
            .copied()
            .map(|idx| &mut self.blocks[idx])
    }

    /// Position of a block in `blocks`
    pub fn block_index(&self, id: BlockId) -> Option<usize> {
        self.block_map.get(&id).copied()
    }

    /// Get the entry block
    pub fn entry(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    pub fn entry_id(&self) -> Option<BlockId> {
        self.entry().map(|b| b.id)
    }

    /// Get all block IDs in order
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.iter().map(|b| b.id)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Compute the total number of instructions across all blocks
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    /// Rebuild the block lookup map and id counters after `blocks` was
    /// edited directly
    pub fn rebuild_index(&mut self) {
        self.block_map.clear();
        for (idx, block) in self.blocks.iter().enumerate() {
            self.block_map.insert(block.id, idx);
        }
        self.next_block = self.blocks.iter().map(|b| b.id.0 + 1).max().unwrap_or(0);
        let max_reg = self
            .blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .filter_map(|i| i.dest())
            .map(|r| r.id.0 + 1)
            .max()
            .unwrap_or(0);
        self.next_register = self.next_register.max(max_reg);
    }

    /// Predecessors of every block, in recorded order: function block order,
    /// then terminator order within each predecessor
    pub fn predecessors(&self) -> FxHashMap<BlockId, Vec<BlockId>> {
        let mut preds: FxHashMap<BlockId, Vec<BlockId>> =
            self.blocks.iter().map(|b| (b.id, Vec::new())).collect();
        for block in &self.blocks {
            for succ in block.successors() {
                if let Some(list) = preds.get_mut(&succ) {
                    list.push(block.id);
                }
            }
        }
        preds
    }

    /// Sort every phi's incoming list into recorded predecessor order; needed
    /// after edits that move blocks or edges
    pub fn reorder_phi_incoming(&mut self) {
        let preds = self.predecessors();
        for block in &mut self.blocks {
            let Some(order) = preds.get(&block.id) else {
                continue;
            };
            for instr in &mut block.instructions {
                if let super::instr::IrInstr::Phi { incoming, .. } = instr {
                    incoming.sort_by_key(|(pred, _)| {
                        order.iter().position(|p| p == pred).unwrap_or(usize::MAX)
                    });
                }
            }
        }
    }

    /// Replace every use of `reg` across the function
    pub fn replace_uses(&mut self, reg: RegisterId, value: &super::value::IrValue) -> usize {
        self.blocks
            .iter_mut()
            .map(|b| b.replace_uses(reg, value))
            .sum()
    }

    /// Number of uses of each register
    pub fn use_counts(&self) -> FxHashMap<RegisterId, usize> {
        let mut counts = FxHashMap::default();
        for block in &self.blocks {
            let operands = block
                .instructions
                .iter()
                .flat_map(|i| i.operands())
                .chain(block.terminator.operands());
            for operand in operands {
                if let Some(reg) = operand.as_register() {
                    *counts.entry(reg.id).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Blocks reachable from the entry
    pub fn reachable_blocks(&self) -> FxHashSet<BlockId> {
        let mut seen = FxHashSet::default();
        let Some(entry) = self.entry_id() else {
            return seen;
        };
        let mut stack = vec![entry];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(block) = self.get_block(id) {
                stack.extend(block.successors());
            }
        }
        seen
    }

    /// Remove the given blocks, dropping phi entries that came from them
    pub fn remove_blocks(&mut self, dead: &FxHashSet<BlockId>) -> usize {
        if dead.is_empty() {
            return 0;
        }
        let before = self.blocks.len();
        self.blocks.retain(|b| !dead.contains(&b.id));
        for block in &mut self.blocks {
            for &id in dead {
                block.remove_phi_incoming(id);
            }
        }
        self.rebuild_index();
        before - self.blocks.len()
    }

    /// Remove every block not reachable from the entry
    pub fn remove_unreachable_blocks(&mut self) -> usize {
        let reachable = self.reachable_blocks();
        let dead: FxHashSet<BlockId> = self
            .block_ids()
            .filter(|id| !reachable.contains(id))
            .collect();
        self.remove_blocks(&dead)
    }

    /// All structural violations, in block order
    pub fn errors(&self) -> Vec<IrError> {
        let mut errors = Vec::new();
        if self.blocks.is_empty() {
            errors.push(IrError::EmptyFunction {
                function: self.name.clone(),
            });
            return errors;
        }

        let mut seen_blocks = FxHashSet::default();
        for block in &self.blocks {
            if !seen_blocks.insert(block.id) {
                errors.push(IrError::DuplicateBlock {
                    function: self.name.clone(),
                    block: block.id,
                });
            }
        }

        let preds = self.predecessors();
        let mut defined = FxHashSet::default();
        for block in &self.blocks {
            if !block.is_terminated() {
                errors.push(IrError::MissingTerminator {
                    function: self.name.clone(),
                    block: block.id,
                });
            }
            for succ in block.successors() {
                if !seen_blocks.contains(&succ) {
                    errors.push(IrError::UnknownBlock {
                        function: self.name.clone(),
                        block: block.id,
                        target: succ,
                    });
                }
            }

            let mut past_phis = false;
            for instr in &block.instructions {
                if let Some(dest) = instr.dest() {
                    if !defined.insert(dest.id) {
                        errors.push(IrError::DuplicateRegister {
                            function: self.name.clone(),
                            register: dest.id,
                        });
                    }
                }
                let super::instr::IrInstr::Phi { dest, incoming } = instr else {
                    past_phis = true;
                    continue;
                };
                if past_phis {
                    errors.push(IrError::MisplacedPhi {
                        function: self.name.clone(),
                        block: block.id,
                        register: dest.id,
                    });
                    continue;
                }
                let expected = preds.get(&block.id).map(Vec::as_slice).unwrap_or(&[]);
                if incoming.len() != expected.len() {
                    errors.push(IrError::PhiArity {
                        function: self.name.clone(),
                        block: block.id,
                        register: dest.id,
                        expected: expected.len(),
                        found: incoming.len(),
                    });
                } else if incoming.iter().map(|(b, _)| b).ne(expected.iter()) {
                    errors.push(IrError::PhiOrder {
                        function: self.name.clone(),
                        block: block.id,
                        register: dest.id,
                    });
                }
            }
        }
        errors
    }

    /// Validate the function structure, reporting the first violation
    pub fn validate(&self) -> Result<(), IrError> {
        match self.errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validate and additionally reject blocks unreachable from the entry
    pub fn check_codegen_ready(&self) -> Result<(), IrError> {
        self.validate()?;
        let reachable = self.reachable_blocks();
        match self.blocks.iter().find(|b| !reachable.contains(&b.id)) {
            Some(block) => Err(IrError::UnreachableBlock {
                function: self.name.clone(),
                block: block.id,
            }),
            None => Ok(()),
        }
    }
}
