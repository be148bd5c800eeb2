//! Basic Blocks and Control Flow
//!
//! Basic blocks are sequences of instructions with a single entry point and a
//! single exit point (the terminator). Successor edges live only in the
//! terminator; predecessor lists are derived by the CFG analysis.

use super::instr::IrInstr;
use super::value::{IrConstant, IrValue, RegisterId};
use serde::{Deserialize, Serialize};

/// Basic block identifier, unique within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block: sequence of instructions with single entry and exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Optional label for debugging and generated label names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Instructions in this block (excluding terminator); phis come first
    pub instructions: Vec<IrInstr>,
    /// How this block exits (must be set before analysis)
    pub terminator: Terminator,
}

impl BasicBlock {
    /// Create a new empty, unterminated basic block
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            label: None,
            instructions: Vec::new(),
            terminator: Terminator::Unreachable,
        }
    }

    pub fn with_label(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(id)
        }
    }

    pub fn add_instr(&mut self, instr: IrInstr) {
        self.instructions.push(instr);
    }

    pub fn set_terminator(&mut self, term: Terminator) {
        self.terminator = term;
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator.successors()
    }

    /// Check if this block has a real terminator
    pub fn is_terminated(&self) -> bool {
        !matches!(self.terminator, Terminator::Unreachable)
    }

    /// Number of instructions (excluding terminator)
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Leading phi instructions
    pub fn phis(&self) -> impl Iterator<Item = &IrInstr> {
        self.instructions.iter().take_while(|i| i.is_phi())
    }

    pub fn phi_count(&self) -> usize {
        self.phis().count()
    }

    /// Replace every use of `reg` in instructions and terminator
    pub fn replace_uses(&mut self, reg: RegisterId, value: &IrValue) -> usize {
        let mut count = 0;
        for instr in &mut self.instructions {
            count += instr.replace_uses(reg, value);
        }
        count + self.terminator.replace_uses(reg, value)
    }

    /// Drop the phi entries coming from `pred`
    pub fn remove_phi_incoming(&mut self, pred: BlockId) {
        for instr in &mut self.instructions {
            if let IrInstr::Phi { incoming, .. } = instr {
                incoming.retain(|(block, _)| *block != pred);
            }
        }
    }

    /// Rename phi entries coming from `old` to come from `new`
    pub fn rename_phi_incoming(&mut self, old: BlockId, new: BlockId) {
        for instr in &mut self.instructions {
            if let IrInstr::Phi { incoming, .. } = instr {
                for (block, _) in incoming.iter_mut() {
                    if *block == old {
                        *block = new;
                    }
                }
            }
        }
    }
}

/// Control flow terminator (ends a basic block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    /// Unconditional jump to target block
    Jump(BlockId),

    /// Conditional branch on a Boolean value
    Branch {
        cond: IrValue,
        then_block: BlockId,
        else_block: BlockId,
    },

    /// Multi-way branch on a value
    Switch {
        value: IrValue,
        cases: Vec<(IrConstant, BlockId)>,
        default: BlockId,
    },

    /// Return from function with optional value
    Return(Option<IrValue>),

    /// Placeholder before the terminator is set; invalid in finished IR
    Unreachable,
}

impl Terminator {
    /// Successor blocks, in terminator order, without duplicates
    pub fn successors(&self) -> Vec<BlockId> {
        let raw: Vec<BlockId> = match self {
            Terminator::Jump(target) => vec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Switch { cases, default, .. } => {
                let mut succs: Vec<_> = cases.iter().map(|(_, block)| *block).collect();
                succs.push(*default);
                succs
            }
            Terminator::Return(_) | Terminator::Unreachable => vec![],
        };
        let mut succs = Vec::with_capacity(raw.len());
        for block in raw {
            if !succs.contains(&block) {
                succs.push(block);
            }
        }
        succs
    }

    pub fn operands(&self) -> Vec<&IrValue> {
        match self {
            Terminator::Branch { cond, .. } => vec![cond],
            Terminator::Switch { value, .. } => vec![value],
            Terminator::Return(Some(value)) => vec![value],
            Terminator::Jump(_) | Terminator::Return(None) | Terminator::Unreachable => vec![],
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut IrValue> {
        match self {
            Terminator::Branch { cond, .. } => vec![cond],
            Terminator::Switch { value, .. } => vec![value],
            Terminator::Return(Some(value)) => vec![value],
            Terminator::Jump(_) | Terminator::Return(None) | Terminator::Unreachable => vec![],
        }
    }

    pub fn replace_uses(&mut self, reg: RegisterId, value: &IrValue) -> usize {
        let mut count = 0;
        for operand in self.operands_mut() {
            if operand.is_register(reg) {
                *operand = value.clone();
                count += 1;
            }
        }
        count
    }

    /// Redirect every edge to `old` so that it targets `new`
    pub fn retarget(&mut self, old: BlockId, new: BlockId) {
        let fix = |b: &mut BlockId| {
            if *b == old {
                *b = new;
            }
        };
        match self {
            Terminator::Jump(target) => fix(target),
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => {
                fix(then_block);
                fix(else_block);
            }
            Terminator::Switch { cases, default, .. } => {
                for (_, block) in cases.iter_mut() {
                    fix(block);
                }
                fix(default);
            }
            Terminator::Return(_) | Terminator::Unreachable => {}
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Terminator::Jump(_) => "jump",
            Terminator::Branch { .. } => "branch",
            Terminator::Switch { .. } => "switch",
            Terminator::Return(_) => "return",
            Terminator::Unreachable => "unreachable",
        }
    }
}

impl std::fmt::Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminator::Jump(target) => write!(f, "jump {}", target),
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => write!(f, "branch {} ? {} : {}", cond, then_block, else_block),
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                write!(f, "switch {} [", value)?;
                for (val, block) in cases {
                    write!(f, "{} => {}, ", val, block)?;
                }
                write!(f, "_ => {}]", default)
            }
            Terminator::Return(None) => write!(f, "return"),
            Terminator::Return(Some(value)) => write!(f, "return {}", value),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::IrType;
    use crate::ir::value::Register;

    fn make_reg(id: u32) -> Register {
        Register::new(RegisterId::new(id), IrType::Boolean)
    }

    #[test]
    fn test_basic_block_new() {
        let block = BasicBlock::new(BlockId(0));
        assert_eq!(block.id, BlockId(0));
        assert!(block.instructions.is_empty());
        assert!(!block.is_terminated());
    }

    #[test]
    fn test_basic_block_with_label() {
        let block = BasicBlock::with_label(BlockId(1), "entry");
        assert_eq!(block.label.as_deref(), Some("entry"));
    }

    #[test]
    fn test_terminator_successors() {
        let jump = Terminator::Jump(BlockId(1));
        assert_eq!(jump.successors(), vec![BlockId(1)]);

        let branch = Terminator::Branch {
            cond: make_reg(0).into(),
            then_block: BlockId(1),
            else_block: BlockId(2),
        };
        assert_eq!(branch.successors(), vec![BlockId(1), BlockId(2)]);

        let same = Terminator::Branch {
            cond: make_reg(0).into(),
            then_block: BlockId(3),
            else_block: BlockId(3),
        };
        assert_eq!(same.successors(), vec![BlockId(3)]);

        let switch = Terminator::Switch {
            value: make_reg(0).into(),
            cases: vec![
                (IrConstant::integer(1), BlockId(4)),
                (IrConstant::integer(2), BlockId(5)),
            ],
            default: BlockId(6),
        };
        assert_eq!(switch.successors(), vec![BlockId(4), BlockId(5), BlockId(6)]);

        assert!(Terminator::Return(None).successors().is_empty());
    }

    #[test]
    fn test_terminator_retarget() {
        let mut branch = Terminator::Branch {
            cond: make_reg(0).into(),
            then_block: BlockId(1),
            else_block: BlockId(2),
        };
        branch.retarget(BlockId(2), BlockId(7));
        assert_eq!(branch.successors(), vec![BlockId(1), BlockId(7)]);
    }

    #[test]
    fn test_terminator_display() {
        assert_eq!(format!("{}", Terminator::Jump(BlockId(1))), "jump bb1");
        assert_eq!(format!("{}", Terminator::Return(None)), "return");
        assert_eq!(
            format!("{}", Terminator::Return(Some(make_reg(0).into()))),
            "return %0"
        );
    }

    #[test]
    fn test_phi_incoming_edits() {
        let mut block = BasicBlock::new(BlockId(3));
        block.add_instr(IrInstr::Phi {
            dest: Register::new(RegisterId(9), IrType::Integer),
            incoming: vec![
                (BlockId(1), IrConstant::integer(1).into()),
                (BlockId(2), IrConstant::integer(2).into()),
            ],
        });
        block.rename_phi_incoming(BlockId(1), BlockId(5));
        block.remove_phi_incoming(BlockId(2));
        match &block.instructions[0] {
            IrInstr::Phi { incoming, .. } => {
                assert_eq!(incoming.len(), 1);
                assert_eq!(incoming[0].0, BlockId(5));
            }
            other => panic!("expected phi, got {:?}", other),
        }
    }
}
