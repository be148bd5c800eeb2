//! Dead Code Elimination (DCE)
//!
//! Removes instructions whose results are never used. An instruction is only
//! removed when it has no side effects and cannot trap; a phi that only feeds
//! itself counts as unused.

use super::{Pass, PassOutcome};
use crate::analysis::FunctionAnalysis;
use crate::ir::{IrFunction, IrInstr, RegisterId};
use rustc_hash::FxHashSet;

/// Dead code elimination pass
pub struct DeadCodeElimination;

impl DeadCodeElimination {
    pub fn new() -> Self {
        Self
    }

    /// Collect all used registers in the function
    fn collect_used_registers(&self, func: &IrFunction) -> FxHashSet<RegisterId> {
        let mut used = FxHashSet::default();

        for block in &func.blocks {
            for instr in &block.instructions {
                let own = instr.dest().map(|d| d.id);
                for operand in instr.operands() {
                    if let Some(reg) = operand.as_register() {
                        // loop phis may name themselves
                        if instr.is_phi() && Some(reg.id) == own {
                            continue;
                        }
                        used.insert(reg.id);
                    }
                }
            }

            for operand in block.terminator.operands() {
                if let Some(reg) = operand.as_register() {
                    used.insert(reg.id);
                }
            }
        }

        used
    }

    /// Remove dead instructions from all blocks, returning how many went
    fn remove_dead_instructions(&self, func: &mut IrFunction, used: &FxHashSet<RegisterId>) -> usize {
        let mut removed = 0;
        for block in &mut func.blocks {
            let before = block.instructions.len();
            block
                .instructions
                .retain(|instr| !is_removable(instr, used));
            removed += before - block.instructions.len();
        }
        removed
    }
}

impl Default for DeadCodeElimination {
    fn default() -> Self {
        Self::new()
    }
}

fn is_removable(instr: &IrInstr, used: &FxHashSet<RegisterId>) -> bool {
    match instr.dest() {
        Some(dest) => !used.contains(&dest.id) && !instr.has_side_effects() && !instr.may_trap(),
        None => false,
    }
}

impl Pass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dead-code-elimination"
    }

    fn run(&self, func: &mut IrFunction, _facts: Option<&FunctionAnalysis>) -> PassOutcome {
        let mut total = 0;
        // Iterate until no more changes (fixed-point)
        loop {
            let used = self.collect_used_registers(func);
            let removed = self.remove_dead_instructions(func, &used);
            if removed == 0 {
                break;
            }
            total += removed;
        }
        PassOutcome::changed(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, IrConstant, IrType, Terminator, Variable};

    fn run(func: &mut IrFunction) -> usize {
        DeadCodeElimination::new().run(func, None).modifications
    }

    #[test]
    fn test_removes_unused_chain() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Void);
        let a = b.const_int(1);
        let _sum = b.binary(BinaryOp::Add, a, IrConstant::integer(2));
        b.ret(None);
        let mut func = b.finish().unwrap();

        // the add goes first, then the constant it used
        assert_eq!(run(&mut func), 2);
        assert!(func.blocks[0].instructions.is_empty());
    }

    #[test]
    fn test_keeps_side_effects_and_traps() {
        let x = Variable::local("x", IrType::Integer);
        let mut b = FunctionBuilder::new("F", vec![], IrType::Void);
        b.add_local(x.clone());
        let a = b.const_int(10);
        b.assign(x, a.clone());
        let _q = b.binary(BinaryOp::IntDiv, a, IrConstant::integer(0));
        let _ = b.call("Print", vec![IrConstant::string("hi").into()], IrType::Void);
        b.ret(None);
        let mut func = b.finish().unwrap();

        assert_eq!(run(&mut func), 0);
        assert_eq!(func.blocks[0].instructions.len(), 4);
    }

    #[test]
    fn test_self_referencing_phi_removed() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Void);
        let header = b.create_block();
        let exit = b.create_block();
        let zero = b.const_int(0);
        b.jump(header);

        b.switch_to_block(header);
        let phi_dest = b.func_mut().new_register(IrType::Integer);
        b.func_mut()
            .get_block_mut(header)
            .unwrap()
            .add_instr(IrInstr::Phi {
                dest: phi_dest.clone(),
                incoming: vec![
                    (crate::ir::BlockId(0), zero.into()),
                    (header, phi_dest.clone().into()),
                ],
            });
        let cond = b.call("More", vec![], IrType::Boolean).unwrap();
        b.branch(cond, header, exit);

        b.switch_to_block(exit);
        b.terminate(Terminator::Return(None));
        let mut func = b.finish().unwrap();

        // phi, then the constant feeding it
        assert_eq!(run(&mut func), 2);
        assert!(func.get_block(header).unwrap().phis().next().is_none());
    }
}
