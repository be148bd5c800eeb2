//! Control-Flow Simplification
//!
//! - Branches and switches on constants become jumps
//! - Branches whose targets coincide become jumps
//! - Blocks unreachable from the entry are removed
//! - A block reached only by a jump from its single predecessor is merged
//!   into that predecessor
//!
//! Phi entries are kept consistent with the new edges, and every phi's
//! incoming list is put back into predecessor order at the end.

use super::{Pass, PassOutcome};
use crate::analysis::FunctionAnalysis;
use crate::ir::{BlockId, IrConstant, IrFunction, IrInstr, IrValue, Terminator};

/// CFG simplification pass
pub struct SimplifyCfg;

impl SimplifyCfg {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite branches with a statically known target
    fn fold_branches(&self, func: &mut IrFunction) -> usize {
        // (block, new target, targets that lose the edge from block)
        let mut edits: Vec<(BlockId, BlockId, Vec<BlockId>)> = Vec::new();

        for block in &func.blocks {
            let Some(target) = static_target(&block.terminator) else {
                continue;
            };
            let dropped = block
                .terminator
                .successors()
                .into_iter()
                .filter(|s| *s != target)
                .collect();
            edits.push((block.id, target, dropped));
        }

        let count = edits.len();
        for (id, target, dropped) in edits {
            if let Some(block) = func.get_block_mut(id) {
                block.terminator = Terminator::Jump(target);
            }
            for succ in dropped {
                if let Some(block) = func.get_block_mut(succ) {
                    block.remove_phi_incoming(id);
                }
            }
        }
        count
    }

    /// Merge jump-only chains; returns the number of blocks merged away
    fn merge_blocks(&self, func: &mut IrFunction) -> usize {
        let mut merged = 0;
        while let Some((pred, succ)) = self.find_mergeable(func) {
            let Some(index) = func.block_index(succ) else {
                break;
            };
            let absorbed = func.blocks.remove(index);
            func.rebuild_index();

            // phis of the absorbed block have exactly one entry, from `pred`
            let mut body = Vec::with_capacity(absorbed.instructions.len());
            let mut replacements = Vec::new();
            for instr in absorbed.instructions {
                match instr {
                    IrInstr::Phi { dest, incoming } => {
                        if let Some((_, value)) = incoming.into_iter().next() {
                            replacements.push((dest.id, value));
                        }
                    }
                    other => body.push(other),
                }
            }
            let successors = absorbed.terminator.successors();

            if let Some(block) = func.get_block_mut(pred) {
                block.instructions.extend(body);
                block.terminator = absorbed.terminator;
            }
            for next in successors {
                if let Some(block) = func.get_block_mut(next) {
                    block.rename_phi_incoming(succ, pred);
                }
            }
            for (reg, value) in replacements {
                func.replace_uses(reg, &value);
            }
            merged += 1;
        }
        merged
    }

    fn find_mergeable(&self, func: &IrFunction) -> Option<(BlockId, BlockId)> {
        let entry = func.entry_id()?;
        let preds = func.predecessors();
        func.blocks.iter().find_map(|block| {
            let Terminator::Jump(succ) = block.terminator else {
                return None;
            };
            if succ == block.id || succ == entry {
                return None;
            }
            if preds.get(&succ).map(Vec::as_slice) != Some(&[block.id][..]) {
                return None;
            }
            let target = func.get_block(succ)?;
            let phis_ok = target.phis().all(|phi| match phi {
                IrInstr::Phi { incoming, .. } => {
                    incoming.len() == 1 && !matches!(incoming[0].1, IrValue::Variable(_))
                }
                _ => false,
            });
            phis_ok.then_some((block.id, succ))
        })
    }
}

impl Default for SimplifyCfg {
    fn default() -> Self {
        Self::new()
    }
}

/// The only block a terminator can transfer to, when it is a branch that
/// could be a jump
fn static_target(term: &Terminator) -> Option<BlockId> {
    match term {
        Terminator::Branch {
            cond,
            then_block,
            else_block,
        } => {
            if then_block == else_block {
                return Some(*then_block);
            }
            match cond.as_constant().and_then(IrConstant::as_bool) {
                Some(true) => Some(*then_block),
                Some(false) => Some(*else_block),
                None => None,
            }
        }
        Terminator::Switch {
            value,
            cases,
            default,
        } => {
            if cases.iter().all(|(_, target)| target == default) {
                return Some(*default);
            }
            let value = value.as_constant()?;
            let hit = cases
                .iter()
                .find(|(case, _)| case_matches(case, value))
                .map(|(_, target)| *target);
            Some(hit.unwrap_or(*default))
        }
        Terminator::Jump(_) | Terminator::Return(_) | Terminator::Unreachable => None,
    }
}

fn case_matches(case: &IrConstant, value: &IrConstant) -> bool {
    match (case.as_i64(), value.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => case.same_as(value),
    }
}

impl Pass for SimplifyCfg {
    fn name(&self) -> &str {
        "simplify-cfg"
    }

    fn run(&self, func: &mut IrFunction, _facts: Option<&FunctionAnalysis>) -> PassOutcome {
        if func.is_empty() {
            return PassOutcome::unchanged();
        }
        let mut modifications = self.fold_branches(func);
        modifications += func.remove_unreachable_blocks();
        modifications += self.merge_blocks(func);
        if modifications > 0 {
            func.reorder_phi_incoming();
        }
        PassOutcome::structural(modifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, IrType, Variable};

    #[test]
    fn test_constant_branch_folded() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let then_bb = b.create_block();
        let else_bb = b.create_block();
        let join = b.create_block();
        b.branch(IrConstant::Boolean(true), then_bb, else_bb);
        b.switch_to_block(then_bb);
        b.jump(join);
        b.switch_to_block(else_bb);
        b.jump(join);
        b.switch_to_block(join);
        let phi = b.phi(
            IrType::Integer,
            vec![
                (then_bb, IrConstant::integer(1).into()),
                (else_bb, IrConstant::integer(2).into()),
            ],
        );
        b.ret(Some(phi.into()));
        let mut func = b.finish().unwrap();

        let outcome = SimplifyCfg::new().run(&mut func, None);
        assert!(outcome.cfg_changed);
        // everything collapses into the entry
        assert_eq!(func.block_count(), 1);
        assert_eq!(
            func.blocks[0].terminator,
            Terminator::Return(Some(IrConstant::integer(1).into()))
        );
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_switch_on_constant() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Void);
        let one = b.create_block();
        let two = b.create_block();
        let other = b.create_block();
        b.terminate(Terminator::Switch {
            value: IrConstant::integer(2).into(),
            cases: vec![
                (IrConstant::integer(1), one),
                (IrConstant::long(2), two),
            ],
            default: other,
        });
        for bb in [one, two, other] {
            b.switch_to_block(bb);
            b.ret(None);
        }
        let mut func = b.finish().unwrap();

        SimplifyCfg::new().run(&mut func, None);
        assert_eq!(func.block_count(), 1);
        assert_eq!(func.blocks[0].terminator, Terminator::Return(None));
    }

    #[test]
    fn test_join_with_two_preds_kept() {
        let flag = Variable::param("flag", IrType::Boolean);
        let mut b = FunctionBuilder::new("F", vec![flag.clone()], IrType::Void);
        let left = b.create_block();
        let right = b.create_block();
        let join = b.create_block();
        let cond = b.load_var(flag);
        b.branch(cond, left, right);
        b.switch_to_block(left);
        b.jump(join);
        b.switch_to_block(right);
        b.jump(join);
        b.switch_to_block(join);
        b.ret(None);
        let mut func = b.finish().unwrap();

        let outcome = SimplifyCfg::new().run(&mut func, None);
        assert_eq!(outcome.modifications, 0);
        assert!(!outcome.cfg_changed);
        assert_eq!(func.block_count(), 4);
    }

    #[test]
    fn test_unreachable_block_removed() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Void);
        let dead = b.create_block();
        b.ret(None);
        b.switch_to_block(dead);
        b.ret(None);
        let mut func = b.func().clone();

        let outcome = SimplifyCfg::new().run(&mut func, None);
        assert_eq!(outcome.modifications, 1);
        assert!(func.get_block(dead).is_none());
    }
}
