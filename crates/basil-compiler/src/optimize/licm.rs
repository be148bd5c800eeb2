//! Loop-Invariant Code Motion
//!
//! Hoists pure, non-trapping instructions whose operands are all available
//! before the loop into the loop's preheader.
//!
//! ## Preheaders
//!
//! A preheader is the single block outside the loop that jumps only to the
//! header. Loops without one get a new block placed before the header; edges
//! from outside the loop are redirected to it and header phis take one entry
//! from it (merging the outside entries with a phi in the preheader when
//! there were several).
//!
//! Loops sharing a header are treated as one loop. Inner loops are processed
//! first so that an instruction can move out through several levels.

use super::{Pass, PassOutcome, Tier};
use crate::analysis::FunctionAnalysis;
use crate::ir::{
    BasicBlock, BlockId, IrFunction, IrInstr, IrValue, Register, RegisterId, Terminator,
};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};

/// Loop-invariant code motion pass
pub struct LoopInvariantCodeMotion;

impl LoopInvariantCodeMotion {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoopInvariantCodeMotion {
    fn default() -> Self {
        Self::new()
    }
}

/// Header and member blocks of one loop, by block id
struct LoopBody {
    header: BlockId,
    blocks: FxHashSet<BlockId>,
}

fn loop_bodies(facts: &FunctionAnalysis) -> Vec<LoopBody> {
    let mut by_header: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for l in facts.loops.loops() {
        by_header
            .entry(l.header)
            .or_default()
            .extend(l.blocks.iter().copied());
    }
    let mut bodies: Vec<LoopBody> = by_header
        .into_iter()
        .map(|(header, blocks)| LoopBody {
            header: facts.cfg.block_id(header),
            blocks: blocks.into_iter().map(|b| facts.cfg.block_id(b)).collect(),
        })
        .collect();
    // innermost first
    bodies.sort_by_key(|b| b.blocks.len());
    bodies
}

/// Predecessors of the header that lie outside the loop
fn outside_preds(facts: &FunctionAnalysis, body: &LoopBody) -> Vec<BlockId> {
    facts
        .cfg
        .predecessor_ids(body.header)
        .into_iter()
        .filter(|p| !body.blocks.contains(p))
        .filter(|p| facts.cfg.index_of(*p).is_some_and(|i| facts.cfg.is_reachable(i)))
        .collect()
}

/// The existing preheader of a loop, if it has one
fn find_preheader(func: &IrFunction, facts: &FunctionAnalysis, body: &LoopBody) -> Option<BlockId> {
    match outside_preds(facts, body).as_slice() {
        [single] => {
            let block = func.get_block(*single)?;
            (block.successors() == [body.header]).then_some(*single)
        }
        _ => None,
    }
}

/// Create a preheader for `body`; returns false when the loop cannot get one
fn insert_preheader(func: &mut IrFunction, facts: &FunctionAnalysis, body: &LoopBody) -> bool {
    let outside = outside_preds(facts, body);
    if outside.is_empty() {
        return false;
    }
    let Some(position) = func.block_index(body.header) else {
        return false;
    };
    if position == 0 {
        return false;
    }

    let pre_id = func.next_block_id();
    let mut pre = BasicBlock::with_label(pre_id, "preheader");
    pre.set_terminator(Terminator::Jump(body.header));

    // outside entries of every header phi
    let split: Vec<(Register, Vec<(BlockId, IrValue)>)> = func
        .get_block(body.header)
        .map(|header| {
            header
                .phis()
                .filter_map(|instr| match instr {
                    IrInstr::Phi { dest, incoming } => Some((
                        dest.clone(),
                        incoming
                            .iter()
                            .filter(|(b, _)| outside.contains(b))
                            .cloned()
                            .collect(),
                    )),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let mut header_phis: Vec<(RegisterId, IrValue)> = Vec::with_capacity(split.len());
    for (dest, from_outside) in split {
        let value = match from_outside.as_slice() {
            [(_, value)] => value.clone(),
            _ => {
                let merged = match &dest.name {
                    Some(name) => func.new_named_register(dest.ty.clone(), name.clone()),
                    None => func.new_register(dest.ty.clone()),
                };
                pre.instructions.push(IrInstr::Phi {
                    dest: merged.clone(),
                    incoming: from_outside,
                });
                IrValue::Register(merged)
            }
        };
        header_phis.push((dest.id, value));
    }

    for (reg, value) in header_phis {
        let Some(header) = func.get_block_mut(body.header) else {
            break;
        };
        for instr in header.instructions.iter_mut() {
            if let IrInstr::Phi { dest, incoming } = instr {
                if dest.id != reg {
                    continue;
                }
                incoming.retain(|(b, _)| !outside.contains(b));
                incoming.push((pre_id, value.clone()));
            }
        }
    }

    for pred in &outside {
        if let Some(block) = func.get_block_mut(*pred) {
            block.terminator.retarget(body.header, pre_id);
        }
    }
    func.insert_block(position, pre);
    log::trace!("created preheader {} for loop at {}", pre_id, body.header);
    true
}

/// Hoist invariant instructions of `body` into `preheader`
fn hoist(func: &mut IrFunction, body: &LoopBody, preheader: BlockId) -> usize {
    let mut defined_in_loop: FxHashSet<RegisterId> = func
        .blocks
        .iter()
        .filter(|b| body.blocks.contains(&b.id))
        .flat_map(|b| b.instructions.iter())
        .filter_map(|i| i.dest().map(|d| d.id))
        .collect();

    let mut hoisted = Vec::new();
    loop {
        let mut moved = 0;
        for block in func.blocks.iter_mut() {
            if !body.blocks.contains(&block.id) {
                continue;
            }
            let mut kept = Vec::with_capacity(block.instructions.len());
            for instr in std::mem::take(&mut block.instructions) {
                if is_invariant(&instr, &defined_in_loop) {
                    if let Some(dest) = instr.dest() {
                        defined_in_loop.remove(&dest.id);
                    }
                    hoisted.push(instr);
                    moved += 1;
                } else {
                    kept.push(instr);
                }
            }
            block.instructions = kept;
        }
        if moved == 0 {
            break;
        }
    }

    let count = hoisted.len();
    if let Some(pre) = func.get_block_mut(preheader) {
        pre.instructions.extend(hoisted);
    }
    count
}

fn is_invariant(instr: &IrInstr, defined_in_loop: &FxHashSet<RegisterId>) -> bool {
    if instr.dest().is_none()
        || !instr.is_pure()
        || instr.may_trap()
        || instr.is_phi()
        || matches!(instr, IrInstr::Alloca { .. })
    {
        return false;
    }
    instr.operands().iter().all(|op| match op {
        IrValue::Constant(_) => true,
        IrValue::Register(r) => !defined_in_loop.contains(&r.id),
        IrValue::Variable(_) => false,
    })
}

impl Pass for LoopInvariantCodeMotion {
    fn name(&self) -> &str {
        "loop-invariant-code-motion"
    }

    fn tier(&self) -> Tier {
        Tier::Aggressive
    }

    fn requires_analysis(&self) -> bool {
        true
    }

    fn run(&self, func: &mut IrFunction, facts: Option<&FunctionAnalysis>) -> PassOutcome {
        let computed;
        let facts = match facts {
            Some(facts) => facts,
            None => match FunctionAnalysis::compute(func) {
                Ok(f) => {
                    computed = f;
                    &computed
                }
                Err(_) => return PassOutcome::unchanged(),
            },
        };
        if facts.loops.is_empty() {
            return PassOutcome::unchanged();
        }

        let mut created = 0;
        for body in loop_bodies(facts) {
            if find_preheader(func, facts, &body).is_none() && insert_preheader(func, facts, &body) {
                created += 1;
            }
        }

        let refreshed;
        let facts = if created > 0 {
            func.reorder_phi_incoming();
            match FunctionAnalysis::compute(func) {
                Ok(f) => {
                    refreshed = f;
                    &refreshed
                }
                Err(_) => return PassOutcome::structural(created),
            }
        } else {
            facts
        };

        let mut hoisted = 0;
        for body in loop_bodies(facts) {
            if let Some(pre) = find_preheader(func, facts, &body) {
                hoisted += hoist(func, &body, pre);
            }
        }

        PassOutcome {
            modifications: created + hoisted,
            cfg_changed: created > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, CompareOp, FunctionBuilder, IrConstant, IrType, Variable};

    /// A counting loop computing `n * 2` in its body. With `guarded`, the
    /// header is entered from two blocks, so it has no preheader.
    fn counting_loop(guarded: bool) -> (IrFunction, BlockId) {
        let n = Variable::param("n", IrType::Integer);
        let flag = Variable::param("flag", IrType::Boolean);
        let mut b = FunctionBuilder::new("Count", vec![n.clone(), flag.clone()], IrType::Integer);
        let side = b.create_block();
        let header = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();

        let limit = b.load_var(n);
        let entry = b.current_block();
        if guarded {
            let cond = b.load_var(flag);
            b.branch(cond, header, side);
        } else {
            b.jump(side);
        }
        b.switch_to_block(side);
        b.jump(header);

        b.switch_to_block(header);
        let i_dest = b.func_mut().new_register(IrType::Integer);
        let next = b.func_mut().new_register(IrType::Integer);
        let mut incoming = Vec::new();
        if guarded {
            incoming.push((entry, IrConstant::integer(0).into()));
        }
        incoming.push((side, IrConstant::integer(1).into()));
        incoming.push((body, next.clone().into()));
        b.func_mut()
            .get_block_mut(header)
            .unwrap()
            .add_instr(IrInstr::Phi {
                dest: i_dest.clone(),
                incoming,
            });
        let more = b.compare(CompareOp::Lt, i_dest.clone(), limit.clone());
        b.branch(more, body, exit);

        b.switch_to_block(body);
        let doubled = b.binary(BinaryOp::Mul, limit, IrConstant::integer(2));
        b.emit(IrInstr::Binary {
            dest: next,
            op: BinaryOp::Add,
            left: i_dest.clone().into(),
            right: doubled.into(),
        });
        b.jump(header);

        b.switch_to_block(exit);
        b.ret(Some(i_dest.into()));
        (b.finish().unwrap(), header)
    }

    fn run(func: &mut IrFunction) -> PassOutcome {
        let facts = FunctionAnalysis::compute(func).unwrap();
        LoopInvariantCodeMotion::new().run(func, Some(&facts))
    }

    #[test]
    fn test_hoists_into_existing_preheader() {
        let (mut func, header) = counting_loop(false);
        let outcome = run(&mut func);
        assert_eq!(outcome.modifications, 1);
        assert!(!outcome.cfg_changed);

        let pre = &func.blocks[1];
        assert_eq!(pre.successors(), vec![header]);
        assert!(matches!(
            pre.instructions.last(),
            Some(IrInstr::Binary {
                op: BinaryOp::Mul,
                ..
            })
        ));
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_creates_preheader_with_merged_phi() {
        let (mut func, header) = counting_loop(true);
        let blocks_before = func.block_count();
        let outcome = run(&mut func);
        assert!(outcome.cfg_changed);
        assert_eq!(outcome.modifications, 2);
        assert_eq!(func.block_count(), blocks_before + 1);

        let header_index = func.block_index(header).unwrap();
        let pre = &func.blocks[header_index - 1];
        assert_eq!(pre.label.as_deref(), Some("preheader"));
        // merged phi for the two outside entries, then the hoisted multiply
        assert_eq!(pre.phi_count(), 1);
        assert_eq!(pre.instructions.len(), 2);
        assert!(func.blocks[0].successors().contains(&pre.id));

        let header_block = func.get_block(header).unwrap();
        match header_block.phis().next() {
            Some(IrInstr::Phi { incoming, .. }) => {
                assert_eq!(incoming.len(), 2);
                assert_eq!(incoming[0].0, pre.id);
            }
            other => panic!("expected a header phi, got {:?}", other),
        }
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_loop_carried_values_stay() {
        let (mut func, _) = counting_loop(false);
        run(&mut func);
        // the induction update depends on the phi
        let second = run(&mut func);
        assert_eq!(second.modifications, 0);
    }
}
