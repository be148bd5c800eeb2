//! Phi Simplification
//!
//! A phi whose incoming values are all the same value (ignoring entries that
//! name the phi itself) is replaced by that value.
//!
//! ```text
//! bb3:
//!   %5: Integer = phi [bb1: %2, bb2: %2]
//!   ret %5
//! ```
//!
//! becomes `ret %2`.

use super::{Pass, PassOutcome};
use crate::analysis::FunctionAnalysis;
use crate::ir::{IrFunction, IrInstr, IrValue, RegisterId};

/// Phi simplification pass
pub struct PhiSimplification;

impl PhiSimplification {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PhiSimplification {
    fn default() -> Self {
        Self::new()
    }
}

/// The single value a phi merges, if there is one
fn unique_incoming(dest: RegisterId, incoming: &[(crate::ir::BlockId, IrValue)]) -> Option<IrValue> {
    let mut unique: Option<&IrValue> = None;
    for (_, value) in incoming {
        if value.is_register(dest) {
            continue;
        }
        match unique {
            None => unique = Some(value),
            Some(seen) if seen.same_as(value) => {}
            Some(_) => return None,
        }
    }
    // variables may change between the predecessors and the phi
    unique
        .filter(|v| !matches!(v, IrValue::Variable(_)))
        .cloned()
}

impl Pass for PhiSimplification {
    fn name(&self) -> &str {
        "phi-simplification"
    }

    fn run(&self, func: &mut IrFunction, _facts: Option<&FunctionAnalysis>) -> PassOutcome {
        let mut modifications = 0;
        loop {
            let mut found = None;
            'search: for block in &func.blocks {
                for instr in block.phis() {
                    if let IrInstr::Phi { dest, incoming } = instr {
                        if let Some(value) = unique_incoming(dest.id, incoming) {
                            found = Some((block.id, dest.id, value));
                            break 'search;
                        }
                    }
                }
            }

            let Some((block_id, reg, value)) = found else {
                break;
            };
            if let Some(block) = func.get_block_mut(block_id) {
                block
                    .instructions
                    .retain(|i| !(i.is_phi() && i.dest().map(|d| d.id) == Some(reg)));
            }
            func.replace_uses(reg, &value);
            modifications += 1;
        }
        PassOutcome::changed(modifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, IrConstant, IrType, Terminator, Variable};

    #[test]
    fn test_identical_incoming_replaced() {
        let flag = Variable::param("flag", IrType::Boolean);
        let mut b = FunctionBuilder::new("F", vec![flag.clone()], IrType::Integer);
        let left = b.create_block();
        let right = b.create_block();
        let join = b.create_block();
        let cond = b.load_var(flag);
        let v = b.const_int(7);
        b.branch(cond, left, right);
        b.switch_to_block(left);
        b.jump(join);
        b.switch_to_block(right);
        b.jump(join);
        b.switch_to_block(join);
        let phi = b.phi(
            IrType::Integer,
            vec![(left, v.clone().into()), (right, v.clone().into())],
        );
        b.ret(Some(phi.into()));
        let mut func = b.finish().unwrap();

        let outcome = PhiSimplification::new().run(&mut func, None);
        assert_eq!(outcome.modifications, 1);
        let join_block = func.get_block(join).unwrap();
        assert_eq!(join_block.phi_count(), 0);
        assert_eq!(join_block.terminator, Terminator::Return(Some(v.into())));
    }

    #[test]
    fn test_distinct_incoming_kept() {
        let flag = Variable::param("flag", IrType::Boolean);
        let mut b = FunctionBuilder::new("F", vec![flag.clone()], IrType::Integer);
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
        let phi = b.phi(
            IrType::Integer,
            vec![
                (left, IrConstant::integer(1).into()),
                (right, IrConstant::integer(2).into()),
            ],
        );
        b.ret(Some(phi.into()));
        let mut func = b.finish().unwrap();

        assert_eq!(PhiSimplification::new().run(&mut func, None).modifications, 0);
    }

    #[test]
    fn test_self_reference_ignored() {
        let incoming = vec![
            (crate::ir::BlockId(0), IrValue::Constant(IrConstant::integer(3))),
            (
                crate::ir::BlockId(1),
                IrValue::Register(crate::ir::Register::new(RegisterId(4), IrType::Integer)),
            ),
        ];
        assert_eq!(
            unique_incoming(RegisterId(4), &incoming),
            Some(IrConstant::integer(3).into())
        );
        assert_eq!(unique_incoming(RegisterId(9), &incoming), None);
    }
}
