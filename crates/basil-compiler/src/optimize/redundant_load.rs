//! Redundant Load Elimination
//!
//! Within a block, a read of a location whose content is already known (from
//! an earlier read or write of the same location) is replaced by the known
//! value. Locations are variables, addresses and object fields.
//!
//! Writes kill the locations they may alias; calls and anything else that
//! writes memory kill everything.

use super::{Pass, PassOutcome};
use crate::analysis::FunctionAnalysis;
use crate::ir::{IrFunction, IrInstr, IrValue, RegisterId, VarScope};
use rustc_hash::FxHashMap;

/// A memory location tracked within one block
#[derive(Debug, Clone)]
enum Location {
    Var(String, VarScope),
    Addr(IrValue),
    Field(IrValue, String),
}

impl Location {
    fn same_as(&self, other: &Location) -> bool {
        match (self, other) {
            (Location::Var(a, sa), Location::Var(b, sb)) => a == b && sa == sb,
            (Location::Addr(a), Location::Addr(b)) => a.same_as(b),
            (Location::Field(oa, fa), Location::Field(ob, fb)) => fa == fb && oa.same_as(ob),
            _ => false,
        }
    }
}

/// Known location contents, in insertion order
#[derive(Default)]
struct Available {
    entries: Vec<(Location, IrValue)>,
}

impl Available {
    fn get(&self, loc: &Location) -> Option<&IrValue> {
        self.entries
            .iter()
            .find(|(l, _)| l.same_as(loc))
            .map(|(_, v)| v)
    }

    fn set(&mut self, loc: Location, value: IrValue) {
        self.entries.retain(|(l, _)| !l.same_as(&loc));
        if !matches!(value, IrValue::Variable(_)) {
            self.entries.push((loc, value));
        }
    }

    fn kill(&mut self, pred: impl Fn(&Location) -> bool) {
        self.entries.retain(|(l, _)| !pred(l));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Redundant load elimination pass
pub struct RedundantLoadElimination;

impl RedundantLoadElimination {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RedundantLoadElimination {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for RedundantLoadElimination {
    fn name(&self) -> &str {
        "redundant-load-elimination"
    }

    fn run(&self, func: &mut IrFunction, _facts: Option<&FunctionAnalysis>) -> PassOutcome {
        let mut aliases: FxHashMap<RegisterId, IrValue> = FxHashMap::default();

        for block in &mut func.blocks {
            let mut available = Available::default();
            let mut kept = Vec::with_capacity(block.instructions.len());

            for mut instr in std::mem::take(&mut block.instructions) {
                // earlier loads in this block may already be gone
                for operand in instr.operands_mut() {
                    if let Some(v) = operand.as_register().and_then(|r| aliases.get(&r.id)) {
                        *operand = v.clone();
                    }
                }

                match &instr {
                    IrInstr::LoadVar { dest, var } => {
                        let loc = Location::Var(var.name.clone(), var.scope);
                        if let Some(value) = available.get(&loc) {
                            aliases.insert(dest.id, value.clone());
                            continue;
                        }
                        available.set(loc, IrValue::Register(dest.clone()));
                    }
                    IrInstr::Load { dest, address } => {
                        let loc = Location::Addr(address.clone());
                        if let Some(value) = available.get(&loc) {
                            aliases.insert(dest.id, value.clone());
                            continue;
                        }
                        available.set(loc, IrValue::Register(dest.clone()));
                    }
                    IrInstr::LoadField {
                        dest,
                        object,
                        field,
                    } => {
                        let loc = Location::Field(object.clone(), field.clone());
                        if let Some(value) = available.get(&loc) {
                            aliases.insert(dest.id, value.clone());
                            continue;
                        }
                        available.set(loc, IrValue::Register(dest.clone()));
                    }
                    IrInstr::Assign { var, value } => {
                        available.set(Location::Var(var.name.clone(), var.scope), value.clone());
                    }
                    IrInstr::Store { address, value } => {
                        // any address or field may alias the slot
                        available.kill(|l| matches!(l, Location::Addr(_) | Location::Field(..)));
                        available.set(Location::Addr(address.clone()), value.clone());
                    }
                    IrInstr::StoreField {
                        object,
                        field,
                        value,
                    } => {
                        available.kill(|l| matches!(l, Location::Field(_, f) if f == field));
                        available.set(Location::Field(object.clone(), field.clone()), value.clone());
                    }
                    IrInstr::ArrayStore { .. } => {
                        available.kill(|l| matches!(l, Location::Addr(_)));
                    }
                    IrInstr::Label { .. } => available.clear(),
                    other if other.writes_memory() => available.clear(),
                    _ => {}
                }
                kept.push(instr);
            }
            block.instructions = kept;

            for operand in block.terminator.operands_mut() {
                if let Some(v) = operand.as_register().and_then(|r| aliases.get(&r.id)) {
                    *operand = v.clone();
                }
            }
        }

        let modifications = aliases.len();
        if modifications > 0 {
            // uses in earlier blocks (loops) or other blocks
            let mut order: Vec<RegisterId> = aliases.keys().copied().collect();
            order.sort();
            for reg in order {
                let value = aliases[&reg].clone();
                func.replace_uses(reg, &value);
            }
        }
        PassOutcome::changed(modifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, IrConstant, IrType, Terminator, Variable};

    fn run(func: &mut IrFunction) -> usize {
        RedundantLoadElimination::new().run(func, None).modifications
    }

    #[test]
    fn test_repeated_load_var() {
        let x = Variable::param("x", IrType::Integer);
        let mut b = FunctionBuilder::new("F", vec![x.clone()], IrType::Integer);
        let first = b.load_var(x.clone());
        let second = b.load_var(x);
        let sum = b.binary(BinaryOp::Add, first.clone(), second);
        b.ret(Some(sum.into()));
        let mut func = b.finish().unwrap();

        assert_eq!(run(&mut func), 1);
        let entry = &func.blocks[0];
        assert_eq!(entry.instructions.len(), 2);
        assert_eq!(
            entry.instructions[1].operands(),
            vec![&IrValue::from(first.clone()), &IrValue::from(first)]
        );
    }

    #[test]
    fn test_assign_forwards_value() {
        let x = Variable::local("x", IrType::Integer);
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        b.add_local(x.clone());
        b.assign(x.clone(), IrConstant::integer(5));
        let loaded = b.load_var(x);
        b.ret(Some(loaded.into()));
        let mut func = b.finish().unwrap();

        assert_eq!(run(&mut func), 1);
        assert_eq!(
            func.blocks[0].terminator,
            Terminator::Return(Some(IrConstant::integer(5).into()))
        );
    }

    #[test]
    fn test_call_kills_known_values() {
        let g = Variable::global("counter", IrType::Integer);
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let before = b.load_var(g.clone());
        let _ = b.call("Bump", vec![], IrType::Void);
        let after = b.load_var(g);
        let sum = b.binary(BinaryOp::Add, before, after);
        b.ret(Some(sum.into()));
        let mut func = b.finish().unwrap();

        assert_eq!(run(&mut func), 0);
    }

    #[test]
    fn test_store_field_kills_same_field_only() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let p = b.alloc_reg(IrType::class("Point"));
        b.emit(IrInstr::NewObject {
            dest: p.clone(),
            class: "Point".to_string(),
            args: vec![],
        });
        let q = b.alloc_reg(IrType::class("Point"));
        b.emit(IrInstr::NewObject {
            dest: q.clone(),
            class: "Point".to_string(),
            args: vec![],
        });
        let px = b.alloc_reg(IrType::Integer);
        b.emit(IrInstr::LoadField {
            dest: px.clone(),
            object: p.clone().into(),
            field: "X".to_string(),
        });
        let py = b.alloc_reg(IrType::Integer);
        b.emit(IrInstr::LoadField {
            dest: py,
            object: p.clone().into(),
            field: "Y".to_string(),
        });
        b.emit(IrInstr::StoreField {
            object: q.into(),
            field: "X".to_string(),
            value: IrConstant::integer(1).into(),
        });
        let px2 = b.alloc_reg(IrType::Integer);
        b.emit(IrInstr::LoadField {
            dest: px2.clone(),
            object: p.clone().into(),
            field: "X".to_string(),
        });
        let py2 = b.alloc_reg(IrType::Integer);
        b.emit(IrInstr::LoadField {
            dest: py2.clone(),
            object: p.into(),
            field: "Y".to_string(),
        });
        let sum = b.binary(BinaryOp::Add, px2, py2);
        b.ret(Some(sum.into()));
        let mut func = b.finish().unwrap();

        // only the second read of Y is redundant
        assert_eq!(run(&mut func), 1);
        let loads = func.blocks[0]
            .instructions
            .iter()
            .filter(|i| matches!(i, IrInstr::LoadField { .. }))
            .count();
        assert_eq!(loads, 3);
    }
}
