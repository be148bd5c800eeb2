//! Constant Folding Optimization
//!
//! Evaluates constant expressions at compile time, propagates `Const` results
//! into their uses and applies algebraic identities.
//!
//! Registers are single-assignment, so the constant map is function-wide: a
//! register known to be constant is constant at every use.

use super::{Pass, PassOutcome};
use crate::analysis::FunctionAnalysis;
use crate::ir::{
    BinaryOp, CompareOp, IrConstant, IrFunction, IrInstr, IrType, IrValue, RegisterId, UnaryOp,
};
use rustc_hash::FxHashMap;

/// Constant folding pass
pub struct ConstantFolding;

impl ConstantFolding {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConstantFolding {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ConstantFolding {
    fn name(&self) -> &str {
        "constant-folding"
    }

    fn run(&self, func: &mut IrFunction, _facts: Option<&FunctionAnalysis>) -> PassOutcome {
        let mut constants: FxHashMap<RegisterId, IrConstant> = FxHashMap::default();
        for block in &func.blocks {
            for instr in &block.instructions {
                if let IrInstr::Const { dest, value } = instr {
                    constants.insert(dest.id, value.clone());
                }
            }
        }

        let mut modifications = 0;
        // dest -> replacement for instructions removed by identities
        let mut aliases: FxHashMap<RegisterId, IrValue> = FxHashMap::default();

        for block in &mut func.blocks {
            let mut kept = Vec::with_capacity(block.instructions.len());
            for mut instr in std::mem::take(&mut block.instructions) {
                modifications += propagate(&mut instr, &constants);

                match fold(&instr) {
                    Folded::Constant(value) => match instr.dest().cloned() {
                        Some(dest) => {
                            constants.insert(dest.id, value.clone());
                            kept.push(IrInstr::Const { dest, value });
                            modifications += 1;
                        }
                        None => kept.push(instr),
                    },
                    Folded::Alias(value) => match instr.dest().map(|d| d.id) {
                        Some(dest) => {
                            if let Some(c) = value.as_constant() {
                                constants.insert(dest, c.clone());
                            }
                            aliases.insert(dest, value);
                            modifications += 1;
                        }
                        None => kept.push(instr),
                    },
                    Folded::No => kept.push(instr),
                }
            }
            block.instructions = kept;

            for operand in block.terminator.operands_mut() {
                if let Some(c) = operand
                    .as_register()
                    .and_then(|r| constants.get(&r.id))
                {
                    *operand = IrValue::Constant(c.clone());
                    modifications += 1;
                }
            }
        }

        let mut order: Vec<RegisterId> = aliases.keys().copied().collect();
        order.sort();
        for reg in order {
            let value = resolve_alias(&aliases, reg);
            func.replace_uses(reg, &value);
        }

        PassOutcome::changed(modifications)
    }
}

/// Follow an alias chain to a value that is not itself removed
fn resolve_alias(aliases: &FxHashMap<RegisterId, IrValue>, reg: RegisterId) -> IrValue {
    let mut value = aliases[&reg].clone();
    // bounded: each step moves to a different removed register
    for _ in 0..aliases.len() {
        match value.as_register().and_then(|r| aliases.get(&r.id)) {
            Some(next) => value = next.clone(),
            None => break,
        }
    }
    value
}

/// Replace register operands known to be constant
fn propagate(instr: &mut IrInstr, constants: &FxHashMap<RegisterId, IrConstant>) -> usize {
    let mut count = 0;
    for operand in instr.operands_mut() {
        if let Some(c) = operand.as_register().and_then(|r| constants.get(&r.id)) {
            *operand = IrValue::Constant(c.clone());
            count += 1;
        }
    }
    count
}

enum Folded {
    /// Instruction computes this constant
    Constant(IrConstant),
    /// Instruction is a copy of an existing register or constant
    Alias(IrValue),
    No,
}

fn fold(instr: &IrInstr) -> Folded {
    match instr {
        IrInstr::Binary {
            dest,
            op,
            left,
            right,
        } => {
            if let (Some(l), Some(r)) = (left.as_constant(), right.as_constant()) {
                if let Some(value) = eval_binary(*op, l, r, &dest.ty) {
                    return Folded::Constant(value);
                }
            }
            identity(*op, left, right, &dest.ty)
        }
        IrInstr::Unary { dest, op, operand } => match operand.as_constant() {
            Some(c) => eval_unary(*op, c, &dest.ty).map_or(Folded::No, Folded::Constant),
            None => Folded::No,
        },
        IrInstr::Compare {
            op, left, right, ..
        } => match (left.as_constant(), right.as_constant()) {
            (Some(l), Some(r)) => eval_compare(*op, l, r)
                .map_or(Folded::No, |b| Folded::Constant(IrConstant::Boolean(b))),
            _ => Folded::No,
        },
        IrInstr::Cast { dest, value } => {
            if value.ty() == dest.ty && !matches!(value, IrValue::Variable(_)) {
                return Folded::Alias(value.clone());
            }
            match value.as_constant() {
                Some(c) => eval_cast(c, &dest.ty).map_or(Folded::No, Folded::Constant),
                None => Folded::No,
            }
        }
        _ => Folded::No,
    }
}

/// Integer constant of type `ty`, if the value fits
fn make_int(v: i64, ty: &IrType) -> Option<IrConstant> {
    let fits = match ty {
        IrType::Byte => (0..=u8::MAX as i64).contains(&v),
        IrType::Short => i16::try_from(v).is_ok(),
        IrType::Integer => i32::try_from(v).is_ok(),
        IrType::Long => true,
        _ => false,
    };
    fits.then(|| IrConstant::Int(v, ty.clone()))
}

fn make_float(v: f64, ty: &IrType) -> Option<IrConstant> {
    match ty {
        IrType::Single => Some(IrConstant::Float(v as f32 as f64, ty.clone())),
        IrType::Double | IrType::Decimal => Some(IrConstant::Float(v, ty.clone())),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, l: &IrConstant, r: &IrConstant, ty: &IrType) -> Option<IrConstant> {
    use IrConstant::*;
    match (l, r) {
        (Int(a, _), Int(b, _)) if ty.is_integer() => {
            let (a, b) = (*a, *b);
            let v = match op {
                BinaryOp::Add => a.checked_add(b)?,
                BinaryOp::Sub => a.checked_sub(b)?,
                BinaryOp::Mul => a.checked_mul(b)?,
                BinaryOp::IntDiv => a.checked_div(b)?,
                BinaryOp::Mod => a.checked_rem(b)?,
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                BinaryOp::Xor => a ^ b,
                BinaryOp::Shl => {
                    let bits = ty.integer_bits()?;
                    if !(0..bits as i64).contains(&b) {
                        return None;
                    }
                    a.checked_mul(1i64.checked_shl(b as u32)?)?
                }
                BinaryOp::Shr => {
                    let bits = ty.integer_bits()?;
                    if !(0..bits as i64).contains(&b) {
                        return None;
                    }
                    a >> b
                }
                BinaryOp::Div | BinaryOp::Pow | BinaryOp::Concat => return None,
            };
            make_int(v, ty)
        }
        (Int(..) | Float(..), Int(..) | Float(..)) if ty.is_float() => {
            let (a, b) = (l.as_f64()?, r.as_f64()?);
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b != 0.0 => a / b,
                BinaryOp::Pow => a.powf(b),
                _ => return None,
            };
            if !v.is_finite() {
                return None;
            }
            make_float(v, ty)
        }
        (Boolean(a), Boolean(b)) => match op {
            BinaryOp::And => Some(Boolean(*a && *b)),
            BinaryOp::Or => Some(Boolean(*a || *b)),
            BinaryOp::Xor => Some(Boolean(*a != *b)),
            _ => None,
        },
        (String(a), String(b)) if op == BinaryOp::Concat => Some(String(format!("{}{}", a, b))),
        (String(a), Char(b)) if op == BinaryOp::Concat => Some(String(format!("{}{}", a, b))),
        (Char(a), String(b)) if op == BinaryOp::Concat => Some(String(format!("{}{}", a, b))),
        _ => None,
    }
}

/// `x+0`, `0+x`, `x-0`, `x*1`, `1*x` become `x`; `x*0` becomes `0` for
/// integers
fn identity(op: BinaryOp, left: &IrValue, right: &IrValue, ty: &IrType) -> Folded {
    if !ty.is_integer() {
        return Folded::No;
    }
    let int = |v: &IrValue| v.as_constant().and_then(IrConstant::as_i64);
    let usable = |v: &IrValue| !matches!(v, IrValue::Variable(_)) && v.ty() == *ty;
    match (op, int(left), int(right)) {
        (BinaryOp::Add | BinaryOp::Sub, _, Some(0)) if usable(left) => Folded::Alias(left.clone()),
        (BinaryOp::Add, Some(0), _) if usable(right) => Folded::Alias(right.clone()),
        (BinaryOp::Mul, _, Some(1)) if usable(left) => Folded::Alias(left.clone()),
        (BinaryOp::Mul, Some(1), _) if usable(right) => Folded::Alias(right.clone()),
        (BinaryOp::Mul, _, Some(0)) | (BinaryOp::Mul, Some(0), _) => {
            make_int(0, ty).map_or(Folded::No, Folded::Constant)
        }
        _ => Folded::No,
    }
}

fn eval_unary(op: UnaryOp, c: &IrConstant, ty: &IrType) -> Option<IrConstant> {
    match (op, c) {
        (UnaryOp::Neg, IrConstant::Int(v, _)) => make_int(v.checked_neg()?, ty),
        (UnaryOp::Neg, IrConstant::Float(v, _)) => make_float(-v, ty),
        (UnaryOp::Not, IrConstant::Boolean(b)) => Some(IrConstant::Boolean(!b)),
        (UnaryOp::BitNot, IrConstant::Int(v, _)) => match ty {
            IrType::Byte => make_int(!v & 0xFF, ty),
            _ => make_int(!v, ty),
        },
        _ => None,
    }
}

fn eval_compare(op: CompareOp, l: &IrConstant, r: &IrConstant) -> Option<bool> {
    use std::cmp::Ordering;
    let ordering: Option<Ordering> = match (l, r) {
        (IrConstant::Int(a, _), IrConstant::Int(b, _)) => Some(a.cmp(b)),
        (IrConstant::Int(..) | IrConstant::Float(..), IrConstant::Int(..) | IrConstant::Float(..)) => {
            let (a, b) = (l.as_f64()?, r.as_f64()?);
            if a.is_nan() || b.is_nan() {
                return Some(op == CompareOp::Ne);
            }
            a.partial_cmp(&b)
        }
        (IrConstant::String(a), IrConstant::String(b)) => Some(a.cmp(b)),
        (IrConstant::Char(a), IrConstant::Char(b)) => Some(a.cmp(b)),
        (IrConstant::Boolean(a), IrConstant::Boolean(b)) => match op {
            CompareOp::Eq => return Some(a == b),
            CompareOp::Ne => return Some(a != b),
            _ => return None,
        },
        (IrConstant::Nothing, IrConstant::Nothing) => match op {
            CompareOp::Eq => return Some(true),
            CompareOp::Ne => return Some(false),
            _ => return None,
        },
        _ => None,
    };
    let ord = ordering?;
    Some(match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    })
}

/// Widening and exact conversions only; rounding conversions stay at runtime
fn eval_cast(c: &IrConstant, ty: &IrType) -> Option<IrConstant> {
    match c {
        IrConstant::Int(v, _) if ty.is_integer() => make_int(*v, ty),
        IrConstant::Int(v, _) if ty.is_float() => make_float(*v as f64, ty),
        IrConstant::Float(v, _) if ty.is_float() => make_float(*v, ty),
        IrConstant::Char(ch) if *ty == IrType::String => Some(IrConstant::String(ch.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Terminator, Variable};

    fn run(func: &mut IrFunction) -> usize {
        ConstantFolding::new().run(func, None).modifications
    }

    #[test]
    fn test_fold_integer_add() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let a = b.const_int(40);
        let c = b.const_int(2);
        let sum = b.binary(BinaryOp::Add, a, c);
        b.ret(Some(sum.clone().into()));
        let mut func = b.finish().unwrap();

        assert!(run(&mut func) > 0);
        let entry = &func.blocks[0];
        assert!(entry.instructions.iter().any(|i| matches!(
            i,
            IrInstr::Const { dest, value } if dest.id == sum.id && *value == IrConstant::integer(42)
        )));
        assert_eq!(
            entry.terminator,
            Terminator::Return(Some(IrConstant::integer(42).into()))
        );
    }

    #[test]
    fn test_overflow_not_folded() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let sum = b.binary(
            BinaryOp::Add,
            IrConstant::integer(i32::MAX as i64),
            IrConstant::integer(1),
        );
        b.ret(Some(sum.into()));
        let mut func = b.finish().unwrap();
        assert_eq!(run(&mut func), 0);
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let q = b.binary(BinaryOp::IntDiv, IrConstant::integer(1), IrConstant::integer(0));
        b.ret(Some(q.into()));
        let mut func = b.finish().unwrap();
        assert_eq!(run(&mut func), 0);
    }

    #[test]
    fn test_identities() {
        let x = Variable::param("x", IrType::Integer);
        let mut b = FunctionBuilder::new("F", vec![x.clone()], IrType::Integer);
        let xv = b.load_var(x);
        let plus = b.binary(BinaryOp::Add, xv.clone(), IrConstant::integer(0));
        let times = b.binary(BinaryOp::Mul, plus, IrConstant::integer(1));
        b.ret(Some(times.into()));
        let mut func = b.finish().unwrap();

        assert_eq!(run(&mut func), 2);
        assert_eq!(func.blocks[0].instructions.len(), 1);
        assert_eq!(func.blocks[0].terminator, Terminator::Return(Some(xv.into())));
    }

    #[test]
    fn test_multiply_by_zero() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let x = b
            .call("Rnd", vec![], IrType::Integer)
            .expect("call returns a value");
        let z = b.binary(BinaryOp::Mul, x, IrConstant::integer(0));
        b.ret(Some(z.into()));
        let mut func = b.finish().unwrap();

        run(&mut func);
        assert_eq!(
            func.blocks[0].terminator,
            Terminator::Return(Some(IrConstant::integer(0).into()))
        );
    }

    #[test]
    fn test_compare_and_concat() {
        assert_eq!(
            eval_compare(CompareOp::Lt, &IrConstant::integer(1), &IrConstant::double(1.5)),
            Some(true)
        );
        assert_eq!(
            eval_compare(
                CompareOp::Eq,
                &IrConstant::double(f64::NAN),
                &IrConstant::double(f64::NAN)
            ),
            Some(false)
        );
        assert_eq!(
            eval_binary(
                BinaryOp::Concat,
                &IrConstant::string("ab"),
                &IrConstant::string("cd"),
                &IrType::String
            ),
            Some(IrConstant::string("abcd"))
        );
    }

    #[test]
    fn test_trivial_cast_removed() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Long);
        let v = b
            .call("Now", vec![], IrType::Long)
            .expect("call returns a value");
        let cast = b.alloc_reg(IrType::Long);
        b.emit(IrInstr::Cast {
            dest: cast.clone(),
            value: v.clone().into(),
        });
        b.ret(Some(cast.into()));
        let mut func = b.finish().unwrap();

        assert_eq!(run(&mut func), 1);
        assert_eq!(func.blocks[0].terminator, Terminator::Return(Some(v.into())));
    }
}
