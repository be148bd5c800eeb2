//! Function builder helpers
//!
//! Utilities for constructing IR by hand: tests, benchmarks and external
//! lowering code that wants register and block allocation handled for it.

use super::block::{BasicBlock, BlockId, Terminator};
use super::function::IrFunction;
use super::instr::{BinaryOp, CompareOp, IrInstr, UnaryOp};
use super::types::IrType;
use super::value::{IrConstant, IrValue, Register, Variable};
use crate::error::IrError;

/// Builder that simplifies IR construction for one function
pub struct FunctionBuilder {
    func: IrFunction,
    current_block: BlockId,
}

impl FunctionBuilder {
    /// Start a function; the entry block is created and selected
    pub fn new(name: impl Into<String>, params: Vec<Variable>, return_ty: IrType) -> Self {
        let mut func = IrFunction::new(name, params, return_ty);
        let entry = func.add_block(BasicBlock::with_label(BlockId(0), "entry"));
        FunctionBuilder {
            func,
            current_block: entry,
        }
    }

    /// Switch to emitting into a different block
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Create a new basic block (does not switch to it)
    pub fn create_block(&mut self) -> BlockId {
        self.func.create_block()
    }

    pub fn create_labeled_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = self.func.create_block();
        if let Some(block) = self.func.get_block_mut(id) {
            block.label = Some(label.into());
        }
        id
    }

    /// Allocate a new register with the given type
    pub fn alloc_reg(&mut self, ty: IrType) -> Register {
        self.func.new_register(ty)
    }

    pub fn add_local(&mut self, var: Variable) {
        self.func.add_local(var);
    }

    /// Emit an instruction into the current block
    pub fn emit(&mut self, instr: IrInstr) {
        self.block_mut().add_instr(instr);
    }

    /// Set the terminator for the current block
    pub fn terminate(&mut self, term: Terminator) {
        self.block_mut().set_terminator(term);
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump(target));
    }

    pub fn branch(&mut self, cond: impl Into<IrValue>, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch {
            cond: cond.into(),
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<IrValue>) {
        self.terminate(Terminator::Return(value));
    }

    /// Emit a constant and return the destination register
    pub fn constant(&mut self, value: IrConstant) -> Register {
        let dest = self.alloc_reg(value.ty());
        self.emit(IrInstr::Const {
            dest: dest.clone(),
            value,
        });
        dest
    }

    /// Emit an `Integer` constant
    pub fn const_int(&mut self, value: i64) -> Register {
        self.constant(IrConstant::integer(value))
    }

    pub fn load_var(&mut self, var: Variable) -> Register {
        let dest = self.alloc_reg(var.ty.clone());
        self.emit(IrInstr::LoadVar {
            dest: dest.clone(),
            var,
        });
        dest
    }

    pub fn assign(&mut self, var: Variable, value: impl Into<IrValue>) {
        self.emit(IrInstr::Assign {
            var,
            value: value.into(),
        });
    }

    /// Emit a binary operation; `/` on integers yields `Double`, `&` yields
    /// `String`, everything else takes the left operand's type
    pub fn binary(
        &mut self,
        op: BinaryOp,
        left: impl Into<IrValue>,
        right: impl Into<IrValue>,
    ) -> Register {
        let left = left.into();
        let right = right.into();
        let ty = match op {
            BinaryOp::Concat => IrType::String,
            BinaryOp::Div if left.ty().is_integer() => IrType::Double,
            _ => left.ty(),
        };
        let dest = self.alloc_reg(ty);
        self.emit(IrInstr::Binary {
            dest: dest.clone(),
            op,
            left,
            right,
        });
        dest
    }

    pub fn unary(&mut self, op: UnaryOp, operand: impl Into<IrValue>) -> Register {
        let operand = operand.into();
        let dest = self.alloc_reg(operand.ty());
        self.emit(IrInstr::Unary {
            dest: dest.clone(),
            op,
            operand,
        });
        dest
    }

    pub fn compare(
        &mut self,
        op: CompareOp,
        left: impl Into<IrValue>,
        right: impl Into<IrValue>,
    ) -> Register {
        let dest = self.alloc_reg(IrType::Boolean);
        self.emit(IrInstr::Compare {
            dest: dest.clone(),
            op,
            left: left.into(),
            right: right.into(),
        });
        dest
    }

    /// Emit a call; returns the result register unless `ret_ty` is `Void`
    pub fn call(
        &mut self,
        callee: impl Into<String>,
        args: Vec<IrValue>,
        ret_ty: IrType,
    ) -> Option<Register> {
        let dest = (!ret_ty.is_void()).then(|| self.alloc_reg(ret_ty));
        self.emit(IrInstr::Call {
            dest: dest.clone(),
            callee: callee.into(),
            args,
        });
        dest
    }

    /// Emit a phi; incoming entries must follow the block's predecessor order
    pub fn phi(&mut self, ty: IrType, incoming: Vec<(BlockId, IrValue)>) -> Register {
        let dest = self.alloc_reg(ty);
        let block = self.block_mut();
        let at = block.phi_count();
        block.instructions.insert(
            at,
            IrInstr::Phi {
                dest: dest.clone(),
                incoming,
            },
        );
        dest
    }

    /// Access the function under construction
    pub fn func(&self) -> &IrFunction {
        &self.func
    }

    pub fn func_mut(&mut self) -> &mut IrFunction {
        &mut self.func
    }

    /// Validate and return the finished function
    pub fn finish(self) -> Result<IrFunction, IrError> {
        self.func.validate()?;
        Ok(self.func)
    }

    fn block_mut(&mut self) -> &mut BasicBlock {
        let id = self.current_block;
        match self.func.get_block_mut(id) {
            Some(block) => block,
            None => panic!("builder targets unknown block {}", id),
        }
    }
}
