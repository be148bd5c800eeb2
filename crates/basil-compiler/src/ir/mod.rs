//! Intermediate Representation (IR) for Basil
//!
//! The IR sits between semantic analysis and the source-to-source backends.
//! It is three-address code in basic blocks with SSA registers.
//!
//! # Structure
//!
//! - `IrModule` - Top-level container: functions, globals, classes
//! - `IrFunction` - A function with parameters, locals, and basic blocks
//! - `BasicBlock` - A sequence of instructions ending in one `Terminator`
//! - `IrInstr` - Three-address code instructions
//! - `IrValue` - Constants, variables and registers

pub mod block;
pub mod builder;
pub mod function;
pub mod instr;
pub mod module;
pub mod pretty;
pub mod types;
pub mod value;

pub use block::{BasicBlock, BlockId, Terminator};
pub use builder::FunctionBuilder;
pub use function::IrFunction;
pub use instr::{BinaryOp, CompareOp, IrInstr, TryMarker, UnaryOp};
pub use module::{IrClass, IrField, IrGlobal, IrModule};
pub use pretty::PrettyPrint;
pub use types::IrType;
pub use value::{IrConstant, IrValue, Register, RegisterId, VarScope, Variable};
