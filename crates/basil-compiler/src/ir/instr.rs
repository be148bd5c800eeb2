//! IR Instructions
//!
//! The instruction set is closed: every consumer matches on `IrInstr` and
//! `Terminator` exhaustively, so adding a kind fails to compile until every
//! pass and backend handles it.

use super::block::BlockId;
use super::types::IrType;
use super::value::{IrConstant, IrValue, Register, RegisterId, Variable};
use serde::{Deserialize, Serialize};

/// Non-terminator instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrInstr {
    /// dest = constant
    Const { dest: Register, value: IrConstant },

    /// dest = variable
    LoadVar { dest: Register, var: Variable },

    /// dest = left op right
    Binary {
        dest: Register,
        op: BinaryOp,
        left: IrValue,
        right: IrValue,
    },

    /// dest = op operand
    Unary {
        dest: Register,
        op: UnaryOp,
        operand: IrValue,
    },

    /// dest = left cmp right (Boolean)
    Compare {
        dest: Register,
        op: CompareOp,
        left: IrValue,
        right: IrValue,
    },

    /// var = value
    Assign { var: Variable, value: IrValue },

    /// dest = *address
    Load { dest: Register, address: IrValue },

    /// *address = value
    Store { address: IrValue, value: IrValue },

    /// dest = callee(args)
    Call {
        dest: Option<Register>,
        callee: String,
        args: Vec<IrValue>,
    },

    /// dest = phi [pred: value, ...], one entry per predecessor in order
    Phi {
        dest: Register,
        incoming: Vec<(BlockId, IrValue)>,
    },

    /// dest = address of a fresh stack slot of type `ty`
    Alloca { dest: Register, ty: IrType },

    /// dest = address of base[indices...]
    ElementAddr {
        dest: Register,
        base: IrValue,
        indices: Vec<IrValue>,
    },

    /// dest = value converted to dest.ty
    Cast { dest: Register, value: IrValue },

    /// Source-level label (kept for `GoTo` targets and readability)
    Label { name: String },

    Comment { text: String },

    /// dest = new elem_ty[len]
    NewArray {
        dest: Register,
        elem_ty: IrType,
        len: IrValue,
    },

    /// array[index] = value
    ArrayStore {
        array: IrValue,
        index: IrValue,
        value: IrValue,
    },

    /// dest = await task
    Await {
        dest: Option<Register>,
        task: IrValue,
    },

    /// Yield a value from an iterator function
    Yield { value: Option<IrValue> },

    /// dest = new class(args)
    NewObject {
        dest: Register,
        class: String,
        args: Vec<IrValue>,
    },

    /// dest = object.method(args)
    CallMethod {
        dest: Option<Register>,
        object: IrValue,
        method: String,
        args: Vec<IrValue>,
    },

    /// dest = MyBase.method(args)
    CallBase {
        dest: Option<Register>,
        method: String,
        args: Vec<IrValue>,
    },

    /// dest = object.field
    LoadField {
        dest: Register,
        object: IrValue,
        field: String,
    },

    /// object.field = value
    StoreField {
        object: IrValue,
        field: String,
        value: IrValue,
    },

    /// dest = tuple.ItemN
    ExtractElement {
        dest: Register,
        tuple: IrValue,
        index: u32,
    },

    /// Try/catch/finally region boundary
    Try(TryMarker),

    /// Foreign code passed through to the backend named by `language`
    InlineCode { language: String, code: String },
}

/// Try/catch region boundaries, in source order within a function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TryMarker {
    BeginTry,
    BeginCatch {
        var: Option<Variable>,
        exception_type: Option<String>,
    },
    BeginFinally,
    EndTry,
}

impl IrInstr {
    /// Get the destination register if this instruction produces a value
    pub fn dest(&self) -> Option<&Register> {
        match self {
            IrInstr::Const { dest, .. }
            | IrInstr::LoadVar { dest, .. }
            | IrInstr::Binary { dest, .. }
            | IrInstr::Unary { dest, .. }
            | IrInstr::Compare { dest, .. }
            | IrInstr::Load { dest, .. }
            | IrInstr::Phi { dest, .. }
            | IrInstr::Alloca { dest, .. }
            | IrInstr::ElementAddr { dest, .. }
            | IrInstr::Cast { dest, .. }
            | IrInstr::NewArray { dest, .. }
            | IrInstr::NewObject { dest, .. }
            | IrInstr::LoadField { dest, .. }
            | IrInstr::ExtractElement { dest, .. } => Some(dest),
            IrInstr::Call { dest, .. }
            | IrInstr::Await { dest, .. }
            | IrInstr::CallMethod { dest, .. }
            | IrInstr::CallBase { dest, .. } => dest.as_ref(),
            IrInstr::Assign { .. }
            | IrInstr::Store { .. }
            | IrInstr::Label { .. }
            | IrInstr::Comment { .. }
            | IrInstr::ArrayStore { .. }
            | IrInstr::Yield { .. }
            | IrInstr::StoreField { .. }
            | IrInstr::Try(_)
            | IrInstr::InlineCode { .. } => None,
        }
    }

    pub fn dest_mut(&mut self) -> Option<&mut Register> {
        match self {
            IrInstr::Const { dest, .. }
            | IrInstr::LoadVar { dest, .. }
            | IrInstr::Binary { dest, .. }
            | IrInstr::Unary { dest, .. }
            | IrInstr::Compare { dest, .. }
            | IrInstr::Load { dest, .. }
            | IrInstr::Phi { dest, .. }
            | IrInstr::Alloca { dest, .. }
            | IrInstr::ElementAddr { dest, .. }
            | IrInstr::Cast { dest, .. }
            | IrInstr::NewArray { dest, .. }
            | IrInstr::NewObject { dest, .. }
            | IrInstr::LoadField { dest, .. }
            | IrInstr::ExtractElement { dest, .. } => Some(dest),
            IrInstr::Call { dest, .. }
            | IrInstr::Await { dest, .. }
            | IrInstr::CallMethod { dest, .. }
            | IrInstr::CallBase { dest, .. } => dest.as_mut(),
            IrInstr::Assign { .. }
            | IrInstr::Store { .. }
            | IrInstr::Label { .. }
            | IrInstr::Comment { .. }
            | IrInstr::ArrayStore { .. }
            | IrInstr::Yield { .. }
            | IrInstr::StoreField { .. }
            | IrInstr::Try(_)
            | IrInstr::InlineCode { .. } => None,
        }
    }

    /// Operand values, in evaluation order
    pub fn operands(&self) -> Vec<&IrValue> {
        match self {
            IrInstr::Const { .. }
            | IrInstr::LoadVar { .. }
            | IrInstr::Alloca { .. }
            | IrInstr::Label { .. }
            | IrInstr::Comment { .. }
            | IrInstr::Try(_)
            | IrInstr::InlineCode { .. } => Vec::new(),
            IrInstr::Binary { left, right, .. } | IrInstr::Compare { left, right, .. } => {
                vec![left, right]
            }
            IrInstr::Unary { operand, .. } => vec![operand],
            IrInstr::Assign { value, .. } => vec![value],
            IrInstr::Load { address, .. } => vec![address],
            IrInstr::Store { address, value } => vec![address, value],
            IrInstr::Call { args, .. } | IrInstr::CallBase { args, .. } => args.iter().collect(),
            IrInstr::NewObject { args, .. } => args.iter().collect(),
            IrInstr::Phi { incoming, .. } => incoming.iter().map(|(_, v)| v).collect(),
            IrInstr::ElementAddr { base, indices, .. } => {
                std::iter::once(base).chain(indices.iter()).collect()
            }
            IrInstr::Cast { value, .. } => vec![value],
            IrInstr::NewArray { len, .. } => vec![len],
            IrInstr::ArrayStore {
                array,
                index,
                value,
            } => vec![array, index, value],
            IrInstr::Await { task, .. } => vec![task],
            IrInstr::Yield { value } => value.iter().collect(),
            IrInstr::CallMethod { object, args, .. } => {
                std::iter::once(object).chain(args.iter()).collect()
            }
            IrInstr::LoadField { object, .. } => vec![object],
            IrInstr::StoreField { object, value, .. } => vec![object, value],
            IrInstr::ExtractElement { tuple, .. } => vec![tuple],
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut IrValue> {
        match self {
            IrInstr::Const { .. }
            | IrInstr::LoadVar { .. }
            | IrInstr::Alloca { .. }
            | IrInstr::Label { .. }
            | IrInstr::Comment { .. }
            | IrInstr::Try(_)
            | IrInstr::InlineCode { .. } => Vec::new(),
            IrInstr::Binary { left, right, .. } | IrInstr::Compare { left, right, .. } => {
                vec![left, right]
            }
            IrInstr::Unary { operand, .. } => vec![operand],
            IrInstr::Assign { value, .. } => vec![value],
            IrInstr::Load { address, .. } => vec![address],
            IrInstr::Store { address, value } => vec![address, value],
            IrInstr::Call { args, .. } | IrInstr::CallBase { args, .. } => {
                args.iter_mut().collect()
            }
            IrInstr::NewObject { args, .. } => args.iter_mut().collect(),
            IrInstr::Phi { incoming, .. } => incoming.iter_mut().map(|(_, v)| v).collect(),
            IrInstr::ElementAddr { base, indices, .. } => {
                std::iter::once(base).chain(indices.iter_mut()).collect()
            }
            IrInstr::Cast { value, .. } => vec![value],
            IrInstr::NewArray { len, .. } => vec![len],
            IrInstr::ArrayStore {
                array,
                index,
                value,
            } => vec![array, index, value],
            IrInstr::Await { task, .. } => vec![task],
            IrInstr::Yield { value } => value.iter_mut().collect(),
            IrInstr::CallMethod { object, args, .. } => {
                std::iter::once(object).chain(args.iter_mut()).collect()
            }
            IrInstr::LoadField { object, .. } => vec![object],
            IrInstr::StoreField { object, value, .. } => vec![object, value],
            IrInstr::ExtractElement { tuple, .. } => vec![tuple],
        }
    }

    /// Replace every use of `reg` with `value`, returning the number of
    /// operands rewritten
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

    /// Check if this instruction has effects beyond producing its result
    pub fn has_side_effects(&self) -> bool {
        match self {
            IrInstr::Assign { .. }
            | IrInstr::Store { .. }
            | IrInstr::Call { .. }
            | IrInstr::Label { .. }
            | IrInstr::Comment { .. }
            | IrInstr::NewArray { .. }
            | IrInstr::ArrayStore { .. }
            | IrInstr::Await { .. }
            | IrInstr::Yield { .. }
            | IrInstr::NewObject { .. }
            | IrInstr::CallMethod { .. }
            | IrInstr::CallBase { .. }
            | IrInstr::StoreField { .. }
            | IrInstr::Try(_)
            | IrInstr::InlineCode { .. } => true,
            IrInstr::Const { .. }
            | IrInstr::LoadVar { .. }
            | IrInstr::Binary { .. }
            | IrInstr::Unary { .. }
            | IrInstr::Compare { .. }
            | IrInstr::Load { .. }
            | IrInstr::Phi { .. }
            | IrInstr::Alloca { .. }
            | IrInstr::ElementAddr { .. }
            | IrInstr::Cast { .. }
            | IrInstr::LoadField { .. }
            | IrInstr::ExtractElement { .. } => false,
        }
    }

    /// Reads a variable, memory slot or field whose content may change
    pub fn reads_memory(&self) -> bool {
        matches!(
            self,
            IrInstr::LoadVar { .. } | IrInstr::Load { .. } | IrInstr::LoadField { .. }
        )
    }

    /// Writes state that a memory read could observe (calls included)
    pub fn writes_memory(&self) -> bool {
        matches!(
            self,
            IrInstr::Assign { .. }
                | IrInstr::Store { .. }
                | IrInstr::Call { .. }
                | IrInstr::ArrayStore { .. }
                | IrInstr::Await { .. }
                | IrInstr::Yield { .. }
                | IrInstr::NewObject { .. }
                | IrInstr::CallMethod { .. }
                | IrInstr::CallBase { .. }
                | IrInstr::StoreField { .. }
                | IrInstr::Try(_)
                | IrInstr::InlineCode { .. }
        )
    }

    /// Can raise a runtime error (division by zero, invalid conversion)
    pub fn may_trap(&self) -> bool {
        match self {
            IrInstr::Binary { op, .. } => {
                matches!(op, BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Mod)
            }
            IrInstr::Cast { .. } | IrInstr::ExtractElement { .. } => true,
            _ => false,
        }
    }

    /// Pure computation: removable when unused and movable when its operands
    /// are available
    pub fn is_pure(&self) -> bool {
        !self.has_side_effects() && !self.reads_memory()
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, IrInstr::Phi { .. })
    }

    /// Mnemonic used by the pretty printer and diagnostics
    pub fn mnemonic(&self) -> &'static str {
        match self {
            IrInstr::Const { .. } => "const",
            IrInstr::LoadVar { .. } => "load_var",
            IrInstr::Binary { .. } => "binary",
            IrInstr::Unary { .. } => "unary",
            IrInstr::Compare { .. } => "cmp",
            IrInstr::Assign { .. } => "assign",
            IrInstr::Load { .. } => "load",
            IrInstr::Store { .. } => "store",
            IrInstr::Call { .. } => "call",
            IrInstr::Phi { .. } => "phi",
            IrInstr::Alloca { .. } => "alloca",
            IrInstr::ElementAddr { .. } => "elem_addr",
            IrInstr::Cast { .. } => "cast",
            IrInstr::Label { .. } => "label",
            IrInstr::Comment { .. } => "comment",
            IrInstr::NewArray { .. } => "new_array",
            IrInstr::ArrayStore { .. } => "array_store",
            IrInstr::Await { .. } => "await",
            IrInstr::Yield { .. } => "yield",
            IrInstr::NewObject { .. } => "new_object",
            IrInstr::CallMethod { .. } => "call_method",
            IrInstr::CallBase { .. } => "call_base",
            IrInstr::LoadField { .. } => "load_field",
            IrInstr::StoreField { .. } => "store_field",
            IrInstr::ExtractElement { .. } => "extract",
            IrInstr::Try(_) => "try",
            IrInstr::InlineCode { .. } => "inline",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Floating-point division (`/`)
    Div,
    /// Integer division (`\`)
    IntDiv,
    Mod,
    Pow,
    /// Logical/bitwise `And`
    And,
    Or,
    Xor,
    Shl,
    Shr,
    /// String concatenation (`&`)
    Concat,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::IntDiv
                | BinaryOp::Mod
                | BinaryOp::Pow
        )
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Shl | BinaryOp::Shr
        )
    }

    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor
        )
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::IntDiv => "idiv",
            BinaryOp::Mod => "mod",
            BinaryOp::Pow => "pow",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Concat => "concat",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric negation
    Neg,
    /// Logical not (Boolean operand)
    Not,
    /// Bitwise complement (integral operand)
    BitNot,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
            UnaryOp::BitNot => "bitnot",
        };
        write!(f, "{}", s)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The operator with swapped operands (`a < b` ⇔ `b > a`)
    pub fn swapped(&self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(id: u32) -> Register {
        Register::new(RegisterId::new(id), IrType::Integer)
    }

    #[test]
    fn test_binary_op_display() {
        assert_eq!(format!("{}", BinaryOp::Add), "add");
        assert_eq!(format!("{}", BinaryOp::IntDiv), "idiv");
        assert_eq!(format!("{}", CompareOp::Le), "le");
    }

    #[test]
    fn test_binary_op_categories() {
        assert!(BinaryOp::Add.is_arithmetic());
        assert!(!BinaryOp::Add.is_bitwise());
        assert!(BinaryOp::Xor.is_bitwise());
        assert!(BinaryOp::Mul.is_commutative());
        assert!(!BinaryOp::Sub.is_commutative());
    }

    #[test]
    fn test_dest_and_operands() {
        let instr = IrInstr::Binary {
            dest: reg(2),
            op: BinaryOp::Add,
            left: reg(0).into(),
            right: IrConstant::integer(1).into(),
        };
        assert_eq!(instr.dest().map(|r| r.id), Some(RegisterId(2)));
        assert_eq!(instr.operands().len(), 2);

        let call = IrInstr::Call {
            dest: None,
            callee: "Print".to_string(),
            args: vec![reg(0).into()],
        };
        assert!(call.dest().is_none());
        assert!(call.has_side_effects());
    }

    #[test]
    fn test_replace_uses() {
        let mut instr = IrInstr::Binary {
            dest: reg(2),
            op: BinaryOp::Mul,
            left: reg(0).into(),
            right: reg(0).into(),
        };
        let n = instr.replace_uses(RegisterId(0), &IrConstant::integer(3).into());
        assert_eq!(n, 2);
        assert!(instr.operands().iter().all(|v| v.as_constant().is_some()));
    }

    #[test]
    fn test_purity() {
        let load = IrInstr::LoadVar {
            dest: reg(0),
            var: Variable::local("x", IrType::Integer),
        };
        assert!(!load.has_side_effects());
        assert!(!load.is_pure());

        let div = IrInstr::Binary {
            dest: reg(1),
            op: BinaryOp::IntDiv,
            left: reg(0).into(),
            right: reg(0).into(),
        };
        assert!(div.is_pure());
        assert!(div.may_trap());
    }

    #[test]
    fn test_compare_swapped() {
        assert_eq!(CompareOp::Lt.swapped(), CompareOp::Gt);
        assert_eq!(CompareOp::Eq.swapped(), CompareOp::Eq);
    }
}
