//! IR Values and Registers
//!
//! A value is anything usable as an operand: a constant, a variable, or the
//! result of another instruction (a register).

use super::types::IrType;
use serde::{Deserialize, Serialize};

/// Virtual register identifier, unique within a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegisterId(pub u32);

impl RegisterId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// The result of an instruction, with its type
///
/// Registers are defined exactly once. `name` is an optional hint that
/// generators may use instead of an allocated temporary name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    pub id: RegisterId,
    pub ty: IrType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Register {
    pub fn new(id: RegisterId, ty: IrType) -> Self {
        Self { id, ty, name: None }
    }

    pub fn named(id: RegisterId, ty: IrType, name: impl Into<String>) -> Self {
        Self {
            id,
            ty,
            name: Some(name.into()),
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Where a variable lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarScope {
    Local,
    Param,
    Global,
}

/// Reference to a declared variable (local, parameter or global)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: IrType,
    pub scope: VarScope,
}

impl Variable {
    pub fn local(name: impl Into<String>, ty: IrType) -> Self {
        Self {
            name: name.into(),
            ty,
            scope: VarScope::Local,
        }
    }

    pub fn param(name: impl Into<String>, ty: IrType) -> Self {
        Self {
            name: name.into(),
            ty,
            scope: VarScope::Param,
        }
    }

    pub fn global(name: impl Into<String>, ty: IrType) -> Self {
        Self {
            name: name.into(),
            ty,
            scope: VarScope::Global,
        }
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            VarScope::Global => write!(f, "@{}", self.name),
            VarScope::Local | VarScope::Param => write!(f, "${}", self.name),
        }
    }
}

/// Constant values in IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrConstant {
    /// Integral constant; the type is one of Byte/Short/Integer/Long
    Int(i64, IrType),
    /// Floating-point constant; the type is Single/Double/Decimal
    Float(f64, IrType),
    Boolean(bool),
    Char(char),
    String(String),
    /// Null reference
    Nothing,
}

impl IrConstant {
    /// Integer constant of type `Integer`
    pub fn integer(v: i64) -> Self {
        IrConstant::Int(v, IrType::Integer)
    }

    /// Integer constant of type `Long`
    pub fn long(v: i64) -> Self {
        IrConstant::Int(v, IrType::Long)
    }

    /// Floating-point constant of type `Double`
    pub fn double(v: f64) -> Self {
        IrConstant::Float(v, IrType::Double)
    }

    pub fn string(s: impl Into<String>) -> Self {
        IrConstant::String(s.into())
    }

    pub fn ty(&self) -> IrType {
        match self {
            IrConstant::Int(_, ty) | IrConstant::Float(_, ty) => ty.clone(),
            IrConstant::Boolean(_) => IrType::Boolean,
            IrConstant::Char(_) => IrType::Char,
            IrConstant::String(_) => IrType::String,
            IrConstant::Nothing => IrType::Object,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, IrConstant::Int(..) | IrConstant::Float(..))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IrConstant::Int(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IrConstant::Float(v, _) => Some(*v),
            IrConstant::Int(v, _) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            IrConstant::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Bitwise equality, so that `NaN` constants compare equal to themselves
    pub fn same_as(&self, other: &IrConstant) -> bool {
        match (self, other) {
            (IrConstant::Float(a, ta), IrConstant::Float(b, tb)) => {
                a.to_bits() == b.to_bits() && ta == tb
            }
            _ => self == other,
        }
    }
}

impl std::fmt::Display for IrConstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrConstant::Int(v, IrType::Integer) => write!(f, "{}", v),
            IrConstant::Int(v, ty) => write!(f, "{}:{}", v, ty),
            IrConstant::Float(v, ty) => write!(f, "{:?}:{}", v, ty),
            IrConstant::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            IrConstant::Char(c) => write!(f, "'{}'", c.escape_default()),
            IrConstant::String(s) => write!(f, "\"{}\"", s.escape_default()),
            IrConstant::Nothing => write!(f, "Nothing"),
        }
    }
}

/// IR values (instruction operands)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrValue {
    Constant(IrConstant),
    Variable(Variable),
    Register(Register),
}

impl IrValue {
    pub fn ty(&self) -> IrType {
        match self {
            IrValue::Constant(c) => c.ty(),
            IrValue::Variable(v) => v.ty.clone(),
            IrValue::Register(r) => r.ty.clone(),
        }
    }

    pub fn as_register(&self) -> Option<&Register> {
        match self {
            IrValue::Register(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&IrConstant> {
        match self {
            IrValue::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Whether this value is the given register
    pub fn is_register(&self, id: RegisterId) -> bool {
        matches!(self, IrValue::Register(r) if r.id == id)
    }

    /// Structural identity used by the optimizer (constants by bits,
    /// registers by id, variables by name and scope)
    pub fn same_as(&self, other: &IrValue) -> bool {
        match (self, other) {
            (IrValue::Constant(a), IrValue::Constant(b)) => a.same_as(b),
            (IrValue::Register(a), IrValue::Register(b)) => a.id == b.id,
            (IrValue::Variable(a), IrValue::Variable(b)) => {
                a.name == b.name && a.scope == b.scope
            }
            _ => false,
        }
    }
}

impl From<Register> for IrValue {
    fn from(reg: Register) -> Self {
        IrValue::Register(reg)
    }
}

impl From<IrConstant> for IrValue {
    fn from(c: IrConstant) -> Self {
        IrValue::Constant(c)
    }
}

impl From<Variable> for IrValue {
    fn from(v: Variable) -> Self {
        IrValue::Variable(v)
    }
}

impl std::fmt::Display for IrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrValue::Constant(c) => write!(f, "{}", c),
            IrValue::Variable(v) => write!(f, "{}", v),
            IrValue::Register(r) => write!(f, "{}", r),
        }
    }
}
