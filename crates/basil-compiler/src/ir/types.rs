//! Semantic types carried by IR values
//!
//! These are the source language's types after semantic analysis. Backends map
//! them to target type tokens through their `TypeMapper`.

use serde::{Deserialize, Serialize};

/// A semantic type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IrType {
    Void,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Single,
    Double,
    Decimal,
    Char,
    String,
    Date,
    Object,
    /// One-dimensional array of the element type
    Array(Box<IrType>),
    /// User-defined class, by name
    Class(String),
    Tuple(Vec<IrType>),
    /// Address of a storage slot (stack allocation, element address)
    Pointer(Box<IrType>),
    /// Result of an asynchronous function
    Task(Box<IrType>),
}

impl IrType {
    pub fn array_of(elem: IrType) -> Self {
        IrType::Array(Box::new(elem))
    }

    pub fn pointer_to(elem: IrType) -> Self {
        IrType::Pointer(Box::new(elem))
    }

    pub fn task_of(inner: IrType) -> Self {
        IrType::Task(Box::new(inner))
    }

    pub fn class(name: impl Into<String>) -> Self {
        IrType::Class(name.into())
    }

    /// Integral types (including `Byte`)
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            IrType::Byte | IrType::Short | IrType::Integer | IrType::Long
        )
    }

    /// Floating-point and decimal types
    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Single | IrType::Double | IrType::Decimal)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    /// Reference types whose default value is `Nothing`
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            IrType::String
                | IrType::Object
                | IrType::Array(_)
                | IrType::Class(_)
                | IrType::Task(_)
        )
    }

    /// Element type of an array or pointee of a pointer
    pub fn element_type(&self) -> Option<&IrType> {
        match self {
            IrType::Array(elem) | IrType::Pointer(elem) => Some(elem),
            _ => None,
        }
    }

    /// Bit width of an integral type
    pub fn integer_bits(&self) -> Option<u32> {
        match self {
            IrType::Byte => Some(8),
            IrType::Short => Some(16),
            IrType::Integer => Some(32),
            IrType::Long => Some(64),
            _ => None,
        }
    }
}

impl std::fmt::Display for IrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrType::Void => write!(f, "Void"),
            IrType::Boolean => write!(f, "Boolean"),
            IrType::Byte => write!(f, "Byte"),
            IrType::Short => write!(f, "Short"),
            IrType::Integer => write!(f, "Integer"),
            IrType::Long => write!(f, "Long"),
            IrType::Single => write!(f, "Single"),
            IrType::Double => write!(f, "Double"),
            IrType::Decimal => write!(f, "Decimal"),
            IrType::Char => write!(f, "Char"),
            IrType::String => write!(f, "String"),
            IrType::Date => write!(f, "Date"),
            IrType::Object => write!(f, "Object"),
            IrType::Array(elem) => write!(f, "{}()", elem),
            IrType::Class(name) => write!(f, "{}", name),
            IrType::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            IrType::Pointer(elem) => write!(f, "Ptr({})", elem),
            IrType::Task(inner) => write!(f, "Task({})", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(IrType::Integer.to_string(), "Integer");
        assert_eq!(IrType::array_of(IrType::String).to_string(), "String()");
        assert_eq!(
            IrType::Tuple(vec![IrType::Integer, IrType::Boolean]).to_string(),
            "(Integer, Boolean)"
        );
    }

    #[test]
    fn test_type_categories() {
        assert!(IrType::Long.is_integer());
        assert!(!IrType::Double.is_integer());
        assert!(IrType::Decimal.is_numeric());
        assert!(IrType::class("Point").is_reference());
        assert!(!IrType::Integer.is_reference());
        assert_eq!(IrType::Short.integer_bits(), Some(16));
    }
}
