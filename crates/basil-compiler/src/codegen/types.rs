//! Semantic type and operator mapping per target language
//!
//! `TypeMapper` carries a default table (the .NET spelling) that backends
//! override piecewise: primitive names, compound types, operator tokens,
//! literals and default values.

use super::emitter::{escape_text, format_float};
use crate::ir::{BinaryOp, CompareOp, IrConstant, IrType, UnaryOp};

/// Maps IR types, operators and constants to target syntax
pub trait TypeMapper: Send + Sync {
    /// Name of a non-compound type
    fn primitive(&self, ty: &IrType) -> Option<&'static str> {
        Some(match ty {
            IrType::Void => "void",
            IrType::Boolean => "bool",
            IrType::Byte => "byte",
            IrType::Short => "short",
            IrType::Integer => "int",
            IrType::Long => "long",
            IrType::Single => "float",
            IrType::Double => "double",
            IrType::Decimal => "decimal",
            IrType::Char => "char",
            IrType::String => "string",
            IrType::Date => "DateTime",
            IrType::Object => "object",
            _ => return None,
        })
    }

    fn array_of(&self, elem: &str) -> String {
        format!("{}[]", elem)
    }

    fn tuple_of(&self, elems: &[String]) -> String {
        format!("({})", elems.join(", "))
    }

    fn pointer_to(&self, elem: &str) -> String {
        format!("{}[]", elem)
    }

    fn task_of(&self, inner: &str) -> String {
        if inner == "void" {
            "Task".to_string()
        } else {
            format!("Task<{}>", inner)
        }
    }

    fn class_type(&self, name: &str) -> String {
        name.to_string()
    }

    fn map_type(&self, ty: &IrType) -> String {
        if let Some(name) = self.primitive(ty) {
            return name.to_string();
        }
        match ty {
            IrType::Array(elem) => self.array_of(&self.map_type(elem)),
            IrType::Pointer(elem) => self.pointer_to(&self.map_type(elem)),
            IrType::Task(inner) => self.task_of(&self.map_type(inner)),
            IrType::Tuple(elems) => {
                let elems: Vec<String> = elems.iter().map(|e| self.map_type(e)).collect();
                self.tuple_of(&elems)
            }
            IrType::Class(name) => self.class_type(name),
            _ => "object".to_string(),
        }
    }

    /// Literal of the type's zero value
    fn default_value(&self, ty: &IrType) -> String {
        match ty {
            IrType::Boolean => self.bool_literal(false).to_string(),
            IrType::Single | IrType::Double | IrType::Decimal => "0.0".to_string(),
            IrType::Char => "'\\0'".to_string(),
            t if t.is_integer() => "0".to_string(),
            _ => "default".to_string(),
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }

    fn null_literal(&self) -> &'static str {
        "null"
    }

    fn string_literal(&self, s: &str) -> String {
        format!("\"{}\"", escape_text(s, '"'))
    }

    fn char_literal(&self, c: char) -> String {
        format!("'{}'", escape_text(&c.to_string(), '\''))
    }

    fn float_literal(&self, v: f64, ty: &IrType) -> String {
        let holder = if *ty == IrType::Single { "float" } else { "double" };
        if v.is_nan() {
            return format!("{}.NaN", holder);
        }
        if v.is_infinite() {
            let which = if v > 0.0 { "Positive" } else { "Negative" };
            return format!("{}.{}Infinity", holder, which);
        }
        let text = format_float(v);
        match ty {
            IrType::Single => format!("{}f", text),
            IrType::Decimal => format!("{}m", text),
            _ => text,
        }
    }

    fn int_literal(&self, v: i64, ty: &IrType) -> String {
        match ty {
            IrType::Long => format!("{}L", v),
            _ => v.to_string(),
        }
    }

    fn literal(&self, c: &IrConstant) -> String {
        match c {
            IrConstant::Int(v, ty) => self.int_literal(*v, ty),
            IrConstant::Float(v, ty) => self.float_literal(*v, ty),
            IrConstant::Boolean(b) => self.bool_literal(*b).to_string(),
            IrConstant::Char(ch) => self.char_literal(*ch),
            IrConstant::String(s) => self.string_literal(s),
            IrConstant::Nothing => self.null_literal().to_string(),
        }
    }

    fn binary_token(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add | BinaryOp::Concat => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div | BinaryOp::IntDiv => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }

    /// Full binary expression; `operand_ty` is the left operand's type
    fn binary(
        &self,
        op: BinaryOp,
        left: &str,
        right: &str,
        operand_ty: &IrType,
        result_ty: &IrType,
    ) -> String {
        let _ = result_ty;
        match op {
            BinaryOp::Pow => format!("Math.Pow({}, {})", left, right),
            BinaryOp::Concat => format!("string.Concat({}, {})", left, right),
            BinaryOp::Div if operand_ty.is_integer() => {
                format!("(double){} / {}", left, right)
            }
            BinaryOp::And if *operand_ty == IrType::Boolean => format!("{} && {}", left, right),
            BinaryOp::Or if *operand_ty == IrType::Boolean => format!("{} || {}", left, right),
            _ => format!("{} {} {}", left, self.binary_token(op), right),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &str, ty: &IrType) -> String {
        let _ = ty;
        match op {
            UnaryOp::Neg => format!("-{}", operand),
            UnaryOp::Not => format!("!{}", operand),
            UnaryOp::BitNot => format!("~{}", operand),
        }
    }

    fn compare_token(&self, op: CompareOp) -> &'static str {
        match op {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn compare(&self, op: CompareOp, left: &str, right: &str, operand_ty: &IrType) -> String {
        let ordering = !matches!(op, CompareOp::Eq | CompareOp::Ne);
        if ordering && *operand_ty == IrType::String {
            return format!(
                "string.CompareOrdinal({}, {}) {} 0",
                left,
                right,
                self.compare_token(op)
            );
        }
        format!("{} {} {}", left, self.compare_token(op), right)
    }

    fn cast(&self, value: &str, from: &IrType, to: &IrType) -> String {
        let _ = from;
        format!("({}){}", self.map_type(to), value)
    }
}

/// C# type mapping (the default table)
#[derive(Debug, Clone, Copy, Default)]
pub struct CSharpTypeMapper;

impl TypeMapper for CSharpTypeMapper {
    fn cast(&self, value: &str, from: &IrType, to: &IrType) -> String {
        match to {
            IrType::String => format!("Convert.ToString({})", value),
            IrType::Boolean if from.is_numeric() => format!("({} != 0)", value),
            _ => format!("({}){}", self.map_type(to), value),
        }
    }
}

/// C++ type mapping
#[derive(Debug, Clone, Copy, Default)]
pub struct CppTypeMapper;

impl TypeMapper for CppTypeMapper {
    fn primitive(&self, ty: &IrType) -> Option<&'static str> {
        Some(match ty {
            IrType::Void => "void",
            IrType::Boolean => "bool",
            IrType::Byte => "uint8_t",
            IrType::Short => "int16_t",
            IrType::Integer => "int32_t",
            IrType::Long => "int64_t",
            IrType::Single => "float",
            IrType::Double | IrType::Decimal => "double",
            IrType::Char => "char16_t",
            IrType::String => "std::string",
            IrType::Date => "std::chrono::system_clock::time_point",
            IrType::Object => "std::any",
            _ => return None,
        })
    }

    fn array_of(&self, elem: &str) -> String {
        format!("std::vector<{}>", elem)
    }

    fn tuple_of(&self, elems: &[String]) -> String {
        format!("std::tuple<{}>", elems.join(", "))
    }

    fn pointer_to(&self, elem: &str) -> String {
        format!("{}*", elem)
    }

    fn task_of(&self, inner: &str) -> String {
        format!("std::future<{}>", inner)
    }

    fn class_type(&self, name: &str) -> String {
        format!("std::shared_ptr<{}>", name)
    }

    fn default_value(&self, ty: &IrType) -> String {
        match ty {
            IrType::Boolean => "false".to_string(),
            IrType::Single | IrType::Double | IrType::Decimal => "0.0".to_string(),
            IrType::Char => "u'\\0'".to_string(),
            t if t.is_integer() => "0".to_string(),
            IrType::Class(_) | IrType::Pointer(_) => "nullptr".to_string(),
            _ => "{}".to_string(),
        }
    }

    fn null_literal(&self) -> &'static str {
        "nullptr"
    }

    fn string_literal(&self, s: &str) -> String {
        format!("std::string(\"{}\")", escape_text(s, '"'))
    }

    fn char_literal(&self, c: char) -> String {
        format!("u'{}'", escape_text(&c.to_string(), '\''))
    }

    fn float_literal(&self, v: f64, ty: &IrType) -> String {
        let holder = format!("std::numeric_limits<{}>", self.map_type(ty));
        if v.is_nan() {
            return format!("{}::quiet_NaN()", holder);
        }
        if v.is_infinite() {
            let sign = if v > 0.0 { "" } else { "-" };
            return format!("{}{}::infinity()", sign, holder);
        }
        let text = format_float(v);
        match ty {
            IrType::Single => format!("{}f", text),
            _ => text,
        }
    }

    fn int_literal(&self, v: i64, ty: &IrType) -> String {
        match ty {
            IrType::Long => format!("INT64_C({})", v),
            _ => v.to_string(),
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &str,
        right: &str,
        operand_ty: &IrType,
        _result_ty: &IrType,
    ) -> String {
        match op {
            BinaryOp::Pow => format!("std::pow({}, {})", left, right),
            BinaryOp::Div if operand_ty.is_integer() => {
                format!("static_cast<double>({}) / {}", left, right)
            }
            BinaryOp::Mod if operand_ty.is_float() => format!("std::fmod({}, {})", left, right),
            BinaryOp::Concat => format!("basil_concat({}, {})", left, right),
            BinaryOp::And if *operand_ty == IrType::Boolean => format!("{} && {}", left, right),
            BinaryOp::Or if *operand_ty == IrType::Boolean => format!("{} || {}", left, right),
            _ => format!("{} {} {}", left, self.binary_token(op), right),
        }
    }

    fn compare(&self, op: CompareOp, left: &str, right: &str, _operand_ty: &IrType) -> String {
        format!("{} {} {}", left, self.compare_token(op), right)
    }

    fn cast(&self, value: &str, from: &IrType, to: &IrType) -> String {
        match to {
            IrType::String if from.is_numeric() => format!("std::to_string({})", value),
            IrType::String => format!("basil_to_string({})", value),
            _ => format!("static_cast<{}>({})", self.map_type(to), value),
        }
    }
}

/// Python type mapping (used for annotations)
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonTypeMapper;

impl TypeMapper for PythonTypeMapper {
    fn primitive(&self, ty: &IrType) -> Option<&'static str> {
        Some(match ty {
            IrType::Void => "None",
            IrType::Boolean => "bool",
            IrType::Byte | IrType::Short | IrType::Integer | IrType::Long => "int",
            IrType::Single | IrType::Double => "float",
            IrType::Decimal => "Decimal",
            IrType::Char | IrType::String => "str",
            IrType::Date => "datetime",
            IrType::Object => "object",
            _ => return None,
        })
    }

    fn array_of(&self, elem: &str) -> String {
        format!("list[{}]", elem)
    }

    fn tuple_of(&self, elems: &[String]) -> String {
        format!("tuple[{}]", elems.join(", "))
    }

    fn pointer_to(&self, elem: &str) -> String {
        format!("list[{}]", elem)
    }

    fn task_of(&self, inner: &str) -> String {
        format!("Awaitable[{}]", inner)
    }

    fn class_type(&self, name: &str) -> String {
        name.to_string()
    }

    fn default_value(&self, ty: &IrType) -> String {
        match ty {
            IrType::Boolean => "False".to_string(),
            IrType::Single | IrType::Double => "0.0".to_string(),
            IrType::Decimal => "Decimal(0)".to_string(),
            IrType::Char | IrType::String => "\"\"".to_string(),
            t if t.is_integer() => "0".to_string(),
            _ => "None".to_string(),
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "True"
        } else {
            "False"
        }
    }

    fn null_literal(&self) -> &'static str {
        "None"
    }

    fn char_literal(&self, c: char) -> String {
        self.string_literal(&c.to_string())
    }

    fn float_literal(&self, v: f64, ty: &IrType) -> String {
        if v.is_nan() {
            return "float('nan')".to_string();
        }
        if v.is_infinite() {
            return if v > 0.0 {
                "float('inf')".to_string()
            } else {
                "float('-inf')".to_string()
            };
        }
        match ty {
            IrType::Decimal => format!("Decimal('{}')", format_float(v)),
            _ => format_float(v),
        }
    }

    fn int_literal(&self, v: i64, _ty: &IrType) -> String {
        v.to_string()
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &str,
        right: &str,
        operand_ty: &IrType,
        _result_ty: &IrType,
    ) -> String {
        match op {
            BinaryOp::IntDiv => format!("{} // {}", left, right),
            BinaryOp::Concat => format!("str({}) + str({})", left, right),
            BinaryOp::And if *operand_ty == IrType::Boolean => format!("{} and {}", left, right),
            BinaryOp::Or if *operand_ty == IrType::Boolean => format!("{} or {}", left, right),
            BinaryOp::Xor if *operand_ty == IrType::Boolean => format!("{} != {}", left, right),
            _ => format!("{} {} {}", left, self.binary_token(op), right),
        }
    }

    fn unary(&self, op: UnaryOp, operand: &str, _ty: &IrType) -> String {
        match op {
            UnaryOp::Neg => format!("-{}", operand),
            UnaryOp::Not => format!("not {}", operand),
            UnaryOp::BitNot => format!("~{}", operand),
        }
    }

    fn compare(&self, op: CompareOp, left: &str, right: &str, _operand_ty: &IrType) -> String {
        format!("{} {} {}", left, self.compare_token(op), right)
    }

    fn cast(&self, value: &str, _from: &IrType, to: &IrType) -> String {
        match to {
            t if t.is_integer() => format!("int({})", value),
            IrType::Single | IrType::Double => format!("float({})", value),
            IrType::Decimal => format!("Decimal({})", value),
            IrType::Boolean => format!("bool({})", value),
            IrType::String | IrType::Char => format!("str({})", value),
            _ => value.to_string(),
        }
    }
}
