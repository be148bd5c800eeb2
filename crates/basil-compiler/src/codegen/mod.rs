//! Source-to-source code generation
//!
//! A `Generator` turns an `IrModule` into the text of one target language.
//! Backends walk each function's blocks and dispatch every instruction and
//! terminator through `InstructionVisitor`; the dispatch is an exhaustive
//! match, so a new instruction kind does not compile until every backend
//! handles it.
//!
//! Shared machinery lives in `emitter` (writer, naming, temporary inlining,
//! phi lowering) and `types` (type and operator spelling per target).
//! Generators are looked up by target in a `BackendRegistry`.

pub mod backends;
pub mod emitter;
pub mod options;
pub mod registry;
pub mod types;

pub use backends::{CSharpGenerator, CppGenerator, PythonGenerator};
pub use options::GenerationOptions;
pub use registry::{BackendRegistry, GeneratorFactory};
pub use types::{CSharpTypeMapper, CppTypeMapper, PythonTypeMapper, TypeMapper};

use crate::error::CodegenResult;
use crate::ir::{
    BinaryOp, BlockId, CompareOp, IrConstant, IrInstr, IrModule, IrType, IrValue, Register,
    Terminator, TryMarker, UnaryOp, Variable,
};
use std::fmt;

/// Code generation target
///
/// `Custom` identifies backends registered by embedders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    CSharp,
    Cpp,
    Python,
    Custom(u16),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::CSharp => write!(f, "csharp"),
            Target::Cpp => write!(f, "cpp"),
            Target::Python => write!(f, "python"),
            Target::Custom(n) => write!(f, "custom-{}", n),
        }
    }
}

/// A code generator for one target language
///
/// Generators are created fresh per request by the registry and hold no
/// state shared with other instances.
pub trait Generator: Send {
    fn target(&self) -> Target;

    /// Canonical backend name (also matched against `InlineCode` languages)
    fn backend_name(&self) -> &str;

    fn file_extension(&self) -> &str;

    /// Generate the module's source text
    fn generate(&mut self, module: &IrModule) -> CodegenResult<String>;
}

/// One handler per instruction and terminator kind
pub trait InstructionVisitor {
    fn visit_const(&mut self, dest: &Register, value: &IrConstant) -> CodegenResult<()>;
    fn visit_load_var(&mut self, dest: &Register, var: &Variable) -> CodegenResult<()>;
    fn visit_binary(
        &mut self,
        dest: &Register,
        op: BinaryOp,
        left: &IrValue,
        right: &IrValue,
    ) -> CodegenResult<()>;
    fn visit_unary(&mut self, dest: &Register, op: UnaryOp, operand: &IrValue)
        -> CodegenResult<()>;
    fn visit_compare(
        &mut self,
        dest: &Register,
        op: CompareOp,
        left: &IrValue,
        right: &IrValue,
    ) -> CodegenResult<()>;
    fn visit_assign(&mut self, var: &Variable, value: &IrValue) -> CodegenResult<()>;
    fn visit_load(&mut self, dest: &Register, address: &IrValue) -> CodegenResult<()>;
    fn visit_store(&mut self, address: &IrValue, value: &IrValue) -> CodegenResult<()>;
    fn visit_call(
        &mut self,
        dest: Option<&Register>,
        callee: &str,
        args: &[IrValue],
    ) -> CodegenResult<()>;
    fn visit_phi(&mut self, dest: &Register, incoming: &[(BlockId, IrValue)])
        -> CodegenResult<()>;
    fn visit_alloca(&mut self, dest: &Register, ty: &IrType) -> CodegenResult<()>;
    fn visit_element_addr(
        &mut self,
        dest: &Register,
        base: &IrValue,
        indices: &[IrValue],
    ) -> CodegenResult<()>;
    fn visit_cast(&mut self, dest: &Register, value: &IrValue) -> CodegenResult<()>;
    fn visit_label(&mut self, name: &str) -> CodegenResult<()>;
    fn visit_comment(&mut self, text: &str) -> CodegenResult<()>;
    fn visit_new_array(
        &mut self,
        dest: &Register,
        elem_ty: &IrType,
        len: &IrValue,
    ) -> CodegenResult<()>;
    fn visit_array_store(
        &mut self,
        array: &IrValue,
        index: &IrValue,
        value: &IrValue,
    ) -> CodegenResult<()>;
    fn visit_await(&mut self, dest: Option<&Register>, task: &IrValue) -> CodegenResult<()>;
    fn visit_yield(&mut self, value: Option<&IrValue>) -> CodegenResult<()>;
    fn visit_new_object(
        &mut self,
        dest: &Register,
        class: &str,
        args: &[IrValue],
    ) -> CodegenResult<()>;
    fn visit_call_method(
        &mut self,
        dest: Option<&Register>,
        object: &IrValue,
        method: &str,
        args: &[IrValue],
    ) -> CodegenResult<()>;
    fn visit_call_base(
        &mut self,
        dest: Option<&Register>,
        method: &str,
        args: &[IrValue],
    ) -> CodegenResult<()>;
    fn visit_load_field(&mut self, dest: &Register, object: &IrValue, field: &str)
        -> CodegenResult<()>;
    fn visit_store_field(
        &mut self,
        object: &IrValue,
        field: &str,
        value: &IrValue,
    ) -> CodegenResult<()>;
    fn visit_extract_element(
        &mut self,
        dest: &Register,
        tuple: &IrValue,
        index: u32,
    ) -> CodegenResult<()>;
    fn visit_try(&mut self, marker: &TryMarker) -> CodegenResult<()>;
    fn visit_inline_code(&mut self, language: &str, code: &str) -> CodegenResult<()>;

    fn visit_jump(&mut self, from: BlockId, target: BlockId) -> CodegenResult<()>;
    fn visit_branch(
        &mut self,
        from: BlockId,
        cond: &IrValue,
        then_block: BlockId,
        else_block: BlockId,
    ) -> CodegenResult<()>;
    fn visit_switch(
        &mut self,
        from: BlockId,
        value: &IrValue,
        cases: &[(IrConstant, BlockId)],
        default: BlockId,
    ) -> CodegenResult<()>;
    fn visit_return(&mut self, value: Option<&IrValue>) -> CodegenResult<()>;
    fn visit_unreachable(&mut self) -> CodegenResult<()>;
}

impl IrInstr {
    /// Dispatch to the visitor method for this instruction kind
    pub fn accept<V: InstructionVisitor + ?Sized>(&self, v: &mut V) -> CodegenResult<()> {
        match self {
            IrInstr::Const { dest, value } => v.visit_const(dest, value),
            IrInstr::LoadVar { dest, var } => v.visit_load_var(dest, var),
            IrInstr::Binary {
                dest,
                op,
                left,
                right,
            } => v.visit_binary(dest, *op, left, right),
            IrInstr::Unary { dest, op, operand } => v.visit_unary(dest, *op, operand),
            IrInstr::Compare {
                dest,
                op,
                left,
                right,
            } => v.visit_compare(dest, *op, left, right),
            IrInstr::Assign { var, value } => v.visit_assign(var, value),
            IrInstr::Load { dest, address } => v.visit_load(dest, address),
            IrInstr::Store { address, value } => v.visit_store(address, value),
            IrInstr::Call { dest, callee, args } => v.visit_call(dest.as_ref(), callee, args),
            IrInstr::Phi { dest, incoming } => v.visit_phi(dest, incoming),
            IrInstr::Alloca { dest, ty } => v.visit_alloca(dest, ty),
            IrInstr::ElementAddr {
                dest,
                base,
                indices,
            } => v.visit_element_addr(dest, base, indices),
            IrInstr::Cast { dest, value } => v.visit_cast(dest, value),
            IrInstr::Label { name } => v.visit_label(name),
            IrInstr::Comment { text } => v.visit_comment(text),
            IrInstr::NewArray { dest, elem_ty, len } => v.visit_new_array(dest, elem_ty, len),
            IrInstr::ArrayStore {
                array,
                index,
                value,
            } => v.visit_array_store(array, index, value),
            IrInstr::Await { dest, task } => v.visit_await(dest.as_ref(), task),
            IrInstr::Yield { value } => v.visit_yield(value.as_ref()),
            IrInstr::NewObject { dest, class, args } => v.visit_new_object(dest, class, args),
            IrInstr::CallMethod {
                dest,
                object,
                method,
                args,
            } => v.visit_call_method(dest.as_ref(), object, method, args),
            IrInstr::CallBase { dest, method, args } => {
                v.visit_call_base(dest.as_ref(), method, args)
            }
            IrInstr::LoadField {
                dest,
                object,
                field,
            } => v.visit_load_field(dest, object, field),
            IrInstr::StoreField {
                object,
                field,
                value,
            } => v.visit_store_field(object, field, value),
            IrInstr::ExtractElement { dest, tuple, index } => {
                v.visit_extract_element(dest, tuple, *index)
            }
            IrInstr::Try(marker) => v.visit_try(marker),
            IrInstr::InlineCode { language, code } => v.visit_inline_code(language, code),
        }
    }
}

impl Terminator {
    /// Dispatch to the visitor method for this terminator kind
    pub fn accept<V: InstructionVisitor + ?Sized>(
        &self,
        from: BlockId,
        v: &mut V,
    ) -> CodegenResult<()> {
        match self {
            Terminator::Jump(target) => v.visit_jump(from, *target),
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => v.visit_branch(from, cond, *then_block, *else_block),
            Terminator::Switch {
                value,
                cases,
                default,
            } => v.visit_switch(from, value, cases, *default),
            Terminator::Return(value) => v.visit_return(value.as_ref()),
            Terminator::Unreachable => v.visit_unreachable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, RegisterId};

    /// Records the visited kinds in order
    #[derive(Default)]
    struct KindRecorder {
        seen: Vec<&'static str>,
    }

    macro_rules! record {
        ($self:ident, $kind:expr) => {{
            $self.seen.push($kind);
            Ok(())
        }};
    }

    impl InstructionVisitor for KindRecorder {
        fn visit_const(&mut self, _: &Register, _: &IrConstant) -> CodegenResult<()> {
            record!(self, "const")
        }
        fn visit_load_var(&mut self, _: &Register, _: &Variable) -> CodegenResult<()> {
            record!(self, "load_var")
        }
        fn visit_binary(
            &mut self,
            _: &Register,
            _: BinaryOp,
            _: &IrValue,
            _: &IrValue,
        ) -> CodegenResult<()> {
            record!(self, "binary")
        }
        fn visit_unary(&mut self, _: &Register, _: UnaryOp, _: &IrValue) -> CodegenResult<()> {
            record!(self, "unary")
        }
        fn visit_compare(
            &mut self,
            _: &Register,
            _: CompareOp,
            _: &IrValue,
            _: &IrValue,
        ) -> CodegenResult<()> {
            record!(self, "compare")
        }
        fn visit_assign(&mut self, _: &Variable, _: &IrValue) -> CodegenResult<()> {
            record!(self, "assign")
        }
        fn visit_load(&mut self, _: &Register, _: &IrValue) -> CodegenResult<()> {
            record!(self, "load")
        }
        fn visit_store(&mut self, _: &IrValue, _: &IrValue) -> CodegenResult<()> {
            record!(self, "store")
        }
        fn visit_call(
            &mut self,
            _: Option<&Register>,
            _: &str,
            _: &[IrValue],
        ) -> CodegenResult<()> {
            record!(self, "call")
        }
        fn visit_phi(&mut self, _: &Register, _: &[(BlockId, IrValue)]) -> CodegenResult<()> {
            record!(self, "phi")
        }
        fn visit_alloca(&mut self, _: &Register, _: &IrType) -> CodegenResult<()> {
            record!(self, "alloca")
        }
        fn visit_element_addr(
            &mut self,
            _: &Register,
            _: &IrValue,
            _: &[IrValue],
        ) -> CodegenResult<()> {
            record!(self, "element_addr")
        }
        fn visit_cast(&mut self, _: &Register, _: &IrValue) -> CodegenResult<()> {
            record!(self, "cast")
        }
        fn visit_label(&mut self, _: &str) -> CodegenResult<()> {
            record!(self, "label")
        }
        fn visit_comment(&mut self, _: &str) -> CodegenResult<()> {
            record!(self, "comment")
        }
        fn visit_new_array(&mut self, _: &Register, _: &IrType, _: &IrValue) -> CodegenResult<()> {
            record!(self, "new_array")
        }
        fn visit_array_store(&mut self, _: &IrValue, _: &IrValue, _: &IrValue) -> CodegenResult<()> {
            record!(self, "array_store")
        }
        fn visit_await(&mut self, _: Option<&Register>, _: &IrValue) -> CodegenResult<()> {
            record!(self, "await")
        }
        fn visit_yield(&mut self, _: Option<&IrValue>) -> CodegenResult<()> {
            record!(self, "yield")
        }
        fn visit_new_object(&mut self, _: &Register, _: &str, _: &[IrValue]) -> CodegenResult<()> {
            record!(self, "new_object")
        }
        fn visit_call_method(
            &mut self,
            _: Option<&Register>,
            _: &IrValue,
            _: &str,
            _: &[IrValue],
        ) -> CodegenResult<()> {
            record!(self, "call_method")
        }
        fn visit_call_base(
            &mut self,
            _: Option<&Register>,
            _: &str,
            _: &[IrValue],
        ) -> CodegenResult<()> {
            record!(self, "call_base")
        }
        fn visit_load_field(&mut self, _: &Register, _: &IrValue, _: &str) -> CodegenResult<()> {
            record!(self, "load_field")
        }
        fn visit_store_field(&mut self, _: &IrValue, _: &str, _: &IrValue) -> CodegenResult<()> {
            record!(self, "store_field")
        }
        fn visit_extract_element(&mut self, _: &Register, _: &IrValue, _: u32) -> CodegenResult<()> {
            record!(self, "extract_element")
        }
        fn visit_try(&mut self, _: &TryMarker) -> CodegenResult<()> {
            record!(self, "try")
        }
        fn visit_inline_code(&mut self, _: &str, _: &str) -> CodegenResult<()> {
            record!(self, "inline_code")
        }
        fn visit_jump(&mut self, _: BlockId, _: BlockId) -> CodegenResult<()> {
            record!(self, "jump")
        }
        fn visit_branch(
            &mut self,
            _: BlockId,
            _: &IrValue,
            _: BlockId,
            _: BlockId,
        ) -> CodegenResult<()> {
            record!(self, "branch")
        }
        fn visit_switch(
            &mut self,
            _: BlockId,
            _: &IrValue,
            _: &[(IrConstant, BlockId)],
            _: BlockId,
        ) -> CodegenResult<()> {
            record!(self, "switch")
        }
        fn visit_return(&mut self, _: Option<&IrValue>) -> CodegenResult<()> {
            record!(self, "return")
        }
        fn visit_unreachable(&mut self) -> CodegenResult<()> {
            record!(self, "unreachable")
        }
    }

    #[test]
    fn test_dispatch_reaches_matching_handler() {
        let mut b = FunctionBuilder::new("f", vec![], IrType::Integer);
        let one = b.const_int(1);
        let two = b.binary(BinaryOp::Add, one.clone(), one);
        b.emit(IrInstr::Comment {
            text: "done".to_string(),
        });
        b.ret(Some(two.into()));
        let func = b.finish().unwrap();

        let mut recorder = KindRecorder::default();
        for block in &func.blocks {
            for instr in &block.instructions {
                instr.accept(&mut recorder).unwrap();
            }
            block.terminator.accept(block.id, &mut recorder).unwrap();
        }
        assert_eq!(recorder.seen, vec!["const", "binary", "comment", "return"]);
    }

    #[test]
    fn test_try_and_extract_dispatch() {
        let mut recorder = KindRecorder::default();
        IrInstr::Try(TryMarker::BeginFinally)
            .accept(&mut recorder)
            .unwrap();
        IrInstr::ExtractElement {
            dest: Register::new(RegisterId(0), IrType::Integer),
            tuple: IrValue::Constant(IrConstant::Nothing),
            index: 1,
        }
        .accept(&mut recorder)
        .unwrap();
        Terminator::Unreachable
            .accept(BlockId(0), &mut recorder)
            .unwrap();
        assert_eq!(recorder.seen, vec!["try", "extract_element", "unreachable"]);
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::CSharp.to_string(), "csharp");
        assert_eq!(Target::Custom(7).to_string(), "custom-7");
    }
}
