//! Pretty-printing for IR
//!
//! Canonical human-readable dump: one line per instruction, block headers with
//! predecessor annotations, and a locals listing per function.

use super::block::BasicBlock;
use super::function::IrFunction;
use super::instr::{IrInstr, TryMarker};
use super::module::IrModule;
use super::value::IrValue;
use super::BlockId;
use std::fmt::Write;

/// Trait for pretty-printing IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for IrModule {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        writeln!(output, "; module {}", self.name).unwrap();
        if !self.dependencies.is_empty() {
            writeln!(output, "; imports {}", self.dependencies.join(", ")).unwrap();
        }
        writeln!(output).unwrap();

        for global in &self.globals {
            let kw = if global.is_const { "const" } else { "global" };
            match &global.initializer {
                Some(init) => {
                    writeln!(output, "{} @{}: {} = {}", kw, global.name, global.ty, init).unwrap()
                }
                None => writeln!(output, "{} @{}: {}", kw, global.name, global.ty).unwrap(),
            }
        }
        if !self.globals.is_empty() {
            writeln!(output).unwrap();
        }

        for class in &self.classes {
            match &class.base {
                Some(base) => writeln!(output, "; class {} : {}", class.name, base).unwrap(),
                None => writeln!(output, "; class {}", class.name).unwrap(),
            }
            for field in &class.fields {
                writeln!(output, ";   field {}: {}", field.name, field.ty).unwrap();
            }
            writeln!(output).unwrap();
        }

        for func in &self.functions {
            output.push_str(&func.pretty_print());
            writeln!(output).unwrap();
        }

        output
    }
}

impl PrettyPrint for IrFunction {
    fn pretty_print(&self) -> String {
        let mut output = String::new();

        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p, p.ty))
            .collect();
        let mut modifiers = String::new();
        if self.is_async {
            modifiers.push_str("async ");
        }
        if self.is_iterator {
            modifiers.push_str("iterator ");
        }
        let name = match &self.class {
            Some(class) => format!("{}.{}", class, self.name),
            None => self.name.clone(),
        };
        writeln!(
            output,
            "{}fn {}({}) -> {} {{",
            modifiers,
            name,
            params.join(", "),
            self.return_ty
        )
        .unwrap();

        if !self.locals.is_empty() {
            let locals: Vec<String> = self
                .locals
                .iter()
                .map(|l| format!("{}: {}", l, l.ty))
                .collect();
            writeln!(output, "  ; locals: {}", locals.join(", ")).unwrap();
        }

        let preds = self.predecessors();
        for block in &self.blocks {
            let block_preds = preds.get(&block.id).map(Vec::as_slice).unwrap_or(&[]);
            output.push_str(&block.pretty_print_with_preds(2, block_preds));
        }

        writeln!(output, "}}").unwrap();
        output
    }
}

impl PrettyPrint for BasicBlock {
    fn pretty_print(&self) -> String {
        self.pretty_print_with_preds(0, &[])
    }
}

impl PrettyPrint for IrInstr {
    fn pretty_print(&self) -> String {
        format_instr(self)
    }
}

impl BasicBlock {
    fn pretty_print_with_preds(&self, indent: usize, preds: &[BlockId]) -> String {
        let mut output = String::new();
        let prefix = " ".repeat(indent);

        let mut header = format!("{}{}:", prefix, self.id);
        if let Some(label) = &self.label {
            write!(header, " ; {}", label).unwrap();
        }
        if !preds.is_empty() {
            let names: Vec<String> = preds.iter().map(|p| p.to_string()).collect();
            write!(header, " ; preds: {}", names.join(", ")).unwrap();
        }
        writeln!(output, "{}", header).unwrap();

        for instr in &self.instructions {
            writeln!(output, "{}  {}", prefix, format_instr(instr)).unwrap();
        }
        writeln!(output, "{}  {}", prefix, self.terminator).unwrap();

        output
    }
}

fn format_args(args: &[IrValue]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn with_dest(dest: Option<&super::Register>, body: String) -> String {
    match dest {
        Some(d) => format!("{}: {} = {}", d, d.ty, body),
        None => body,
    }
}

fn format_instr(instr: &IrInstr) -> String {
    match instr {
        IrInstr::Const { dest, value } => with_dest(Some(dest), format!("{}", value)),
        IrInstr::LoadVar { dest, var } => with_dest(Some(dest), format!("load_var {}", var)),
        IrInstr::Binary {
            dest,
            op,
            left,
            right,
        } => with_dest(Some(dest), format!("{} {}, {}", op, left, right)),
        IrInstr::Unary { dest, op, operand } => {
            with_dest(Some(dest), format!("{} {}", op, operand))
        }
        IrInstr::Compare {
            dest,
            op,
            left,
            right,
        } => with_dest(Some(dest), format!("cmp {} {}, {}", op, left, right)),
        IrInstr::Assign { var, value } => format!("{} = {}", var, value),
        IrInstr::Load { dest, address } => with_dest(Some(dest), format!("load {}", address)),
        IrInstr::Store { address, value } => format!("store {}, {}", address, value),
        IrInstr::Call { dest, callee, args } => {
            with_dest(dest.as_ref(), format!("call {}({})", callee, format_args(args)))
        }
        IrInstr::Phi { dest, incoming } => {
            let entries: Vec<String> = incoming
                .iter()
                .map(|(block, value)| format!("{}: {}", block, value))
                .collect();
            with_dest(Some(dest), format!("phi [{}]", entries.join(", ")))
        }
        IrInstr::Alloca { dest, ty } => with_dest(Some(dest), format!("alloca {}", ty)),
        IrInstr::ElementAddr {
            dest,
            base,
            indices,
        } => with_dest(
            Some(dest),
            format!("elem_addr {}[{}]", base, format_args(indices)),
        ),
        IrInstr::Cast { dest, value } => {
            with_dest(Some(dest), format!("cast {} to {}", value, dest.ty))
        }
        IrInstr::Label { name } => format!("label {}", name),
        IrInstr::Comment { text } => format!("; {}", text),
        IrInstr::NewArray { dest, elem_ty, len } => {
            with_dest(Some(dest), format!("new_array {}[{}]", elem_ty, len))
        }
        IrInstr::ArrayStore {
            array,
            index,
            value,
        } => format!("array_store {}[{}], {}", array, index, value),
        IrInstr::Await { dest, task } => with_dest(dest.as_ref(), format!("await {}", task)),
        IrInstr::Yield { value: Some(value) } => format!("yield {}", value),
        IrInstr::Yield { value: None } => "yield".to_string(),
        IrInstr::NewObject { dest, class, args } => {
            with_dest(Some(dest), format!("new {}({})", class, format_args(args)))
        }
        IrInstr::CallMethod {
            dest,
            object,
            method,
            args,
        } => with_dest(
            dest.as_ref(),
            format!("call_method {}.{}({})", object, method, format_args(args)),
        ),
        IrInstr::CallBase { dest, method, args } => with_dest(
            dest.as_ref(),
            format!("call_base {}({})", method, format_args(args)),
        ),
        IrInstr::LoadField {
            dest,
            object,
            field,
        } => with_dest(Some(dest), format!("load_field {}.{}", object, field)),
        IrInstr::StoreField {
            object,
            field,
            value,
        } => format!("store_field {}.{}, {}", object, field, value),
        IrInstr::ExtractElement { dest, tuple, index } => {
            with_dest(Some(dest), format!("extract {}.{}", tuple, index))
        }
        IrInstr::Try(marker) => match marker {
            TryMarker::BeginTry => "try.begin".to_string(),
            TryMarker::BeginCatch {
                var,
                exception_type,
            } => {
                let mut s = "try.catch".to_string();
                if let Some(var) = var {
                    write!(s, " {}", var).unwrap();
                }
                if let Some(ty) = exception_type {
                    write!(s, " as {}", ty).unwrap();
                }
                s
            }
            TryMarker::BeginFinally => "try.finally".to_string(),
            TryMarker::EndTry => "try.end".to_string(),
        },
        IrInstr::InlineCode { language, code } => {
            format!("inline {:?} {:?}", language, code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::block::Terminator;
    use crate::ir::instr::BinaryOp;
    use crate::ir::types::IrType;
    use crate::ir::value::{IrConstant, Register, RegisterId, Variable};

    fn make_reg(id: u32) -> Register {
        Register::new(RegisterId::new(id), IrType::Integer)
    }

    #[test]
    fn test_pretty_print_const() {
        let instr = IrInstr::Const {
            dest: make_reg(0),
            value: IrConstant::integer(42),
        };
        assert_eq!(instr.pretty_print(), "%0: Integer = 42");
    }

    #[test]
    fn test_pretty_print_binary_op() {
        let instr = IrInstr::Binary {
            dest: make_reg(2),
            op: BinaryOp::Add,
            left: make_reg(0).into(),
            right: make_reg(1).into(),
        };
        assert_eq!(instr.pretty_print(), "%2: Integer = add %0, %1");
    }

    #[test]
    fn test_pretty_print_function() {
        let params = vec![
            Variable::param("a", IrType::Integer),
            Variable::param("b", IrType::Integer),
        ];
        let mut func = IrFunction::new("Add", params, IrType::Integer);
        func.add_local(Variable::local("tmp", IrType::Integer));
        let mut entry = BasicBlock::with_label(BlockId(0), "entry");
        entry.set_terminator(Terminator::Jump(BlockId(1)));
        func.add_block(entry);
        let mut exit = BasicBlock::new(BlockId(1));
        exit.set_terminator(Terminator::Return(Some(make_reg(2).into())));
        func.add_block(exit);

        let output = func.pretty_print();
        assert!(output.contains("fn Add($a: Integer, $b: Integer) -> Integer {"));
        assert!(output.contains("; locals: $tmp: Integer"));
        assert!(output.contains("  bb0: ; entry\n"));
        assert!(output.contains("  bb1: ; preds: bb0\n"));
        assert!(output.contains("return %2"));
    }
}
