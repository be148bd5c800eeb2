//! Python backend
//!
//! Python has no `goto`, so functions with more than one block become a
//! dispatch loop over a block-number variable. Straight-line functions are
//! written as plain statements. Classes get an `__init__` that sets field
//! defaults and then runs the source-level `New` body, if any.

use crate::codegen::emitter::{
    check_module, entry_function, inline_code_matches, sanitize_identifier, CodeWriter,
    FunctionScope, Syntax,
};
use crate::codegen::options::GenerationOptions;
use crate::codegen::types::{PythonTypeMapper, TypeMapper};
use crate::codegen::{Generator, InstructionVisitor, Target};
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{
    BinaryOp, BlockId, CompareOp, IrClass, IrConstant, IrFunction, IrInstr, IrModule, IrType,
    IrValue, Register, TryMarker, UnaryOp, VarScope, Variable,
};
use rustc_hash::FxHashSet;

const NAMES: &[&str] = &["python", "py"];

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

const SYNTAX: Syntax = Syntax {
    self_keyword: "self",
    reserved: KEYWORDS,
    statement_end: "",
    line_comment: "#",
};

/// How a function is placed in the output
#[derive(Clone, Copy, PartialEq)]
enum FunctionKind<'m> {
    Free,
    Method,
    /// `__init__` of the given class, prefixed with field initialization
    Init(&'m IrClass),
}

/// Python code generator
pub struct PythonGenerator {
    options: GenerationOptions,
    mapper: PythonTypeMapper,
}

impl PythonGenerator {
    pub fn new(options: GenerationOptions) -> Self {
        Self {
            options,
            mapper: PythonTypeMapper,
        }
    }

    fn identifier(&self, name: &str) -> String {
        sanitize_identifier(name, SYNTAX.self_keyword, SYNTAX.reserved)
    }

    fn type_hints(&self) -> bool {
        self.options.get_bool("python.typeHints", true)
    }

    fn annotated(&self, name: &str, ty: &IrType) -> String {
        if self.type_hints() {
            format!("{}: {}", name, self.mapper.map_type(ty))
        } else {
            name.to_string()
        }
    }

    fn return_annotation(&self, func: &IrFunction, kind: FunctionKind<'_>) -> String {
        if !self.type_hints() {
            return String::new();
        }
        let ty = match kind {
            FunctionKind::Init(_) => "None".to_string(),
            _ if func.is_iterator => format!("Iterator[{}]", self.mapper.map_type(&func.return_ty)),
            _ => self.mapper.map_type(&func.return_ty),
        };
        format!(" -> {}", ty)
    }

    fn write_docstring(&self, w: &mut CodeWriter, doc: &str) {
        let doc = doc.replace("\"\"\"", "\\\"\\\"\\\"");
        let mut lines = doc.lines();
        match (lines.next(), lines.next()) {
            (Some(only), None) => w.line(&format!("\"\"\"{}\"\"\"", only)),
            _ => {
                w.line("\"\"\"");
                for line in doc.lines() {
                    w.line(line);
                }
                w.line("\"\"\"");
            }
        }
    }

    fn write_class(
        &self,
        w: &mut CodeWriter,
        module: &IrModule,
        class: &IrClass,
    ) -> CodegenResult<()> {
        let name = self.identifier(&class.name);
        match &class.base {
            Some(base) => w.line(&format!("class {}({}):", name, self.identifier(base))),
            None => w.line(&format!("class {}:", name)),
        }
        w.indent();
        let start = w.mark();

        let constructor = module
            .methods_of(&class.name)
            .find(|m| m.name.eq_ignore_ascii_case("new"));
        match constructor {
            Some(ctor) => self.write_function(w, module, ctor, FunctionKind::Init(class))?,
            None if !class.fields.is_empty() || class.base.is_some() => {
                let mut header = String::from("def __init__(self)");
                header.push_str(&self.return_annotation_none());
                header.push(':');
                w.line(&header);
                w.indent();
                for line in self.field_defaults(module, class, None) {
                    w.line(&line);
                }
                w.dedent();
            }
            None => {}
        }

        for method in module
            .methods_of(&class.name)
            .filter(|m| !m.name.eq_ignore_ascii_case("new"))
        {
            if w.written_since(start) {
                w.blank();
            }
            self.write_function(w, module, method, FunctionKind::Method)?;
        }
        if !w.written_since(start) {
            w.line("pass");
        }
        w.dedent();
        Ok(())
    }

    fn return_annotation_none(&self) -> String {
        if self.type_hints() {
            " -> None".to_string()
        } else {
            String::new()
        }
    }

    /// `super().__init__()` when needed, then one assignment per field
    fn field_defaults(
        &self,
        module: &IrModule,
        class: &IrClass,
        ctor: Option<&IrFunction>,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        let calls_base_new = ctor.is_some_and(|f| {
            f.blocks.iter().flat_map(|b| &b.instructions).any(|i| {
                matches!(i, IrInstr::CallBase { method, .. } if method.eq_ignore_ascii_case("new"))
            })
        });
        if let Some(base) = &class.base {
            if !calls_base_new && module.get_class(base).is_some() {
                lines.push("super().__init__()".to_string());
            }
        }
        for field in &class.fields {
            let target = format!("self.{}", self.identifier(&field.name));
            lines.push(format!(
                "{} = {}",
                self.annotated(&target, &field.ty),
                self.mapper.default_value(&field.ty)
            ));
        }
        lines
    }

    fn write_function(
        &self,
        w: &mut CodeWriter,
        module: &IrModule,
        func: &IrFunction,
        kind: FunctionKind<'_>,
    ) -> CodegenResult<()> {
        log::trace!("python: generating '{}'", func.name);
        let mut scope =
            FunctionScope::new(func, SYNTAX, &self.mapper, self.options.inline_temporaries);

        let is_method = kind != FunctionKind::Free;
        let mut params: Vec<String> = Vec::with_capacity(func.params.len() + 1);
        if is_method {
            params.push("self".to_string());
        }
        for param in &func.params {
            if is_method && param.name.eq_ignore_ascii_case("me") {
                continue;
            }
            params.push(self.annotated(&scope.variable(param), &param.ty));
        }
        let name = match kind {
            FunctionKind::Init(_) => "__init__".to_string(),
            _ => self.identifier(&func.name),
        };
        let prefix = if func.is_async { "async def" } else { "def" };
        w.line(&format!(
            "{} {}({}){}:",
            prefix,
            name,
            params.join(", "),
            self.return_annotation(func, kind)
        ));
        w.indent();
        let start = w.mark();

        if self.options.generate_doc_comments {
            if let Some(doc) = &func.doc {
                self.write_docstring(w, doc);
            }
        }
        if let FunctionKind::Init(class) = kind {
            for line in self.field_defaults(module, class, Some(func)) {
                w.line(&line);
            }
        }

        let mut globals: Vec<String> = func
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|i| match i {
                IrInstr::Assign { var, .. } if var.scope == VarScope::Global => {
                    Some(scope.variable(var))
                }
                _ => None,
            })
            .collect();
        globals.sort();
        globals.dedup();
        if !globals.is_empty() {
            w.line(&format!("global {}", globals.join(", ")));
        }

        let param_names: FxHashSet<&str> = func.params.iter().map(|p| p.name.as_str()).collect();
        for local in func.locals.iter().filter(|l| !param_names.contains(l.name.as_str())) {
            let line = format!(
                "{} = {}",
                self.annotated(&scope.variable(local), &local.ty),
                self.mapper.default_value(&local.ty)
            );
            w.line(&line);
        }

        let dispatch = if func.blocks.len() > 1 {
            Some(scope.unique("block"))
        } else {
            None
        };
        let mut body = PythonBody {
            gen: self,
            func,
            w: &mut *w,
            scope,
            dispatch: dispatch.clone(),
            try_marks: Vec::new(),
        };

        match dispatch {
            None => {
                for block in &func.blocks {
                    for instr in &block.instructions {
                        instr.accept(&mut body)?;
                    }
                    block.terminator.accept(block.id, &mut body)?;
                }
                if !body.try_marks.is_empty() {
                    return Err(unsupported("unbalanced try regions"));
                }
            }
            Some(state) => {
                let entry = func.entry_id().map(|b| b.0).unwrap_or_default();
                body.w.line(&format!("{} = {}", state, entry));
                body.w.line("while True:");
                body.w.indent();
                for (idx, block) in func.blocks.iter().enumerate() {
                    let keyword = if idx == 0 { "if" } else { "elif" };
                    body.w.line(&format!("{} {} == {}:", keyword, state, block.id.0));
                    body.w.indent();
                    let mark = body.w.mark();
                    for instr in &block.instructions {
                        instr.accept(&mut body)?;
                    }
                    if !body.try_marks.is_empty() {
                        return Err(unsupported("try regions spanning blocks"));
                    }
                    block.terminator.accept(block.id, &mut body)?;
                    if !body.w.written_since(mark) {
                        body.w.line("pass");
                    }
                    body.w.dedent();
                }
                body.w.dedent();
            }
        }

        if !w.written_since(start) {
            w.line("pass");
        }
        w.dedent();
        Ok(())
    }

    fn write_entry_point(&self, w: &mut CodeWriter, module: &IrModule) {
        let Some(entry) = entry_function(module, &self.options) else {
            log::warn!("python: no entry function in module '{}'", module.name);
            return;
        };
        if !entry.params.is_empty() {
            log::warn!("python: entry function '{}' takes parameters", entry.name);
            return;
        }
        let name = self.identifier(&entry.name);
        w.blank();
        w.line("if __name__ == \"__main__\":");
        w.indent();
        if entry.is_async {
            w.line(&format!("asyncio.run({}())", name));
        } else {
            w.line(&format!("{}()", name));
        }
        w.dedent();
    }
}

fn unsupported(what: &str) -> CodegenError {
    CodegenError::Unsupported {
        backend: "python".to_string(),
        what: what.to_string(),
    }
}

impl Generator for PythonGenerator {
    fn target(&self) -> Target {
        Target::Python
    }

    fn backend_name(&self) -> &str {
        "python"
    }

    fn file_extension(&self) -> &str {
        "py"
    }

    fn generate(&mut self, module: &IrModule) -> CodegenResult<String> {
        check_module(module)?;
        let mut w = CodeWriter::new(&self.options);

        if self.options.generate_comments {
            w.line(&format!("# Generated from module '{}'", module.name));
        }
        w.line("from __future__ import annotations");
        w.blank();
        let async_entry = self.options.generate_entry_point
            && entry_function(module, &self.options).is_some_and(|f| f.is_async);
        if async_entry {
            w.line("import asyncio");
        }
        w.line("from datetime import datetime");
        w.line("from decimal import Decimal");
        w.line("from typing import Any, Awaitable, Iterator");
        for extra in self.options.get_list("python.imports") {
            w.line(&format!("import {}", extra));
        }

        if !module.globals.is_empty() {
            w.blank();
            for global in &module.globals {
                let value = match &global.initializer {
                    Some(init) => self.mapper.literal(init),
                    None => self.mapper.default_value(&global.ty),
                };
                let name = self.identifier(&global.name);
                w.line(&format!("{} = {}", self.annotated(&name, &global.ty), value));
            }
        }

        for class in &module.classes {
            w.blank();
            self.write_class(&mut w, module, class)?;
        }
        for func in module.free_functions() {
            w.blank();
            self.write_function(&mut w, module, func, FunctionKind::Free)?;
        }

        if self.options.generate_entry_point {
            self.write_entry_point(&mut w, module);
        }
        Ok(w.finish())
    }
}

/// Visitor writing one function body
struct PythonBody<'a, 'w> {
    gen: &'a PythonGenerator,
    func: &'a IrFunction,
    w: &'w mut CodeWriter,
    scope: FunctionScope<'a>,
    /// Block-number variable of the dispatch loop
    dispatch: Option<String>,
    /// Writer marks at each open `try`/`except`/`finally` clause
    try_marks: Vec<usize>,
}

impl PythonBody<'_, '_> {
    fn mapper(&self) -> &PythonTypeMapper {
        &self.gen.mapper
    }

    fn define(&mut self, dest: &Register, expr: String, atomic: bool) {
        if let Some(stmt) = self.scope.define(dest, expr, atomic) {
            self.w.line(&stmt);
        }
    }

    fn define_or_run(&mut self, dest: Option<&Register>, expr: String) {
        match dest {
            Some(dest) => self.define(dest, expr, true),
            None => self.w.line(&expr),
        }
    }

    /// Phi copies for the edge, then the dispatch assignment
    fn edge(&mut self, from: BlockId, to: BlockId) -> CodegenResult<()> {
        let state = self
            .dispatch
            .clone()
            .ok_or_else(|| unsupported("jumps in a single-block function"))?;
        for copy in self.scope.phi_copies(from, to) {
            self.w.line(&copy);
        }
        self.w.line(&format!("{} = {}", state, to.0));
        Ok(())
    }

    fn guarded(&mut self, keyword: &str, cond: &str, from: BlockId, to: BlockId) -> CodegenResult<()> {
        self.w.line(&format!("{} {}:", keyword, cond));
        self.w.indent();
        self.edge(from, to)?;
        self.w.dedent();
        Ok(())
    }

    /// Close the current clause, writing `pass` if it stayed empty
    fn close_clause(&mut self) -> CodegenResult<()> {
        let mark = self
            .try_marks
            .pop()
            .ok_or_else(|| unsupported("unbalanced try regions"))?;
        if !self.w.written_since(mark) {
            self.w.line("pass");
        }
        self.w.dedent();
        Ok(())
    }

    fn open_clause(&mut self, header: &str) {
        self.w.line(header);
        self.w.indent();
        self.try_marks.push(self.w.mark());
    }
}

impl InstructionVisitor for PythonBody<'_, '_> {
    fn visit_const(&mut self, dest: &Register, value: &IrConstant) -> CodegenResult<()> {
        let text = self.mapper().literal(value);
        let atomic = !text.starts_with('-');
        self.define(dest, text, atomic);
        Ok(())
    }

    fn visit_load_var(&mut self, dest: &Register, var: &Variable) -> CodegenResult<()> {
        let text = self.scope.variable(var);
        self.define(dest, text, true);
        Ok(())
    }

    fn visit_binary(
        &mut self,
        dest: &Register,
        op: BinaryOp,
        left: &IrValue,
        right: &IrValue,
    ) -> CodegenResult<()> {
        let l = self.scope.operand(left);
        let r = self.scope.operand(right);
        let expr = self.mapper().binary(op, &l, &r, &left.ty(), &dest.ty);
        self.define(dest, expr, false);
        Ok(())
    }

    fn visit_unary(&mut self, dest: &Register, op: UnaryOp, operand: &IrValue) -> CodegenResult<()> {
        let text = self.scope.operand(operand);
        let expr = self.mapper().unary(op, &text, &dest.ty);
        self.define(dest, expr, false);
        Ok(())
    }

    fn visit_compare(
        &mut self,
        dest: &Register,
        op: CompareOp,
        left: &IrValue,
        right: &IrValue,
    ) -> CodegenResult<()> {
        let l = self.scope.operand(left);
        let r = self.scope.operand(right);
        let expr = self.mapper().compare(op, &l, &r, &left.ty());
        self.define(dest, expr, false);
        Ok(())
    }

    fn visit_assign(&mut self, var: &Variable, value: &IrValue) -> CodegenResult<()> {
        let line = format!("{} = {}", self.scope.variable(var), self.scope.value(value));
        self.w.line(&line);
        Ok(())
    }

    fn visit_load(&mut self, dest: &Register, address: &IrValue) -> CodegenResult<()> {
        let expr = format!("{}[0]", self.scope.operand(address));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_store(&mut self, address: &IrValue, value: &IrValue) -> CodegenResult<()> {
        let line = format!("{}[0] = {}", self.scope.operand(address), self.scope.value(value));
        self.w.line(&line);
        Ok(())
    }

    fn visit_call(
        &mut self,
        dest: Option<&Register>,
        callee: &str,
        args: &[IrValue],
    ) -> CodegenResult<()> {
        let expr = format!("{}({})", self.gen.identifier(callee), self.scope.args(args));
        self.define_or_run(dest, expr);
        Ok(())
    }

    fn visit_phi(&mut self, _dest: &Register, _incoming: &[(BlockId, IrValue)]) -> CodegenResult<()> {
        Ok(())
    }

    fn visit_alloca(&mut self, dest: &Register, ty: &IrType) -> CodegenResult<()> {
        let expr = format!("[{}]", self.mapper().default_value(ty));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_element_addr(
        &mut self,
        _dest: &Register,
        _base: &IrValue,
        _indices: &[IrValue],
    ) -> CodegenResult<()> {
        Err(unsupported("element addresses"))
    }

    fn visit_cast(&mut self, dest: &Register, value: &IrValue) -> CodegenResult<()> {
        let text = self.scope.value(value);
        let expr = self.mapper().cast(&text, &value.ty(), &dest.ty);
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_label(&mut self, name: &str) -> CodegenResult<()> {
        if self.gen.options.generate_comments {
            self.w.line(&format!("# {}:", name));
        }
        Ok(())
    }

    fn visit_comment(&mut self, text: &str) -> CodegenResult<()> {
        if self.gen.options.generate_comments {
            self.w.prefixed(SYNTAX.line_comment, text);
        }
        Ok(())
    }

    fn visit_new_array(&mut self, dest: &Register, elem_ty: &IrType, len: &IrValue) -> CodegenResult<()> {
        let expr = format!(
            "[{}] * {}",
            self.mapper().default_value(elem_ty),
            self.scope.operand(len)
        );
        self.define(dest, expr, false);
        Ok(())
    }

    fn visit_array_store(&mut self, array: &IrValue, index: &IrValue, value: &IrValue) -> CodegenResult<()> {
        let line = format!(
            "{}[{}] = {}",
            self.scope.operand(array),
            self.scope.value(index),
            self.scope.value(value)
        );
        self.w.line(&line);
        Ok(())
    }

    fn visit_await(&mut self, dest: Option<&Register>, task: &IrValue) -> CodegenResult<()> {
        let expr = format!("await {}", self.scope.operand(task));
        match dest {
            Some(dest) => self.define(dest, expr, false),
            None => self.w.line(&expr),
        }
        Ok(())
    }

    fn visit_yield(&mut self, value: Option<&IrValue>) -> CodegenResult<()> {
        match value {
            Some(v) => {
                let line = format!("yield {}", self.scope.value(v));
                self.w.line(&line);
            }
            None => self.w.line("return"),
        }
        Ok(())
    }

    fn visit_new_object(&mut self, dest: &Register, class: &str, args: &[IrValue]) -> CodegenResult<()> {
        let expr = format!("{}({})", self.gen.identifier(class), self.scope.args(args));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_call_method(
        &mut self,
        dest: Option<&Register>,
        object: &IrValue,
        method: &str,
        args: &[IrValue],
    ) -> CodegenResult<()> {
        let expr = format!(
            "{}.{}({})",
            self.scope.operand(object),
            self.gen.identifier(method),
            self.scope.args(args)
        );
        self.define_or_run(dest, expr);
        Ok(())
    }

    fn visit_call_base(
        &mut self,
        dest: Option<&Register>,
        method: &str,
        args: &[IrValue],
    ) -> CodegenResult<()> {
        let method = if method.eq_ignore_ascii_case("new") {
            "__init__".to_string()
        } else {
            self.gen.identifier(method)
        };
        let expr = format!("super().{}({})", method, self.scope.args(args));
        self.define_or_run(dest, expr);
        Ok(())
    }

    fn visit_load_field(&mut self, dest: &Register, object: &IrValue, field: &str) -> CodegenResult<()> {
        let expr = format!("{}.{}", self.scope.operand(object), self.gen.identifier(field));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_store_field(&mut self, object: &IrValue, field: &str, value: &IrValue) -> CodegenResult<()> {
        let line = format!(
            "{}.{} = {}",
            self.scope.operand(object),
            self.gen.identifier(field),
            self.scope.value(value)
        );
        self.w.line(&line);
        Ok(())
    }

    fn visit_extract_element(&mut self, dest: &Register, tuple: &IrValue, index: u32) -> CodegenResult<()> {
        let expr = format!("{}[{}]", self.scope.operand(tuple), index);
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_try(&mut self, marker: &TryMarker) -> CodegenResult<()> {
        match marker {
            TryMarker::BeginTry => self.open_clause("try:"),
            TryMarker::BeginCatch {
                var,
                exception_type,
            } => {
                self.close_clause()?;
                let ty = exception_type
                    .as_deref()
                    .map(|t| self.gen.identifier(t))
                    .unwrap_or_else(|| "Exception".to_string());
                match var {
                    Some(var) => {
                        let caught = self.scope.unique("caught");
                        self.open_clause(&format!("except {} as {}:", ty, caught));
                        let line = format!("{} = {}", self.scope.variable(var), caught);
                        self.w.line(&line);
                    }
                    None => self.open_clause(&format!("except {}:", ty)),
                }
            }
            TryMarker::BeginFinally => {
                self.close_clause()?;
                self.open_clause("finally:");
            }
            TryMarker::EndTry => self.close_clause()?,
        }
        Ok(())
    }

    fn visit_inline_code(&mut self, language: &str, code: &str) -> CodegenResult<()> {
        if inline_code_matches(language, NAMES) {
            for line in code.lines() {
                self.w.line(line);
            }
        } else if self.gen.options.generate_comments {
            self.w.line(&format!("# inline {} code omitted", language));
        }
        Ok(())
    }

    fn visit_jump(&mut self, from: BlockId, target: BlockId) -> CodegenResult<()> {
        self.edge(from, target)
    }

    fn visit_branch(
        &mut self,
        from: BlockId,
        cond: &IrValue,
        then_block: BlockId,
        else_block: BlockId,
    ) -> CodegenResult<()> {
        let cond = self.scope.value(cond);
        self.guarded("if", &cond, from, then_block)?;
        self.w.line("else:");
        self.w.indent();
        self.edge(from, else_block)?;
        self.w.dedent();
        Ok(())
    }

    fn visit_switch(
        &mut self,
        from: BlockId,
        value: &IrValue,
        cases: &[(IrConstant, BlockId)],
        default: BlockId,
    ) -> CodegenResult<()> {
        if cases.is_empty() {
            return self.edge(from, default);
        }
        let subject = self.scope.operand(value);
        for (idx, (case, target)) in cases.iter().enumerate() {
            let keyword = if idx == 0 { "if" } else { "elif" };
            let cond = format!("{} == {}", subject, self.mapper().literal(case));
            self.guarded(keyword, &cond, from, *target)?;
        }
        self.w.line("else:");
        self.w.indent();
        self.edge(from, default)?;
        self.w.dedent();
        Ok(())
    }

    fn visit_return(&mut self, value: Option<&IrValue>) -> CodegenResult<()> {
        match value {
            Some(v) if !self.func.is_iterator => {
                let line = format!("return {}", self.scope.value(v));
                self.w.line(&line);
            }
            _ => self.w.line("return"),
        }
        Ok(())
    }

    fn visit_unreachable(&mut self) -> CodegenResult<()> {
        self.w.line("raise RuntimeError(\"unreachable\")");
        Ok(())
    }
}
