//! C# backend
//!
//! Free functions and globals go into a static class inside the configured
//! namespace; IR classes become C# classes with their methods. Function
//! bodies keep the block structure: every jump target gets a `bbN:` label
//! and control flow is written with `goto`.

use crate::codegen::emitter::{
    check_module, entry_function, inline_code_matches, jump_targets, CodeWriter,
    FunctionScope, Syntax,
};
use crate::codegen::options::GenerationOptions;
use crate::codegen::types::{CSharpTypeMapper, TypeMapper};
use crate::codegen::{Generator, InstructionVisitor, Target};
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{
    BinaryOp, BlockId, CompareOp, IrClass, IrConstant, IrFunction, IrGlobal, IrModule, IrType,
    IrValue, Register, TryMarker, UnaryOp, Variable,
};
use rustc_hash::FxHashSet;

const NAMES: &[&str] = &["csharp", "cs", "c#"];

const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

const SYNTAX: Syntax = Syntax {
    self_keyword: "this",
    reserved: KEYWORDS,
    statement_end: ";",
    line_comment: "//",
};

const DEFAULT_USINGS: &[&str] = &[
    "System",
    "System.Collections.Generic",
    "System.Threading.Tasks",
];

/// C# code generator
pub struct CSharpGenerator {
    options: GenerationOptions,
    mapper: CSharpTypeMapper,
}

impl CSharpGenerator {
    pub fn new(options: GenerationOptions) -> Self {
        Self {
            options,
            mapper: CSharpTypeMapper,
        }
    }

    fn identifier(&self, name: &str) -> String {
        crate::codegen::emitter::sanitize_identifier(name, SYNTAX.self_keyword, SYNTAX.reserved)
    }

    fn write_global(&self, w: &mut CodeWriter, global: &IrGlobal) {
        let ty = self.mapper.map_type(&global.ty);
        let name = self.identifier(&global.name);
        let value = match &global.initializer {
            Some(init) => self.mapper.literal(init),
            None => self.mapper.default_value(&global.ty),
        };
        let const_type = global.ty.is_numeric()
            || matches!(global.ty, IrType::Boolean | IrType::Char | IrType::String);
        let modifiers = match (global.is_const, &global.initializer) {
            (true, Some(_)) if const_type => "const",
            (true, _) => "static readonly",
            (false, _) => "static",
        };
        w.line(&format!("public {} {} {} = {};", modifiers, ty, name, value));
    }

    fn write_class(
        &self,
        w: &mut CodeWriter,
        module: &IrModule,
        class: &IrClass,
    ) -> CodegenResult<()> {
        let name = self.identifier(&class.name);
        match &class.base {
            Some(base) => w.line(&format!(
                "{} class {} : {}",
                self.options.class_access_modifier,
                name,
                self.identifier(base)
            )),
            None => w.line(&format!("{} class {}", self.options.class_access_modifier, name)),
        }
        w.line("{");
        w.indent();
        for field in &class.fields {
            let readonly = if field.readonly { "readonly " } else { "" };
            w.line(&format!(
                "public {}{} {};",
                readonly,
                self.mapper.map_type(&field.ty),
                self.identifier(&field.name)
            ));
        }
        for method in module.methods_of(&class.name) {
            w.blank();
            self.write_function(w, module, method)?;
        }
        w.dedent();
        w.line("}");
        Ok(())
    }

    fn return_type(&self, func: &IrFunction) -> String {
        let inner = self.mapper.map_type(&func.return_ty);
        if func.is_iterator {
            let elem = if func.return_ty.is_void() { "object".to_string() } else { inner };
            let holder = if func.is_async { "IAsyncEnumerable" } else { "IEnumerable" };
            return format!("{}<{}>", holder, elem);
        }
        if func.is_async {
            return self.mapper.task_of(&inner);
        }
        inner
    }

    fn write_doc(&self, w: &mut CodeWriter, doc: &Option<String>) {
        let Some(doc) = doc else { return };
        if !self.options.generate_doc_comments {
            return;
        }
        w.line("/// <summary>");
        for line in doc.lines() {
            let text = line
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            w.line(format!("/// {}", text).trim_end());
        }
        w.line("/// </summary>");
    }

    fn write_function(
        &self,
        w: &mut CodeWriter,
        module: &IrModule,
        func: &IrFunction,
    ) -> CodegenResult<()> {
        log::trace!("csharp: generating '{}'", func.name);
        let mut scope = FunctionScope::new(func, SYNTAX, &self.mapper, self.options.inline_temporaries);
        let is_method = func.class.is_some();
        if is_method {
            scope = scope.with_global_prefix(self.identifier(&self.options.class_name));
        }

        self.write_doc(w, &func.doc);

        let params: Vec<String> = func
            .params
            .iter()
            .filter(|p| !(is_method && p.name.eq_ignore_ascii_case("me")))
            .map(|p| format!("{} {}", self.mapper.map_type(&p.ty), scope.variable(p)))
            .collect();
        let is_constructor = is_method && func.name.eq_ignore_ascii_case("new");
        let signature = if is_constructor {
            let class = func.class.as_deref().unwrap_or_default();
            format!(
                "{} {}({})",
                self.options.method_access_modifier,
                self.identifier(class),
                params.join(", ")
            )
        } else {
            let mut modifiers = self.options.method_access_modifier.clone();
            if !is_method {
                modifiers.push_str(" static");
            }
            if func.is_async {
                modifiers.push_str(" async");
            }
            format!(
                "{} {} {}({})",
                modifiers,
                self.return_type(func),
                self.identifier(&func.name),
                params.join(", ")
            )
        };
        w.line(&signature);
        w.line("{");
        w.indent();

        let param_names: FxHashSet<&str> = func.params.iter().map(|p| p.name.as_str()).collect();
        for local in func.locals.iter().filter(|l| !param_names.contains(l.name.as_str())) {
            w.line(&format!(
                "{} {} = {};",
                self.mapper.map_type(&local.ty),
                scope.variable(local),
                self.mapper.default_value(&local.ty)
            ));
        }
        for reg in scope.declared_registers() {
            w.line(&format!(
                "{} {} = {};",
                self.mapper.map_type(&reg.ty),
                scope.register_name(reg),
                self.mapper.default_value(&reg.ty)
            ));
        }
        for (name, ty) in scope.shadow_registers() {
            w.line(&format!(
                "{} {} = {};",
                self.mapper.map_type(ty),
                name,
                self.mapper.default_value(ty)
            ));
        }

        let targets = jump_targets(func);
        let mut body = CSharpBody {
            gen: self,
            module,
            func,
            w: &mut *w,
            scope,
            next: None,
            try_depth: 0,
        };
        for (idx, block) in func.blocks.iter().enumerate() {
            if targets.contains(&block.id) {
                body.w.dedent();
                body.w.line(&format!("{}:", block.id));
                body.w.indent();
            }
            for instr in &block.instructions {
                instr.accept(&mut body)?;
            }
            body.next = func.blocks.get(idx + 1).map(|b| b.id);
            block.terminator.accept(block.id, &mut body)?;
        }
        if body.try_depth != 0 {
            return Err(unsupported("unbalanced try regions"));
        }

        w.dedent();
        w.line("}");
        Ok(())
    }

    fn write_entry_point(&self, w: &mut CodeWriter, module: &IrModule) {
        let Some(entry) = entry_function(module, &self.options) else {
            log::warn!("csharp: no entry function in module '{}'", module.name);
            return;
        };
        if !entry.params.is_empty() {
            log::warn!("csharp: entry function '{}' takes parameters", entry.name);
            return;
        }
        let name = self.identifier(&entry.name);
        if name == "Main" {
            // already a valid C# entry point
            return;
        }
        let call = if entry.is_async {
            format!("{}().GetAwaiter().GetResult();", name)
        } else {
            format!("{}();", name)
        };
        w.blank();
        w.line("public static void Main(string[] args)");
        w.line("{");
        w.indent();
        w.line(&call);
        w.dedent();
        w.line("}");
    }
}

fn unsupported(what: &str) -> CodegenError {
    CodegenError::Unsupported {
        backend: "csharp".to_string(),
        what: what.to_string(),
    }
}

impl Generator for CSharpGenerator {
    fn target(&self) -> Target {
        Target::CSharp
    }

    fn backend_name(&self) -> &str {
        "csharp"
    }

    fn file_extension(&self) -> &str {
        "cs"
    }

    fn generate(&mut self, module: &IrModule) -> CodegenResult<String> {
        check_module(module)?;
        let mut w = CodeWriter::new(&self.options);

        if self.options.generate_comments {
            w.line("// <auto-generated>");
            w.line(&format!("// Generated from module '{}'", module.name));
            w.line("// </auto-generated>");
            w.blank();
        }
        let mut usings: Vec<String> = DEFAULT_USINGS.iter().map(|u| u.to_string()).collect();
        for extra in self.options.get_list("csharp.usings") {
            if !usings.contains(&extra) {
                usings.push(extra);
            }
        }
        for using in &usings {
            w.line(&format!("using {};", using));
        }
        w.blank();

        w.line(&format!("namespace {}", self.options.namespace));
        w.line("{");
        w.indent();

        for class in &module.classes {
            self.write_class(&mut w, module, class)?;
            w.blank();
        }

        w.line(&format!(
            "{} static class {}",
            self.options.class_access_modifier,
            self.identifier(&self.options.class_name)
        ));
        w.line("{");
        w.indent();
        for global in &module.globals {
            self.write_global(&mut w, global);
        }
        for func in module.free_functions() {
            w.blank();
            self.write_function(&mut w, module, func)?;
        }
        if self.options.generate_entry_point {
            self.write_entry_point(&mut w, module);
        }
        w.dedent();
        w.line("}");

        w.dedent();
        w.line("}");
        Ok(w.finish())
    }
}

/// Visitor writing one function body
struct CSharpBody<'a, 'w> {
    gen: &'a CSharpGenerator,
    module: &'a IrModule,
    func: &'a IrFunction,
    w: &'w mut CodeWriter,
    scope: FunctionScope<'a>,
    /// Block laid out after the current one
    next: Option<BlockId>,
    try_depth: usize,
}

impl CSharpBody<'_, '_> {
    fn mapper(&self) -> &CSharpTypeMapper {
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
            None => self.w.line(&format!("{};", expr)),
        }
    }

    fn callee(&self, name: &str) -> String {
        let ident = self.gen.identifier(name);
        let is_free = self
            .module
            .get_function(name)
            .is_some_and(|f| f.class.is_none());
        if self.func.class.is_some() && is_free {
            format!("{}.{}", self.gen.identifier(&self.gen.options.class_name), ident)
        } else {
            ident
        }
    }

    /// Phi copies for the edge, then the jump unless it falls through
    fn edge(&mut self, from: BlockId, to: BlockId) {
        for copy in self.scope.phi_copies(from, to) {
            self.w.line(&copy);
        }
        if self.next != Some(to) {
            self.w.line(&format!("goto {};", to));
        }
    }

    fn guarded_edge(&mut self, header: String, from: BlockId, to: BlockId) {
        let copies = self.scope.phi_copies(from, to);
        if copies.is_empty() {
            self.w.line(&format!("{} goto {};", header, to));
            return;
        }
        self.w.line(&header);
        self.w.line("{");
        self.w.indent();
        for copy in copies {
            self.w.line(&copy);
        }
        self.w.line(&format!("goto {};", to));
        self.w.dedent();
        self.w.line("}");
    }

    fn case_literal(&self, case: &IrConstant, value_ty: &IrType) -> String {
        match case {
            IrConstant::Int(v, _) if value_ty.is_integer() => {
                self.mapper().literal(&IrConstant::Int(*v, value_ty.clone()))
            }
            other => self.mapper().literal(other),
        }
    }

    fn new_array_expr(&self, elem_ty: &IrType, len: &str) -> String {
        let elem = self.mapper().map_type(elem_ty);
        match elem.find('[') {
            // jagged arrays put the length on the outermost rank
            Some(at) => format!("new {}[{}]{}", &elem[..at], len, &elem[at..]),
            None => format!("new {}[{}]", elem, len),
        }
    }
}

impl InstructionVisitor for CSharpBody<'_, '_> {
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
        let atomic = op == BinaryOp::Pow || op == BinaryOp::Concat;
        self.define(dest, expr, atomic);
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
        let line = format!("{} = {};", self.scope.variable(var), self.scope.value(value));
        self.w.line(&line);
        Ok(())
    }

    fn visit_load(&mut self, dest: &Register, address: &IrValue) -> CodegenResult<()> {
        let expr = format!("{}[0]", self.scope.operand(address));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_store(&mut self, address: &IrValue, value: &IrValue) -> CodegenResult<()> {
        let line = format!(
            "{}[0] = {};",
            self.scope.operand(address),
            self.scope.value(value)
        );
        self.w.line(&line);
        Ok(())
    }

    fn visit_call(
        &mut self,
        dest: Option<&Register>,
        callee: &str,
        args: &[IrValue],
    ) -> CodegenResult<()> {
        let expr = format!("{}({})", self.callee(callee), self.scope.args(args));
        self.define_or_run(dest, expr);
        Ok(())
    }

    fn visit_phi(&mut self, _dest: &Register, _incoming: &[(BlockId, IrValue)]) -> CodegenResult<()> {
        // lowered into copies on the incoming edges
        Ok(())
    }

    fn visit_alloca(&mut self, dest: &Register, ty: &IrType) -> CodegenResult<()> {
        let expr = self.new_array_expr(ty, "1");
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
        let text = self.scope.operand(value);
        let expr = self.mapper().cast(&text, &value.ty(), &dest.ty);
        self.define(dest, expr, false);
        Ok(())
    }

    fn visit_label(&mut self, name: &str) -> CodegenResult<()> {
        if self.gen.options.generate_comments {
            self.w.line(&format!("// {}:", name));
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
        let expr = self.new_array_expr(elem_ty, &self.scope.value(len));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_array_store(&mut self, array: &IrValue, index: &IrValue, value: &IrValue) -> CodegenResult<()> {
        let line = format!(
            "{}[{}] = {};",
            self.scope.operand(array),
            self.scope.value(index),
            self.scope.value(value)
        );
        self.w.line(&line);
        Ok(())
    }

    fn visit_await(&mut self, dest: Option<&Register>, task: &IrValue) -> CodegenResult<()> {
        let expr = format!("await {}", self.scope.operand(task));
        self.define_or_run(dest, expr);
        Ok(())
    }

    fn visit_yield(&mut self, value: Option<&IrValue>) -> CodegenResult<()> {
        match value {
            Some(v) => {
                let line = format!("yield return {};", self.scope.value(v));
                self.w.line(&line);
            }
            None => self.w.line("yield break;"),
        }
        Ok(())
    }

    fn visit_new_object(&mut self, dest: &Register, class: &str, args: &[IrValue]) -> CodegenResult<()> {
        let expr = format!("new {}({})", self.gen.identifier(class), self.scope.args(args));
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
        let expr = format!("base.{}({})", self.gen.identifier(method), self.scope.args(args));
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
            "{}.{} = {};",
            self.scope.operand(object),
            self.gen.identifier(field),
            self.scope.value(value)
        );
        self.w.line(&line);
        Ok(())
    }

    fn visit_extract_element(&mut self, dest: &Register, tuple: &IrValue, index: u32) -> CodegenResult<()> {
        let expr = format!("{}.Item{}", self.scope.operand(tuple), index + 1);
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_try(&mut self, marker: &TryMarker) -> CodegenResult<()> {
        match marker {
            TryMarker::BeginTry => {
                self.w.line("try");
                self.w.line("{");
                self.w.indent();
                self.try_depth += 1;
            }
            TryMarker::BeginCatch {
                var,
                exception_type,
            } => {
                if self.try_depth == 0 {
                    return Err(unsupported("catch outside a try region"));
                }
                self.w.dedent();
                self.w.line("}");
                let ty = exception_type
                    .as_deref()
                    .map(|t| self.gen.identifier(t))
                    .unwrap_or_else(|| "Exception".to_string());
                match var {
                    Some(var) => {
                        let caught = self.scope.unique("caught");
                        self.w.line(&format!("catch ({} {})", ty, caught));
                        self.w.line("{");
                        self.w.indent();
                        let line = format!("{} = {};", self.scope.variable(var), caught);
                        self.w.line(&line);
                    }
                    None if exception_type.is_some() => {
                        self.w.line(&format!("catch ({})", ty));
                        self.w.line("{");
                        self.w.indent();
                    }
                    None => {
                        self.w.line("catch");
                        self.w.line("{");
                        self.w.indent();
                    }
                }
            }
            TryMarker::BeginFinally => {
                if self.try_depth == 0 {
                    return Err(unsupported("finally outside a try region"));
                }
                self.w.dedent();
                self.w.line("}");
                self.w.line("finally");
                self.w.line("{");
                self.w.indent();
            }
            TryMarker::EndTry => {
                if self.try_depth == 0 {
                    return Err(unsupported("unbalanced try regions"));
                }
                self.try_depth -= 1;
                self.w.dedent();
                self.w.line("}");
            }
        }
        Ok(())
    }

    fn visit_inline_code(&mut self, language: &str, code: &str) -> CodegenResult<()> {
        if inline_code_matches(language, NAMES) {
            for line in code.lines() {
                self.w.line(line);
            }
        } else if self.gen.options.generate_comments {
            self.w.line(&format!("// inline {} code omitted", language));
        }
        Ok(())
    }

    fn visit_jump(&mut self, from: BlockId, target: BlockId) -> CodegenResult<()> {
        self.edge(from, target);
        Ok(())
    }

    fn visit_branch(
        &mut self,
        from: BlockId,
        cond: &IrValue,
        then_block: BlockId,
        else_block: BlockId,
    ) -> CodegenResult<()> {
        let header = format!("if ({})", self.scope.value(cond));
        self.guarded_edge(header, from, then_block);
        self.edge(from, else_block);
        Ok(())
    }

    fn visit_switch(
        &mut self,
        from: BlockId,
        value: &IrValue,
        cases: &[(IrConstant, BlockId)],
        default: BlockId,
    ) -> CodegenResult<()> {
        let value_ty = value.ty();
        let line = format!("switch ({})", self.scope.value(value));
        self.w.line(&line);
        self.w.line("{");
        self.w.indent();
        for (case, target) in cases {
            let label = format!("case {}:", self.case_literal(case, &value_ty));
            self.w.line(&label);
            self.w.indent();
            for copy in self.scope.phi_copies(from, *target) {
                self.w.line(&copy);
            }
            self.w.line(&format!("goto {};", target));
            self.w.dedent();
        }
        self.w.line("default:");
        self.w.indent();
        for copy in self.scope.phi_copies(from, default) {
            self.w.line(&copy);
        }
        self.w.line(&format!("goto {};", default));
        self.w.dedent();
        self.w.dedent();
        self.w.line("}");
        Ok(())
    }

    fn visit_return(&mut self, value: Option<&IrValue>) -> CodegenResult<()> {
        if self.func.is_iterator {
            self.w.line("yield break;");
            return Ok(());
        }
        match value {
            Some(v) => {
                let line = format!("return {};", self.scope.value(v));
                self.w.line(&line);
            }
            None => self.w.line("return;"),
        }
        Ok(())
    }

    fn visit_unreachable(&mut self) -> CodegenResult<()> {
        self.w
            .line("throw new InvalidOperationException(\"unreachable\");");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, IrField};

    fn generate(module: &IrModule, options: GenerationOptions) -> String {
        CSharpGenerator::new(options).generate(module).unwrap()
    }

    fn max_module() -> IrModule {
        let a = Variable::param("a", IrType::Integer);
        let b = Variable::param("b", IrType::Integer);
        let mut fb = FunctionBuilder::new("Max", vec![a.clone(), b.clone()], IrType::Integer);
        let then_block = fb.create_block();
        let else_block = fb.create_block();
        let join = fb.create_block();
        let x = fb.load_var(a);
        let y = fb.load_var(b);
        let cond = fb.compare(CompareOp::Gt, x.clone(), y.clone());
        fb.branch(cond, then_block, else_block);
        fb.switch_to_block(then_block);
        fb.jump(join);
        fb.switch_to_block(else_block);
        fb.jump(join);
        fb.switch_to_block(join);
        let result = fb.phi(
            IrType::Integer,
            vec![(then_block, x.into()), (else_block, y.into())],
        );
        fb.ret(Some(result.into()));

        let mut module = IrModule::new("math");
        module.add_function(fb.finish().unwrap());
        module
    }

    #[test]
    fn test_static_class_layout() {
        let text = generate(&max_module(), GenerationOptions::default());
        assert!(text.contains("namespace Generated\n{"));
        assert!(text.contains("public static class Program"));
        assert!(text.contains("public static int Max(int a, int b)"));
        assert!(text.contains("using System.Threading.Tasks;"));
    }

    #[test]
    fn test_diamond_uses_gotos_and_edge_copies() {
        let text = generate(&max_module(), GenerationOptions::default());
        assert!(text.contains("int t0 = 0;"));
        assert!(text.contains("if (t0 > t1) goto bb1;"));
        assert!(text.contains("bb1:"));
        assert!(text.contains("t3 = t0;"));
        assert!(text.contains("t3 = t1;"));
        assert!(text.contains("return t3;"));
    }

    #[test]
    fn test_class_with_method_and_fields() {
        let mut module = IrModule::new("shapes");
        let mut class = IrClass::new("Point");
        class.add_field(IrField::new("X", IrType::Integer));
        class.add_field(IrField::readonly("Id", IrType::Long));
        module.add_class(class);

        let me = Variable::param("Me", IrType::class("Point"));
        let mut fb = FunctionBuilder::new("GetX", vec![me.clone()], IrType::Integer);
        let dest = fb.alloc_reg(IrType::Integer);
        fb.emit(crate::ir::IrInstr::LoadField {
            dest: dest.clone(),
            object: me.into(),
            field: "X".to_string(),
        });
        fb.ret(Some(dest.into()));
        let mut method = fb.finish().unwrap();
        method.class = Some("Point".to_string());
        module.add_function(method);

        let text = generate(&module, GenerationOptions::default());
        assert!(text.contains("public class Point"));
        assert!(text.contains("public readonly long Id;"));
        assert!(text.contains("public int GetX()"));
        assert!(text.contains("return this.X;"));
    }

    #[test]
    fn test_element_addr_unsupported() {
        let mut fb = FunctionBuilder::new("f", vec![], IrType::Void);
        let arr = fb.alloc_reg(IrType::pointer_to(IrType::Integer));
        fb.emit(crate::ir::IrInstr::ElementAddr {
            dest: arr,
            base: IrConstant::Nothing.into(),
            indices: vec![IrConstant::integer(0).into()],
        });
        fb.ret(None);
        let mut module = IrModule::new("m");
        module.add_function(fb.finish().unwrap());

        let err = CSharpGenerator::new(GenerationOptions::default())
            .generate(&module)
            .unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported { .. }));
    }

    #[test]
    fn test_entry_point_wrapper() {
        let mut fb = FunctionBuilder::new("Start", vec![], IrType::Void);
        fb.ret(None);
        let mut module = IrModule::new("app");
        module.add_function(fb.finish().unwrap());

        let mut options = GenerationOptions::default();
        options.generate_entry_point = true;
        options.set("entryPoint", "start");
        let text = generate(&module, options);
        assert!(text.contains("public static void Main(string[] args)"));
        assert!(text.contains("Start();"));
    }
}
