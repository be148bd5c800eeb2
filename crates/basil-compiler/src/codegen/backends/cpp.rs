//! C++ backend
//!
//! Everything is emitted into one translation unit: a namespace holding the
//! runtime helpers, forward declarations, globals, function prototypes,
//! structs (methods defined inline) and free function definitions. Class
//! instances are handled through `std::shared_ptr`. Bodies use `goto`
//! between block labels like the C# backend.

use crate::codegen::emitter::{
    check_module, entry_function, inline_code_matches, jump_targets, sanitize_identifier,
    CodeWriter, FunctionScope, Syntax,
};
use crate::codegen::options::GenerationOptions;
use crate::codegen::types::{CppTypeMapper, TypeMapper};
use crate::codegen::{Generator, InstructionVisitor, Target};
use crate::error::{CodegenError, CodegenResult};
use crate::ir::{
    BinaryOp, BlockId, CompareOp, IrClass, IrConstant, IrFunction, IrInstr, IrModule, IrType,
    IrValue, Register, RegisterId, TryMarker, UnaryOp, Variable,
};
use rustc_hash::{FxHashMap, FxHashSet};

const NAMES: &[&str] = &["cpp", "c++", "cxx"];

const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "asm", "auto", "bool", "break", "case", "catch", "char",
    "class", "const", "constexpr", "continue", "decltype", "default", "delete", "do", "double",
    "else", "enum", "explicit", "export", "extern", "false", "float", "for", "friend", "goto",
    "if", "inline", "int", "long", "main", "mutable", "namespace", "new", "noexcept", "not",
    "nullptr", "operator", "or", "private", "protected", "public", "register", "return",
    "short", "signed", "sizeof", "static", "struct", "switch", "template", "this", "throw",
    "true", "try", "typedef", "typename", "union", "unsigned", "using", "virtual", "void",
    "volatile", "while", "xor",
];

const SYNTAX: Syntax = Syntax {
    self_keyword: "this",
    reserved: KEYWORDS,
    statement_end: ";",
    line_comment: "//",
};

const DEFAULT_INCLUDES: &[&str] = &[
    "<any>",
    "<chrono>",
    "<cmath>",
    "<cstdint>",
    "<future>",
    "<limits>",
    "<memory>",
    "<sstream>",
    "<stdexcept>",
    "<string>",
    "<tuple>",
    "<vector>",
];

const PRELUDE: &str = "\
template <typename T>
std::string basil_to_string(const T& value) {
    std::ostringstream out;
    out << value;
    return out.str();
}

template <typename A, typename B>
std::string basil_concat(const A& a, const B& b) {
    return basil_to_string(a) + basil_to_string(b);
}";

/// C++ code generator
pub struct CppGenerator {
    options: GenerationOptions,
    mapper: CppTypeMapper,
}

impl CppGenerator {
    pub fn new(options: GenerationOptions) -> Self {
        Self {
            options,
            mapper: CppTypeMapper,
        }
    }

    fn identifier(&self, name: &str) -> String {
        sanitize_identifier(name, SYNTAX.self_keyword, SYNTAX.reserved)
    }

    fn includes(&self, module: &IrModule) -> Vec<String> {
        let mut includes: Vec<String> = DEFAULT_INCLUDES.iter().map(|i| i.to_string()).collect();
        if module.functions.iter().any(|f| f.is_async || f.is_iterator) {
            includes.push("<coroutine>".to_string());
        }
        if module.functions.iter().any(|f| f.is_iterator) {
            includes.push("<generator>".to_string());
        }
        for extra in self.options.get_list("cpp.includes") {
            let include = if extra.starts_with('<') || extra.starts_with('"') {
                extra
            } else {
                format!("<{}>", extra)
            };
            if !includes.contains(&include) {
                includes.push(include);
            }
        }
        includes
    }

    fn return_type(&self, func: &IrFunction) -> String {
        let inner = self.mapper.map_type(&func.return_ty);
        if func.is_iterator {
            return format!("std::generator<{}>", inner);
        }
        if func.is_async {
            return self.mapper.task_of(&inner);
        }
        inner
    }

    fn params(&self, func: &IrFunction, scope: &FunctionScope<'_>) -> String {
        let is_method = func.class.is_some();
        func.params
            .iter()
            .filter(|p| !(is_method && p.name.eq_ignore_ascii_case("me")))
            .map(|p| format!("{} {}", self.mapper.map_type(&p.ty), scope.variable(p)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn prototype(&self, func: &IrFunction) -> String {
        let scope = FunctionScope::new(func, SYNTAX, &self.mapper, false);
        format!(
            "{} {}({});",
            self.return_type(func),
            self.identifier(&func.name),
            self.params(func, &scope)
        )
    }

    /// Classes with in-module bases ordered before their subclasses
    fn class_order<'m>(&self, module: &'m IrModule) -> Vec<&'m IrClass> {
        fn visit<'m>(
            module: &'m IrModule,
            class: &'m IrClass,
            seen: &mut FxHashSet<&'m str>,
            out: &mut Vec<&'m IrClass>,
        ) {
            if !seen.insert(class.name.as_str()) {
                return;
            }
            if let Some(base) = class.base.as_deref().and_then(|b| module.get_class(b)) {
                visit(module, base, seen, out);
            }
            out.push(class);
        }

        let mut seen = FxHashSet::default();
        let mut out = Vec::with_capacity(module.classes.len());
        for class in &module.classes {
            visit(module, class, &mut seen, &mut out);
        }
        out
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
                "struct {} : public {} {{",
                name,
                self.identifier(base)
            )),
            None => w.line(&format!("struct {} {{", name)),
        }
        w.indent();
        for field in &class.fields {
            let qualifier = if field.readonly { "const " } else { "" };
            w.line(&format!(
                "{}{} {}{{}};",
                qualifier,
                self.mapper.map_type(&field.ty),
                self.identifier(&field.name)
            ));
        }
        let has_constructor = module
            .methods_of(&class.name)
            .any(|m| m.name.eq_ignore_ascii_case("new") && m.params.iter().any(|p| !p.name.eq_ignore_ascii_case("me")));
        if has_constructor {
            w.blank();
            w.line(&format!("{}() = default;", name));
        }
        for method in module.methods_of(&class.name) {
            w.blank();
            self.write_function(w, module, method)?;
        }
        w.dedent();
        w.line("};");
        Ok(())
    }

    fn write_function(
        &self,
        w: &mut CodeWriter,
        module: &IrModule,
        func: &IrFunction,
    ) -> CodegenResult<()> {
        log::trace!("cpp: generating '{}'", func.name);
        let mut scope = FunctionScope::new(func, SYNTAX, &self.mapper, self.options.inline_temporaries);

        if self.options.generate_doc_comments {
            if let Some(doc) = &func.doc {
                w.prefixed("///", doc);
            }
        }

        let is_constructor =
            func.class.is_some() && func.name.eq_ignore_ascii_case("new");
        let signature = if is_constructor {
            let class = func.class.as_deref().unwrap_or_default();
            format!("{}({}) {{", self.identifier(class), self.params(func, &scope))
        } else {
            format!(
                "{} {}({}) {{",
                self.return_type(func),
                self.identifier(&func.name),
                self.params(func, &scope)
            )
        };
        w.line(&signature);
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
                "{} {}{{}};",
                self.mapper.map_type(&reg.ty),
                scope.register_name(reg)
            ));
        }
        for (name, ty) in scope.shadow_registers() {
            w.line(&format!("{} {}{{}};", self.mapper.map_type(ty), name));
        }
        let mut slots = FxHashMap::default();
        for instr in func.blocks.iter().flat_map(|b| &b.instructions) {
            if let IrInstr::Alloca { dest, ty } = instr {
                let base = format!("{}_slot", scope.register_name(dest));
                let slot = scope.unique(&base);
                w.line(&format!("{} {}{{}};", self.mapper.map_type(ty), slot));
                slots.insert(dest.id, slot);
            }
        }

        let targets = jump_targets(func);
        let mut body = CppBody {
            gen: self,
            module,
            func,
            w: &mut *w,
            scope,
            slots,
            next: None,
            try_depth: 0,
        };
        for (idx, block) in func.blocks.iter().enumerate() {
            if targets.contains(&block.id) {
                body.w.dedent();
                body.w.line(&format!("{}:;", block.id));
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
            log::warn!("cpp: no entry function in module '{}'", module.name);
            return;
        };
        if !entry.params.is_empty() {
            log::warn!("cpp: entry function '{}' takes parameters", entry.name);
            return;
        }
        let ns = self.identifier(&self.options.namespace);
        let call = if entry.is_async {
            format!("{}::{}().get();", ns, self.identifier(&entry.name))
        } else {
            format!("{}::{}();", ns, self.identifier(&entry.name))
        };
        w.blank();
        w.line("int main() {");
        w.indent();
        w.line(&call);
        w.line("return 0;");
        w.dedent();
        w.line("}");
    }
}

fn unsupported(what: &str) -> CodegenError {
    CodegenError::Unsupported {
        backend: "cpp".to_string(),
        what: what.to_string(),
    }
}

impl Generator for CppGenerator {
    fn target(&self) -> Target {
        Target::Cpp
    }

    fn backend_name(&self) -> &str {
        "cpp"
    }

    fn file_extension(&self) -> &str {
        "cpp"
    }

    fn generate(&mut self, module: &IrModule) -> CodegenResult<String> {
        check_module(module)?;
        let mut w = CodeWriter::new(&self.options);

        if self.options.generate_comments {
            w.line(&format!("// Generated from module '{}'", module.name));
            w.blank();
        }
        for include in self.includes(module) {
            w.line(&format!("#include {}", include));
        }
        w.blank();

        let ns = self.identifier(&self.options.namespace);
        w.line(&format!("namespace {} {{", ns));
        w.blank();
        for line in PRELUDE.lines() {
            w.line(line);
        }

        let classes = self.class_order(module);
        if !classes.is_empty() {
            w.blank();
            for class in &classes {
                w.line(&format!("struct {};", self.identifier(&class.name)));
            }
        }
        if !module.globals.is_empty() {
            w.blank();
            for global in &module.globals {
                let value = match &global.initializer {
                    Some(init) => self.mapper.literal(init),
                    None => self.mapper.default_value(&global.ty),
                };
                let qualifier = if global.is_const { "const " } else { "" };
                w.line(&format!(
                    "{}{} {} = {};",
                    qualifier,
                    self.mapper.map_type(&global.ty),
                    self.identifier(&global.name),
                    value
                ));
            }
        }
        let free: Vec<&IrFunction> = module.free_functions().collect();
        if !free.is_empty() {
            w.blank();
            for func in &free {
                w.line(&self.prototype(func));
            }
        }
        for class in classes {
            w.blank();
            self.write_class(&mut w, module, class)?;
        }
        for func in free {
            w.blank();
            self.write_function(&mut w, module, func)?;
        }

        w.blank();
        w.line(&format!("}}  // namespace {}", ns));
        if self.options.generate_entry_point {
            self.write_entry_point(&mut w, module);
        }
        Ok(w.finish())
    }
}

/// Visitor writing one function body
struct CppBody<'a, 'w> {
    gen: &'a CppGenerator,
    module: &'a IrModule,
    func: &'a IrFunction,
    w: &'w mut CodeWriter,
    scope: FunctionScope<'a>,
    /// Stack slot backing each `Alloca`
    slots: FxHashMap<RegisterId, String>,
    next: Option<BlockId>,
    try_depth: usize,
}

impl CppBody<'_, '_> {
    fn mapper(&self) -> &CppTypeMapper {
        &self.gen.mapper
    }

    fn is_coroutine(&self) -> bool {
        self.func.is_async || self.func.is_iterator
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

    fn edge(&mut self, from: BlockId, to: BlockId) {
        for copy in self.scope.phi_copies(from, to) {
            self.w.line(&copy);
        }
        if self.next != Some(to) {
            self.w.line(&format!("goto {};", to));
        }
    }

    fn guarded_edge(&mut self, cond: &str, from: BlockId, to: BlockId) {
        let copies = self.scope.phi_copies(from, to);
        if copies.is_empty() {
            self.w.line(&format!("if ({}) goto {};", cond, to));
            return;
        }
        self.w.line(&format!("if ({}) {{", cond));
        self.w.indent();
        for copy in copies {
            self.w.line(&copy);
        }
        self.w.line(&format!("goto {};", to));
        self.w.dedent();
        self.w.line("}");
    }
}

impl InstructionVisitor for CppBody<'_, '_> {
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
        let atomic = matches!(op, BinaryOp::Pow | BinaryOp::Concat)
            || (op == BinaryOp::Mod && left.ty().is_float());
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
        let expr = format!("*{}", self.scope.operand(address));
        self.define(dest, expr, false);
        Ok(())
    }

    fn visit_store(&mut self, address: &IrValue, value: &IrValue) -> CodegenResult<()> {
        let line = format!("*{} = {};", self.scope.operand(address), self.scope.value(value));
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

    fn visit_alloca(&mut self, dest: &Register, _ty: &IrType) -> CodegenResult<()> {
        let slot = self
            .slots
            .get(&dest.id)
            .cloned()
            .ok_or_else(|| unsupported("stack slots outside the function body"))?;
        self.define(dest, format!("&{}", slot), false);
        Ok(())
    }

    fn visit_element_addr(
        &mut self,
        dest: &Register,
        base: &IrValue,
        indices: &[IrValue],
    ) -> CodegenResult<()> {
        let mut expr = format!("&{}", self.scope.operand(base));
        for index in indices {
            expr.push_str(&format!("[{}]", self.scope.value(index)));
        }
        self.define(dest, expr, false);
        Ok(())
    }

    fn visit_cast(&mut self, dest: &Register, value: &IrValue) -> CodegenResult<()> {
        let text = self.scope.value(value);
        let expr = self.mapper().cast(&text, &value.ty(), &dest.ty);
        self.define(dest, expr, true);
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
        let expr = format!(
            "{}({})",
            self.mapper().array_of(&self.mapper().map_type(elem_ty)),
            self.scope.value(len)
        );
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
        let expr = format!("co_await {}", self.scope.operand(task));
        self.define_or_run(dest, expr);
        Ok(())
    }

    fn visit_yield(&mut self, value: Option<&IrValue>) -> CodegenResult<()> {
        match value {
            Some(v) => {
                let line = format!("co_yield {};", self.scope.value(v));
                self.w.line(&line);
            }
            None => self.w.line("co_return;"),
        }
        Ok(())
    }

    fn visit_new_object(&mut self, dest: &Register, class: &str, args: &[IrValue]) -> CodegenResult<()> {
        let expr = format!(
            "std::make_shared<{}>({})",
            self.gen.identifier(class),
            self.scope.args(args)
        );
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
            "{}->{}({})",
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
        let base = self
            .func
            .class
            .as_deref()
            .and_then(|c| self.module.get_class(c))
            .and_then(|c| c.base.clone())
            .ok_or_else(|| unsupported("base calls outside a derived class"))?;
        let expr = format!(
            "{}::{}({})",
            self.gen.identifier(&base),
            self.gen.identifier(method),
            self.scope.args(args)
        );
        self.define_or_run(dest, expr);
        Ok(())
    }

    fn visit_load_field(&mut self, dest: &Register, object: &IrValue, field: &str) -> CodegenResult<()> {
        let expr = format!("{}->{}", self.scope.operand(object), self.gen.identifier(field));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_store_field(&mut self, object: &IrValue, field: &str, value: &IrValue) -> CodegenResult<()> {
        let line = format!(
            "{}->{} = {};",
            self.scope.operand(object),
            self.gen.identifier(field),
            self.scope.value(value)
        );
        self.w.line(&line);
        Ok(())
    }

    fn visit_extract_element(&mut self, dest: &Register, tuple: &IrValue, index: u32) -> CodegenResult<()> {
        let expr = format!("std::get<{}>({})", index, self.scope.value(tuple));
        self.define(dest, expr, true);
        Ok(())
    }

    fn visit_try(&mut self, marker: &TryMarker) -> CodegenResult<()> {
        match marker {
            TryMarker::BeginTry => {
                self.w.line("try {");
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
                let ty = exception_type
                    .as_deref()
                    .map(|t| self.gen.identifier(t))
                    .unwrap_or_else(|| "std::exception".to_string());
                match var {
                    Some(var) => {
                        let caught = self.scope.unique("caught");
                        self.w.line(&format!("}} catch (const {}& {}) {{", ty, caught));
                        self.w.indent();
                        let line = format!("{} = {};", self.scope.variable(var), caught);
                        self.w.line(&line);
                    }
                    None if exception_type.is_some() => {
                        self.w.line(&format!("}} catch (const {}&) {{", ty));
                        self.w.indent();
                    }
                    None => {
                        self.w.line("} catch (...) {");
                        self.w.indent();
                    }
                }
            }
            TryMarker::BeginFinally => return Err(unsupported("finally blocks")),
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
        let cond = self.scope.value(cond);
        self.guarded_edge(&cond, from, then_block);
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
        let subject = self.scope.operand(value);
        for (case, target) in cases {
            let cond = format!("{} == {}", subject, self.mapper().literal(case));
            self.guarded_edge(&cond, from, *target);
        }
        self.edge(from, default);
        Ok(())
    }

    fn visit_return(&mut self, value: Option<&IrValue>) -> CodegenResult<()> {
        let keyword = if self.is_coroutine() { "co_return" } else { "return" };
        match value {
            Some(v) if !self.func.is_iterator => {
                let line = format!("{} {};", keyword, self.scope.value(v));
                self.w.line(&line);
            }
            _ => self.w.line(&format!("{};", keyword)),
        }
        Ok(())
    }

    fn visit_unreachable(&mut self) -> CodegenResult<()> {
        self.w.line("throw std::logic_error(\"unreachable\");");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, IrField, IrGlobal};

    fn generate(module: &IrModule, options: GenerationOptions) -> String {
        CppGenerator::new(options).generate(module).unwrap()
    }

    fn counter_module() -> IrModule {
        let mut module = IrModule::new("counter");
        module.add_global(IrGlobal::new("count", IrType::Integer));

        let n = Variable::param("n", IrType::Integer);
        let count = Variable::global("count", IrType::Integer);
        let mut fb = FunctionBuilder::new("Bump", vec![n.clone()], IrType::Void);
        let current = fb.load_var(count.clone());
        let by = fb.load_var(n);
        let next = fb.binary(BinaryOp::Add, current, by);
        fb.assign(count, next);
        fb.ret(None);
        module.add_function(fb.finish().unwrap());
        module
    }

    #[test]
    fn test_translation_unit_layout() {
        let text = generate(&counter_module(), GenerationOptions::default());
        assert!(text.contains("#include <cstdint>"));
        assert!(text.contains("namespace Generated {"));
        assert!(text.contains("int32_t count = 0;"));
        assert!(text.contains("void Bump(int32_t n);"));
        assert!(text.contains("void Bump(int32_t n) {"));
        assert!(text.contains("count = count + n;"));
        assert!(text.contains("}  // namespace Generated"));
        assert!(!text.contains("int main()"));
    }

    #[test]
    fn test_struct_with_base_and_main() {
        let mut module = counter_module();
        module.add_class(IrClass::new("Shape"));
        let mut circle = IrClass::new("Circle").with_base("Shape");
        circle.add_field(IrField::new("Radius", IrType::Double));
        module.add_class(circle);

        let mut fb = FunctionBuilder::new("Main", vec![], IrType::Void);
        let shape = fb.alloc_reg(IrType::class("Circle"));
        fb.emit(IrInstr::NewObject {
            dest: shape.clone(),
            class: "Circle".to_string(),
            args: vec![],
        });
        fb.emit(IrInstr::StoreField {
            object: shape.into(),
            field: "Radius".to_string(),
            value: IrConstant::double(2.5).into(),
        });
        fb.ret(None);
        module.add_function(fb.finish().unwrap());

        let mut options = GenerationOptions::default();
        options.generate_entry_point = true;
        let text = generate(&module, options);
        assert!(text.contains("struct Circle : public Shape {"));
        assert!(text.contains("double Radius{};"));
        assert!(text.contains("t0 = std::make_shared<Circle>();"));
        assert!(text.contains("t0->Radius = 2.5;"));
        assert!(text.contains("int main() {"));
        assert!(text.contains("Generated::Main();"));
        let shape_at = text.find("struct Shape {").unwrap();
        let circle_at = text.find("struct Circle :").unwrap();
        assert!(shape_at < circle_at);
    }

    #[test]
    fn test_finally_unsupported() {
        let mut fb = FunctionBuilder::new("f", vec![], IrType::Void);
        fb.emit(IrInstr::Try(TryMarker::BeginTry));
        fb.emit(IrInstr::Try(TryMarker::BeginFinally));
        fb.emit(IrInstr::Try(TryMarker::EndTry));
        fb.ret(None);
        let mut module = IrModule::new("m");
        module.add_function(fb.finish().unwrap());

        let err = CppGenerator::new(GenerationOptions::default())
            .generate(&module)
            .unwrap_err();
        assert_eq!(err.to_string(), "cpp backend does not support finally blocks");
    }
}
