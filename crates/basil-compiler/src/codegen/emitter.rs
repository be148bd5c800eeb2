//! Shared generator machinery
//!
//! - `CodeWriter`: line-oriented output with indentation
//! - `FunctionScope`: per-function names for registers and variables,
//!   single-use temporary inlining and phi lowering into edge copies
//! - literal helpers and identifier sanitization

use super::options::GenerationOptions;
use super::types::TypeMapper;
use crate::error::CodegenResult;
use crate::ir::{
    BlockId, IrFunction, IrInstr, IrModule, IrType, IrValue, Register, RegisterId, VarScope,
    Variable,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Lexical conventions of a target language
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    /// Replacement for the source-level `Me`
    pub self_keyword: &'static str,
    pub reserved: &'static [&'static str],
    pub statement_end: &'static str,
    pub line_comment: &'static str,
}

/// Indented text output
pub struct CodeWriter {
    output: String,
    indent: usize,
    unit: String,
}

impl CodeWriter {
    pub fn new(options: &GenerationOptions) -> Self {
        Self {
            output: String::new(),
            indent: 0,
            unit: options.indent_unit(),
        }
    }

    /// Write one line at the current indentation
    pub fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.output.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.output.push_str(&self.unit);
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    /// Write every line of `text` behind `prefix`
    pub fn prefixed(&mut self, prefix: &str, text: &str) {
        for line in text.lines() {
            if line.is_empty() {
                self.line(prefix.trim_end());
            } else {
                self.line(&format!("{} {}", prefix, line));
            }
        }
    }

    /// Separate sections by a single blank line
    pub fn blank(&mut self) {
        if self.output.is_empty() || self.output.ends_with("\n\n") {
            return;
        }
        self.output.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn mark(&self) -> usize {
        self.output.len()
    }

    pub fn written_since(&self, mark: usize) -> bool {
        self.output.len() > mark
    }

    pub fn finish(mut self) -> String {
        if !self.output.ends_with('\n') {
            self.output.push('\n');
        }
        self.output
    }
}

/// Make `name` a valid identifier of the target
pub fn sanitize_identifier(name: &str, self_keyword: &str, reserved: &[&str]) -> String {
    if name.eq_ignore_ascii_case("me") {
        return self_keyword.to_string();
    }
    let mut out: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if reserved.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

/// Escape `s` for a literal delimited by `quote`
pub fn escape_text(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Shortest round-tripping decimal text, always with a fraction or exponent
pub fn format_float(v: f64) -> String {
    format!("{:?}", v)
}

/// Whether an `InlineCode` block written for `language` belongs to a backend
pub fn inline_code_matches(language: &str, names: &[&str]) -> bool {
    let language = language.trim();
    language.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(language))
}

/// Reject modules the backends cannot lower
pub fn check_module(module: &IrModule) -> CodegenResult<()> {
    if let Err(errors) = module.validate() {
        if let Some(first) = errors.into_iter().next() {
            return Err(first.into());
        }
    }
    for func in &module.functions {
        func.check_codegen_ready()?;
    }
    Ok(())
}

/// The free function called by a generated entry point
pub fn entry_function<'m>(
    module: &'m IrModule,
    options: &GenerationOptions,
) -> Option<&'m IrFunction> {
    let name = options.get_str("entryPoint").unwrap_or("Main");
    module
        .free_functions()
        .find(|f| f.name.eq_ignore_ascii_case(name))
}

/// Blocks that are the target of some terminator
pub fn jump_targets(func: &IrFunction) -> FxHashSet<BlockId> {
    func.blocks
        .iter()
        .flat_map(|b| b.terminator.successors())
        .collect()
}

#[derive(Debug, Clone)]
struct Expr {
    text: String,
    atomic: bool,
}

/// Naming and inlining state for one function
pub struct FunctionScope<'a> {
    func: &'a IrFunction,
    syntax: Syntax,
    mapper: &'a dyn TypeMapper,
    global_prefix: Option<String>,
    names: FxHashMap<RegisterId, String>,
    variables: FxHashMap<String, String>,
    taken: FxHashSet<String>,
    inlined: FxHashSet<RegisterId>,
    pending: FxHashMap<RegisterId, Expr>,
    shadows: FxHashMap<RegisterId, String>,
}

impl<'a> FunctionScope<'a> {
    pub fn new(
        func: &'a IrFunction,
        syntax: Syntax,
        mapper: &'a dyn TypeMapper,
        inline_temporaries: bool,
    ) -> Self {
        let mut scope = FunctionScope {
            func,
            syntax,
            mapper,
            global_prefix: None,
            names: FxHashMap::default(),
            variables: FxHashMap::default(),
            taken: FxHashSet::default(),
            inlined: FxHashSet::default(),
            pending: FxHashMap::default(),
            shadows: FxHashMap::default(),
        };
        scope.taken.insert(syntax.self_keyword.to_string());

        for var in func.params.iter().chain(&func.locals) {
            if scope.variables.contains_key(&var.name) {
                continue;
            }
            let base = sanitize_identifier(&var.name, syntax.self_keyword, syntax.reserved);
            let name = if base == syntax.self_keyword {
                base
            } else {
                scope.unique(&base)
            };
            scope.variables.insert(var.name.clone(), name);
        }

        let mut temp = 0;
        for instr in func.blocks.iter().flat_map(|b| &b.instructions) {
            let Some(dest) = instr.dest() else { continue };
            let name = match &dest.name {
                Some(hint) => {
                    let base = sanitize_identifier(hint, syntax.self_keyword, syntax.reserved);
                    scope.unique(&base)
                }
                None => loop {
                    let candidate = format!("t{}", temp);
                    temp += 1;
                    if !scope.taken.contains(&candidate) {
                        scope.taken.insert(candidate.clone());
                        break candidate;
                    }
                },
            };
            scope.names.insert(dest.id, name);
        }

        if inline_temporaries {
            scope.inlined = inline_candidates(func);
            for instr in func.blocks.iter().flat_map(|b| &b.instructions) {
                if let IrInstr::Const { dest, value } = instr {
                    let text = mapper.literal(value);
                    let atomic = !text.starts_with('-');
                    scope.pending.insert(dest.id, Expr { text, atomic });
                }
            }
        }

        for block in &func.blocks {
            if block.phi_count() < 2 {
                continue;
            }
            for phi in block.phis() {
                if let Some(dest) = phi.dest() {
                    let base = format!("{}_next", scope.names[&dest.id]);
                    let shadow = scope.unique(&base);
                    scope.shadows.insert(dest.id, shadow);
                }
            }
        }
        scope
    }

    /// Qualify global variable references with `prefix.`
    pub fn with_global_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.global_prefix = Some(prefix.into());
        self
    }

    pub fn function(&self) -> &'a IrFunction {
        self.func
    }

    /// Reserve a fresh identifier based on `base`
    pub fn unique(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 1;
        while self.taken.contains(&candidate) || self.syntax.reserved.contains(&candidate.as_str())
        {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    pub fn identifier(&self, name: &str) -> String {
        sanitize_identifier(name, self.syntax.self_keyword, self.syntax.reserved)
    }

    pub fn register_name(&self, reg: &Register) -> String {
        match self.names.get(&reg.id) {
            Some(name) => name.clone(),
            None => format!("t{}", reg.id.as_u32()),
        }
    }

    pub fn variable(&self, var: &Variable) -> String {
        match var.scope {
            VarScope::Global => {
                let name = self.identifier(&var.name);
                match &self.global_prefix {
                    Some(prefix) => format!("{}.{}", prefix, name),
                    None => name,
                }
            }
            VarScope::Local | VarScope::Param => match self.variables.get(&var.name) {
                Some(name) => name.clone(),
                None => self.identifier(&var.name),
            },
        }
    }

    pub fn is_inlined(&self, reg: &Register) -> bool {
        self.inlined.contains(&reg.id)
    }

    /// Value text for contexts that need no grouping (arguments, assignments)
    pub fn value(&self, value: &IrValue) -> String {
        match value {
            IrValue::Register(r) => match self.pending.get(&r.id) {
                Some(expr) => expr.text.clone(),
                None => self.register_name(r),
            },
            IrValue::Constant(c) => self.mapper.literal(c),
            IrValue::Variable(v) => self.variable(v),
        }
    }

    /// Value text as an operator operand, parenthesized when compound
    pub fn operand(&self, value: &IrValue) -> String {
        match value {
            IrValue::Register(r) => match self.pending.get(&r.id) {
                Some(Expr { text, atomic: true }) => text.clone(),
                Some(Expr { text, .. }) => format!("({})", text),
                None => self.register_name(r),
            },
            IrValue::Constant(c) => {
                let text = self.mapper.literal(c);
                if text.starts_with('-') {
                    format!("({})", text)
                } else {
                    text
                }
            }
            IrValue::Variable(v) => self.variable(v),
        }
    }

    pub fn args(&self, args: &[IrValue]) -> String {
        args.iter()
            .map(|a| self.value(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Bind `dest` to `expr`; returns the assignment statement unless the
    /// register is inlined into its single use
    pub fn define(&mut self, dest: &Register, expr: String, atomic: bool) -> Option<String> {
        if self.inlined.contains(&dest.id) {
            if !self.pending.contains_key(&dest.id) {
                self.pending.insert(dest.id, Expr { text: expr, atomic });
            }
            return None;
        }
        Some(format!(
            "{} = {}{}",
            self.register_name(dest),
            expr,
            self.syntax.statement_end
        ))
    }

    /// Registers that need a declaration, by id
    pub fn declared_registers(&self) -> Vec<&'a Register> {
        let mut regs: Vec<&Register> = self
            .func
            .blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .filter_map(|i| i.dest())
            .filter(|r| !self.inlined.contains(&r.id))
            .collect();
        regs.sort_by_key(|r| r.id);
        regs
    }

    /// Shadow copies used to lower phis in parallel, by phi register id
    pub fn shadow_registers(&self) -> Vec<(String, &'a IrType)> {
        let mut out: Vec<(RegisterId, String, &IrType)> = self
            .func
            .blocks
            .iter()
            .flat_map(|b| b.phis())
            .filter_map(|phi| phi.dest())
            .filter_map(|d| self.shadows.get(&d.id).map(|s| (d.id, s.clone(), &d.ty)))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out.into_iter().map(|(_, name, ty)| (name, ty)).collect()
    }

    /// Statements realizing the phis of `to` on the edge from `from`
    ///
    /// When one copy reads a register another copy of the same edge
    /// overwrites, all sources go through shadow variables first.
    pub fn phi_copies(&self, from: BlockId, to: BlockId) -> Vec<String> {
        let Some(block) = self.func.get_block(to) else {
            return Vec::new();
        };
        let phi_ids: FxHashSet<RegisterId> =
            block.phis().filter_map(|p| p.dest()).map(|d| d.id).collect();

        let mut moves = Vec::new();
        for phi in block.phis() {
            let IrInstr::Phi { dest, incoming } = phi else {
                continue;
            };
            let Some((_, value)) = incoming.iter().find(|(pred, _)| *pred == from) else {
                continue;
            };
            if value.is_register(dest.id) {
                continue;
            }
            let overlaps = value.as_register().is_some_and(|r| phi_ids.contains(&r.id));
            moves.push((dest, self.value(value), overlaps));
        }

        let end = self.syntax.statement_end;
        let parallel = moves.len() > 1 && moves.iter().any(|(_, _, overlaps)| *overlaps);
        if !parallel {
            return moves
                .into_iter()
                .map(|(dest, src, _)| format!("{} = {}{}", self.register_name(dest), src, end))
                .collect();
        }

        let mut out = Vec::with_capacity(moves.len() * 2);
        for (dest, src, _) in &moves {
            out.push(format!("{} = {}{}", self.shadows[&dest.id], src, end));
        }
        for (dest, _, _) in &moves {
            out.push(format!(
                "{} = {}{}",
                self.register_name(dest),
                self.shadows[&dest.id],
                end
            ));
        }
        out
    }
}

/// Registers whose defining expression can be substituted into the use
///
/// Constants always qualify. Other pure results qualify when used exactly
/// once, later in the same block and not by a phi, with no intervening write
/// when the expression reads memory, reads a variable operand or can trap.
fn inline_candidates(func: &IrFunction) -> FxHashSet<RegisterId> {
    let counts = func.use_counts();
    let mut inlined = FxHashSet::default();
    let mut sensitive: FxHashSet<RegisterId> = FxHashSet::default();

    for block in &func.blocks {
        for (i, instr) in block.instructions.iter().enumerate() {
            let Some(dest) = instr.dest() else { continue };
            if matches!(instr, IrInstr::Const { .. }) {
                inlined.insert(dest.id);
                continue;
            }
            if instr.has_side_effects()
                || instr.is_phi()
                || matches!(instr, IrInstr::Alloca { .. })
                || counts.get(&dest.id).copied() != Some(1)
            {
                continue;
            }

            let operands = instr.operands();
            let is_sensitive = instr.reads_memory()
                || instr.may_trap()
                || operands.iter().any(|op| matches!(op, IrValue::Variable(_)))
                || operands
                    .iter()
                    .filter_map(|op| op.as_register())
                    .any(|r| sensitive.contains(&r.id));

            let rest = &block.instructions[i + 1..];
            let use_at = rest
                .iter()
                .position(|u| u.operands().iter().any(|op| op.is_register(dest.id)));
            let between = match use_at {
                Some(j) if rest[j].is_phi() => continue,
                Some(j) => &rest[..j],
                None => {
                    let in_terminator = block
                        .terminator
                        .operands()
                        .iter()
                        .any(|op| op.is_register(dest.id));
                    if !in_terminator {
                        continue;
                    }
                    rest
                }
            };
            let blocked = is_sensitive
                && between
                    .iter()
                    .any(|x| x.has_side_effects() || x.writes_memory());
            if blocked {
                continue;
            }

            inlined.insert(dest.id);
            if is_sensitive {
                sensitive.insert(dest.id);
            }
        }
    }
    inlined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::types::CSharpTypeMapper;
    use crate::ir::{BinaryOp, CompareOp, FunctionBuilder, IrConstant, IrType};

    const SYNTAX: Syntax = Syntax {
        self_keyword: "this",
        reserved: &["class", "int"],
        statement_end: ";",
        line_comment: "//",
    };

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("name$", "this", &[]), "name");
        assert_eq!(sanitize_identifier("2nd", "this", &[]), "_2nd");
        assert_eq!(sanitize_identifier("Me", "self", &[]), "self");
        assert_eq!(sanitize_identifier("class", "this", &["class"]), "class_");
        assert_eq!(sanitize_identifier("$", "this", &[]), "_");
    }

    #[test]
    fn test_escape_and_floats() {
        assert_eq!(escape_text("a\"b\\c\n", '"'), "a\\\"b\\\\c\\n");
        assert_eq!(escape_text("it's", '"'), "it's");
        assert_eq!(escape_text("\u{1}", '"'), "\\u0001");
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(1e20), "1e20");
    }

    #[test]
    fn test_writer_indentation() {
        let mut options = GenerationOptions::default();
        options.indent_size = 2;
        let mut w = CodeWriter::new(&options);
        w.line("a {");
        w.indent();
        w.line("b;");
        w.dedent();
        w.line("}");
        w.blank();
        w.blank();
        w.line("c");
        assert_eq!(w.finish(), "a {\n  b;\n}\n\nc\n");

        options.use_tabs = true;
        let mut w = CodeWriter::new(&options);
        w.indent();
        let mark = w.mark();
        assert!(!w.written_since(mark));
        w.line("x");
        assert!(w.written_since(mark));
        assert_eq!(w.finish(), "\tx\n");
    }

    #[test]
    fn test_single_use_temporaries_inline() {
        let x = Variable::param("x", IrType::Integer);
        let mut b = FunctionBuilder::new("f", vec![x.clone()], IrType::Integer);
        let v = b.load_var(x);
        let one = b.const_int(1);
        let sum = b.binary(BinaryOp::Add, v, one);
        let doubled = b.binary(BinaryOp::Mul, sum.clone(), IrConstant::integer(2));
        b.ret(Some(doubled.into()));
        let func = b.finish().unwrap();

        let mut scope = FunctionScope::new(&func, SYNTAX, &CSharpTypeMapper, true);
        for instr in &func.blocks[0].instructions {
            match instr {
                IrInstr::LoadVar { dest, var } => {
                    let text = scope.variable(var);
                    assert!(scope.define(dest, text, true).is_none());
                }
                IrInstr::Binary {
                    dest,
                    op,
                    left,
                    right,
                } => {
                    let text = format!("{} {} {}", scope.operand(left), op, scope.operand(right));
                    assert!(scope.define(dest, text, false).is_none());
                }
                _ => {}
            }
        }
        let returned = func.blocks[0].terminator.operands()[0];
        assert_eq!(scope.value(returned), "(x add 1) mul 2");
        assert!(scope.declared_registers().is_empty());
    }

    #[test]
    fn test_load_not_moved_past_assign() {
        let g = Variable::global("g", IrType::Integer);
        let mut b = FunctionBuilder::new("f", vec![], IrType::Integer);
        let before = b.load_var(g.clone());
        b.assign(g, IrConstant::integer(5));
        b.ret(Some(before.clone().into()));
        let func = b.finish().unwrap();

        let scope = FunctionScope::new(&func, SYNTAX, &CSharpTypeMapper, true);
        assert!(!scope.is_inlined(&before));
        assert_eq!(scope.declared_registers().len(), 1);
    }

    #[test]
    fn test_variable_operand_not_moved_past_assign() {
        let x = Variable::param("x", IrType::Integer);
        let mut b = FunctionBuilder::new("f", vec![x.clone()], IrType::Integer);
        let sum = b.binary(BinaryOp::Add, x.clone(), IrConstant::integer(1));
        b.assign(x, IrConstant::integer(5));
        b.ret(Some(sum.clone().into()));
        let func = b.finish().unwrap();

        let scope = FunctionScope::new(&func, SYNTAX, &CSharpTypeMapper, true);
        assert!(!scope.is_inlined(&sum));
        assert_eq!(scope.declared_registers().len(), 1);
    }

    #[test]
    fn test_variable_operand_inlined_without_write() {
        let x = Variable::param("x", IrType::Integer);
        let mut b = FunctionBuilder::new("f", vec![x.clone()], IrType::Integer);
        let sum = b.binary(BinaryOp::Add, x, IrConstant::integer(1));
        b.ret(Some(sum.clone().into()));
        let func = b.finish().unwrap();

        let scope = FunctionScope::new(&func, SYNTAX, &CSharpTypeMapper, true);
        assert!(scope.is_inlined(&sum));
    }

    #[test]
    fn test_temporaries_disabled() {
        let mut b = FunctionBuilder::new("f", vec![], IrType::Boolean);
        let one = b.const_int(1);
        let cmp = b.compare(CompareOp::Lt, one.clone(), IrConstant::integer(2));
        b.ret(Some(cmp.into()));
        let func = b.finish().unwrap();

        let mut scope = FunctionScope::new(&func, SYNTAX, &CSharpTypeMapper, false);
        assert_eq!(
            scope.define(&one, "1".to_string(), true).as_deref(),
            Some("t0 = 1;")
        );
        assert_eq!(scope.declared_registers().len(), 2);
    }

    #[test]
    fn test_hint_names_are_unique() {
        let x = Variable::local("x", IrType::Integer);
        let mut func = IrFunction::new("f", vec![], IrType::Void);
        func.add_local(x);
        let mut block = crate::ir::BasicBlock::new(BlockId(0));
        let hinted = func.new_named_register(IrType::Integer, "x");
        let class = func.new_named_register(IrType::Integer, "class");
        block.add_instr(IrInstr::Call {
            dest: Some(hinted.clone()),
            callee: "g".to_string(),
            args: vec![],
        });
        block.add_instr(IrInstr::Call {
            dest: Some(class.clone()),
            callee: "g".to_string(),
            args: vec![],
        });
        block.set_terminator(crate::ir::Terminator::Return(None));
        func.add_block(block);

        let scope = FunctionScope::new(&func, SYNTAX, &CSharpTypeMapper, true);
        assert_eq!(scope.register_name(&hinted), "x_1");
        assert_eq!(scope.register_name(&class), "class_");
    }

    #[test]
    fn test_phi_swap_uses_shadows() {
        // loop header swapping a and b every iteration
        let mut b = FunctionBuilder::new("swap", vec![], IrType::Void);
        let header = b.create_block();
        let exit = b.create_block();
        b.jump(header);

        b.switch_to_block(header);
        let a = b.alloc_reg(IrType::Integer);
        let c = b.alloc_reg(IrType::Integer);
        let block = b.func_mut().get_block_mut(header).unwrap();
        block.add_instr(IrInstr::Phi {
            dest: a.clone(),
            incoming: vec![
                (BlockId(0), IrConstant::integer(1).into()),
                (header, c.clone().into()),
            ],
        });
        block.add_instr(IrInstr::Phi {
            dest: c.clone(),
            incoming: vec![
                (BlockId(0), IrConstant::integer(2).into()),
                (header, a.clone().into()),
            ],
        });
        let cond = b.compare(CompareOp::Lt, a.clone(), c.clone());
        b.branch(cond, header, exit);
        b.switch_to_block(exit);
        b.ret(None);
        let func = b.finish().unwrap();

        let scope = FunctionScope::new(&func, SYNTAX, &CSharpTypeMapper, true);
        assert_eq!(
            scope.phi_copies(BlockId(0), header),
            vec!["t0 = 1;".to_string(), "t1 = 2;".to_string()]
        );
        assert_eq!(
            scope.phi_copies(header, header),
            vec![
                "t0_next = t1;".to_string(),
                "t1_next = t0;".to_string(),
                "t0 = t0_next;".to_string(),
                "t1 = t1_next;".to_string(),
            ]
        );
        assert_eq!(scope.shadow_registers().len(), 2);
    }
}
