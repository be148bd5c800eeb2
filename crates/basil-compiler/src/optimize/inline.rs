//! Function Inlining Optimization
//!
//! Inlines calls to small free functions of the same module at call sites.
//! Candidates have a single block ending in `Return`, no recursion and no
//! suspension points (await, yield) or try regions. Call sites inside loops
//! may take larger callees.
//!
//! Candidate bodies are captured once per module in `prepare`, before any
//! function of the module is rewritten.

use super::{Pass, PassOutcome, Tier};
use crate::analysis::FunctionAnalysis;
use crate::ir::{
    IrFunction, IrInstr, IrModule, IrValue, Register, RegisterId, Terminator, VarScope, Variable,
};
use rustc_hash::FxHashMap;

/// Default instruction limit for an ordinary call site
pub const DEFAULT_INLINE_THRESHOLD: usize = 8;

/// Default instruction limit for a call site inside a loop
pub const DEFAULT_INLINE_LOOP_THRESHOLD: usize = 16;

/// A callee body ready to be copied into call sites
#[derive(Debug, Clone)]
struct InlinableBody {
    params: Vec<Variable>,
    instructions: Vec<IrInstr>,
    return_value: Option<IrValue>,
}

/// Function inliner
pub struct Inliner {
    threshold: usize,
    loop_threshold: usize,
    candidates: FxHashMap<String, InlinableBody>,
}

impl Inliner {
    pub fn new(threshold: usize, loop_threshold: usize) -> Self {
        Self {
            threshold,
            loop_threshold,
            candidates: FxHashMap::default(),
        }
    }

    /// Number of functions currently considered inlinable
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Check if a function is inlinable and extract its body if so
    fn extract_inlinable_body(&self, func: &IrFunction) -> Option<InlinableBody> {
        if func.class.is_some() || func.is_async || func.is_iterator {
            return None;
        }
        // Must have exactly one basic block
        let [block] = func.blocks.as_slice() else {
            return None;
        };
        if block.instructions.len() > self.threshold.max(self.loop_threshold) {
            return None;
        }
        let Terminator::Return(return_value) = &block.terminator else {
            return None;
        };
        if !block
            .instructions
            .iter()
            .all(|instr| is_inlinable_instruction(instr, &func.name))
        {
            return None;
        }
        if matches!(return_value, Some(IrValue::Variable(v)) if v.scope == VarScope::Local) {
            return None;
        }

        Some(InlinableBody {
            params: func.params.clone(),
            instructions: block.instructions.clone(),
            return_value: return_value.clone(),
        })
    }

    /// Copy `body` in place of a call; returns the instructions to splice in
    fn inline_call(
        &self,
        func: &mut IrFunction,
        dest: Option<Register>,
        args: &[IrValue],
        body: &InlinableBody,
    ) -> Vec<IrInstr> {
        let param_value = |var: &Variable| -> Option<IrValue> {
            if var.scope != VarScope::Param {
                return None;
            }
            body.params
                .iter()
                .position(|p| p.name == var.name)
                .map(|i| args[i].clone())
        };

        let mut subst: FxHashMap<RegisterId, IrValue> = FxHashMap::default();
        let mut out = Vec::with_capacity(body.instructions.len() + 1);

        for instr in &body.instructions {
            if let IrInstr::LoadVar { dest, var } = instr {
                if let Some(arg) = param_value(var) {
                    subst.insert(dest.id, arg);
                    continue;
                }
            }

            let mut copy = instr.clone();
            for operand in copy.operands_mut() {
                remap(operand, &subst, &param_value);
            }
            if let Some(d) = copy.dest_mut() {
                let fresh = match &d.name {
                    Some(name) => func.new_named_register(d.ty.clone(), name.clone()),
                    None => func.new_register(d.ty.clone()),
                };
                subst.insert(d.id, IrValue::Register(fresh.clone()));
                *d = fresh;
            }
            out.push(copy);
        }

        if let (Some(dest), Some(ret)) = (dest, &body.return_value) {
            let mut value = ret.clone();
            remap(&mut value, &subst, &param_value);
            out.push(bind_result(dest, value));
        }
        out
    }
}

impl Default for Inliner {
    fn default() -> Self {
        Self::new(DEFAULT_INLINE_THRESHOLD, DEFAULT_INLINE_LOOP_THRESHOLD)
    }
}

/// Check if an instruction can be copied into another function
fn is_inlinable_instruction(instr: &IrInstr, self_name: &str) -> bool {
    match instr {
        // Recursive calls cannot be inlined
        IrInstr::Call { callee, .. } if callee == self_name => false,
        IrInstr::Phi { .. }
        | IrInstr::Try(_)
        | IrInstr::Yield { .. }
        | IrInstr::Await { .. }
        | IrInstr::Label { .. }
        | IrInstr::CallBase { .. }
        | IrInstr::InlineCode { .. } => false,
        // the callee's locals do not exist in the caller
        IrInstr::LoadVar { var, .. } => var.scope != VarScope::Local,
        IrInstr::Assign { var, .. } => var.scope == VarScope::Global,
        other => other
            .operands()
            .iter()
            .all(|op| !matches!(op, IrValue::Variable(v) if v.scope == VarScope::Local)),
    }
}

fn remap(
    operand: &mut IrValue,
    subst: &FxHashMap<RegisterId, IrValue>,
    param_value: &impl Fn(&Variable) -> Option<IrValue>,
) {
    let replacement = match operand {
        IrValue::Register(r) => subst.get(&r.id).cloned(),
        IrValue::Variable(v) => param_value(v),
        IrValue::Constant(_) => None,
    };
    if let Some(value) = replacement {
        *operand = value;
    }
}

/// Define the call's result register from the inlined return value
fn bind_result(dest: Register, value: IrValue) -> IrInstr {
    if value.ty() != dest.ty {
        return IrInstr::Cast { dest, value };
    }
    match value {
        IrValue::Constant(c) => IrInstr::Const { dest, value: c },
        IrValue::Variable(var) => IrInstr::LoadVar { dest, var },
        // a same-typed cast is folded away by the next standard round
        reg @ IrValue::Register(_) => IrInstr::Cast { dest, value: reg },
    }
}

impl Pass for Inliner {
    fn name(&self) -> &str {
        "inline"
    }

    fn tier(&self) -> Tier {
        Tier::Aggressive
    }

    fn requires_analysis(&self) -> bool {
        true
    }

    fn prepare(&mut self, module: &IrModule) {
        self.candidates.clear();
        for func in module.free_functions() {
            if let Some(body) = self.extract_inlinable_body(func) {
                self.candidates.insert(func.name.clone(), body);
            }
        }
        log::trace!(
            "{} inlining candidates in module '{}'",
            self.candidates.len(),
            module.name
        );
    }

    fn run(&self, func: &mut IrFunction, facts: Option<&FunctionAnalysis>) -> PassOutcome {
        if self.candidates.is_empty() {
            return PassOutcome::unchanged();
        }

        let mut inlined = 0;
        for block_idx in 0..func.blocks.len() {
            let block_id = func.blocks[block_idx].id;
            let limit = match facts.map(|f| f.loop_depth_of(block_id)) {
                Some(depth) if depth > 0 => self.loop_threshold,
                _ => self.threshold,
            };

            let instructions = std::mem::take(&mut func.blocks[block_idx].instructions);
            let mut new_instructions = Vec::with_capacity(instructions.len());
            for instr in instructions {
                let site = match &instr {
                    IrInstr::Call { dest, callee, args } if *callee != func.name => self
                        .candidates
                        .get(callee)
                        .filter(|body| is_viable_site(body, dest.as_ref(), args, limit))
                        .map(|body| (dest.clone(), args.clone(), body)),
                    _ => None,
                };
                match site {
                    Some((dest, args, body)) => {
                        let body_instrs = self.inline_call(func, dest, &args, body);
                        new_instructions.extend(body_instrs);
                        inlined += 1;
                    }
                    None => new_instructions.push(instr),
                }
            }
            func.blocks[block_idx].instructions = new_instructions;
        }

        PassOutcome::changed(inlined)
    }
}

fn is_viable_site(
    body: &InlinableBody,
    dest: Option<&Register>,
    args: &[IrValue],
    limit: usize,
) -> bool {
    body.instructions.len() <= limit
        && args.len() == body.params.len()
        && args.iter().all(|a| !matches!(a, IrValue::Variable(_)))
        && !(dest.is_some() && body.return_value.is_none())
}
