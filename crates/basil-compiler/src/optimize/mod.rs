//! IR Optimization Passes
//!
//! Passes transform functions in place. The pipeline runs the standard tier
//! (local, always safe) to a fixpoint, then the aggressive tier (needs
//! dominance and loop facts), optionally followed by another standard
//! fixpoint. Facts are recomputed whenever a pass reports a structural change
//! and a later pass asks for them.

mod constant_fold;
mod dce;
mod inline;
mod licm;
mod phi_simplify;
mod redundant_load;
mod simplify_cfg;

pub use constant_fold::ConstantFolding;
pub use dce::DeadCodeElimination;
pub use inline::Inliner;
pub use licm::LoopInvariantCodeMotion;
pub use phi_simplify::PhiSimplification;
pub use redundant_load::RedundantLoadElimination;
pub use simplify_cfg::SimplifyCfg;

use crate::analysis::FunctionAnalysis;
use crate::config::OptimizerConfig;
use crate::error::IrError;
use crate::ir::{IrFunction, IrModule};
use serde::{Deserialize, Serialize};

/// Optimization level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    /// No optimizations
    None,
    /// Standard tier only
    #[default]
    Standard,
    /// Standard and aggressive tiers
    Full,
}

impl std::str::FromStr for OptLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(OptLevel::None),
            "standard" | "1" => Ok(OptLevel::Standard),
            "full" | "2" => Ok(OptLevel::Full),
            other => Err(format!("unknown optimization level '{}'", other)),
        }
    }
}

/// Which tier a pass belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Standard,
    Aggressive,
}

/// Result of running one pass over one function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Number of sites rewritten
    pub modifications: usize,
    /// Blocks or edges changed; cached facts are stale
    pub cfg_changed: bool,
}

impl PassOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Instruction-level changes only
    pub fn changed(modifications: usize) -> Self {
        Self {
            modifications,
            cfg_changed: false,
        }
    }

    /// Changes that touched blocks or edges
    pub fn structural(modifications: usize) -> Self {
        Self {
            modifications,
            cfg_changed: modifications > 0,
        }
    }
}

/// An optimization pass on IR functions
pub trait Pass: Send + Sync {
    /// Name of this pass (for diagnostics and reports)
    fn name(&self) -> &str;

    fn tier(&self) -> Tier {
        Tier::Standard
    }

    /// Whether `run` needs dominance and loop facts
    fn requires_analysis(&self) -> bool {
        false
    }

    /// Called once per module before the pass runs on its functions
    fn prepare(&mut self, _module: &IrModule) {}

    /// Run the pass, mutating the function in place. `facts` is `Some` and
    /// current whenever `requires_analysis` returns true.
    fn run(&self, func: &mut IrFunction, facts: Option<&FunctionAnalysis>) -> PassOutcome;
}

/// Summary of one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Standard-tier rounds executed, summed over functions
    pub rounds: usize,
    /// Total modifications across all passes
    pub total: usize,
    /// Modifications per pass, in pipeline order
    pub per_pass: Vec<(String, usize)>,
    /// Some function stopped at the iteration cap without a fixpoint
    pub hit_iteration_cap: bool,
    pub functions: usize,
}

impl PipelineReport {
    fn record(&mut self, pass: &str, modifications: usize) {
        self.total += modifications;
        match self.per_pass.iter_mut().find(|(name, _)| name == pass) {
            Some((_, count)) => *count += modifications,
            None => self.per_pass.push((pass.to_string(), modifications)),
        }
    }

    fn merge(&mut self, other: PipelineReport) {
        self.rounds += other.rounds;
        self.hit_iteration_cap |= other.hit_iteration_cap;
        self.functions += other.functions;
        for (name, count) in other.per_pass {
            self.record(&name, count);
        }
    }

    /// Modifications made by the named pass
    pub fn count_for(&self, pass: &str) -> usize {
        self.per_pass
            .iter()
            .find(|(name, _)| name == pass)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Optimizer that runs the standard and aggressive tiers over IR
pub struct Pipeline {
    standard: Vec<Box<dyn Pass>>,
    aggressive: Vec<Box<dyn Pass>>,
    max_iterations: usize,
    repeat_after_aggressive: bool,
}

impl Pipeline {
    /// Create an empty pipeline (no passes)
    pub fn empty() -> Self {
        Self {
            standard: Vec::new(),
            aggressive: Vec::new(),
            max_iterations: OptimizerConfig::default().max_iterations,
            repeat_after_aggressive: false,
        }
    }

    /// The standard tier only
    pub fn standard() -> Self {
        let mut pipeline = Self::empty();
        pipeline.add_standard_passes();
        pipeline
    }

    /// Standard and aggressive tiers with default thresholds
    pub fn full() -> Self {
        Self::for_config(&OptimizerConfig {
            level: OptLevel::Full,
            ..OptimizerConfig::default()
        })
    }

    pub fn for_config(config: &OptimizerConfig) -> Self {
        let mut pipeline = Self::empty();
        pipeline.max_iterations = config.max_iterations.max(1);
        pipeline.repeat_after_aggressive = config.repeat_after_aggressive;
        match config.level {
            OptLevel::None => {}
            OptLevel::Standard => pipeline.add_standard_passes(),
            OptLevel::Full => {
                pipeline.add_standard_passes();
                pipeline.add_pass(Box::new(LoopInvariantCodeMotion::new()));
                pipeline.add_pass(Box::new(Inliner::new(
                    config.inline_threshold,
                    config.inline_loop_threshold,
                )));
            }
        }
        pipeline
    }

    fn add_standard_passes(&mut self) {
        self.add_pass(Box::new(ConstantFolding::new()));
        self.add_pass(Box::new(PhiSimplification::new()));
        self.add_pass(Box::new(RedundantLoadElimination::new()));
        self.add_pass(Box::new(DeadCodeElimination::new()));
        self.add_pass(Box::new(SimplifyCfg::new()));
    }

    /// Append a pass to the tier it declares
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        match pass.tier() {
            Tier::Standard => self.standard.push(pass),
            Tier::Aggressive => self.aggressive.push(pass),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Names of all passes in execution order
    pub fn pass_names(&self) -> Vec<&str> {
        self.standard
            .iter()
            .chain(self.aggressive.iter())
            .map(|p| p.name())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.aggressive.is_empty()
    }

    /// Optimize every function of a module, in module order
    pub fn optimize_module(&mut self, module: &mut IrModule) -> Result<PipelineReport, IrError> {
        for pass in self.standard.iter_mut().chain(self.aggressive.iter_mut()) {
            pass.prepare(module);
        }
        let mut report = self.empty_report();
        for func in &mut module.functions {
            report.merge(self.optimize_function(func)?);
        }
        log::info!(
            "optimized module '{}': {} modifications in {} rounds{}",
            module.name,
            report.total,
            report.rounds,
            if report.hit_iteration_cap {
                " (iteration cap reached)"
            } else {
                ""
            }
        );
        Ok(report)
    }

    /// Optimize one function. Passes that need module context (the inliner)
    /// see whatever their last `prepare` gave them.
    pub fn optimize_function(&self, func: &mut IrFunction) -> Result<PipelineReport, IrError> {
        let mut report = self.empty_report();
        report.functions = 1;
        let mut facts: Option<FunctionAnalysis> = None;

        self.run_standard_to_fixpoint(func, &mut facts, &mut report)?;

        if !self.aggressive.is_empty() {
            let mut changed = 0;
            for pass in &self.aggressive {
                changed += self.run_pass(pass.as_ref(), func, &mut facts, &mut report)?;
            }
            if changed > 0 && self.repeat_after_aggressive {
                self.run_standard_to_fixpoint(func, &mut facts, &mut report)?;
            }
        }

        Ok(report)
    }

    fn empty_report(&self) -> PipelineReport {
        let mut report = PipelineReport::default();
        for name in self.pass_names() {
            report.per_pass.push((name.to_string(), 0));
        }
        report
    }

    fn run_standard_to_fixpoint(
        &self,
        func: &mut IrFunction,
        facts: &mut Option<FunctionAnalysis>,
        report: &mut PipelineReport,
    ) -> Result<(), IrError> {
        if self.standard.is_empty() {
            return Ok(());
        }
        for round in 1..=self.max_iterations {
            report.rounds += 1;
            let mut round_total = 0;
            for pass in &self.standard {
                round_total += self.run_pass(pass.as_ref(), func, facts, report)?;
            }
            if round_total == 0 {
                return Ok(());
            }
            if round == self.max_iterations {
                log::warn!(
                    "function '{}' did not reach a fixpoint after {} rounds",
                    func.name,
                    self.max_iterations
                );
                report.hit_iteration_cap = true;
            }
        }
        Ok(())
    }

    fn run_pass(
        &self,
        pass: &dyn Pass,
        func: &mut IrFunction,
        facts: &mut Option<FunctionAnalysis>,
        report: &mut PipelineReport,
    ) -> Result<usize, IrError> {
        if pass.requires_analysis() && facts.is_none() {
            log::trace!("recomputing analysis facts for '{}'", func.name);
            *facts = Some(FunctionAnalysis::compute(func)?);
        }
        let current = if pass.requires_analysis() {
            facts.as_ref()
        } else {
            None
        };
        let outcome = pass.run(func, current);
        if outcome.cfg_changed {
            *facts = None;
        }
        if outcome.modifications > 0 {
            log::debug!(
                "{} on '{}': {} modifications",
                pass.name(),
                func.name,
                outcome.modifications
            );
        }
        report.record(pass.name(), outcome.modifications);
        Ok(outcome.modifications)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, IrConstant, IrType};

    #[test]
    fn test_opt_level_parse() {
        assert_eq!("none".parse::<OptLevel>(), Ok(OptLevel::None));
        assert_eq!("FULL".parse::<OptLevel>(), Ok(OptLevel::Full));
        assert_eq!("1".parse::<OptLevel>(), Ok(OptLevel::Standard));
        assert!("fast".parse::<OptLevel>().is_err());
    }

    #[test]
    fn test_pipeline_pass_order() {
        let pipeline = Pipeline::full();
        assert_eq!(
            pipeline.pass_names(),
            vec![
                "constant-folding",
                "phi-simplification",
                "redundant-load-elimination",
                "dead-code-elimination",
                "simplify-cfg",
                "loop-invariant-code-motion",
                "inline",
            ]
        );
        assert!(Pipeline::for_config(&OptimizerConfig {
            level: OptLevel::None,
            ..OptimizerConfig::default()
        })
        .is_empty());
    }

    #[test]
    fn test_fixpoint_is_idempotent() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let a = b.const_int(2);
        let c = b.const_int(3);
        let s = b.binary(BinaryOp::Add, a, c);
        let m = b.binary(BinaryOp::Mul, s, IrConstant::integer(4));
        b.ret(Some(m.into()));
        let mut func = b.finish().unwrap();

        let pipeline = Pipeline::standard();
        let first = pipeline.optimize_function(&mut func).unwrap();
        assert!(first.total > 0);
        assert!(!first.hit_iteration_cap);

        let second = pipeline.optimize_function(&mut func).unwrap();
        assert_eq!(second.total, 0);
        assert_eq!(second.rounds, 1);
    }

    #[test]
    fn test_iteration_cap_reported() {
        let mut b = FunctionBuilder::new("F", vec![], IrType::Integer);
        let a = b.const_int(2);
        let s = b.binary(BinaryOp::Add, a, IrConstant::integer(1));
        let t = b.binary(BinaryOp::Add, s, IrConstant::integer(1));
        b.ret(Some(t.into()));
        let mut func = b.finish().unwrap();

        let pipeline = Pipeline::standard().with_max_iterations(1);
        let report = pipeline.optimize_function(&mut func).unwrap();
        assert_eq!(report.rounds, 1);
        assert!(report.hit_iteration_cap);
    }
}
