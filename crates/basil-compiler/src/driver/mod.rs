//! Compiler context
//!
//! `Compiler` owns the backend registry and configuration and runs the full
//! pipeline for one module or a batch of interdependent modules:
//! validate, optimize, drop unreachable blocks, check codegen readiness,
//! generate.

mod graph;

pub use graph::{GraphError, ModuleGraph, ModuleNode};

use crate::codegen::{BackendRegistry, GenerationOptions, Generator, Target};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult, IrError};
use crate::ir::IrModule;
use crate::optimize::{Pipeline, PipelineReport};
use rustc_hash::FxHashMap;

/// Result of compiling one module
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub module: String,
    pub target: Target,
    pub file_extension: String,
    pub code: String,
    pub report: PipelineReport,
    /// Unreachable blocks dropped after optimization
    pub removed_blocks: usize,
}

impl CompileOutput {
    /// Suggested output file name, `<module>.<ext>`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.module, self.file_extension)
    }
}

/// Main compiler entry point
pub struct Compiler {
    registry: BackendRegistry,
    config: CompilerConfig,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl Compiler {
    /// Create a compiler with the built-in backends
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_registry(BackendRegistry::with_builtins(), config)
    }

    /// Create a compiler over a prepared registry (built-ins plus any
    /// embedder backends)
    pub fn with_registry(registry: BackendRegistry, config: CompilerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.config.codegen
    }

    fn generator(&self, target: &str) -> CompileResult<Box<dyn Generator>> {
        Ok(self.registry.create_named(target, &self.config.codegen)?)
    }

    /// Run the configured optimization pipeline over a valid module
    pub fn optimize(&self, module: &mut IrModule) -> CompileResult<PipelineReport> {
        check_valid(module)?;
        let mut pipeline = Pipeline::for_config(&self.config.optimizer);
        log::debug!(
            "optimizing '{}' at level {:?} ({} passes)",
            module.name,
            self.config.optimizer.level,
            pipeline.pass_names().len()
        );
        pipeline
            .optimize_module(module)
            .map_err(|e| invalid(module, vec![e]))
    }

    /// Generate code for a module as-is (no optimization)
    pub fn emit(&self, module: &IrModule, target: &str) -> CompileResult<String> {
        let mut generator = self.generator(target)?;
        Ok(generator.generate(module)?)
    }

    /// Validate, optimize, clean up and generate code for one module
    pub fn compile(&self, module: &mut IrModule, target: &str) -> CompileResult<CompileOutput> {
        let mut generator = self.generator(target)?;
        check_valid(module)?;

        let report = self.optimize(module)?;
        let removed_blocks: usize = module
            .functions
            .iter_mut()
            .map(|f| f.remove_unreachable_blocks())
            .sum();
        if removed_blocks > 0 {
            log::debug!(
                "removed {} unreachable blocks from '{}'",
                removed_blocks,
                module.name
            );
        }

        let errors: Vec<IrError> = module
            .functions
            .iter()
            .filter_map(|f| f.check_codegen_ready().err())
            .collect();
        if !errors.is_empty() {
            return Err(invalid(module, errors));
        }

        let code = generator.generate(module)?;
        log::info!(
            "compiled '{}' to {} ({} bytes)",
            module.name,
            generator.backend_name(),
            code.len()
        );
        Ok(CompileOutput {
            module: module.name.clone(),
            target: generator.target(),
            file_extension: generator.file_extension().to_string(),
            code,
            report,
            removed_blocks,
        })
    }

    /// Compile a batch of modules, dependencies before dependents
    ///
    /// Every name in a module's `dependencies` must be another module of the
    /// batch.
    pub fn compile_all(
        &self,
        modules: &mut [IrModule],
        target: &str,
    ) -> CompileResult<Vec<CompileOutput>> {
        let graph = dependency_graph(modules)?;
        let order = graph.topological_order()?;

        let index: FxHashMap<String, usize> = modules
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.name.clone(), idx))
            .collect();

        let mut outputs = Vec::with_capacity(modules.len());
        for name in order {
            let Some(&idx) = index.get(&name) else {
                return Err(GraphError::ModuleNotFound(name).into());
            };
            outputs.push(self.compile(&mut modules[idx], target)?);
        }
        Ok(outputs)
    }
}

/// Dependency graph over a batch of modules
pub fn dependency_graph(modules: &[IrModule]) -> Result<ModuleGraph, GraphError> {
    let mut graph = ModuleGraph::new();
    for module in modules {
        if graph.contains(&module.name) {
            return Err(GraphError::DuplicateModule(module.name.clone()));
        }
        graph.add_module(module.name.clone());
    }
    for module in modules {
        for dep in &module.dependencies {
            if !graph.contains(dep) {
                return Err(GraphError::UnknownDependency {
                    module: module.name.clone(),
                    dependency: dep.clone(),
                });
            }
            graph.add_dependency(module.name.clone(), dep.clone());
        }
    }
    Ok(graph)
}

fn check_valid(module: &IrModule) -> CompileResult<()> {
    module.validate().map_err(|errors| invalid(module, errors))
}

fn invalid(module: &IrModule, errors: Vec<IrError>) -> CompileError {
    CompileError::InvalidModule {
        module: module.name.clone(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodegenError;
    use crate::ir::{BinaryOp, FunctionBuilder, IrType, Variable};
    use crate::optimize::OptLevel;

    fn answer_module(name: &str) -> IrModule {
        let mut fb = FunctionBuilder::new("Answer", vec![], IrType::Integer);
        let six = fb.const_int(6);
        let seven = fb.const_int(7);
        let product = fb.binary(BinaryOp::Mul, six, seven);
        fb.ret(Some(product.into()));
        let mut module = IrModule::new(name);
        module.add_function(fb.finish().unwrap());
        module
    }

    #[test]
    fn test_compile_folds_and_generates() {
        let compiler = Compiler::default();
        let mut module = answer_module("answers");
        let output = compiler.compile(&mut module, "C#").unwrap();

        assert_eq!(output.target, Target::CSharp);
        assert_eq!(output.file_name(), "answers.cs");
        assert!(output.report.count_for("constant-folding") > 0);
        assert!(output.code.contains("return 42;"));
    }

    #[test]
    fn test_unknown_target_leaves_module_untouched() {
        let compiler = Compiler::default();
        let mut module = answer_module("m");
        let before = module.total_instruction_count();

        let err = compiler.compile(&mut module, "fortran").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Codegen(CodegenError::UnknownTarget { .. })
        ));
        assert_eq!(module.total_instruction_count(), before);
    }

    #[test]
    fn test_level_none_still_drops_unreachable_blocks() {
        let mut config = CompilerConfig::default();
        config.optimizer.level = OptLevel::None;
        let compiler = Compiler::new(config);

        let x = Variable::param("x", IrType::Integer);
        let mut fb = FunctionBuilder::new("Id", vec![x.clone()], IrType::Integer);
        let dead = fb.create_block();
        let value = fb.load_var(x);
        fb.ret(Some(value.into()));
        fb.switch_to_block(dead);
        fb.ret(None);
        let mut module = IrModule::new("m");
        module.add_function(fb.finish().unwrap());

        let output = compiler.compile(&mut module, "python").unwrap();
        assert_eq!(output.removed_blocks, 1);
        assert_eq!(output.report.total, 0);
        assert_eq!(module.functions[0].block_count(), 1);
    }

    #[test]
    fn test_compile_all_in_dependency_order() {
        let compiler = Compiler::default();
        let mut app = answer_module("app");
        app.add_dependency("lib");
        let mut modules = vec![app, answer_module("lib"), answer_module("extra")];

        let outputs = compiler.compile_all(&mut modules, "cpp").unwrap();
        let names: Vec<&str> = outputs.iter().map(|o| o.module.as_str()).collect();
        assert_eq!(names, vec!["extra", "lib", "app"]);
        assert!(outputs.iter().all(|o| o.file_extension == "cpp"));
    }

    #[test]
    fn test_compile_all_rejects_bad_graphs() {
        let compiler = Compiler::default();

        let mut a = answer_module("a");
        a.add_dependency("b");
        let mut b = answer_module("b");
        b.add_dependency("a");
        let mut cyclic = vec![a, b];
        assert!(matches!(
            compiler.compile_all(&mut cyclic, "py"),
            Err(CompileError::Graph(GraphError::CircularDependency(_)))
        ));

        let mut orphan = answer_module("orphan");
        orphan.add_dependency("missing");
        assert!(matches!(
            compiler.compile_all(&mut [orphan], "py"),
            Err(CompileError::Graph(GraphError::UnknownDependency { .. }))
        ));

        let mut twins = vec![answer_module("twin"), answer_module("twin")];
        assert!(matches!(
            compiler.compile_all(&mut twins, "py"),
            Err(CompileError::Graph(GraphError::DuplicateModule(_)))
        ));
    }
}
