//! Basil IR core
//!
//! The middle and back end of the Basil compiler: a typed three-address IR in
//! basic blocks, control-flow and dominance analysis, a two-tier optimizer
//! and source-to-source code generators for C#, C++ and Python.
//!
//! ```text
//! IrModule --validate--> Pipeline (standard, aggressive) --> Generator --> text
//! ```
//!
//! The core performs no I/O; `Compiler` ties the stages together.

pub mod analysis;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod error;
pub mod ir;
pub mod optimize;

pub use codegen::{
    BackendRegistry, GenerationOptions, Generator, InstructionVisitor, Target, TypeMapper,
};
pub use config::{CompilerConfig, OptimizerConfig};
pub use driver::{CompileOutput, Compiler, GraphError, ModuleGraph};
pub use error::{CodegenError, CodegenResult, CompileError, CompileResult, IrError};
pub use ir::{FunctionBuilder, IrFunction, IrModule, PrettyPrint};
pub use optimize::{OptLevel, Pass, Pipeline, PipelineReport};
