//! Compilation errors

use crate::codegen::Target;
use crate::driver::GraphError;
use crate::ir::{BlockId, RegisterId};
use std::path::PathBuf;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Structural invariant violations found by IR validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("function '{function}' has no blocks")]
    EmptyFunction { function: String },

    #[error("function '{function}': block {block} is defined more than once")]
    DuplicateBlock { function: String, block: BlockId },

    #[error("function '{function}': block {block} is not terminated")]
    MissingTerminator { function: String, block: BlockId },

    #[error("function '{function}': block {block} references unknown block {target}")]
    UnknownBlock {
        function: String,
        block: BlockId,
        target: BlockId,
    },

    #[error("function '{function}': register {register} is defined more than once")]
    DuplicateRegister {
        function: String,
        register: RegisterId,
    },

    #[error("function '{function}': phi {register} in {block} follows a non-phi instruction")]
    MisplacedPhi {
        function: String,
        block: BlockId,
        register: RegisterId,
    },

    #[error(
        "function '{function}': phi {register} in {block} has {found} incoming values, \
         expected {expected} (one per predecessor)"
    )]
    PhiArity {
        function: String,
        block: BlockId,
        register: RegisterId,
        expected: usize,
        found: usize,
    },

    #[error(
        "function '{function}': phi {register} in {block} lists incoming blocks out of \
         predecessor order"
    )]
    PhiOrder {
        function: String,
        block: BlockId,
        register: RegisterId,
    },

    #[error("function '{function}': block {block} is unreachable from the entry")]
    UnreachableBlock { function: String, block: BlockId },

    #[error("duplicate function '{0}'")]
    DuplicateFunction(String),

    #[error("duplicate global '{0}'")]
    DuplicateGlobal(String),

    #[error("duplicate class '{0}'")]
    DuplicateClass(String),
}

/// Code generation and backend lookup errors
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unknown backend '{name}'")]
    UnknownTarget { name: String },

    #[error("no generator registered for target {0}")]
    UnregisteredTarget(Target),

    #[error("invalid IR: {0}")]
    InvalidIr(#[from] IrError),

    #[error("{backend} backend does not support {what}")]
    Unsupported { backend: String, what: String },
}

/// Driver-level errors
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid IR in module '{module}': {}", format_errors(.errors))]
    InvalidModule { module: String, errors: Vec<IrError> },

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_errors(errors: &[IrError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = IrError::MissingTerminator {
            function: "Main".to_string(),
            block: BlockId(2),
        };
        assert_eq!(err.to_string(), "function 'Main': block bb2 is not terminated");

        let err = CodegenError::UnknownTarget {
            name: "cobol".to_string(),
        };
        assert_eq!(err.to_string(), "unknown backend 'cobol'");
    }

    #[test]
    fn test_invalid_module_lists_all_errors() {
        let err = CompileError::InvalidModule {
            module: "m".to_string(),
            errors: vec![
                IrError::DuplicateGlobal("a".to_string()),
                IrError::DuplicateClass("B".to_string()),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("duplicate global 'a'"));
        assert!(msg.contains("duplicate class 'B'"));
    }
}
