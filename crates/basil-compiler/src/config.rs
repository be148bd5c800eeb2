//! Compiler configuration (basil.toml)
//!
//! ```toml
//! [optimizer]
//! level = "full"
//! max-iterations = 16
//!
//! [codegen]
//! namespace = "Demo"
//! generateEntryPoint = true
//! indentSize = 2
//!
//! [codegen.backendOptions]
//! "csharp.nullable" = "true"
//! ```

use crate::codegen::GenerationOptions;
use crate::error::{CompileError, CompileResult};
use crate::optimize::OptLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OptimizerConfig {
    pub level: OptLevel,
    /// Cap on standard-tier rounds before giving up on a fixpoint
    pub max_iterations: usize,
    /// Run the standard tier again after the aggressive tier changed something
    pub repeat_after_aggressive: bool,
    /// Largest callee (in instructions) inlined at an ordinary call site
    pub inline_threshold: usize,
    /// Largest callee inlined at a call site inside a loop
    pub inline_loop_threshold: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            level: OptLevel::Standard,
            max_iterations: 16,
            repeat_after_aggressive: true,
            inline_threshold: 8,
            inline_loop_threshold: 16,
        }
    }
}

/// Full compiler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub optimizer: OptimizerConfig,
    pub codegen: GenerationOptions,
}

impl CompilerConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> CompileResult<Self> {
        let config: CompilerConfig = toml::from_str(content).map_err(|e| CompileError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> CompileResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> CompileResult<String> {
        toml::to_string_pretty(self).map_err(|e| CompileError::Config {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> CompileResult<()> {
        if self.optimizer.max_iterations == 0 {
            return Err(CompileError::Config {
                message: "optimizer.max-iterations must be at least 1".to_string(),
            });
        }
        if self.codegen.indent_size == 0 && !self.codegen.use_tabs {
            return Err(CompileError::Config {
                message: "codegen.indentSize must be at least 1 unless useTabs is set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.optimizer.level, OptLevel::Standard);
        assert_eq!(config.optimizer.max_iterations, 16);
        assert_eq!(config.codegen.indent_size, 4);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[optimizer]
level = "full"
max-iterations = 4

[codegen]
namespace = "Demo"
generateEntryPoint = true
useTabs = true

[codegen.backendOptions]
"python.typeHints" = "false"
"#;
        let config = CompilerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.optimizer.level, OptLevel::Full);
        assert_eq!(config.optimizer.max_iterations, 4);
        assert!(config.optimizer.repeat_after_aggressive);
        assert_eq!(config.codegen.namespace, "Demo");
        assert!(config.codegen.generate_entry_point);
        assert!(config.codegen.use_tabs);
        assert!(!config.codegen.get_bool("python.typeHints", true));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let err = CompilerConfig::from_toml_str("[optimizer]\nmax-iterations = 0\n").unwrap_err();
        assert!(err.to_string().contains("max-iterations"));
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(
            CompilerConfig::from_toml_str("[optimizer\n"),
            Err(CompileError::Config { .. })
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = CompilerConfig::default();
        config.codegen.class_name = "Program".to_string();
        config.codegen.set("cpp.std", "20");
        let text = config.to_toml_string().unwrap();
        let back = CompilerConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
