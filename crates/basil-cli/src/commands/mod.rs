//! Subcommand implementations

pub mod cfg;
pub mod dump;
pub mod emit;
pub mod targets;

use anyhow::{anyhow, Context};
use basil_compiler::{CompilerConfig, IrModule, OptLevel};
use std::path::{Path, PathBuf};

/// Read an IR module serialized as JSON
pub fn load_module(path: &Path) -> anyhow::Result<IrModule> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let module: IrModule = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid IR module", path.display()))?;
    log::debug!(
        "loaded module '{}' ({} functions) from {}",
        module.name,
        module.function_count(),
        path.display()
    );
    Ok(module)
}

/// Load the configuration file (if any) and apply a level override
pub fn load_config(
    path: Option<&PathBuf>,
    opt_level: Option<&str>,
) -> anyhow::Result<CompilerConfig> {
    let mut config = match path {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };
    if let Some(level) = opt_level {
        config.optimizer.level = level.parse::<OptLevel>().map_err(|e| anyhow!(e))?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_level_override() {
        let config = load_config(None, Some("full")).unwrap();
        assert_eq!(config.optimizer.level, OptLevel::Full);
        assert!(load_config(None, Some("turbo")).is_err());
    }

    #[test]
    fn test_config_file_then_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[optimizer]\nlevel = \"none\"\n\n[codegen]\nnamespace = \"Demo\"").unwrap();
        let path = file.path().to_path_buf();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.optimizer.level, OptLevel::None);
        assert_eq!(config.codegen.namespace, "Demo");

        let config = load_config(Some(&path), Some("standard")).unwrap();
        assert_eq!(config.optimizer.level, OptLevel::Standard);
    }

    #[test]
    fn test_load_module_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_module(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("is not a valid IR module"));
    }
}
