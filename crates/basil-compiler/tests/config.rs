//! Loading `basil.toml` and compiling with it

mod common;

use basil_compiler::{CompileError, Compiler, CompilerConfig, OptLevel};
use std::io::Write;

#[test]
fn test_config_file_drives_compilation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[optimizer]
level = "full"
max-iterations = 8

[codegen]
namespace = "Shop"
generateEntryPoint = true
indentSize = 2
generateComments = false
"#
    )
    .unwrap();

    let config = CompilerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.optimizer.level, OptLevel::Full);
    assert_eq!(config.optimizer.max_iterations, 8);

    let compiler = Compiler::new(config);
    let mut module = common::sample_module();
    let output = compiler.compile(&mut module, "csharp").unwrap();

    assert!(output.code.starts_with("using "));
    assert!(output.code.contains("namespace Shop\n{\n  public class Counter"));
    assert!(output.report.count_for("constant-folding") > 0);
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = CompilerConfig::default();
    config.optimizer.level = OptLevel::None;
    config.codegen.class_name = "Entry".to_string();
    config.codegen.set("cpp.includes", "<map>");

    let text = config.to_toml_string().unwrap();
    let parsed = CompilerConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_missing_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("basil.toml");
    assert!(CompilerConfig::from_file(&missing).is_err());

    std::fs::write(&missing, "[optimizer\nlevel = ").unwrap();
    let err = CompilerConfig::from_file(&missing).unwrap_err();
    assert!(matches!(err, CompileError::Config { .. }));
}
