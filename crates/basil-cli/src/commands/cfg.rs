//! `basil cfg`: render one function's control-flow graph.

use super::load_module;
use anyhow::{bail, Context};
use basil_compiler::analysis::{CfgDescription, FunctionAnalysis};
use basil_compiler::Compiler;
use std::path::PathBuf;

pub fn execute(
    input: PathBuf,
    function: String,
    format: String,
    optimized: bool,
) -> anyhow::Result<()> {
    let mut module = load_module(&input)?;
    if optimized {
        Compiler::default().optimize(&mut module)?;
    }
    let func = module
        .get_function(&function)
        .with_context(|| format!("no function '{}' in module '{}'", function, module.name))?;
    let facts = FunctionAnalysis::compute(func)?;
    let description = CfgDescription::new(func, &facts);

    match format.to_ascii_lowercase().as_str() {
        "dot" => print!("{}", description.to_dot()),
        "json" => println!("{}", description.to_json()?),
        other => bail!("unknown CFG format '{}' (expected dot or json)", other),
    }
    Ok(())
}
