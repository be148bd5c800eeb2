//! `basil emit`: optimize IR modules and generate target source.

use super::{load_config, load_module};
use anyhow::{bail, Context};
use basil_compiler::Compiler;
use std::path::{Path, PathBuf};

pub fn execute(
    inputs: Vec<PathBuf>,
    target: String,
    config: Option<PathBuf>,
    opt_level: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let compiler = Compiler::new(load_config(config.as_ref(), opt_level.as_deref())?);
    if !compiler.registry().is_name_registered(&target) {
        bail!(
            "unknown backend '{}' (available: {})",
            target,
            compiler.registry().list_registered_names().join(", ")
        );
    }

    let mut modules = inputs
        .iter()
        .map(|path| load_module(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    if let [module] = modules.as_mut_slice() {
        let compiled = compiler.compile(module, &target)?;
        report(&compiled.module, &compiled.report);
        match output {
            Some(path) => write_file(&path, &compiled.code)?,
            None => print!("{}", compiled.code),
        }
        return Ok(());
    }

    let out_dir = output.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    for compiled in compiler.compile_all(&mut modules, &target)? {
        report(&compiled.module, &compiled.report);
        write_file(&out_dir.join(compiled.file_name()), &compiled.code)?;
    }
    Ok(())
}

fn report(module: &str, report: &basil_compiler::PipelineReport) {
    log::info!(
        "{}: {} modifications in {} rounds",
        module,
        report.total,
        report.rounds
    );
    if report.hit_iteration_cap {
        log::warn!("{}: optimizer stopped at the iteration cap", module);
    }
}

fn write_file(path: &Path, code: &str) -> anyhow::Result<()> {
    std::fs::write(path, code).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}
