//! `basil dump`: print the canonical IR listing.

use super::{load_config, load_module};
use basil_compiler::{Compiler, PrettyPrint};
use std::path::PathBuf;

pub fn execute(
    input: PathBuf,
    optimized: bool,
    config: Option<PathBuf>,
    opt_level: Option<String>,
) -> anyhow::Result<()> {
    let mut module = load_module(&input)?;
    if optimized {
        let compiler = Compiler::new(load_config(config.as_ref(), opt_level.as_deref())?);
        let report = compiler.optimize(&mut module)?;
        eprintln!(
            "; {} modifications in {} rounds{}",
            report.total,
            report.rounds,
            if report.hit_iteration_cap {
                " (iteration cap reached)"
            } else {
                ""
            }
        );
        for (pass, count) in report.per_pass.iter().filter(|(_, c)| *c > 0) {
            eprintln!(";   {}: {}", pass, count);
        }
    }
    print!("{}", module.pretty_print());
    Ok(())
}
