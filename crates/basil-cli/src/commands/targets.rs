//! `basil targets`: list registered backends.

use crate::output::StyledOutput;
use basil_compiler::BackendRegistry;

pub fn execute(out: &mut StyledOutput) -> anyhow::Result<()> {
    let registry = BackendRegistry::with_builtins();
    for name in registry.list_registered_names() {
        let Some(target) = registry.target_for_name(&name) else {
            continue;
        };
        let aliases: Vec<String> = registry
            .names_for(target)
            .into_iter()
            .filter(|n| *n != name)
            .collect();
        out.heading(&name);
        if !aliases.is_empty() {
            out.plain("  ");
            out.accent(&format!("({})", aliases.join(", ")));
        }
        out.plain("\n");
    }
    Ok(())
}
