//! Add command handler.

use anyhow::Result;
use toolmux_core::{BUILTIN_BINARIES, ServerDefinition, find_template};
use tracing::debug;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Arguments for `toolmux add`.
#[derive(Debug, Default)]
pub struct AddArgs {
    pub name: String,
    pub alias: Option<String>,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub category: Option<String>,
    pub required_env: Vec<String>,
}

/// Turn the arguments into a definition without registering it.
pub fn build_definition(args: AddArgs) -> Result<ServerDefinition, CliError> {
    let AddArgs {
        name,
        alias,
        command,
        args,
        category,
        required_env,
    } = args;

    let Some(command) = command else {
        let template = find_template(&name).ok_or_else(|| {
            CliError::Arguments(format!(
                "no template named '{name}'; use --command to add a custom server"
            ))
        })?;
        let mut definition = template.instantiate(alias.as_deref());
        if BUILTIN_BINARIES.contains(&definition.launch.command.as_str()) {
            definition.launch.path_extra = sibling_dir();
        }
        return Ok(definition);
    };

    let mut definition = ServerDefinition::custom(name, command, args);
    if let Some(category) = category {
        definition = definition.with_category(category);
    }
    for key in required_env {
        definition = definition.with_required_env(key);
    }
    Ok(definition)
}

/// Directory of the running executable; the bundled servers ship next to it.
fn sibling_dir() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?.to_string_lossy().into_owned();
    debug!(dir = %dir, "builtin server search path");
    Some(dir)
}

pub async fn execute(ctx: &CliContext, args: AddArgs) -> Result<()> {
    let definition = build_definition(args)?;
    let added = ctx.runtime.add_server(definition).await.map_err(CliError::from)?;
    println!("Added server '{}' ({}).", added.name, added.category);
    if added.install_required {
        println!("Run 'toolmux install {}' before using its tools.", added.name);
    }
    if !added.required_env.is_empty() {
        println!("Requires: {}", added.required_env.join(", "));
    }
    Ok(())
}
