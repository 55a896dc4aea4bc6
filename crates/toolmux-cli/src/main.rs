//! CLI entry point.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use toolmux_cli::error::exit_code_for;
use toolmux_cli::handlers::{self, add::AddArgs};
use toolmux_cli::{Cli, CliConfig, Commands, bootstrap};

fn init_logging() {
    let filter = EnvFilter::try_from_env("TOOLMUX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };
    let as_json = cli.json;

    // Templates need no registry.
    if let Commands::Templates { search, categories } = &command {
        return handlers::templates::execute(search.as_deref(), *categories, as_json);
    }

    let ctx = bootstrap(CliConfig::load(cli.data_dir)?).await?;
    let outcome = match command {
        Commands::Servers { category } => handlers::servers::execute(&ctx, category.as_deref(), as_json).await,
        Commands::Templates { search, categories } => {
            handlers::templates::execute(search.as_deref(), categories, as_json)
        }
        Commands::Add {
            name,
            alias,
            command,
            args,
            category,
            required_env,
        } => {
            let args = AddArgs {
                name,
                alias,
                command,
                args,
                category,
                required_env,
            };
            handlers::add::execute(&ctx, args).await
        }
        Commands::Remove { name } => handlers::remove::execute(&ctx, &name).await,
        Commands::Install { name } => handlers::install::execute(&ctx, &name, as_json).await,
        Commands::Tools { server } => handlers::tools::list(&ctx, server.as_deref(), as_json).await,
        Commands::Search { query } => handlers::tools::search(&ctx, &query, as_json).await,
        Commands::Resources { server } => handlers::resources::list(&ctx, server.as_deref(), as_json).await,
        Commands::Read { uri, server } => handlers::resources::read(&ctx, &uri, server.as_deref(), as_json).await,
        Commands::Call { tool, args, timeout_ms } => {
            handlers::call::execute(&ctx, &tool, &args, timeout_ms, as_json).await
        }
    };

    ctx.runtime.shutdown().await;
    outcome
}

#[tokio::main]
async fn main() {
    init_logging();
    dotenvy::dotenv().ok();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}
