//! Resources and read command handlers.

use anyhow::Result;
use serde_json::json;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::handlers::connect_servers;
use crate::presentation::{print_json, print_separator, truncate_string};

/// Connect and list every resource, or only those of `server`.
pub async fn list(ctx: &CliContext, server: Option<&str>, as_json: bool) -> Result<()> {
    connect_servers(ctx, server).await?;
    let resources = match server {
        Some(name) => ctx.runtime.catalog().resources_for(name),
        None => ctx.runtime.resources(),
    };
    if as_json {
        print_json(&json!(resources));
        return Ok(());
    }
    if resources.is_empty() {
        println!("No resources available.");
        return Ok(());
    }

    println!("{:<20} {:<36} Name", "Server", "URI");
    print_separator(90);
    for resource in &resources {
        println!(
            "{:<20} {:<36} {}",
            truncate_string(&resource.server, 19),
            truncate_string(&resource.uri, 35),
            truncate_string(&resource.name, 30)
        );
    }
    Ok(())
}

/// Connect and print the contents of `uri`.
pub async fn read(ctx: &CliContext, uri: &str, server: Option<&str>, as_json: bool) -> Result<()> {
    connect_servers(ctx, server).await?;
    let contents = ctx
        .runtime
        .read_resource(server, uri)
        .await
        .map_err(CliError::from)?;
    if as_json {
        print_json(&json!(contents));
        return Ok(());
    }
    for item in &contents {
        match (&item.text, &item.blob) {
            (Some(text), _) => println!("{text}"),
            (None, Some(blob)) => println!("<{} bytes of base64 data>", blob.len()),
            (None, None) => println!("<empty>"),
        }
    }
    Ok(())
}
