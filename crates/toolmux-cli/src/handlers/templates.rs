//! Templates command handler.

use anyhow::Result;
use serde_json::json;
use toolmux_core::{ServerTemplate, search_templates, template_categories, templates};

use crate::presentation::{print_json, print_separator};

fn print_categories(as_json: bool) {
    let categories = template_categories();
    if as_json {
        print_json(&json!(categories));
        return;
    }
    println!("{:<16} Templates", "Category");
    print_separator(70);
    for (category, names) in &categories {
        println!("{:<16} {}", category, names.join(", "));
    }
}

pub fn execute(search: Option<&str>, categories: bool, as_json: bool) -> Result<()> {
    if categories {
        print_categories(as_json);
        return Ok(());
    }
    let selected: Vec<&ServerTemplate> = match search {
        Some(query) => search_templates(query),
        None => templates().iter().collect(),
    };

    if as_json {
        let rows: Vec<_> = selected
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "category": t.category,
                    "description": t.description,
                    "transport": t.transport,
                    "required_env": t.required_env,
                })
            })
            .collect();
        print_json(&json!(rows));
        return Ok(());
    }

    if selected.is_empty() {
        if let Some(query) = search {
            println!("No templates match '{query}'.");
        }
        return Ok(());
    }

    println!("{:<22} {:<12} {:<16} Description", "Template", "Category", "Transport");
    print_separator(90);
    for template in selected {
        println!(
            "{:<22} {:<12} {:<16} {}",
            template.name,
            template.category,
            template.transport.to_string(),
            template.description
        );
        if !template.required_env.is_empty() {
            println!("{:<22} needs: {}", "", template.required_env.join(", "));
        }
    }
    Ok(())
}
