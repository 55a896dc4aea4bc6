//! Aggregated tool catalog across connected servers.
//!
//! Each server owns one slice of the catalog holding its tools and
//! resources. A slice is replaced wholesale when a handshake completes and
//! dropped when the connection leaves `Connected`, so readers never observe
//! a half-updated server.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;
use toolmux_core::{ResourceDescriptor, ToolDescriptor};

/// A tool together with the server that offers it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub server: String,
    pub category: String,
    pub tool: ToolDescriptor,
}

/// Lookup failures for unqualified tool names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("No connected server offers a tool named '{0}'")]
    NotFound(String),

    #[error("Tool '{tool}' is offered by several servers: {}", candidates.join(", "))]
    Ambiguous { tool: String, candidates: Vec<String> },
}

#[derive(Debug, Default)]
struct Slice {
    tools: Vec<CatalogEntry>,
    resources: Vec<ResourceDescriptor>,
}

type Slices = BTreeMap<String, Arc<Slice>>;

/// Per-server slices, keyed by server name.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    slices: RwLock<Slices>,
}

fn entries(server: &str, category: &str, tools: Vec<ToolDescriptor>) -> Vec<CatalogEntry> {
    tools
        .into_iter()
        .map(|tool| CatalogEntry {
            server: server.to_string(),
            category: category.to_string(),
            tool,
        })
        .collect()
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Slices> {
        self.slices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Slices> {
        self.slices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole slice for `server`. Returns the tool count.
    pub fn publish(
        &self,
        server: &str,
        category: &str,
        tools: Vec<ToolDescriptor>,
        resources: Vec<ResourceDescriptor>,
    ) -> usize {
        let tools = entries(server, category, tools);
        let count = tools.len();
        self.write()
            .insert(server.to_string(), Arc::new(Slice { tools, resources }));
        count
    }

    /// Replace the tools of `server`, keeping its resources.
    pub fn on_server_connected(&self, server: &str, category: &str, tools: Vec<ToolDescriptor>) -> usize {
        let tools = entries(server, category, tools);
        let count = tools.len();
        let mut slices = self.write();
        let resources = slices
            .get(server)
            .map(|slice| slice.resources.clone())
            .unwrap_or_default();
        slices.insert(server.to_string(), Arc::new(Slice { tools, resources }));
        count
    }

    /// Drop the slice for `server`. Returns whether one existed.
    pub fn on_server_disconnected(&self, server: &str) -> bool {
        self.write().remove(server).is_some()
    }

    /// Look up a tool by its qualified (server, tool) name.
    pub fn get(&self, server: &str, tool: &str) -> Option<CatalogEntry> {
        self.read()
            .get(server)?
            .tools
            .iter()
            .find(|e| e.tool.name == tool)
            .cloned()
    }

    /// Every server offering a tool named `tool`.
    pub fn find(&self, tool: &str) -> Vec<CatalogEntry> {
        self.read()
            .values()
            .flat_map(|slice| slice.tools.iter())
            .filter(|e| e.tool.name == tool)
            .cloned()
            .collect()
    }

    /// Resolve an unqualified tool name to exactly one entry.
    pub fn resolve(&self, tool: &str) -> Result<CatalogEntry, CatalogError> {
        let mut matches = self.find(tool);
        match matches.len() {
            0 => Err(CatalogError::NotFound(tool.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(CatalogError::Ambiguous {
                tool: tool.to_string(),
                candidates: matches.into_iter().map(|e| e.server).collect(),
            }),
        }
    }

    /// Case-insensitive substring search over tool names and descriptions.
    pub fn search(&self, query: &str) -> Vec<CatalogEntry> {
        let needle = query.to_lowercase();
        self.read()
            .values()
            .flat_map(|slice| slice.tools.iter())
            .filter(|e| {
                needle.is_empty()
                    || e.tool.name.to_lowercase().contains(&needle)
                    || e.tool.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// All entries, grouped by server in name order.
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.read()
            .values()
            .flat_map(|slice| slice.tools.iter().cloned())
            .collect()
    }

    pub fn entries_for(&self, server: &str) -> Vec<CatalogEntry> {
        self.read()
            .get(server)
            .map(|slice| slice.tools.clone())
            .unwrap_or_default()
    }

    pub fn tool_count(&self, server: &str) -> usize {
        self.read().get(server).map_or(0, |slice| slice.tools.len())
    }

    pub fn contains_server(&self, server: &str) -> bool {
        self.read().contains_key(server)
    }

    /// Total number of tools across all servers.
    pub fn len(&self) -> usize {
        self.read().values().map(|slice| slice.tools.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every listed resource, grouped by server in name order.
    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        self.read()
            .values()
            .flat_map(|slice| slice.resources.iter().cloned())
            .collect()
    }

    pub fn resources_for(&self, server: &str) -> Vec<ResourceDescriptor> {
        self.read()
            .get(server)
            .map(|slice| slice.resources.clone())
            .unwrap_or_default()
    }

    /// Servers listing a resource at `uri`.
    pub fn resource_servers(&self, uri: &str) -> Vec<String> {
        self.read()
            .iter()
            .filter(|(_, slice)| slice.resources.iter().any(|r| r.uri == uri))
            .map(|(server, _)| server.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolmux_core::InputSchema;

    fn tool(server: &str, name: &str, description: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: InputSchema::default(),
            server: server.to_string(),
        }
    }

    #[test]
    fn test_connect_replaces_slice() {
        let catalog = ToolCatalog::new();
        catalog.on_server_connected("calc", "math", vec![tool("calc", "add", "Add"), tool("calc", "sqrt", "Root")]);
        assert_eq!(catalog.tool_count("calc"), 2);

        catalog.on_server_connected("calc", "math", vec![tool("calc", "add", "Add")]);
        assert_eq!(catalog.tool_count("calc"), 1);
        assert!(catalog.get("calc", "sqrt").is_none());
    }

    #[test]
    fn test_disconnect_purges_only_that_server() {
        let catalog = ToolCatalog::new();
        catalog.on_server_connected("calc", "math", vec![tool("calc", "add", "")]);
        catalog.on_server_connected("git", "development", vec![tool("git", "git_log", "")]);

        assert!(catalog.on_server_disconnected("calc"));
        assert!(!catalog.on_server_disconnected("calc"));
        assert!(catalog.find("add").is_empty());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_resolve_reports_ambiguity() {
        let catalog = ToolCatalog::new();
        catalog.on_server_connected("a", "x", vec![tool("a", "search", "")]);
        catalog.on_server_connected("b", "x", vec![tool("b", "search", ""), tool("b", "fetch", "")]);

        assert_eq!(catalog.resolve("fetch").unwrap().server, "b");
        assert_eq!(
            catalog.resolve("search"),
            Err(CatalogError::Ambiguous {
                tool: "search".into(),
                candidates: vec!["a".into(), "b".into()]
            })
        );
        assert_eq!(catalog.resolve("nope"), Err(CatalogError::NotFound("nope".into())));
    }

    #[test]
    fn test_search_matches_name_and_description() {
        let catalog = ToolCatalog::new();
        catalog.on_server_connected(
            "calc",
            "math",
            vec![tool("calc", "sqrt", "Square ROOT of a number"), tool("calc", "add", "Sum two numbers")],
        );

        let hits: Vec<_> = catalog.search("root").into_iter().map(|e| e.tool.name).collect();
        assert_eq!(hits, ["sqrt"]);
        assert_eq!(catalog.search("NUMBER").len(), 2);
        assert_eq!(catalog.search("").len(), 2);
    }

    fn resource(server: &str, uri: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            uri: uri.to_string(),
            name: uri.rsplit('/').next().unwrap_or(uri).to_string(),
            description: String::new(),
            mime_type: None,
            server: server.to_string(),
        }
    }

    #[test]
    fn test_resources_share_the_slice_lifecycle() {
        let catalog = ToolCatalog::new();
        catalog.publish(
            "notes",
            "productivity",
            vec![tool("notes", "append", "")],
            vec![resource("notes", "notes://today"), resource("notes", "notes://todo")],
        );
        catalog.publish("files", "filesystem", vec![], vec![resource("files", "notes://today")]);
        assert_eq!(catalog.resources().len(), 3);
        assert_eq!(catalog.resource_servers("notes://today"), ["files", "notes"]);

        // A tool refresh keeps the resources.
        catalog.on_server_connected("notes", "productivity", vec![]);
        assert_eq!(catalog.resources_for("notes").len(), 2);
        assert_eq!(catalog.tool_count("notes"), 0);

        assert!(catalog.on_server_disconnected("notes"));
        assert!(catalog.resources_for("notes").is_empty());
        assert_eq!(catalog.resource_servers("notes://todo"), Vec::<String>::new());
        assert_eq!(catalog.resource_servers("notes://today"), ["files"]);
    }
}
