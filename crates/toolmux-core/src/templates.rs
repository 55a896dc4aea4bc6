//! Built-in server templates.
//!
//! Templates are static blueprints. `ServerTemplate::instantiate` turns one
//! into a `ServerDefinition` that can be registered under any name.

use std::collections::BTreeMap;

use crate::domain::{InstallMethod, InstallSpec, LaunchSpec, ServerDefinition, TransportKind};

/// Name of the bundled calculator server executable.
pub const CALCULATOR_BINARY: &str = "toolmux-calculator";

/// Name of the bundled date and time server executable.
pub const DATETIME_BINARY: &str = "toolmux-datetime";

/// Executables shipped next to the toolmux binaries.
pub const BUILTIN_BINARIES: &[&str] = &[CALCULATOR_BINARY, DATETIME_BINARY];

/// Blueprint for a well-known tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub transport: TransportKind,
    pub install: Option<(InstallMethod, &'static str)>,
    pub command: &'static str,
    pub args: &'static [&'static str],
    pub required_env: &'static [&'static str],
}

impl ServerTemplate {
    /// Build a definition from this template, optionally under a different name.
    pub fn instantiate(&self, name: Option<&str>) -> ServerDefinition {
        ServerDefinition {
            name: name.unwrap_or(self.name).to_string(),
            description: Some(self.description.to_string()),
            category: self.category.to_string(),
            transport: self.transport,
            launch: LaunchSpec {
                command: self.command.to_string(),
                args: self.args.iter().map(ToString::to_string).collect(),
                working_dir: None,
                path_extra: None,
            },
            env: Vec::new(),
            required_env: self.required_env.iter().map(ToString::to_string).collect(),
            install: self.install.map(|(method, package)| InstallSpec {
                method,
                package: package.to_string(),
            }),
            install_required: self.install.is_some(),
        }
    }
}

const TEMPLATES: &[ServerTemplate] = &[
    ServerTemplate {
        name: "calculator-builtin",
        description: "Built-in calculator with basic mathematical operations",
        category: "math",
        transport: TransportKind::CustomCommand,
        install: None,
        command: CALCULATOR_BINARY,
        args: &[],
        required_env: &[],
    },
    ServerTemplate {
        name: "datetime-builtin",
        description: "Built-in current time, timestamps and date formatting across timezones",
        category: "utility",
        transport: TransportKind::CustomCommand,
        install: None,
        command: DATETIME_BINARY,
        args: &[],
        required_env: &[],
    },
    ServerTemplate {
        name: "filesystem",
        description: "File system operations like reading, writing, and listing files",
        category: "filesystem",
        transport: TransportKind::LocalPackage,
        install: Some((InstallMethod::Npm, "@modelcontextprotocol/server-filesystem")),
        command: "npx",
        args: &["-y", "@modelcontextprotocol/server-filesystem", "."],
        required_env: &[],
    },
    ServerTemplate {
        name: "git",
        description: "Git repository operations and version control",
        category: "development",
        transport: TransportKind::LocalPackage,
        install: Some((InstallMethod::Pip, "mcp-server-git")),
        command: "python3",
        args: &["-m", "mcp_server_git"],
        required_env: &[],
    },
    ServerTemplate {
        name: "fetch",
        description: "HTTP fetching with HTML to markdown conversion",
        category: "web",
        transport: TransportKind::LocalPackage,
        install: Some((InstallMethod::Pip, "mcp-server-fetch")),
        command: "python3",
        args: &["-m", "mcp_server_fetch"],
        required_env: &[],
    },
    ServerTemplate {
        name: "time",
        description: "Date and time operations, timezone conversions",
        category: "utility",
        transport: TransportKind::LocalPackage,
        install: Some((InstallMethod::Pip, "mcp-server-time")),
        command: "python3",
        args: &["-m", "mcp_server_time"],
        required_env: &[],
    },
    ServerTemplate {
        name: "memory",
        description: "Persistent memory and note-taking",
        category: "productivity",
        transport: TransportKind::LocalPackage,
        install: Some((InstallMethod::Npm, "@modelcontextprotocol/server-memory")),
        command: "npx",
        args: &["-y", "@modelcontextprotocol/server-memory"],
        required_env: &[],
    },
    ServerTemplate {
        name: "github",
        description: "GitHub repositories, issues and pull requests",
        category: "development",
        transport: TransportKind::Container,
        install: Some((InstallMethod::Docker, "ghcr.io/github/github-mcp-server")),
        command: "docker",
        args: &[
            "run",
            "-i",
            "--rm",
            "-e",
            "GITHUB_PERSONAL_ACCESS_TOKEN",
            "ghcr.io/github/github-mcp-server",
        ],
        required_env: &["GITHUB_PERSONAL_ACCESS_TOKEN"],
    },
    ServerTemplate {
        name: "brave-search",
        description: "Web search using the Brave Search API",
        category: "search",
        transport: TransportKind::LocalPackage,
        install: Some((InstallMethod::Npm, "@modelcontextprotocol/server-brave-search")),
        command: "npx",
        args: &["-y", "@modelcontextprotocol/server-brave-search"],
        required_env: &["BRAVE_API_KEY"],
    },
];

/// All built-in templates.
pub const fn templates() -> &'static [ServerTemplate] {
    TEMPLATES
}

/// Look up a template by name.
pub fn find_template(name: &str) -> Option<&'static ServerTemplate> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Templates whose name or description contains `query`, ignoring case.
pub fn search_templates(query: &str) -> Vec<&'static ServerTemplate> {
    let query = query.trim().to_lowercase();
    TEMPLATES
        .iter()
        .filter(|t| t.name.to_lowercase().contains(&query) || t.description.to_lowercase().contains(&query))
        .collect()
}

/// Template names grouped by category.
pub fn template_categories() -> BTreeMap<&'static str, Vec<&'static str>> {
    let mut categories: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for template in TEMPLATES {
        categories.entry(template.category).or_default().push(template.name);
    }
    categories
}
