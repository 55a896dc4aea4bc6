//! Tool server definitions.
//!
//! A `ServerDefinition` is immutable once registered. To change a server,
//! remove it and register a new definition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How the tool server process is obtained and launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// A package installed through a language package manager (npm, pip).
    LocalPackage,
    /// A container image run through the container runtime.
    Container,
    /// An arbitrary user-supplied command.
    CustomCommand,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::LocalPackage => "local-package",
            Self::Container => "container",
            Self::CustomCommand => "custom-command",
        };
        f.write_str(label)
    }
}

/// Package manager used to install a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    /// Node packages via `npm`.
    Npm,
    /// Python packages via `pip`.
    Pip,
    /// Container images via `docker pull`.
    Docker,
}

impl InstallMethod {
    /// Programs that must be present before this method can install anything.
    pub const fn required_programs(self) -> &'static [&'static str] {
        match self {
            Self::Npm => &["node", "npm"],
            Self::Pip => &["python3"],
            Self::Docker => &["docker"],
        }
    }

    /// Build the install command for `package`.
    ///
    /// npm packages go into a per-server prefix under `install_root` when one
    /// is configured, otherwise they are installed globally.
    pub fn install_command(self, package: &str, install_root: Option<&Path>) -> InstallCommand {
        match self {
            Self::Npm => {
                let mut args = vec!["install".to_string()];
                match install_root {
                    Some(root) => {
                        args.push("--prefix".to_string());
                        args.push(
                            root.join(sanitize_package_dir(package))
                                .to_string_lossy()
                                .into_owned(),
                        );
                    }
                    None => args.push("--global".to_string()),
                }
                args.push(package.to_string());
                InstallCommand::new("npm", args)
            }
            Self::Pip => InstallCommand::new(
                "python3",
                vec![
                    "-m".to_string(),
                    "pip".to_string(),
                    "install".to_string(),
                    package.to_string(),
                ],
            ),
            Self::Docker => {
                InstallCommand::new("docker", vec!["pull".to_string(), package.to_string()])
            }
        }
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Npm => "npm",
            Self::Pip => "pip",
            Self::Docker => "docker",
        };
        f.write_str(label)
    }
}

/// `@scope/name` → `scope_name`, safe as a single directory component.
fn sanitize_package_dir(package: &str) -> String {
    package
        .trim_start_matches('@')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// A fully resolved package-manager invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl InstallCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for InstallCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Package to install and the method to install it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSpec {
    pub method: InstallMethod,
    /// Package identifier (npm name, pip requirement, or image reference).
    pub package: String,
}

/// Static environment variable passed to the server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub key: String,
    pub value: String,
}

impl EnvEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// How to start the server process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Executable name or absolute path. Flags belong in `args`.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory (absolute) for the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Extra PATH entries for the child, e.g. nvm or asdf shims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_extra: Option<String>,
}

/// A known tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Unique name within the registry.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display category used by the catalog (e.g. "math", "search").
    pub category: String,
    pub transport: TransportKind,
    pub launch: LaunchSpec,
    /// Static environment for the process.
    #[serde(default)]
    pub env: Vec<EnvEntry>,
    /// Secret environment variables resolved through the credential store.
    #[serde(default)]
    pub required_env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallSpec>,
    /// Whether `connect` requires a completed installation job first.
    pub install_required: bool,
}

impl ServerDefinition {
    /// A custom-command server that needs no installation.
    pub fn custom(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            category: "general".to_string(),
            transport: TransportKind::CustomCommand,
            launch: LaunchSpec {
                command: command.into(),
                args,
                working_dir: None,
                path_extra: None,
            },
            env: Vec::new(),
            required_env: Vec::new(),
            install: None,
            install_required: false,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub const fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Attach an install spec. The server then requires installation before connecting.
    #[must_use]
    pub fn with_install(mut self, method: InstallMethod, package: impl Into<String>) -> Self {
        self.install = Some(InstallSpec {
            method,
            package: package.into(),
        });
        self.install_required = true;
        self
    }

    #[must_use]
    pub const fn with_install_required(mut self, required: bool) -> Self {
        self.install_required = required;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvEntry::new(key, value));
        self
    }

    #[must_use]
    pub fn with_required_env(mut self, key: impl Into<String>) -> Self {
        self.required_env.push(key.into());
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.launch.working_dir = Some(dir.into());
        self
    }

    /// Check the definition for internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Server name cannot be empty".to_string());
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(format!("Server name must not contain whitespace: '{}'", self.name));
        }
        if self.launch.command.is_empty() {
            return Err("Launch command cannot be empty".to_string());
        }
        if self.launch.command.contains(char::is_whitespace) && !Path::new(&self.launch.command).is_absolute() {
            return Err(
                "Command must be an executable name/path only (e.g. 'npx'). \
                 Put flags and arguments in 'args'."
                    .to_string(),
            );
        }
        if let Some(ref cwd) = self.launch.working_dir {
            if !cwd.is_empty() && !Path::new(cwd).is_absolute() {
                return Err(format!("Working directory must be absolute: {cwd}"));
            }
        }
        if self.install_required && self.install.is_none() {
            return Err("install_required is set but no install spec is declared".to_string());
        }
        if let Some(ref spec) = self.install {
            if spec.package.trim().is_empty() {
                return Err("Install package identifier cannot be empty".to_string());
            }
        }
        if let Some(key) = self.required_env.iter().find(|k| k.is_empty() || k.contains('=')) {
            return Err(format!("Invalid required environment variable name: '{key}'"));
        }
        Ok(())
    }
}
