//! Subcommand definitions.

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered servers with install and connection status
    Servers {
        /// Only show servers in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// List built-in server templates
    Templates {
        /// Only show templates whose name or description contains this text
        #[arg(long)]
        search: Option<String>,

        /// Group template names by category
        #[arg(long, conflicts_with = "search")]
        categories: bool,
    },

    /// Register a server from a template or a custom command
    Add {
        /// Template name (see `toolmux templates`), or the server name with --command
        name: String,

        /// Register under a different name (templates only)
        #[arg(long = "as")]
        alias: Option<String>,

        /// Launch a custom command instead of using a template
        #[arg(long, conflicts_with = "alias")]
        command: Option<String>,

        /// Arguments for the custom command
        #[arg(last = true, requires = "command")]
        args: Vec<String>,

        /// Category for a custom server
        #[arg(long, requires = "command")]
        category: Option<String>,

        /// Environment variable the server needs from the credential store (repeatable)
        #[arg(long = "require-env", requires = "command")]
        required_env: Vec<String>,
    },

    /// Remove a registered server
    Remove {
        /// Server name
        name: String,
    },

    /// Install a server's package and check its dependencies
    Install {
        /// Server name
        name: String,
    },

    /// Connect to servers and list the tools they expose
    Tools {
        /// Only connect to this server
        #[arg(long)]
        server: Option<String>,
    },

    /// Connect to servers and search their tools by name or description
    Search {
        /// Case-insensitive search text
        query: String,
    },

    /// Connect to servers and list the resources they expose
    Resources {
        /// Only connect to this server
        #[arg(long)]
        server: Option<String>,
    },

    /// Read a resource by URI and print its contents
    Read {
        /// Resource URI
        uri: String,

        /// Server to read from when several expose the URI
        #[arg(long)]
        server: Option<String>,
    },

    /// Call a tool and print the result
    Call {
        /// Tool name, or `server/tool` to pick the provider
        tool: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,

        /// Per-call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}
