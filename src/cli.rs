// src/cli.rs

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{AuthType, HubSpotEnv, PublishMode};

/// HubSpot developer CLI.
///
/// Manage CMS assets, serverless functions, secrets, HubDB tables, custom
/// objects, projects and test accounts from the terminal.
#[derive(Parser, Debug)]
#[command(name = "hs", version, propagate_version = true)]
pub struct Cli {
    /// Path to a config file (defaults to the nearest hubspot.config.yml,
    /// then ~/.hscli/config.yml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Account name or id to act on
    #[arg(long, visible_alias = "portal", global = true)]
    pub account: Option<String>,

    /// Verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Read credentials from HUBSPOT_* environment variables
    #[arg(long, global = true)]
    pub use_env: bool,

    /// Override the HubSpot API base URL
    #[arg(long, global = true, hide = true, env = "HUBSPOT_API_BASE_URL")]
    pub api_base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create hubspot.config.yml in the current directory and connect an account
    Init(InitArgs),

    /// Connect (or reconnect) an account in an existing config
    Auth(AuthArgs),

    /// Manage connected accounts
    #[command(visible_alias = "account")]
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },

    /// Change CLI settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Scaffold a new asset or download a boilerplate project
    Create(CreateArgs),

    /// Design Manager files, serverless functions and themes
    Cms {
        #[command(subcommand)]
        command: CmsCommand,
    },

    /// Custom object schemas
    #[command(name = "custom-object", visible_alias = "customObject")]
    CustomObject {
        #[command(subcommand)]
        command: CustomObjectCommand,
    },

    /// HubDB tables
    Hubdb {
        #[command(subcommand)]
        command: HubdbCommand,
    },

    /// Serverless function secrets
    #[command(visible_alias = "secrets")]
    Secret {
        #[command(subcommand)]
        command: SecretCommand,
    },

    /// File Manager assets
    Filemanager {
        #[command(subcommand)]
        command: FilemanagerCommand,
    },

    /// Developer projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Developer test accounts
    #[command(name = "test-account", visible_alias = "testAccount")]
    TestAccount {
        #[command(subcommand)]
        command: TestAccountCommand,
    },

    /// Model Context Protocol server integration
    Mcp {
        #[command(subcommand)]
        command: McpCommand,
    },
}

/* ---------------- init / auth ---------------- */

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Personal access key (prompted when omitted)
    #[arg(long)]
    pub personal_access_key: Option<String>,

    /// HubSpot environment
    #[arg(long, value_enum, default_value_t = HubSpotEnv::Prod)]
    pub env: HubSpotEnv,
}

#[derive(Args, Debug)]
pub struct AuthArgs {
    #[arg(long, value_enum, default_value_t = AuthType::PersonalAccessKey)]
    pub auth_type: AuthType,

    #[arg(long)]
    pub personal_access_key: Option<String>,

    /// OAuth2 app client id
    #[arg(long)]
    pub client_id: Option<String>,

    /// OAuth2 app client secret
    #[arg(long)]
    pub client_secret: Option<String>,

    /// OAuth2 scopes (repeatable)
    #[arg(long = "scope")]
    pub scopes: Vec<String>,

    #[arg(long, value_enum, default_value_t = HubSpotEnv::Prod)]
    pub env: HubSpotEnv,
}

/* ---------------- accounts ---------------- */

#[derive(Subcommand, Debug)]
pub enum AccountsCommand {
    /// List connected accounts
    #[command(visible_alias = "ls")]
    List,

    /// Show details for one account (default account when omitted)
    Info {
        #[arg(value_name = "ACCOUNT")]
        target: Option<String>,
    },

    /// Remove an account from the config (or the one named by --account)
    Remove {
        #[arg(value_name = "ACCOUNT")]
        target: Option<String>,
    },

    /// Rename an account
    Rename {
        #[arg(value_name = "ACCOUNT")]
        target: String,
        new_name: String,
    },

    /// Set the default account
    Use {
        #[arg(value_name = "ACCOUNT")]
        target: Option<String>,
    },

    /// Remove accounts whose credentials no longer work
    Clean {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Pin an account for the current directory (.hsaccount)
    CreateOverride {
        #[arg(value_name = "ACCOUNT")]
        target: Option<String>,
    },

    /// Remove the nearest .hsaccount override
    RemoveOverride,
}

/* ---------------- config ---------------- */

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Update CLI settings
    Set(ConfigSetArgs),

    /// Move a hubspot.config.yml into the global config
    Migrate,
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    #[arg(long, value_enum)]
    pub default_cms_publish_mode: Option<PublishMode>,

    /// HTTP timeout in milliseconds
    #[arg(long)]
    pub http_timeout: Option<u64>,

    #[arg(long)]
    pub allow_usage_tracking: Option<bool>,
}

/* ---------------- create ---------------- */

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateKind {
    Module,
    Template,
    Function,
    App,
    ReactApp,
    VueApp,
    WebsiteTheme,
    WebpackServerless,
    ApiSample,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(value_enum)]
    pub kind: CreateKind,

    /// Asset name
    pub name: Option<String>,

    /// Destination directory (defaults to the current directory)
    pub dest: Option<PathBuf>,

    /// Function endpoint path (function only)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Function HTTP method (function only)
    #[arg(long, default_value = "GET")]
    pub method: String,
}

/* ---------------- cms ---------------- */

#[derive(Subcommand, Debug)]
pub enum CmsCommand {
    /// Download a file or folder from the Design Manager
    Fetch {
        src: String,
        dest: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<PublishMode>,
        /// Replace existing local files
        #[arg(long)]
        overwrite: bool,
    },

    /// Upload a file or folder to the Design Manager
    Upload {
        src: PathBuf,
        dest: String,
        #[arg(long, value_enum)]
        mode: Option<PublishMode>,
    },

    /// Delete a file or folder from the Design Manager
    #[command(visible_alias = "remove")]
    Delete {
        path: String,
        #[arg(long, value_enum)]
        mode: Option<PublishMode>,
    },

    /// Serverless functions
    Function {
        #[command(subcommand)]
        command: FunctionCommand,
    },

    /// Theme tooling
    Theme {
        #[command(subcommand)]
        command: ThemeCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum FunctionCommand {
    /// List deployed function routes
    #[command(visible_alias = "ls")]
    List {
        #[arg(long)]
        json: bool,
    },

    /// Build and deploy a remote .functions folder
    Deploy { path: String },

    /// Serve a local .functions folder over HTTP
    Server {
        path: PathBuf,

        #[arg(long, default_value_t = crate::functions::DEFAULT_PORT)]
        port: u16,

        /// Inject a mock contact into the context
        #[arg(long)]
        contact: bool,

        /// Reload when files change
        #[arg(long)]
        watch: bool,

        /// Print each execution record as JSON
        #[arg(long)]
        log_output: bool,

        /// Node.js executable
        #[arg(long, default_value = "node")]
        node: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ThemeCommand {
    /// Map theme fields to the CSS selectors that use them
    GenerateSelectors { theme_path: PathBuf },
}

/* ---------------- custom objects ---------------- */

#[derive(Subcommand, Debug)]
pub enum CustomObjectCommand {
    /// Custom object schema definitions
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// Create a schema from a JSON definition
    Create {
        #[arg(long)]
        path: PathBuf,
    },
    /// Update a schema from a JSON definition
    Update {
        name: String,
        #[arg(long)]
        path: PathBuf,
    },
    Delete {
        name: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    #[command(visible_alias = "ls")]
    List,
    /// Write one schema to a JSON file
    Fetch { name: String, dest: Option<PathBuf> },
    /// Write every schema to JSON files
    FetchAll { dest: Option<PathBuf> },
}

/* ---------------- hubdb ---------------- */

#[derive(Subcommand, Debug)]
pub enum HubdbCommand {
    /// Create and publish a table from a JSON file
    Create {
        #[arg(long)]
        path: PathBuf,
    },
    Delete {
        table: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Delete every row of a table, then publish
    Clear { table: String },
    /// Write a table and its rows to a JSON file
    Fetch { table: String, dest: Option<PathBuf> },
    #[command(visible_alias = "ls")]
    List,
}

/* ---------------- secrets ---------------- */

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
    Add {
        name: String,
        /// Secret value (prompted when omitted)
        #[arg(long)]
        value: Option<String>,
    },
    Update {
        name: String,
        #[arg(long)]
        value: Option<String>,
    },
    Delete {
        name: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    #[command(visible_alias = "ls")]
    List,
}

/* ---------------- file manager ---------------- */

#[derive(Subcommand, Debug)]
pub enum FilemanagerCommand {
    Fetch {
        src: String,
        dest: Option<PathBuf>,
        #[arg(long)]
        overwrite: bool,
    },
    Upload { src: PathBuf, dest: String },
}

/* ---------------- projects ---------------- */

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Scaffold a project and register it with HubSpot
    Create(ProjectScaffoldArgs),
    /// Scaffold a project locally
    Init(ProjectScaffoldArgs),
    /// Zip and upload the project source, then wait for the build
    Upload {
        /// Project directory (defaults to the nearest hsproject.json)
        path: Option<PathBuf>,
        #[arg(long, short = 'm', default_value = "")]
        message: String,
    },
    /// Deploy a build (latest when omitted)
    Deploy {
        path: Option<PathBuf>,
        #[arg(long)]
        build_id: Option<u64>,
    },
}

#[derive(Args, Debug)]
pub struct ProjectScaffoldArgs {
    pub name: Option<String>,
    /// Parent directory for the new project
    #[arg(long)]
    pub location: Option<PathBuf>,
}

/* ---------------- test accounts ---------------- */

#[derive(Subcommand, Debug)]
pub enum TestAccountCommand {
    /// Create a test account from a definition file
    Create {
        #[arg(long)]
        path: PathBuf,
    },
    Delete {
        id: u64,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Write a test account definition file
    CreateConfig {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Batch-create CRM records from a JSON file
    ImportData {
        #[arg(long)]
        path: PathBuf,
        /// CRM object type, when the file holds a bare array
        #[arg(long)]
        object_type: Option<String>,
    },
}

/* ---------------- mcp ---------------- */

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpClient {
    Claude,
    Cursor,
    Windsurf,
    Vscode,
}

#[derive(Subcommand, Debug)]
pub enum McpCommand {
    /// Register the HubSpot MCP server with AI clients
    Setup {
        #[arg(long = "client", value_enum)]
        clients: Vec<McpClient>,
    },
    /// Run the HubSpot MCP server
    Start {
        #[arg(long)]
        ai_agent: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_aliases_and_globals() {
        let cli = Cli::try_parse_from([
            "hs", "customObject", "schema", "fetch", "car", "--account", "prod",
        ])
        .unwrap();
        assert_eq!(cli.account.as_deref(), Some("prod"));
        assert!(matches!(
            cli.command,
            Command::CustomObject {
                command: CustomObjectCommand::Schema {
                    command: SchemaCommand::Fetch { .. }
                }
            }
        ));

        let cli = Cli::try_parse_from(["hs", "secrets", "add", "TOKEN", "--value", "x"]).unwrap();
        assert!(matches!(cli.command, Command::Secret { command: SecretCommand::Add { .. } }));

        let cli = Cli::try_parse_from([
            "hs", "config", "set", "--default-cms-publish-mode=draft",
        ])
        .unwrap();
        match cli.command {
            Command::Config {
                command: ConfigCommand::Set(args),
            } => assert_eq!(args.default_cms_publish_mode, Some(PublishMode::Draft)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn account_positional_does_not_shadow_global_flag() {
        let cli = Cli::try_parse_from(["hs", "accounts", "remove", "--account=solo"]).unwrap();
        assert_eq!(cli.account.as_deref(), Some("solo"));
        assert!(matches!(
            cli.command,
            Command::Accounts {
                command: AccountsCommand::Remove { target: None }
            }
        ));

        let cli = Cli::try_parse_from(["hs", "--account", "other", "accounts", "info", "prod"]).unwrap();
        assert_eq!(cli.account.as_deref(), Some("other"));
        match cli.command {
            Command::Accounts {
                command: AccountsCommand::Info { target },
            } => assert_eq!(target.as_deref(), Some("prod")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn function_server_defaults() {
        let cli = Cli::try_parse_from(["hs", "cms", "function", "server", "demo.functions"]).unwrap();
        match cli.command {
            Command::Cms {
                command:
                    CmsCommand::Function {
                        command: FunctionCommand::Server { port, contact, node, .. },
                    },
            } => {
                assert_eq!(port, 5432);
                assert!(!contact);
                assert_eq!(node, "node");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
