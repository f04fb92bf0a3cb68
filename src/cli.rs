use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "foremanctl")]
#[command(version)]
#[command(about = "Declarative CLI for Foreman/Katello entities", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Report what would change without writing anything
    #[arg(long, global = true)]
    pub check: bool,

    /// Print a unified diff of every change to stderr
    #[arg(long, global = true)]
    pub diff: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection parameters, each with an environment fallback and a
/// `[connection]` entry in the config file as the last resort.
#[derive(Args)]
pub struct ConnectionArgs {
    /// Server base URL, e.g. https://foreman.example.com
    #[arg(long, env = "FOREMAN_SERVER_URL", global = true)]
    pub server_url: Option<String>,

    /// User to authenticate as
    #[arg(long, env = "FOREMAN_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for the user
    #[arg(long, env = "FOREMAN_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Skip TLS certificate verification (FOREMAN_VALIDATE_CERTS=false)
    #[arg(long, global = true)]
    pub no_verify_ssl: bool,

    /// Seconds to wait for server tasks spawned by slow actions
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage organizations
    Organization(OrganizationArgs),

    /// Manage locations
    Location(LocationArgs),

    /// Manage DNS domains
    Domain(DomainArgs),

    /// Manage search bookmarks
    Bookmark(BookmarkArgs),

    /// Manage user roles
    Role(RoleArgs),

    /// Manage smart proxies
    SmartProxy(SmartProxyArgs),

    /// Manage global parameters
    GlobalParameter(GlobalParameterArgs),

    /// Manage server settings
    Setting(SettingArgs),

    /// Manage Katello lifecycle environments
    LifecycleEnvironment(LifecycleEnvironmentArgs),

    /// Manage Katello content views
    #[command(subcommand)]
    ContentView(ContentViewCommand),

    /// Manage hosts
    #[command(subcommand)]
    Host(HostCommand),

    /// Check connectivity and report the server version
    Ping,

    /// List entities matching a search expression
    Search(SearchArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Foreman entities
// ============================================================================

#[derive(Parser)]
pub struct OrganizationArgs {
    /// Organization name
    pub name: String,

    /// Rename the organization to this name
    #[arg(long)]
    pub updated_name: Option<String>,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Label used in URLs and repository paths, immutable after creation
    #[arg(long)]
    pub label: Option<String>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct LocationArgs {
    /// Location name; nested locations are written as Parent/Child titles
    pub name: String,

    /// Rename the location to this name
    #[arg(long)]
    pub updated_name: Option<String>,

    /// Title of the parent location
    #[arg(long)]
    pub parent: Option<String>,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Organization the location belongs to, repeatable
    #[arg(long = "organization")]
    pub organizations: Vec<String>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct DomainArgs {
    /// Fully qualified domain name
    pub name: String,

    /// Rename the domain to this name
    #[arg(long)]
    pub updated_name: Option<String>,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Alias for --description, matching the server's attribute name
    #[arg(long, conflicts_with = "description")]
    pub fullname: Option<String>,

    /// Name of the smart proxy serving DNS for this domain
    #[arg(long)]
    pub dns_proxy: Option<String>,

    /// Location title the domain belongs to, repeatable
    #[arg(long = "location")]
    pub locations: Vec<String>,

    /// Organization the domain belongs to, repeatable
    #[arg(long = "organization")]
    pub organizations: Vec<String>,

    /// Domain parameter, repeatable
    #[arg(long = "parameter", value_name = "NAME[:TYPE]=VALUE")]
    pub parameters: Vec<String>,

    /// Remove every parameter from the domain
    #[arg(long, conflicts_with = "parameters")]
    pub clear_parameters: bool,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct BookmarkArgs {
    /// Bookmark name
    pub name: String,

    /// Controller the bookmark belongs to, e.g. hosts
    #[arg(long)]
    pub controller: String,

    /// Search query the bookmark saves; required unless state is absent
    #[arg(long)]
    pub query: Option<String>,

    /// Whether the bookmark is visible to other users
    #[arg(long)]
    pub public: Option<bool>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct RoleArgs {
    /// Role name
    pub name: String,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Location title the role applies to, repeatable
    #[arg(long = "location")]
    pub locations: Vec<String>,

    /// Organization the role applies to, repeatable
    #[arg(long = "organization")]
    pub organizations: Vec<String>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct SmartProxyArgs {
    /// Smart proxy name
    pub name: String,

    /// URL the proxy listens on; required unless state is absent
    #[arg(long)]
    pub url: Option<String>,

    /// How content is downloaded through the proxy
    #[arg(long)]
    pub download_policy: Option<String>,

    /// Location title the proxy serves, repeatable
    #[arg(long = "location")]
    pub locations: Vec<String>,

    /// Organization the proxy serves, repeatable
    #[arg(long = "organization")]
    pub organizations: Vec<String>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct GlobalParameterArgs {
    /// Parameter name
    pub name: String,

    /// Parameter value; JSON when it parses, a literal string otherwise.
    /// Required unless state is absent
    #[arg(long)]
    pub value: Option<String>,

    /// How the server casts the stored value
    #[arg(long, value_enum)]
    pub parameter_type: Option<ParameterTypeArg>,

    /// Mask the value in the UI and in reports
    #[arg(long)]
    pub hidden_value: Option<bool>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct SettingArgs {
    /// Setting name
    pub name: String,

    /// New value; omit to reset the setting to its server default
    #[arg(long)]
    pub value: Option<String>,
}

// ============================================================================
// Katello entities
// ============================================================================

#[derive(Parser)]
pub struct LifecycleEnvironmentArgs {
    /// Lifecycle environment name
    pub name: String,

    /// Organization the environment belongs to
    #[arg(long)]
    pub organization: String,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Label used in repository paths, immutable after creation
    #[arg(long)]
    pub label: Option<String>,

    /// Name of the environment this one promotes from; defaults to
    /// Library on creation and is immutable afterwards
    #[arg(long)]
    pub prior: Option<String>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Subcommand)]
pub enum ContentViewCommand {
    /// Converge a content view to its desired state
    Ensure(ContentViewArgs),

    /// Publish a new content view version
    Publish(PublishArgs),
}

#[derive(Parser)]
pub struct ContentViewArgs {
    /// Content view name
    pub name: String,

    /// Organization owning the content view
    #[arg(long)]
    pub organization: String,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Whether this is a composite content view
    #[arg(long)]
    pub composite: Option<bool>,

    /// Publish a new version automatically when a component changes;
    /// composite content views only
    #[arg(long)]
    pub auto_publish: Option<bool>,

    /// Repository name to include, within the same organization, repeatable
    #[arg(long = "repository")]
    pub repositories: Vec<String>,

    /// Desired state of the entity
    #[arg(long, value_enum, default_value_t = StateArg::Present)]
    pub state: StateArg,
}

#[derive(Parser)]
pub struct PublishArgs {
    /// Content view name
    pub name: String,

    /// Organization owning the content view
    #[arg(long)]
    pub organization: String,

    /// Description for the published version
    #[arg(long)]
    pub description: Option<String>,
}

// ============================================================================
// Hosts
// ============================================================================

#[derive(Subcommand)]
pub enum HostCommand {
    /// Converge a host's power state
    Power(HostPowerArgs),
}

#[derive(Parser)]
pub struct HostPowerArgs {
    /// Host FQDN
    pub name: String,

    /// Desired power state
    #[arg(value_enum)]
    pub state: PowerStateArg,
}

// ============================================================================
// Read commands
// ============================================================================

#[derive(Parser)]
pub struct SearchArgs {
    /// Plural resource name, e.g. domains or content_views
    #[arg(long)]
    pub resource: String,

    /// Search expression in the server's query DSL
    #[arg(long)]
    pub search: Option<String>,
}

// ============================================================================
// Shared value enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    /// Entity must exist and match the given attributes
    Present,
    /// Entity must exist; attributes only apply on creation
    #[value(name = "present_with_defaults")]
    PresentWithDefaults,
    /// Entity must not exist
    Absent,
}

impl From<StateArg> for reconcile::State {
    fn from(state: StateArg) -> Self {
        match state {
            StateArg::Present => Self::Present,
            StateArg::PresentWithDefaults => Self::PresentWithDefaults,
            StateArg::Absent => Self::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerStateArg {
    /// Power the host on
    #[value(alias = "start")]
    On,
    /// Power the host off
    #[value(alias = "stop")]
    Off,
}

impl PowerStateArg {
    /// Value sent as the server's power_action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParameterTypeArg {
    String,
    Boolean,
    Integer,
    Real,
    Array,
    Hash,
    Yaml,
    Json,
}

impl ParameterTypeArg {
    /// The server-side type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Array => "array",
            Self::Hash => "hash",
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_state_arg_uses_underscored_name() {
        let cli = Cli::try_parse_from([
            "foremanctl",
            "organization",
            "ACME",
            "--state",
            "present_with_defaults",
        ])
        .unwrap();
        let Command::Organization(args) = cli.command else {
            panic!("expected an organization command");
        };
        assert_eq!(args.state, StateArg::PresentWithDefaults);
    }

    #[test]
    fn test_power_state_accepts_aliases() {
        let cli =
            Cli::try_parse_from(["foremanctl", "host", "power", "web01.example.com", "start"])
                .unwrap();
        let Command::Host(HostCommand::Power(args)) = cli.command else {
            panic!("expected a host power command");
        };
        assert_eq!(args.state, PowerStateArg::On);
        assert_eq!(args.state.as_str(), "on");
    }

    #[test]
    fn test_connection_flags_are_global() {
        let cli = Cli::try_parse_from([
            "foremanctl",
            "ping",
            "--server-url",
            "https://foreman.example.com",
            "--check",
        ])
        .unwrap();
        assert_eq!(
            cli.connection.server_url.as_deref(),
            Some("https://foreman.example.com")
        );
        assert!(cli.check);
    }

    #[test]
    fn test_domain_fullname_conflicts_with_description() {
        let result = Cli::try_parse_from([
            "foremanctl",
            "domain",
            "example.com",
            "--description",
            "a",
            "--fullname",
            "b",
        ]);
        assert!(result.is_err());
    }
}
