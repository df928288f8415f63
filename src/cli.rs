use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitefollow")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Bulk-follow SharePoint sites for directory users", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Credentials and endpoints. Flags win over environment, environment over
/// the config file.
#[derive(Args, Debug, Default)]
pub struct AuthArgs {
    /// Directory tenant id or domain
    #[arg(long, env = "SITEFOLLOW_TENANT_ID", global = true)]
    pub tenant_id: Option<String>,

    /// Application (client) id of the service principal
    #[arg(long, env = "SITEFOLLOW_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Client secret of the service principal
    #[arg(
        long,
        env = "SITEFOLLOW_CLIENT_SECRET",
        global = true,
        hide_env_values = true
    )]
    pub client_secret: Option<String>,

    /// Graph base URL
    #[arg(long, env = "SITEFOLLOW_GRAPH_URL", global = true)]
    pub graph_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Make every user follow every site, then verify
    Follow(FollowArgs),

    /// List the sites a user follows
    List(ListArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct FollowArgs {
    /// Site to follow (id, hostname:/path, or URL); repeatable
    #[arg(long = "site", value_name = "ID", required = true)]
    pub sites: Vec<String>,

    /// User id or UPN; repeatable
    #[arg(long = "user", value_name = "ID")]
    pub users: Vec<String>,

    /// Add the user members of this group
    #[arg(long, value_name = "ID", conflicts_with = "all_users")]
    pub group: Option<String>,

    /// Add every user in the tenant
    #[arg(long)]
    pub all_users: bool,

    /// Drop users that cannot be looked up before processing
    #[arg(long)]
    pub validate_users: bool,

    /// Write attempts per pair
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Wait after each write before re-reading, in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Wait between pairs, in milliseconds
    #[arg(long, value_name = "MS")]
    pub pair_delay_ms: Option<u64>,

    /// Only check current state; make no writes
    #[arg(long)]
    pub dry_run: bool,

    /// Match followed sites on id only instead of id, URL or name
    #[arg(long)]
    pub exact_match: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// User id or UPN (required)
    #[arg(long, value_name = "ID")]
    pub user: Option<String>,

    /// Look up description and timestamps for each site
    #[arg(long)]
    pub details: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Write to this file instead of stdout
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    #[default]
    Table,
    /// One block per record
    List,
    /// Comma-separated values with a header row
    Csv,
    /// Pretty-printed JSON array
    Json,
}
