use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use gitup_update::{SourceKind, TagSelectionPolicy, TAG_LOOKUP_TIMEOUT_MS};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliTagPolicy {
    FirstNewer,
    HighestNewer,
}

impl From<CliTagPolicy> for TagSelectionPolicy {
    fn from(value: CliTagPolicy) -> Self {
        match value {
            CliTagPolicy::FirstNewer => TagSelectionPolicy::FirstNewer,
            CliTagPolicy::HighestNewer => TagSelectionPolicy::HighestNewer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliComponentKind {
    Plugin,
    Theme,
}

impl From<CliComponentKind> for SourceKind {
    fn from(value: CliComponentKind) -> Self {
        match value {
            CliComponentKind::Plugin => SourceKind::Plugin,
            CliComponentKind::Theme => SourceKind::Theme,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliCheckScope {
    All,
    Plugin,
    Theme,
}

impl CliCheckScope {
    pub fn kinds(self) -> &'static [SourceKind] {
        match self {
            CliCheckScope::All => &[SourceKind::Plugin, SourceKind::Theme],
            CliCheckScope::Plugin => &[SourceKind::Plugin],
            CliCheckScope::Theme => &[SourceKind::Theme],
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gitup",
    about = "Tag-based updates for plugins and themes that declare a GitHub URI",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "GITUP_PLUGINS_ROOT",
        default_value = "wp-content/plugins",
        global = true,
        help = "Directory containing installed plugins."
    )]
    pub plugins_root: PathBuf,

    #[arg(
        long,
        env = "GITUP_THEMES_ROOT",
        default_value = "wp-content/themes",
        global = true,
        help = "Directory containing installed themes."
    )]
    pub themes_root: PathBuf,

    #[arg(
        long,
        env = "GITUP_STATE_DIR",
        default_value = ".gitup",
        global = true,
        help = "Directory for the activation store and fetch diagnostics journal."
    )]
    pub state_dir: PathBuf,

    #[arg(
        long,
        env = "GITUP_WEB_HOST",
        default_value = "github.com",
        global = true,
        help = "Host of declared repository URIs that is rewritten to the API base."
    )]
    pub web_host: String,

    #[arg(
        long,
        env = "GITUP_API_BASE",
        global = true,
        help = "Tag API base replacing the web host (default https://api.github.com/repos)."
    )]
    pub api_base: Option<String>,

    #[arg(
        long,
        env = "GITUP_FETCH_TIMEOUT_MS",
        default_value_t = TAG_LOOKUP_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        global = true,
        help = "Per-request timeout for tag lookups. Timeouts are not retried."
    )]
    pub fetch_timeout_ms: u64,

    #[arg(
        long,
        env = "GITUP_TAG_POLICY",
        value_enum,
        default_value_t = CliTagPolicy::FirstNewer,
        global = true,
        help = "Which newer tag wins when several exceed the installed version."
    )]
    pub tag_policy: CliTagPolicy,

    #[arg(
        long,
        env = "GITUP_INSECURE_TLS",
        global = true,
        help = "Skip TLS certificate verification for tag lookups."
    )]
    pub insecure_tls: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run one resolution pass and print available updates.
    Check {
        #[arg(long, value_enum, default_value_t = CliCheckScope::All)]
        kind: CliCheckScope,
        #[arg(long, help = "Print the update collections and diagnostics as JSON.")]
        json: bool,
    },
    /// Move an extracted package into its canonical directory and restore activation.
    Relocate {
        #[arg(long, value_enum)]
        kind: CliComponentKind,
        #[arg(long)]
        identifier: String,
        #[arg(long, help = "Directory the package was extracted into.")]
        staging: PathBuf,
    },
    /// Print the metadata headers recognized by the registry.
    Headers,
}
