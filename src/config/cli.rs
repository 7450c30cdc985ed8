use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Yatube binary.
#[derive(Debug, Parser)]
#[command(name = "yatube", version, about = "Yatube blogging server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "YATUBE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Manage post groups.
    Groups(GroupsArgs),
    /// Delete expired sessions and password reset links.
    #[command(name = "clearsessions")]
    ClearSessions(ClearSessionsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the public base URL used in emailed links.
    #[arg(long = "site-url", value_name = "URL")]
    pub site_url: Option<String>,

    /// Mark the session cookie as `Secure`.
    #[arg(
        long = "cookie-secure",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cookie_secure: Option<bool>,

    /// Override the directory outgoing mail is written to.
    #[arg(long = "mail-outbox-dir", value_name = "PATH")]
    pub mail_outbox_dir: Option<PathBuf>,

    /// Override the number of posts per page.
    #[arg(long = "posts-per-page", value_name = "COUNT")]
    pub posts_per_page: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(subcommand)]
    pub command: GroupsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum GroupsCommand {
    /// Create a group; the slug is derived from the title when omitted.
    Create(CreateGroupArgs),
    /// List existing groups.
    List(ListGroupsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListGroupsArgs {
    /// Print the groups as a JSON array.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CreateGroupArgs {
    /// Human readable title.
    #[arg(long, value_name = "TITLE")]
    pub title: String,

    /// URL slug.
    #[arg(long, value_name = "SLUG")]
    pub slug: Option<String>,

    /// Free-form description shown on the group page.
    #[arg(long, value_name = "TEXT", default_value = "")]
    pub description: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ClearSessionsArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}
