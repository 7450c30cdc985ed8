//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "yatube";
const ENV_PREFIX: &str = "YATUBE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;
const DEFAULT_COOKIE_NAME: &str = "yatube_session";
const DEFAULT_PASSWORD_RESET_TIMEOUT_SECS: u64 = 3 * 24 * 60 * 60;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_SITE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_OUTBOX_DIR: &str = "sent_emails";
const DEFAULT_FROM_ADDRESS: &str = "noreply@yatube.local";
const DEFAULT_POSTS_PER_PAGE: u32 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub mail: MailSettings,
    pub posts: PostsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub password_reset_timeout: Duration,
    pub cleanup_interval: Duration,
    pub site_url: Url,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub outbox_dir: PathBuf,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct PostsSettings {
    pub per_page: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Groups(args)) => raw.apply_database_override(&args.database),
        Some(Command::ClearSessions(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    auth: RawAuthSettings,
    mail: RawMailSettings,
    posts: RawPostsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.site_url.as_ref() {
            self.auth.site_url = Some(url.clone());
        }
        if let Some(secure) = overrides.cookie_secure {
            self.auth.cookie_secure = Some(secure);
        }
        if let Some(dir) = overrides.mail_outbox_dir.as_ref() {
            self.mail.outbox_dir = Some(dir.clone());
        }
        if let Some(per_page) = overrides.posts_per_page {
            self.posts.per_page = Some(per_page);
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            auth,
            mail,
            posts,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            auth: build_auth_settings(auth)?,
            mail: build_mail_settings(mail)?,
            posts: build_posts_settings(posts)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);

    Ok(ServerSettings {
        addr,
        graceful_shutdown: positive_seconds(graceful_secs, "server.graceful_shutdown_seconds")?,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let session_ttl = positive_seconds(
        auth.session_ttl_seconds.unwrap_or(DEFAULT_SESSION_TTL_SECS),
        "auth.session_ttl_seconds",
    )?;
    let password_reset_timeout = positive_seconds(
        auth.password_reset_timeout_seconds
            .unwrap_or(DEFAULT_PASSWORD_RESET_TIMEOUT_SECS),
        "auth.password_reset_timeout_seconds",
    )?;
    let cleanup_interval = positive_seconds(
        auth.cleanup_interval_seconds
            .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
        "auth.cleanup_interval_seconds",
    )?;

    let cookie_name = auth
        .cookie_name
        .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());
    if cookie_name.is_empty()
        || !cookie_name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(LoadError::invalid(
            "auth.cookie_name",
            "must be non-empty and contain only ASCII letters, digits, `_` or `-`",
        ));
    }

    let raw_site_url = auth
        .site_url
        .unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let site_url = Url::parse(raw_site_url.trim())
        .map_err(|err| LoadError::invalid("auth.site_url", format!("failed to parse: {err}")))?;
    if !matches!(site_url.scheme(), "http" | "https") || site_url.host_str().is_none() {
        return Err(LoadError::invalid(
            "auth.site_url",
            "must be an absolute http(s) URL",
        ));
    }

    Ok(AuthSettings {
        session_ttl,
        cookie_name,
        cookie_secure: auth.cookie_secure.unwrap_or(false),
        password_reset_timeout,
        cleanup_interval,
        site_url,
    })
}

fn build_mail_settings(mail: RawMailSettings) -> Result<MailSettings, LoadError> {
    let outbox_dir = mail
        .outbox_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTBOX_DIR));
    if outbox_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "mail.outbox_dir",
            "path must not be empty",
        ));
    }

    let from_address = mail
        .from_address
        .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string());
    if !from_address.contains('@') {
        return Err(LoadError::invalid(
            "mail.from_address",
            "must be an email address",
        ));
    }

    Ok(MailSettings {
        outbox_dir,
        from_address,
    })
}

fn build_posts_settings(posts: RawPostsSettings) -> Result<PostsSettings, LoadError> {
    let per_page = non_zero_u32(
        posts.per_page.unwrap_or(DEFAULT_POSTS_PER_PAGE),
        "posts.per_page",
    )?;
    Ok(PostsSettings { per_page })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    session_ttl_seconds: Option<u64>,
    cookie_name: Option<String>,
    cookie_secure: Option<bool>,
    password_reset_timeout_seconds: Option<u64>,
    cleanup_interval_seconds: Option<u64>,
    site_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    outbox_dir: Option<PathBuf>,
    from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPostsSettings {
    per_page: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
