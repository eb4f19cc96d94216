//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::purge::{
    DEFAULT_MAX_EXACT_PATHS, DEFAULT_MAX_WILDCARD_PATHS, PurgeLimits,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folata";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3080;
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_PURGE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEFER_DELAY_SECS: u64 = 5;
const DEFAULT_RETENTION_DAYS: i64 = 30;
const DEFAULT_WORKER_CONCURRENCY: u32 = 1;
const DEFAULT_SITE_BASE_URL: &str = "http://localhost";
const DEFAULT_PERMALINK_TEMPLATE: &str = "{base_url}/?p={id}";
const DEFAULT_VERSION_KEY_LIMIT: usize = 4096;
const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 14;

/// Command-line arguments for the folata binary.
#[derive(Debug, Parser)]
#[command(name = "folata", version, about = "Folata CDN purge service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLATA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the admin listener and the background invalidation workers.
    Serve(Box<ServeArgs>),
    /// Invalidate URLs now; pass `-` to read newline-separated URLs from stdin.
    Invalidate(InvalidateArgs),
    /// Invalidate the URLs associated with a given post.
    #[command(name = "invalidate-urls-for-post")]
    InvalidateUrlsForPost(InvalidatePostArgs),
    /// List the URLs that would be flushed when a post changes.
    #[command(name = "list-urls-to-invalidate-for-post")]
    ListUrlsToInvalidateForPost(ListPostUrlsArgs),
    /// Display purge log entries.
    Log(LogArgs),
    /// Remove all entries from the purge log.
    #[command(name = "truncate-log")]
    TruncateLog(TruncateLogArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PurgeOverride {
    /// Override the purge API endpoint.
    #[arg(long = "purge-endpoint", value_name = "URL")]
    pub purge_endpoint: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the admin listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the admin listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the HTTP database pool size.
    #[arg(long = "database-http-max-connections", value_name = "COUNT")]
    pub database_http_max_connections: Option<u32>,

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the purge API endpoint.
    #[arg(long = "purge-endpoint", value_name = "URL")]
    pub purge_endpoint: Option<String>,

    /// Override the deferred invalidation delay in seconds.
    #[arg(long = "invalidation-defer-delay-seconds", value_name = "SECONDS")]
    pub invalidation_defer_delay_seconds: Option<u64>,

    /// Override the invalidation worker concurrency.
    #[arg(long = "invalidation-worker-concurrency", value_name = "COUNT")]
    pub invalidation_worker_concurrency: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub purge: PurgeOverride,

    /// URLs to invalidate; a single `-` reads them from stdin.
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidatePostArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub purge: PurgeOverride,

    /// The post whose URLs should be invalidated.
    #[arg(value_name = "POST-ID")]
    pub post_id: i64,
}

#[derive(Debug, Args, Clone)]
pub struct ListPostUrlsArgs {
    /// The post whose URLs should be listed.
    #[arg(value_name = "POST-ID")]
    pub post_id: i64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args, Clone)]
pub struct LogArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Maximum entries per page.
    #[arg(long, default_value_t = 1000)]
    pub limit: u32,

    /// 1-based page number.
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args, Clone)]
pub struct TruncateLogArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => f.write_str("table"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub purge: PurgeSettings,
    pub invalidation: InvalidationSettings,
    pub site: SiteSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub admin_addr: SocketAddr,
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
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct PurgeSettings {
    pub endpoint: Option<Url>,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub limits: PurgeLimits,
}

#[derive(Debug, Clone)]
pub struct InvalidationSettings {
    pub defer_delay: Duration,
    pub retention_age: time::Duration,
    pub worker_concurrency: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub base_url: Url,
    pub permalink_template: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enable_version_store: bool,
    pub version_key_limit: usize,
    pub max_age_seconds: u64,
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

/// Parse the CLI and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLATA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Invalidate(args)) => {
            raw.apply_database_override(&args.database);
            raw.apply_purge_override(&args.purge);
        }
        Some(Command::InvalidateUrlsForPost(args)) => {
            raw.apply_database_override(&args.database);
            raw.apply_purge_override(&args.purge);
        }
        Some(Command::ListUrlsToInvalidateForPost(_)) => {}
        Some(Command::Log(args)) => raw.apply_database_override(&args.database),
        Some(Command::TruncateLog(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    purge: RawPurgeSettings,
    invalidation: RawInvalidationSettings,
    site: RawSiteSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
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
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPurgeSettings {
    endpoint: Option<String>,
    api_token: Option<String>,
    request_timeout_seconds: Option<u64>,
    max_exact_paths: Option<usize>,
    max_wildcard_paths: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInvalidationSettings {
    defer_delay_seconds: Option<u64>,
    retention_days: Option<i64>,
    worker_concurrency: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    base_url: Option<String>,
    permalink_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enable_version_store: Option<bool>,
    version_key_limit: Option<usize>,
    max_age_seconds: Option<u64>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_http_max_connections {
            self.database.http_max_connections = Some(max);
        }
        if let Some(max) = overrides.database_jobs_max_connections {
            self.database.jobs_max_connections = Some(max);
        }
        if let Some(endpoint) = overrides.purge_endpoint.as_ref() {
            self.purge.endpoint = Some(endpoint.clone());
        }
        if let Some(delay) = overrides.invalidation_defer_delay_seconds {
            self.invalidation.defer_delay_seconds = Some(delay);
        }
        if let Some(concurrency) = overrides.invalidation_worker_concurrency {
            self.invalidation.worker_concurrency = Some(concurrency);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_purge_override(&mut self, overrides: &PurgeOverride) {
        if let Some(endpoint) = overrides.purge_endpoint.as_ref() {
            self.purge.endpoint = Some(endpoint.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            purge,
            invalidation,
            site,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            purge: build_purge_settings(purge)?,
            invalidation: build_invalidation_settings(invalidation)?,
            site: build_site_settings(site)?,
            cache: build_cache_settings(cache),
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

    let admin_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    Ok(ServerSettings { admin_addr })
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

    let http_value = database
        .http_max_connections
        .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS);
    let jobs_value = database
        .jobs_max_connections
        .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        http_max_connections: non_zero_u32(http_value, "database.http_max_connections")?,
        jobs_max_connections: non_zero_u32(jobs_value, "database.jobs_max_connections")?,
    })
}

fn build_purge_settings(purge: RawPurgeSettings) -> Result<PurgeSettings, LoadError> {
    let endpoint = match purge.endpoint {
        Some(raw) if !raw.trim().is_empty() => Some(
            Url::parse(raw.trim())
                .map_err(|err| LoadError::invalid("purge.endpoint", err.to_string()))?,
        ),
        _ => None,
    };

    let timeout_secs = purge
        .request_timeout_seconds
        .unwrap_or(DEFAULT_PURGE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "purge.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let max_exact_paths = purge.max_exact_paths.unwrap_or(DEFAULT_MAX_EXACT_PATHS);
    if max_exact_paths == 0 {
        return Err(LoadError::invalid(
            "purge.max_exact_paths",
            "must be greater than zero",
        ));
    }

    let max_wildcard_paths = purge
        .max_wildcard_paths
        .unwrap_or(DEFAULT_MAX_WILDCARD_PATHS);
    if max_wildcard_paths == 0 {
        return Err(LoadError::invalid(
            "purge.max_wildcard_paths",
            "must be greater than zero",
        ));
    }

    Ok(PurgeSettings {
        endpoint,
        api_token: purge.api_token.and_then(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }),
        request_timeout: Duration::from_secs(timeout_secs),
        limits: PurgeLimits {
            max_exact_paths,
            max_wildcard_paths,
        },
    })
}

fn build_invalidation_settings(
    invalidation: RawInvalidationSettings,
) -> Result<InvalidationSettings, LoadError> {
    let defer_delay_secs = invalidation
        .defer_delay_seconds
        .unwrap_or(DEFAULT_DEFER_DELAY_SECS);

    let retention_days = invalidation.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
    if retention_days <= 0 {
        return Err(LoadError::invalid(
            "invalidation.retention_days",
            "must be greater than zero",
        ));
    }

    let concurrency = invalidation
        .worker_concurrency
        .unwrap_or(DEFAULT_WORKER_CONCURRENCY);

    Ok(InvalidationSettings {
        defer_delay: Duration::from_secs(defer_delay_secs),
        retention_age: time::Duration::days(retention_days),
        worker_concurrency: non_zero_u32(concurrency, "invalidation.worker_concurrency")?,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let base_url = site
        .base_url
        .unwrap_or_else(|| DEFAULT_SITE_BASE_URL.to_string());
    let base_url = Url::parse(base_url.trim())
        .map_err(|err| LoadError::invalid("site.base_url", err.to_string()))?;

    let permalink_template = site
        .permalink_template
        .unwrap_or_else(|| DEFAULT_PERMALINK_TEMPLATE.to_string());
    if !permalink_template.contains("{id}") {
        return Err(LoadError::invalid(
            "site.permalink_template",
            "template must contain the `{id}` placeholder",
        ));
    }

    Ok(SiteSettings {
        base_url,
        permalink_template,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        enable_version_store: cache.enable_version_store.unwrap_or(true),
        version_key_limit: cache.version_key_limit.unwrap_or(DEFAULT_VERSION_KEY_LIMIT),
        max_age_seconds: cache.max_age_seconds.unwrap_or(DEFAULT_CACHE_MAX_AGE_SECS),
    }
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    format!("{host}:{port}")
        .parse()
        .map_err(|err| format!("failed to parse socket address: {err}"))
}
