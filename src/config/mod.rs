//! Typed runtime settings, resolved from config files, then environment
//! variables, then CLI flags, with later sources winning.

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tasktide";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_HOT_HOST: &str = "127.0.0.1";
const DEFAULT_HOT_PORT: u16 = 6379;
const DEFAULT_HOT_KEY: &str = "tasktide:tasks";
const DEFAULT_ARCHIVE_DATABASE: &str = "tasktide";
const DEFAULT_ARCHIVE_COLLECTION: &str = "tasks_archive";
const DEFAULT_ARCHIVE_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ARCHIVE_SERVER_SELECTION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ARCHIVE_DIRECT_CONNECTION: bool = true;
const DEFAULT_MAX_HOT_ITEMS: u32 = 50;
const DEFAULT_EVENTS_BUFFER: u32 = 256;

/// Command line accepted by the tasktide binary.
#[derive(Debug, Parser)]
#[command(name = "tasktide", version, about = "Tasktide todo server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TASKTIDE_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the tasktide HTTP and push-channel service.
    Serve(Box<ServeArgs>),
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

    /// Override the hot store host.
    #[arg(long = "hot-host", value_name = "HOST")]
    pub hot_host: Option<String>,

    /// Override the hot store port.
    #[arg(long = "hot-port", value_name = "PORT")]
    pub hot_port: Option<u16>,

    /// Override the hot set storage key.
    #[arg(long = "hot-key", value_name = "KEY")]
    pub hot_key: Option<String>,

    /// Override the archive connection URI.
    #[arg(long = "archive-uri", value_name = "URI")]
    pub archive_uri: Option<String>,

    /// Override the hot set size threshold that triggers migration.
    #[arg(long = "max-hot-items", value_name = "COUNT")]
    pub max_hot_items: Option<u32>,
}

/// Validated settings with every default applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub hot_store: HotStoreSettings,
    pub archive: ArchiveSettings,
    pub migration: MigrationSettings,
    pub events: EventsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen_addr: SocketAddr,
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
pub struct HotStoreSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// Absent means the process starts in hot-only mode.
    pub uri: Option<String>,
    pub database: String,
    pub collection: String,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
    pub direct_connection: bool,
}

#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub max_hot_items: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct EventsSettings {
    pub buffer: NonZeroU32,
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

/// Builds settings from config files, `TASKTIDE__*` environment variables,
/// and serve-command flags, in rising order of precedence.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("TASKTIDE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    hot_store: RawHotStoreSettings,
    archive: RawArchiveSettings,
    migration: RawMigrationSettings,
    events: RawEventsSettings,
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
        if let Some(host) = overrides.hot_host.as_ref() {
            self.hot_store.host = Some(host.clone());
        }
        if let Some(port) = overrides.hot_port {
            self.hot_store.port = Some(port);
        }
        if let Some(key) = overrides.hot_key.as_ref() {
            self.hot_store.key = Some(key.clone());
        }
        if let Some(uri) = overrides.archive_uri.as_ref() {
            self.archive.uri = Some(uri.clone());
        }
        if let Some(max) = overrides.max_hot_items {
            self.migration.max_hot_items = Some(max);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            hot_store,
            archive,
            migration,
            events,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let hot_store = build_hot_store_settings(hot_store)?;
        let archive = build_archive_settings(archive)?;
        let migration = build_migration_settings(migration)?;
        let events = build_events_settings(events)?;

        Ok(Self {
            server,
            logging,
            hot_store,
            archive,
            migration,
            events,
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

    let listen_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.listen_addr", reason))?;

    Ok(ServerSettings { listen_addr })
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

fn build_hot_store_settings(hot_store: RawHotStoreSettings) -> Result<HotStoreSettings, LoadError> {
    let host = hot_store
        .host
        .unwrap_or_else(|| DEFAULT_HOT_HOST.to_string());
    if host.trim().is_empty() {
        return Err(LoadError::invalid("hot_store.host", "host must not be empty"));
    }

    let port = hot_store.port.unwrap_or(DEFAULT_HOT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "hot_store.port",
            "port must be greater than zero",
        ));
    }

    let key = hot_store.key.unwrap_or_else(|| DEFAULT_HOT_KEY.to_string());
    if key.trim().is_empty() {
        return Err(LoadError::invalid("hot_store.key", "key must not be empty"));
    }

    Ok(HotStoreSettings {
        host,
        port,
        username: non_empty(hot_store.username),
        password: non_empty(hot_store.password),
        key,
    })
}

fn build_archive_settings(archive: RawArchiveSettings) -> Result<ArchiveSettings, LoadError> {
    let uri = non_empty(archive.uri);

    let database = archive
        .database
        .unwrap_or_else(|| DEFAULT_ARCHIVE_DATABASE.to_string());
    if database.trim().is_empty() {
        return Err(LoadError::invalid(
            "archive.database",
            "database must not be empty",
        ));
    }

    let collection = archive
        .collection
        .unwrap_or_else(|| DEFAULT_ARCHIVE_COLLECTION.to_string());
    if collection.trim().is_empty() {
        return Err(LoadError::invalid(
            "archive.collection",
            "collection must not be empty",
        ));
    }

    let connect_ms = archive
        .connect_timeout_ms
        .unwrap_or(DEFAULT_ARCHIVE_CONNECT_TIMEOUT_MS);
    if connect_ms == 0 {
        return Err(LoadError::invalid(
            "archive.connect_timeout_ms",
            "must be greater than zero",
        ));
    }

    let selection_ms = archive
        .server_selection_timeout_ms
        .unwrap_or(DEFAULT_ARCHIVE_SERVER_SELECTION_TIMEOUT_MS);
    if selection_ms == 0 {
        return Err(LoadError::invalid(
            "archive.server_selection_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(ArchiveSettings {
        uri,
        database,
        collection,
        connect_timeout: Duration::from_millis(connect_ms),
        server_selection_timeout: Duration::from_millis(selection_ms),
        direct_connection: archive
            .direct_connection
            .unwrap_or(DEFAULT_ARCHIVE_DIRECT_CONNECTION),
    })
}

fn build_migration_settings(migration: RawMigrationSettings) -> Result<MigrationSettings, LoadError> {
    let max = migration.max_hot_items.unwrap_or(DEFAULT_MAX_HOT_ITEMS);
    let max_hot_items = non_zero_u32(max.into(), "migration.max_hot_items")?;
    Ok(MigrationSettings { max_hot_items })
}

fn build_events_settings(events: RawEventsSettings) -> Result<EventsSettings, LoadError> {
    let buffer = events.buffer.unwrap_or(DEFAULT_EVENTS_BUFFER);
    let buffer = non_zero_u32(buffer.into(), "events.buffer")?;
    Ok(EventsSettings { buffer })
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
struct RawHotStoreSettings {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawArchiveSettings {
    uri: Option<String>,
    database: Option<String>,
    collection: Option<String>,
    connect_timeout_ms: Option<u64>,
    server_selection_timeout_ms: Option<u64>,
    direct_connection: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMigrationSettings {
    max_hot_items: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEventsSettings {
    buffer: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// An absent, empty, or whitespace-only value reads as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Parses the process arguments and resolves settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.listen_addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn defaults_cover_every_section() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.listen_addr.port(), 3001);
        assert_eq!(settings.hot_store.host, "127.0.0.1");
        assert_eq!(settings.hot_store.port, 6379);
        assert_eq!(settings.hot_store.key, "tasktide:tasks");
        assert!(settings.hot_store.username.is_none());
        assert!(settings.archive.uri.is_none());
        assert_eq!(settings.archive.database, "tasktide");
        assert_eq!(settings.archive.collection, "tasks_archive");
        assert_eq!(settings.archive.connect_timeout, Duration::from_millis(5_000));
        assert_eq!(
            settings.archive.server_selection_timeout,
            Duration::from_millis(5_000)
        );
        assert!(settings.archive.direct_connection);
        assert_eq!(settings.migration.max_hot_items.get(), 50);
        assert_eq!(settings.events.buffer.get(), 256);
    }

    #[test]
    fn blank_archive_uri_reads_as_unconfigured() {
        let mut raw = RawSettings::default();
        raw.archive.uri = Some("   ".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.archive.uri.is_none());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut raw = RawSettings::default();
        raw.migration.max_hot_items = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero threshold");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "migration.max_hot_items",
                ..
            }
        ));
    }

    #[test]
    fn zero_hot_port_is_rejected() {
        let mut raw = RawSettings::default();
        raw.hot_store.port = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero port");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "hot_store.port",
                ..
            }
        ));
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["tasktide"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "tasktide",
            "serve",
            "--hot-host",
            "cache.internal",
            "--archive-uri",
            "mongodb://archive.internal:27017",
            "--max-hot-items",
            "80",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.hot_host.as_deref(), Some("cache.internal"));
                assert_eq!(
                    serve.overrides.archive_uri.as_deref(),
                    Some("mongodb://archive.internal:27017")
                );
                assert_eq!(serve.overrides.max_hot_items, Some(80));
            }
        }
    }
}
