use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Body served when the configured not-found page is missing.
pub const DEFAULT_NOT_FOUND: &str = "404 Not Found";

/// Raw configuration as read from `bot-trap.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the public site, relative to `anchor`.
    #[serde(default = "default_public")]
    pub public: PathBuf,

    /// Not-found page, relative to `public`.
    #[serde(default = "default_not_found")]
    pub not_found: PathBuf,

    /// Page served to blocked clients, relative to `anchor`.
    #[serde(default = "default_decoy")]
    pub decoy: PathBuf,

    /// Append-only blocklist file, relative to `anchor`.
    #[serde(default = "default_blocklist")]
    pub blocklist: PathBuf,

    /// Whether the server sits behind a reverse proxy that sets X-Forwarded-For.
    #[serde(default)]
    pub proxy: bool,

    #[serde(default = "default_trap")]
    pub trap: String,

    /// Base directory for every relative path above. Defaults to the
    /// directory holding the config file.
    #[serde(default)]
    pub anchor: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_requests")]
    pub log_requests: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_public() -> PathBuf {
    PathBuf::from("public")
}
fn default_not_found() -> PathBuf {
    PathBuf::from("404.html")
}
fn default_decoy() -> PathBuf {
    PathBuf::from("bullshit.html")
}
fn default_blocklist() -> PathBuf {
    PathBuf::from("blocklist.txt")
}
fn default_trap() -> String {
    "/bot-trap".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_requests() -> bool {
    true
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public: default_public(),
            not_found: default_not_found(),
            decoy: default_decoy(),
            blocklist: default_blocklist(),
            proxy: false,
            trap: default_trap(),
            anchor: None,
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_requests: default_log_requests(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    /// Reads a TOML config file. A missing `anchor` is set to the file's directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.anchor.is_none() {
            let abs = fs::canonicalize(path)
                .await
                .unwrap_or_else(|_| path.to_path_buf());
            config.anchor = abs.parent().map(Path::to_path_buf);
        }
        Ok(config)
    }

    /// Validates the config and loads the decoy and not-found pages.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let trap_path = TrapPath::parse(&self.trap)?;

        let anchor = match &self.anchor {
            Some(anchor) => anchor.clone(),
            None => std::env::current_dir().map_err(|source| ConfigError::Read {
                path: PathBuf::from("."),
                source,
            })?,
        };

        let public_root = anchor.join(&self.public);
        if !public_root.is_dir() {
            return Err(ConfigError::MissingPublicDir(public_root));
        }

        let decoy_path = anchor.join(&self.decoy);
        let decoy_content = read_page(&decoy_path)?;
        if decoy_content.is_empty() {
            return Err(ConfigError::EmptyDecoy(decoy_path));
        }

        let not_found_path = public_root.join(&self.not_found);
        let not_found_content = match std::fs::read_to_string(&not_found_path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Not-found page {} is missing, using built-in body.",
                    not_found_path.display()
                );
                DEFAULT_NOT_FOUND.to_string()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: not_found_path,
                    source,
                })
            }
        };

        Ok(Settings {
            trap_path,
            behind_proxy: self.proxy,
            blocklist_path: anchor.join(&self.blocklist),
            decoy_content,
            not_found_content,
            public_root,
        })
    }
}

fn read_page(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Validated settings consumed by the request pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    pub trap_path: TrapPath,
    pub behind_proxy: bool,
    pub blocklist_path: PathBuf,
    pub decoy_content: String,
    pub not_found_content: String,
    pub public_root: PathBuf,
}

/// URL path of the trap endpoint.
///
/// Starts with `/` and a legal path-segment character. Characters the
/// router treats as pattern syntax are rejected so the path always matches
/// literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapPath(String);

impl TrapPath {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut chars = raw.chars();
        let valid_start = chars.next() == Some('/')
            && chars
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let valid_rest = !raw
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '?' | '#' | ':' | '*' | '{' | '}'));

        if !valid_start || !valid_rest {
            return Err(ConfigError::InvalidTrapPath(raw.to_string()));
        }
        if raw == "/robots.txt" {
            return Err(ConfigError::ReservedTrapPath(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrapPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
