//! Error types for startup and blocklist persistence.
//!
//! Nothing in here is ever rendered into an HTTP response. Request-time
//! failures are logged and the client sees the same `ok` / decoy / 404
//! bodies it would have seen otherwise.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems. The server refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("trap path {0:?} must start with '/' followed by a letter, digit, '_' or '-', and contain no whitespace or any of ?#:*{{}}")]
    InvalidTrapPath(String),

    #[error("trap path {0:?} collides with a built-in route")]
    ReservedTrapPath(String),

    #[error("public directory {} does not exist", .0.display())]
    MissingPublicDir(PathBuf),

    #[error("decoy content at {} is empty", .0.display())]
    EmptyDecoy(PathBuf),

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Blocklist file failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to load blocklist from {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to append to blocklist {}", path.display())]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
