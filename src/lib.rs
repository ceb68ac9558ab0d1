//! A static site server that catches crawlers ignoring robots.txt.
//!
//! A hidden trap path is disallowed in robots.txt. Any client that requests
//! it anyway is added to an append-only blocklist and from then on receives
//! a decoy page instead of the real content.

pub mod config;
pub mod engine;
pub mod error;
pub mod init;
pub mod logger;
pub mod robots;
pub mod server;
pub mod site;
pub mod stats;
