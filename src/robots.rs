//! robots.txt generation.
//!
//! The site's own robots.txt (if any) is served with a block disallowing the
//! trap path prepended, so compliant crawlers never reach it.

use crate::config::TrapPath;
use std::io;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RobotsTxt {
    body: String,
}

impl RobotsTxt {
    pub fn new(trap: &TrapPath, site_robots: &str) -> Self {
        let body = format!("User-Agent: *\nDisallow: {}\n\n{}", trap, site_robots);
        Self { body }
    }

    /// Reads `robots.txt` from the public root. A missing file counts as empty.
    pub fn load(trap: &TrapPath, public_root: &Path) -> io::Result<Self> {
        let site_robots = match std::fs::read_to_string(public_root.join("robots.txt")) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        Ok(Self::new(trap, &site_robots))
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn trap() -> TrapPath {
        TrapPath::parse("/bot-trap").unwrap()
    }

    #[test]
    fn test_without_site_robots() {
        let dir = TempDir::new().unwrap();
        let robots = RobotsTxt::load(&trap(), dir.path()).unwrap();
        assert_eq!(robots.body(), "User-Agent: *\nDisallow: /bot-trap\n\n");
    }

    #[test]
    fn test_prepends_to_site_robots() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("robots.txt"),
            "User-Agent: GPTBot\nDisallow: /\n",
        )
        .unwrap();

        let robots = RobotsTxt::load(&trap(), dir.path()).unwrap();
        assert!(robots
            .body()
            .starts_with("User-Agent: *\nDisallow: /bot-trap\n\n"));
        assert!(robots.body().ends_with("User-Agent: GPTBot\nDisallow: /\n"));
        assert!(robots.body().lines().any(|l| l == "Disallow: /bot-trap"));
    }
}
