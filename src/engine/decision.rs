use super::traits::BlocklistMatcher;
use crate::site::{StaticFile, StaticSite};

/// What to answer a non-trap, non-robots request with.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteDecision<'a> {
    Serve(&'a StaticFile),
    Decoy,
    NotFound,
}

/// Blocklist membership wins over static resolution. Clients without an
/// identity can never be blocked.
pub fn decide<'a>(
    blocklist: &dyn BlocklistMatcher,
    site: &'a StaticSite,
    identity: Option<&str>,
    path: &str,
) -> RouteDecision<'a> {
    if identity.is_some_and(|id| blocklist.contains(id)) {
        return RouteDecision::Decoy;
    }

    match site.lookup(path) {
        Some(file) => RouteDecision::Serve(file),
        None => RouteDecision::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct MockBlocklist(&'static [&'static str]);

    impl BlocklistMatcher for MockBlocklist {
        fn contains(&self, identity: &str) -> bool {
            self.0.iter().any(|blocked| *blocked == identity)
        }
    }

    #[test]
    fn test_decision_precedence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();
        let site = StaticSite::scan(dir.path()).unwrap();
        let blocklist = MockBlocklist(&["1.2.3.4"]);

        // Blocked clients get the decoy even for real content.
        assert_eq!(
            decide(&blocklist, &site, Some("1.2.3.4"), "/index.html"),
            RouteDecision::Decoy
        );
        assert_eq!(
            decide(&blocklist, &site, Some("1.2.3.4"), "/missing"),
            RouteDecision::Decoy
        );

        assert!(matches!(
            decide(&blocklist, &site, Some("5.6.7.8"), "/index.html"),
            RouteDecision::Serve(_)
        ));
        assert_eq!(
            decide(&blocklist, &site, Some("5.6.7.8"), "/missing"),
            RouteDecision::NotFound
        );
        assert!(matches!(
            decide(&blocklist, &site, None, "/"),
            RouteDecision::Serve(_)
        ));
    }
}
