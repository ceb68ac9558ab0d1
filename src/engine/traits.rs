/// The hot path: answered on every routed request.
pub trait BlocklistMatcher: Send + Sync {
    /// Returns true if the identity is blocked. Never blocks on I/O.
    fn contains(&self, identity: &str) -> bool;
}
