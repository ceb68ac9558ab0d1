#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub client: Option<String>,
    pub path: String,
    pub user_agent: Option<String>,
    pub action: RequestAction,
    pub status: u16,
    pub latency_ms: u64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RequestAction {
    Served,
    Decoy,
    NotFound,
    Robots,
    Trapped,
}

impl RequestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestAction::Served => "served",
            RequestAction::Decoy => "decoy",
            RequestAction::NotFound => "not_found",
            RequestAction::Robots => "robots",
            RequestAction::Trapped => "trapped",
        }
    }
}

#[async_trait::async_trait]
pub trait RequestLogSink: Send + Sync {
    async fn log(&self, entry: &RequestLogEntry);
}
