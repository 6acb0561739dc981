use crate::{
    error::QuillError,
    model::{QueueEntry, QueueStatus, RunRecord, SearchQuery},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One call to the generation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub user: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Enable the web search tool with this many uses.
    #[serde(default)]
    pub web_search: Option<u32>,
}

/// A URL cited by the model while searching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Text the citation supports.
    #[serde(default)]
    pub cited_text: String,
}

/// Result of a generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub model: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub search_requests: u32,
    #[serde(default)]
    pub elapsed_ms: u64,
}

/// Text generation backend.
///
/// Stateless per call: identical requests may be retried freely.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, QuillError>;
}

/// Search-analytics collaborator.
#[async_trait]
pub trait SearchAnalytics: Send + Sync {
    /// Top queries for a page, sorted by impressions descending.
    async fn top_queries(
        &self,
        page_url: &str,
        limit: usize,
    ) -> Result<Vec<SearchQuery>, QuillError>;
}

/// Work queue that tracks subjects through pending → processing → done.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Entries waiting to be processed, oldest first.
    async fn read_queue(&self) -> Result<Vec<QueueEntry>, QuillError>;

    /// Move an entry to `status`. Fails if the transition is not allowed from
    /// the entry's current status.
    async fn update_status(&self, slug: &str, status: QueueStatus) -> Result<(), QuillError>;

    async fn append_run_record(&self, record: &RunRecord) -> Result<(), QuillError>;
}
