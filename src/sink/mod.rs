pub mod elastic;
pub mod stdout;

use crate::core::error::SinkError;
use crate::core::models::Document;
use async_trait::async_trait;

pub use elastic::ElasticSink;
pub use stdout::StdoutSink;

/// Destination for the documents of one tick.
#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Writes `documents` in order. Per-document rejections are counted in
    /// the summary, not reported as an error.
    async fn bulk(&self, documents: &[Document]) -> Result<BulkSummary, SinkError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub submitted: usize,
    pub failed: usize,
}

impl BulkSummary {
    pub fn merge(&mut self, other: BulkSummary) {
        self.submitted += other.submitted;
        self.failed += other.failed;
    }
}
