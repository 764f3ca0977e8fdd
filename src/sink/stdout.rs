use crate::core::error::SinkError;
use crate::core::models::Document;
use crate::sink::{BulkSink, BulkSummary};
use async_trait::async_trait;
use std::io::Write;

/// Dry-run sink: one JSON line per document, `_index` included.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    fn write_to<W: Write>(out: &mut W, documents: &[Document]) -> Result<(), SinkError> {
        for document in documents {
            serde_json::to_writer(&mut *out, document).map_err(SinkError::Encode)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl BulkSink for StdoutSink {
    async fn bulk(&self, documents: &[Document]) -> Result<BulkSummary, SinkError> {
        let stdout = std::io::stdout();
        Self::write_to(&mut stdout.lock(), documents)?;
        Ok(BulkSummary {
            submitted: documents.len(),
            failed: 0,
        })
    }
}
