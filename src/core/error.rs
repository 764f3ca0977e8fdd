use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("billing api request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("billing api returned {status} for {endpoint}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode billing api response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected response shape from {endpoint}: {detail}")]
    UnexpectedShape { endpoint: String, detail: String },
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl BillingError {
    #[allow(dead_code)]
    pub fn status(&self) -> Option<u16> {
        match self {
            BillingError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("invalid cluster locator: {0}")]
    InvalidLocator(String),
    #[error("bulk request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bulk request returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode bulk response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("itemized cost task ran before any deployment inventory was fetched")]
    NoDeploymentInventory,
}

impl IngestError {
    /// The billing API could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, IngestError::Billing(BillingError::Transport { .. }))
    }
}
