use thiserror::Error;

/// Everything that can go wrong talking to Tally. Callers outside this crate
/// never see it: the client logs it and returns a soft result instead.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Tally API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GraphQL errors: {0}")]
    Graphql(String),
    #[error("response contained no data")]
    MissingData,
}
