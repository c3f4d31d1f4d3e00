use thiserror::Error;

/// Why a single content-API attempt failed. Always retryable.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("request timed out: {0}")]
    Timeout(reqwest::Error),

    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("response is not valid JSON: {0}")]
    Decode(reqwest::Error),

    #[error("response has no data.content field")]
    MissingContent,
}

impl FetchFailure {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Timeout(err)
        } else if err.is_decode() {
            FetchFailure::Decode(err)
        } else {
            FetchFailure::Transport(err)
        }
    }
}

/// Failure to resolve a book's landing page.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request timed out for {url}")]
    Timeout { url: String },

    #[error("book page not found (404): {url}")]
    NotFound { url: String },

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to fetch {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("book page has no {0}")]
    MissingElement(&'static str),
}
