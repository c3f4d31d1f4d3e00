pub mod api;
pub mod book;
pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod retry;

pub use book::resolve_book;
pub use error::{FetchFailure, ResolveError};
pub use fetcher::{ChapterFetcher, FetchConfig};
pub use normalize::{normalize, Normalizer};
pub use pipeline::{AbortHandle, ChapterOutcome, ChapterReport, Pipeline, PipelineConfig, RunSummary};
pub use retry::{RetryPolicy, RetryState};
