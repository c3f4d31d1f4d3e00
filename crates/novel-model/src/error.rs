use thiserror::Error;

/// A chapter URL that does not carry a `/reader/<digits>` identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no chapter id in '{url}' (expected /reader/<digits>)")]
pub struct ChapterIdError {
    pub url: String,
}

/// Article markup that does not have the shape the normalizer expects.
///
/// This means the upstream content format changed. It is never retried and
/// never papered over with empty text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarkupShapeError {
    #[error("no <article> wrapper in chapter markup ({len} bytes)")]
    MissingArticle { len: usize },

    #[error("{count} unrecognized tag(s) left after cleanup, first: {first}")]
    UnrecognizedTags { count: usize, first: String },
}
