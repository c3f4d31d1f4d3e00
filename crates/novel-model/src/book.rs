use serde::{Deserialize, Serialize};

use crate::chapter::ChapterRef;

/// Everything the landing page tells us about a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: String,
    /// Author / word count / update line from the page header.
    pub info: String,
    /// Synopsis.
    pub intro: String,
    /// Whether the book is marked as completed.
    pub finished: bool,
    pub source_url: String,
    /// Chapters in listing order.
    pub chapters: Vec<ChapterRef>,
}

impl BookInfo {
    /// Header block placed at the top of the text file.
    pub fn header(&self) -> String {
        format!("{}\n{}\n{}\n", self.title, self.info.trim(), self.intro.trim())
    }
}

/// Per-chapter status recorded in a download manifest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Ok,
    /// Retry budget exhausted.
    Skipped,
    /// Markup did not have the expected shape.
    Malformed,
    /// Never started because the run was aborted.
    NotFetched,
    /// The chapter's task died before reporting an outcome.
    Failed,
}

/// Manifest entry for one chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestChapter {
    pub index: usize,
    pub chapter_id: String,
    pub title: String,
    pub status: ChapterStatus,
}

/// JSON record of a download run, written next to the text file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub title: String,
    pub source_url: String,
    pub finished: bool,
    pub fetched_at: String,
    pub chapters: Vec<ManifestChapter>,
}

impl DownloadManifest {
    pub fn count(&self, status: ChapterStatus) -> usize {
        self.chapters.iter().filter(|c| c.status == status).count()
    }
}
