use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::ChapterIdError;

static CHAPTER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/reader/(\d+)").expect("chapter id regex is valid"));

/// A chapter as listed on the book's landing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterRef {
    /// Display title (e.g., "第一章 重生").
    pub title: String,
    /// Reader URL the listing links to.
    pub source_url: String,
    /// Numeric id taken from `source_url`; the only key into the content API.
    pub chapter_id: String,
}

impl ChapterRef {
    /// Build a reference from a listing entry, extracting the chapter id from the URL.
    pub fn from_listing(title: &str, source_url: &str) -> Result<Self, ChapterIdError> {
        let chapter_id = extract_chapter_id(source_url)?;
        Ok(Self {
            title: title.trim().to_string(),
            source_url: source_url.to_string(),
            chapter_id,
        })
    }
}

/// Extract the digits following `/reader/` in a chapter URL.
pub fn extract_chapter_id(url: &str) -> Result<String, ChapterIdError> {
    CHAPTER_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ChapterIdError {
            url: url.to_string(),
        })
}

/// Outcome of fetching one chapter from the content API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub chapter_id: String,
    pub title: String,
    /// `data.content` verbatim, or `None` once the retry budget is spent.
    pub raw_article_markup: Option<String>,
    /// Number of requests issued for this chapter.
    pub attempts: u32,
}

impl FetchResult {
    pub fn is_exhausted(&self) -> bool {
        self.raw_article_markup.is_none()
    }
}

/// Clean chapter text ready for the writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedChapter {
    pub title: String,
    /// Plain text; paragraph breaks are `\n`.
    pub text: String,
}
