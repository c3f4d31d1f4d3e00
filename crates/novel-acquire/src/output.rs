use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use novel_model::{BookInfo, DownloadManifest, ManifestChapter};

use crate::normalize;
use crate::pipeline::{ChapterOutcome, ChapterReport};

/// Replace characters that are illegal in file names with their full-width
/// equivalents, so titles stay readable.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' => '／',
            ':' => '：',
            '*' => '＊',
            '?' => '？',
            '"' => '“',
            '<' => '＜',
            '>' => '＞',
            '|' => '｜',
            other => other,
        })
        .collect()
}

/// Render the whole book: header block, then every normalized chapter in order.
///
/// Skipped, malformed and unfetched chapters are left out.
pub fn render_book(book: &BookInfo, reports: &[ChapterReport]) -> String {
    let mut content = book.header();
    for report in reports {
        if let ChapterOutcome::Normalized(chapter) = &report.outcome {
            content.push_str("\n\n\n");
            content.push_str(&chapter.title);
            content.push('\n');
            content.push_str(&chapter.text);
        }
    }
    normalize::tidy_text(&content)
}

/// Write `{title}.txt` into `output_dir` and return its path.
pub fn write_book(book: &BookInfo, reports: &[ChapterReport], output_dir: &str) -> Result<PathBuf> {
    let dir = Path::new(output_dir);
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {output_dir}"))?;

    let path = dir.join(format!("{}.txt", sanitize_filename(&book.title)));
    let text = render_book(book, reports);
    fs::write(&path, &text).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), lines = text.lines().count(), "Wrote book text");

    Ok(path)
}

pub fn build_manifest(book: &BookInfo, reports: &[ChapterReport]) -> DownloadManifest {
    DownloadManifest {
        title: book.title.clone(),
        source_url: book.source_url.clone(),
        finished: book.finished,
        fetched_at: chrono::Utc::now().to_rfc3339(),
        chapters: reports
            .iter()
            .map(|r| ManifestChapter {
                index: r.index,
                chapter_id: r.chapter.chapter_id.clone(),
                title: r.chapter.title.clone(),
                status: r.outcome.status(),
            })
            .collect(),
    }
}

/// Write `{title}.json` next to the text file and return its path.
pub fn write_manifest(manifest: &DownloadManifest, output_dir: &str) -> Result<PathBuf> {
    let dir = Path::new(output_dir);
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {output_dir}"))?;

    let path = dir.join(format!("{}.json", sanitize_filename(&manifest.title)));
    let json = serde_json::to_string_pretty(manifest).context("Failed to serialize manifest")?;
    fs::write(&path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), chapters = manifest.chapters.len(), "Wrote download manifest");

    Ok(path)
}
