//! Chapter pipeline: fetch and normalize a book's chapters with bounded
//! concurrency, reporting outcomes in listing order.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::{self, JoinSet};

use novel_model::{ChapterRef, ChapterStatus, MarkupShapeError, NormalizedChapter};

use crate::fetcher::ChapterFetcher;
use crate::normalize::Normalizer;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum chapters in flight at once.
    pub concurrency: usize,
    /// Reject chapters with tags the cleanup rules do not know.
    pub strict_markup: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            strict_markup: false,
        }
    }
}

/// What happened to one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    Normalized(NormalizedChapter),
    /// Retry budget exhausted.
    Skipped { attempts: u32 },
    Malformed(MarkupShapeError),
    /// Not started because the run was aborted.
    NotFetched,
    /// The chapter's task panicked or was cancelled.
    Failed,
}

impl ChapterOutcome {
    pub fn status(&self) -> ChapterStatus {
        match self {
            ChapterOutcome::Normalized(_) => ChapterStatus::Ok,
            ChapterOutcome::Skipped { .. } => ChapterStatus::Skipped,
            ChapterOutcome::Malformed(_) => ChapterStatus::Malformed,
            ChapterOutcome::NotFetched => ChapterStatus::NotFetched,
            ChapterOutcome::Failed => ChapterStatus::Failed,
        }
    }
}

/// A chapter's outcome, tagged with its position in the listing.
#[derive(Debug, Clone)]
pub struct ChapterReport {
    pub index: usize,
    pub chapter: ChapterRef,
    pub outcome: ChapterOutcome,
}

/// Stops a running pipeline from starting further chapters.
#[derive(Debug, Clone)]
pub struct AbortHandle(Arc<watch::Sender<bool>>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.0.borrow()
    }
}

pub struct Pipeline {
    fetcher: Arc<ChapterFetcher>,
    config: PipelineConfig,
    abort: Arc<watch::Sender<bool>>,
}

impl Pipeline {
    pub fn new(fetcher: ChapterFetcher, config: PipelineConfig) -> Self {
        let (abort, _) = watch::channel(false);
        Self {
            fetcher: Arc::new(fetcher),
            config,
            abort: Arc::new(abort),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.abort))
    }

    /// Process every chapter and return one report per chapter, in input order.
    ///
    /// Chapters run concurrently up to `config.concurrency`. An abort stops
    /// new chapters from starting; chapters already in flight finish and the
    /// rest are reported as [`ChapterOutcome::NotFetched`].
    pub async fn run(&self, chapters: &[ChapterRef]) -> Vec<ChapterReport> {
        let total = chapters.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let normalizer = Normalizer::new(self.config.strict_markup);
        let mut abort = self.abort.subscribe();

        tracing::info!(
            chapters = total,
            concurrency = self.config.concurrency.max(1),
            "Starting chapter downloads"
        );

        let mut tasks = JoinSet::new();
        let mut slots = HashMap::with_capacity(total);
        for (index, chapter) in chapters.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = aborted(&mut abort) => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                tracing::warn!(
                    remaining = total - index,
                    "Download aborted, not starting remaining chapters"
                );
                break;
            };

            let fetcher = Arc::clone(&self.fetcher);
            let chapter = chapter.clone();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                process_chapter(&fetcher, &chapter, normalizer).await
            });
            slots.insert(handle.id(), index);
        }

        let outcomes = collect_outcomes(tasks, &slots, chapters).await;

        chapters
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (chapter, outcome))| ChapterReport {
                index,
                chapter: chapter.clone(),
                outcome: outcome.unwrap_or(ChapterOutcome::NotFetched),
            })
            .collect()
    }
}

/// Wait for every chapter task and place its outcome at the chapter's index.
///
/// `slots` maps each task id to its chapter index. A task that panicked or
/// was cancelled is logged with its chapter and recorded as
/// [`ChapterOutcome::Failed`]. Slots with no task stay `None`.
async fn collect_outcomes(
    mut tasks: JoinSet<ChapterOutcome>,
    slots: &HashMap<task::Id, usize>,
    chapters: &[ChapterRef],
) -> Vec<Option<ChapterOutcome>> {
    let total = chapters.len();
    let mut outcomes: Vec<Option<ChapterOutcome>> = (0..total).map(|_| None).collect();
    let mut done = 0;

    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome),
            Err(e) => {
                let id = e.id();
                match slots.get(&id).and_then(|&i| chapters.get(i).map(|c| (i, c))) {
                    Some((index, chapter)) => tracing::error!(
                        index,
                        chapter_id = %chapter.chapter_id,
                        title = %chapter.title,
                        error = %e,
                        "Chapter task failed"
                    ),
                    None => tracing::error!(error = %e, "Chapter task failed"),
                }
                (id, ChapterOutcome::Failed)
            }
        };

        let Some(&index) = slots.get(&id) else {
            continue;
        };
        done += 1;
        tracing::debug!(index, done, total, status = ?outcome.status(), "Chapter finished");
        outcomes[index] = Some(outcome);
    }

    outcomes
}

/// Resolves once an abort has been signalled.
async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Fetch and normalize a single chapter.
pub async fn process_chapter(
    fetcher: &ChapterFetcher,
    chapter: &ChapterRef,
    normalizer: Normalizer,
) -> ChapterOutcome {
    let result = fetcher.fetch(&chapter.chapter_id, &chapter.title).await;
    let Some(raw) = result.raw_article_markup else {
        return ChapterOutcome::Skipped {
            attempts: result.attempts,
        };
    };

    match normalizer.normalize(&raw) {
        Ok(text) => ChapterOutcome::Normalized(NormalizedChapter {
            title: chapter.title.clone(),
            text,
        }),
        Err(error) => {
            tracing::error!(
                chapter_id = %chapter.chapter_id,
                title = %chapter.title,
                error = %error,
                "Chapter markup has an unexpected shape; skipping chapter"
            );
            ChapterOutcome::Malformed(error)
        }
    }
}

/// Counts per status, for the end-of-run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub not_fetched: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[ChapterReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome.status() {
                ChapterStatus::Ok => summary.written += 1,
                ChapterStatus::Skipped => summary.skipped += 1,
                ChapterStatus::Malformed => summary.malformed += 1,
                ChapterStatus::NotFetched => summary.not_fetched += 1,
                ChapterStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn is_complete(&self) -> bool {
        self.skipped == 0 && self.malformed == 0 && self.not_fetched == 0 && self.failed == 0
    }
}
