use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use novel_acquire::{
    output, ChapterFetcher, ChapterOutcome, FetchConfig, Normalizer, Pipeline, PipelineConfig,
    RetryPolicy, RunSummary,
};
use novel_model::extract_chapter_id;

#[derive(Parser)]
#[command(name = "novel")]
#[command(about = "Download serialized novels as plain text")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a whole book into a single text file
    Download {
        /// Book landing page URL (e.g., "https://fanqienovel.com/page/7143038691944959011")
        url: String,

        /// Output directory for the book file
        #[arg(short = 'O', long, default_value = ".")]
        output_dir: String,

        /// Number of chapters fetched at once
        #[arg(short = 'j', long, default_value_t = novel_acquire::pipeline::DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Fail a chapter when its markup contains tags the cleanup rules don't know
        #[arg(long)]
        strict_markup: bool,

        /// Also write a JSON manifest with each chapter's status
        #[arg(long)]
        manifest: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Fetch a single chapter and print its text
    Chapter {
        /// Chapter id, or a reader URL containing one
        chapter: String,

        /// Title to use in log messages
        #[arg(long, default_value = "")]
        title: String,

        /// Fail when the markup contains tags the cleanup rules don't know
        #[arg(long)]
        strict_markup: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// User-Agent header sent with every request
    #[arg(long, default_value = novel_acquire::fetcher::DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Per-attempt timeout for content API requests, in seconds
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Attempts per chapter before it is skipped
    #[arg(long, default_value_t = novel_acquire::retry::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Pause between attempts, in milliseconds
    #[arg(long, default_value_t = 0)]
    retry_delay_ms: u64,
}

impl FetchArgs {
    fn to_config(&self) -> FetchConfig {
        let mut config = FetchConfig::with_user_agent(&self.user_agent);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.retry = RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_delay_ms),
        );
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Map log level, suppressing noisy HTML-parsing crates at debug/trace
    let level = match cli.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn  => "warn",
        LogLevel::Info  => "info",
        LogLevel::Debug => "debug,selectors=warn,html5ever=warn",
        LogLevel::Trace => "trace,selectors=warn,html5ever=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    // Logs go to stderr so `novel chapter` output can be piped.
    if cli.utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }

    match cli.command {
        Commands::Download {
            url,
            output_dir,
            concurrency,
            strict_markup,
            manifest,
            fetch,
        } => {
            let config = fetch.to_config();
            let book = novel_acquire::resolve_book(&url, &config)
                .await
                .with_context(|| format!("Failed to resolve book at {url}"))?;
            anyhow::ensure!(!book.chapters.is_empty(), "No chapters found for '{}'", book.title);

            let fetcher = ChapterFetcher::new(config)?;
            let pipeline = Pipeline::new(
                fetcher,
                PipelineConfig {
                    concurrency,
                    strict_markup,
                },
            );

            let abort = pipeline.abort_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing chapters in flight");
                    abort.abort();
                }
            });

            tracing::info!(title = %book.title, chapters = book.chapters.len(), "Downloading book");
            let reports = pipeline.run(&book.chapters).await;

            for report in &reports {
                match &report.outcome {
                    ChapterOutcome::Normalized(_) => {}
                    ChapterOutcome::Skipped { attempts } => tracing::warn!(
                        index = report.index,
                        chapter_id = %report.chapter.chapter_id,
                        title = %report.chapter.title,
                        attempts,
                        "Chapter missing from output: fetch exhausted"
                    ),
                    ChapterOutcome::Malformed(e) => tracing::warn!(
                        index = report.index,
                        chapter_id = %report.chapter.chapter_id,
                        title = %report.chapter.title,
                        error = %e,
                        "Chapter missing from output: unexpected markup"
                    ),
                    ChapterOutcome::NotFetched => tracing::warn!(
                        index = report.index,
                        chapter_id = %report.chapter.chapter_id,
                        title = %report.chapter.title,
                        "Chapter missing from output: not fetched"
                    ),
                    ChapterOutcome::Failed => tracing::warn!(
                        index = report.index,
                        chapter_id = %report.chapter.chapter_id,
                        title = %report.chapter.title,
                        "Chapter missing from output: task failed"
                    ),
                }
            }

            let path = output::write_book(&book, &reports, &output_dir)?;
            if manifest {
                let record = output::build_manifest(&book, &reports);
                output::write_manifest(&record, &output_dir)?;
            }

            let summary = RunSummary::from_reports(&reports);
            tracing::info!(
                path = %path.display(),
                written = summary.written,
                skipped = summary.skipped,
                malformed = summary.malformed,
                not_fetched = summary.not_fetched,
                failed = summary.failed,
                "Download finished"
            );
            if !summary.is_complete() {
                tracing::warn!("Book is incomplete; re-run to fetch the missing chapters");
            }
        }
        Commands::Chapter {
            chapter,
            title,
            strict_markup,
            fetch,
        } => {
            let chapter_id = if !chapter.is_empty() && chapter.chars().all(|c| c.is_ascii_digit()) {
                chapter
            } else {
                extract_chapter_id(&chapter)?
            };
            tracing::info!(chapter_id = %chapter_id, "Fetching chapter");

            let fetcher = ChapterFetcher::new(fetch.to_config())?;
            let result = fetcher.fetch(&chapter_id, &title).await;
            let raw = result.raw_article_markup.with_context(|| {
                format!("Chapter {chapter_id} could not be fetched after {} attempts", result.attempts)
            })?;
            let text = Normalizer::new(strict_markup)
                .normalize(&raw)
                .with_context(|| format!("Chapter {chapter_id} has unexpected markup"))?;
            println!("{}", novel_acquire::normalize::tidy_text(&text));
        }
    }

    Ok(())
}
