use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use novel_model::{BookInfo, ChapterRef};

use crate::error::ResolveError;
use crate::fetcher::FetchConfig;

const FINISHED_LABEL: &str = "已完结";

/// Fetch a book's landing page and parse its metadata and chapter list.
pub async fn resolve_book(url: &str, config: &FetchConfig) -> Result<BookInfo, ResolveError> {
    tracing::info!(url = %url, "Fetching book page");
    let html = fetch_page(url, config).await?;
    tracing::info!(bytes = html.len(), "Received HTML");

    let book = parse_book_page(&html, url)?;
    tracing::info!(
        title = %book.title,
        chapters = book.chapters.len(),
        finished = book.finished,
        "Parsed book page"
    );
    Ok(book)
}

async fn fetch_page(url: &str, config: &FetchConfig) -> Result<String, ResolveError> {
    let request_error = |source: reqwest::Error| {
        if source.is_timeout() {
            ResolveError::Timeout {
                url: url.to_string(),
            }
        } else {
            ResolveError::Request {
                url: url.to_string(),
                source,
            }
        }
    };

    let client = reqwest::Client::builder()
        .timeout(config.page_timeout)
        .build()
        .map_err(request_error)?;

    let mut request = client.get(url);
    for (name, value) in &config.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.map_err(request_error)?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ResolveError::NotFound {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ResolveError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response.text().await.map_err(request_error)
}

/// Parse the landing page HTML.
///
/// Chapter links are resolved against `page_url`. A chapter whose link has no
/// `/reader/<id>` part is logged and left out; the rest of the book is kept.
pub fn parse_book_page(html: &str, page_url: &str) -> Result<BookInfo, ResolveError> {
    let document = Html::parse_document(html);

    let h1_sel = Selector::parse("h1").expect("valid selector");
    let info_sel = Selector::parse("div.page-header-info").expect("valid selector");
    let intro_sel = Selector::parse("div.page-abstract-content").expect("valid selector");
    let chapter_sel = Selector::parse("div.chapter-item").expect("valid selector");
    let link_sel = Selector::parse("a").expect("valid selector");
    let status_sel = Selector::parse("span.info-label-yellow").expect("valid selector");

    let title = document
        .select(&h1_sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .ok_or(ResolveError::MissingElement("title (h1)"))?;

    let info = document
        .select(&info_sel)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let intro = document
        .select(&intro_sel)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let finished = document
        .select(&status_sel)
        .next()
        .map(|span| element_text(span) == FINISHED_LABEL)
        .unwrap_or(false);

    let base = Url::parse(page_url).ok();
    let mut chapters = Vec::new();

    for (index, item) in document.select(&chapter_sel).enumerate() {
        let Some(link) = item.select(&link_sel).next() else {
            tracing::debug!(index, "Skipping chapter item without a link");
            continue;
        };
        let chapter_title = element_text(link);
        let href = link.value().attr("href").unwrap_or_default();
        let source_url = absolutize(base.as_ref(), href);

        match ChapterRef::from_listing(&chapter_title, &source_url) {
            Ok(chapter) => chapters.push(chapter),
            Err(e) => {
                tracing::error!(index, title = %chapter_title, error = %e, "Skipping chapter reference");
            }
        }
    }

    if chapters.is_empty() {
        tracing::warn!(title = %title, "Book page lists no chapters");
    }

    Ok(BookInfo {
        title,
        info,
        intro,
        finished,
        source_url: page_url.to_string(),
        chapters,
    })
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn absolutize(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}
