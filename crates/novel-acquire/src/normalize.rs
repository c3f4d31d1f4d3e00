//! Chapter markup → plain text.
//!
//! The content API returns near-plain text wrapped in a handful of HTML tags.
//! Rather than parse it as HTML, a closed set of regex rules is applied:
//!
//! 1. take the body of the first `<article>…</article>`
//! 2. paragraph-open tags become `\n`
//! 3. bare `<word>` / `</word>` tags are deleted
//! 4. publisher cleanup rules delete the attributed tag shapes this source
//!    is known to emit
//!
//! Anything still looking like a tag afterwards is reported, and rejected by
//! a strict [`Normalizer`].

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use novel_model::MarkupShapeError;

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<article>([\s\S]*?)</article>").expect("article regex is valid")
});

static PARAGRAPH_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p(?:\s[^>]*)?>").expect("paragraph regex is valid"));

static GENERIC_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?\w+>").expect("generic tag regex is valid"));

static RESIDUAL_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z!?][^<>]*>").expect("residual tag regex is valid"));

/// A single named deletion rule.
#[derive(Debug)]
pub struct CleanupRule {
    pub name: &'static str,
    pattern: Regex,
}

impl CleanupRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("publisher cleanup regex is valid"),
        }
    }

    /// Delete every match of this rule.
    pub fn apply(&self, text: &str) -> String {
        self.pattern.replace_all(text, "").into_owned()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

static PUBLISHER_RULES: LazyLock<Vec<CleanupRule>> = LazyLock::new(|| {
    vec![
        CleanupRule::new("styled-paragraph", r#"<p class=".*?">"#),
        CleanupRule::new("xml-declaration", r"<!--\?xml.*?>"),
        CleanupRule::new("link", r"<link .*?/>"),
        CleanupRule::new("meta", r"<meta .*?/>"),
        CleanupRule::new("heading", r"<h1 .*?>"),
        CleanupRule::new("line-break", r"<br/>"),
        CleanupRule::new("doctype", r"<!DOCTYPE html .*?>"),
        CleanupRule::new("span", r"<span .*?>"),
        CleanupRule::new("html", r"<html .*?>"),
    ]
});

/// The publisher cleanup rules, in application order.
pub fn publisher_rules() -> &'static [CleanupRule] {
    &PUBLISHER_RULES
}

/// Body of the first `<article>` element.
pub fn extract_article(raw: &str) -> Result<&str, MarkupShapeError> {
    ARTICLE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or(MarkupShapeError::MissingArticle { len: raw.len() })
}

/// Replace every paragraph-open tag, attributed or not, with a newline.
pub fn paragraphs_to_newlines(text: &str) -> String {
    PARAGRAPH_OPEN_RE.replace_all(text, "\n").into_owned()
}

/// Delete attribute-free opening and closing tags.
pub fn strip_generic_tags(text: &str) -> String {
    GENERIC_TAG_RE.replace_all(text, "").into_owned()
}

pub fn apply_publisher_rules(text: &str) -> String {
    publisher_rules()
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc))
}

/// Steps 2–4 on an already extracted article body.
pub fn strip_markup(body: &str) -> String {
    let text = paragraphs_to_newlines(body);
    let text = strip_generic_tags(&text);
    apply_publisher_rules(&text)
}

/// Tag-like fragments none of the rules recognise.
pub fn residual_tags(text: &str) -> Vec<&str> {
    RESIDUAL_TAG_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Normalize raw chapter markup with the default (lenient) normalizer.
pub fn normalize(raw: &str) -> Result<String, MarkupShapeError> {
    Normalizer::default().normalize(raw)
}

/// Applies the rule set; optionally refuses to pass unknown tags through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    strict: bool,
}

impl Normalizer {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn normalize(&self, raw: &str) -> Result<String, MarkupShapeError> {
        let body = extract_article(raw)?;
        let text = strip_markup(body);

        let leftover = residual_tags(&text);
        if let Some(first) = leftover.first() {
            if self.strict {
                return Err(MarkupShapeError::UnrecognizedTags {
                    count: leftover.len(),
                    first: first.to_string(),
                });
            }
            tracing::warn!(
                count = leftover.len(),
                first = %first,
                "Unrecognized tags left in chapter text"
            );
        }

        Ok(text)
    }
}

/// Final clean-up before writing: NFC form and no trailing whitespace on any line.
pub fn tidy_text(input: &str) -> String {
    let nfc: String = input.nfc().collect();

    nfc.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}
