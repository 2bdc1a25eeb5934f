//! One worker, one candidate at a time: GET, validate content type, run
//! the extractors, emit a `CrawlResult`. See `SPEC_FULL.md` §4.5.

use std::time::Duration;

use reqwest::Client;
use time::OffsetDateTime;

use crate::extract::{extract_links, extract_text};
use crate::frontier::Candidate;
use crate::normalize::normalize;
use store::Page;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SNIFF_WINDOW: usize = 512;

const HTML_SNIFF_SIGNATURES: &[&str] = &[
    "<!doctype html",
    "<html",
    "<head",
    "<script",
    "<iframe",
    "<h1",
    "<div",
    "<font",
    "<table",
    "<a",
    "<style",
    "<title",
    "<b",
    "<body",
    "<br",
    "<p",
    "<!--",
];

#[derive(Debug)]
pub struct Outlink {
    pub normalized: String,
    pub original: String,
}

/// A worker's output. `page.is_none() && error.is_none()` means
/// "skipped" (wrong content type).
pub struct CrawlResult {
    pub url: String,
    pub error: Option<anyhow::Error>,
    pub page: Option<Page>,
    pub outlinks: Vec<Outlink>,
}

impl CrawlResult {
    fn skipped(url: String) -> Self {
        Self {
            url,
            error: None,
            page: None,
            outlinks: Vec::new(),
        }
    }

    fn errored(url: String, error: impl Into<anyhow::Error>) -> Self {
        Self {
            url,
            error: Some(error.into()),
            page: None,
            outlinks: Vec::new(),
        }
    }
}

pub async fn fetch_and_process(
    client: &Client,
    user_agent: &str,
    candidate: Candidate,
) -> CrawlResult {
    let url = candidate.normalized.clone();

    let response = match client
        .get(&candidate.normalized)
        .header(reqwest::header::ACCEPT, "text/html")
        .header(reqwest::header::USER_AGENT, user_agent)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => return CrawlResult::errored(url, err),
    };

    let status_code = response.status().as_u16();

    let header_is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"));
    if !header_is_html {
        return CrawlResult::skipped(url);
    }

    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| httpdate::parse_http_date(value).ok())
        .map(OffsetDateTime::from);

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => return CrawlResult::errored(url, err),
    };

    let sniff_len = body.len().min(SNIFF_WINDOW);
    if !sniffs_as_html(&body[..sniff_len]) {
        return CrawlResult::skipped(url);
    }

    let body_text = String::from_utf8_lossy(&body).into_owned();

    // `scraper`'s parser is error-correcting by construction: this can
    // never fail, so there is no HTML-parse-error branch here.
    let extracted = extract_links(&body_text, &candidate.normalized);

    let mut outlinks = Vec::new();
    for absolute in &extracted.outlinks {
        if let Ok(normalized) = normalize(absolute) {
            outlinks.push(Outlink {
                normalized,
                original: absolute.clone(),
            });
        }
    }

    let content = extract_text(&body_text);

    let page = Page {
        referrer: candidate.referrer,
        raw_url: candidate.original,
        url: candidate.normalized,
        timestamp: OffsetDateTime::now_utc(),
        last_modified,
        title: extracted.title,
        content,
        html: body_text,
        status_code,
        outlinks: outlinks.iter().map(|o| o.normalized.clone()).collect(),
    };

    CrawlResult {
        url,
        error: None,
        page: Some(page),
        outlinks,
    }
}

/// Minimal subset of the WHATWG MIME-sniffing algorithm's `text/html`
/// signatures: skip leading whitespace, then match a known tag prefix
/// followed by a tag-terminating byte.
fn sniffs_as_html(body: &[u8]) -> bool {
    let mut i = 0;
    while i < body.len() && matches!(body[i], b'\t' | b'\n' | 0x0c | b'\r' | b' ') {
        i += 1;
    }
    let tail = &body[i..];

    for signature in HTML_SNIFF_SIGNATURES {
        let signature = signature.as_bytes();
        if tail.len() > signature.len() && tail[..signature.len()].eq_ignore_ascii_case(signature)
        {
            let terminator = tail[signature.len()];
            if matches!(terminator, b'\t' | b'\n' | 0x0c | b'\r' | b' ' | b'>') {
                return true;
            }
        }
    }
    false
}
