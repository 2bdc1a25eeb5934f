//! The narrow interface the crawl core writes pages through.
//!
//! The crawl core depends only on [`PageStore`]; it does not care how or
//! where pages end up, and does not rely on the store to deduplicate by
//! URL. [`JsonlPageStore`] is a reference implementation adequate for
//! driving the crawler end-to-end and for tests. A production deployment
//! is expected to swap in its own implementation (backed by a database
//! with full-text indexing) without the crawl core changing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub referrer: String,
    pub raw_url: String,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
    pub title: String,
    pub content: String,
    pub html: String,
    pub status_code: u16,
    pub outlinks: Vec<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize page {url}: {source}")]
    Serialize {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write page {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// The contract the crawl core depends on. The core calls `save_page`
/// serially from the Coordinator; implementations must still tolerate
/// concurrent callers since the trait itself makes no such promise.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn save_page(&self, page: Page) -> Result<(), StoreError>;
}

/// Appends each page as one JSON line to a file. Not deduplicated: two
/// pages with the same URL produce two lines, matching the core's
/// assumption that the store is free to dedupe or not.
pub struct JsonlPageStore {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl JsonlPageStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StoreError::Open {
                        path: path.clone(),
                        source,
                    })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PageStore for JsonlPageStore {
    async fn save_page(&self, page: Page) -> Result<(), StoreError> {
        let mut line =
            serde_json::to_vec(&page).map_err(|source| StoreError::Serialize {
                url: page.url.clone(),
                source,
            })?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|source| StoreError::Write {
                url: page.url.clone(),
                source,
            })?;
        file.flush().await.map_err(|source| StoreError::Write {
            url: page.url.clone(),
            source,
        })?;
        tracing::info!(url = %page.url, path = %self.path.display(), "saved page");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page(url: &str) -> Page {
        Page {
            referrer: String::new(),
            raw_url: url.to_string(),
            url: url.to_string(),
            timestamp: OffsetDateTime::now_utc(),
            last_modified: None,
            title: "Title".to_string(),
            content: "Body text".to_string(),
            html: "<html></html>".to_string(),
            status_code: 200,
            outlinks: vec![],
        }
    }

    #[tokio::test]
    async fn appends_one_json_line_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.jsonl");
        let store = JsonlPageStore::open(&path).await.unwrap();

        store.save_page(sample_page("http://example.com/a")).await.unwrap();
        store.save_page(sample_page("http://example.com/b")).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Page = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.url, "http://example.com/a");
    }

    #[tokio::test]
    async fn does_not_deduplicate_by_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.jsonl");
        let store = JsonlPageStore::open(&path).await.unwrap();

        store.save_page(sample_page("http://example.com/a")).await.unwrap();
        store.save_page(sample_page("http://example.com/a")).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
