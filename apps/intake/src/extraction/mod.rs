//! Extraction — turns a document's pages into one reviewable summary.
//!
//! The parsing engine sits behind [`DocumentParser`]. Pages are pulled one at
//! a time through a [`PageStream`], strictly in page order, with cancellation
//! checked before every fetch.

pub mod pdf;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::session::cancel::CancelToken;

/// Placed between consecutive page texts in the summary.
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to load document: {0}")]
    Load(String),

    #[error("Document is encrypted")]
    Encrypted,

    #[error("Document has no pages")]
    NoPages,

    #[error("Failed to read page {page}: {reason}")]
    Page { page: u32, reason: String },

    #[error("Extraction worker failed: {0}")]
    Worker(String),
}

/// A loaded document that can be read page by page. Pages are 1-based.
#[async_trait]
pub trait ParsedDocument: Send + Sync {
    fn page_count(&self) -> u32;

    async fn page_text(&self, page: u32) -> Result<String, ExtractionError>;
}

/// The parsing engine. Carried in `AppState` as `Arc<dyn DocumentParser>`.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn open(&self, bytes: Bytes) -> Result<Box<dyn ParsedDocument>, ExtractionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub number: u32,
    pub page_count: u32,
    pub text: String,
}

impl ExtractedPage {
    pub fn progress(&self) -> u8 {
        progress_percent(self.number, self.page_count)
    }
}

/// `round(done / total * 100)`, 0 for an empty total.
pub fn progress_percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// Cancellable, ordered cursor over a document's pages.
pub struct PageStream {
    document: Box<dyn ParsedDocument>,
    next_page: u32,
    page_count: u32,
    cancel: CancelToken,
}

impl PageStream {
    /// Loads the document and fails with `NoPages` when it is empty.
    pub async fn open(
        parser: &dyn DocumentParser,
        bytes: Bytes,
        cancel: CancelToken,
    ) -> Result<Self, ExtractionError> {
        let document = parser.open(bytes).await?;
        let page_count = document.page_count();
        if page_count == 0 {
            return Err(ExtractionError::NoPages);
        }
        Ok(Self {
            document,
            next_page: 1,
            page_count,
            cancel,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Next page in order. `None` once every page was read, after the first
    /// error, or as soon as the token is cancelled (including mid-fetch).
    pub async fn next(&mut self) -> Option<Result<ExtractedPage, ExtractionError>> {
        if self.next_page > self.page_count || self.cancel.is_cancelled() {
            return None;
        }
        let number = self.next_page;

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            text = self.document.page_text(number) => text,
        };

        match result {
            Ok(text) => {
                self.next_page += 1;
                Some(Ok(ExtractedPage {
                    number,
                    page_count: self.page_count,
                    text,
                }))
            }
            Err(e) => {
                self.next_page = self.page_count + 1;
                Some(Err(e))
            }
        }
    }
}
