use bytes::Bytes;
use serde::Serialize;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A file offered by the client. Lives only as long as its wizard session.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub media_type: String,
    pub content: Bytes,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, content: Bytes) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            content,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            size_bytes: self.size_bytes(),
            size_label: size_label(self.size_bytes()),
        }
    }
}

/// Client-facing metadata for the active file. Never carries the content.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub size_label: String,
}

/// Renders a byte count as megabytes with two decimals, e.g. `0.50 MB`.
pub fn size_label(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}
