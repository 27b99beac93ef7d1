use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Most recent notices kept per session.
const MAX_NOTICES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Progress,
    Success,
    Error,
}

/// A user-facing event. Wording is presentation only; clients key off `kind`.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub seq: u64,
    pub kind: NoticeKind,
    pub message: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NoticeLog {
    next_seq: u64,
    entries: VecDeque<Notice>,
}

impl NoticeLog {
    pub fn push(&mut self, kind: NoticeKind, message: impl Into<String>, detail: Option<String>) {
        if self.entries.len() == MAX_NOTICES {
            self.entries.pop_front();
        }
        self.entries.push_back(Notice {
            seq: self.next_seq,
            kind,
            message: message.into(),
            detail,
            at: Utc::now(),
        });
        self.next_seq += 1;
    }

    pub fn entries(&self) -> Vec<Notice> {
        self.entries.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Notice> {
        self.entries.back()
    }
}
