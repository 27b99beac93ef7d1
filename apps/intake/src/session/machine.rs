use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::scoring::{ScoreBand, ScoringResult};
use crate::extraction::ExtractionError;
use crate::models::upload::{CandidateFile, FileInfo};
use crate::session::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::session::events::{Notice, NoticeKind, NoticeLog};
use crate::session::{PipelineError, Stage};

/// Identifies the file a background task was started for. Reset and new
/// uploads bump the session epoch, so older tickets stop matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Extract,
    Upload,
}

/// Work order produced when a file is accepted.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub ticket: Ticket,
    pub route: Route,
    pub bytes: Bytes,
    pub token: CancelToken,
}

/// Work order produced when the client confirms the summary.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    pub ticket: Ticket,
    pub summary: String,
    pub token: CancelToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub stage: Stage,
    pub file: Option<FileInfo>,
    pub progress: u8,
    pub summary: Option<String>,
    pub result: Option<ScoringResult>,
    pub notices: Vec<Notice>,
    pub created_at: DateTime<Utc>,
}

/// Payload passed on to the next wizard step.
#[derive(Debug, Clone, Serialize)]
pub struct HandOff {
    pub session_id: Uuid,
    pub next_step: String,
    pub score: u32,
    pub band: ScoreBand,
    pub headline: String,
    pub suggestions: Vec<String>,
}

/// One wizard visit. Every field that depends on the active file is cleared
/// in `clear`, and nothing else writes them back without a current ticket.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    stage: Stage,
    file: Option<CandidateFile>,
    progress: u8,
    summary: Option<String>,
    result: Option<ScoringResult>,
    epoch: u64,
    cancel: Option<CancelHandle>,
    task: Option<AbortHandle>,
    notices: NoticeLog,
    created_at: DateTime<Utc>,
    /// Last client request that touched the session.
    last_active: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Idle,
            file: None,
            progress: 0,
            summary: None,
            result: None,
            epoch: 0,
            cancel: None,
            task: None,
            notices: NoticeLog::default(),
            created_at: Utc::now(),
            last_active: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[cfg(test)]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    #[cfg(test)]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    #[cfg(test)]
    pub fn result(&self) -> Option<&ScoringResult> {
        self.result.as_ref()
    }

    #[cfg(test)]
    pub fn file(&self) -> Option<&CandidateFile> {
        self.file.as_ref()
    }

    #[cfg(test)]
    pub fn last_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            stage: self.stage,
            file: self.file.as_ref().map(CandidateFile::info),
            progress: self.progress,
            summary: self.summary.clone(),
            result: self.result.clone(),
            notices: self.notices.entries(),
            created_at: self.created_at,
        }
    }

    // ── client actions ─────────────────────────────────────────────────────

    /// Makes `file` the active file, replacing any previous one. PDFs go to
    /// extraction, everything else to the synthetic upload.
    pub fn accept_file(&mut self, file: CandidateFile) -> FileJob {
        if self.file.is_some() {
            self.clear();
        }
        self.epoch += 1;

        let (handle, token) = cancel_pair();
        let route = if file.is_pdf() {
            Route::Extract
        } else {
            Route::Upload
        };
        let bytes = file.content.clone();

        info!(session = %self.id, name = %file.name, ?route, "file accepted");
        match route {
            Route::Extract => {
                self.stage = Stage::Extracting;
                self.notices
                    .push(NoticeKind::Info, "Extracting text from PDF...", None);
            }
            Route::Upload => {
                self.stage = Stage::Uploading;
                self.notices.push(NoticeKind::Info, "Uploading...", None);
            }
        }
        self.file = Some(file);
        self.progress = 0;
        self.cancel = Some(handle);

        FileJob {
            ticket: self.ticket(),
            route,
            bytes,
            token,
        }
    }

    pub fn edit_summary(&mut self, text: String) -> Result<(), PipelineError> {
        self.require(Stage::Reviewing, "edit the summary")?;
        self.summary = Some(text);
        Ok(())
    }

    /// Freezes the current summary and moves to `Scoring`.
    pub fn begin_scoring(&mut self) -> Result<ScoringJob, PipelineError> {
        if self.file.is_none() {
            return Err(PipelineError::NoContent);
        }
        self.require(Stage::Reviewing, "analyze")?;
        let token = self
            .cancel
            .as_ref()
            .map(CancelHandle::token)
            .ok_or(PipelineError::NoContent)?;

        self.stage = Stage::Scoring;
        self.notices
            .push(NoticeKind::Info, "Analyzing your resume...", None);
        info!(session = %self.id, "scoring started");

        Ok(ScoringJob {
            ticket: self.ticket(),
            summary: self.summary.clone().unwrap_or_default(),
            token,
        })
    }

    /// Clears everything tied to the active file and cancels in-flight work.
    /// Valid from any stage.
    pub fn reset(&mut self) {
        let had_file = self.file.is_some();
        self.clear();
        if had_file {
            info!(session = %self.id, "session reset");
            self.notices.push(NoticeKind::Info, "Upload reset", None);
        }
    }

    /// Produces the hand-off payload and returns the session to `Idle`.
    pub fn hand_off(&mut self, next_step: &str) -> Result<HandOff, PipelineError> {
        self.require(Stage::Done, "continue")?;
        let result = self.result.clone().ok_or(PipelineError::InvalidTransition {
            action: "continue",
            stage: self.stage,
        })?;
        let hand_off = HandOff {
            session_id: self.id,
            next_step: next_step.to_string(),
            score: result.score,
            band: result.band,
            headline: result.headline,
            suggestions: result.suggestions,
        };
        info!(session = %self.id, next_step, score = hand_off.score, "handing off");
        self.clear();
        Ok(hand_off)
    }

    // ── pipeline transitions ───────────────────────────────────────────────
    //
    // Each returns false when the ticket is stale or the stage has moved on;
    // callers stop their work in that case.

    pub fn attach_task(&mut self, ticket: Ticket, task: AbortHandle) {
        if self.is_current(ticket) {
            self.task = Some(task);
        } else {
            task.abort();
        }
    }

    pub fn record_progress(&mut self, ticket: Ticket, percent: u8) -> bool {
        if !self.accepts(ticket, &[Stage::Extracting, Stage::Uploading]) {
            return false;
        }
        self.progress = self.progress.max(percent.min(100));
        if self.stage == Stage::Extracting {
            self.notices.push(
                NoticeKind::Progress,
                format!("Extracting text from PDF... {}%", self.progress),
                None,
            );
        }
        true
    }

    pub fn finish_extraction(&mut self, ticket: Ticket, summary: String) -> bool {
        if !self.accepts(ticket, &[Stage::Extracting]) {
            return false;
        }
        info!(session = %self.id, chars = summary.chars().count(), "extraction finished");
        self.progress = 100;
        self.summary = Some(summary);
        self.stage = Stage::Reviewing;
        self.notices.push(
            NoticeKind::Success,
            "Text extracted successfully",
            Some("We've extracted the text from your resume.".to_string()),
        );
        true
    }

    /// Extraction failures are terminal for the file: the session goes back to `Idle`.
    pub fn fail_extraction(&mut self, ticket: Ticket, error: &ExtractionError) -> bool {
        if !self.accepts(ticket, &[Stage::Extracting]) {
            return false;
        }
        let error = PipelineError::ExtractionFailed(error.to_string());
        warn!(session = %self.id, "{error}");
        self.clear();
        self.notices.push(
            NoticeKind::Error,
            "Failed to extract text",
            Some(
                "There was an error processing your PDF. Please try again with another file."
                    .to_string(),
            ),
        );
        true
    }

    pub fn complete_upload(&mut self, ticket: Ticket) -> bool {
        if !self.accepts(ticket, &[Stage::Uploading]) || self.progress < 100 {
            return false;
        }
        info!(session = %self.id, "synthetic upload complete");
        self.result = Some(ScoringResult::canned_upload());
        self.stage = Stage::Done;
        self.notices.push(
            NoticeKind::Success,
            "Upload complete",
            Some("Your resume has been analyzed".to_string()),
        );
        true
    }

    pub fn complete_scoring(&mut self, ticket: Ticket, result: ScoringResult) -> bool {
        if !self.accepts(ticket, &[Stage::Scoring]) {
            return false;
        }
        info!(session = %self.id, score = result.score, "scoring complete");
        let detail = format!(
            "Your resume scored {}/100. Check out our recommendations.",
            result.score
        );
        self.result = Some(result);
        self.stage = Stage::Done;
        self.notices
            .push(NoticeKind::Success, "Analysis complete", Some(detail));
        true
    }

    /// Only the analyzing state is rolled back; file and summary stay so the
    /// client can retry.
    pub fn fail_scoring(&mut self, ticket: Ticket, error: &PipelineError) -> bool {
        if !self.accepts(ticket, &[Stage::Scoring]) {
            return false;
        }
        warn!(session = %self.id, "scoring failed: {error}");
        self.stage = Stage::Reviewing;
        self.notices.push(
            NoticeKind::Error,
            "Failed to analyze resume",
            Some("An error occurred during analysis. Please try again.".to_string()),
        );
        true
    }

    // ── internals ──────────────────────────────────────────────────────────

    fn ticket(&self) -> Ticket {
        Ticket { epoch: self.epoch }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.epoch == self.epoch
    }

    fn accepts(&self, ticket: Ticket, stages: &[Stage]) -> bool {
        let ok = self.is_current(ticket) && stages.contains(&self.stage);
        if !ok {
            debug!(session = %self.id, stage = %self.stage, "discarding stale completion");
        }
        ok
    }

    fn require(&self, stage: Stage, action: &'static str) -> Result<(), PipelineError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(PipelineError::InvalidTransition {
                action,
                stage: self.stage,
            })
        }
    }

    fn clear(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.epoch += 1;
        self.stage = Stage::Idle;
        self.file = None;
        self.progress = 0;
        self.summary = None;
        self.result = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf() -> CandidateFile {
        CandidateFile::new("cv.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
    }

    fn docx() -> CandidateFile {
        CandidateFile::new("cv.docx", "", Bytes::from_static(b"PK"))
    }

    fn reviewing(session: &mut Session, summary: &str) -> Ticket {
        let job = session.accept_file(pdf());
        assert!(session.finish_extraction(job.ticket, summary.to_string()));
        job.ticket
    }

    #[test]
    fn test_pdf_routes_to_extraction() {
        let mut session = Session::new();
        let job = session.accept_file(pdf());
        assert_eq!(job.route, Route::Extract);
        assert_eq!(session.stage(), Stage::Extracting);
    }

    #[test]
    fn test_other_types_route_to_upload() {
        let mut session = Session::new();
        let job = session.accept_file(docx());
        assert_eq!(job.route, Route::Upload);
        assert_eq!(session.stage(), Stage::Uploading);
    }

    #[test]
    fn test_full_pdf_flow() {
        let mut session = Session::new();
        reviewing(&mut session, "page one\n\npage two");
        assert_eq!(session.stage(), Stage::Reviewing);

        session.edit_summary("edited text".to_string()).unwrap();
        let job = session.begin_scoring().unwrap();
        assert_eq!(job.summary, "edited text");
        assert_eq!(session.stage(), Stage::Scoring);

        assert!(session.complete_scoring(job.ticket, ScoringResult::new(70, vec![])));
        assert_eq!(session.stage(), Stage::Done);
        assert_eq!(session.result().unwrap().score, 70);

        let hand_off = session.hand_off("/verify").unwrap();
        assert_eq!(hand_off.next_step, "/verify");
        assert_eq!(hand_off.score, 70);
        assert_eq!(session.stage(), Stage::Idle);
        assert!(session.file().is_none());
    }

    #[test]
    fn test_edit_outside_review_is_rejected() {
        let mut session = Session::new();
        session.accept_file(pdf());
        let err = session.edit_summary("x".into()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidTransition {
                stage: Stage::Extracting,
                ..
            }
        ));
    }

    #[test]
    fn test_analyze_without_file_is_no_content() {
        let mut session = Session::new();
        assert!(matches!(
            session.begin_scoring(),
            Err(PipelineError::NoContent)
        ));
    }

    #[test]
    fn test_frozen_summary_ignores_later_edits() {
        let mut session = Session::new();
        reviewing(&mut session, "original");
        let job = session.begin_scoring().unwrap();
        assert!(session.edit_summary("late edit".into()).is_err());
        assert_eq!(job.summary, "original");
    }

    #[test]
    fn test_reset_clears_everything_from_any_stage() {
        let mut session = Session::new();
        let ticket = reviewing(&mut session, "text");
        session.reset();

        assert_eq!(session.stage(), Stage::Idle);
        assert!(session.file().is_none());
        assert!(session.summary().is_none());
        assert!(session.result().is_none());
        assert_eq!(session.progress(), 0);
        assert!(!session.record_progress(ticket, 50));

        // Resetting an idle session is harmless.
        session.reset();
        assert_eq!(session.stage(), Stage::Idle);
    }

    #[test]
    fn test_reset_fires_cancellation() {
        let mut session = Session::new();
        let job = session.accept_file(pdf());
        assert!(!job.token.is_cancelled());
        session.reset();
        assert!(job.token.is_cancelled());
    }

    #[test]
    fn test_stale_extraction_completion_is_discarded() {
        let mut session = Session::new();
        let job = session.accept_file(pdf());
        assert!(session.record_progress(job.ticket, 40));
        session.reset();

        assert!(!session.finish_extraction(job.ticket, "late".into()));
        assert!(!session.fail_extraction(job.ticket, &ExtractionError::NoPages));
        assert_eq!(session.stage(), Stage::Idle);
        assert!(session.summary().is_none());
    }

    #[test]
    fn test_new_file_invalidates_previous_ticket() {
        let mut session = Session::new();
        let first = session.accept_file(pdf());
        let second = session.accept_file(docx());
        assert!(first.token.is_cancelled());
        assert!(!session.record_progress(first.ticket, 10));
        assert!(session.record_progress(second.ticket, 10));
        assert_eq!(session.file().unwrap().name, "cv.docx");
    }

    #[test]
    fn test_extraction_failure_returns_to_idle() {
        let mut session = Session::new();
        let job = session.accept_file(pdf());
        assert!(session.fail_extraction(job.ticket, &ExtractionError::NoPages));
        assert_eq!(session.stage(), Stage::Idle);
        assert!(session.file().is_none());
        assert_eq!(session.last_notice().unwrap().kind, NoticeKind::Error);
    }

    #[test]
    fn test_scoring_failure_keeps_file_and_summary() {
        let mut session = Session::new();
        reviewing(&mut session, "text");
        let job = session.begin_scoring().unwrap();
        let err = PipelineError::AnalysisFailed("boom".into());
        assert!(session.fail_scoring(job.ticket, &err));

        assert_eq!(session.stage(), Stage::Reviewing);
        assert!(session.file().is_some());
        assert_eq!(session.summary(), Some("text"));
        assert!(session.begin_scoring().is_ok());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut session = Session::new();
        let job = session.accept_file(docx());
        assert!(session.record_progress(job.ticket, 30));
        assert!(session.record_progress(job.ticket, 20));
        assert_eq!(session.progress(), 30);
    }

    #[test]
    fn test_upload_completes_only_at_full_progress() {
        let mut session = Session::new();
        let job = session.accept_file(docx());
        assert!(!session.complete_upload(job.ticket));
        session.record_progress(job.ticket, 100);
        assert!(session.complete_upload(job.ticket));
        assert_eq!(session.stage(), Stage::Done);
        assert_eq!(session.result().unwrap().score, 85);
    }

    #[test]
    fn test_hand_off_requires_done() {
        let mut session = Session::new();
        reviewing(&mut session, "text");
        assert!(session.hand_off("/verify").is_err());
        assert_eq!(session.stage(), Stage::Reviewing);
    }
}
