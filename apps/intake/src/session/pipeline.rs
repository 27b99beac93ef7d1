use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::analysis::scoring::ResumeScorer;
use crate::extraction::{join_pages, DocumentParser, PageStream};
use crate::models::upload::CandidateFile;
use crate::session::machine::{FileJob, Route, ScoringJob, Session, SessionSnapshot};
use crate::session::upload::run_upload;
use crate::session::PipelineError;

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug, Clone)]
pub struct PipelineTimings {
    pub upload_step: u8,
    pub upload_tick: Duration,
    pub upload_complete_delay: Duration,
    pub analysis_delay: Duration,
}

impl Default for PipelineTimings {
    fn default() -> Self {
        Self {
            upload_step: 5,
            upload_tick: Duration::from_millis(100),
            upload_complete_delay: Duration::from_millis(500),
            analysis_delay: Duration::from_millis(2000),
        }
    }
}

/// Starts the background work behind each session transition. The session
/// lock is held only while a transition is applied, never across a wait.
#[derive(Clone)]
pub struct Pipeline {
    parser: Arc<dyn DocumentParser>,
    scorer: Arc<dyn ResumeScorer>,
    timings: PipelineTimings,
}

impl Pipeline {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        scorer: Arc<dyn ResumeScorer>,
        timings: PipelineTimings,
    ) -> Self {
        Self {
            parser,
            scorer,
            timings,
        }
    }

    /// Takes an already validated file and launches extraction or the
    /// synthetic upload for it.
    pub async fn start(&self, session: &SharedSession, file: CandidateFile) -> SessionSnapshot {
        let mut guard = session.lock().await;
        let job = guard.accept_file(file);
        let ticket = job.ticket;

        let task = match job.route {
            Route::Extract => tokio::spawn(run_extraction(
                Arc::clone(&self.parser),
                Arc::clone(session),
                job,
            )),
            Route::Upload => tokio::spawn(run_upload(
                Arc::clone(session),
                job,
                self.timings.upload_step,
                self.timings.upload_tick,
                self.timings.upload_complete_delay,
            )),
        };
        guard.attach_task(ticket, task.abort_handle());
        guard.snapshot()
    }

    /// Confirms the reviewed summary and schedules scoring.
    pub async fn analyze(&self, session: &SharedSession) -> Result<SessionSnapshot, PipelineError> {
        let mut guard = session.lock().await;
        let job = guard.begin_scoring()?;
        let ticket = job.ticket;

        let task = tokio::spawn(run_scoring(
            Arc::clone(&self.scorer),
            Arc::clone(session),
            job,
            self.timings.analysis_delay,
        ));
        guard.attach_task(ticket, task.abort_handle());
        Ok(guard.snapshot())
    }
}

async fn run_extraction(parser: Arc<dyn DocumentParser>, session: SharedSession, job: FileJob) {
    let mut pages = match PageStream::open(parser.as_ref(), job.bytes, job.token.clone()).await {
        Ok(pages) => pages,
        Err(e) => {
            session.lock().await.fail_extraction(job.ticket, &e);
            return;
        }
    };
    debug!(pages = pages.page_count(), "extracting");

    let mut texts = Vec::with_capacity(pages.page_count() as usize);
    while let Some(page) = pages.next().await {
        match page {
            Ok(page) => {
                if !session.lock().await.record_progress(job.ticket, page.progress()) {
                    return;
                }
                texts.push(page.text);
            }
            Err(e) => {
                session.lock().await.fail_extraction(job.ticket, &e);
                return;
            }
        }
    }

    if job.token.is_cancelled() {
        return;
    }
    session
        .lock()
        .await
        .finish_extraction(job.ticket, join_pages(&texts));
}

async fn run_scoring(
    scorer: Arc<dyn ResumeScorer>,
    session: SharedSession,
    job: ScoringJob,
    delay: Duration,
) {
    tokio::select! {
        biased;
        _ = job.token.cancelled() => return,
        _ = sleep(delay) => {}
    }

    // A scorer that panics must still release the session from `Scoring`.
    let summary = job.summary;
    let outcome = tokio::spawn(async move { scorer.score(&summary).await })
        .await
        .unwrap_or_else(|e| Err(PipelineError::AnalysisFailed(e.to_string())));
    let mut guard = session.lock().await;
    match outcome {
        Ok(result) => guard.complete_scoring(job.ticket, result),
        Err(e) => guard.fail_scoring(job.ticket, &e),
    };
}
