use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use super::config::SessionConfig;
use super::events::{EventSink, NoticeLevel, SessionEvent};
use super::monitor::{FlagLog, IntegrityFlag, IntegrityMonitor, MonitorGuard, WindowEvent};
use super::question::{Question, QuestionList};
use super::stats::SessionStatus;
use super::timer::{InterviewTimer, Tick};
use crate::api::{ApiError, FollowUpRequest, InterviewApi};
use crate::audio::{CaptureDevice, RecorderStats, SegmentRecorder};
use crate::transcription::{BufferError, SharedBuffer, TranscriptionUploader};

/// Called once with one response per question index
pub type CompletionCallback = Box<dyn FnOnce(Vec<String>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    AwaitingFullscreen,
    InQuestion,
    AwaitingNextQuestion,
    Finished,
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("operation not allowed while {0:?}")]
    InvalidPhase(FlowPhase),

    #[error("follow-up check failed: {0}")]
    FollowUpCheckFailed(#[source] ApiError),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Per-question lifecycle of one interview
///
/// Owns the question list, the responses, the timer and the response buffer.
/// Recording goes through the `SegmentRecorder` only.
pub struct InterviewSession {
    config: SessionConfig,
    questions: QuestionList,
    responses: Vec<String>,
    current: usize,
    phase: FlowPhase,
    timer: InterviewTimer,
    recorder: SegmentRecorder,
    uploader: Arc<TranscriptionUploader>,
    buffer: SharedBuffer,
    api: Arc<dyn InterviewApi>,
    events: EventSink,
    flags: FlagLog,
    monitor: Option<MonitorGuard>,
    on_complete: Option<CompletionCallback>,
}

impl InterviewSession {
    pub fn new(
        config: SessionConfig,
        questions: Vec<Question>,
        device: Box<dyn CaptureDevice>,
        api: Arc<dyn InterviewApi>,
        events: EventSink,
        on_complete: CompletionCallback,
    ) -> Self {
        info!(
            "Creating interview session {} ({} questions)",
            config.session_id,
            questions.len()
        );

        let buffer = SharedBuffer::new();
        let uploader = Arc::new(TranscriptionUploader::new(
            Arc::clone(&api),
            config.session_id.clone(),
            buffer.clone(),
            events.clone(),
        ));
        let recorder = SegmentRecorder::new(device, uploader.clone(), config.segment_window);

        Self {
            responses: vec![String::new(); questions.len()],
            questions: QuestionList::new(questions),
            current: 0,
            phase: FlowPhase::AwaitingFullscreen,
            timer: InterviewTimer::new(config.budget),
            recorder,
            uploader,
            buffer,
            api,
            events,
            flags: Arc::new(Mutex::new(Vec::new())),
            monitor: None,
            on_complete: Some(on_complete),
            config,
        }
    }

    /// Start watching window events for integrity violations. The
    /// subscription ends when the session finishes or is dropped.
    pub fn attach_monitor(&mut self, window_events: mpsc::Receiver<WindowEvent>) {
        self.monitor = Some(IntegrityMonitor::spawn(
            window_events,
            self.events.clone(),
            Arc::clone(&self.flags),
        ));
    }

    /// Enter fullscreen and begin the first question
    pub async fn enable_safe_mode(&mut self) -> Result<(), FlowError> {
        if self.phase != FlowPhase::AwaitingFullscreen {
            return Err(FlowError::InvalidPhase(self.phase));
        }

        self.events.emit(SessionEvent::FullscreenRequested);

        if self.questions.is_empty() {
            warn!("Session {} has no questions", self.config.session_id);
            self.finish().await;
            return Ok(());
        }

        self.phase = FlowPhase::InQuestion;
        self.timer.start(Instant::now());
        info!("Interview {} started", self.config.session_id);

        self.begin_question().await;
        Ok(())
    }

    /// Submit the current answer and move on
    ///
    /// A no-op once the session has finished.
    pub async fn advance(&mut self) -> Result<(), FlowError> {
        match self.phase {
            FlowPhase::InQuestion => {}
            FlowPhase::Finished => return Ok(()),
            other => return Err(FlowError::InvalidPhase(other)),
        }

        self.stop_recording().await;
        tokio::time::sleep(self.config.advance_grace).await;

        let response = self.buffer.lock().take();
        self.responses[self.current] = response.clone();
        self.questions.mark_completed(self.current);

        if self.questions.is_last(self.current) {
            info!("Last question answered");
            self.finish().await;
            return Ok(());
        }

        self.phase = FlowPhase::AwaitingNextQuestion;

        let question_id = self
            .questions
            .get(self.current)
            .map(|q| q.id.clone())
            .unwrap_or_default();

        let request = FollowUpRequest {
            question_id: question_id.clone(),
            response,
            current_question_index: self.current,
        };

        match self.api.check_follow_up(&self.config.session_id, &request).await {
            Ok(reply) => {
                if let Some(follow_up) = reply.into_question(&question_id) {
                    info!("Follow-up {} added after {}", follow_up.id, question_id);
                    let at = self.questions.insert_follow_up(self.current, follow_up);
                    self.responses.insert(at, String::new());
                }
            }
            Err(e) => {
                let err = FlowError::FollowUpCheckFailed(e);
                warn!("{}; continuing with the next question", err);
                self.events.notice(
                    NoticeLevel::Warning,
                    "Could not check for a follow-up question. Moving on.",
                );
            }
        }

        self.current += 1;
        self.phase = FlowPhase::InQuestion;
        self.begin_question().await;

        Ok(())
    }

    /// Pause or resume dictation for the current question
    pub async fn toggle_recording(&mut self) -> Result<bool, FlowError> {
        if self.phase != FlowPhase::InQuestion {
            return Err(FlowError::InvalidPhase(self.phase));
        }
        self.sync_recording();

        if self.recorder.is_active() {
            self.stop_recording().await;
        } else {
            self.start_recording().await;
        }

        Ok(self.recorder.is_active())
    }

    /// Replace the response with typed text (only while not dictating)
    pub fn edit_response(&mut self, text: impl Into<String>) -> Result<(), FlowError> {
        if self.phase != FlowPhase::InQuestion {
            return Err(FlowError::InvalidPhase(self.phase));
        }
        self.sync_recording();
        self.buffer.lock().edit(text)?;
        Ok(())
    }

    /// Advance the timer by one tick; on expiry, finish the interview
    pub async fn on_tick(&mut self) -> Tick {
        self.sync_recording();
        let tick = self.timer.tick(Instant::now());

        match tick {
            Tick::Remaining(remaining) => {
                self.events.emit(SessionEvent::Tick {
                    remaining_secs: remaining.as_secs(),
                });
            }
            Tick::Expired => {
                info!("Time is up for {}", self.config.session_id);
                self.events.emit(SessionEvent::Tick { remaining_secs: 0 });
                self.events.emit(SessionEvent::TimeUp);
                self.expire().await;
            }
            Tick::Idle => {}
        }

        tick
    }

    /// Stop recording and detach the monitor without completing
    pub async fn shutdown(&mut self) {
        self.recorder.stop().await;
        self.buffer.lock().set_dictating(false);
        self.timer.halt(Instant::now());
        self.monitor = None;
    }

    pub fn status(&self) -> SessionStatus {
        let (response, dictating) = {
            let buffer = self.buffer.lock();
            (
                buffer.text().to_string(),
                buffer.is_dictating() && self.recorder.is_active(),
            )
        };

        SessionStatus {
            session_id: self.config.session_id.clone(),
            phase: self.phase,
            current_index: self.current,
            question_count: self.questions.len(),
            current_question: self.questions.get(self.current).cloned(),
            remaining_secs: self.timer.remaining(Instant::now()).as_secs(),
            response,
            dictating,
            integrity_flags: self.integrity_flags().len(),
            recorder: self.recorder.stats(),
            uploads_in_flight: self.uploader.in_flight(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn questions(&self) -> &[Question] {
        self.questions.as_slice()
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn response_text(&self) -> String {
        self.buffer.snapshot()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_active()
    }

    pub fn recorder_stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    pub fn integrity_flags(&self) -> Vec<IntegrityFlag> {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(|m| !m.is_finished())
    }

    pub(crate) fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.events.notice(level, message);
    }

    async fn begin_question(&mut self) {
        self.buffer.lock().clear();

        if let Some(question) = self.questions.get(self.current) {
            info!("Question {}: {}", self.current, question.id);
            self.events.emit(SessionEvent::QuestionStarted {
                index: self.current,
                question_id: question.id.clone(),
                prompt: question.question.clone(),
            });
        }

        self.start_recording().await;
    }

    async fn start_recording(&mut self) {
        match self.recorder.start().await {
            Ok(()) => {
                self.buffer.lock().set_dictating(true);
                self.events.emit(SessionEvent::RecordingChanged { active: true });
            }
            Err(e) => {
                warn!("Recording unavailable: {}", e);
                self.buffer.lock().set_dictating(false);
                self.events.notice(
                    NoticeLevel::Error,
                    format!("Microphone unavailable ({}). You can type your answer instead.", e),
                );
            }
        }
    }

    /// Catch up with a recorder whose capture stream ended on its own
    fn sync_recording(&mut self) {
        if self.recorder.is_active() {
            return;
        }

        let was_dictating = {
            let mut buffer = self.buffer.lock();
            let was = buffer.is_dictating();
            buffer.set_dictating(false);
            was
        };

        if was_dictating {
            warn!("Capture stream ended while dictating");
            self.events.emit(SessionEvent::RecordingChanged { active: false });
            self.events.notice(
                NoticeLevel::Warning,
                "Recording stopped unexpectedly. Type your answer or turn dictation back on.",
            );
        }
    }

    async fn stop_recording(&mut self) {
        let was_active = self.recorder.is_active();
        self.recorder.stop().await;
        self.buffer.lock().set_dictating(false);
        if was_active {
            self.events.emit(SessionEvent::RecordingChanged { active: false });
        }
    }

    async fn expire(&mut self) {
        self.stop_recording().await;
        tokio::time::sleep(self.config.timeout_grace).await;

        if self.phase == FlowPhase::InQuestion && self.current < self.responses.len() {
            self.responses[self.current] = self.buffer.lock().take();
        }

        self.finish().await;
    }

    async fn finish(&mut self) {
        if self.phase == FlowPhase::Finished {
            return;
        }

        self.recorder.stop().await;
        self.buffer.lock().set_dictating(false);
        self.timer.halt(Instant::now());
        self.phase = FlowPhase::Finished;
        self.monitor = None;

        info!(
            "Interview {} finished with {} responses",
            self.config.session_id,
            self.responses.len()
        );

        let responses = self.responses.clone();
        self.events.emit(SessionEvent::Finished {
            responses: responses.clone(),
        });

        if let Some(on_complete) = self.on_complete.take() {
            on_complete(responses);
        }
    }
}
