use serde::Serialize;
use tokio::sync::mpsc;

use super::monitor::IntegrityFlag;

/// Severity of a transient, non-blocking notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Toast-style message for the candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Everything the host shell may want to render
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    FullscreenRequested,
    QuestionStarted {
        index: usize,
        question_id: String,
        prompt: String,
    },
    RecordingChanged {
        active: bool,
    },
    Transcribed {
        segment: usize,
        fragment: String,
    },
    Tick {
        remaining_secs: u64,
    },
    Integrity(IntegrityFlag),
    Notice(Notice),
    TimeUp,
    Finished {
        responses: Vec<String>,
    },
}

/// Fan-out point for session events; a dropped receiver is not an error
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(SessionEvent::Notice(Notice {
            level,
            message: message.into(),
        }));
    }
}
