use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use super::events::{EventSink, NoticeLevel, SessionEvent};

/// Window-level events forwarded by the host shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowEvent {
    Blur,
    Focus,
    PointerLeave,
    PointerEnter,
    FullscreenExit,
    FullscreenEnter,
}

impl WindowEvent {
    pub fn violation(&self) -> Option<ViolationKind> {
        match self {
            WindowEvent::Blur => Some(ViolationKind::WindowBlur),
            WindowEvent::PointerLeave => Some(ViolationKind::PointerLeft),
            WindowEvent::FullscreenExit => Some(ViolationKind::FullscreenExit),
            WindowEvent::Focus | WindowEvent::PointerEnter | WindowEvent::FullscreenEnter => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    WindowBlur,
    PointerLeft,
    FullscreenExit,
}

impl ViolationKind {
    pub fn warning(&self) -> &'static str {
        match self {
            ViolationKind::WindowBlur => "Switching tabs or windows during the interview is not allowed.",
            ViolationKind::PointerLeft => "Please keep your cursor inside the interview window.",
            ViolationKind::FullscreenExit => "Please stay in fullscreen mode until the interview ends.",
        }
    }
}

/// A suspected rule violation. Advisory only; never ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityFlag {
    pub kind: ViolationKind,
    pub detected_at: DateTime<Utc>,
}

/// Flags raised so far, in detection order
pub type FlagLog = Arc<Mutex<Vec<IntegrityFlag>>>;

/// Keeps the monitor subscribed; dropping it tears the subscription down
pub struct MonitorGuard {
    _cancel: DropGuard,
    task: JoinHandle<()>,
}

impl MonitorGuard {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct IntegrityMonitor;

impl IntegrityMonitor {
    /// Watch `window_events` until the guard is dropped or the sender closes
    pub fn spawn(
        mut window_events: mpsc::Receiver<WindowEvent>,
        events: EventSink,
        log: FlagLog,
    ) -> MonitorGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    event = window_events.recv() => match event {
                        Some(event) => {
                            if let Some(kind) = event.violation() {
                                raise(kind, &events, &log);
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!("Integrity monitor detached");
        });

        MonitorGuard {
            _cancel: token.drop_guard(),
            task,
        }
    }
}

fn raise(kind: ViolationKind, events: &EventSink, log: &FlagLog) {
    let flag = IntegrityFlag {
        kind,
        detected_at: Utc::now(),
    };
    warn!("Integrity flag raised: {:?}", kind);

    log.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(flag.clone());
    events.emit(SessionEvent::Integrity(flag));
    events.notice(NoticeLevel::Warning, kind.warning());
}
