//! Single-task event loop for an interview session
//!
//! Commands, window events and timer ticks are handled one at a time on one
//! task, so the controller never needs locking of its own.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::controller::{FlowPhase, InterviewSession};
use super::events::NoticeLevel;
use super::monitor::WindowEvent;
use super::stats::SessionStatus;

#[derive(Debug)]
pub enum SessionCommand {
    EnableSafeMode,
    Advance,
    ToggleRecording,
    EditResponse(String),
    Status(oneshot::Sender<SessionStatus>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("interview session has ended")]
pub struct SessionClosed;

/// Cloneable front door to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    window: mpsc::Sender<WindowEvent>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).await.map_err(|_| SessionClosed)
    }

    pub async fn enable_safe_mode(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::EnableSafeMode).await
    }

    pub async fn advance(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Advance).await
    }

    pub async fn toggle_recording(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::ToggleRecording).await
    }

    pub async fn edit_response(&self, text: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::EditResponse(text.into())).await
    }

    pub async fn window_event(&self, event: WindowEvent) -> Result<(), SessionClosed> {
        self.window.send(event).await.map_err(|_| SessionClosed)
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionClosed> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Status(tx)).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    /// Resolves once the session task has exited
    pub async fn closed(&self) {
        self.commands.closed().await
    }
}

/// Attach the integrity monitor and run `session` on its own task.
/// The task yields the final responses.
pub fn spawn(mut session: InterviewSession) -> (SessionHandle, JoinHandle<Vec<String>>) {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (window_tx, window_rx) = mpsc::channel(32);

    session.attach_monitor(window_rx);

    let task = tokio::spawn(run(session, command_rx));

    (
        SessionHandle {
            commands: command_tx,
            window: window_tx,
        },
        task,
    )
}

/// Drive `session` until it finishes or every command sender is gone
pub async fn run(
    mut session: InterviewSession,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> Vec<String> {
    let mut ticker = tokio::time::interval(session.config().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while session.phase() != FlowPhase::Finished {
        tokio::select! {
            _ = ticker.tick() => {
                session.on_tick().await;
            }
            command = commands.recv() => match command {
                Some(command) => handle(&mut session, command).await,
                None => {
                    info!("Session {} abandoned", session.config().session_id);
                    session.shutdown().await;
                    break;
                }
            },
        }
    }

    session.responses().to_vec()
}

async fn handle(session: &mut InterviewSession, command: SessionCommand) {
    let result = match command {
        SessionCommand::EnableSafeMode => session.enable_safe_mode().await,
        SessionCommand::Advance => session.advance().await,
        SessionCommand::ToggleRecording => session.toggle_recording().await.map(|_| ()),
        SessionCommand::EditResponse(text) => session.edit_response(text),
        SessionCommand::Status(reply) => {
            let _ = reply.send(session.status());
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Command rejected: {}", e);
        session.notify(NoticeLevel::Warning, e.to_string());
    }
}
