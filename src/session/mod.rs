//! Interview session management
//!
//! This module provides the `InterviewSession` flow controller and what it
//! coordinates:
//! - Question list with server-driven follow-ups
//! - Whole-interview timer with a one-shot expiry
//! - Integrity monitor for window blur, cursor exit and fullscreen exit
//! - Event channel toward the host shell
//! - Single-task driver and its command handle

mod config;
pub mod controller;
pub mod driver;
pub mod events;
pub mod monitor;
mod question;
mod stats;
pub mod timer;

pub use config::SessionConfig;
pub use controller::{CompletionCallback, FlowError, FlowPhase, InterviewSession};
pub use driver::{SessionClosed, SessionCommand, SessionHandle};
pub use events::{EventSink, Notice, NoticeLevel, SessionEvent};
pub use monitor::{
    FlagLog, IntegrityFlag, IntegrityMonitor, MonitorGuard, ViolationKind, WindowEvent,
};
pub use question::{Question, QuestionList};
pub use stats::SessionStatus;
pub use timer::{InterviewTimer, Tick, TimerPhase};
