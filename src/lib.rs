pub mod api;
pub mod audio;
pub mod config;
pub mod http;
pub mod session;
pub mod transcription;

pub use api::{FollowUpRequest, FollowUpResponse, HttpInterviewApi, InterviewApi};
pub use audio::{
    AudioFile, AudioFrame, AudioSegment, CaptureConstraints, CaptureDevice, CaptureError,
    CaptureHandle, DeviceFactory, DeviceSource, SegmentFormat, SegmentRecorder, SegmentSink,
};
pub use config::AppConfig;
pub use http::{create_router, AppState};
pub use session::{
    EventSink, FlowPhase, InterviewSession, Question, SessionConfig, SessionEvent, SessionHandle,
    SessionStatus, WindowEvent,
};
pub use transcription::{ResponseBuffer, SharedBuffer, TranscriptionUploader};
