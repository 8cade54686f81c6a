use serde::Serialize;

use super::controller::FlowPhase;
use super::question::Question;
use crate::audio::RecorderStats;

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,

    pub phase: FlowPhase,

    /// Index of the question being answered
    pub current_index: usize,

    pub question_count: usize,

    pub current_question: Option<Question>,

    /// Seconds left in the interview budget
    pub remaining_secs: u64,

    /// Current response text
    pub response: String,

    /// Whether the response is being dictated (read-only for typing)
    pub dictating: bool,

    /// Number of integrity flags raised so far
    pub integrity_flags: usize,

    pub recorder: RecorderStats,

    /// Transcription uploads still running
    pub uploads_in_flight: usize,
}
