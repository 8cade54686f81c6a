//! Client side of the interview REST API
//!
//! Two calls are made by this core: a multipart upload per audio segment
//! (transcription) and a follow-up check per question advance.

pub mod client;
pub mod messages;

pub use client::{ApiError, HttpInterviewApi, InterviewApi};
pub use messages::{FollowQuestion, FollowUpRequest, FollowUpResponse, TranscriptionResponse};
