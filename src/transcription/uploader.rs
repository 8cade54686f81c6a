use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::buffer::SharedBuffer;
use crate::api::{ApiError, InterviewApi};
use crate::audio::{AudioSegment, SegmentSink};
use crate::session::events::{EventSink, NoticeLevel, SessionEvent};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("segment {index} is empty or has an unknown container type")]
    EmptySegment { index: usize },

    #[error("transcription upload for segment {index} failed: {source}")]
    UploadFailed {
        index: usize,
        #[source]
        source: ApiError,
    },
}

/// Everything one upload needs; cloned into each upload task
#[derive(Clone)]
struct UploadContext {
    api: Arc<dyn InterviewApi>,
    session_id: Arc<str>,
    buffer: SharedBuffer,
    events: EventSink,
}

impl UploadContext {
    async fn upload(self, segment: AudioSegment) -> Result<String, UploadError> {
        let index = segment.index;

        let Some(segment) = segment.normalized() else {
            warn!("Segment {} is empty or untyped; not uploading", index);
            return Err(UploadError::EmptySegment { index });
        };

        let text = match self.api.transcribe(&self.session_id, &segment).await {
            Ok(text) => text,
            Err(source) => {
                let err = UploadError::UploadFailed { index, source };
                error!("{}", err);
                self.events.notice(
                    NoticeLevel::Error,
                    "Part of your answer could not be transcribed. Recording continues.",
                );
                return Err(err);
            }
        };

        let appended = self.buffer.lock().append_fragment(&text);
        if appended {
            info!("Segment {} transcribed: {} chars", index, text.len());
            self.events.emit(SessionEvent::Transcribed {
                segment: index,
                fragment: text.clone(),
            });
        } else {
            debug!("Segment {} transcribed to empty text", index);
        }

        Ok(text)
    }
}

/// Uploads finalized segments and merges their text into the response buffer
///
/// Uploads run as independent tasks. Fragments are appended in the order
/// their uploads complete, which may differ from capture order.
pub struct TranscriptionUploader {
    ctx: UploadContext,
    tasks: Mutex<JoinSet<()>>,
}

impl TranscriptionUploader {
    pub fn new(
        api: Arc<dyn InterviewApi>,
        session_id: impl Into<String>,
        buffer: SharedBuffer,
        events: EventSink,
    ) -> Self {
        Self {
            ctx: UploadContext {
                api,
                session_id: Arc::from(session_id.into()),
                buffer,
                events,
            },
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Upload one segment and wait for the result
    pub async fn upload(&self, segment: AudioSegment) -> Result<String, UploadError> {
        self.ctx.clone().upload(segment).await
    }

    /// Number of uploads still running
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait for every outstanding upload to finish
    pub async fn drain(&self) {
        let mut pending = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };

        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                error!("Upload task panicked: {}", e);
            }
        }
    }
}

impl SegmentSink for TranscriptionUploader {
    fn dispatch(&self, segment: AudioSegment) {
        let ctx = self.ctx.clone();
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            // failures are reported inside upload()
            let _ = ctx.upload(segment).await;
        });
    }
}
