// Shared test doubles: a scripted capture device and a scripted interview API
#![allow(dead_code)]

use interview_capture::api::{ApiError, FollowUpRequest, FollowUpResponse, InterviewApi};
use interview_capture::audio::{
    AudioFrame, AudioSegment, CaptureDevice, CaptureError, CaptureHandle, SegmentSink,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Counters shared between a `ScriptedDevice` and the test
#[derive(Default)]
pub struct DeviceProbe {
    pub acquisitions: AtomicUsize,
    pub releases: AtomicUsize,
    pub live_handles: AtomicUsize,
    pub peak_live_handles: AtomicUsize,
}

/// Emits one 100ms frame of 16kHz mono audio every 100ms while acquired
pub struct ScriptedDevice {
    probe: Arc<DeviceProbe>,
    failure: Option<CaptureError>,
    frame_limit: Option<usize>,
    end_after_limit: bool,
    acquisition_limit: Option<usize>,
    tracks: Option<CancellationToken>,
}

impl ScriptedDevice {
    pub fn new() -> (Self, Arc<DeviceProbe>) {
        let probe = Arc::new(DeviceProbe::default());
        (
            Self {
                probe: Arc::clone(&probe),
                failure: None,
                frame_limit: None,
                end_after_limit: false,
                acquisition_limit: None,
                tracks: None,
            },
            probe,
        )
    }

    pub fn failing(error: CaptureError) -> (Self, Arc<DeviceProbe>) {
        let (mut device, probe) = Self::new();
        device.failure = Some(error);
        (device, probe)
    }

    /// Stop producing frames after `limit` frames; the stream stays open
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Close the stream after `limit` frames, like an unplugged device
    pub fn ending_after(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self.end_after_limit = true;
        self
    }

    /// Fail with `DeviceUnavailable` once `limit` acquisitions succeeded
    pub fn with_acquisition_limit(mut self, limit: usize) -> Self {
        self.acquisition_limit = Some(limit);
        self
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn acquire(&mut self) -> Result<CaptureHandle, CaptureError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.is_capturing() {
            return Err(CaptureError::AlreadyAcquired);
        }
        if self
            .acquisition_limit
            .is_some_and(|l| self.probe.acquisitions.load(Ordering::SeqCst) >= l)
        {
            return Err(CaptureError::DeviceUnavailable);
        }

        self.probe.acquisitions.fetch_add(1, Ordering::SeqCst);
        let live = self.probe.live_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak_live_handles.fetch_max(live, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(16);
        let tracks = CancellationToken::new();
        let stop = tracks.clone();
        let limit = self.frame_limit;
        let end_after_limit = self.end_after_limit;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            let mut sent = 0usize;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        if limit.is_some_and(|l| sent >= l) {
                            if end_after_limit {
                                break;
                            }
                            continue;
                        }
                        let frame = AudioFrame {
                            samples: vec![1000; 1600],
                            sample_rate: 16000,
                            channels: 1,
                            timestamp_ms: sent as u64 * 100,
                        };
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                        sent += 1;
                    }
                }
            }
        });

        self.tracks = Some(tracks.clone());
        Ok(CaptureHandle::new(rx, tracks))
    }

    fn release(&mut self) {
        if let Some(tracks) = self.tracks.take() {
            tracks.cancel();
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
            self.probe.live_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_capturing(&self) -> bool {
        self.tracks.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Sink that keeps every dispatched segment
#[derive(Default)]
pub struct CollectingSink {
    pub segments: Mutex<Vec<AudioSegment>>,
}

impl CollectingSink {
    pub fn indices(&self) -> Vec<usize> {
        self.segments.lock().unwrap().iter().map(|s| s.index).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.lock().unwrap().len()
    }
}

impl SegmentSink for CollectingSink {
    fn dispatch(&self, segment: AudioSegment) {
        self.segments.lock().unwrap().push(segment);
    }
}

/// Scripted outcome of one transcription call
#[derive(Debug, Clone)]
pub enum Transcript {
    Text(&'static str),
    /// Respond with `text` after `delay`
    Delayed(&'static str, Duration),
    Fail,
}

/// Scripted `InterviewApi`
///
/// Transcription calls consume `transcripts` in call order; once exhausted,
/// every call returns "segment N". Follow-up calls consume `follow_ups`;
/// once exhausted, no follow-up is returned.
#[derive(Default)]
pub struct MockApi {
    pub transcripts: Mutex<VecDeque<Transcript>>,
    pub follow_ups: Mutex<VecDeque<Result<FollowUpResponse, ()>>>,
    pub transcribe_calls: Mutex<Vec<(String, usize, String)>>,
    pub follow_up_calls: Mutex<Vec<FollowUpRequest>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_transcripts(transcripts: Vec<Transcript>) -> Arc<Self> {
        let api = Self::default();
        *api.transcripts.lock().unwrap() = transcripts.into();
        Arc::new(api)
    }

    pub fn push_follow_up(&self, reply: Result<FollowUpResponse, ()>) {
        self.follow_ups.lock().unwrap().push_back(reply);
    }

    pub fn transcribe_count(&self) -> usize {
        self.transcribe_calls.lock().unwrap().len()
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[async_trait::async_trait]
impl InterviewApi for MockApi {
    async fn transcribe(&self, session_id: &str, segment: &AudioSegment) -> Result<String, ApiError> {
        self.transcribe_calls.lock().unwrap().push((
            session_id.to_string(),
            segment.index,
            segment.mime_type.clone(),
        ));

        let next = self.transcripts.lock().unwrap().pop_front();
        match next {
            Some(Transcript::Text(text)) => Ok(text.to_string()),
            Some(Transcript::Delayed(text, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(text.to_string())
            }
            Some(Transcript::Fail) => Err(server_error()),
            None => Ok(format!("segment {}", segment.index)),
        }
    }

    async fn check_follow_up(
        &self,
        _session_id: &str,
        request: &FollowUpRequest,
    ) -> Result<FollowUpResponse, ApiError> {
        self.follow_up_calls.lock().unwrap().push(request.clone());

        let next = self.follow_ups.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(())) => Err(server_error()),
            None => Ok(FollowUpResponse::none()),
        }
    }
}

/// A valid one-second WAV segment
pub fn wav_segment(index: usize) -> AudioSegment {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..16000 {
            writer.write_sample(500i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    AudioSegment {
        index,
        payload: cursor.into_inner(),
        mime_type: "audio/wav;codecs=1".to_string(),
        captured_at: chrono::Utc::now(),
        duration_ms: 1000,
        sample_count: 16000,
    }
}
