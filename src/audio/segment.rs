//! Segmented recording
//!
//! One capture handle is held for the whole recording, but audio is cut into
//! short, fully self-contained WAV files. Each segment gets its own header so
//! it can be transcribed independently of every other segment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backend::{AudioFrame, CaptureDevice, CaptureError, CaptureHandle};

/// Container formats a segment can be encoded as, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentFormat {
    /// 16-bit integer PCM in WAV
    Pcm16Wav,
    /// 32-bit float in WAV
    FloatWav,
}

impl SegmentFormat {
    pub const PREFERENCE: [SegmentFormat; 2] = [SegmentFormat::Pcm16Wav, SegmentFormat::FloatWav];

    /// Pick the most preferred format the device supports, falling back to
    /// the generic float container.
    pub fn select(supported: &[SegmentFormat]) -> SegmentFormat {
        Self::PREFERENCE
            .iter()
            .copied()
            .find(|f| supported.contains(f))
            .unwrap_or(SegmentFormat::FloatWav)
    }

    /// Mime type as tagged by the recorder, codec parameter included
    pub fn mime_type(&self) -> &'static str {
        match self {
            SegmentFormat::Pcm16Wav => "audio/wav;codecs=1",
            SegmentFormat::FloatWav => "audio/wav;codecs=3",
        }
    }
}

/// Reduce a recorder mime tag to a container type the transcription
/// endpoint can decode. Returns `None` for unknown containers.
pub fn normalize_mime(mime: &str) -> Option<&'static str> {
    let base = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match base.as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("audio/wav"),
        "audio/webm" | "video/webm" => Some("audio/webm"),
        "audio/ogg" | "application/ogg" => Some("audio/ogg"),
        "audio/mpeg" | "audio/mp3" => Some("audio/mpeg"),
        _ => None,
    }
}

/// One finalized, independently decodable piece of the recording
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Position in the recording (0-indexed, continues across restarts)
    pub index: usize,
    /// Complete encoded file
    pub payload: Vec<u8>,
    pub mime_type: String,
    /// When capture of this segment began
    pub captured_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub sample_count: usize,
}

impl AudioSegment {
    /// Non-empty and tagged with a known decodable container
    pub fn is_valid(&self) -> bool {
        !self.payload.is_empty() && normalize_mime(&self.mime_type).is_some()
    }

    /// Replace the mime tag with its normalized form; `None` if invalid
    pub fn normalized(mut self) -> Option<AudioSegment> {
        if self.payload.is_empty() {
            return None;
        }
        let mime = normalize_mime(&self.mime_type)?;
        self.mime_type = mime.to_string();
        Some(self)
    }

    pub fn file_name(&self) -> String {
        let ext = match normalize_mime(&self.mime_type) {
            Some("audio/webm") => "webm",
            Some("audio/ogg") => "ogg",
            Some("audio/mpeg") => "mp3",
            _ => "wav",
        };
        format!("segment-{:03}.{}", self.index, ext)
    }
}

/// Receives finalized segments. Must not block: the recording loop calls
/// this between two segments.
pub trait SegmentSink: Send + Sync {
    fn dispatch(&self, segment: AudioSegment);
}

/// Recorder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    SegmentActive { index: usize },
    Stopping,
}

/// Counters exposed for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct RecorderStats {
    pub state: RecorderState,
    pub is_active: bool,
    /// Segments handed to the sink
    pub segments_emitted: usize,
    /// Segments dropped because they held no audio
    pub empty_segments: usize,
    /// Highest number of segment writers ever open at the same time
    pub peak_open_segments: usize,
}

#[derive(Default)]
struct OpenGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl OpenGauge {
    fn open(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn close(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

struct RecorderShared {
    state: Mutex<RecorderState>,
    segments_emitted: AtomicUsize,
    empty_segments: AtomicUsize,
    next_index: AtomicUsize,
    gauge: OpenGauge,
}

impl RecorderShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState::Idle),
            segments_emitted: AtomicUsize::new(0),
            empty_segments: AtomicUsize::new(0),
            next_index: AtomicUsize::new(0),
            gauge: OpenGauge::default(),
        }
    }

    fn set_state(&self, state: RecorderState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> RecorderState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collects the frames of one segment and encodes them into a fresh file
struct SegmentWriter {
    index: usize,
    format: SegmentFormat,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    captured_at: DateTime<Utc>,
    shared: Arc<RecorderShared>,
}

impl SegmentWriter {
    fn open(index: usize, format: SegmentFormat, shared: Arc<RecorderShared>) -> Self {
        shared.gauge.open();
        Self {
            index,
            format,
            samples: Vec::new(),
            sample_rate: 0,
            channels: 0,
            captured_at: Utc::now(),
            shared,
        }
    }

    fn write_frame(&mut self, frame: &AudioFrame) {
        if self.samples.is_empty() {
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
        }
        self.samples.extend_from_slice(&frame.samples);
    }

    fn finish(mut self) -> Result<AudioSegment, hound::Error> {
        let samples = std::mem::take(&mut self.samples);
        let sample_count = samples.len();

        let (payload, duration_ms) = if samples.is_empty() {
            (Vec::new(), 0)
        } else {
            let channels = self.channels.max(1);
            let duration_ms = (sample_count as u64 * 1000)
                / (self.sample_rate.max(1) as u64 * channels as u64);
            (encode_wav(&samples, self.sample_rate, channels, self.format)?, duration_ms)
        };

        Ok(AudioSegment {
            index: self.index,
            payload,
            mime_type: self.format.mime_type().to_string(),
            captured_at: self.captured_at,
            duration_ms,
            sample_count,
        })
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        self.shared.gauge.close();
    }
}

fn encode_wav(
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
    format: SegmentFormat,
) -> Result<Vec<u8>, hound::Error> {
    let spec = match format {
        SegmentFormat::Pcm16Wav => hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
        SegmentFormat::FloatWav => hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        match format {
            SegmentFormat::Pcm16Wav => {
                for &sample in samples {
                    writer.write_sample(sample)?;
                }
            }
            SegmentFormat::FloatWav => {
                for &sample in samples {
                    writer.write_sample(sample as f32 / 32768.0)?;
                }
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentEnd {
    WindowElapsed,
    Stopped,
    StreamClosed,
}

/// Segmented recorder
///
/// Exclusively owns the capture device. Only `start`/`stop`/`toggle` touch it.
pub struct SegmentRecorder {
    device: Box<dyn CaptureDevice>,
    sink: Arc<dyn SegmentSink>,
    window: Duration,
    active: Arc<AtomicBool>,
    shared: Arc<RecorderShared>,
    countdown: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl SegmentRecorder {
    pub fn new(device: Box<dyn CaptureDevice>, sink: Arc<dyn SegmentSink>, window: Duration) -> Self {
        info!(
            "Segment recorder initialized: {} ({}s segments)",
            device.name(),
            window.as_secs_f64()
        );

        Self {
            device,
            sink,
            window,
            active: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(RecorderShared::new()),
            countdown: None,
            task: None,
        }
    }

    /// Acquire the device and start the segment loop
    ///
    /// On acquisition failure the recorder stays inactive; nothing retries.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.active.load(Ordering::SeqCst) {
            warn!("Recording already active");
            return Ok(());
        }

        // A loop that ended on its own (stream closed) still holds the device.
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Segment loop panicked: {}", e);
            }
            self.device.release();
        }

        let format = SegmentFormat::select(&self.device.supported_formats());
        let handle = self.device.acquire().await?;

        self.active.store(true, Ordering::SeqCst);

        let countdown = CancellationToken::new();
        self.countdown = Some(countdown.clone());

        self.task = Some(tokio::spawn(run_segments(
            handle,
            format,
            self.window,
            Arc::clone(&self.active),
            Arc::clone(&self.shared),
            Arc::clone(&self.sink),
            countdown,
        )));

        info!(
            "Recording started on {} ({})",
            self.device.name(),
            format.mime_type()
        );

        Ok(())
    }

    /// Stop recording and release the device. Safe to call when idle.
    pub async fn stop(&mut self) {
        // Flag first, so a segment finalizing right now does not restart.
        let was_active = self.active.swap(false, Ordering::SeqCst);

        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Segment loop panicked: {}", e);
            }
        }

        self.device.release();

        if was_active {
            info!("Recording stopped");
        }
    }

    /// Flip between recording and stopped; returns the new active state
    pub async fn toggle(&mut self) -> Result<bool, CaptureError> {
        if self.is_active() {
            self.stop().await;
            Ok(false)
        } else {
            self.start().await?;
            Ok(true)
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> RecorderState {
        self.shared.state()
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            state: self.shared.state(),
            is_active: self.is_active(),
            segments_emitted: self.shared.segments_emitted.load(Ordering::SeqCst),
            empty_segments: self.shared.empty_segments.load(Ordering::SeqCst),
            peak_open_segments: self.shared.gauge.peak.load(Ordering::SeqCst),
        }
    }
}

impl Drop for SegmentRecorder {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
        self.device.release();
    }
}

async fn run_segments(
    mut handle: CaptureHandle,
    format: SegmentFormat,
    window: Duration,
    active: Arc<AtomicBool>,
    shared: Arc<RecorderShared>,
    sink: Arc<dyn SegmentSink>,
    stop: CancellationToken,
) {
    loop {
        let index = shared.next_index.fetch_add(1, Ordering::SeqCst);
        shared.set_state(RecorderState::SegmentActive { index });

        let mut writer = SegmentWriter::open(index, format, Arc::clone(&shared));
        let countdown = tokio::time::sleep(window);
        tokio::pin!(countdown);

        let end = loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break SegmentEnd::Stopped,
                _ = &mut countdown => break SegmentEnd::WindowElapsed,
                frame = handle.recv() => match frame {
                    Some(frame) => writer.write_frame(&frame),
                    None => break SegmentEnd::StreamClosed,
                },
            }
        };

        shared.set_state(RecorderState::Stopping);
        finalize(writer, &shared, sink.as_ref());

        // Restart only here, once the previous writer is closed.
        if end != SegmentEnd::WindowElapsed || !active.load(Ordering::SeqCst) {
            if end == SegmentEnd::StreamClosed {
                warn!("Capture stream ended; recording stopped");
            }
            break;
        }
    }

    active.store(false, Ordering::SeqCst);
    handle.release();
    shared.set_state(RecorderState::Idle);
}

fn finalize(writer: SegmentWriter, shared: &RecorderShared, sink: &dyn SegmentSink) {
    let index = writer.index;

    let segment = match writer.finish() {
        Ok(segment) => segment,
        Err(e) => {
            error!("Failed to encode segment {}: {}", index, e);
            return;
        }
    };

    match segment.normalized() {
        Some(segment) => {
            info!(
                "Segment {} complete: {:.1}s ({} bytes)",
                segment.index,
                segment.duration_ms as f64 / 1000.0,
                segment.payload.len()
            );
            shared.segments_emitted.fetch_add(1, Ordering::SeqCst);
            sink.dispatch(segment);
        }
        None => {
            debug!("Segment {} captured no audio; skipping", index);
            shared.empty_segments.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection_prefers_pcm() {
        assert_eq!(
            SegmentFormat::select(&[SegmentFormat::FloatWav, SegmentFormat::Pcm16Wav]),
            SegmentFormat::Pcm16Wav
        );
        assert_eq!(
            SegmentFormat::select(&[SegmentFormat::FloatWav]),
            SegmentFormat::FloatWav
        );
        assert_eq!(SegmentFormat::select(&[]), SegmentFormat::FloatWav);
    }

    #[test]
    fn test_normalize_mime_strips_codec_parameters() {
        assert_eq!(normalize_mime("audio/wav;codecs=1"), Some("audio/wav"));
        assert_eq!(normalize_mime("audio/webm; codecs=opus"), Some("audio/webm"));
        assert_eq!(normalize_mime("video/webm"), Some("audio/webm"));
        assert_eq!(normalize_mime("AUDIO/X-WAV"), Some("audio/wav"));
        assert_eq!(normalize_mime(""), None);
        assert_eq!(normalize_mime("text/plain"), None);
    }

    #[test]
    fn test_empty_segment_is_invalid() {
        let segment = AudioSegment {
            index: 0,
            payload: Vec::new(),
            mime_type: "audio/wav".to_string(),
            captured_at: Utc::now(),
            duration_ms: 0,
            sample_count: 0,
        };
        assert!(!segment.is_valid());
        assert!(segment.normalized().is_none());
    }

    #[test]
    fn test_writer_produces_complete_wav() {
        let shared = Arc::new(RecorderShared::new());
        let mut writer = SegmentWriter::open(3, SegmentFormat::Pcm16Wav, Arc::clone(&shared));
        writer.write_frame(&AudioFrame {
            samples: vec![100; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        });

        assert_eq!(shared.gauge.current.load(Ordering::SeqCst), 1);
        let segment = writer.finish().unwrap();
        assert_eq!(shared.gauge.current.load(Ordering::SeqCst), 0);

        assert_eq!(segment.index, 3);
        assert_eq!(segment.duration_ms, 100);
        assert_eq!(&segment.payload[0..4], b"RIFF");
        assert_eq!(&segment.payload[8..12], b"WAVE");
        assert_eq!(segment.file_name(), "segment-003.wav");
        assert!(segment.is_valid());
    }
}
