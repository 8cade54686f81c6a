use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::segment::SegmentFormat;
use crate::config::AudioConfig;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Capture parameters requested from the platform
///
/// Defaults favor speech transcription: echo cancellation and noise
/// suppression on, 16kHz mono.
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// Target sample rate (will resample if needed)
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Frame size in milliseconds (affects latency)
    pub frame_duration_ms: u64,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 16000,     // 16kHz for Whisper
            channels: 1,            // Mono
            frame_duration_ms: 100, // 100ms frames
        }
    }
}

impl From<&AudioConfig> for CaptureConstraints {
    fn from(config: &AudioConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            sample_rate: config.sample_rate,
            channels: config.channels,
            frame_duration_ms: config.frame_duration_ms,
        }
    }
}

/// Microphone acquisition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no audio input device available")]
    DeviceUnavailable,

    #[error("capture device is already in use")]
    AlreadyAcquired,

    #[error("capture backend error: {0}")]
    Backend(String),
}

/// A live capture: the frame stream plus the switch that stops its tracks
pub struct CaptureHandle {
    frames: mpsc::Receiver<AudioFrame>,
    tracks: CancellationToken,
}

impl CaptureHandle {
    pub fn new(frames: mpsc::Receiver<AudioFrame>, tracks: CancellationToken) -> Self {
        Self { frames, tracks }
    }

    /// Next frame, or `None` once the device stream has ended
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.frames.recv().await
    }

    /// Stop every underlying track. Calling this more than once is a no-op.
    pub fn release(&self) {
        if !self.tracks.is_cancelled() {
            self.tracks.cancel();
        }
    }

    pub fn is_released(&self) -> bool {
        self.tracks.is_cancelled()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Audio capture device trait
///
/// Implementations:
/// - Microphone: cpal default input device (feature `microphone`)
/// - File: replay a recorded file at real-time pace (dry runs, tests)
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device and start streaming frames
    ///
    /// Only one handle may be live at a time; a second acquire before
    /// `release` fails with `CaptureError::AlreadyAcquired`.
    async fn acquire(&mut self) -> Result<CaptureHandle, CaptureError>;

    /// Stop all tracks of the live handle, if any. Idempotent.
    fn release(&mut self);

    /// Check if a handle is currently live
    fn is_capturing(&self) -> bool;

    /// Segment container formats this device's audio can be encoded as
    fn supported_formats(&self) -> Vec<SegmentFormat> {
        SegmentFormat::PREFERENCE.to_vec()
    }

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Where captured audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSource {
    /// Default system microphone
    Microphone,
    /// Replay of an audio file
    File(PathBuf),
}

impl std::str::FromStr for DeviceSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("microphone") || s.eq_ignore_ascii_case("mic") {
            Ok(DeviceSource::Microphone)
        } else {
            Ok(DeviceSource::File(PathBuf::from(s)))
        }
    }
}

/// Capture device factory
pub struct DeviceFactory;

impl DeviceFactory {
    /// Create capture device based on source and constraints
    pub fn create(
        source: DeviceSource,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        match source {
            DeviceSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    use super::microphone::MicrophoneDevice;
                    Ok(Box::new(MicrophoneDevice::new(constraints)))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    let _ = constraints;
                    Err(CaptureError::Backend(
                        "built without the `microphone` feature".to_string(),
                    ))
                }
            }

            DeviceSource::File(path) => {
                use super::file::FileDevice;
                Ok(Box::new(FileDevice::new(path, constraints)))
            }
        }
    }
}
