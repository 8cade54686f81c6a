use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice, CaptureError, CaptureHandle};

/// Fully decoded audio, interleaved i16 PCM
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        Self::decode(mss, hint, path.display().to_string())
    }

    /// Decode an in-memory file, e.g. a recorded segment payload
    pub fn from_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<Self> {
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
        Self::decode(mss, hint, "<memory>".to_string())
    }

    fn decode(mss: MediaSourceStream, hint: Hint, label: String) -> Result<Self> {
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("Unsupported or corrupt audio container")?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No decodable audio track")?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .context("Audio track has no sample rate")?;
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1) as u16;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        let mut samples: Vec<i16> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            }
        }

        let duration_seconds =
            samples.len() as f64 / (sample_rate as f64 * channels.max(1) as f64);

        info!(
            "Audio decoded: {} ({:.1}s, {}Hz, {} channels, {} samples)",
            label,
            duration_seconds,
            sample_rate,
            channels,
            samples.len()
        );

        Ok(Self {
            path: label,
            duration_seconds,
            sample_rate,
            channels,
            samples,
        })
    }

    /// Downmix to mono and resample (linear interpolation) to `target_rate`
    pub fn to_mono(&self, target_rate: u32) -> Vec<i16> {
        let channels = self.channels.max(1) as usize;
        let mono: Vec<i16> = if channels == 1 {
            self.samples.clone()
        } else {
            self.samples
                .chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        resample_linear(mono, self.sample_rate, target_rate)
    }
}

/// Resample mono PCM from `from_rate` to `to_rate` by linear interpolation
pub fn resample_linear(mono: Vec<i16>, from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || mono.is_empty() {
        return mono;
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (mono.len() as f64 / ratio).floor() as usize;
    let last = mono.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = pos - idx as f64;
            let a = mono[idx.min(last)] as f64;
            let b = mono[(idx + 1).min(last)] as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

/// Replays an audio file as if it were a live microphone
///
/// Frames are paced in real time, so a segment window of 11s holds 11s of
/// the file. The stream ends when the file is exhausted.
pub struct FileDevice {
    path: PathBuf,
    constraints: CaptureConstraints,
    tracks: Option<CancellationToken>,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>, constraints: CaptureConstraints) -> Self {
        Self {
            path: path.into(),
            constraints,
            tracks: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FileDevice {
    async fn acquire(&mut self) -> Result<CaptureHandle, CaptureError> {
        if self.is_capturing() {
            return Err(CaptureError::AlreadyAcquired);
        }

        if !self.path.exists() {
            return Err(CaptureError::DeviceUnavailable);
        }

        let audio =
            AudioFile::open(&self.path).map_err(|e| CaptureError::Backend(format!("{:#}", e)))?;

        let sample_rate = self.constraints.sample_rate;
        let samples = audio.to_mono(sample_rate);
        let frame_ms = self.constraints.frame_duration_ms.max(1);
        let frame_len = ((sample_rate as u64 * frame_ms) / 1000).max(1) as usize;

        let (tx, rx) = mpsc::channel(64);
        let tracks = CancellationToken::new();
        let stop = tracks.clone();
        let label = self.path.display().to_string();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for (i, chunk) in samples.chunks(frame_len).enumerate() {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels: 1,
                    timestamp_ms: i as u64 * frame_ms,
                };

                if tx.send(frame).await.is_err() {
                    break;
                }
            }

            debug!("File replay finished: {}", label);
        });

        info!(
            "Replaying {} as capture device ({:.1}s)",
            self.path.display(),
            audio.duration_seconds
        );

        self.tracks = Some(tracks.clone());
        Ok(CaptureHandle::new(rx, tracks))
    }

    fn release(&mut self) {
        if let Some(tracks) = self.tracks.take() {
            tracks.cancel();
            debug!("Released file device: {}", self.path.display());
        }
    }

    fn is_capturing(&self) -> bool {
        self.tracks.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn name(&self) -> &str {
        "file"
    }
}
