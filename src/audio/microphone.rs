// cpal-based microphone capture
//
// cpal streams are not Send on every platform, so the stream lives on a
// dedicated thread for the lifetime of the handle.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice, CaptureError, CaptureHandle};
use super::file::resample_linear;

pub struct MicrophoneDevice {
    constraints: CaptureConstraints,
    tracks: Option<CancellationToken>,
}

impl MicrophoneDevice {
    pub fn new(constraints: CaptureConstraints) -> Self {
        Self {
            constraints,
            tracks: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for MicrophoneDevice {
    async fn acquire(&mut self) -> Result<CaptureHandle, CaptureError> {
        if self.is_capturing() {
            return Err(CaptureError::AlreadyAcquired);
        }

        let (tx, rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = oneshot::channel();
        let tracks = CancellationToken::new();
        let stop = tracks.clone();
        let constraints = self.constraints.clone();

        // The thread owns the stream and exits on its own once `tracks` is
        // cancelled, so it is never joined.
        std::thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || run_capture(constraints, tx, stop, ready_tx))
            .map_err(|e| CaptureError::Backend(format!("Failed to spawn capture thread: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(CaptureError::Backend("capture thread exited early".to_string()));
            }
        }

        self.tracks = Some(tracks.clone());
        Ok(CaptureHandle::new(rx, tracks))
    }

    fn release(&mut self) {
        if let Some(tracks) = self.tracks.take() {
            tracks.cancel();
            info!("Microphone released");
        }
    }

    fn is_capturing(&self) -> bool {
        self.tracks.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneDevice {
    fn drop(&mut self) {
        self.release();
    }
}

fn classify(message: String) -> CaptureError {
    if message.to_lowercase().contains("permission") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Backend(message)
    }
}

fn run_capture(
    constraints: CaptureConstraints,
    tx: mpsc::Sender<AudioFrame>,
    stop: CancellationToken,
    ready: oneshot::Sender<Result<(), CaptureError>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready.send(Err(CaptureError::DeviceUnavailable));
        return;
    };

    info!(
        "Audio input device: {} (echo_cancellation={}, noise_suppression={})",
        device.name().unwrap_or_default(),
        constraints.echo_cancellation,
        constraints.noise_suppression
    );

    let config = match device.default_input_config() {
        Ok(config) => config,
        Err(cpal::DefaultStreamConfigError::DeviceNotAvailable) => {
            let _ = ready.send(Err(CaptureError::DeviceUnavailable));
            return;
        }
        Err(e) => {
            let _ = ready.send(Err(classify(e.to_string())));
            return;
        }
    };

    let native_rate = config.sample_rate().0;
    let native_channels = config.channels() as usize;

    let out_rate = constraints.sample_rate;

    let started = Instant::now();
    let push = move |mono: Vec<i16>| {
        let frame = AudioFrame {
            samples: resample_linear(mono, native_rate, out_rate),
            sample_rate: out_rate,
            channels: 1,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };
        if tx.try_send(frame).is_err() {
            warn!("Capture channel full; dropping frame");
        }
    };

    let err_fn = |err| error!("Microphone stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[f32], _: &_| {
                let mono = data
                    .chunks(native_channels.max(1))
                    .map(|frame| {
                        let avg = frame.iter().sum::<f32>() / frame.len() as f32;
                        (avg.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                    })
                    .collect();
                push(mono);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[i16], _: &_| {
                let mono = data
                    .chunks(native_channels.max(1))
                    .map(|frame| {
                        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                        (sum / frame.len() as i32) as i16
                    })
                    .collect();
                push(mono);
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready.send(Err(CaptureError::Backend(format!(
                "Unsupported sample format: {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(cpal::BuildStreamError::DeviceNotAvailable) => {
            let _ = ready.send(Err(CaptureError::DeviceUnavailable));
            return;
        }
        Err(e) => {
            let _ = ready.send(Err(classify(e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(classify(e.to_string())));
        return;
    }

    info!("Microphone capture started: {}Hz -> {}Hz mono", native_rate, out_rate);
    let _ = ready.send(Ok(()));

    while !stop.is_cancelled() {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    info!("Microphone capture stopped");
}
