// Unit tests for capture device abstractions
//
// These tests verify the core capture types and the file-backed device.

mod common;

use interview_capture::audio::{
    AudioFrame, CaptureConstraints, CaptureDevice, CaptureError, CaptureHandle, DeviceFactory,
    DeviceSource, FileDevice, SegmentFormat,
};
use interview_capture::config::AudioConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn write_tone(seconds: u32, sample_rate: u32, channels: u16) -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(file.path(), spec).unwrap();
    for i in 0..(seconds * sample_rate) {
        let sample = ((i % 100) as i16 - 50) * 200;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
    file
}

#[test]
fn test_audio_frame_clone() {
    let frame = AudioFrame {
        samples: vec![1, 2, 3, 4, 5],
        sample_rate: 48000,
        channels: 2,
        timestamp_ms: 500,
    };

    let cloned = frame.clone();

    assert_eq!(frame.samples, cloned.samples);
    assert_eq!(frame.sample_rate, cloned.sample_rate);
    assert_eq!(frame.channels, cloned.channels);
    assert_eq!(frame.timestamp_ms, cloned.timestamp_ms);
}

#[test]
fn test_capture_constraints_default() {
    let constraints = CaptureConstraints::default();

    assert!(constraints.echo_cancellation, "Echo cancellation should be on");
    assert!(constraints.noise_suppression, "Noise suppression should be on");
    assert_eq!(constraints.sample_rate, 16000, "Default should be 16kHz");
    assert_eq!(constraints.channels, 1, "Default should be mono");
    assert_eq!(constraints.frame_duration_ms, 100, "Default frame should be 100ms");
}

#[test]
fn test_capture_constraints_from_config() {
    let config = AudioConfig {
        sample_rate: 48000,
        channels: 2,
        echo_cancellation: false,
        noise_suppression: true,
        frame_duration_ms: 20,
    };

    let constraints = CaptureConstraints::from(&config);

    assert_eq!(constraints.sample_rate, 48000);
    assert_eq!(constraints.channels, 2);
    assert!(!constraints.echo_cancellation);
    assert_eq!(constraints.frame_duration_ms, 20);
}

#[test]
fn test_device_source_parsing() {
    assert_eq!("microphone".parse::<DeviceSource>().unwrap(), DeviceSource::Microphone);
    assert_eq!("mic".parse::<DeviceSource>().unwrap(), DeviceSource::Microphone);
    assert_eq!(
        "answers/take1.wav".parse::<DeviceSource>().unwrap(),
        DeviceSource::File(PathBuf::from("answers/take1.wav"))
    );
}

#[test]
fn test_factory_builds_file_device() {
    let device = DeviceFactory::create(
        DeviceSource::File(PathBuf::from("answer.wav")),
        CaptureConstraints::default(),
    )
    .unwrap();

    assert_eq!(device.name(), "file");
    assert!(!device.is_capturing());
    assert_eq!(device.supported_formats(), SegmentFormat::PREFERENCE.to_vec());
}

#[tokio::test]
async fn test_capture_handle_release_is_idempotent() {
    let (_tx, rx) = mpsc::channel::<AudioFrame>(1);
    let tracks = CancellationToken::new();
    let handle = CaptureHandle::new(rx, tracks.clone());

    assert!(!handle.is_released());
    handle.release();
    handle.release();
    assert!(handle.is_released());
    assert!(tracks.is_cancelled());
}

#[tokio::test]
async fn test_dropping_handle_stops_tracks() {
    let (_tx, rx) = mpsc::channel::<AudioFrame>(1);
    let tracks = CancellationToken::new();

    drop(CaptureHandle::new(rx, tracks.clone()));

    assert!(tracks.is_cancelled());
}

#[tokio::test]
async fn test_file_device_missing_file() {
    let mut device = FileDevice::new("/nonexistent/answer.wav", CaptureConstraints::default());

    let result = device.acquire().await;

    assert!(matches!(result, Err(CaptureError::DeviceUnavailable)));
    assert!(!device.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn test_file_device_streams_mono_frames_until_exhausted() {
    let file = write_tone(1, 16000, 2);
    let mut device = FileDevice::new(file.path(), CaptureConstraints::default());

    let mut handle = device.acquire().await.unwrap();
    assert!(device.is_capturing());

    let mut frames = Vec::new();
    while let Some(frame) = handle.recv().await {
        frames.push(frame);
    }

    assert_eq!(frames.len(), 10, "1s of audio in 100ms frames");
    assert!(frames.iter().all(|f| f.channels == 1 && f.sample_rate == 16000));
    assert!(frames.iter().all(|f| f.samples.len() == 1600));
    assert_eq!(frames[3].timestamp_ms, 300);
}

#[tokio::test(start_paused = true)]
async fn test_file_device_rejects_second_acquire() {
    let file = write_tone(2, 16000, 1);
    let mut device = FileDevice::new(file.path(), CaptureConstraints::default());

    let _handle = device.acquire().await.unwrap();
    let second = device.acquire().await;
    assert!(matches!(second, Err(CaptureError::AlreadyAcquired)));

    device.release();
    device.release();
    assert!(!device.is_capturing());

    let again = device.acquire().await;
    assert!(again.is_ok(), "Device should be acquirable after release");
}

#[tokio::test(start_paused = true)]
async fn test_file_device_release_ends_stream() {
    let file = write_tone(5, 16000, 1);
    let mut device = FileDevice::new(file.path(), CaptureConstraints::default());

    let mut handle = device.acquire().await.unwrap();
    assert!(handle.recv().await.is_some());

    device.release();

    let drained = tokio::time::timeout(Duration::from_secs(1), async {
        let mut count = 0;
        while handle.recv().await.is_some() {
            count += 1;
        }
        count
    })
    .await
    .expect("stream should end after release");

    assert!(drained < 49, "Replay should stop early, got {} frames", drained);
}

#[tokio::test]
async fn test_scripted_device_permission_denied() {
    let (mut device, probe) = common::ScriptedDevice::failing(CaptureError::PermissionDenied);

    let result = device.acquire().await;

    assert!(matches!(result, Err(CaptureError::PermissionDenied)));
    assert_eq!(probe.acquisitions.load(std::sync::atomic::Ordering::SeqCst), 0);
}
