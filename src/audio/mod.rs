pub mod backend;
pub mod file;
pub mod segment;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{
    AudioFrame, CaptureConstraints, CaptureDevice, CaptureError, CaptureHandle, DeviceFactory,
    DeviceSource,
};
pub use file::{resample_linear, AudioFile, FileDevice};
pub use segment::{
    normalize_mime, AudioSegment, RecorderState, RecorderStats, SegmentFormat, SegmentRecorder,
    SegmentSink,
};
