pub mod buffer;
pub mod uploader;

pub use buffer::{BufferError, ResponseBuffer, SharedBuffer};
pub use uploader::{TranscriptionUploader, UploadError};
