pub mod file_storage;
#[cfg(test)]
pub mod memory_storage;
pub mod recorder;
pub mod storage;
pub mod types;

pub use file_storage::FileTranscriptStore;
pub use recorder::TranscriptRecorder;
pub use storage::{TranscriptSink, TranscriptStore};
pub use types::TranscriptHeader;
