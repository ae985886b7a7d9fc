//! creditwipe media - FFmpeg integration for video I/O
//!
//! This crate handles:
//! - Frame sources (FFmpeg single-frame decoding, in-memory frames)
//! - Media file probing
//! - The bounded frame cache in front of the decode cursor
//! - Output sinks, export progress and cancellation

pub mod decoder;
pub mod export;
pub mod frame_cache;
pub mod probe;
pub mod source;

pub use decoder::FfmpegSource;
pub use export::{
    ExportCancel, ExportProgress, ExportStep, ExportTarget, FfmpegSink, FrameWriter, MemorySink,
    OutputSink, VideoCodec, STEPS_PER_FRAME,
};
pub use frame_cache::FrameCache;
pub use probe::probe;
pub use source::{MemorySource, VideoInfo, VideoSource};
