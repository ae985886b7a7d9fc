//! Error types for creditwipe.

use thiserror::Error;

/// Main error type for creditwipe operations.
///
/// Pixel operations never fail; every variant here comes from an I/O-adjacent
/// step (decoding, encoding, configuration) or from a request made in the
/// wrong state.
#[derive(Error, Debug)]
pub enum WipeError {
    /// The decoder rejected a seek or read.
    #[error("invalid frame number: {index} (video has {frame_count} frames)")]
    InvalidFrameIndex { index: usize, frame_count: usize },

    /// A pipeline stage could not load its frame.
    #[error("loading frame {index}: {source}")]
    FrameLoad {
        index: usize,
        #[source]
        source: Box<WipeError>,
    },

    /// Display or export was requested before any mask was rendered.
    #[error("no mask has been rendered yet")]
    MaskUnavailable,

    #[error("cannot open output: {0}")]
    SinkOpen(String),

    #[error("cannot write output: {0}")]
    SinkWrite(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("export cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WipeError {
    /// Wrap a frame cache failure with the index that was being loaded.
    pub fn frame_load(index: usize, source: WipeError) -> Self {
        Self::FrameLoad {
            index,
            source: Box::new(source),
        }
    }

    /// True if this error (or the error it wraps) is a rejected frame index.
    pub fn is_invalid_frame(&self) -> bool {
        match self {
            Self::InvalidFrameIndex { .. } => true,
            Self::FrameLoad { source, .. } => source.is_invalid_frame(),
            _ => false,
        }
    }
}

/// Result type alias for creditwipe operations.
pub type Result<T> = std::result::Result<T, WipeError>;
