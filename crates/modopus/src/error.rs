//! Error taxonomy for the transcoder.
//!
//! [`TranscodeError::InvalidOption`] is fatal to the whole run; every other
//! variant aborts a single input file and the run moves on to the next one.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a decode engine or one of its module handles.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input bytes are not a module the engine understands.
    #[error("unrecognized module data: {0}")]
    Format(String),

    /// The engine refused a render or playback parameter.
    #[error("engine rejected {param} = {value}")]
    Rejected { param: &'static str, value: i64 },

    /// The engine failed to answer a metadata query.
    #[error("metadata query for '{0}' failed")]
    Metadata(String),
}

/// Failure reported by an encode engine or one of its encoder handles.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A comment key cannot be stored as a vorbis-style comment field.
    #[error("invalid comment key '{0}'")]
    InvalidCommentKey(String),

    /// A comment does not fit in the 32-bit length fields of the tag header.
    #[error("comment '{0}' is too long")]
    CommentTooLong(String),

    /// Encoder parameters outside what the codec accepts.
    #[error("unsupported encoder parameter: {0}")]
    BadArgument(String),

    #[error(transparent)]
    Opus(#[from] opus::Error),

    #[error("resampler: {0}")]
    Resample(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the transcoding pipeline.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// A command-line value is out of range. Fatal for the whole run.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("path too long ({len} > {max} bytes)")]
    PathTooLong { len: usize, max: usize },

    #[error("file name too long ({len} > {max} bytes)")]
    NameTooLong { len: usize, max: usize },

    /// The input path has no file stem to derive an output name from.
    #[error("input path has no base name")]
    NoBaseName,

    #[error(
        "file type not compatible with the decode engine (extension: {})",
        .0.as_deref().unwrap_or("none")
    )]
    UnsupportedExtension(Option<String>),

    #[error("failed opening module: {0}")]
    DecoderOpenFailed(String),

    #[error("failed setting {what}")]
    DecoderConfigFailed {
        what: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("failed building comments")]
    CommentBuildFailed(#[source] DecodeError),

    #[error("failed adding comment")]
    EncoderCommentsFailed(#[source] EncodeError),

    #[error("failed creating opus encoder for {}", path.display())]
    EncoderCreateFailed {
        path: PathBuf,
        #[source]
        source: EncodeError,
    },

    #[error("failed writing opus data")]
    TransferWriteFailed(#[source] EncodeError),
}

impl TranscodeError {
    /// Whether this error stops the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranscodeError::InvalidOption(_))
    }
}
