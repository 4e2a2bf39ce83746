//! Opus encode stage.
//!
//! An [`EncodeEngine`] turns a comment list and [`EncoderParams`] into a
//! [`PcmEncoder`] that accepts interleaved `f32` frames. Dropping an encoder
//! releases it; [`PcmEncoder::drain`] flushes buffered audio and finishes the
//! stream first.

mod ogg_opus;
mod resample;

use std::path::Path;

pub use ogg_opus::{OggOpusEncoder, OggOpusEngine};

use crate::error::EncodeError;
use crate::settings::FrameDuration;

/// Vendor string written to the comment header.
pub const VENDOR: &str = concat!("modopus ", env!("CARGO_PKG_VERSION"));

/// Stream parameters for a new encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderParams {
    /// Rate of the PCM handed to [`PcmEncoder::write_float`].
    pub sample_rate: u32,
    pub channels: usize,
    pub frame_duration: FrameDuration,
}

/// Vorbis-style comment list for the output header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpusComments {
    vendor: String,
    entries: Vec<(String, String)>,
}

impl Default for OpusComments {
    fn default() -> Self {
        Self::new(VENDOR)
    }
}

impl OpusComments {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            entries: Vec::new(),
        }
    }

    /// Append `key=value`.
    ///
    /// Keys must be non-empty printable ASCII (0x20..=0x7D) without `=`.
    pub fn add(&mut self, key: &str, value: &str) -> Result<(), EncodeError> {
        let key_ok = !key.is_empty()
            && key
                .bytes()
                .all(|b| (0x20..=0x7D).contains(&b) && b != b'=');
        if !key_ok {
            return Err(EncodeError::InvalidCommentKey(key.to_string()));
        }
        if key.len() + 1 + value.len() > u32::MAX as usize {
            return Err(EncodeError::CommentTooLong(key.to_string()));
        }
        self.entries.push((key.to_string(), value.to_string()));
        Ok(())
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

/// Factory for encoders writing to files.
pub trait EncodeEngine {
    fn create_comments(&self) -> OpusComments {
        OpusComments::default()
    }

    /// Add one `key=value` entry to `comments`.
    fn add_comment(
        &self,
        comments: &mut OpusComments,
        key: &str,
        value: &str,
    ) -> Result<(), EncodeError> {
        comments.add(key, value)
    }

    /// Create `path` and write the stream headers into it.
    fn create_file_encoder(
        &self,
        path: &Path,
        comments: &OpusComments,
        params: &EncoderParams,
    ) -> Result<Box<dyn PcmEncoder>, EncodeError>;
}

/// An open encoder.
pub trait PcmEncoder {
    /// Encode `frames` interleaved frames from the front of `samples`.
    fn write_float(&mut self, samples: &[f32], frames: usize) -> Result<(), EncodeError>;

    /// Flush buffered audio and finish the stream.
    fn drain(self: Box<Self>) -> Result<(), EncodeError>;
}
