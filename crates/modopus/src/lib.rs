//! Batch transcoder from tracker modules to Ogg Opus.
//!
//! A module is rendered to interleaved stereo `f32` by a [`decode::DecodeEngine`]
//! and streamed into an [`encode::EncodeEngine`] one transfer buffer at a time.
//! [`pipeline::TranscodePipeline`] runs that for each input file independently.

pub mod comments;
pub mod decode;
pub mod encode;
pub mod error;
pub mod path;
pub mod pipeline;
pub mod report;
pub mod settings;

pub use comments::{CommentKind, CommentSet};
pub use error::{DecodeError, EncodeError, TranscodeError};
pub use path::PathParts;
pub use pipeline::{FileOutcome, RunSummary, TranscodePipeline};
pub use settings::{CommentOverrides, FrameDuration, RenderSettings, TranscodeConfig};
