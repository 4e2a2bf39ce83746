//! Module decode stage.
//!
//! A [`DecodeEngine`] opens module bytes into a [`ModuleDecoder`], which renders
//! interleaved stereo `f32` PCM on demand and answers metadata queries.
//!
//! [`LibOpenMptEngine`] renders every format libopenmpt knows; tests plug in
//! their own engines through the same traits.

mod libopenmpt;

pub use libopenmpt::LibOpenMptEngine;

use crate::error::DecodeError;

/// Delimiter used by engines for list-valued strings (keys, extensions).
pub const LIST_DELIMITER: char = ';';

/// Render parameters a module handle accepts after opening.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderParam {
    /// Interpolation filter length in taps; 0 selects the engine default.
    InterpolationFilterLength(u32),
    /// Master gain in millibel.
    MasterGainMillibel(i32),
}

impl RenderParam {
    /// Human readable name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            RenderParam::InterpolationFilterLength(_) => "interpolation param",
            RenderParam::MasterGainMillibel(_) => "master gain",
        }
    }
}

/// Factory for module handles.
pub trait DecodeEngine {
    /// Parse `data` into a playable module.
    fn open(&self, data: &[u8]) -> Result<Box<dyn ModuleDecoder>, DecodeError>;

    /// Whether files with extension `ext` (no leading dot) can be opened.
    fn is_extension_supported(&self, ext: &str) -> bool;

    /// All supported extensions, in engine order.
    fn supported_extensions(&self) -> Vec<String>;
}

/// An opened module; released when dropped.
pub trait ModuleDecoder {
    /// Number of additional plays after the first.
    fn set_repeat_count(&mut self, count: u32) -> Result<(), DecodeError>;

    fn set_render_param(&mut self, param: RenderParam) -> Result<(), DecodeError>;

    /// Render up to `buffer.len() / 2` interleaved stereo frames at `sample_rate`.
    ///
    /// Returns the number of frames written; 0 signals the end of the song.
    fn read_interleaved_stereo(&mut self, sample_rate: u32, buffer: &mut [f32]) -> usize;

    /// Metadata keys the module can answer.
    fn metadata_keys(&self) -> Vec<String>;

    /// Metadata value for `key`, `None` when the key is unknown.
    fn metadata(&self, key: &str) -> Result<Option<String>, DecodeError>;

    /// Names of the module's subsongs, one entry per subsong.
    fn subsong_names(&self) -> Vec<String>;
}

/// The engine used when nothing else is requested.
pub fn default_engine() -> Box<dyn DecodeEngine> {
    Box::new(LibOpenMptEngine)
}

/// Join a list the way engines present list-valued strings.
pub fn join_list(items: &[String]) -> String {
    items.join(LIST_DELIMITER.to_string().as_str())
}

/// Split an engine list string, dropping empty entries.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(LIST_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
