//! Render parameters and the run-wide transcoder configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TranscodeError;

/// Interleaved channels rendered and encoded.
pub const CHANNELS: usize = 2;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Opus frame duration classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrameDuration {
    Ms2_5,
    Ms5,
    Ms10,
    #[default]
    Ms20,
    Ms40,
    Ms60,
}

impl FrameDuration {
    pub const ALL: [FrameDuration; 6] = [
        FrameDuration::Ms2_5,
        FrameDuration::Ms5,
        FrameDuration::Ms10,
        FrameDuration::Ms20,
        FrameDuration::Ms40,
        FrameDuration::Ms60,
    ];

    /// Duration in tenths of a millisecond.
    pub fn tenths_ms(self) -> u32 {
        match self {
            FrameDuration::Ms2_5 => 25,
            FrameDuration::Ms5 => 50,
            FrameDuration::Ms10 => 100,
            FrameDuration::Ms20 => 200,
            FrameDuration::Ms40 => 400,
            FrameDuration::Ms60 => 600,
        }
    }

    pub fn seconds(self) -> f64 {
        f64::from(self.tenths_ms()) / 10_000.0
    }
}

impl fmt::Display for FrameDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tenths = self.tenths_ms();
        if tenths % 10 == 0 {
            write!(f, "{}", tenths / 10)
        } else {
            write!(f, "{}.{}", tenths / 10, tenths % 10)
        }
    }
}

impl FromStr for FrameDuration {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            TranscodeError::InvalidOption(format!(
                "frame size must be one of 2.5, 5, 10, 20, 40, 60 (got '{s}')"
            ))
        };
        let ms: f64 = s.trim().parse().map_err(|_| invalid())?;
        Self::ALL
            .into_iter()
            .find(|d| (d.seconds() * 1000.0 - ms).abs() < 1e-9)
            .ok_or_else(invalid)
    }
}

/// Frames per transfer buffer: `floor(sample_rate * duration)`.
pub fn resolve_buffer_size(sample_rate: u32, frame_duration: FrameDuration) -> usize {
    (u64::from(sample_rate) * u64::from(frame_duration.tenths_ms()) / 10_000) as usize
}

/// Render/encode parameters shared read-only by every file of a run.
///
/// The buffer size is recomputed whenever the sample rate or frame duration
/// changes, so it is always consistent with both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderSettings {
    frame_duration: FrameDuration,
    sample_rate: u32,
    buffer_frames: usize,
    repeat_count: u32,
    interpolation: u32,
    gain_millibel: i32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let frame_duration = FrameDuration::default();
        Self {
            frame_duration,
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: resolve_buffer_size(DEFAULT_SAMPLE_RATE, frame_duration),
            repeat_count: 0,
            interpolation: 0,
            gain_millibel: 0,
        }
    }
}

impl RenderSettings {
    pub fn frame_duration(&self) -> FrameDuration {
        self.frame_duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames read from the decoder per transfer cycle.
    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    pub fn channels(&self) -> usize {
        CHANNELS
    }

    /// Additional plays after the first.
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Interpolation filter length; 0 is the engine default.
    pub fn interpolation(&self) -> u32 {
        self.interpolation
    }

    pub fn gain_millibel(&self) -> i32 {
        self.gain_millibel
    }

    pub fn set_frame_duration(&mut self, frame_duration: FrameDuration) {
        self.frame_duration = frame_duration;
        self.buffer_frames = resolve_buffer_size(self.sample_rate, frame_duration);
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), TranscodeError> {
        if sample_rate == 0 {
            return Err(TranscodeError::InvalidOption(
                "sample rate must be a positive integer".into(),
            ));
        }
        self.sample_rate = sample_rate;
        self.buffer_frames = resolve_buffer_size(sample_rate, self.frame_duration);
        Ok(())
    }

    pub fn set_repeat_count(&mut self, count: i64) -> Result<(), TranscodeError> {
        self.repeat_count = non_negative("repeat count", count)?;
        Ok(())
    }

    pub fn set_interpolation(&mut self, order: i64) -> Result<(), TranscodeError> {
        self.interpolation = non_negative("interpolation", order)?;
        Ok(())
    }

    pub fn set_gain_millibel(&mut self, gain: i32) {
        self.gain_millibel = gain;
    }
}

fn non_negative(what: &str, value: i64) -> Result<u32, TranscodeError> {
    if value < 0 {
        return Err(TranscodeError::InvalidOption(format!(
            "{what} cannot be negative (got {value})"
        )));
    }
    u32::try_from(value)
        .map_err(|_| TranscodeError::InvalidOption(format!("{what} is too large (got {value})")))
}

/// Explicit comment values given on the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentOverrides {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
}

/// Immutable configuration for a whole run, built once from the command line.
#[derive(Clone, Debug, Default)]
pub struct TranscodeConfig {
    pub render: RenderSettings,
    /// Replaces the input directory of every output path.
    pub output_dir: Option<PathBuf>,
    pub quiet: bool,
    pub dry_run: bool,
    pub auto_comment: bool,
    pub overrides: CommentOverrides,
    pub print_subsongs: bool,
    pub print_metadata: bool,
}

impl TranscodeConfig {
    /// Reject configurations that cannot produce output.
    pub fn validate(&self) -> Result<(), TranscodeError> {
        if self.render.buffer_frames() == 0 {
            return Err(TranscodeError::InvalidOption(format!(
                "sample rate {} Hz is too low for {} ms frames",
                self.render.sample_rate(),
                self.render.frame_duration()
            )));
        }
        if let Some(dir) = &self.output_dir {
            if !dir.is_dir() {
                return Err(TranscodeError::InvalidOption(format!(
                    "output directory {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}
