use std::path::PathBuf;

use clap::Parser;
use modopus::{CommentOverrides, FrameDuration, RenderSettings, TranscodeConfig, TranscodeError};

const AFTER_HELP: &str = "\
Each output file gets the input's name with the .opus extension.

Interpolation filter lengths:
  0  engine default
  1  no interpolation (zero order hold)
  2  linear interpolation
  4  cubic interpolation
  8  windowed sinc with 8 taps";

#[derive(Parser, Debug)]
#[command(
    name = "modopus",
    version,
    about = "Render tracker modules to Ogg Opus files",
    after_help = AFTER_HELP,
    allow_negative_numbers = true
)]
pub struct Args {
    /// Module files to transcode
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<String>,

    /// Show the list of supported file formats and exit
    #[arg(long)]
    pub supported: bool,

    /// Output directory (must already exist)
    #[arg(short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not print the per-file settings
    #[arg(short, long)]
    pub quiet: bool,

    /// Render sample rate in Hz
    #[arg(
        long,
        default_value_t = modopus::settings::DEFAULT_SAMPLE_RATE,
        help_heading = "Rendering"
    )]
    pub samplerate: u32,

    /// Opus frame size in ms: 2.5, 5, 10, 20, 40 or 60
    #[arg(
        long,
        default_value = "20",
        value_parser = parse_frame_duration,
        help_heading = "Rendering"
    )]
    pub framesize: FrameDuration,

    /// Repeat the song n times after playing it once
    #[arg(long, default_value_t = 0, help_heading = "Rendering")]
    pub repeat_count: i64,

    /// Interpolation filter length (see below)
    #[arg(long, default_value_t = 0, help_heading = "Rendering")]
    pub interpolation: i64,

    /// Master gain in millibel
    #[arg(long, default_value_t = 0, help_heading = "Rendering")]
    pub gain: i32,

    /// Decode everything but skip writing files
    #[arg(long, help_heading = "Rendering")]
    pub dry_run: bool,

    /// Copy artist, title, date, message and tracker type from the input
    #[arg(long, help_heading = "Comments")]
    pub auto_comment: bool,

    /// Set the artist comment
    #[arg(long, help_heading = "Comments")]
    pub artist: Option<String>,

    /// Set the title comment
    #[arg(long, help_heading = "Comments")]
    pub title: Option<String>,

    /// Set the date comment (YYYY-MM-DD, YYYY-MM or YYYY)
    #[arg(long, help_heading = "Comments")]
    pub date: Option<String>,

    /// Print subsong names
    #[arg(long, help_heading = "Printing")]
    pub print_subsongs: bool,

    /// Print module metadata
    #[arg(long, help_heading = "Printing")]
    pub print_metadata: bool,
}

fn parse_frame_duration(value: &str) -> Result<FrameDuration, String> {
    value.parse().map_err(|e: TranscodeError| e.to_string())
}

impl Args {
    /// Build the run configuration; out-of-range values are `InvalidOption`.
    pub fn to_config(&self) -> Result<TranscodeConfig, TranscodeError> {
        let mut render = RenderSettings::default();
        render.set_sample_rate(self.samplerate)?;
        render.set_frame_duration(self.framesize);
        render.set_repeat_count(self.repeat_count)?;
        render.set_interpolation(self.interpolation)?;
        render.set_gain_millibel(self.gain);

        Ok(TranscodeConfig {
            render,
            output_dir: self.output_dir.clone(),
            quiet: self.quiet,
            dry_run: self.dry_run,
            auto_comment: self.auto_comment,
            overrides: CommentOverrides {
                artist: self.artist.clone(),
                title: self.title.clone(),
                date: self.date.clone(),
            },
            print_subsongs: self.print_subsongs,
            print_metadata: self.print_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("modopus").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_render_settings() {
        let config = parse(&["song.mod"]).unwrap().to_config().unwrap();
        assert_eq!(config.render, RenderSettings::default());
        assert!(!config.quiet);
        assert_eq!(config.overrides, CommentOverrides::default());
    }

    #[test]
    fn rendering_options_flow_into_config() {
        let args = parse(&[
            "--samplerate",
            "44100",
            "--framesize",
            "60",
            "--repeat-count",
            "2",
            "--gain",
            "-250",
            "--artist",
            "Me",
            "-q",
            "a.mod",
            "b.xm",
        ])
        .unwrap();
        assert_eq!(args.inputs, vec!["a.mod", "b.xm"]);

        let config = args.to_config().unwrap();
        assert_eq!(config.render.buffer_frames(), 2646);
        assert_eq!(config.render.repeat_count(), 2);
        assert_eq!(config.render.gain_millibel(), -250);
        assert_eq!(config.overrides.artist.as_deref(), Some("Me"));
        assert!(config.quiet);
    }

    #[test]
    fn negative_counts_are_invalid_options() {
        let args = parse(&["--repeat-count", "-1", "a.mod"]).unwrap();
        assert!(args.to_config().unwrap_err().is_fatal());
        let args = parse(&["--interpolation", "-2", "a.mod"]).unwrap();
        assert!(args.to_config().unwrap_err().is_fatal());
    }

    #[test]
    fn bad_framesize_is_a_usage_error() {
        assert!(parse(&["--framesize", "30", "a.mod"]).is_err());
        assert!(parse(&["--bogus", "a.mod"]).is_err());
    }
}
