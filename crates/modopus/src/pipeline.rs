//! Per-file transcoding: validate, decode, tag, encode.
//!
//! Each input runs through these steps in order:
//! 1. validate the path and its extension
//! 2. open and configure the module
//! 3. optionally print metadata/subsongs
//! 4. stop here on a dry run
//! 5. build the comment set
//! 6. derive the output path
//! 7. open the encoder with the comments
//! 8. transfer PCM in fixed-size batches until the module ends
//! 9. drain the encoder
//!
//! Every resource is owned by the `transcode_file` scope, so whichever step
//! fails, the encoder, comments, module and path parts are dropped in that
//! order before the next file starts.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::comments::CommentSet;
use crate::decode::{DecodeEngine, ModuleDecoder, RenderParam};
use crate::encode::{EncodeEngine, EncoderParams};
use crate::error::{DecodeError, TranscodeError};
use crate::path::PathParts;
use crate::report;
use crate::settings::TranscodeConfig;

/// How a file finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// Output written to `path`; `frames` PCM frames were transferred.
    Encoded { path: PathBuf, frames: u64 },
    /// Dry run: the module was opened and configured, nothing was written.
    DryRun,
}

/// Counters for a whole run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct TranscodePipeline<'a> {
    config: &'a TranscodeConfig,
    decoders: &'a dyn DecodeEngine,
    encoders: &'a dyn EncodeEngine,
}

impl<'a> TranscodePipeline<'a> {
    pub fn new(
        config: &'a TranscodeConfig,
        decoders: &'a dyn DecodeEngine,
        encoders: &'a dyn EncodeEngine,
    ) -> Self {
        Self {
            config,
            decoders,
            encoders,
        }
    }

    /// Transcode every input in order.
    ///
    /// Only an invalid configuration fails the run; per-file errors are logged
    /// and counted.
    pub fn run<I, S>(&self, inputs: I, out: &mut dyn Write) -> Result<RunSummary, TranscodeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.validate()?;

        let mut summary = RunSummary::default();
        for input in inputs {
            let input = input.as_ref();
            summary.processed += 1;
            match self.transcode_file(input, out) {
                Ok(FileOutcome::Encoded { path, frames }) => {
                    summary.completed += 1;
                    tracing::info!(input = %input, output = %path.display(), frames, "encoded");
                }
                Ok(FileOutcome::DryRun) => {
                    summary.completed += 1;
                    tracing::info!(input = %input, "dry run");
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    summary.failed += 1;
                    let write_failed = matches!(err, TranscodeError::TransferWriteFailed(_));
                    let chain = failure_text(err);
                    if write_failed {
                        tracing::error!(path = %input, error = %chain, "failed");
                    } else {
                        tracing::error!(path = %input, error = %chain, "skipping file");
                    }
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            completed = summary.completed,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }

    /// Run one input through every step.
    pub fn transcode_file(
        &self,
        input: &str,
        out: &mut dyn Write,
    ) -> Result<FileOutcome, TranscodeError> {
        let config = self.config;
        let render = &config.render;

        let parts = PathParts::decompose(input)?;
        if !parts.is_supported_extension(self.decoders) {
            return Err(TranscodeError::UnsupportedExtension(
                parts.bare_extension().map(str::to_string),
            ));
        }

        let mut decoder = self.open_decoder(input)?;

        if config.print_metadata {
            if let Err(e) = report::print_metadata(out, decoder.as_ref()) {
                tracing::warn!(error = %e, "could not print metadata");
            }
        }
        if config.print_subsongs {
            if let Err(e) = report::print_subsongs(out, decoder.as_ref()) {
                tracing::warn!(error = %e, "could not print subsongs");
            }
        }

        if config.dry_run {
            return Ok(FileOutcome::DryRun);
        }

        let mut comment_set = if config.auto_comment {
            CommentSet::from_auto_extraction(decoder.as_ref())?
        } else {
            CommentSet::new()
        };
        comment_set.apply_overrides(&config.overrides);

        let output_path = parts.derive_output_path(config.output_dir.as_deref())?;

        let mut comments = self.encoders.create_comments();
        for (key, value) in comment_set.to_key_value_pairs() {
            self.encoders
                .add_comment(&mut comments, key, value)
                .map_err(TranscodeError::EncoderCommentsFailed)?;
        }
        let params = EncoderParams {
            sample_rate: render.sample_rate(),
            channels: render.channels(),
            frame_duration: render.frame_duration(),
        };
        let mut encoder = self
            .encoders
            .create_file_encoder(&output_path, &comments, &params)
            .map_err(|source| TranscodeError::EncoderCreateFailed {
                path: output_path.clone(),
                source,
            })?;

        if !config.quiet {
            if let Err(e) =
                report::print_settings(out, input, &output_path, render, config.auto_comment)
            {
                tracing::warn!(error = %e, "could not print settings");
            }
        }

        let channels = render.channels();
        let mut buffer = vec![0.0f32; render.buffer_frames() * channels];
        let mut frames_total = 0u64;
        loop {
            let frames = decoder.read_interleaved_stereo(render.sample_rate(), &mut buffer);
            if frames == 0 {
                break;
            }
            encoder
                .write_float(&buffer[..frames * channels], frames)
                .map_err(TranscodeError::TransferWriteFailed)?;
            frames_total += frames as u64;
        }

        encoder.drain().map_err(TranscodeError::TransferWriteFailed)?;
        drop(comments);
        drop(decoder);
        drop(parts);

        Ok(FileOutcome::Encoded {
            path: output_path,
            frames: frames_total,
        })
    }

    fn open_decoder(&self, input: &str) -> Result<Box<dyn ModuleDecoder>, TranscodeError> {
        let render = &self.config.render;
        let mut decoder = {
            let data = fs::read(input)
                .map_err(|e| TranscodeError::DecoderOpenFailed(format!("{input}: {e}")))?;
            self.decoders
                .open(&data)
                .map_err(|e| TranscodeError::DecoderOpenFailed(format!("{input}: {e}")))?
        };

        decoder
            .set_repeat_count(render.repeat_count())
            .map_err(|source| TranscodeError::DecoderConfigFailed {
                what: "repeat count",
                source,
            })?;
        for param in [
            RenderParam::InterpolationFilterLength(render.interpolation()),
            RenderParam::MasterGainMillibel(render.gain_millibel()),
        ] {
            decoder
                .set_render_param(param)
                .map_err(|source: DecodeError| TranscodeError::DecoderConfigFailed {
                    what: param.name(),
                    source,
                })?;
        }
        Ok(decoder)
    }
}

/// `err` followed by its causes, as logged for a skipped file.
fn failure_text(err: TranscodeError) -> String {
    format!("{:#}", anyhow::Error::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_text_includes_causes() {
        let err = TranscodeError::DecoderConfigFailed {
            what: "master gain",
            source: DecodeError::Rejected {
                param: "master gain",
                value: 9000,
            },
        };
        assert_eq!(
            failure_text(err),
            "failed setting master gain: engine rejected master gain = 9000"
        );
    }
}
