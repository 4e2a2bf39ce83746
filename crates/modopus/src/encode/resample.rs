//! Sample rate conversion for rates Opus cannot code directly.
//!
//! Wraps Rubato's streaming sinc resampler. Input is buffered until a full
//! chunk is available; [`StreamResampler::flush`] pads with silence until the
//! requested number of output frames has been produced.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::error::EncodeError;

/// Input frames per resampler call.
const CHUNK_FRAMES: usize = 1024;

pub(crate) struct StreamResampler {
    resampler: Box<dyn Resampler<f32>>,
    channels: usize,
    /// Interleaved input not yet resampled.
    input: Vec<f32>,
    scratch: Vec<f32>,
    produced_frames: u64,
}

impl StreamResampler {
    pub(crate) fn new(from_rate: u32, to_rate: u32, channels: usize) -> Result<Self, EncodeError> {
        let sinc_len = 128;
        let window = WindowFunction::BlackmanHarris2;
        let params = SincInterpolationParameters {
            sinc_len,
            f_cutoff: calculate_cutoff(sinc_len, window),
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window,
        };
        let ratio = f64::from(to_rate) / f64::from(from_rate);
        let resampler = Async::<f32>::new_sinc(
            ratio,
            1.1,
            &params,
            CHUNK_FRAMES,
            channels,
            FixedAsync::Input,
        )
        .map_err(|e| EncodeError::Resample(e.to_string()))?;
        let scratch = vec![0.0; resampler.output_frames_max() * channels];

        Ok(Self {
            resampler: Box::new(resampler),
            channels,
            input: Vec::with_capacity(CHUNK_FRAMES * channels * 2),
            scratch,
            produced_frames: 0,
        })
    }

    /// Output frames of delay the resampler adds in front of the signal.
    pub(crate) fn output_delay(&self) -> usize {
        self.resampler.output_delay()
    }

    /// Buffer `samples` and append every completed chunk's output to `out`.
    pub(crate) fn process(
        &mut self,
        samples: &[f32],
        out: &mut Vec<f32>,
    ) -> Result<(), EncodeError> {
        self.input.extend_from_slice(samples);
        let chunk_len = CHUNK_FRAMES * self.channels;
        while self.input.len() >= chunk_len {
            self.process_chunk(out)?;
            self.input.drain(..chunk_len);
        }
        Ok(())
    }

    /// Pad with silence until `total_frames` output frames exist, then stop
    /// exactly there.
    pub(crate) fn flush(
        &mut self,
        total_frames: u64,
        out: &mut Vec<f32>,
    ) -> Result<(), EncodeError> {
        let chunk_len = CHUNK_FRAMES * self.channels;
        while self.produced_frames < total_frames {
            self.input.resize(chunk_len, 0.0);
            let before = out.len();
            self.process_chunk(out)?;
            self.input.clear();

            if self.produced_frames > total_frames {
                let excess = (self.produced_frames - total_frames) as usize * self.channels;
                out.truncate((out.len() - excess).max(before));
                self.produced_frames = total_frames;
            }
        }
        Ok(())
    }

    fn process_chunk(&mut self, out: &mut Vec<f32>) -> Result<(), EncodeError> {
        let chunk_len = CHUNK_FRAMES * self.channels;
        let input_adapter =
            InterleavedSlice::new(&self.input[..chunk_len], self.channels, CHUNK_FRAMES)
                .map_err(|e| EncodeError::Resample(format!("interleaved slice (input): {e}")))?;
        let out_capacity_frames = self.scratch.len() / self.channels;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut self.scratch, self.channels, out_capacity_frames)
                .map_err(|e| EncodeError::Resample(format!("interleaved slice (output): {e}")))?;

        let (_nbr_in, nbr_out) = self
            .resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, None)
            .map_err(|e| EncodeError::Resample(e.to_string()))?;

        out.extend_from_slice(&self.scratch[..nbr_out * self.channels]);
        self.produced_frames += nbr_out as u64;
        Ok(())
    }
}
