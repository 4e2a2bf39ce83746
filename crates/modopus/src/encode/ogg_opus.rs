//! Ogg Opus file writer.
//!
//! Layout: an `OpusHead` page, an `OpusTags` page, then audio packets whose
//! granule positions count 48 kHz samples including the pre-skip. One packet
//! is always held back so the last one can close the stream with a granule
//! that trims the padding added by [`PcmEncoder::drain`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use ogg::writing::{PacketWriteEndInfo, PacketWriter};
use opus::{Application, Channels, Encoder};

use super::resample::StreamResampler;
use super::{EncodeEngine, EncoderParams, OpusComments, PcmEncoder};
use crate::error::EncodeError;

const OPUS_RATE: u32 = 48_000;
const NATIVE_RATES: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];
const MIN_INPUT_RATE: u32 = 100;
const MAX_INPUT_RATE: u32 = 768_000;
/// Upper bound for one encoded packet.
const MAX_PACKET_BYTES: usize = 4000;

/// Writes `.opus` files.
#[derive(Clone, Copy, Debug, Default)]
pub struct OggOpusEngine;

impl EncodeEngine for OggOpusEngine {
    fn create_file_encoder(
        &self,
        path: &Path,
        comments: &OpusComments,
        params: &EncoderParams,
    ) -> Result<Box<dyn PcmEncoder>, EncodeError> {
        check_params(params)?;
        let file = File::create(path)?;
        let encoder = OggOpusEncoder::new(BufWriter::new(file), comments, params)?;
        tracing::debug!(path = %path.display(), pre_skip = encoder.pre_skip, "opened opus stream");
        Ok(Box::new(encoder))
    }
}

fn check_params(params: &EncoderParams) -> Result<(), EncodeError> {
    if !(MIN_INPUT_RATE..=MAX_INPUT_RATE).contains(&params.sample_rate) {
        return Err(EncodeError::BadArgument(format!(
            "sample rate {} Hz outside {MIN_INPUT_RATE}..={MAX_INPUT_RATE}",
            params.sample_rate
        )));
    }
    if !matches!(params.channels, 1 | 2) {
        return Err(EncodeError::BadArgument(format!(
            "{} channels (mono or stereo only)",
            params.channels
        )));
    }
    Ok(())
}

/// Streaming Ogg Opus encoder over any writer.
pub struct OggOpusEncoder<W: Write> {
    writer: PacketWriter<'static, W>,
    serial: u32,
    encoder: Encoder,
    resampler: Option<StreamResampler>,
    channels: usize,
    input_rate: u32,
    /// Rate handed to libopus, the input rate or 48 kHz.
    coding_rate: u32,
    /// Frames per packet at `coding_rate`.
    frame_len: usize,
    pre_skip: u16,
    /// Lookahead in `coding_rate` frames.
    lookahead: usize,
    /// Interleaved audio at `coding_rate` waiting for a full frame.
    pending: Vec<f32>,
    packet: Vec<u8>,
    held: Option<Vec<u8>>,
    /// Granule position at the end of the held packet.
    granule: u64,
    input_frames: u64,
}

impl<W: Write> OggOpusEncoder<W> {
    /// Create the encoder and write both header pages to `inner`.
    pub fn new(
        inner: W,
        comments: &OpusComments,
        params: &EncoderParams,
    ) -> Result<Self, EncodeError> {
        check_params(params)?;
        let channels = params.channels;
        let (coding_rate, resampler) = if NATIVE_RATES.contains(&params.sample_rate) {
            (params.sample_rate, None)
        } else {
            let resampler = StreamResampler::new(params.sample_rate, OPUS_RATE, channels)?;
            (OPUS_RATE, Some(resampler))
        };

        let opus_channels = if channels == 1 {
            Channels::Mono
        } else {
            Channels::Stereo
        };
        let mut encoder = Encoder::new(coding_rate, opus_channels, Application::Audio)?;
        let lookahead = usize::try_from(encoder.get_lookahead()?).unwrap_or(0);

        let scale = (OPUS_RATE / coding_rate) as usize;
        let delay = lookahead * scale + resampler.as_ref().map_or(0, StreamResampler::output_delay);
        let pre_skip = u16::try_from(delay)
            .map_err(|_| EncodeError::BadArgument(format!("pre-skip of {delay} samples")))?;

        let frame_len = coding_rate as usize * params.frame_duration.tenths_ms() as usize / 10_000;
        let mut this = Self {
            writer: PacketWriter::new(inner),
            serial: stream_serial(),
            encoder,
            resampler,
            channels,
            input_rate: params.sample_rate,
            coding_rate,
            frame_len,
            pre_skip,
            lookahead,
            pending: Vec::with_capacity(frame_len * channels * 2),
            packet: vec![0; MAX_PACKET_BYTES],
            held: None,
            granule: 0,
            input_frames: 0,
        };
        this.write_headers(comments)?;
        Ok(this)
    }

    fn write_headers(&mut self, comments: &OpusComments) -> Result<(), EncodeError> {
        let head = opus_head(self.channels as u8, self.pre_skip, self.input_rate)?;
        self.writer
            .write_packet(head, self.serial, PacketWriteEndInfo::EndPage, 0)?;
        let tags = opus_tags(comments)?;
        self.writer
            .write_packet(tags, self.serial, PacketWriteEndInfo::EndPage, 0)?;
        Ok(())
    }

    /// 48 kHz samples per encoded packet.
    fn packet_granules(&self) -> u64 {
        (self.frame_len * (OPUS_RATE / self.coding_rate) as usize) as u64
    }

    /// Encode every full frame in `pending`.
    fn encode_pending(&mut self) -> Result<(), EncodeError> {
        let frame_samples = self.frame_len * self.channels;
        let mut consumed = 0;
        while self.pending.len() - consumed >= frame_samples {
            let frame = &self.pending[consumed..consumed + frame_samples];
            let len = self.encoder.encode_float(frame, &mut self.packet)?;
            consumed += frame_samples;

            let packet = self.packet[..len].to_vec();
            if let Some(previous) = self.held.replace(packet) {
                self.writer.write_packet(
                    previous,
                    self.serial,
                    PacketWriteEndInfo::NormalPacket,
                    self.granule,
                )?;
            }
            self.granule += self.packet_granules();
        }
        self.pending.drain(..consumed);
        Ok(())
    }

    /// Finish the stream and hand back the writer.
    pub fn finish(mut self) -> Result<W, EncodeError> {
        let scale = u64::from(OPUS_RATE / self.coding_rate);

        // Audio length in `coding_rate` frames, resampler delay included.
        let audio_frames = match self.resampler.as_mut() {
            Some(resampler) => {
                let converted = (self.input_frames * u64::from(OPUS_RATE))
                    .div_ceil(u64::from(self.input_rate));
                let total = converted + resampler.output_delay() as u64;
                resampler.flush(total, &mut self.pending)?;
                total
            }
            None => self.input_frames,
        };

        // Cover the encoder lookahead, then round up to whole packets.
        let needed = audio_frames + self.lookahead as u64;
        let frame_len = self.frame_len as u64;
        let packets = needed.div_ceil(frame_len).max(1);
        let have = self.granule / scale + (self.pending.len() / self.channels) as u64;
        let target = (packets * frame_len).max(have.div_ceil(frame_len) * frame_len);
        let pad = (target - have) as usize * self.channels;
        self.pending.resize(self.pending.len() + pad, 0.0);
        self.encode_pending()?;

        let last_start = self.granule.saturating_sub(self.packet_granules());
        let end = u64::from(self.pre_skip) + self.playable_granules();
        let final_granule = end.clamp(last_start, self.granule);
        if let Some(last) = self.held.take() {
            self.writer.write_packet(
                last,
                self.serial,
                PacketWriteEndInfo::EndStream,
                final_granule,
            )?;
        }

        let mut inner = self.writer.into_inner();
        inner.flush()?;
        Ok(inner)
    }

    /// Playable length at 48 kHz.
    fn playable_granules(&self) -> u64 {
        (self.input_frames * u64::from(OPUS_RATE)).div_ceil(u64::from(self.input_rate))
    }
}

impl<W: Write> PcmEncoder for OggOpusEncoder<W> {
    fn write_float(&mut self, samples: &[f32], frames: usize) -> Result<(), EncodeError> {
        let len = frames * self.channels;
        let Some(samples) = samples.get(..len) else {
            return Err(EncodeError::BadArgument(format!(
                "{frames} frames requested from a buffer of {} samples",
                samples.len()
            )));
        };
        match self.resampler.as_mut() {
            Some(resampler) => resampler.process(samples, &mut self.pending)?,
            None => self.pending.extend_from_slice(samples),
        }
        self.input_frames += frames as u64;
        self.encode_pending()
    }

    fn drain(self: Box<Self>) -> Result<(), EncodeError> {
        self.finish().map(drop)
    }
}

fn opus_head(channels: u8, pre_skip: u16, input_rate: u32) -> Result<Vec<u8>, EncodeError> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.write_u8(1)?;
    head.write_u8(channels)?;
    head.write_u16::<LittleEndian>(pre_skip)?;
    head.write_u32::<LittleEndian>(input_rate)?;
    head.write_i16::<LittleEndian>(0)?;
    head.write_u8(0)?;
    Ok(head)
}

fn opus_tags(comments: &OpusComments) -> Result<Vec<u8>, EncodeError> {
    let mut tags = Vec::new();
    tags.extend_from_slice(b"OpusTags");
    write_field(&mut tags, comments.vendor().as_bytes())?;
    tags.write_u32::<LittleEndian>(comments.entries().len() as u32)?;
    for (key, value) in comments.entries() {
        let entry = format!("{key}={value}");
        write_field(&mut tags, entry.as_bytes())?;
    }
    Ok(tags)
}

fn write_field(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EncodeError> {
    let len = u32::try_from(bytes.len()).map_err(|_| {
        let head = &bytes[..bytes.len().min(16)];
        EncodeError::CommentTooLong(String::from_utf8_lossy(head).into_owned())
    })?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Per-stream serial; any value works for a single-stream file.
fn stream_serial() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    nanos ^ std::process::id().rotate_left(16)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use byteorder::{ByteOrder, LittleEndian};
    use ogg::reading::PacketReader;

    use super::*;
    use crate::settings::FrameDuration;

    fn params(sample_rate: u32) -> EncoderParams {
        EncoderParams {
            sample_rate,
            channels: 2,
            frame_duration: FrameDuration::Ms20,
        }
    }

    fn encode(sample_rate: u32, frames: usize, comments: &OpusComments) -> Vec<u8> {
        let mut encoder = OggOpusEncoder::new(Vec::new(), comments, &params(sample_rate)).unwrap();
        let tone: Vec<f32> = (0..frames * 2)
            .map(|i| ((i / 2) as f32 * 0.05).sin() * 0.3)
            .collect();
        for chunk in tone.chunks(2 * 700) {
            encoder.write_float(chunk, chunk.len() / 2).unwrap();
        }
        encoder.finish().unwrap()
    }

    fn packets(data: Vec<u8>) -> Vec<ogg::Packet> {
        let mut reader = PacketReader::new(Cursor::new(data));
        let mut out = Vec::new();
        while let Some(packet) = reader.read_packet().unwrap() {
            out.push(packet);
        }
        out
    }

    #[test]
    fn headers_describe_the_stream() {
        let mut comments = OpusComments::default();
        comments.add("artist", "Someone").unwrap();
        let all = packets(encode(48_000, 4800, &comments));

        let head = &all[0].data;
        assert_eq!(&head[..8], b"OpusHead");
        assert_eq!(head[8], 1);
        assert_eq!(head[9], 2);
        assert_eq!(LittleEndian::read_u32(&head[12..16]), 48_000);
        assert!(all[0].last_in_page());

        let tags = &all[1].data;
        assert_eq!(&tags[..8], b"OpusTags");
        let vendor_len = LittleEndian::read_u32(&tags[8..12]) as usize;
        let count_at = 12 + vendor_len;
        assert_eq!(LittleEndian::read_u32(&tags[count_at..count_at + 4]), 1);
        assert!(tags.ends_with(b"artist=Someone"));
    }

    #[test]
    fn final_granule_trims_padding() {
        let data = encode(48_000, 4800, &OpusComments::default());
        let all = packets(data);
        let head = &all[0].data;
        let pre_skip = u64::from(LittleEndian::read_u16(&head[10..12]));

        let last = all.last().unwrap();
        assert!(last.last_in_stream());
        assert_eq!(last.absgp_page(), pre_skip + 4800);
        // 100 ms of audio plus lookahead in 20 ms packets
        let audio_packets = all.len() - 2;
        assert_eq!(audio_packets as u64, (4800 + pre_skip).div_ceil(960));
    }

    #[test]
    fn zero_frames_still_yield_a_complete_stream() {
        let all = packets(encode(48_000, 0, &OpusComments::default()));
        assert!(all.len() >= 3);
        let last = all.last().unwrap();
        assert!(last.last_in_stream());
        let pre_skip = u64::from(LittleEndian::read_u16(&all[0].data[10..12]));
        assert_eq!(last.absgp_page(), pre_skip);
    }

    #[test]
    fn non_native_rate_is_resampled() {
        let all = packets(encode(44_100, 44_100, &OpusComments::default()));
        let pre_skip = u64::from(LittleEndian::read_u16(&all[0].data[10..12]));
        assert_eq!(LittleEndian::read_u32(&all[0].data[12..16]), 44_100);
        assert_eq!(all.last().unwrap().absgp_page(), pre_skip + 48_000);
    }

    #[test]
    fn native_low_rate_granules_count_48k_samples() {
        let all = packets(encode(8_000, 8_000, &OpusComments::default()));
        let pre_skip = u64::from(LittleEndian::read_u16(&all[0].data[10..12]));
        assert_eq!(all.last().unwrap().absgp_page(), pre_skip + 48_000);
    }

    #[test]
    fn rejects_unusable_parameters() {
        let comments = OpusComments::default();
        assert!(matches!(
            OggOpusEncoder::new(Vec::new(), &comments, &params(50)),
            Err(EncodeError::BadArgument(_))
        ));
        let mono_ok = EncoderParams {
            channels: 1,
            ..params(48_000)
        };
        assert!(OggOpusEncoder::new(Vec::new(), &comments, &mono_ok).is_ok());
        let surround = EncoderParams {
            channels: 6,
            ..params(48_000)
        };
        assert!(OggOpusEncoder::new(Vec::new(), &comments, &surround).is_err());
    }
}
