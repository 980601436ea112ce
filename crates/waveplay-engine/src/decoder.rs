//! Media decoding stage.
//!
//! [`MediaDecoder`] is the capability boundary between the session state
//! machine and the bound decoding library: open a container, run a blocking
//! chunk-callback decode loop, close. [`SymphoniaDecoder`] is the concrete
//! implementation: Symphonia probes the container, selects the first audio
//! track, and decoded frames are pushed through a [`StreamConverter`] into
//! the fixed stereo i16 output format.
//!
//! The chunk callback steers the loop with an explicit [`DecodeControl`]
//! instruction; pause, stop, and seek all take effect at chunk granularity.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use crate::resample::{OUTPUT_CHANNELS, StreamConverter};
use waveplay_types::{ErrorCode, TrackInfo};

/// Instruction returned by the chunk callback to steer the decode loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeControl {
    /// Keep decoding.
    Continue,
    /// Halt the decode loop immediately (pause or stop).
    Stop,
    /// Flush decoder state and seek to an absolute position in seconds.
    SeekTo(u64),
}

/// One fixed-format chunk of interleaved stereo i16 samples.
///
/// Valid only for the synchronous extent of the callback invocation.
#[derive(Clone, Copy, Debug)]
pub struct PcmChunk<'a> {
    /// Interleaved samples, [`OUTPUT_CHANNELS`] per frame.
    pub samples: &'a [i16],
    /// Chunk position in seconds, derived from the packet timestamp.
    pub position_secs: u64,
}

impl PcmChunk<'_> {
    /// Number of frames in this chunk.
    pub fn frames(&self) -> usize {
        self.samples.len() / OUTPUT_CHANNELS
    }

    /// Chunk size in bytes.
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }
}

/// Decode pipeline capability: open, blocking chunked decode, close.
pub trait MediaDecoder: Send {
    /// Open `path`, probe it, and configure the decode pipeline.
    ///
    /// All-or-nothing: on error no resources are retained.
    fn open(&mut self, path: &Path) -> Result<TrackInfo, ErrorCode>;

    /// Run the blocking decode loop, invoking `on_chunk` once per
    /// `chunk_frames`-sized chunk until end of stream or the callback
    /// returns [`DecodeControl::Stop`].
    fn decode(
        &mut self,
        chunk_frames: usize,
        on_chunk: &mut dyn FnMut(PcmChunk<'_>) -> DecodeControl,
    ) -> Result<(), ErrorCode>;

    /// Release container, codec, and converter resources. Idempotent.
    fn close(&mut self);
}

/// Symphonia-backed [`MediaDecoder`] producing stereo i16 at a fixed rate.
pub struct SymphoniaDecoder {
    output_rate: u32,
    stream: Option<OpenStream>,
}

/// Everything owned between a successful open and close.
struct OpenStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    converter: StreamConverter,
}

impl SymphoniaDecoder {
    pub fn new(output_rate: u32) -> Self {
        Self {
            output_rate,
            stream: None,
        }
    }
}

impl OpenStream {
    /// Convert a packet timestamp into whole seconds via the stream time base.
    fn position_secs(&self, ts: u64) -> u64 {
        self.time_base.map(|tb| tb.calc_time(ts).seconds).unwrap_or(0)
    }

    /// Flush codec and converter state, then seek the container.
    ///
    /// Coarse mode lands on the nearest sync point at or before the target,
    /// so the decoder can restart cleanly.
    fn seek_to(&mut self, seconds: u64) -> Result<(), ErrorCode> {
        self.decoder.reset();
        self.converter.discard();

        let target = SeekTo::Time {
            time: Time::new(seconds, 0.0),
            track_id: Some(self.track_id),
        };
        self.format
            .seek(SeekMode::Coarse, target)
            .map_err(|_| ErrorCode::SeekFrameFailed)?;
        Ok(())
    }
}

impl MediaDecoder for SymphoniaDecoder {
    fn open(&mut self, path: &Path) -> Result<TrackInfo, ErrorCode> {
        // Replacing an open stream always releases the previous one first.
        self.close();

        let file = File::open(path).map_err(|_| ErrorCode::FileNotSupported)?;
        let byte_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|_| ErrorCode::FileNotSupported)?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(ErrorCode::FileNotSupported)?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.ok_or(ErrorCode::FileNotSupported)?;
        // A codec without a declared layout is treated as stereo.
        let channels = params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|_| ErrorCode::UnknownError)?;

        let converter = StreamConverter::new(sample_rate, channels, self.output_rate, 1024)
            .map_err(|_| ErrorCode::UnknownError)?;

        let duration_secs = match (params.time_base, params.n_frames) {
            (Some(tb), Some(frames)) => tb.calc_time(frames).seconds,
            (None, Some(frames)) if sample_rate > 0 => frames / sample_rate as u64,
            _ => 0,
        };

        let mut title = None;
        let mut artist = None;
        if let Some(rev) = format.metadata().current() {
            read_tags(rev, &mut title, &mut artist);
        }
        if let Some(rev) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            read_tags(rev, &mut title, &mut artist);
        }

        let info = TrackInfo {
            title,
            artist,
            channels: channels as u16,
            sample_rate,
            bit_rate: approx_bit_rate(byte_len, duration_secs),
            bit_depth: params.bits_per_sample.or(params.bits_per_coded_sample),
            duration_secs,
        };

        tracing::info!(
            path = %path.display(),
            channels,
            sample_rate,
            duration_secs,
            "opened audio stream"
        );

        self.stream = Some(OpenStream {
            format,
            decoder,
            track_id,
            time_base: params.time_base,
            converter,
        });

        Ok(info)
    }

    fn decode(
        &mut self,
        chunk_frames: usize,
        on_chunk: &mut dyn FnMut(PcmChunk<'_>) -> DecodeControl,
    ) -> Result<(), ErrorCode> {
        let output_rate = self.output_rate;
        let stream = self.stream.as_mut().ok_or(ErrorCode::UnknownError)?;
        let chunk_frames = chunk_frames.max(1);

        let mut pending_seek: Option<u64> = None;
        let mut position_secs = 0u64;
        let mut eof = false;

        loop {
            if let Some(target) = pending_seek.take() {
                stream.seek_to(target)?;
                eof = false;
            }

            if eof {
                // End of stream: flush the converter tail and deliver it,
                // advancing the position through the flushed audio so the
                // final report stays near the track duration.
                stream
                    .converter
                    .finish()
                    .map_err(|_| ErrorCode::UnknownError)?;

                let mut tail_frames = 0u64;
                while let Some(samples) = stream
                    .converter
                    .take_chunk(chunk_frames)
                    .or_else(|| stream.converter.take_tail())
                {
                    let chunk = PcmChunk {
                        samples: &samples,
                        position_secs: tail_position(position_secs, tail_frames, output_rate),
                    };
                    tail_frames += (samples.len() / OUTPUT_CHANNELS) as u64;
                    match on_chunk(chunk) {
                        DecodeControl::Continue => {}
                        DecodeControl::Stop => return Ok(()),
                        DecodeControl::SeekTo(t) => {
                            pending_seek = Some(t);
                            break;
                        }
                    }
                }

                if pending_seek.is_some() {
                    continue;
                }
                return Ok(());
            }

            let packet = match stream.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::ResetRequired) => {
                    stream.decoder.reset();
                    continue;
                }
                Err(_) => {
                    // No more packets; drain what the converter still holds.
                    eof = true;
                    continue;
                }
            };

            // Packets from other streams do not affect the loop.
            if packet.track_id() != stream.track_id {
                continue;
            }

            position_secs = stream.position_secs(packet.ts());

            let decoded = match stream.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::ResetRequired) => {
                    stream.decoder.reset();
                    continue;
                }
                Err(e) => {
                    tracing::warn!("codec rejected packet: {e}");
                    return Err(ErrorCode::DecodeFileFailed);
                }
            };

            let mut sample_buf =
                SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
            sample_buf.copy_interleaved_ref(decoded);
            stream
                .converter
                .push(sample_buf.samples())
                .map_err(|_| ErrorCode::UnknownError)?;

            while let Some(samples) = stream.converter.take_chunk(chunk_frames) {
                let chunk = PcmChunk {
                    samples: &samples,
                    position_secs,
                };
                match on_chunk(chunk) {
                    DecodeControl::Continue => {}
                    DecodeControl::Stop => return Ok(()),
                    DecodeControl::SeekTo(t) => {
                        pending_seek = Some(t);
                        break;
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("closed audio stream");
        }
    }
}

/// Pull title/artist out of a metadata revision, first value wins.
fn read_tags(rev: &MetadataRevision, title: &mut Option<String>, artist: &mut Option<String>) {
    for tag in rev.tags() {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) if title.is_none() => {
                *title = non_empty(tag.value.to_string());
            }
            Some(StandardTagKey::Artist) if artist.is_none() => {
                *artist = non_empty(tag.value.to_string());
            }
            _ => {}
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Position of a tail chunk delivered `frames_out` output frames past the
/// last packet timestamp.
fn tail_position(base_secs: u64, frames_out: u64, rate: u32) -> u64 {
    base_secs + frames_out / rate.max(1) as u64
}

/// Container-level bit rate estimate; symphonia does not expose one directly.
fn approx_bit_rate(byte_len: u64, duration_secs: u64) -> Option<u32> {
    if byte_len == 0 || duration_secs == 0 {
        return None;
    }
    u32::try_from(byte_len.saturating_mul(8) / duration_secs).ok()
}
