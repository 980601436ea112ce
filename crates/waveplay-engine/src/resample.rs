//! Stream conversion into the fixed output format.
//!
//! [`StreamConverter`] takes decoded interleaved `f32` audio in the source
//! channel layout and sample rate and produces interleaved signed 16-bit
//! stereo at the fixed output rate:
//! - channel mapping (mono duplicated, >2 channels clamped to the first two)
//! - Rubato streaming sinc resampling when the rates differ
//! - `f32` -> `i16` quantization
//!
//! Output is buffered internally so the decode loop can pull fixed-size
//! chunks regardless of the codec's frame sizes.

use std::collections::VecDeque;

use anyhow::{Result, anyhow, ensure};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

/// Fixed output channel count (stereo).
pub const OUTPUT_CHANNELS: usize = 2;

/// Converts arbitrary source audio into interleaved stereo i16 at a fixed rate.
pub struct StreamConverter {
    src_channels: usize,
    /// `None` when source and output rates match (passthrough).
    resampler: Option<Box<dyn Resampler<f32>>>,
    block_frames: usize,
    /// Stereo f32 samples waiting to be fed through the resampler.
    pending: Vec<f32>,
    /// Scratch buffer for resampler output.
    scratch: Vec<f32>,
    /// Quantized output samples ready to be chunked.
    ready: VecDeque<i16>,
}

impl StreamConverter {
    /// Create a converter from `(src_rate, src_channels)` to stereo `dst_rate`.
    pub fn new(
        src_rate: u32,
        src_channels: usize,
        dst_rate: u32,
        block_frames: usize,
    ) -> Result<Self> {
        ensure!(src_channels > 0, "source must have at least one channel");
        ensure!(src_rate > 0 && dst_rate > 0, "sample rates must be non-zero");

        let block_frames = block_frames.max(1);
        let resampler: Option<Box<dyn Resampler<f32>>> = if src_rate == dst_rate {
            None
        } else {
            let sinc_len = 128;
            let window = WindowFunction::BlackmanHarris2;
            let params = SincInterpolationParameters {
                sinc_len,
                f_cutoff: calculate_cutoff(sinc_len, window),
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window,
            };

            let f_ratio = dst_rate as f64 / src_rate as f64;
            let resampler = Async::<f32>::new_sinc(
                f_ratio,
                1.1,
                &params,
                block_frames,
                OUTPUT_CHANNELS,
                FixedAsync::Input,
            )
            .map_err(|e| anyhow!("resampler init: {e}"))?;
            Some(Box::new(resampler))
        };

        // High upsampling ratios produce many more frames than they consume;
        // the output buffer must hold the resampler's worst case per block.
        let scratch_frames = resampler
            .as_ref()
            .map(|r| r.output_frames_max())
            .unwrap_or(block_frames);

        Ok(Self {
            src_channels,
            resampler,
            block_frames,
            pending: Vec::new(),
            scratch: vec![0.0; OUTPUT_CHANNELS * scratch_frames],
            ready: VecDeque::new(),
        })
    }

    /// Feed decoded interleaved source samples into the converter.
    pub fn push(&mut self, interleaved: &[f32]) -> Result<()> {
        let frames = interleaved.len() / self.src_channels;
        for frame in 0..frames {
            let base = frame * self.src_channels;
            let (left, right) = match self.src_channels {
                1 => (interleaved[base], interleaved[base]),
                _ => (interleaved[base], interleaved[base + 1]),
            };

            if self.resampler.is_some() {
                self.pending.push(left);
                self.pending.push(right);
            } else {
                self.ready.push_back(quantize(left));
                self.ready.push_back(quantize(right));
            }
        }

        while self.pending.len() >= self.block_frames * OUTPUT_CHANNELS {
            self.process_block(self.block_frames)?;
        }

        Ok(())
    }

    /// Flush any partial input block at end of stream.
    pub fn finish(&mut self) -> Result<()> {
        let frames = self.pending.len() / OUTPUT_CHANNELS;
        if frames > 0 {
            self.process_block(frames)?;
        }
        Ok(())
    }

    /// Take one `frames`-sized output chunk if enough samples are buffered.
    pub fn take_chunk(&mut self, frames: usize) -> Option<Vec<i16>> {
        let want = frames * OUTPUT_CHANNELS;
        if self.ready.len() < want {
            return None;
        }
        Some(self.ready.drain(..want).collect())
    }

    /// Take whatever remains after [`finish`](Self::finish); whole frames only.
    pub fn take_tail(&mut self) -> Option<Vec<i16>> {
        let frames = self.ready.len() / OUTPUT_CHANNELS;
        if frames == 0 {
            self.ready.clear();
            return None;
        }
        Some(self.ready.drain(..frames * OUTPUT_CHANNELS).collect())
    }

    /// Drop all buffered input and output; used when seeking mid-stream.
    pub fn discard(&mut self) {
        self.pending.clear();
        self.ready.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    /// Run `frames` (at most one block) of pending stereo input through Rubato.
    fn process_block(&mut self, frames: usize) -> Result<()> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(());
        };

        let in_samples = frames * OUTPUT_CHANNELS;
        let input = InterleavedSlice::new(&self.pending[..in_samples], OUTPUT_CHANNELS, frames)
            .map_err(|e| anyhow!("interleaved input: {e}"))?;

        let out_capacity_frames = self.scratch.len() / OUTPUT_CHANNELS;
        let mut output =
            InterleavedSlice::new_mut(&mut self.scratch, OUTPUT_CHANNELS, out_capacity_frames)
                .map_err(|e| anyhow!("interleaved output: {e}"))?;

        let indexing = Indexing {
            input_offset: 0,
            output_offset: 0,
            active_channels_mask: None,
            partial_len: (frames < self.block_frames).then_some(frames),
        };

        let (_consumed, produced) = resampler
            .process_into_buffer(&input, &mut output, Some(&indexing))
            .map_err(|e| anyhow!("resampler process: {e}"))?;

        self.pending.drain(..in_samples);
        for &sample in &self.scratch[..produced * OUTPUT_CHANNELS] {
            self.ready.push_back(quantize(sample));
        }

        Ok(())
    }
}

/// Clamp and scale a normalized `f32` sample to signed 16-bit.
fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
