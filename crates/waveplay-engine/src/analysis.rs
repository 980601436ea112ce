//! Spectrum analysis over the decoded output stream.
//!
//! Accumulates downmixed mono samples, runs a Hann-windowed forward FFT once
//! per full window, and groups bin magnitudes into a configurable number of
//! log-spaced bars suitable for a visualizer.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::resample::OUTPUT_CHANNELS;

const WINDOW_SIZE: usize = 2048;
const HOP_SIZE: usize = WINDOW_SIZE / 2;
const MIN_FREQ_HZ: f64 = 20.0;
const MAX_BARS: usize = 256;

/// Streaming FFT analyzer producing log-spaced amplitude bars.
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    bars: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    ring: VecDeque<f32>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for interleaved stereo i16 input at `sample_rate`.
    pub fn new(sample_rate: u32, bars: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(WINDOW_SIZE);

        let window = (0..WINDOW_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (WINDOW_SIZE - 1) as f32;
                0.5 - 0.5 * phase.cos()
            })
            .collect();

        Self {
            sample_rate,
            bars: bars.clamp(1, MAX_BARS),
            fft,
            window,
            ring: VecDeque::with_capacity(WINDOW_SIZE * 2),
        }
    }

    /// Current number of bars per frame.
    pub fn bars(&self) -> usize {
        self.bars
    }

    /// Change the number of bars produced by subsequent frames.
    pub fn set_bars(&mut self, bars: usize) {
        self.bars = bars.clamp(1, MAX_BARS);
    }

    /// Drop accumulated samples; used on stop and seek.
    pub fn reset(&mut self) {
        self.ring.clear();
    }

    /// Feed interleaved stereo samples; returns one bar frame per full window.
    pub fn feed(&mut self, interleaved: &[i16]) -> Option<Vec<f64>> {
        for pair in interleaved.chunks_exact(OUTPUT_CHANNELS) {
            let mono = (pair[0] as f32 + pair[1] as f32) / (2.0 * i16::MAX as f32);
            self.ring.push_back(mono);
        }

        if self.ring.len() < WINDOW_SIZE {
            return None;
        }

        let mut buffer: Vec<Complex<f32>> = self
            .ring
            .iter()
            .take(WINDOW_SIZE)
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        // Magnitudes for the positive-frequency half, normalized to 0..1.
        let scale = 2.0 / WINDOW_SIZE as f64;
        let magnitudes: Vec<f64> = buffer[..WINDOW_SIZE / 2]
            .iter()
            .map(|c| (c.norm() as f64) * scale)
            .collect();

        self.ring.drain(..HOP_SIZE);
        Some(self.group_bars(&magnitudes))
    }

    /// Average bin magnitudes into log-spaced bands from 20 Hz to Nyquist.
    fn group_bars(&self, magnitudes: &[f64]) -> Vec<f64> {
        let nyquist = self.sample_rate as f64 / 2.0;
        let bin_hz = self.sample_rate as f64 / WINDOW_SIZE as f64;
        let ratio = nyquist / MIN_FREQ_HZ;

        let mut amplitudes = Vec::with_capacity(self.bars);
        for bar in 0..self.bars {
            let lo_hz = MIN_FREQ_HZ * ratio.powf(bar as f64 / self.bars as f64);
            let hi_hz = MIN_FREQ_HZ * ratio.powf((bar + 1) as f64 / self.bars as f64);

            let lo_bin = (lo_hz / bin_hz) as usize;
            let hi_bin = ((hi_hz / bin_hz) as usize).max(lo_bin + 1);
            let hi_bin = hi_bin.min(magnitudes.len());
            let lo_bin = lo_bin.min(hi_bin.saturating_sub(1));

            let band = &magnitudes[lo_bin..hi_bin];
            let mean = band.iter().sum::<f64>() / band.len().max(1) as f64;
            amplitudes.push(mean.min(1.0));
        }
        amplitudes
    }
}
