//! Audio output sinks.
//!
//! [`AudioSink`] is the push edge of the decode loop: one fixed-format chunk
//! per call. [`CpalSink`] feeds a bounded [`PcmQueue`] drained by a CPAL
//! output callback (silence on underrun, volume applied from an atomic).
//! [`MemorySink`] captures chunks for tests and headless runs.
//!
//! CPAL streams are not `Send`, so sinks are constructed on the playback
//! thread through a [`SinkFactory`] closure.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::EngineConfig;
use crate::decoder::PcmChunk;
use crate::queue::PcmQueue;
use crate::resample::OUTPUT_CHANNELS;

/// Push-style audio output fed by the decode loop, one chunk per call.
pub trait AudioSink {
    /// Deliver one chunk; blocks while the sink's buffer is full.
    fn write(&mut self, chunk: &PcmChunk<'_>) -> Result<()>;

    /// Set output volume, 0..=100 percent. Legal in any state.
    fn set_volume(&mut self, percent: u8);

    /// Drop buffered audio immediately (stop, seek).
    fn flush(&mut self);

    /// Let buffered audio play out before returning (end of stream).
    fn drain(&mut self) {}
}

/// Constructor invoked on the playback thread to build the session's sink.
pub type SinkFactory = Box<dyn FnOnce(&EngineConfig) -> Result<Box<dyn AudioSink>> + Send>;

/// CPAL-backed sink playing on an output device.
pub struct CpalSink {
    queue: Arc<PcmQueue>,
    volume: Arc<AtomicU8>,
    // Held for its Drop; dropping stops the callback.
    _stream: cpal::Stream,
}

impl CpalSink {
    /// Open the default host's output device (or one matching `needle`)
    /// at the engine's fixed output rate.
    pub fn open(config: &EngineConfig, needle: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = pick_device(&host, needle)?;
        tracing::info!(device = %device.description()?, "output device");

        let supported = pick_output_config(&device, config.output_rate)?;
        let stream_config: cpal::StreamConfig = supported.clone().into();

        let max_samples = (config.output_rate as f32 * config.buffer_seconds.max(0.1)) as usize
            * OUTPUT_CHANNELS;
        let queue = Arc::new(PcmQueue::new(max_samples));
        let volume = Arc::new(AtomicU8::new(100));

        let stream = build_output_stream(
            &device,
            &stream_config,
            supported.sample_format(),
            queue.clone(),
            volume.clone(),
        )?;
        stream.play()?;

        Ok(Self {
            queue,
            volume,
            _stream: stream,
        })
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, chunk: &PcmChunk<'_>) -> Result<()> {
        if !self.queue.push_blocking(chunk.samples) {
            return Err(anyhow!("output queue closed"));
        }
        Ok(())
    }

    fn set_volume(&mut self, percent: u8) {
        self.volume.store(percent.min(100), Ordering::Relaxed);
    }

    fn flush(&mut self) {
        self.queue.clear();
    }

    fn drain(&mut self) {
        self.queue.wait_empty(Duration::from_secs(5));
        // Small grace period for the last callback buffer.
        std::thread::sleep(Duration::from_millis(50));
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.queue.close();
    }
}

/// Pick the first output device matching `needle` (case-insensitive), or
/// the host default.
fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host
        .output_devices()
        .context("No output devices")?
        .collect();

    if let Some(needle) = needle {
        let lowered = needle.trim().to_lowercase();
        if let Some(d) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| !lowered.is_empty() && n.name().to_lowercase().contains(&lowered))
                .unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Pick a supported config whose rate range contains `rate`, preferring
/// stereo layouts and friendlier sample formats.
fn pick_output_config(
    device: &cpal::Device,
    rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> =
        device.supported_output_configs()?.collect();

    let mut best: Option<(u8, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        if rate < range.min_sample_rate() || rate > range.max_sample_rate() {
            continue;
        }
        let channel_rank = if range.channels() as usize == OUTPUT_CHANNELS {
            0
        } else {
            1
        };
        let rank = channel_rank * 10 + sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((best_rank, _)) => rank < *best_rank,
        };
        if replace {
            best = Some((rank, range));
        }
    }

    best.map(|(_, range)| range.with_sample_rate(rate))
        .ok_or_else(|| anyhow!("No output config supports {rate} Hz"))
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I16 => 1,
        cpal::SampleFormat::I32 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 9,
    }
}

/// Log available output devices for the current host.
pub fn list_output_devices() -> Result<()> {
    let host = cpal::default_host();
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: Arc<PcmQueue>,
    volume: Arc<AtomicU8>,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, volume),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, volume),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, volume),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, volume),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Local refill buffer so the callback rarely touches the queue lock.
struct CallbackState {
    src: Vec<i16>,
    pos: usize,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: Arc<PcmQueue>,
    volume: Arc<AtomicU8>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let state = Mutex::new(CallbackState {
        src: Vec::new(),
        pos: 0,
    });

    let err_fn = |err| tracing::warn!("output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let gain = volume.load(Ordering::Relaxed).min(100) as f32 / 100.0;
            let mut st = state.lock().unwrap();

            let frames = data.len() / channels_out;
            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    st.src.clear();
                    match queue.pop_upto(4096 * OUTPUT_CHANNELS) {
                        Some(v) => st.src = v,
                        None => {
                            // Underrun or paused: fill the rest with silence.
                            for idx in (frame * channels_out)..data.len() {
                                data[idx] = T::from_sample::<f32>(0.0);
                            }
                            return;
                        }
                    }
                }

                let base = st.pos;
                let left = sample_at(&st.src, base) * gain;
                let right = sample_at(&st.src, base + 1) * gain;
                for ch in 0..channels_out {
                    let value = match (channels_out, ch) {
                        (1, _) => 0.5 * (left + right),
                        (_, 0) => left,
                        (_, 1) => right,
                        _ => 0.0,
                    };
                    data[frame * channels_out + ch] = T::from_sample::<f32>(value);
                }
                st.pos += OUTPUT_CHANNELS;
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn sample_at(src: &[i16], idx: usize) -> f32 {
    src.get(idx).copied().unwrap_or(0) as f32 / -(i16::MIN as f32)
}

/// Capturing sink for tests and headless runs.
#[derive(Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryCapture>>,
}

/// Everything a [`MemorySink`] has observed so far.
#[derive(Default)]
pub struct MemoryCapture {
    /// Total frames written.
    pub frames: usize,
    /// Position of every chunk, in write order.
    pub positions: Vec<u64>,
    /// Last volume set on the sink.
    pub volume: u8,
    /// Number of flushes observed.
    pub flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the capture state, for inspection from another thread.
    pub fn capture(&self) -> Arc<Mutex<MemoryCapture>> {
        self.state.clone()
    }
}

impl AudioSink for MemorySink {
    fn write(&mut self, chunk: &PcmChunk<'_>) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.frames += chunk.frames();
        st.positions.push(chunk.position_secs);
        Ok(())
    }

    fn set_volume(&mut self, percent: u8) {
        self.state.lock().unwrap().volume = percent.min(100);
    }

    fn flush(&mut self) {
        self.state.lock().unwrap().flushes += 1;
    }
}
