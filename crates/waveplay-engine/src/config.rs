/// Tuning parameters shared by the decode, output, and analysis stages.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Decode chunk size in output frames; one chunk per callback.
    pub chunk_frames: usize,
    /// Fixed output sample rate in Hz after resampling.
    pub output_rate: u32,
    /// Capacity of each event-channel lane.
    pub lane_capacity: usize,
    /// Target buffering for the sink queue, in seconds of output audio.
    pub buffer_seconds: f32,
    /// Initial number of spectrum bars.
    pub spectrum_bars: usize,
}

impl Default for EngineConfig {
    /// Defaults tuned for responsive control with stable output.
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            output_rate: 44_100,
            lane_capacity: 64,
            buffer_seconds: 0.5,
            spectrum_bars: 16,
        }
    }
}
