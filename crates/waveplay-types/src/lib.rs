//! Shared value types crossing the playback event channel.
//!
//! Everything here is moved by value between the presentation thread and the
//! playback worker; none of these types borrow engine internals.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Closed set of playback failure codes surfaced on the notification lane.
///
/// Success is represented by `Ok(())` at the API level, not by a code.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The container could not be opened, probed, or has no audio track.
    #[error("file is not a supported audio format")]
    FileNotSupported,
    /// Codec or pipeline setup failed for reasons outside the other codes.
    #[error("unknown playback error")]
    UnknownError,
    /// The codec rejected a packet mid-stream.
    #[error("failed to decode file")]
    DecodeFileFailed,
    /// A requested container seek could not be performed.
    #[error("failed to seek within file")]
    SeekFrameFailed,
}

/// Playback session state as reported to the consumer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// No track loaded.
    Idle,
    /// Decode loop running, audio flowing to the sink.
    Playing,
    /// Track loaded, decode halted, cursor retained.
    Paused,
    /// Last open/decode attempt failed; recoverable only via a new `Play`.
    Error,
}

/// Immutable description of an opened audio stream.
///
/// Produced once per successful open and consumed read-only afterwards.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackInfo {
    /// Track title from container metadata, when tagged.
    pub title: Option<String>,
    /// Artist from container metadata, when tagged.
    pub artist: Option<String>,
    /// Source channel count (before downmix to the fixed output layout).
    pub channels: u16,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Approximate stream bit rate in bits per second, when derivable.
    pub bit_rate: Option<u32>,
    /// Source bit depth, when declared by the codec.
    pub bit_depth: Option<u32>,
    /// Total duration in whole seconds.
    pub duration_secs: u64,
}

/// Commands issued by the consumer, consumed exactly once by the session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackCommand {
    /// Open `path` and start playing it, replacing any current track.
    Play { path: PathBuf },
    /// Close the current track and return to idle.
    Stop,
    /// Toggle between playing and paused.
    PauseResume,
    /// Set output volume, 0..=100 percent.
    SetVolume { percent: u8 },
    /// Jump to an absolute position in whole seconds.
    Seek { seconds: u64 },
    /// Change the number of spectrum bars produced by the analyzer.
    ResizeAnalysis { bars: usize },
    /// Shut the playback worker down.
    Quit,
}

/// Notifications emitted by the session, consumed by the presentation layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackNotification {
    /// A track was opened successfully.
    TrackLoaded(TrackInfo),
    /// The current track was closed (stop or natural end of stream).
    TrackCleared,
    /// Output volume changed, 0..=100 percent.
    VolumeChanged { percent: u8 },
    /// Session state transition, also used to acknowledge no-op commands.
    StateChanged { state: PlayerState },
    /// Playback position advanced to a new whole second.
    Progress { seconds: u64 },
    /// One spectrum frame, `bars` log-spaced amplitudes in `0.0..=1.0`.
    Spectrum { amplitudes: Vec<f64> },
    /// An operation failed with one of the closed error codes.
    Failed { code: ErrorCode },
}
