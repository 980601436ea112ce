//! Bounded event lanes between the presentation thread and the playback worker.
//!
//! Two independent lanes:
//! - commands: consumer -> playback worker
//! - notifications: playback worker -> consumer
//!
//! Each lane preserves per-producer send order. Sends block when the lane is
//! full; dropping an endpoint closes its lanes and unblocks the other side.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use waveplay_types::{PlaybackCommand, PlaybackNotification};

/// The peer endpoint disconnected; no further events can cross this lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelClosed;

impl std::fmt::Display for ChannelClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event channel closed")
    }
}

impl std::error::Error for ChannelClosed {}

/// Presentation-side endpoint: sends commands, receives notifications.
///
/// Cloneable so multiple presentation components can issue commands; the
/// notification receiver is shared (single logical consumer).
#[derive(Clone)]
pub struct ConsumerEndpoint {
    commands: Sender<PlaybackCommand>,
    notifications: Receiver<PlaybackNotification>,
}

/// Playback-side endpoint: receives commands, sends notifications.
pub struct EngineEndpoint {
    commands: Receiver<PlaybackCommand>,
    notifications: Sender<PlaybackNotification>,
}

/// Create a connected endpoint pair with `capacity` slots per lane.
pub fn event_channel(capacity: usize) -> (ConsumerEndpoint, EngineEndpoint) {
    let (cmd_tx, cmd_rx) = bounded(capacity.max(1));
    let (note_tx, note_rx) = bounded(capacity.max(1));
    (
        ConsumerEndpoint {
            commands: cmd_tx,
            notifications: note_rx,
        },
        EngineEndpoint {
            commands: cmd_rx,
            notifications: note_tx,
        },
    )
}

impl ConsumerEndpoint {
    /// Send a command, blocking if the lane is full.
    pub fn send(&self, command: PlaybackCommand) -> Result<(), ChannelClosed> {
        self.commands.send(command).map_err(|_| ChannelClosed)
    }

    /// Block until the next notification arrives or the worker shuts down.
    pub fn recv(&self) -> Result<PlaybackNotification, ChannelClosed> {
        self.notifications.recv().map_err(|_| ChannelClosed)
    }

    /// Receive with a deadline; `Ok(None)` when nothing arrived in time.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<PlaybackNotification>, ChannelClosed> {
        match self.notifications.recv_timeout(timeout) {
            Ok(note) => Ok(Some(note)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelClosed),
        }
    }

    /// Non-blocking receive; `Ok(None)` when the lane is currently empty.
    pub fn try_recv(&self) -> Result<Option<PlaybackNotification>, ChannelClosed> {
        match self.notifications.try_recv() {
            Ok(note) => Ok(Some(note)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelClosed),
        }
    }
}

impl EngineEndpoint {
    /// Block until the next command arrives or all senders are gone.
    pub fn recv_command(&self) -> Result<PlaybackCommand, ChannelClosed> {
        self.commands.recv().map_err(|_| ChannelClosed)
    }

    /// Non-blocking receive used inside the decode loop's chunk callback.
    pub fn try_recv_command(&self) -> Result<Option<PlaybackCommand>, ChannelClosed> {
        match self.commands.try_recv() {
            Ok(cmd) => Ok(Some(cmd)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelClosed),
        }
    }

    /// Send a notification, blocking if the lane is full.
    pub fn notify(&self, note: PlaybackNotification) -> Result<(), ChannelClosed> {
        self.notifications.send(note).map_err(|_| ChannelClosed)
    }
}
