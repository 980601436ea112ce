//! Playback session: the command loop and state machine.
//!
//! A session owns one [`MediaDecoder`] and one [`AudioSink`] on a dedicated
//! worker thread. Commands arrive over the engine endpoint; while a track is
//! playing they are sampled once per decoded chunk inside the decode
//! callback, so pause/stop/seek latency is bounded by one chunk. All state
//! lives on the worker thread; nothing is shared with the consumer except
//! the channel lanes.

use std::path::PathBuf;
use std::thread::JoinHandle;

use waveplay_types::{ErrorCode, PlaybackCommand, PlaybackNotification, PlayerState};

use crate::analysis::SpectrumAnalyzer;
use crate::channel::EngineEndpoint;
use crate::config::EngineConfig;
use crate::decoder::{DecodeControl, MediaDecoder, PcmChunk};
use crate::sink::{AudioSink, SinkFactory};

/// Handle to a running playback worker thread.
pub struct PlaybackSession {
    handle: JoinHandle<()>,
}

impl PlaybackSession {
    /// Start the worker thread.
    ///
    /// The sink is constructed inside the thread via `sink_factory` since
    /// output streams are generally not `Send`.
    pub fn spawn(
        config: EngineConfig,
        endpoint: EngineEndpoint,
        decoder: Box<dyn MediaDecoder>,
        sink_factory: SinkFactory,
    ) -> Self {
        let handle = std::thread::spawn(move || {
            let sink = match sink_factory(&config) {
                Ok(sink) => sink,
                Err(e) => {
                    tracing::error!("sink init failed: {e:#}");
                    let _ = endpoint.notify(PlaybackNotification::Failed {
                        code: ErrorCode::UnknownError,
                    });
                    return;
                }
            };
            Worker::new(config, endpoint, decoder, sink).run();
        });
        Self { handle }
    }

    /// Wait for the worker to exit (after `Quit` or endpoint disconnect).
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

/// Why the decode loop returned control to the command loop.
enum DecodeOutcome {
    /// End of stream reached.
    Finished,
    /// Pause requested; handle stays open, cursor retained.
    Paused,
    /// Stop requested.
    Stopped,
    /// A new `Play` arrived mid-track.
    NextTrack(PathBuf),
    /// Worker shutdown requested.
    Quit,
    /// The sink rejected a chunk.
    SinkFailed,
}

struct Worker {
    config: EngineConfig,
    endpoint: EngineEndpoint,
    decoder: Box<dyn MediaDecoder>,
    sink: Box<dyn AudioSink>,
    analyzer: SpectrumAnalyzer,
    state: PlayerState,
    /// Position of the last delivered chunk, in seconds.
    cursor_secs: u64,
    /// Seek issued as the first instruction of the next decode entry.
    pending_seek: Option<u64>,
    quit: bool,
}

impl Worker {
    fn new(
        config: EngineConfig,
        endpoint: EngineEndpoint,
        decoder: Box<dyn MediaDecoder>,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        let analyzer = SpectrumAnalyzer::new(config.output_rate, config.spectrum_bars);
        Self {
            config,
            endpoint,
            decoder,
            sink,
            analyzer,
            state: PlayerState::Idle,
            cursor_secs: 0,
            pending_seek: None,
            quit: false,
        }
    }

    fn run(mut self) {
        while !self.quit {
            if self.state == PlayerState::Playing {
                self.run_decode();
                continue;
            }
            match self.endpoint.recv_command() {
                Ok(cmd) => self.handle_command(cmd),
                Err(_) => break,
            }
        }
        self.decoder.close();
        tracing::debug!("playback worker exited");
    }

    /// Handle a command while no decode loop is running.
    fn handle_command(&mut self, cmd: PlaybackCommand) {
        match cmd {
            PlaybackCommand::Play { path } => self.start_track(path),
            PlaybackCommand::Stop => match self.state {
                PlayerState::Paused => {
                    self.sink.flush();
                    self.clear_track();
                }
                // Nothing to stop; acknowledge with the current state.
                _ => self.ack_state(),
            },
            PlaybackCommand::PauseResume => match self.state {
                PlayerState::Paused => {
                    // Re-enter decode with a seek to the retained cursor so
                    // delivery continues exactly where it paused.
                    self.pending_seek = Some(self.cursor_secs);
                    self.set_state(PlayerState::Playing);
                }
                _ => self.ack_state(),
            },
            PlaybackCommand::Seek { seconds } => match self.state {
                PlayerState::Paused => {
                    self.cursor_secs = seconds;
                    self.pending_seek = Some(seconds);
                    self.analyzer.reset();
                    self.ack_state();
                }
                _ => self.ack_state(),
            },
            PlaybackCommand::SetVolume { percent } => self.apply_volume(percent),
            PlaybackCommand::ResizeAnalysis { bars } => self.analyzer.set_bars(bars),
            PlaybackCommand::Quit => self.quit = true,
        }
    }

    /// Tear down any current track and open `path`.
    fn start_track(&mut self, path: PathBuf) {
        self.decoder.close();
        self.sink.flush();
        self.analyzer.reset();
        self.pending_seek = None;
        self.cursor_secs = 0;

        match self.decoder.open(&path) {
            Ok(info) => {
                self.notify(PlaybackNotification::TrackLoaded(info));
                self.set_state(PlayerState::Playing);
            }
            Err(code) => {
                tracing::warn!(path = %path.display(), "open failed: {code}");
                self.notify(PlaybackNotification::Failed { code });
                self.set_state(PlayerState::Idle);
            }
        }
    }

    /// Run the blocking decode loop until it yields an outcome.
    fn run_decode(&mut self) {
        let chunk_frames = self.config.chunk_frames;
        let mut outcome = DecodeOutcome::Finished;
        let mut disconnected = false;

        let result = {
            let Worker {
                endpoint,
                decoder,
                sink,
                analyzer,
                cursor_secs,
                pending_seek,
                ..
            } = self;
            let mut last_progress: Option<u64> = None;

            decoder.decode(chunk_frames, &mut |chunk: PcmChunk<'_>| {
                if let Some(target) = pending_seek.take() {
                    return DecodeControl::SeekTo(target);
                }

                if sink.write(&chunk).is_err() {
                    outcome = DecodeOutcome::SinkFailed;
                    return DecodeControl::Stop;
                }
                *cursor_secs = chunk.position_secs;

                let mut closed = false;
                if last_progress != Some(chunk.position_secs) {
                    last_progress = Some(chunk.position_secs);
                    closed |= endpoint
                        .notify(PlaybackNotification::Progress {
                            seconds: chunk.position_secs,
                        })
                        .is_err();
                }
                if let Some(amplitudes) = analyzer.feed(chunk.samples) {
                    closed |= endpoint
                        .notify(PlaybackNotification::Spectrum { amplitudes })
                        .is_err();
                }
                if closed {
                    disconnected = true;
                    return DecodeControl::Stop;
                }

                // Sample the command lane once per chunk.
                match endpoint.try_recv_command() {
                    Err(_) => {
                        disconnected = true;
                        DecodeControl::Stop
                    }
                    Ok(None) => DecodeControl::Continue,
                    Ok(Some(cmd)) => match cmd {
                        PlaybackCommand::Play { path } => {
                            outcome = DecodeOutcome::NextTrack(path);
                            DecodeControl::Stop
                        }
                        PlaybackCommand::Stop => {
                            outcome = DecodeOutcome::Stopped;
                            DecodeControl::Stop
                        }
                        PlaybackCommand::PauseResume => {
                            outcome = DecodeOutcome::Paused;
                            DecodeControl::Stop
                        }
                        PlaybackCommand::Seek { seconds } => {
                            // Samples buffered before the jump must not
                            // bleed into the next spectrum frame.
                            analyzer.reset();
                            *cursor_secs = seconds;
                            DecodeControl::SeekTo(seconds)
                        }
                        PlaybackCommand::SetVolume { percent } => {
                            let percent = percent.min(100);
                            sink.set_volume(percent);
                            if endpoint
                                .notify(PlaybackNotification::VolumeChanged { percent })
                                .is_err()
                            {
                                disconnected = true;
                                return DecodeControl::Stop;
                            }
                            DecodeControl::Continue
                        }
                        PlaybackCommand::ResizeAnalysis { bars } => {
                            analyzer.set_bars(bars);
                            DecodeControl::Continue
                        }
                        PlaybackCommand::Quit => {
                            outcome = DecodeOutcome::Quit;
                            DecodeControl::Stop
                        }
                    },
                }
            })
        };

        if disconnected {
            self.quit = true;
            return;
        }

        match result {
            Err(code) => {
                // Decode and seek failures abort the track; only a fresh
                // Play recovers the session.
                self.decoder.close();
                self.notify(PlaybackNotification::Failed { code });
                self.set_state(PlayerState::Error);
            }
            Ok(()) => match outcome {
                DecodeOutcome::Finished => {
                    self.sink.drain();
                    self.clear_track();
                }
                DecodeOutcome::Paused => self.set_state(PlayerState::Paused),
                DecodeOutcome::Stopped => {
                    self.sink.flush();
                    self.clear_track();
                }
                DecodeOutcome::NextTrack(path) => self.start_track(path),
                DecodeOutcome::Quit => self.quit = true,
                DecodeOutcome::SinkFailed => {
                    self.decoder.close();
                    self.notify(PlaybackNotification::Failed {
                        code: ErrorCode::UnknownError,
                    });
                    self.set_state(PlayerState::Error);
                }
            },
        }
    }

    /// Close the current track and return to idle.
    fn clear_track(&mut self) {
        self.decoder.close();
        self.analyzer.reset();
        self.cursor_secs = 0;
        self.pending_seek = None;
        self.notify(PlaybackNotification::TrackCleared);
        self.set_state(PlayerState::Idle);
    }

    fn apply_volume(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.sink.set_volume(percent);
        self.notify(PlaybackNotification::VolumeChanged { percent });
    }

    fn set_state(&mut self, state: PlayerState) {
        self.state = state;
        self.notify(PlaybackNotification::StateChanged { state });
    }

    /// Acknowledge a command that is a no-op in the current state.
    fn ack_state(&mut self) {
        let state = self.state;
        self.notify(PlaybackNotification::StateChanged { state });
    }

    fn notify(&mut self, note: PlaybackNotification) {
        if self.endpoint.notify(note).is_err() {
            self.quit = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ConsumerEndpoint, event_channel};
    use crate::sink::{MemoryCapture, MemorySink};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use waveplay_types::TrackInfo;

    /// Scripted decoder delivering one silent chunk per whole second.
    struct ScriptedDecoder {
        duration_secs: u64,
        fail_open: Option<ErrorCode>,
        fail_decode_at: Option<u64>,
        /// Positions below this emit half-scale samples, the rest silence.
        loud_until: u64,
        opened: bool,
        position: u64,
    }

    impl ScriptedDecoder {
        fn new(duration_secs: u64) -> Self {
            Self {
                duration_secs,
                fail_open: None,
                fail_decode_at: None,
                loud_until: 0,
                opened: false,
                position: 0,
            }
        }
    }

    impl MediaDecoder for ScriptedDecoder {
        fn open(&mut self, _path: &Path) -> Result<TrackInfo, ErrorCode> {
            self.close();
            if let Some(code) = self.fail_open {
                return Err(code);
            }
            self.opened = true;
            self.position = 0;
            Ok(TrackInfo {
                title: Some("scripted".into()),
                channels: 2,
                sample_rate: 44_100,
                duration_secs: self.duration_secs,
                ..Default::default()
            })
        }

        fn decode(
            &mut self,
            chunk_frames: usize,
            on_chunk: &mut dyn FnMut(PcmChunk<'_>) -> DecodeControl,
        ) -> Result<(), ErrorCode> {
            assert!(self.opened);
            let frames = chunk_frames.max(1);
            loop {
                if let Some(at) = self.fail_decode_at {
                    if self.position >= at {
                        return Err(ErrorCode::DecodeFileFailed);
                    }
                }
                if self.position >= self.duration_secs {
                    return Ok(());
                }
                let level = if self.position < self.loud_until {
                    i16::MAX / 2
                } else {
                    0
                };
                let samples = vec![level; frames * 2];
                let chunk = PcmChunk {
                    samples: &samples,
                    position_secs: self.position,
                };
                match on_chunk(chunk) {
                    DecodeControl::Continue => {
                        self.position += 1;
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    DecodeControl::Stop => return Ok(()),
                    DecodeControl::SeekTo(t) => {
                        self.position = t.min(self.duration_secs);
                    }
                }
            }
        }

        fn close(&mut self) {
            self.opened = false;
        }
    }

    fn spawn_session(
        decoder: ScriptedDecoder,
    ) -> (ConsumerEndpoint, PlaybackSession, Arc<Mutex<MemoryCapture>>) {
        let sink = MemorySink::new();
        let capture = sink.capture();
        let (consumer, engine) = event_channel(256);
        let session = PlaybackSession::spawn(
            EngineConfig {
                chunk_frames: 64,
                ..EngineConfig::default()
            },
            engine,
            Box::new(decoder),
            Box::new(move |_| Ok(Box::new(sink) as Box<dyn AudioSink>)),
        );
        (consumer, session, capture)
    }

    /// Receive notifications until one matches, failing after `timeout`.
    fn wait_for(
        consumer: &ConsumerEndpoint,
        timeout: Duration,
        mut pred: impl FnMut(&PlaybackNotification) -> bool,
    ) -> PlaybackNotification {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .expect("timed out waiting for notification");
            if let Some(note) = consumer.recv_timeout(remaining).unwrap() {
                if pred(&note) {
                    return note;
                }
            }
        }
    }

    fn shut_down(consumer: ConsumerEndpoint, session: PlaybackSession) {
        let _ = consumer.send(PlaybackCommand::Quit);
        // Drain so a backpressured worker can observe the command.
        while consumer.recv().is_ok() {}
        session.join();
    }

    #[test]
    fn play_emits_loaded_then_playing() {
        let (consumer, session, _) = spawn_session(ScriptedDecoder::new(1_000));
        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("a.flac"),
            })
            .unwrap();

        let first = consumer.recv().unwrap();
        assert!(matches!(first, PlaybackNotification::TrackLoaded(ref info) if info.duration_secs == 1_000));
        let second = consumer.recv().unwrap();
        assert_eq!(
            second,
            PlaybackNotification::StateChanged {
                state: PlayerState::Playing
            }
        );

        shut_down(consumer, session);
    }

    #[test]
    fn open_failure_reports_code_and_returns_to_idle() {
        let mut decoder = ScriptedDecoder::new(10);
        decoder.fail_open = Some(ErrorCode::FileNotSupported);
        let (consumer, session, _) = spawn_session(decoder);

        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("broken.xyz"),
            })
            .unwrap();

        assert_eq!(
            consumer.recv().unwrap(),
            PlaybackNotification::Failed {
                code: ErrorCode::FileNotSupported
            }
        );
        assert_eq!(
            consumer.recv().unwrap(),
            PlaybackNotification::StateChanged {
                state: PlayerState::Idle
            }
        );

        shut_down(consumer, session);
    }

    #[test]
    fn set_volume_yields_exactly_one_notification_and_no_state_change() {
        let (consumer, session, capture) = spawn_session(ScriptedDecoder::new(10));
        consumer
            .send(PlaybackCommand::SetVolume { percent: 30 })
            .unwrap();

        assert_eq!(
            consumer.recv().unwrap(),
            PlaybackNotification::VolumeChanged { percent: 30 }
        );
        // Nothing else follows while idle.
        assert_eq!(consumer.recv_timeout(Duration::from_millis(50)).unwrap(), None);
        assert_eq!(capture.lock().unwrap().volume, 30);

        shut_down(consumer, session);
    }

    #[test]
    fn volume_is_clamped_to_100() {
        let (consumer, session, _) = spawn_session(ScriptedDecoder::new(10));
        consumer
            .send(PlaybackCommand::SetVolume { percent: 250 })
            .unwrap();
        assert_eq!(
            consumer.recv().unwrap(),
            PlaybackNotification::VolumeChanged { percent: 100 }
        );
        shut_down(consumer, session);
    }

    #[test]
    fn invalid_command_is_acknowledged_with_current_state() {
        let (consumer, session, _) = spawn_session(ScriptedDecoder::new(10));
        consumer.send(PlaybackCommand::Seek { seconds: 10 }).unwrap();
        assert_eq!(
            consumer.recv().unwrap(),
            PlaybackNotification::StateChanged {
                state: PlayerState::Idle
            }
        );
        shut_down(consumer, session);
    }

    #[test]
    fn natural_end_of_stream_clears_track() {
        let (consumer, session, _) = spawn_session(ScriptedDecoder::new(3));
        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("short.flac"),
            })
            .unwrap();

        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::TrackCleared)
        });
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::StateChanged {
                    state: PlayerState::Idle
                }
            )
        });

        shut_down(consumer, session);
    }

    #[test]
    fn stop_during_playback_clears_and_allows_replay() {
        let (consumer, session, _) = spawn_session(ScriptedDecoder::new(1_000));
        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("a.flac"),
            })
            .unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { .. })
        });

        consumer.send(PlaybackCommand::Stop).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::TrackCleared)
        });

        // A fresh Play succeeds after stop.
        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("b.flac"),
            })
            .unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::TrackLoaded(_))
        });

        shut_down(consumer, session);
    }

    #[test]
    fn seek_jumps_forward_and_never_revisits_earlier_positions() {
        let (consumer, session, capture) = spawn_session(ScriptedDecoder::new(1_000));
        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("a.flac"),
            })
            .unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { .. })
        });

        consumer.send(PlaybackCommand::Seek { seconds: 500 }).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { seconds } if *seconds >= 500)
        });

        shut_down(consumer, session);

        let positions = capture.lock().unwrap().positions.clone();
        let jump = positions.iter().position(|&p| p >= 500).unwrap();
        assert!(positions[jump..].iter().all(|&p| p >= 500));
    }

    #[test]
    fn pause_then_resume_continues_from_cursor() {
        let (consumer, session, capture) = spawn_session(ScriptedDecoder::new(1_000));
        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("a.flac"),
            })
            .unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { seconds } if *seconds >= 2)
        });

        consumer.send(PlaybackCommand::PauseResume).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::StateChanged {
                    state: PlayerState::Paused
                }
            )
        });
        let paused_at = *capture.lock().unwrap().positions.last().unwrap();

        consumer.send(PlaybackCommand::PauseResume).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::StateChanged {
                    state: PlayerState::Playing
                }
            )
        });
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { seconds } if *seconds > paused_at)
        });

        shut_down(consumer, session);

        let positions = capture.lock().unwrap().positions.clone();
        // Delivery resumes at the pause cursor, never earlier.
        let resume = positions.iter().rposition(|&p| p == paused_at).unwrap();
        assert!(positions[resume..].windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn spectrum_after_seek_reflects_only_post_seek_audio() {
        let mut decoder = ScriptedDecoder::new(1_000);
        decoder.loud_until = 400;
        let (consumer, session, _) = spawn_session(decoder);

        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("a.flac"),
            })
            .unwrap();
        // The loud region must register before the jump.
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Spectrum { amplitudes }
                if amplitudes.iter().any(|&a| a > 1e-3))
        });

        consumer.send(PlaybackCommand::Seek { seconds: 500 }).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { seconds } if *seconds >= 500)
        });

        // The first frame computed after the jump sees only silence.
        let frame = wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Spectrum { .. })
        });
        let PlaybackNotification::Spectrum { amplitudes } = frame else {
            unreachable!()
        };
        assert!(
            amplitudes.iter().all(|&a| a < 1e-3),
            "stale audio in spectrum: {amplitudes:?}"
        );

        shut_down(consumer, session);
    }

    #[test]
    fn seek_while_paused_applies_on_resume() {
        let (consumer, session, capture) = spawn_session(ScriptedDecoder::new(1_000));
        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("a.flac"),
            })
            .unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { .. })
        });

        consumer.send(PlaybackCommand::PauseResume).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::StateChanged {
                    state: PlayerState::Paused
                }
            )
        });

        consumer.send(PlaybackCommand::Seek { seconds: 700 }).unwrap();
        // Still paused; the seek is acknowledged with the current state.
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::StateChanged {
                    state: PlayerState::Paused
                }
            )
        });

        consumer.send(PlaybackCommand::PauseResume).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(n, PlaybackNotification::Progress { seconds } if *seconds >= 700)
        });

        shut_down(consumer, session);

        let positions = capture.lock().unwrap().positions.clone();
        let jump = positions.iter().position(|&p| p >= 700).unwrap();
        assert!(positions[jump..].iter().all(|&p| p >= 700));
    }

    #[test]
    fn decode_failure_moves_session_to_error_then_play_recovers() {
        let mut decoder = ScriptedDecoder::new(1_000);
        decoder.fail_decode_at = Some(3);
        let (consumer, session, _) = spawn_session(decoder);

        consumer
            .send(PlaybackCommand::Play {
                path: PathBuf::from("a.flac"),
            })
            .unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::Failed {
                    code: ErrorCode::DecodeFileFailed
                }
            )
        });
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::StateChanged {
                    state: PlayerState::Error
                }
            )
        });

        // Error state ignores pause but accepts a new Play.
        consumer.send(PlaybackCommand::PauseResume).unwrap();
        wait_for(&consumer, Duration::from_secs(5), |n| {
            matches!(
                n,
                PlaybackNotification::StateChanged {
                    state: PlayerState::Error
                }
            )
        });

        shut_down(consumer, session);
    }
}
