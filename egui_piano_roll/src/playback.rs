//! 播放调度：把音符快照转换成按速度缩放的定时发声事件，并处理循环。

use crate::audio::SoundBackend;
use crate::error::PlaybackError;
use crate::scheduler::{millis, TimerQueue};
use crate::structure::{Note, Pitch};

pub const REFERENCE_BPM: u16 = 120;
pub const MIN_BPM: u16 = 60;
pub const MAX_BPM: u16 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PlaybackAction {
    Trigger {
        pitch: Pitch,
        duration: f64,
        velocity: f32,
    },
    EndOfRun,
}

/// What happened during one [`PlaybackScheduler::poll`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub triggered: usize,
    pub failed: usize,
    pub restarted: bool,
    pub finished: bool,
}

pub fn clamp_bpm(bpm: u16) -> u16 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Owns the sound backend and the timers of the current run.
pub struct PlaybackScheduler {
    backend: Box<dyn SoundBackend>,
    timers: TimerQueue<PlaybackAction>,
    state: PlaybackState,
    looping: bool,
    bpm: u16,
    disposed: bool,
}

impl PlaybackScheduler {
    pub fn new(backend: Box<dyn SoundBackend>) -> Self {
        Self {
            backend,
            timers: TimerQueue::new(),
            state: PlaybackState::Stopped,
            looping: false,
            bpm: REFERENCE_BPM,
            disposed: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    pub fn pending_events(&self) -> usize {
        self.timers.len()
    }

    pub fn tempo_multiplier(&self) -> f64 {
        REFERENCE_BPM as f64 / self.bpm as f64
    }

    /// Takes effect at the next end-of-run check.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Clamped to 60..=200. Only affects the next `play`.
    pub fn set_tempo(&mut self, bpm: u16) -> u16 {
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    pub fn adjust_tempo(&mut self, delta: i32) -> u16 {
        let bpm = (self.bpm as i32 + delta).clamp(MIN_BPM as i32, MAX_BPM as i32);
        self.set_tempo(bpm as u16)
    }

    /// Starts a run over `notes`, replacing any run in progress.
    ///
    /// Every note is scheduled at `start * 1000 * multiplier` ms after `now`,
    /// followed by one end-of-run event at the latest note end.
    pub fn play(&mut self, notes: &[Note], now: f64) -> Result<(), PlaybackError> {
        self.timers.cancel_all();
        if let Err(err) = self.backend.ensure_active() {
            log::error!("playback aborted: {err}");
            self.state = PlaybackState::Stopped;
            return Err(PlaybackError::Activation(err));
        }
        if notes.is_empty() {
            log::debug!("nothing to play");
            self.state = PlaybackState::Stopped;
            return Ok(());
        }

        let multiplier = self.tempo_multiplier();
        self.timers.schedule_all(
            now,
            notes.iter().map(|note| {
                (
                    millis(note.start * 1000.0 * multiplier),
                    PlaybackAction::Trigger {
                        pitch: note.pitch,
                        duration: note.duration * multiplier,
                        velocity: note.velocity,
                    },
                )
            }),
        );
        let run_end = notes.iter().map(Note::end).fold(0.0, f64::max);
        let run_ms = run_end * multiplier * 1000.0;
        self.timers
            .schedule_after(now, millis(run_ms), PlaybackAction::EndOfRun);

        self.state = PlaybackState::Playing;
        log::info!(
            "playing {} notes at {} bpm, run length {:.0} ms",
            notes.len(),
            self.bpm,
            run_ms
        );
        Ok(())
    }

    /// Cancels every pending event. Safe to call in any state.
    pub fn stop(&mut self) {
        let cancelled = self.timers.cancel_all();
        if self.state == PlaybackState::Playing {
            log::info!("playback stopped, {cancelled} events cancelled");
            if !self.disposed {
                self.backend.all_notes_off();
            }
        }
        self.state = PlaybackState::Stopped;
    }

    /// Natural end of a run. Voices already sounding keep their release tail.
    fn finish(&mut self) {
        self.timers.cancel_all();
        if self.state == PlaybackState::Playing {
            log::info!("playback finished");
        }
        self.state = PlaybackState::Stopped;
    }

    /// Fires everything due at `now`. On the end-of-run event a looping run
    /// restarts from `snapshot()`, so edits made during playback are heard on
    /// the next pass.
    pub fn poll<F>(&mut self, now: f64, mut snapshot: F) -> PollOutcome
    where
        F: FnMut() -> Vec<Note>,
    {
        let mut outcome = PollOutcome::default();
        while let Some((_, action)) = self.timers.pop_due(now) {
            match action {
                PlaybackAction::Trigger {
                    pitch,
                    duration,
                    velocity,
                } => match self.backend.trigger(pitch, duration, velocity) {
                    Ok(()) => outcome.triggered += 1,
                    Err(err) => {
                        outcome.failed += 1;
                        log::warn!("failed to trigger {pitch}: {err}");
                    }
                },
                PlaybackAction::EndOfRun => {
                    if self.looping && self.is_playing() {
                        log::debug!("loop restart");
                        let notes = snapshot();
                        if self.play(&notes, now).is_err() || !self.is_playing() {
                            outcome.finished = true;
                        } else {
                            outcome.restarted = true;
                        }
                    } else {
                        self.finish();
                        outcome.finished = true;
                    }
                }
            }
        }
        outcome
    }

    /// Sounds a single pitch, outside of any run.
    pub fn play_reference_tone(&mut self, pitch: Pitch, duration: f64, velocity: f32) {
        let result = self
            .backend
            .ensure_active()
            .and_then(|()| self.backend.trigger(pitch, duration, velocity));
        if let Err(err) = result {
            log::warn!("reference tone {pitch} failed: {err}");
        }
    }

    /// Cancels all timers and releases the backend.
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }
        self.stop();
        self.backend.dispose();
        self.disposed = true;
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
