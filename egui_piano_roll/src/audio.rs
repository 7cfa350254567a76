use crate::error::SoundError;
use crate::structure::Pitch;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rodio::{OutputStream, OutputStreamHandle, Source};
use std::time::Duration;

/// 编辑器注入的发声能力。
pub trait SoundBackend {
    /// 确保音频输出已启动；已启动时直接返回。
    fn ensure_active(&mut self) -> Result<(), SoundError>;

    /// 以给定力度发声 `duration_seconds` 秒（一对 note-on / note-off）。
    fn trigger(&mut self, pitch: Pitch, duration_seconds: f64, velocity: f32)
        -> Result<(), SoundError>;

    fn all_notes_off(&mut self) {}

    /// 释放音频资源，之后的调用返回 [`SoundError::Disposed`]。
    fn dispose(&mut self);
}

/// 空实现，允许宿主禁用音频输出。
#[derive(Default)]
pub struct NullBackend {
    disposed: bool,
}

impl SoundBackend for NullBackend {
    fn ensure_active(&mut self) -> Result<(), SoundError> {
        if self.disposed {
            return Err(SoundError::Disposed);
        }
        Ok(())
    }

    fn trigger(&mut self, _pitch: Pitch, _duration: f64, _velocity: f32) -> Result<(), SoundError> {
        if self.disposed {
            return Err(SoundError::Disposed);
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

/// 默认的正弦波播放实现，提供多复音与 ADSR。输出设备在第一次
/// `ensure_active` 时打开。
pub struct AudioEngine {
    config: SineSynthConfig,
    output: Option<ActiveOutput>,
    disposed: bool,
}

struct ActiveOutput {
    _stream: OutputStream,
    _handle: OutputStreamHandle,
    sender: Sender<AudioMessage>,
}

impl AudioEngine {
    pub fn new() -> Self {
        Self::with_config(SineSynthConfig::default())
    }

    pub fn with_config(config: SineSynthConfig) -> Self {
        Self {
            config,
            output: None,
            disposed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.output.is_some()
    }

    fn open_output(config: SineSynthConfig) -> Result<ActiveOutput, SoundError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|err| SoundError::Unavailable(err.to_string()))?;
        let (sender, receiver) = unbounded();
        let synth = PolyphonicSynth::new(receiver, config);
        handle
            .play_raw(synth.convert_samples())
            .map_err(|err| SoundError::Unavailable(err.to_string()))?;
        log::info!("audio output opened at {} Hz", config.sample_rate);
        Ok(ActiveOutput {
            _stream: stream,
            _handle: handle,
            sender,
        })
    }

    fn dispatch(&self, msg: AudioMessage) -> Result<(), SoundError> {
        if self.disposed {
            return Err(SoundError::Disposed);
        }
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| SoundError::Unavailable("output not started".into()))?;
        output
            .sender
            .send(msg)
            .map_err(|_| SoundError::Rejected("synth thread has stopped".into()))
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundBackend for AudioEngine {
    fn ensure_active(&mut self) -> Result<(), SoundError> {
        if self.disposed {
            return Err(SoundError::Disposed);
        }
        if self.output.is_none() {
            self.output = Some(Self::open_output(self.config)?);
        }
        Ok(())
    }

    fn trigger(&mut self, pitch: Pitch, duration_seconds: f64, velocity: f32) -> Result<(), SoundError> {
        let hold_samples = (duration_seconds.max(0.0) * self.config.sample_rate as f64) as u64;
        self.dispatch(AudioMessage::NoteOn {
            key: pitch.key(),
            velocity: velocity.clamp(0.0, 1.0),
            hold_samples,
        })
    }

    fn all_notes_off(&mut self) {
        let _ = self.dispatch(AudioMessage::AllNotesOff);
    }

    fn dispose(&mut self) {
        if let Some(output) = self.output.take() {
            let _ = output.sender.send(AudioMessage::AllNotesOff);
            log::info!("audio output closed");
        }
        self.disposed = true;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SineSynthConfig {
    pub sample_rate: u32,
    pub max_voices: usize,
    pub attack_ms: f32,
    pub decay_ms: f32,
    pub sustain_level: f32,
    pub release_ms: f32,
    pub volume: f32,
}

impl Default for SineSynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            max_voices: 32,
            attack_ms: 8.0,
            decay_ms: 60.0,
            sustain_level: 0.75,
            release_ms: 150.0,
            volume: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum AudioMessage {
    NoteOn {
        key: u8,
        velocity: f32,
        hold_samples: u64,
    },
    AllNotesOff,
}

/// Mono mixer fed through the message channel. Runs on the rodio thread.
struct PolyphonicSynth {
    receiver: Receiver<AudioMessage>,
    voices: Vec<Voice>,
    config: SineSynthConfig,
    gain: f32,
}

impl PolyphonicSynth {
    fn new(receiver: Receiver<AudioMessage>, config: SineSynthConfig) -> Self {
        Self {
            receiver,
            voices: Vec::new(),
            config,
            gain: config.volume.clamp(0.0, 2.0) * 0.7,
        }
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            match msg {
                AudioMessage::NoteOn {
                    key,
                    velocity,
                    hold_samples,
                } => self.start_voice(key, velocity, hold_samples),
                AudioMessage::AllNotesOff => self.voices.clear(),
            }
        }
    }

    /// Retriggering a key replaces its voice; past the voice limit the oldest is stolen.
    fn start_voice(&mut self, key: u8, velocity: f32, hold_samples: u64) {
        if let Some(index) = self.voices.iter().position(|v| v.key == key) {
            self.voices.remove(index);
        } else if self.voices.len() >= self.config.max_voices.max(1) {
            self.voices.remove(0);
        }
        self.voices
            .push(Voice::new(key, velocity, hold_samples, &self.config));
    }

    fn render(&mut self) -> f32 {
        let mix: f32 = self.voices.iter_mut().map(Voice::render).sum();
        self.voices.retain(|v| !v.is_silent());
        (mix * self.gain).tanh()
    }
}

impl Iterator for PolyphonicSynth {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.drain_messages();
        Some(self.render())
    }
}

impl Source for PolyphonicSynth {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// A sine voice that holds for a fixed number of samples, then releases itself.
struct Voice {
    key: u8,
    phase: f32,
    phase_step: f32,
    amplitude: f32,
    hold: u64,
    envelope: Envelope,
}

impl Voice {
    fn new(key: u8, velocity: f32, hold_samples: u64, config: &SineSynthConfig) -> Self {
        Self {
            key,
            phase: 0.0,
            phase_step: Pitch::from_key(key).frequency() / config.sample_rate.max(1) as f32,
            amplitude: velocity,
            hold: hold_samples,
            envelope: Envelope::new(config),
        }
    }

    fn render(&mut self) -> f32 {
        if self.hold == 0 {
            self.envelope.release();
        } else {
            self.hold -= 1;
        }
        let sample = (self.phase * std::f32::consts::TAU).sin() * self.amplitude * self.envelope.advance();
        self.phase = (self.phase + self.phase_step).fract();
        sample
    }

    fn is_silent(&self) -> bool {
        self.envelope.is_done()
    }
}

/// Linear ADSR evaluated from the sample count since note-on, or since release.
struct Envelope {
    attack: u32,
    decay: u32,
    sustain: f32,
    release: u32,
    elapsed: u32,
    released_from: Option<f32>,
    level: f32,
}

impl Envelope {
    fn new(config: &SineSynthConfig) -> Self {
        let samples = |ms: f32| (ms.max(0.0) / 1000.0 * config.sample_rate as f32).round() as u32;
        Self {
            attack: samples(config.attack_ms),
            decay: samples(config.decay_ms),
            sustain: config.sustain_level.clamp(0.0, 1.0),
            release: samples(config.release_ms),
            elapsed: 0,
            released_from: None,
            level: 0.0,
        }
    }

    fn release(&mut self) {
        if self.released_from.is_none() {
            self.released_from = Some(self.level);
            self.elapsed = 0;
        }
    }

    fn advance(&mut self) -> f32 {
        self.elapsed = self.elapsed.saturating_add(1);
        let t = self.elapsed;
        self.level = match self.released_from {
            Some(from) => ramp(from, 0.0, t, self.release),
            None if t <= self.attack => ramp(0.0, 1.0, t, self.attack),
            None => ramp(1.0, self.sustain, t - self.attack, self.decay),
        };
        self.level
    }

    fn is_done(&self) -> bool {
        self.released_from.is_some() && self.elapsed >= self.release
    }
}

fn ramp(from: f32, to: f32, t: u32, len: u32) -> f32 {
    if t >= len {
        to
    } else {
        from + (to - from) * t as f32 / len as f32
    }
}
