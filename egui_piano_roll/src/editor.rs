use crate::store::NoteDefaults;
use crate::structure::{Note, NoteDraft, NoteId, Pitch};
use serde::{Deserialize, Serialize};

/// 外部宿主可监听的编辑事件
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    NoteAdded(Note),
    NoteDeleted(Note),
    NoteUpdated { before: Note, after: Note },
    NotesReplaced(Vec<Note>),
    SelectionChanged(Vec<NoteId>),
    PlaybackStateChanged { is_playing: bool },
    TempoChanged(u16),
    LoopingChanged(bool),
}

/// 外部生成器结果写入编辑器的方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplacePolicy {
    #[default]
    Replace,
    Append,
}

/// 宿主可推送到编辑器的命令
#[derive(Clone, Debug)]
pub enum EditorCommand {
    SetNotes(Vec<NoteDraft>),
    AppendNotes(Vec<NoteDraft>),
    ClearNotes,
    SetPlayback(bool),
    Stop,
    SetTempo(u16),
    SetLooping(bool),
    PreviewPitch(Pitch),
}

impl EditorCommand {
    pub fn load(notes: Vec<NoteDraft>, policy: ReplacePolicy) -> Self {
        match policy {
            ReplacePolicy::Replace => EditorCommand::SetNotes(notes),
            ReplacePolicy::Append => EditorCommand::AppendNotes(notes),
        }
    }
}

/// 初始化与运行时的配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PianoRollOptions {
    pub default_duration: f64,
    pub default_velocity: f32,
    pub bpm: u16,
    pub looping: bool,
    /// Clicks on empty space this soon after a drag, resize or box select are ignored.
    pub click_suppress_seconds: f64,
    pub resize_handle_width: f32,
    pub key_width: f32,
    pub transport_height: f32,
    /// Length of the tone played when a key label is clicked.
    pub reference_tone_seconds: f64,
    pub reference_tone_velocity: f32,
}

impl Default for PianoRollOptions {
    fn default() -> Self {
        Self {
            default_duration: 0.25,
            default_velocity: 0.8,
            bpm: 120,
            looping: false,
            click_suppress_seconds: 0.05,
            resize_handle_width: 6.0,
            key_width: 60.0,
            transport_height: 35.0,
            reference_tone_seconds: 0.25,
            reference_tone_velocity: 0.8,
        }
    }
}

impl PianoRollOptions {
    pub fn note_defaults(&self) -> NoteDefaults {
        NoteDefaults {
            duration: self.default_duration,
            velocity: self.default_velocity.clamp(0.0, 1.0),
        }
    }

    pub fn looping(looping: bool) -> Self {
        Self {
            looping,
            ..Self::default()
        }
    }
}
