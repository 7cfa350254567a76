use crate::error::PitchParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 网格的列数（每列 0.25 秒）
pub const MEASURE_COUNT: usize = 32;
/// 每列对应的时间长度（秒）
pub const SECONDS_PER_MEASURE: f64 = 0.25;
/// 可编辑时间轴的终点（秒）
pub const HORIZON: f64 = MEASURE_COUNT as f64 * SECONDS_PER_MEASURE;
/// 吸附精度：1/16 时间单位
pub const SNAP_DIVISIONS: f64 = 16.0;
pub const MIN_DURATION: f64 = 1.0 / SNAP_DIVISIONS;

/// 音高表：C4..B5，共 24 个
pub const PITCH_COUNT: usize = 24;
pub const LOWEST_KEY: u8 = 60; // C4
pub const HIGHEST_KEY: u8 = LOWEST_KEY + PITCH_COUNT as u8 - 1; // B5

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A pitch in scientific notation, stored as its MIDI key number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch(u8);

impl Pitch {
    pub const C4: Pitch = Pitch(LOWEST_KEY);
    pub const B5: Pitch = Pitch(HIGHEST_KEY);

    pub fn from_key(key: u8) -> Self {
        Pitch(key.min(127))
    }

    pub fn key(self) -> u8 {
        self.0
    }

    /// Row within the grid, counted from the top (B5 = 0, C4 = 23).
    /// `None` when the pitch lies outside the editable alphabet.
    pub fn row_index(self) -> Option<usize> {
        if (LOWEST_KEY..=HIGHEST_KEY).contains(&self.0) {
            Some((HIGHEST_KEY - self.0) as usize)
        } else {
            None
        }
    }

    pub fn from_row(row: usize) -> Self {
        let row = row.min(PITCH_COUNT - 1) as u8;
        Pitch(HIGHEST_KEY - row)
    }

    /// Shifts by `steps` semitones, staying inside the alphabet.
    pub fn transposed_within_alphabet(self, steps: i32) -> Self {
        let key = (self.0 as i32 + steps).clamp(LOWEST_KEY as i32, HIGHEST_KEY as i32);
        Pitch(key as u8)
    }

    pub fn is_black_key(self) -> bool {
        matches!(self.0 % 12, 1 | 3 | 6 | 8 | 10)
    }

    pub fn frequency(self) -> f32 {
        440.0 * 2.0f32.powf((self.0 as f32 - 69.0) / 12.0)
    }

    /// 0 = C through 11 = B.
    pub fn pitch_class(self) -> u8 {
        self.0 % 12
    }

    pub fn name(self) -> String {
        let octave = (self.0 / 12) as i32 - 1;
        format!("{}{}", pitch_class_name(self.pitch_class()), octave)
    }
}

/// Sharp spelling of a pitch class, taken modulo 12.
pub fn pitch_class_name(class: u8) -> &'static str {
    NOTE_NAMES[(class % 12) as usize]
}

/// The 24 editable pitches, highest first (grid row order).
pub fn pitch_alphabet() -> impl DoubleEndedIterator<Item = Pitch> + ExactSizeIterator {
    (0..PITCH_COUNT).map(Pitch::from_row)
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Pitch {
    type Err = PitchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let mut chars = text.chars();
        let letter = chars
            .next()
            .ok_or_else(|| PitchParseError::new(s))?
            .to_ascii_uppercase();
        let base: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(PitchParseError::new(s)),
        };
        let rest = chars.as_str();
        let (accidental, octave_text) = if let Some(r) = rest.strip_prefix('#') {
            (1, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (-1, r)
        } else {
            (0, rest)
        };
        let octave: i32 = octave_text.parse().map_err(|_| PitchParseError::new(s))?;
        // MIDI keys span octaves -1 through 9
        if !(-1..=9).contains(&octave) {
            return Err(PitchParseError::new(s));
        }
        let key = (octave + 1) * 12 + base + accidental;
        if !(0..=127).contains(&key) {
            return Err(PitchParseError::new(s));
        }
        Ok(Pitch(key as u8))
    }
}

impl TryFrom<String> for Pitch {
    type Error = PitchParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.name()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub pitch: Pitch,
    pub start: f64,    // seconds
    pub duration: f64, // seconds
    pub velocity: f32, // 0.0..=1.0
}

impl Note {
    pub fn with_id(id: NoteId, pitch: Pitch, start: f64, duration: f64, velocity: f32) -> Self {
        Self {
            id,
            pitch,
            start,
            duration,
            velocity,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// 外部生成器提供的音符（尚未分配 id）。字段名与生成器 JSON 一致。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub note: Pitch,
    pub time: f64,
    pub duration: f64,
    #[serde(default = "default_draft_velocity")]
    pub velocity: f32,
}

fn default_draft_velocity() -> f32 {
    0.8
}

impl NoteDraft {
    pub fn new(note: Pitch, time: f64, duration: f64, velocity: f32) -> Self {
        Self {
            note,
            time,
            duration,
            velocity,
        }
    }
}

impl From<&Note> for NoteDraft {
    fn from(note: &Note) -> Self {
        Self::new(note.pitch, note.start, note.duration, note.velocity)
    }
}
