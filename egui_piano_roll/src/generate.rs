//! 外部音符列表的边界：解析生成器返回的 JSON，以及离线时使用的本地备用生成器。

use crate::error::NoteListError;
use crate::structure::{NoteDraft, Pitch};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Melody,
    Chords,
    Both,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    pub notes: Vec<NoteDraft>,
    pub description: String,
}

#[derive(Deserialize)]
struct RawGeneration {
    notes: Vec<RawNote>,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct RawNote {
    note: String,
    time: f64,
    duration: f64,
    #[serde(default = "default_velocity")]
    velocity: f32,
}

fn default_velocity() -> f32 {
    0.8
}

/// Parses a generator reply. The JSON object may be wrapped in prose; the
/// text between the first `{` and the last `}` is used.
pub fn parse_generation_text(text: &str) -> Result<Generation, NoteListError> {
    let start = text.find('{').ok_or(NoteListError::NoJson)?;
    let end = text.rfind('}').ok_or(NoteListError::NoJson)?;
    if end < start {
        return Err(NoteListError::NoJson);
    }
    let raw: RawGeneration = serde_json::from_str(&text[start..=end])?;
    let notes = raw
        .notes
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let pitch: Pitch = raw.note.parse()?;
            if !raw.time.is_finite() || !raw.duration.is_finite() || raw.time < 0.0 || raw.duration <= 0.0 {
                return Err(NoteListError::InvalidTiming {
                    index,
                    time: raw.time,
                    duration: raw.duration,
                });
            }
            Ok(NoteDraft::new(pitch, raw.time, raw.duration, raw.velocity))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Generation {
        notes,
        description: raw.description,
    })
}

type Phrase = &'static [(&'static str, f64, f64, f32)];

const MELODIES: [Phrase; 3] = [
    // C major scale walk
    &[
        ("C4", 0.0, 1.0, 0.8),
        ("D4", 1.0, 0.5, 0.7),
        ("E4", 1.5, 0.5, 0.8),
        ("F4", 2.0, 1.0, 0.7),
        ("G4", 3.0, 0.5, 0.9),
        ("A4", 3.5, 0.5, 0.8),
        ("B4", 4.0, 1.0, 0.8),
        ("C5", 5.0, 1.0, 0.9),
        ("G4", 6.0, 1.0, 0.8),
        ("C4", 7.0, 1.0, 0.8),
    ],
    // rhythmic
    &[
        ("E4", 0.0, 0.5, 0.8),
        ("G4", 0.5, 0.5, 0.8),
        ("C5", 1.0, 1.0, 0.9),
        ("A4", 2.0, 0.5, 0.7),
        ("F4", 2.5, 0.5, 0.7),
        ("D4", 3.0, 1.0, 0.8),
        ("G4", 4.0, 0.5, 0.8),
        ("B4", 4.5, 0.5, 0.8),
        ("A4", 5.0, 1.0, 0.9),
        ("E4", 6.0, 1.0, 0.7),
        ("C4", 7.0, 1.0, 0.8),
    ],
    // flowing
    &[
        ("F4", 0.0, 0.75, 0.8),
        ("A4", 0.75, 0.75, 0.8),
        ("C5", 1.5, 0.5, 0.9),
        ("B4", 2.0, 0.5, 0.8),
        ("G4", 2.5, 0.75, 0.7),
        ("E4", 3.25, 0.75, 0.7),
        ("D4", 4.0, 1.0, 0.8),
        ("F4", 5.0, 0.5, 0.8),
        ("A4", 5.5, 0.5, 0.8),
        ("G4", 6.0, 2.0, 0.9),
    ],
];

const CHORD_SHAPES: [[&str; 3]; 4] = [
    ["C4", "E4", "G4"], // I
    ["G4", "B4", "D5"], // V
    ["A4", "C5", "E5"], // vi
    ["F4", "A4", "C5"], // IV
];

/// Progressions as indices into `CHORD_SHAPES`.
const PROGRESSIONS: [([usize; 4], &str); 3] = [
    ([0, 1, 2, 3], "I-V-vi-IV"),
    ([2, 3, 0, 1], "vi-IV-I-V"),
    ([0, 2, 3, 1], "I-vi-IV-V"),
];

const CHORD_SECONDS: f64 = 2.0;
const CHORD_VELOCITY: f32 = 0.7;

pub const VARIATIONS: usize = 3;

/// Deterministic fallback output for a given variation (taken modulo 3).
pub fn fallback(kind: GenerationKind, variation: usize) -> Generation {
    let variation = variation % VARIATIONS;
    match kind {
        GenerationKind::Melody => Generation {
            notes: phrase_drafts(MELODIES[variation]),
            description: format!("C major melody variation {} (fallback)", variation + 1),
        },
        GenerationKind::Chords => {
            let (shape_order, name) = PROGRESSIONS[variation];
            let notes = shape_order
                .iter()
                .enumerate()
                .flat_map(|(slot, &shape)| {
                    CHORD_SHAPES[shape].iter().filter_map(move |name| {
                        let pitch: Pitch = name.parse().ok()?;
                        Some(NoteDraft::new(
                            pitch,
                            slot as f64 * CHORD_SECONDS,
                            CHORD_SECONDS,
                            CHORD_VELOCITY,
                        ))
                    })
                })
                .collect();
            Generation {
                notes,
                description: format!("{name} chord progression variation {} (fallback)", variation + 1),
            }
        }
        GenerationKind::Both => {
            let melody = fallback(GenerationKind::Melody, variation);
            let chords = fallback(GenerationKind::Chords, variation);
            let mut notes = melody.notes;
            notes.extend(chords.notes);
            Generation {
                notes,
                description: format!("{} with {}", melody.description, chords.description),
            }
        }
    }
}

/// Fallback output with a variation drawn from `rng`.
pub fn fallback_with_rng(kind: GenerationKind, rng: &mut fastrand::Rng) -> Generation {
    fallback(kind, rng.usize(..VARIATIONS))
}

fn phrase_drafts(phrase: Phrase) -> Vec<NoteDraft> {
    phrase
        .iter()
        .filter_map(|&(name, time, duration, velocity)| {
            let pitch: Pitch = name.parse().ok()?;
            Some(NoteDraft::new(pitch, time, duration, velocity))
        })
        .collect()
}
