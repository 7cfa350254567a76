//! 对当前音符做简单的乐理分析：调性、和弦、速度感与情绪描述。

use crate::structure::{pitch_class_name, Note};
use std::collections::BTreeMap;
use std::fmt;

const MAJOR_STEPS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_STEPS: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Notes starting in the same half second are heard as one chord.
const CHORD_WINDOW: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scale {
    Major,
    Minor,
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Major => f.write_str("Major"),
            Scale::Minor => f.write_str("Minor"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chord {
    /// Pitch class of the root, 0 = C.
    pub root: u8,
    pub quality: Scale,
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", pitch_class_name(self.root), self.quality)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pace {
    Fast,
    Medium,
    Slow,
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pace::Fast => f.write_str("fast"),
            Pace::Medium => f.write_str("medium"),
            Pace::Slow => f.write_str("slow"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MusicAnalysis {
    /// Pitch class of the tonic.
    pub key: u8,
    pub scale: Scale,
    /// Distinct chords in order of first appearance.
    pub chords: Vec<Chord>,
    pub pace: Pace,
    pub mood: &'static str,
    pub explanation: String,
}

impl MusicAnalysis {
    pub fn key_name(&self) -> String {
        format!("{} {}", pitch_class_name(self.key), self.scale)
    }
}

pub fn analyze(notes: &[Note]) -> MusicAnalysis {
    if notes.is_empty() {
        return MusicAnalysis {
            key: 0,
            scale: Scale::Major,
            chords: Vec::new(),
            pace: Pace::Medium,
            mood: "Neutral",
            explanation: "No musical content detected.".to_owned(),
        };
    }

    let (key, scale) = detect_key(notes);
    let chords = detect_chords(notes);
    let average = notes.iter().map(|n| n.duration).sum::<f64>() / notes.len() as f64;
    let pace = if average < 0.5 {
        Pace::Fast
    } else if average > 1.0 {
        Pace::Slow
    } else {
        Pace::Medium
    };
    let rich = chords.len() > 2;
    let mood = match (scale, rich) {
        (Scale::Major, true) => "Uplifting and complex",
        (Scale::Major, false) => "Bright and simple",
        (Scale::Minor, true) => "Melancholic but rich",
        (Scale::Minor, false) => "Contemplative",
    };

    let mut explanation = format!(
        "This {pace}-paced piece in {} {scale} has a {} feel.",
        pitch_class_name(key),
        mood.to_lowercase()
    );
    if !chords.is_empty() {
        let progression: Vec<String> = chords.iter().map(Chord::to_string).collect();
        explanation.push_str(&format!(
            " The chords ({}) give it a harmonic frame.",
            progression.join(" → ")
        ));
    }
    explanation.push_str(match scale {
        Scale::Major => " Major keys usually sound open and bright.",
        Scale::Minor => " Minor keys usually sound introspective.",
    });

    MusicAnalysis {
        key,
        scale,
        chords,
        pace,
        mood,
        explanation,
    }
}

/// Tonic is the most frequent pitch class (lowest class on ties). The scale
/// is whichever step pattern covers more of the five most frequent classes.
fn detect_key(notes: &[Note]) -> (u8, Scale) {
    let mut counts = [0usize; 12];
    for note in notes {
        counts[note.pitch.pitch_class() as usize] += 1;
    }
    let mut ranked: Vec<u8> = (0..12u8).filter(|&pc| counts[pc as usize] > 0).collect();
    // stable, so ties keep ascending pitch class order
    ranked.sort_by(|a, b| counts[*b as usize].cmp(&counts[*a as usize]));

    let tonic = ranked[0];
    let (major, minor) = ranked
        .iter()
        .take(5)
        .map(|&pc| (pc + 12 - tonic) % 12)
        .fold((0, 0), |(major, minor), interval| {
            (
                major + MAJOR_STEPS.contains(&interval) as usize,
                minor + MINOR_STEPS.contains(&interval) as usize,
            )
        });
    let scale = if major >= minor { Scale::Major } else { Scale::Minor };
    (tonic, scale)
}

fn detect_chords(notes: &[Note]) -> Vec<Chord> {
    let mut groups: BTreeMap<i64, Vec<u8>> = BTreeMap::new();
    for note in notes {
        let slot = (note.start / CHORD_WINDOW).floor() as i64;
        groups.entry(slot).or_default().push(note.pitch.pitch_class());
    }

    let mut chords = Vec::new();
    for classes in groups.values().filter(|g| g.len() >= 3) {
        if let Some(chord) = triad(classes) {
            if !chords.contains(&chord) {
                chords.push(chord);
            }
        }
    }
    chords
}

/// Finds a major or minor triad in any inversion.
fn triad(classes: &[u8]) -> Option<Chord> {
    let mut roots = classes.to_vec();
    roots.sort_unstable();
    roots.dedup();
    roots.iter().find_map(|&root| {
        let has = |interval: u8| classes.iter().any(|&pc| (pc + 12 - root) % 12 == interval);
        if has(4) && has(7) {
            Some(Chord {
                root,
                quality: Scale::Major,
            })
        } else if has(3) && has(7) {
            Some(Chord {
                root,
                quality: Scale::Minor,
            })
        } else {
            None
        }
    })
}
