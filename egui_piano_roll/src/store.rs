use crate::editor::EditorEvent;
use crate::geometry::{snap_within, Viewport};
use crate::structure::{Note, NoteDraft, NoteId, Pitch, HORIZON, MIN_DURATION};
use egui::{Pos2, Rect};
use std::collections::BTreeSet;

/// 新建音符时使用的默认值
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteDefaults {
    pub duration: f64,
    pub velocity: f32,
}

impl Default for NoteDefaults {
    fn default() -> Self {
        Self {
            duration: 0.25,
            velocity: 0.8,
        }
    }
}

/// Owns every note and the current selection.
///
/// Notes keep insertion order, so the last matching note is the most recently
/// added one. Every mutation is queued as an [`EditorEvent`].
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: Vec<Note>,
    selection: BTreeSet<NoteId>,
    next_id: u64,
    defaults: NoteDefaults,
    pending_events: Vec<EditorEvent>,
}

impl NoteStore {
    pub fn new(defaults: NoteDefaults) -> Self {
        Self {
            notes: Vec::new(),
            selection: BTreeSet::new(),
            next_id: 1,
            defaults,
            pending_events: Vec::new(),
        }
    }

    pub fn defaults(&self) -> NoteDefaults {
        self.defaults
    }

    pub fn set_defaults(&mut self, defaults: NoteDefaults) {
        self.defaults = defaults;
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.clone()
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.note(id).is_some()
    }

    pub fn selection(&self) -> &BTreeSet<NoteId> {
        &self.selection
    }

    pub fn is_selected(&self, id: NoteId) -> bool {
        self.selection.contains(&id)
    }

    pub fn selected_notes(&self) -> Vec<Note> {
        self.notes
            .iter()
            .filter(|n| self.selection.contains(&n.id))
            .copied()
            .collect()
    }

    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn allocate_id(&mut self) -> NoteId {
        let id = NoteId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    /// Adds a note with the default duration and velocity.
    pub fn add_note(&mut self, pitch: Pitch, time: f64) -> Note {
        let NoteDefaults { duration, velocity } = self.defaults;
        self.add_note_with(pitch, time, duration, velocity)
    }

    pub fn add_note_with(&mut self, pitch: Pitch, time: f64, duration: f64, velocity: f32) -> Note {
        let duration = clamp_duration(duration);
        let start = clamp_start(time, duration);
        let id = self.allocate_id();
        let note = Note::with_id(id, pitch, start, duration, velocity.clamp(0.0, 1.0));
        self.notes.push(note);
        self.pending_events.push(EditorEvent::NoteAdded(note));
        note
    }

    pub fn move_note(&mut self, id: NoteId, pitch: Pitch, time: f64) -> bool {
        let Some(note) = self.note_mut(id) else {
            return false;
        };
        let before = *note;
        let pitch = pitch.transposed_within_alphabet(0);
        note.pitch = pitch;
        note.start = snap_within(time, HORIZON - note.duration);
        let after = *note;
        self.emit_updated(before, after);
        true
    }

    /// Translates every selected note by the same delta. Each note clamps on its
    /// own, so a note stopped by the pitch ceiling does not hold the others back.
    pub fn move_selection(&mut self, pitch_steps: i32, delta_time: f64) {
        let selection = self.selection.clone();
        let mut updates = Vec::new();
        for note in self.notes.iter_mut().filter(|n| selection.contains(&n.id)) {
            let before = *note;
            note.pitch = note.pitch.transposed_within_alphabet(pitch_steps);
            note.start = snap_within(note.start + delta_time, HORIZON - note.duration);
            updates.push((before, *note));
        }
        for (before, after) in updates {
            self.emit_updated(before, after);
        }
    }

    pub fn resize_note(&mut self, id: NoteId, duration: f64) -> bool {
        let Some(note) = self.note_mut(id) else {
            return false;
        };
        let before = *note;
        note.duration = resized(note.start, duration);
        let after = *note;
        self.emit_updated(before, after);
        true
    }

    /// Scales the duration of every selected note by `ratio`, each clamped to
    /// `[MIN_DURATION, HORIZON - start]` and snapped.
    pub fn resize_selection(&mut self, ratio: f64) {
        if !ratio.is_finite() || ratio <= 0.0 {
            return;
        }
        let selection = self.selection.clone();
        let mut updates = Vec::new();
        for note in self.notes.iter_mut().filter(|n| selection.contains(&n.id)) {
            let before = *note;
            note.duration = resized(note.start, note.duration * ratio);
            updates.push((before, *note));
        }
        for (before, after) in updates {
            self.emit_updated(before, after);
        }
    }

    /// Removes every selected note and clears the selection.
    pub fn delete_selected(&mut self) -> Vec<Note> {
        if self.selection.is_empty() {
            return Vec::new();
        }
        let targets = std::mem::take(&mut self.selection);
        let mut removed = Vec::new();
        self.notes.retain(|note| {
            if targets.contains(&note.id) {
                removed.push(*note);
                false
            } else {
                true
            }
        });
        for note in &removed {
            self.pending_events.push(EditorEvent::NoteDeleted(*note));
        }
        self.pending_events.push(EditorEvent::SelectionChanged(Vec::new()));
        removed
    }

    pub fn toggle_select(&mut self, id: NoteId) {
        if !self.contains(id) {
            return;
        }
        let previous = self.selection.clone();
        if !self.selection.insert(id) {
            self.selection.remove(&id);
        }
        self.notify_selection_changed(previous);
    }

    pub fn select_exactly(&mut self, ids: impl IntoIterator<Item = NoteId>) {
        let previous = std::mem::take(&mut self.selection);
        let wanted: BTreeSet<NoteId> = ids.into_iter().collect();
        self.selection = self
            .notes
            .iter()
            .map(|n| n.id)
            .filter(|id| wanted.contains(id))
            .collect();
        self.notify_selection_changed(previous);
    }

    pub fn add_to_selection(&mut self, ids: impl IntoIterator<Item = NoteId>) {
        let previous = self.selection.clone();
        for id in ids {
            if self.contains(id) {
                self.selection.insert(id);
            }
        }
        self.notify_selection_changed(previous);
    }

    pub fn clear_selection(&mut self) {
        let previous = std::mem::take(&mut self.selection);
        self.notify_selection_changed(previous);
    }

    /// Most recently added note whose rendered rectangle contains `pos`.
    pub fn find_note_at(&self, viewport: &Viewport, pos: Pos2) -> Option<NoteId> {
        self.notes
            .iter()
            .rev()
            .find(|note| viewport.note_contains(note, pos))
            .map(|note| note.id)
    }

    pub fn notes_in_rect(&self, viewport: &Viewport, rect: Rect) -> Vec<NoteId> {
        self.notes
            .iter()
            .filter(|note| viewport.note_rect(note).intersects(rect))
            .map(|note| note.id)
            .collect()
    }

    /// Replaces all notes with `drafts`. Ids are assigned here.
    pub fn replace_all(&mut self, drafts: impl IntoIterator<Item = NoteDraft>) {
        self.notes.clear();
        let had_selection = !self.selection.is_empty();
        self.selection.clear();
        self.push_drafts(drafts);
        if had_selection {
            self.pending_events.push(EditorEvent::SelectionChanged(Vec::new()));
        }
        self.pending_events
            .push(EditorEvent::NotesReplaced(self.notes.clone()));
    }

    /// Appends `drafts` without touching existing notes or the selection.
    pub fn append(&mut self, drafts: impl IntoIterator<Item = NoteDraft>) -> Vec<Note> {
        self.push_drafts(drafts)
    }

    pub fn clear(&mut self) {
        self.replace_all(std::iter::empty());
    }

    fn push_drafts(&mut self, drafts: impl IntoIterator<Item = NoteDraft>) -> Vec<Note> {
        drafts
            .into_iter()
            .map(|d| self.add_note_with(d.note, d.time, d.duration, d.velocity))
            .collect()
    }

    fn emit_updated(&mut self, before: Note, after: Note) {
        if before != after {
            self.pending_events
                .push(EditorEvent::NoteUpdated { before, after });
        }
    }

    fn notify_selection_changed(&mut self, previous: BTreeSet<NoteId>) {
        if previous != self.selection {
            self.pending_events.push(EditorEvent::SelectionChanged(
                self.selection.iter().copied().collect(),
            ));
        }
    }
}

fn clamp_duration(duration: f64) -> f64 {
    if duration.is_finite() {
        duration.clamp(MIN_DURATION, HORIZON)
    } else {
        MIN_DURATION
    }
}

fn clamp_start(time: f64, duration: f64) -> f64 {
    if time.is_finite() {
        time.clamp(0.0, HORIZON - duration)
    } else {
        0.0
    }
}

fn resized(start: f64, duration: f64) -> f64 {
    let max = HORIZON - start;
    snap_within(duration, max).max(MIN_DURATION.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    #[test]
    fn add_note_clamps_to_horizon() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let note = store.add_note(pitch("C4"), 7.9);
        assert_eq!(note.duration, 0.25);
        assert_eq!(note.start, 7.75);
        assert!(store.selection().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let a = store.add_note(pitch("C4"), 0.0);
        let b = store.add_note(pitch("C4"), 0.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn move_note_snaps_and_clamps() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let note = store.add_note(pitch("C4"), 0.0);
        assert!(store.move_note(note.id, pitch("E4"), 1.03));
        let moved = store.note(note.id).unwrap();
        assert_eq!(moved.pitch, pitch("E4"));
        assert_eq!(moved.start, 1.0);

        store.move_note(note.id, pitch("C6"), 100.0);
        let moved = store.note(note.id).unwrap();
        assert_eq!(moved.pitch, Pitch::B5);
        assert_eq!(moved.start, HORIZON - 0.25);
        assert!(!store.move_note(NoteId(999), pitch("C4"), 0.0));
    }

    #[test]
    fn resize_note_respects_minimum_and_horizon() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let note = store.add_note(pitch("D4"), 6.0);
        store.resize_note(note.id, 0.01);
        assert_eq!(store.note(note.id).unwrap().duration, MIN_DURATION);
        store.resize_note(note.id, 5.0);
        assert_eq!(store.note(note.id).unwrap().duration, 2.0);
    }

    #[test]
    fn resize_selection_scales_each_note() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let a = store.add_note_with(pitch("C4"), 0.0, 0.5, 0.8);
        let b = store.add_note_with(pitch("E4"), 7.0, 0.5, 0.8);
        store.select_exactly([a.id, b.id]);
        store.resize_selection(2.0);
        assert_eq!(store.note(a.id).unwrap().duration, 1.0);
        assert_eq!(store.note(b.id).unwrap().duration, 1.0);
        store.resize_selection(4.0);
        assert_eq!(store.note(a.id).unwrap().duration, 4.0);
        assert_eq!(store.note(b.id).unwrap().duration, 1.0);
    }

    #[test]
    fn toggle_select_never_deletes() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let note = store.add_note(pitch("C4"), 0.0);
        store.toggle_select(note.id);
        assert!(store.is_selected(note.id));
        store.toggle_select(note.id);
        assert!(!store.is_selected(note.id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn selection_ignores_missing_ids() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let note = store.add_note(pitch("C4"), 0.0);
        store.select_exactly([note.id, NoteId(42)]);
        assert_eq!(store.selection().len(), 1);
        store.add_to_selection([NoteId(43)]);
        assert_eq!(store.selection().len(), 1);
    }

    #[test]
    fn events_describe_mutations() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let note = store.add_note(pitch("C4"), 0.0);
        store.select_exactly([note.id]);
        store.delete_selected();
        let events = store.take_events();
        assert!(matches!(events[0], EditorEvent::NoteAdded(_)));
        assert!(matches!(events[1], EditorEvent::SelectionChanged(ref ids) if ids == &[note.id]));
        assert!(matches!(events[2], EditorEvent::NoteDeleted(_)));
        assert!(store.take_events().is_empty());
    }

    #[test]
    fn replace_and_append_normalize_drafts() {
        let mut store = NoteStore::new(NoteDefaults::default());
        let existing = store.add_note(pitch("C4"), 0.0);
        store.select_exactly([existing.id]);
        store.append(vec![NoteDraft::new(pitch("G4"), 12.0, 4.0, 1.5)]);
        assert_eq!(store.len(), 2);
        assert!(store.is_selected(existing.id));
        let appended = store.notes()[1];
        assert_eq!(appended.start, 4.0);
        assert_eq!(appended.velocity, 1.0);

        store.replace_all(vec![NoteDraft::new(pitch("A4"), 1.0, 0.5, 0.7)]);
        assert_eq!(store.len(), 1);
        assert!(store.selection().is_empty());
    }
}
