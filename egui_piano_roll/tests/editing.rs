use egui::{Key, Modifiers, Pos2};
use egui_piano_roll::{
    EditorEvent, InteractionMachine, NoteDefaults, NoteDraft, NoteStore, Pitch, Viewport, HORIZON,
};

// 40 px per 0.25 s column, 30 px per row.
fn viewport() -> Viewport {
    Viewport::new(1280.0, 720.0)
}

fn pitch(name: &str) -> Pitch {
    name.parse().unwrap()
}

fn row_centre(row: usize) -> f32 {
    row as f32 * 30.0 + 15.0
}

#[test]
fn coordinates_round_trip_for_every_row() {
    let vp = viewport();
    for row in 0..24 {
        for column in 0..32 {
            let time = column as f64 * 0.25;
            let p = Pitch::from_row(row);
            let pos = vp.musical_to_position(p, time);
            assert_eq!(vp.pointer_to_musical(pos), (p, time));
        }
    }
}

#[test]
fn edits_never_leave_the_horizon() {
    let vp = viewport();
    let mut store = NoteStore::new(NoteDefaults::default());
    let mut machine = InteractionMachine::default();
    let note = store.add_note_with(pitch("C4"), 7.0, 0.5, 0.8);

    // drag far to the right
    let origin = vp.musical_to_position(note.pitch, note.start);
    machine.pointer_down(&mut store, &vp, origin, Modifiers::NONE);
    machine.pointer_move(&mut store, &vp, Pos2::new(5000.0, origin.y));
    machine.pointer_up(&mut store, &vp, Pos2::new(5000.0, origin.y), 0.0);
    let moved = *store.note(note.id).unwrap();
    assert_eq!(moved.start, 7.5);
    assert!(moved.end() <= HORIZON);

    // then stretch it past the right edge
    store.select_exactly([note.id]);
    assert!(store.resize_note(note.id, 3.0));
    let resized = *store.note(note.id).unwrap();
    assert!(resized.end() <= HORIZON);
    assert!(resized.duration >= 1.0 / 16.0);

    store.resize_selection(10.0);
    assert!(store.notes().iter().all(|n| n.start >= 0.0 && n.end() <= HORIZON));
}

#[test]
fn group_move_clamps_each_note_on_its_own() {
    let mut store = NoteStore::new(NoteDefaults::default());
    let top = store.add_note_with(pitch("A#5"), 0.0, 0.5, 0.8);
    let low = store.add_note_with(pitch("C4"), 1.0, 0.5, 0.8);
    let mid = store.add_note_with(pitch("E4"), 2.0, 0.5, 0.8);
    store.select_exactly([top.id, low.id, mid.id]);

    store.move_selection(2, 1.0);

    assert_eq!(store.note(top.id).unwrap().pitch, Pitch::B5);
    assert_eq!(store.note(low.id).unwrap().pitch, pitch("D4"));
    assert_eq!(store.note(mid.id).unwrap().pitch, pitch("F#4"));
    assert_eq!(store.note(top.id).unwrap().start, 1.0);
    assert_eq!(store.note(low.id).unwrap().start, 2.0);
    assert_eq!(store.note(mid.id).unwrap().start, 3.0);
}

#[test]
fn deleting_the_selection_removes_exactly_those_notes() {
    let mut store = NoteStore::new(NoteDefaults::default());
    let mut machine = InteractionMachine::default();
    let notes: Vec<_> = (0..5)
        .map(|i| store.add_note(Pitch::from_row(i * 2), i as f64))
        .collect();
    store.select_exactly([notes[1].id, notes[3].id, notes[4].id]);
    store.take_events();

    assert!(machine.key_pressed(&mut store, Key::Delete));

    let remaining: Vec<_> = store.notes().iter().map(|n| n.id).collect();
    assert_eq!(remaining, vec![notes[0].id, notes[2].id]);
    assert!(store.selection().is_empty());
    let deleted = store
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, EditorEvent::NoteDeleted(_)))
        .count();
    assert_eq!(deleted, 3);

    // nothing selected, nothing to delete
    assert!(!machine.key_pressed(&mut store, Key::Backspace));
}

#[test]
fn box_selection_picks_only_intersecting_rows() {
    let vp = viewport();
    let mut store = NoteStore::new(NoteDefaults::default());
    let mut machine = InteractionMachine::default();
    let ids: Vec<_> = [3, 5, 9]
        .into_iter()
        .map(|row| store.add_note(Pitch::from_row(row), 1.0).id)
        .collect();

    let from = Pos2::new(100.0, 2.0 * 30.0 + 5.0);
    let to = Pos2::new(300.0, 6.0 * 30.0 + 25.0);
    machine.pointer_down(&mut store, &vp, from, Modifiers::SHIFT);
    machine.pointer_move(&mut store, &vp, to);
    machine.pointer_up(&mut store, &vp, to, 0.0);

    let selected: Vec<_> = store.selection().iter().copied().collect();
    assert_eq!(selected, vec![ids[0], ids[1]]);
    assert!(machine.is_idle());
}

#[test]
fn clicking_creates_then_toggles_without_duplicating() {
    let vp = viewport();
    let mut store = NoteStore::new(NoteDefaults::default());
    let mut machine = InteractionMachine::default();
    let pos = Pos2::new(30.0, row_centre(0));

    machine.pointer_down(&mut store, &vp, pos, Modifiers::NONE);
    machine.pointer_up(&mut store, &vp, pos, 0.0);
    machine.click(&mut store, &vp, pos, Modifiers::NONE, 0.0);
    assert_eq!(store.len(), 1);
    let id = store.notes()[0].id;
    assert!(store.is_selected(id));
    assert_eq!(store.notes()[0].pitch, Pitch::B5);

    machine.pointer_down(&mut store, &vp, pos, Modifiers::NONE);
    machine.pointer_up(&mut store, &vp, pos, 1.0);
    machine.click(&mut store, &vp, pos, Modifiers::NONE, 1.0);
    assert_eq!(store.len(), 1);
    assert!(!store.is_selected(id));

    machine.pointer_down(&mut store, &vp, pos, Modifiers::NONE);
    machine.pointer_up(&mut store, &vp, pos, 2.0);
    machine.click(&mut store, &vp, pos, Modifiers::NONE, 2.0);
    assert_eq!(store.len(), 1);
    assert!(store.is_selected(id));
}

#[test]
fn click_right_after_a_drag_does_not_create_a_note() {
    let vp = viewport();
    let mut store = NoteStore::new(NoteDefaults::default());
    let mut machine = InteractionMachine::default();
    let note = store.add_note(pitch("C5"), 0.0);
    let row = note.pitch.row_index().unwrap();
    let grab = Pos2::new(10.0, row_centre(row));
    let drop_at = Pos2::new(210.0, row_centre(row));

    machine.pointer_down(&mut store, &vp, grab, Modifiers::NONE);
    machine.pointer_move(&mut store, &vp, drop_at);
    machine.pointer_up(&mut store, &vp, drop_at, 3.0);
    // the host reports the release as a click on the now-empty original spot
    machine.click(&mut store, &vp, grab, Modifiers::NONE, 3.01);

    assert_eq!(store.len(), 1);
    assert_eq!(store.note(note.id).unwrap().start, 1.25);

    // once the window has passed, clicks create again
    machine.click(&mut store, &vp, grab, Modifiers::NONE, 3.5);
    assert_eq!(store.len(), 2);
}

#[test]
fn imported_drafts_are_clamped_into_the_grid() {
    let mut store = NoteStore::new(NoteDefaults::default());
    store.replace_all([
        NoteDraft::new(pitch("D4"), 7.9, 1.0, 0.5),
        NoteDraft::new(pitch("G4"), 0.0, 20.0, 2.0),
    ]);
    assert_eq!(store.len(), 2);
    for note in store.notes() {
        assert!(note.start >= 0.0 && note.end() <= HORIZON);
        assert!((0.0..=1.0).contains(&note.velocity));
    }
    let events = store.take_events();
    assert!(matches!(events.last(), Some(EditorEvent::NotesReplaced(notes)) if notes.len() == 2));
}
