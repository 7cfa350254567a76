use egui_piano_roll::{
    EditorEvent, NoteDraft, PianoRollEditor, Pitch, PlaybackState, ReplacePolicy, SoundBackend,
    SoundError,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Record {
    triggers: Vec<(Pitch, f64, f32)>,
    activations: usize,
    notes_off: usize,
    disposed: bool,
    refuse_activation: bool,
    reject: Option<Pitch>,
}

/// Backend that records every call instead of making sound.
#[derive(Clone, Default)]
struct RecordingBackend(Rc<RefCell<Record>>);

impl SoundBackend for RecordingBackend {
    fn ensure_active(&mut self) -> Result<(), SoundError> {
        let mut record = self.0.borrow_mut();
        if record.refuse_activation {
            return Err(SoundError::Unavailable("no device".into()));
        }
        record.activations += 1;
        Ok(())
    }

    fn trigger(&mut self, pitch: Pitch, duration: f64, velocity: f32) -> Result<(), SoundError> {
        let mut record = self.0.borrow_mut();
        if record.reject == Some(pitch) {
            return Err(SoundError::Rejected(format!("{pitch} refused")));
        }
        record.triggers.push((pitch, duration, velocity));
        Ok(())
    }

    fn all_notes_off(&mut self) {
        self.0.borrow_mut().notes_off += 1;
    }

    fn dispose(&mut self) {
        self.0.borrow_mut().disposed = true;
    }
}

fn pitch(name: &str) -> Pitch {
    name.parse().unwrap()
}

fn editor_with(notes: &[(&str, f64, f64)]) -> (PianoRollEditor, RecordingBackend) {
    let backend = RecordingBackend::default();
    let mut editor = PianoRollEditor::new(Box::new(backend.clone()));
    let drafts = notes
        .iter()
        .map(|&(name, time, duration)| NoteDraft::new(pitch(name), time, duration, 0.8))
        .collect();
    editor.load_notes(drafts, ReplacePolicy::Replace);
    editor.take_events();
    (editor, backend)
}

fn triggered(backend: &RecordingBackend) -> Vec<Pitch> {
    backend.0.borrow().triggers.iter().map(|t| t.0).collect()
}

#[test]
fn stop_right_after_play_sounds_nothing() {
    let (mut editor, backend) = editor_with(&[("C4", 0.5, 0.5), ("E4", 1.0, 0.5)]);
    editor.play(0.0).unwrap();
    editor.stop();
    editor.tick(10.0);

    assert!(triggered(&backend).is_empty());
    assert_eq!(editor.playback().state(), PlaybackState::Stopped);
    assert_eq!(editor.playback().pending_events(), 0);
    assert_eq!(backend.0.borrow().notes_off, 1);
}

#[test]
fn notes_fire_at_their_start_times() {
    let (mut editor, backend) = editor_with(&[("C4", 0.0, 1.0), ("G4", 1.0, 0.5)]);
    editor.play(100.0).unwrap();

    editor.tick(100.0);
    assert_eq!(triggered(&backend), vec![pitch("C4")]);
    editor.tick(100.9);
    assert_eq!(triggered(&backend), vec![pitch("C4")]);
    editor.tick(101.0);
    assert_eq!(triggered(&backend), vec![pitch("C4"), pitch("G4")]);

    let outcome = editor.tick(101.5);
    assert!(outcome.finished);
    assert!(!editor.playback().is_playing());
    // the last note rings out instead of being cut
    assert_eq!(backend.0.borrow().notes_off, 0);
    assert!(editor
        .take_events()
        .contains(&EditorEvent::PlaybackStateChanged { is_playing: false }));
}

#[test]
fn tempo_scales_offsets_and_durations() {
    let (mut editor, backend) = editor_with(&[("C4", 1.0, 1.0)]);
    // 200 BPM is the ceiling: everything runs at 0.6x
    editor.set_tempo(240);
    editor.play(0.0).unwrap();

    editor.tick(0.59);
    assert!(triggered(&backend).is_empty());
    editor.tick(0.6);
    let record = backend.0.borrow();
    assert_eq!(record.triggers.len(), 1);
    assert_eq!(record.triggers[0].1, 0.6);
}

#[test]
fn looping_restarts_from_the_latest_notes() {
    let (mut editor, backend) = editor_with(&[("C4", 0.0, 1.0), ("E4", 1.0, 1.0)]);
    editor.set_looping(true);
    editor.play(0.0).unwrap();
    editor.tick(0.0);
    editor.tick(1.0);
    assert_eq!(triggered(&backend), vec![pitch("C4"), pitch("E4")]);

    // edit during the run; heard on the next pass
    editor.store_mut().add_note(pitch("G4"), 0.0);

    let outcome = editor.tick(1.99);
    assert!(!outcome.restarted);
    let outcome = editor.tick(2.0);
    assert!(outcome.restarted);
    assert!(editor.playback().is_playing());
    assert_eq!(
        triggered(&backend),
        vec![pitch("C4"), pitch("E4"), pitch("C4"), pitch("G4")]
    );

    // turning looping off ends the run at the next boundary
    editor.set_looping(false);
    editor.tick(3.0);
    let outcome = editor.tick(4.0);
    assert!(outcome.finished);
    assert_eq!(editor.playback().state(), PlaybackState::Stopped);
}

#[test]
fn activation_failure_leaves_playback_stopped() {
    let (mut editor, backend) = editor_with(&[("C4", 0.0, 1.0)]);
    backend.0.borrow_mut().refuse_activation = true;

    assert!(editor.play(0.0).is_err());
    assert_eq!(editor.playback().state(), PlaybackState::Stopped);
    assert_eq!(editor.playback().pending_events(), 0);
    editor.tick(5.0);
    assert!(triggered(&backend).is_empty());
}

#[test]
fn a_rejected_note_does_not_stop_the_run() {
    let (mut editor, backend) = editor_with(&[("C4", 0.0, 0.5), ("D4", 0.5, 0.5), ("E4", 1.0, 0.5)]);
    backend.0.borrow_mut().reject = Some(pitch("D4"));
    editor.play(0.0).unwrap();

    let outcome = editor.tick(0.75);
    assert_eq!(outcome.triggered, 1);
    assert_eq!(outcome.failed, 1);
    assert!(editor.playback().is_playing());

    editor.tick(1.0);
    assert_eq!(triggered(&backend), vec![pitch("C4"), pitch("E4")]);
}

#[test]
fn empty_grid_does_not_start_playing() {
    let (mut editor, backend) = editor_with(&[]);
    editor.play(0.0).unwrap();
    assert!(!editor.playback().is_playing());
    assert_eq!(backend.0.borrow().activations, 1);
}

#[test]
fn reference_tone_plays_one_pitch() {
    let (mut editor, backend) = editor_with(&[]);
    editor.play_reference_tone(pitch("A4"));
    let record = backend.0.borrow();
    assert_eq!(record.triggers, vec![(pitch("A4"), 0.25, 0.8)]);
}

#[test]
fn dropping_the_editor_disposes_the_backend() {
    let (mut editor, backend) = editor_with(&[("C4", 0.0, 1.0)]);
    editor.play(0.0).unwrap();
    drop(editor);

    let record = backend.0.borrow();
    assert!(record.disposed);
    assert_eq!(record.notes_off, 1);
}

#[test]
fn tempo_and_looping_changes_are_reported() {
    let (mut editor, _backend) = editor_with(&[]);
    editor.set_tempo(500);
    editor.set_looping(true);
    editor.set_looping(true);
    assert_eq!(
        editor.take_events(),
        vec![EditorEvent::TempoChanged(200), EditorEvent::LoopingChanged(true)]
    );
}
