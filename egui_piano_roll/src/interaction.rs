//! Pointer and keyboard handling for the note grid.
//!
//! A single [`Interaction`] value describes the gesture in progress. Positions
//! are grid-local pixels; `now` is the host clock in seconds.

use crate::geometry::{snap_within, Viewport};
use crate::store::NoteStore;
use crate::structure::{Note, NoteId, HORIZON, MIN_DURATION};
use egui::{Key, Modifiers, Pos2, Rect, Vec2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interaction {
    Idle,
    DraggingNote {
        note: NoteId,
        /// Pointer minus the note's rendered origin at press time.
        offset: Vec2,
        moved: bool,
        selected_on_press: bool,
    },
    ResizingNote {
        note: NoteId,
        moved: bool,
        selected_on_press: bool,
    },
    BoxSelecting {
        origin: Pos2,
        current: Pos2,
    },
}

/// What the last drag or resize did, consumed by the click that follows it.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Release {
    note: NoteId,
    moved: bool,
    selected_on_press: bool,
}

/// Shift or Cmd/Ctrl toggles membership and starts box selection.
pub fn is_multi_select(modifiers: Modifiers) -> bool {
    modifiers.shift || modifiers.command
}

#[derive(Clone, Debug)]
pub struct InteractionMachine {
    state: Interaction,
    last_release: Option<Release>,
    suppress_until: f64,
    suppress_window: f64,
    handle_width: f32,
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new(0.05, 6.0)
    }
}

impl InteractionMachine {
    pub fn new(suppress_window: f64, handle_width: f32) -> Self {
        Self {
            state: Interaction::Idle,
            last_release: None,
            suppress_until: f64::NEG_INFINITY,
            suppress_window: suppress_window.max(0.0),
            handle_width: handle_width.max(0.0),
        }
    }

    pub fn configure(&mut self, suppress_window: f64, handle_width: f32) {
        self.suppress_window = suppress_window.max(0.0);
        self.handle_width = handle_width.max(0.0);
    }

    pub fn state(&self) -> Interaction {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, Interaction::Idle)
    }

    /// Live rectangle while box selecting.
    pub fn selection_rect(&self) -> Option<Rect> {
        match self.state {
            Interaction::BoxSelecting { origin, current } => Some(Rect::from_two_pos(origin, current)),
            _ => None,
        }
    }

    pub fn on_resize_handle(&self, viewport: &Viewport, note: &Note, pos: Pos2) -> bool {
        let rect = viewport.note_rect(note);
        let width = self.handle_width.min(rect.width() / 2.0);
        let handle = Rect::from_min_max(Pos2::new(rect.max.x - width, rect.min.y), rect.max);
        handle.contains(pos)
    }

    /// Drops whatever gesture is in progress.
    pub fn cancel(&mut self) {
        self.state = Interaction::Idle;
        self.last_release = None;
    }

    pub fn pointer_down(
        &mut self,
        store: &mut NoteStore,
        viewport: &Viewport,
        pos: Pos2,
        modifiers: Modifiers,
    ) {
        self.state = Interaction::Idle;
        self.last_release = None;
        let multi = is_multi_select(modifiers);

        let Some(note) = store
            .find_note_at(viewport, pos)
            .and_then(|id| store.note(id).copied())
        else {
            if multi {
                self.state = Interaction::BoxSelecting {
                    origin: pos,
                    current: pos,
                };
            }
            return;
        };

        if self.on_resize_handle(viewport, &note, pos) {
            let selected_on_press = !store.is_selected(note.id);
            if selected_on_press {
                if multi {
                    store.add_to_selection([note.id]);
                } else {
                    store.select_exactly([note.id]);
                }
            }
            self.state = Interaction::ResizingNote {
                note: note.id,
                moved: false,
                selected_on_press,
            };
            return;
        }

        let selected_on_press = if multi {
            store.toggle_select(note.id);
            if !store.is_selected(note.id) {
                // deselected by this press, no drag
                return;
            }
            true
        } else if store.is_selected(note.id) {
            false
        } else {
            store.select_exactly([note.id]);
            true
        };

        let origin = viewport.musical_to_position(note.pitch, note.start);
        self.state = Interaction::DraggingNote {
            note: note.id,
            offset: pos - origin,
            moved: false,
            selected_on_press,
        };
    }

    pub fn pointer_move(&mut self, store: &mut NoteStore, viewport: &Viewport, pos: Pos2) {
        match self.state {
            Interaction::Idle => {}
            Interaction::DraggingNote {
                note,
                offset,
                selected_on_press,
                ..
            } => {
                let Some(current) = store.note(note).copied() else {
                    self.abort(note);
                    return;
                };
                let (pitch, time) = viewport.pointer_to_musical(pos - offset);
                // the dragged note's reachable target, so the group delta stops at the edge
                let time = snap_within(time, HORIZON - current.duration);
                let pitch_steps = pitch.key() as i32 - current.pitch.key() as i32;
                let delta_time = time - current.start;
                if pitch_steps == 0 && delta_time.abs() < f64::EPSILON {
                    return;
                }
                if store.selection().len() > 1 && store.is_selected(note) {
                    store.move_selection(pitch_steps, delta_time);
                } else {
                    store.move_note(note, pitch, time);
                }
                self.state = Interaction::DraggingNote {
                    note,
                    offset,
                    moved: true,
                    selected_on_press,
                };
            }
            Interaction::ResizingNote {
                note,
                selected_on_press,
                ..
            } => {
                let Some(current) = store.note(note).copied() else {
                    self.abort(note);
                    return;
                };
                let start_x = viewport.time_to_x(current.start);
                let max = HORIZON - current.start;
                let duration = snap_within(viewport.x_to_time(pos.x - start_x), max)
                    .max(MIN_DURATION.min(max));
                if (duration - current.duration).abs() < f64::EPSILON {
                    return;
                }
                if store.selection().len() > 1 && store.is_selected(note) {
                    store.resize_selection(duration / current.duration);
                } else {
                    store.resize_note(note, duration);
                }
                self.state = Interaction::ResizingNote {
                    note,
                    moved: true,
                    selected_on_press,
                };
            }
            Interaction::BoxSelecting { origin, .. } => {
                self.state = Interaction::BoxSelecting {
                    origin,
                    current: pos,
                };
            }
        }
    }

    pub fn pointer_up(&mut self, store: &mut NoteStore, viewport: &Viewport, pos: Pos2, now: f64) {
        match std::mem::replace(&mut self.state, Interaction::Idle) {
            Interaction::Idle => {}
            Interaction::DraggingNote {
                note,
                moved,
                selected_on_press,
                ..
            }
            | Interaction::ResizingNote {
                note,
                moved,
                selected_on_press,
            } => {
                self.last_release = Some(Release {
                    note,
                    moved,
                    selected_on_press,
                });
                self.arm_suppression(now);
            }
            Interaction::BoxSelecting { origin, .. } => {
                let rect = Rect::from_two_pos(origin, pos);
                let hits = store.notes_in_rect(viewport, rect);
                log::debug!("box selection picked {} notes", hits.len());
                store.add_to_selection(hits);
                self.arm_suppression(now);
            }
        }
    }

    /// A full click (press and release without a drag in between, from the
    /// host's point of view). Creates a note on empty space or toggles the
    /// clicked note.
    pub fn click(
        &mut self,
        store: &mut NoteStore,
        viewport: &Viewport,
        pos: Pos2,
        modifiers: Modifiers,
        now: f64,
    ) {
        if !self.is_idle() {
            return;
        }
        let release = self.last_release.take();
        let multi = is_multi_select(modifiers);

        match store.find_note_at(viewport, pos) {
            Some(id) => {
                if multi {
                    // the press already toggled it
                    return;
                }
                match release {
                    Some(r) if r.note == id => {
                        if r.moved || r.selected_on_press {
                            return;
                        }
                    }
                    _ => {
                        if self.is_suppressed(now) {
                            return;
                        }
                    }
                }
                store.toggle_select(id);
            }
            None => {
                if multi || self.is_suppressed(now) {
                    return;
                }
                let (pitch, time) = viewport.pointer_to_musical(pos);
                let note = store.add_note(pitch, time);
                store.select_exactly([note.id]);
            }
        }
    }

    /// Delete/Backspace removes the selection, Escape clears it. Ignored while
    /// a note is being dragged or resized. Returns whether the key was used.
    pub fn key_pressed(&mut self, store: &mut NoteStore, key: Key) -> bool {
        if matches!(
            self.state,
            Interaction::DraggingNote { .. } | Interaction::ResizingNote { .. }
        ) {
            return false;
        }
        match key {
            Key::Delete | Key::Backspace => !store.delete_selected().is_empty(),
            Key::Escape => {
                self.state = Interaction::Idle;
                store.clear_selection();
                true
            }
            _ => false,
        }
    }

    fn is_suppressed(&self, now: f64) -> bool {
        now < self.suppress_until
    }

    fn arm_suppression(&mut self, now: f64) {
        self.suppress_until = now + self.suppress_window;
    }

    fn abort(&mut self, note: NoteId) {
        log::debug!("gesture on {note} aborted, note no longer exists");
        self.state = Interaction::Idle;
        self.last_release = None;
    }
}
