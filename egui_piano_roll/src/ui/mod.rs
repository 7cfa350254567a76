use crate::audio::SoundBackend;
use crate::editor::{EditorCommand, EditorEvent, PianoRollOptions, ReplacePolicy};
use crate::error::PlaybackError;
use crate::geometry::Viewport;
use crate::interaction::InteractionMachine;
use crate::playback::{PlaybackScheduler, PollOutcome};
use crate::store::NoteStore;
use crate::structure::{pitch_alphabet, NoteDraft, Pitch, MEASURE_COUNT};
use egui::*;

/// The piano-roll widget: note grid, key labels and a transport bar.
///
/// Owns the note store and the playback scheduler. Dropping the editor stops
/// playback and disposes the sound backend.
pub struct PianoRollEditor {
    store: NoteStore,
    interaction: InteractionMachine,
    playback: PlaybackScheduler,
    options: PianoRollOptions,
    pending_events: Vec<EditorEvent>,
    event_listener: Option<Box<dyn FnMut(&EditorEvent)>>,
    /// Pointer position of the previous frame, grid-local.
    last_pointer: Option<Pos2>,
}

impl PianoRollEditor {
    pub fn new(backend: Box<dyn SoundBackend>) -> Self {
        Self::with_options(backend, PianoRollOptions::default())
    }

    pub fn with_options(backend: Box<dyn SoundBackend>, options: PianoRollOptions) -> Self {
        let mut editor = Self {
            store: NoteStore::new(options.note_defaults()),
            interaction: InteractionMachine::default(),
            playback: PlaybackScheduler::new(backend),
            options: options.clone(),
            pending_events: Vec::new(),
            event_listener: None,
            last_pointer: None,
        };
        editor.apply_options(&options);
        editor
    }

    pub fn apply_options(&mut self, options: &PianoRollOptions) {
        self.options = options.clone();
        self.store.set_defaults(options.note_defaults());
        self.interaction
            .configure(options.click_suppress_seconds, options.resize_handle_width);
        self.set_tempo(options.bpm);
        self.set_looping(options.looping);
    }

    pub fn options(&self) -> &PianoRollOptions {
        &self.options
    }

    pub fn set_event_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&EditorEvent) + 'static,
    {
        self.event_listener = Some(Box::new(listener));
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NoteStore {
        &mut self.store
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.interaction
    }

    pub fn playback(&self) -> &PlaybackScheduler {
        &self.playback
    }

    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        self.collect_store_events();
        std::mem::take(&mut self.pending_events)
    }

    fn emit_event(&mut self, event: EditorEvent) {
        if let Some(listener) = &mut self.event_listener {
            listener(&event);
        }
        self.pending_events.push(event);
    }

    fn collect_store_events(&mut self) {
        for event in self.store.take_events() {
            self.emit_event(event);
        }
    }

    pub fn apply_command(&mut self, command: EditorCommand, now: f64) {
        match command {
            EditorCommand::SetNotes(notes) => self.store.replace_all(notes),
            EditorCommand::AppendNotes(notes) => {
                self.store.append(notes);
            }
            EditorCommand::ClearNotes => self.store.clear(),
            EditorCommand::SetPlayback(true) => {
                let _ = self.play(now);
            }
            EditorCommand::SetPlayback(false) | EditorCommand::Stop => self.stop(),
            EditorCommand::SetTempo(bpm) => self.set_tempo(bpm),
            EditorCommand::SetLooping(looping) => self.set_looping(looping),
            EditorCommand::PreviewPitch(pitch) => self.play_reference_tone(pitch),
        }
        self.collect_store_events();
    }

    pub fn load_notes(&mut self, notes: Vec<NoteDraft>, policy: ReplacePolicy) {
        self.apply_command(EditorCommand::load(notes, policy), 0.0);
    }

    /// Starts playback of the current notes at host time `now`.
    pub fn play(&mut self, now: f64) -> Result<(), PlaybackError> {
        let was_playing = self.playback.is_playing();
        let result = self.playback.play(self.store.notes(), now);
        self.notify_playback_change(was_playing);
        result
    }

    pub fn stop(&mut self) {
        let was_playing = self.playback.is_playing();
        self.playback.stop();
        self.notify_playback_change(was_playing);
    }

    pub fn toggle_playback(&mut self, now: f64) {
        if self.playback.is_playing() {
            self.stop();
        } else {
            let _ = self.play(now);
        }
    }

    pub fn set_tempo(&mut self, bpm: u16) {
        let before = self.playback.bpm();
        let after = self.playback.set_tempo(bpm);
        self.options.bpm = after;
        if before != after {
            self.emit_event(EditorEvent::TempoChanged(after));
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        let before = self.playback.is_looping();
        self.playback.set_looping(looping);
        self.options.looping = looping;
        if before != looping {
            self.emit_event(EditorEvent::LoopingChanged(looping));
        }
    }

    pub fn play_reference_tone(&mut self, pitch: Pitch) {
        self.playback.play_reference_tone(
            pitch,
            self.options.reference_tone_seconds,
            self.options.reference_tone_velocity,
        );
    }

    /// Fires due playback events. Called every frame by [`Self::ui`]; hosts
    /// that drive the editor without egui call it directly.
    pub fn tick(&mut self, now: f64) -> PollOutcome {
        let was_playing = self.playback.is_playing();
        let store = &self.store;
        let outcome = self.playback.poll(now, || store.snapshot());
        self.notify_playback_change(was_playing);
        outcome
    }

    fn notify_playback_change(&mut self, was_playing: bool) {
        let is_playing = self.playback.is_playing();
        if was_playing != is_playing {
            self.emit_event(EditorEvent::PlaybackStateChanged { is_playing });
        }
    }

    /// Tears the editor down: cancels timers and disposes the sound backend.
    pub fn shutdown(&mut self) {
        let was_playing = self.playback.is_playing();
        self.playback.shutdown();
        self.notify_playback_change(was_playing);
    }

    pub fn ui(&mut self, ui: &mut Ui) {
        let now = ui.input(|i| i.time);
        self.tick(now);

        self.ui_transport(ui, now);
        self.ui_piano_roll(ui, now);

        if self.playback.is_playing() {
            ui.ctx().request_repaint();
        }
        self.collect_store_events();
    }

    fn ui_transport(&mut self, ui: &mut Ui, now: f64) {
        let height = self.options.transport_height;
        ui.allocate_ui(Vec2::new(ui.available_width(), height), |ui| {
            ui.horizontal_centered(|ui| {
                let play_label = if self.playback.is_playing() {
                    "⏸ Pause"
                } else {
                    "▶ Play"
                };
                if ui.button(play_label).clicked() {
                    self.toggle_playback(now);
                }
                if ui
                    .add_enabled(self.playback.is_playing(), Button::new("⏹ Stop"))
                    .clicked()
                {
                    self.stop();
                }
                let looping = self.playback.is_looping();
                if ui.selectable_label(looping, "🔁 Loop").clicked() {
                    self.set_looping(!looping);
                }
                ui.separator();
                if ui.button("−").clicked() {
                    let bpm = self.playback.bpm().saturating_sub(5);
                    self.set_tempo(bpm);
                }
                ui.label(format!("{} BPM", self.playback.bpm()));
                if ui.button("+").clicked() {
                    let bpm = self.playback.bpm().saturating_add(5);
                    self.set_tempo(bpm);
                }
            });
        });
    }

    fn ui_piano_roll(&mut self, ui: &mut Ui, now: f64) {
        let key_width = self.options.key_width;
        let available = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(available, Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        let keys_rect = Rect::from_min_size(rect.min, Vec2::new(key_width, rect.height()));
        let grid_rect = Rect::from_min_max(Pos2::new(rect.min.x + key_width, rect.min.y), rect.max);
        // Recomputed every frame so window resizes reflow all notes.
        let viewport = Viewport::from_size(grid_rect.size());
        let to_local = |pos: Pos2| pos - grid_rect.min.to_vec2();

        self.handle_pointer(ui, &response, grid_rect, &viewport, now);
        self.handle_keys(ui);

        // Grid background and lines
        painter.rect_filled(grid_rect, 0.0, Color32::from_rgb(30, 30, 30));
        let row_height = viewport.row_height();
        for (row, pitch) in pitch_alphabet().enumerate() {
            let y = grid_rect.min.y + row as f32 * row_height;
            if pitch.is_black_key() {
                let band = Rect::from_min_size(
                    Pos2::new(grid_rect.min.x, y),
                    Vec2::new(grid_rect.width(), row_height),
                );
                painter.rect_filled(band, 0.0, Color32::from_rgb(24, 24, 24));
            }
            painter.line_segment(
                [Pos2::new(grid_rect.min.x, y), Pos2::new(grid_rect.max.x, y)],
                Stroke::new(1.0, Color32::from_rgb(45, 45, 45)),
            );
        }
        let measure_width = viewport.measure_width();
        for column in 0..=MEASURE_COUNT {
            let x = grid_rect.min.x + column as f32 * measure_width;
            let stroke = if column % 4 == 0 {
                Stroke::new(1.0, Color32::from_rgb(90, 90, 90))
            } else {
                Stroke::new(1.0, Color32::from_rgb(55, 55, 55))
            };
            painter.line_segment([Pos2::new(x, grid_rect.min.y), Pos2::new(x, grid_rect.max.y)], stroke);
        }

        // Notes
        for note in self.store.notes() {
            let note_rect = viewport
                .note_rect(note)
                .translate(grid_rect.min.to_vec2());
            let is_selected = self.store.is_selected(note.id);
            let alpha = (80.0 + 175.0 * note.velocity) as u8;
            let color = if is_selected {
                Color32::from_rgba_unmultiplied(150, 250, 150, alpha)
            } else {
                Color32::from_rgba_unmultiplied(100, 200, 100, alpha)
            };
            painter.rect_filled(note_rect.shrink(1.0), 2.0, color);
            let stroke_width = if is_selected { 2.0 } else { 1.0 };
            painter.rect_stroke(
                note_rect.shrink(1.0),
                2.0,
                Stroke::new(stroke_width, Color32::WHITE),
            );
            if note_rect.width() > 24.0 {
                painter.text(
                    note_rect.left_center() + Vec2::new(3.0, 0.0),
                    Align2::LEFT_CENTER,
                    note.pitch.name(),
                    FontId::proportional(10.0),
                    Color32::BLACK,
                );
            }
        }

        if let Some(selection) = self.interaction.selection_rect() {
            let selection = selection.translate(grid_rect.min.to_vec2());
            painter.rect_filled(selection, 0.0, Color32::from_rgba_unmultiplied(120, 200, 255, 30));
            painter.rect_stroke(selection, 0.0, Stroke::new(1.0, Color32::from_rgb(120, 200, 255)));
        }

        if let Some(pointer) = response.hover_pos() {
            let local = to_local(pointer);
            let over_handle = self
                .store
                .find_note_at(&viewport, local)
                .and_then(|id| self.store.note(id))
                .is_some_and(|note| self.interaction.on_resize_handle(&viewport, note, local));
            if over_handle {
                ui.ctx().set_cursor_icon(CursorIcon::ResizeHorizontal);
            }
        }

        self.ui_key_labels(ui, &painter, keys_rect, row_height);
    }

    fn ui_key_labels(&mut self, ui: &mut Ui, painter: &Painter, keys_rect: Rect, row_height: f32) {
        painter.rect_filled(keys_rect, 0.0, ui.visuals().window_fill());
        let mut clicked = None;
        for (row, pitch) in pitch_alphabet().enumerate() {
            let key_rect = Rect::from_min_size(
                Pos2::new(keys_rect.min.x, keys_rect.min.y + row as f32 * row_height),
                Vec2::new(keys_rect.width(), row_height),
            );
            let in_use = self.store.notes().iter().any(|n| n.pitch == pitch);
            let (fill, text) = match (pitch.is_black_key(), in_use) {
                (_, true) => (Color32::from_rgb(100, 200, 100), Color32::BLACK),
                (true, false) => (Color32::BLACK, Color32::WHITE),
                (false, false) => (Color32::WHITE, Color32::BLACK),
            };
            painter.rect_filled(key_rect, 0.0, fill);
            painter.rect_stroke(key_rect, 0.0, Stroke::new(1.0, Color32::GRAY));
            painter.text(
                key_rect.left_center() + Vec2::new(4.0, 0.0),
                Align2::LEFT_CENTER,
                pitch.name(),
                FontId::proportional(10.0),
                text,
            );
            let id = ui.id().with(("key_label", row));
            if ui.interact(key_rect, id, Sense::click()).clicked() {
                clicked = Some(pitch);
            }
        }
        if let Some(pitch) = clicked {
            self.play_reference_tone(pitch);
        }
    }

    fn handle_pointer(&mut self, ui: &Ui, response: &Response, grid_rect: Rect, viewport: &Viewport, now: f64) {
        let (pressed, released, down, modifiers, pointer) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.primary_down(),
                i.modifiers,
                i.pointer.interact_pos(),
            )
        });
        let Some(pointer) = pointer else {
            return;
        };
        let local = pointer - grid_rect.min.to_vec2();

        if pressed && grid_rect.contains(pointer) && response.is_pointer_button_down_on() {
            self.interaction
                .pointer_down(&mut self.store, viewport, local, modifiers);
        }
        if down && !self.interaction.is_idle() && self.last_pointer != Some(local) {
            self.interaction
                .pointer_move(&mut self.store, viewport, local);
        }
        if released {
            self.interaction
                .pointer_up(&mut self.store, viewport, local, now);
        }
        if response.clicked_by(PointerButton::Primary) && grid_rect.contains(pointer) {
            self.interaction
                .click(&mut self.store, viewport, local, modifiers, now);
        }
        self.last_pointer = Some(local);
    }

    fn handle_keys(&mut self, ui: &Ui) {
        // keys belong to whichever text field has focus
        if ui.ctx().wants_keyboard_input() {
            return;
        }
        let keys: Vec<Key> = ui.input(|i| {
            [Key::Delete, Key::Backspace, Key::Escape]
                .into_iter()
                .filter(|key| i.key_pressed(*key))
                .collect()
        });
        for key in keys {
            self.interaction.key_pressed(&mut self.store, key);
        }
    }
}

impl Drop for PianoRollEditor {
    fn drop(&mut self) {
        self.playback.shutdown();
    }
}
