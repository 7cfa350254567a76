use eframe::egui::{self, CentralPanel, SidePanel, TopBottomPanel};
use egui_piano_roll::{
    analyze, fallback_with_rng, parse_generation_text, AudioEngine, EditorEvent, GenerationKind,
    PianoRollEditor, PianoRollOptions, ReplacePolicy,
};

fn main() -> eframe::Result<()> {
    env_logger::init();

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "egui Piano Roll",
        native_options,
        Box::new(|_cc| Ok(Box::new(PianoRollApp::new()))),
    )
}

struct PianoRollApp {
    editor: PianoRollEditor,
    rng: fastrand::Rng,
    policy: ReplacePolicy,
    reply_text: String,
    status_line: String,
}

impl PianoRollApp {
    fn new() -> Self {
        let editor = PianoRollEditor::with_options(
            Box::new(AudioEngine::new()),
            PianoRollOptions::default(),
        );
        Self {
            editor,
            rng: fastrand::Rng::new(),
            policy: ReplacePolicy::Replace,
            reply_text: String::new(),
            status_line: "Click the grid to add a note".to_owned(),
        }
    }

    fn generate(&mut self, kind: GenerationKind) {
        let generation = fallback_with_rng(kind, &mut self.rng);
        let count = generation.notes.len();
        self.editor.load_notes(generation.notes, self.policy);
        self.status_line = format!("{} ({count} notes)", generation.description);
    }

    fn load_reply(&mut self) {
        match parse_generation_text(&self.reply_text) {
            Ok(generation) => {
                let count = generation.notes.len();
                self.editor.load_notes(generation.notes, self.policy);
                self.status_line = if generation.description.is_empty() {
                    format!("Loaded {count} notes")
                } else {
                    format!("{} ({count} notes)", generation.description)
                };
            }
            Err(err) => {
                log::warn!("generator reply rejected: {err}");
                self.status_line = format!("Could not load notes: {err}");
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Generate:");
            if ui.button("Melody").clicked() {
                self.generate(GenerationKind::Melody);
            }
            if ui.button("Chords").clicked() {
                self.generate(GenerationKind::Chords);
            }
            if ui.button("Both").clicked() {
                self.generate(GenerationKind::Both);
            }
            ui.separator();
            ui.radio_value(&mut self.policy, ReplacePolicy::Replace, "Replace");
            ui.radio_value(&mut self.policy, ReplacePolicy::Append, "Append");
            ui.separator();
            if ui.button("Clear").clicked() {
                self.editor.load_notes(Vec::new(), ReplacePolicy::Replace);
                self.status_line = "Cleared".to_owned();
            }
        });
        ui.horizontal(|ui| {
            ui.label("Reply JSON:");
            ui.add(egui::TextEdit::singleline(&mut self.reply_text).desired_width(400.0));
            if ui
                .add_enabled(!self.reply_text.trim().is_empty(), egui::Button::new("Load"))
                .clicked()
            {
                self.load_reply();
            }
        });
    }

    fn analysis_panel(&self, ui: &mut egui::Ui) {
        let analysis = analyze(self.editor.store().notes());
        ui.heading("Analysis");
        egui::Grid::new("analysis_grid").num_columns(2).show(ui, |ui| {
            ui.label("Key");
            ui.label(analysis.key_name());
            ui.end_row();
            ui.label("Pace");
            ui.label(analysis.pace.to_string());
            ui.end_row();
            ui.label("Mood");
            ui.label(analysis.mood);
            ui.end_row();
        });
        if !analysis.chords.is_empty() {
            ui.separator();
            for chord in &analysis.chords {
                ui.label(chord.to_string());
            }
        }
        ui.separator();
        ui.label(&analysis.explanation);
    }

    fn handle_events(&mut self) {
        for event in self.editor.take_events() {
            match &event {
                EditorEvent::PlaybackStateChanged { is_playing } => {
                    self.status_line = if *is_playing { "Playing" } else { "Stopped" }.to_owned();
                }
                EditorEvent::TempoChanged(bpm) => {
                    self.status_line = format!("Tempo {bpm} BPM");
                }
                _ => {}
            }
            log::info!("editor event: {event:?}");
        }
    }
}

impl eframe::App for PianoRollApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui);
        });
        TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status_line);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let store = self.editor.store();
                    ui.label(format!("{} notes, {} selected", store.len(), store.selection().len()));
                });
            });
        });
        SidePanel::right("analysis")
            .default_width(220.0)
            .show(ctx, |ui| {
                self.analysis_panel(ui);
            });
        CentralPanel::default().show(ctx, |ui| {
            self.editor.ui(ui);
        });
        self.handle_events();
    }
}
