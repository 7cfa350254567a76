//! # egui_piano_roll
//!
//! 单屏钢琴卷帘编辑器：24 个音高（C4–B5）× 8 秒的网格，支持音符的创建、拖动、
//! 调整时长、多选、框选和删除，并可按速度播放或循环播放。
//!
//! ## 模块
//!
//! - [`geometry`]：像素坐标与 (音高, 时间) 之间的换算、吸附
//! - [`store`]：音符集合与选择状态
//! - [`interaction`]：指针/键盘手势状态机
//! - [`playback`]：基于 [`scheduler`] 定时队列的播放调度
//! - [`audio`]：可注入的发声后端，默认实现为 rodio 正弦合成器
//! - [`generate`]：外部生成器结果的解析与本地备用生成
//! - [`analysis`]：调性、和弦与情绪分析
//!
//! ## 基本使用
//!
//! ```ignore
//! use egui_piano_roll::{AudioEngine, PianoRollEditor};
//!
//! let mut editor = PianoRollEditor::new(Box::new(AudioEngine::new()));
//!
//! // 在 egui UI 中使用
//! editor.ui(ui);
//!
//! for event in editor.take_events() {
//!     log::info!("{event:?}");
//! }
//! ```
//!
//! ## 载入生成结果
//!
//! ```ignore
//! use egui_piano_roll::{parse_generation_text, ReplacePolicy};
//!
//! let generation = parse_generation_text(&reply)?;
//! editor.load_notes(generation.notes, ReplacePolicy::Replace);
//! ```

pub mod analysis;
pub mod audio;
pub mod editor;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod interaction;
pub mod playback;
pub mod scheduler;
pub mod store;
pub mod structure;
pub mod ui;

pub use analysis::{analyze, Chord, MusicAnalysis, Pace, Scale};
pub use audio::{AudioEngine, NullBackend, SineSynthConfig, SoundBackend};
pub use editor::{EditorCommand, EditorEvent, PianoRollOptions, ReplacePolicy};
pub use error::{NoteListError, PitchParseError, PlaybackError, SoundError};
pub use generate::{fallback, fallback_with_rng, parse_generation_text, Generation, GenerationKind};
pub use geometry::Viewport;
pub use interaction::{Interaction, InteractionMachine};
pub use playback::{PlaybackScheduler, PlaybackState, PollOutcome};
pub use store::{NoteDefaults, NoteStore};
pub use structure::{Note, NoteDraft, NoteId, Pitch, HORIZON};
pub use ui::PianoRollEditor;
