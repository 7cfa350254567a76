use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid pitch name `{name}`")]
pub struct PitchParseError {
    pub name: String,
}

impl PitchParseError {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }
}

/// 声音后端错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SoundError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("sound backend has been disposed")]
    Disposed,
    #[error("sound backend rejected the event: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("could not activate audio output")]
    Activation(#[source] SoundError),
}

/// 外部音符列表解析错误
#[derive(Debug, Error)]
pub enum NoteListError {
    #[error("no JSON object found in generator response")]
    NoJson,
    #[error("malformed note list: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    UnknownPitch(#[from] PitchParseError),
    #[error("note {index} has invalid timing (time {time}, duration {duration})")]
    InvalidTiming {
        index: usize,
        time: f64,
        duration: f64,
    },
}
