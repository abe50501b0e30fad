use thiserror::Error;

/// Failures inside the sound subsystem.
///
/// The public playback entry points never return these; they log and
/// discard them. Construction (opening devices, loading config) does.
#[derive(Debug, Error)]
pub enum Error {
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("playback backend failed: {0}")]
    Backend(String),

    #[error("audio output error: {0}")]
    Output(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
