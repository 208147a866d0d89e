use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("gaze source not started")]
    NotStarted,
    #[error("unknown collision scene '{0}'")]
    UnknownScene(String),
    #[error("encode: {0}")]
    Encode(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
