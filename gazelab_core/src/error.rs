use thiserror::Error;

use crate::step::Step;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("renderer unavailable: {0}")]
    RenderUnavailable(String),
    #[error("stimulus player failed: {0}")]
    Stimulus(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("run cancelled by operator")]
    Cancelled,
    #[error("no event within {ms} ms while in step '{step}'")]
    Stalled { ms: u64, step: Step },
    #[error("invalid state: {0}")]
    State(String),
}

/// Failures reported by a `StepRenderer`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The view rendered but an element the handler needs is absent.
    #[error("view element '{element}' missing for step '{step}'")]
    MissingElement { step: Step, element: String },
    /// Nothing can be rendered at all.
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing renderer")]
    MissingRenderer,
    #[error("missing stimulus player")]
    MissingStimulus,
    #[error("missing persistence")]
    MissingPersistence,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Map a collaborator's boxed error into a typed report, keeping the message.
pub(crate) fn collaborator_error(
    e: &(dyn std::error::Error + Send + Sync + 'static),
    wrap: fn(String) -> CoreError,
) -> Report {
    Report::new(wrap(e.to_string()))
}
