//! Simulated collaborators for running sessions without a browser, camera or
//! video files: a noisy eye, gaze sources over it or over a recorded trace,
//! a console renderer driven by an automatic participant, stimulus players
//! and JSON file persistence.

pub mod error;
pub mod eye;
pub mod gaze;
pub mod persist;
pub mod player;
pub mod renderer;

pub use error::SimError;
pub use eye::SimulatedEye;
pub use gaze::{InlineGaze, SimulatedGaze, TraceGaze};
pub use persist::{JsonFilePersistence, write_atomic};
pub use player::{ClipPlayer, CollisionDemo, Pace, SceneParams, clip_path, scene_params};
pub use renderer::{AutoParticipant, ConsoleRenderer};
