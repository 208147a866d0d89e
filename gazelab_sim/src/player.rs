//! Stimulus players. Playback itself is simulated: a clip or collision scene
//! "plays" for the requested display time.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use gazelab_core::{CancelFlag, Completion, Event, Step, StimulusPlayer, StimulusRequest};
use gazelab_traits::BoxError;

use crate::error::SimError;
use crate::gaze::InlineGaze;

const SLICE: Duration = Duration::from_millis(20);

/// How playback passes time.
#[derive(Clone)]
pub enum Pace {
    /// Sleep for the display time on a worker thread.
    Realtime,
    /// Complete at once; when a feed is given, first deliver the gaze samples
    /// the display time would have produced at `rate_hz`.
    Instant {
        feed: Option<InlineGaze>,
        rate_hz: u32,
    },
}

struct Playback {
    pace: Pace,
    cancel: Option<CancelFlag>,
    worker: Option<JoinHandle<()>>,
}

impl Playback {
    fn new(pace: Pace) -> Self {
        Self {
            pace,
            cancel: None,
            worker: None,
        }
    }

    fn start(&mut self, display_ms: u64, done: Completion) -> Result<(), BoxError> {
        self.join();
        match &self.pace {
            Pace::Realtime => {
                let cancel = done.cancel_flag();
                self.cancel = Some(cancel.clone());
                self.worker = Some(std::thread::spawn(move || {
                    let total = Duration::from_millis(display_ms);
                    let mut slept = Duration::ZERO;
                    while slept < total {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let step = SLICE.min(total - slept);
                        std::thread::sleep(step);
                        slept += step;
                    }
                    done.complete();
                }));
            }
            Pace::Instant { feed, rate_hz } => {
                if let Some(feed) = feed {
                    let n = display_ms.saturating_mul(u64::from(*rate_hz)) / 1000;
                    let bus = done.bus();
                    for s in feed.pull(usize::try_from(n).unwrap_or(usize::MAX)) {
                        bus.send(Event::Gaze(s))?;
                    }
                }
                done.complete();
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(c) = self.cancel.take() {
            c.cancel();
        }
        self.join();
    }

    fn join(&mut self) {
        if let Some(h) = self.worker.take()
            && h.join().is_err()
        {
            tracing::warn!("playback worker panicked");
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Plays recorded clips from a directory: `clip_<condition>.mp4` for the
/// `and`/`or` conditions, `.mov` for the rest.
pub struct ClipPlayer {
    dir: PathBuf,
    playback: Playback,
}

impl ClipPlayer {
    pub fn new(dir: impl Into<PathBuf>, pace: Pace) -> Self {
        Self {
            dir: dir.into(),
            playback: Playback::new(pace),
        }
    }

    pub fn clip_path(&self, condition: &str) -> PathBuf {
        clip_path(&self.dir, condition)
    }
}

pub fn clip_path(dir: &Path, condition: &str) -> PathBuf {
    let ext = if matches!(condition, "and" | "or") { "mp4" } else { "mov" };
    dir.join(format!("clip_{condition}.{ext}"))
}

impl StimulusPlayer for ClipPlayer {
    fn play(&mut self, request: &StimulusRequest, done: Completion) -> Result<(), BoxError> {
        let path = self.clip_path(request.condition.as_str());
        tracing::info!(path = %path.display(), display_ms = request.display_ms, "clip playing");
        self.playback.start(request.display_ms, done)
    }

    fn stop(&mut self) {
        tracing::debug!("clip stopped");
        self.playback.stop();
    }
}

/// Initial placement of the two balls in a collision scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneParams {
    pub scene: u32,
    pub ypos: [f64; 2],
    pub angles_deg: [f64; 2],
}

/// The close-call scenes: actual hit / close-call / miss crossed with the
/// counterfactual outcome.
pub const SCENES: [SceneParams; 6] = [
    SceneParams { scene: 3, ypos: [140.0, 460.0], angles_deg: [166.0, 208.0] },
    SceneParams { scene: 4, ypos: [130.0, 470.0], angles_deg: [168.0, 210.0] },
    SceneParams { scene: 9, ypos: [125.0, 475.0], angles_deg: [165.0, 205.0] },
    SceneParams { scene: 10, ypos: [130.0, 470.0], angles_deg: [166.0, 205.0] },
    SceneParams { scene: 15, ypos: [120.0, 480.0], angles_deg: [164.0, 202.0] },
    SceneParams { scene: 16, ypos: [125.0, 475.0], angles_deg: [163.0, 200.0] },
];

pub fn scene_params(condition: &str) -> Result<SceneParams, SimError> {
    condition
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|n| SCENES.iter().find(|s| s.scene == n).copied())
        .ok_or_else(|| SimError::UnknownScene(condition.to_string()))
}

/// Presents collision scenes; the ball physics is not simulated here.
pub struct CollisionDemo {
    playback: Playback,
}

impl CollisionDemo {
    pub fn new(pace: Pace) -> Self {
        Self {
            playback: Playback::new(pace),
        }
    }
}

impl StimulusPlayer for CollisionDemo {
    fn play(&mut self, request: &StimulusRequest, done: Completion) -> Result<(), BoxError> {
        debug_assert_eq!(request.kind, Step::Collisions);
        let params = scene_params(request.condition.as_str())?;
        tracing::info!(
            scene = params.scene,
            ypos = ?params.ypos,
            angles = ?params.angles_deg,
            display_ms = request.display_ms,
            "collision scene playing"
        );
        self.playback.start(request.display_ms, done)
    }

    fn stop(&mut self) {
        tracing::debug!("collision scene stopped");
        self.playback.stop();
    }
}
