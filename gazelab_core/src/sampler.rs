//! Background gaze sampling.
//!
//! Spawns a thread that owns the `GazeSource`, forwards every sample onto the
//! event bus and serves lifecycle commands over a control channel. The
//! returned `Sampler` is the sequencer's `SensorControl` handle.
//!
//! Each `Sampler` spawns exactly one thread, shut down and joined on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use gazelab_traits::{BoxError, Clock, GazeSource, Point};

use crate::collab::SensorControl;
use crate::events::{Event, EventSender};

/// Starting the model can take a while (camera warm-up).
const BEGIN_TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    Begin(xch::Sender<Result<(), String>>),
    Pause,
    Resume,
    Estimate(xch::Sender<Option<Point>>),
    End,
}

#[derive(Default)]
struct Flags {
    running: bool,
    paused: bool,
}

pub struct Sampler {
    ctl: xch::Sender<Command>,
    reply_timeout: Duration,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    /// `read_timeout` bounds each blocking read; `reply_timeout` bounds how
    /// long an estimate query waits before failing open.
    pub fn spawn<G, C>(
        mut source: G,
        bus: EventSender,
        read_timeout: Duration,
        reply_timeout: Duration,
        clock: C,
    ) -> Self
    where
        G: GazeSource + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (ctl, ctl_rx) = xch::unbounded::<Command>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            let mut flags = Flags::default();
            'outer: loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                // Drain control commands first so pause/estimate stay responsive.
                loop {
                    match ctl_rx.try_recv() {
                        Ok(cmd) => apply(&mut source, &mut flags, cmd),
                        Err(xch::TryRecvError::Empty) => break,
                        Err(xch::TryRecvError::Disconnected) => break 'outer,
                    }
                }

                if !flags.running || flags.paused {
                    // Nothing to read; block on the control channel instead of spinning.
                    match ctl_rx.recv_timeout(read_timeout) {
                        Ok(cmd) => apply(&mut source, &mut flags, cmd),
                        Err(xch::RecvTimeoutError::Timeout) => {}
                        Err(xch::RecvTimeoutError::Disconnected) => break,
                    }
                    continue;
                }

                match source.next_sample(read_timeout) {
                    Ok(Some(sample)) => {
                        if bus.send(Event::Gaze(sample)).is_err() {
                            tracing::debug!("event bus closed, sampler exiting");
                            break;
                        }
                        last_ok_clone.store(clock.ms_since(epoch), Ordering::Relaxed);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::trace!(error = %e, "gaze read failed"),
                }
            }
            // Apply whatever the owner sent before dropping us.
            while let Ok(cmd) = ctl_rx.try_recv() {
                apply(&mut source, &mut flags, cmd);
            }
            if flags.running {
                source.end();
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            ctl,
            reply_timeout,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Milliseconds since the last forwarded sample, measured at `now_ms`
    /// on the sampler's epoch.
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    pub fn stalled_for_now(&self) -> u64 {
        let ms = Instant::now().saturating_duration_since(self.epoch).as_millis();
        self.stalled_for(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    fn send(&self, cmd: Command) {
        if self.ctl.send(cmd).is_err() {
            tracing::debug!("sampler thread gone; command dropped");
        }
    }
}

fn apply<G: GazeSource>(source: &mut G, flags: &mut Flags, cmd: Command) {
    match cmd {
        Command::Begin(reply) => {
            let res = if flags.running {
                Ok(())
            } else {
                source.begin().map_err(|e| e.to_string())
            };
            flags.running = res.is_ok();
            flags.paused = false;
            let _ = reply.send(res);
        }
        Command::Pause => {
            if flags.running && !flags.paused {
                source.pause();
                flags.paused = true;
            }
        }
        Command::Resume => {
            if flags.running && flags.paused {
                source.resume();
                flags.paused = false;
            }
        }
        Command::Estimate(reply) => {
            let est = if flags.running {
                source.current_estimate()
            } else {
                None
            };
            let _ = reply.send(est);
        }
        Command::End => {
            if flags.running {
                source.end();
            }
            *flags = Flags::default();
        }
    }
}

impl SensorControl for Sampler {
    fn begin(&mut self) -> Result<(), BoxError> {
        let (tx, rx) = xch::bounded(1);
        self.send(Command::Begin(tx));
        match rx.recv_timeout(BEGIN_TIMEOUT.max(self.reply_timeout)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(msg.into()),
            Err(_) => Err("gaze sensor did not acknowledge start".into()),
        }
    }

    fn pause(&mut self) {
        self.send(Command::Pause);
    }

    fn resume(&mut self) {
        self.send(Command::Resume);
    }

    fn end(&mut self) {
        self.send(Command::End);
    }

    fn current_estimate(&mut self) -> Option<Point> {
        let (tx, rx) = xch::bounded(1);
        self.send(Command::Estimate(tx));
        rx.recv_timeout(self.reply_timeout).ok().flatten()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits at the next loop turn, after at most one read timeout.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}
