use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gazelab_core::{EventBus, Sampler, SensorControl};
use gazelab_traits::{BoxError, GazeSample, GazeSource, MonotonicClock, Point};

#[derive(Clone, Default)]
struct CountingSource {
    reads: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl GazeSource for CountingSource {
    fn begin(&mut self) -> Result<(), BoxError> {
        self.calls.lock().expect("lock").push("begin");
        Ok(())
    }
    fn end(&mut self) {
        self.calls.lock().expect("lock").push("end");
    }
    fn pause(&mut self) {
        self.calls.lock().expect("lock").push("pause");
    }
    fn resume(&mut self) {
        self.calls.lock().expect("lock").push("resume");
    }
    fn next_sample(&mut self, _timeout: Duration) -> Result<Option<GazeSample>, BoxError> {
        let n = self.reads.fetch_add(1, Ordering::Relaxed) as u64;
        std::thread::sleep(Duration::from_millis(1));
        Ok(Some(GazeSample::new(1.0, 2.0, n * 33)))
    }
    fn current_estimate(&mut self) -> Option<Point> {
        Some(Point::new(7.0, 8.0))
    }
}

fn wait_for_events(bus: &EventBus) {
    let start = Instant::now();
    while bus.pending() == 0 && start.elapsed() < Duration::from_secs(2) {
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn sampler_reads_only_between_begin_and_end() {
    let bus = EventBus::new();
    let source = CountingSource::default();
    let reads = source.reads.clone();
    let calls = source.calls.clone();
    let mut sampler = Sampler::spawn(
        source,
        bus.sender(),
        Duration::from_millis(5),
        Duration::from_millis(200),
        MonotonicClock::new(),
    );

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(reads.load(Ordering::Relaxed), 0, "no reads before begin");
    assert_eq!(sampler.current_estimate(), None);

    sampler.begin().expect("begin");
    wait_for_events(&bus);
    assert!(bus.pending() > 0, "samples forwarded to the bus");
    assert_eq!(sampler.current_estimate(), Some(Point::new(7.0, 8.0)));

    sampler.pause();
    sampler.resume();
    sampler.end();
    drop(sampler);

    let calls = calls.lock().expect("lock").clone();
    assert_eq!(calls, vec!["begin", "pause", "resume", "end"]);
}

#[test]
fn drop_joins_a_running_sampler() {
    let bus = EventBus::new();
    let source = CountingSource::default();
    let calls = source.calls.clone();
    let mut sampler = Sampler::spawn(
        source,
        bus.sender(),
        Duration::from_millis(5),
        Duration::from_millis(200),
        MonotonicClock::new(),
    );
    sampler.begin().expect("begin");
    drop(sampler);
    // the thread ends the source it was still running
    assert_eq!(calls.lock().expect("lock").last(), Some(&"end"));
}
