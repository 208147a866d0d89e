//! A simulated participant's eye: where it looks and how noisy the estimate is.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gazelab_traits::Point;
use rand::Rng;

#[derive(Debug, Clone)]
struct EyeState {
    focus: Point,
    bias: Point,
    noise_px: f64,
    glance: Option<(Point, u32)>,
}

/// Cloneable handle; the renderer moves the focus, gaze sources observe it.
#[derive(Debug, Clone)]
pub struct SimulatedEye {
    state: Arc<Mutex<EyeState>>,
}

impl SimulatedEye {
    /// `bias` is a constant estimation offset, `noise_px` the half-width of
    /// uniform jitter on each axis.
    pub fn new(start: Point, bias: Point, noise_px: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(EyeState {
                focus: start,
                bias,
                noise_px: noise_px.max(0.0),
                glance: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EyeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn look_at(&self, p: Point) {
        self.lock().focus = p;
    }

    pub fn focus(&self) -> Point {
        self.lock().focus
    }

    /// The next `samples` observations land on `to` instead of the focus.
    pub fn glance_away(&self, to: Point, samples: u32) {
        self.lock().glance = Some((to, samples));
    }

    pub fn is_glancing(&self) -> bool {
        self.lock().glance.is_some()
    }

    /// One noisy estimate of where the eye is.
    pub fn observe<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        let mut s = self.lock();
        let target = match s.glance.as_mut() {
            Some((to, left)) => {
                let to = *to;
                *left = left.saturating_sub(1);
                if *left == 0 {
                    s.glance = None;
                }
                to
            }
            None => s.focus,
        };
        let n = s.noise_px;
        let dx = jitter(rng, n);
        let dy = jitter(rng, n);
        Point::new(target.x + s.bias.x + dx, target.y + s.bias.y + dy)
    }
}

fn jitter<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    if half_width > 0.0 {
        rng.gen_range(-half_width..=half_width)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn noiseless_eye_reports_focus_plus_bias() {
        let eye = SimulatedEye::new(Point::new(10.0, 10.0), Point::new(2.0, -1.0), 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(eye.observe(&mut rng), Point::new(12.0, 9.0));
        eye.look_at(Point::new(0.0, 0.0));
        assert_eq!(eye.observe(&mut rng), Point::new(2.0, -1.0));
    }

    #[test]
    fn glance_lasts_for_the_given_samples() {
        let eye = SimulatedEye::new(Point::new(0.0, 0.0), Point::default(), 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        eye.glance_away(Point::new(900.0, 900.0), 2);
        assert_eq!(eye.observe(&mut rng), Point::new(900.0, 900.0));
        assert_eq!(eye.observe(&mut rng), Point::new(900.0, 900.0));
        assert!(!eye.is_glancing());
        assert_eq!(eye.observe(&mut rng), Point::new(0.0, 0.0));
    }

    #[test]
    fn noise_is_bounded() {
        let eye = SimulatedEye::new(Point::new(100.0, 100.0), Point::default(), 5.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let p = eye.observe(&mut rng);
            assert!((p.x - 100.0).abs() <= 5.0 && (p.y - 100.0).abs() <= 5.0);
        }
    }
}
