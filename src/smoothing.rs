//! One-euro filtering of fingertip pointers. Slow hand motion is smoothed
//! hard to kill detector jitter; fast motion raises the cutoff so the
//! pointer keeps up.

use std::f32::consts::TAU;

use cgmath::Vector2;

use crate::landmarks::HandSlots;

pub const POINTER_MIN_CUTOFF_HZ: f32 = 1.2;
pub const POINTER_BETA: f32 = 0.4;
const DERIVATIVE_CUTOFF_HZ: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
struct Sample {
    value: f32,
    velocity: f32,
    time: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    last: Option<Sample>,
}

fn alpha(dt: f32, cutoff_hz: f32) -> f32 {
    let r = TAU * cutoff_hz * dt;
    r / (r + 1.0)
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            last: None,
        }
    }

    pub fn filter(&mut self, value: f32, now: f64) -> f32 {
        let Some(last) = self.last else {
            self.last = Some(Sample {
                value,
                velocity: 0.0,
                time: now,
            });
            return value;
        };
        let dt = (now - last.time) as f32;
        if dt <= 0.0 {
            return last.value;
        }

        let raw_velocity = (value - last.value) / dt;
        let a_d = alpha(dt, DERIVATIVE_CUTOFF_HZ);
        let velocity = last.velocity + a_d * (raw_velocity - last.velocity);

        let cutoff = self.min_cutoff + self.beta * velocity.abs();
        let a = alpha(dt, cutoff);
        let filtered = last.value + a * (value - last.value);

        self.last = Some(Sample {
            value: filtered,
            velocity,
            time: now,
        });
        filtered
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OneEuroFilter2D {
    x: OneEuroFilter,
    y: OneEuroFilter,
}

impl OneEuroFilter2D {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            x: OneEuroFilter::new(min_cutoff, beta),
            y: OneEuroFilter::new(min_cutoff, beta),
        }
    }

    pub fn filter(&mut self, value: Vector2<f32>, now: f64) -> Vector2<f32> {
        Vector2::new(self.x.filter(value.x, now), self.y.filter(value.y, now))
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}

impl Default for OneEuroFilter2D {
    fn default() -> Self {
        Self::new(POINTER_MIN_CUTOFF_HZ, POINTER_BETA)
    }
}

/// One pointer filter per hand slot. A slot that loses its hand is reset so
/// the next detection starts fresh instead of sliding in from the old spot.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointerSmoother {
    filters: HandSlots<OneEuroFilter2D>,
}

impl PointerSmoother {
    pub fn smooth(
        &mut self,
        pointers: HandSlots<Option<Vector2<f32>>>,
        now: f64,
    ) -> HandSlots<Option<Vector2<f32>>> {
        let mut out = HandSlots::default();
        for (hand, pointer) in pointers.iter() {
            let filter = self.filters.get_mut(hand);
            *out.get_mut(hand) = match pointer {
                Some(p) => Some(filter.filter(*p, now)),
                None => {
                    filter.reset();
                    None
                }
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut f = OneEuroFilter::new(1.0, 0.0);
        assert_eq!(f.filter(3.0, 0.0), 3.0);
    }

    #[test]
    fn jitter_is_attenuated() {
        let mut f = OneEuroFilter::new(1.0, 0.0);
        f.filter(0.0, 0.0);
        let out = f.filter(1.0, 1.0 / 30.0);
        assert!(out > 0.0 && out < 0.5, "{out}");
    }

    #[test]
    fn fast_motion_tracks_closer() {
        let mut slow = OneEuroFilter::new(1.0, 0.0);
        let mut fast = OneEuroFilter::new(1.0, 5.0);
        let mut a = 0.0;
        let mut b = 0.0;
        for i in 0..10 {
            let t = i as f64 / 30.0;
            let x = i as f32 * 0.2;
            a = slow.filter(x, t);
            b = fast.filter(x, t);
        }
        assert!(b > a);
    }

    #[test]
    fn non_advancing_time_holds_value() {
        let mut f = OneEuroFilter::new(1.0, 0.0);
        f.filter(1.0, 1.0);
        assert_eq!(f.filter(9.0, 1.0), 1.0);
    }

    #[test]
    fn lost_hand_resets_its_filter() {
        let mut smoother = PointerSmoother::default();
        let at = |x: f32| HandSlots {
            left: None,
            right: Some(Vector2::new(x, 0.0)),
        };
        smoother.smooth(at(0.0), 0.0);
        let moved = smoother.smooth(at(1.0), 0.033).right.unwrap();
        assert!(moved.x < 1.0);

        smoother.smooth(HandSlots::default(), 0.066);
        let fresh = smoother.smooth(at(1.0), 0.1).right.unwrap();
        assert_eq!(fresh.x, 1.0);
    }
}
