//! Turns noisy per-frame detections into one smoothed, confidence-weighted
//! guidance point. Conviction rises on hits and decays on misses; while it
//! sits below one confirmed hit the session treats the target as not
//! visible, which keeps marginal detections from producing jittery cues.
//!
//! Works on candidate bounding boxes so object matches and text blocks go
//! through the same policy.

use std::collections::VecDeque;

use waypoint_core::{BoundingBox, Point, FRAME_CENTRE};

#[derive(Clone, Copy, Debug)]
pub struct PredictionConfig {
    /// EMA weight on the previous smoothed value.
    pub alpha: f32,
    /// Conviction increase per frame with a detection.
    pub hit_step: f32,
    /// Conviction decrease per frame without one.
    pub miss_step: f32,
    pub max_conviction: f32,
    /// Retained positions for extrapolation.
    pub history_len: usize,
    /// Extrapolate one frame ahead to compensate for pipeline latency.
    pub extrapolate: bool,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            hit_step: 1.0,
            miss_step: 0.34,
            max_conviction: 5.0,
            history_len: 12,
            extrapolate: false,
        }
    }
}

/// Picks the candidate a guidance cue should be anchored to.
pub struct CentreAlignmentEvaluator;

impl CentreAlignmentEvaluator {
    /// The candidate whose centre is nearest the frame centre.
    pub fn best_candidate(candidates: &[BoundingBox]) -> Option<&BoundingBox> {
        candidates.iter().min_by(|a, b| {
            let da = a.centre().distance_to(FRAME_CENTRE);
            let db = b.centre().distance_to(FRAME_CENTRE);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Mutable per-session prediction record. All access is serialized by the
/// owning session.
pub struct PredictionState {
    config: PredictionConfig,
    smooth: Option<Point>,
    conviction: f32,
    history: VecDeque<(u64, Point)>,
    frames_seen: u64,
}

impl PredictionState {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            smooth: None,
            conviction: 0.0,
            history: VecDeque::with_capacity(config.history_len),
            frames_seen: 0,
        }
    }

    pub fn conviction(&self) -> f32 {
        self.conviction
    }

    pub fn smooth_position(&self) -> Option<Point> {
        self.smooth
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Forget everything. Called on session stop.
    pub fn reset(&mut self) {
        self.smooth = None;
        self.conviction = 0.0;
        self.history.clear();
        self.frames_seen = 0;
    }

    /// Fold one frame's matching candidates in and return the point to
    /// guide toward, if any.
    pub fn observe(&mut self, candidates: &[BoundingBox]) -> Option<Point> {
        self.frames_seen += 1;

        match CentreAlignmentEvaluator::best_candidate(candidates) {
            None => {
                self.conviction = clamp(self.conviction - self.config.miss_step, self.config);
                if self.conviction <= 0.0 {
                    // Full forget: the target is gone, stale history would
                    // only mislead the next sighting.
                    self.smooth = None;
                    self.history.clear();
                    self.frames_seen = 0;
                }
            }
            Some(candidate) => {
                self.conviction = clamp(self.conviction + self.config.hit_step, self.config);
                let observed = candidate.centre();
                let alpha = self.config.alpha;
                let next = match self.smooth {
                    // Seed directly on the first detection.
                    None => observed,
                    Some(prev) => Point::new(
                        prev.x * alpha + observed.x * (1.0 - alpha),
                        prev.y * alpha + observed.y * (1.0 - alpha),
                    ),
                };
                self.smooth = Some(next);
                self.history.push_back((self.frames_seen, next));
                while self.history.len() > self.config.history_len {
                    self.history.pop_front();
                }
            }
        }

        self.guidance_point()
    }

    /// The point feedback should steer toward, or `None` while the target
    /// is not confidently visible.
    pub fn guidance_point(&self) -> Option<Point> {
        if self.conviction < self.config.hit_step {
            return None;
        }
        let smooth = self.smooth?;
        if self.config.extrapolate {
            if let Some(predicted) = self.extrapolated() {
                return Some(predicted);
            }
        }
        Some(smooth)
    }

    /// Least-squares linear fit over the retained window, evaluated one
    /// frame ahead.
    fn extrapolated(&self) -> Option<Point> {
        if self.history.len() < 2 {
            return None;
        }
        let n = self.history.len() as f32;
        let (mut sum_t, mut sum_x, mut sum_y, mut sum_tt, mut sum_tx, mut sum_ty) =
            (0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for &(frame, p) in &self.history {
            let t = frame as f32;
            sum_t += t;
            sum_x += p.x;
            sum_y += p.y;
            sum_tt += t * t;
            sum_tx += t * p.x;
            sum_ty += t * p.y;
        }
        let denom = n * sum_tt - sum_t * sum_t;
        if denom.abs() < f32::EPSILON {
            return None;
        }
        let slope_x = (n * sum_tx - sum_t * sum_x) / denom;
        let slope_y = (n * sum_ty - sum_t * sum_y) / denom;
        let intercept_x = (sum_x - slope_x * sum_t) / n;
        let intercept_y = (sum_y - slope_y * sum_t) / n;

        let t_next = self.history.back()?.0 as f32 + 1.0;
        Some(Point::new(slope_x * t_next + intercept_x, slope_y * t_next + intercept_y).clamped())
    }
}

// Hard invariant on every mutation path, not just batch end: concurrent
// observers must never read conviction outside [0, max].
fn clamp(value: f32, config: PredictionConfig) -> f32 {
    value.clamp(0.0, config.max_conviction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_at(x: f32, y: f32) -> BoundingBox {
        BoundingBox::new(x - 0.05, y - 0.05, 0.1, 0.1)
    }

    fn state() -> PredictionState {
        PredictionState::new(PredictionConfig::default())
    }

    #[test]
    fn first_detection_seeds_exactly() {
        let mut s = state();
        s.observe(&[box_at(0.3, 0.7)]);
        let p = s.smooth_position().unwrap();
        assert!((p.x - 0.3).abs() < 1e-5);
        assert!((p.y - 0.7).abs() < 1e-5);
    }

    #[test]
    fn smoothing_blends_toward_new_position() {
        let mut s = state();
        s.observe(&[box_at(0.2, 0.2)]);
        s.observe(&[box_at(0.8, 0.8)]);
        let p = s.smooth_position().unwrap();
        // alpha 0.6: 0.2*0.6 + 0.8*0.4 = 0.44
        assert!((p.x - 0.44).abs() < 1e-5);
        assert!(p.x > 0.2 && p.x < 0.8);
    }

    #[test]
    fn conviction_never_leaves_bounds() {
        let mut s = state();
        for _ in 0..50 {
            s.observe(&[box_at(0.5, 0.5)]);
            assert!(s.conviction() <= PredictionConfig::default().max_conviction);
        }
        for _ in 0..100 {
            s.observe(&[]);
            assert!(s.conviction() >= 0.0);
        }
    }

    #[test]
    fn misses_eventually_forget_everything() {
        let mut s = state();
        s.observe(&[box_at(0.5, 0.5)]);
        for _ in 0..10 {
            s.observe(&[]);
        }
        assert_eq!(s.conviction(), 0.0);
        assert!(s.smooth_position().is_none());
        assert_eq!(s.frames_seen(), 0);
    }

    #[test]
    fn guidance_suppressed_below_one_hit() {
        let mut s = state();
        assert!(s.guidance_point().is_none());
        // One hit then a miss drops conviction below the hit step.
        s.observe(&[box_at(0.5, 0.5)]);
        assert!(s.guidance_point().is_some());
        s.observe(&[]);
        assert!(s.guidance_point().is_none());
    }

    #[test]
    fn evaluator_picks_nearest_to_centre() {
        let far = box_at(0.1, 0.1);
        let near = box_at(0.55, 0.5);
        let candidates = vec![far, near];
        let best = CentreAlignmentEvaluator::best_candidate(&candidates).unwrap();
        assert_eq!(*best, near);
    }

    #[test]
    fn evaluator_empty_batch() {
        assert!(CentreAlignmentEvaluator::best_candidate(&[]).is_none());
    }

    #[test]
    fn extrapolation_follows_motion() {
        let mut s = PredictionState::new(PredictionConfig {
            extrapolate: true,
            alpha: 0.0, // track raw positions so the fit is exact
            ..Default::default()
        });
        for i in 0..5 {
            s.observe(&[box_at(0.1 + 0.1 * i as f32, 0.5)]);
        }
        let p = s.guidance_point().unwrap();
        // Last observed x is 0.5 and the track moves +0.1 per frame.
        assert!((p.x - 0.6).abs() < 1e-3, "got {}", p.x);
    }

    #[test]
    fn history_is_bounded() {
        let mut s = state();
        for _ in 0..100 {
            s.observe(&[box_at(0.5, 0.5)]);
        }
        assert!(s.history.len() <= PredictionConfig::default().history_len);
    }
}
