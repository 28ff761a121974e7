//! Maps a guidance point to the haptic pattern, intensity, and optional
//! spoken phrase the user receives. Hysteresis keeps directional phrases
//! from stuttering: a zone is re-announced only when it changes or enough
//! time has passed, and never over an utterance already playing.

use std::time::{Duration, Instant};

use waypoint_core::{HapticPattern, Point};

/// Half-width of the centered zone around the frame centre.
const CENTRE_EPSILON: f32 = 0.12;

/// Minimum intensity so edge-of-frame cues stay perceptible.
const MIN_INTENSITY: f32 = 0.3;

pub const DEFAULT_REANNOUNCE_INTERVAL: Duration = Duration::from_millis(2500);

/// Discretized region of the frame relative to centre.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignmentZone {
    Centered,
    Left,
    Right,
    Above,
    Below,
}

/// Which phrase vocabulary to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchKind {
    Object,
    Text,
}

/// The instruction computed for one alignment point. Transient; consumed
/// immediately by the output channel.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackDirective {
    pub zone: AlignmentZone,
    pub pattern: HapticPattern,
    pub intensity: f32,
    pub phrase: Option<String>,
}

/// Partition the frame around the centre. Outside the centered box the
/// dominant axis wins.
pub fn zone_for(point: Point) -> AlignmentZone {
    let dx = point.x - 0.5;
    let dy = point.y - 0.5;
    if dx.abs() <= CENTRE_EPSILON && dy.abs() <= CENTRE_EPSILON {
        return AlignmentZone::Centered;
    }
    if dx.abs() >= dy.abs() {
        if dx < 0.0 {
            AlignmentZone::Left
        } else {
            AlignmentZone::Right
        }
    } else if dy < 0.0 {
        AlignmentZone::Above
    } else {
        AlignmentZone::Below
    }
}

pub struct FeedbackPolicy {
    kind: SearchKind,
    reannounce_interval: Duration,
    last_zone: Option<AlignmentZone>,
    last_announce: Option<Instant>,
}

impl FeedbackPolicy {
    pub fn new(kind: SearchKind) -> Self {
        Self {
            kind,
            reannounce_interval: DEFAULT_REANNOUNCE_INTERVAL,
            last_zone: None,
            last_announce: None,
        }
    }

    pub fn with_reannounce_interval(mut self, interval: Duration) -> Self {
        self.reannounce_interval = interval;
        self
    }

    /// Forget announcement history. Called when a session stops or pauses
    /// so the next sighting is announced fresh.
    pub fn reset(&mut self) {
        self.last_zone = None;
        self.last_announce = None;
    }

    /// Compute the directive for one guidance point. `output_busy` is the
    /// feedback channel's `is_speaking()` at evaluation time.
    pub fn evaluate(&mut self, point: Point, now: Instant, output_busy: bool) -> FeedbackDirective {
        let zone = zone_for(point);
        let zone_changed = self.last_zone != Some(zone);

        let phrase = if output_busy {
            None
        } else if zone == AlignmentZone::Centered {
            // "Target reached" is announced once per entry, never repeated
            // while the point stays centered.
            zone_changed.then(|| self.phrase_for(zone).to_string())
        } else {
            let elapsed_ok = self
                .last_announce
                .map_or(true, |at| now.duration_since(at) >= self.reannounce_interval);
            (zone_changed || elapsed_ok).then(|| self.phrase_for(zone).to_string())
        };

        if phrase.is_some() {
            self.last_announce = Some(now);
        }
        self.last_zone = Some(zone);

        FeedbackDirective {
            zone,
            pattern: pattern_for(zone),
            intensity: intensity_for(zone, point),
            phrase,
        }
    }

    fn phrase_for(&self, zone: AlignmentZone) -> &'static str {
        match (self.kind, zone) {
            (SearchKind::Object, AlignmentZone::Centered) => "Target reached",
            (SearchKind::Object, AlignmentZone::Left) => "Move left",
            (SearchKind::Object, AlignmentZone::Right) => "Move right",
            (SearchKind::Object, AlignmentZone::Above) => "Move up",
            (SearchKind::Object, AlignmentZone::Below) => "Move down",
            (SearchKind::Text, AlignmentZone::Centered) => "Text centered",
            (SearchKind::Text, AlignmentZone::Left) => "Text on the left",
            (SearchKind::Text, AlignmentZone::Right) => "Text on the right",
            (SearchKind::Text, AlignmentZone::Above) => "Text above",
            (SearchKind::Text, AlignmentZone::Below) => "Text below",
        }
    }
}

fn pattern_for(zone: AlignmentZone) -> HapticPattern {
    match zone {
        AlignmentZone::Centered => HapticPattern::Success,
        AlignmentZone::Left | AlignmentZone::Right => HapticPattern::Tick,
        AlignmentZone::Above | AlignmentZone::Below => HapticPattern::DoubleTick,
    }
}

// Stronger the further from centre, full strength when centered.
fn intensity_for(zone: AlignmentZone, point: Point) -> f32 {
    if zone == AlignmentZone::Centered {
        return 1.0;
    }
    let distance = point.distance_to(waypoint_core::FRAME_CENTRE);
    (distance * 2.0).clamp(MIN_INTENSITY, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_partition() {
        assert_eq!(zone_for(Point::new(0.5, 0.5)), AlignmentZone::Centered);
        assert_eq!(zone_for(Point::new(0.58, 0.45)), AlignmentZone::Centered);
        assert_eq!(zone_for(Point::new(0.1, 0.5)), AlignmentZone::Left);
        assert_eq!(zone_for(Point::new(0.9, 0.5)), AlignmentZone::Right);
        assert_eq!(zone_for(Point::new(0.5, 0.1)), AlignmentZone::Above);
        assert_eq!(zone_for(Point::new(0.5, 0.9)), AlignmentZone::Below);
    }

    #[test]
    fn dominant_axis_wins_on_diagonals() {
        assert_eq!(zone_for(Point::new(0.1, 0.35)), AlignmentZone::Left);
        assert_eq!(zone_for(Point::new(0.45, 0.05)), AlignmentZone::Above);
    }

    #[test]
    fn same_zone_announced_at_most_once_within_interval() {
        let mut policy = FeedbackPolicy::new(SearchKind::Object);
        let now = Instant::now();
        let first = policy.evaluate(Point::new(0.1, 0.5), now, false);
        assert_eq!(first.phrase.as_deref(), Some("Move left"));
        let second = policy.evaluate(Point::new(0.12, 0.5), now + Duration::from_millis(200), false);
        assert_eq!(second.phrase, None);
    }

    #[test]
    fn reannounces_after_interval() {
        let mut policy = FeedbackPolicy::new(SearchKind::Object);
        let now = Instant::now();
        policy.evaluate(Point::new(0.1, 0.5), now, false);
        let later = policy.evaluate(Point::new(0.1, 0.5), now + Duration::from_secs(3), false);
        assert_eq!(later.phrase.as_deref(), Some("Move left"));
    }

    #[test]
    fn zone_change_announces_immediately() {
        let mut policy = FeedbackPolicy::new(SearchKind::Object);
        let now = Instant::now();
        policy.evaluate(Point::new(0.1, 0.5), now, false);
        let next = policy.evaluate(Point::new(0.9, 0.5), now + Duration::from_millis(100), false);
        assert_eq!(next.phrase.as_deref(), Some("Move right"));
    }

    #[test]
    fn busy_output_suppresses_phrase_but_keeps_haptics() {
        let mut policy = FeedbackPolicy::new(SearchKind::Object);
        let d = policy.evaluate(Point::new(0.1, 0.5), Instant::now(), true);
        assert_eq!(d.phrase, None);
        assert_eq!(d.pattern, HapticPattern::Tick);
    }

    #[test]
    fn centered_announced_once_per_entry() {
        let mut policy = FeedbackPolicy::new(SearchKind::Object);
        let now = Instant::now();
        let first = policy.evaluate(Point::new(0.5, 0.5), now, false);
        assert_eq!(first.phrase.as_deref(), Some("Target reached"));
        // Staying centered past the interval still does not repeat it.
        let stay = policy.evaluate(Point::new(0.5, 0.5), now + Duration::from_secs(10), false);
        assert_eq!(stay.phrase, None);
        // Leaving and re-entering announces again.
        policy.evaluate(Point::new(0.1, 0.5), now + Duration::from_secs(11), false);
        let back = policy.evaluate(Point::new(0.5, 0.5), now + Duration::from_secs(12), false);
        assert_eq!(back.phrase.as_deref(), Some("Target reached"));
    }

    #[test]
    fn text_kind_uses_text_vocabulary() {
        let mut policy = FeedbackPolicy::new(SearchKind::Text);
        let d = policy.evaluate(Point::new(0.5, 0.5), Instant::now(), false);
        assert_eq!(d.phrase.as_deref(), Some("Text centered"));
        assert_eq!(d.pattern, HapticPattern::Success);
    }

    #[test]
    fn intensity_scales_with_distance() {
        let mut policy = FeedbackPolicy::new(SearchKind::Object);
        let near = policy.evaluate(Point::new(0.3, 0.5), Instant::now(), true);
        let far = policy.evaluate(Point::new(0.02, 0.5), Instant::now(), true);
        assert!(far.intensity > near.intensity);
        assert!(far.intensity <= 1.0);
        assert!(near.intensity >= MIN_INTENSITY);
    }
}
