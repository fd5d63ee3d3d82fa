use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use utoipa::ToSchema;

/// Best-match distance below which a face is accepted.
pub const MATCH_DISTANCE_THRESHOLD: f64 = 0.6;

/// The detection box centre must fall inside a circle of this fraction of
/// the smaller frame dimension, centred on the frame.
pub const FRAME_CENTER_RADIUS_RATIO: f64 = 0.3;

/// Detection box width/height must each cover this fraction range of the
/// corresponding frame dimension. Filters partial and off-angle faces.
pub const MIN_BOX_RATIO: f64 = 0.25;
pub const MAX_BOX_RATIO: f64 = 0.7;

/// Capture sessions poll detection roughly once a second.
pub const DETECT_INTERVAL_MS: i64 = 1000;

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct FrameSize {
    #[schema(example = 640.0)]
    pub width: f64,
    #[schema(example = 480.0)]
    pub height: f64,
}

/// Bounding box of a detected face, in frame pixels.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct DetectionBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone)]
pub struct BestMatch {
    pub worker_id: u64,
    pub distance: f64,
}

/// Why a frame was rejected before any attendance logic ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// No enrolled descriptors to compare against.
    NotEnrolled,
    OutOfFrame,
    NotRecognized,
    Accepted,
}

/// Euclidean distance between two descriptors, the same metric the
/// detection library uses for its matcher.
pub fn descriptor_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Closest enrolled descriptor across a set of (worker, descriptor) pairs.
pub fn best_match(candidate: &[f32], enrolled: &[(u64, Vec<f32>)]) -> Option<BestMatch> {
    enrolled
        .iter()
        .map(|(worker_id, descriptor)| BestMatch {
            worker_id: *worker_id,
            distance: descriptor_distance(candidate, descriptor),
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// True when the detection is substantially centered and sized within the
/// capture frame.
pub fn box_within_frame(b: &DetectionBox, frame: &FrameSize) -> bool {
    let frame_cx = frame.width / 2.0;
    let frame_cy = frame.height / 2.0;
    let frame_radius = frame.width.min(frame.height) * FRAME_CENTER_RADIUS_RATIO;

    let face_cx = b.x + b.width / 2.0;
    let face_cy = b.y + b.height / 2.0;
    let distance = ((face_cx - frame_cx).powi(2) + (face_cy - frame_cy).powi(2)).sqrt();

    distance <= frame_radius
        && b.width >= frame.width * MIN_BOX_RATIO
        && b.height >= frame.height * MIN_BOX_RATIO
        && b.width <= frame.width * MAX_BOX_RATIO
        && b.height <= frame.height * MAX_BOX_RATIO
}

/// Full accept/reject policy for one detection against one worker's
/// enrolled set. Acceptance still has to pass the attendance recorder.
pub fn evaluate(
    candidate: &[f32],
    detection_box: &DetectionBox,
    frame: &FrameSize,
    enrolled: &[(u64, Vec<f32>)],
) -> MatchDecision {
    if enrolled.is_empty() {
        return MatchDecision::NotEnrolled;
    }
    if !box_within_frame(detection_box, frame) {
        return MatchDecision::OutOfFrame;
    }
    match best_match(candidate, enrolled) {
        Some(m) if m.distance < MATCH_DISTANCE_THRESHOLD => MatchDecision::Accepted,
        _ => MatchDecision::NotRecognized,
    }
}

/// Polling state for an open capture session. After a cooldown rejection
/// the session stops submitting frames until the countdown elapses.
#[derive(Debug, Default)]
pub struct CaptureSession {
    last_poll: Option<NaiveDateTime>,
    suspended_until: Option<NaiveDateTime>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame should be submitted now, honoring both the ~1 s
    /// cadence and any cooldown suspension.
    pub fn poll_due(&mut self, now: NaiveDateTime) -> bool {
        if let Some(until) = self.suspended_until {
            if now < until {
                return false;
            }
            self.suspended_until = None;
        }
        match self.last_poll {
            Some(last) if (now - last).num_milliseconds() < DETECT_INTERVAL_MS => false,
            _ => {
                self.last_poll = Some(now);
                true
            }
        }
    }

    /// Called when the recorder reported COOLDOWN_ACTIVE.
    pub fn suspend_for(&mut self, remaining_seconds: i64, now: NaiveDateTime) {
        self.suspended_until = Some(now + Duration::seconds(remaining_seconds));
    }

    pub fn is_suspended(&self, now: NaiveDateTime) -> bool {
        self.suspended_until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn frame() -> FrameSize {
        FrameSize {
            width: 640.0,
            height: 480.0,
        }
    }

    fn centered_box() -> DetectionBox {
        // 240x240 box centered in a 640x480 frame
        DetectionBox {
            x: 200.0,
            y: 120.0,
            width: 240.0,
            height: 240.0,
        }
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn distance_of_identical_descriptors_is_zero() {
        let d = vec![0.1f32; 128];
        assert_eq!(descriptor_distance(&d, &d), 0.0);
    }

    #[test]
    fn best_match_picks_closest_worker() {
        let candidate = vec![0.0f32; 4];
        let enrolled = vec![
            (1u64, vec![1.0f32; 4]),
            (2u64, vec![0.1f32; 4]),
            (3u64, vec![0.5f32; 4]),
        ];
        let m = best_match(&candidate, &enrolled).unwrap();
        assert_eq!(m.worker_id, 2);
    }

    #[test]
    fn centered_box_passes_containment() {
        assert!(box_within_frame(&centered_box(), &frame()));
    }

    #[test]
    fn off_center_box_fails_containment() {
        let b = DetectionBox {
            x: 0.0,
            y: 0.0,
            width: 240.0,
            height: 240.0,
        };
        assert!(!box_within_frame(&b, &frame()));
    }

    #[test]
    fn undersized_and_oversized_boxes_fail() {
        let small = DetectionBox {
            x: 290.0,
            y: 210.0,
            width: 60.0,
            height: 60.0,
        };
        assert!(!box_within_frame(&small, &frame()));

        let large = DetectionBox {
            x: 70.0,
            y: 40.0,
            width: 500.0,
            height: 400.0,
        };
        assert!(!box_within_frame(&large, &frame()));
    }

    #[test]
    fn evaluate_applies_threshold() {
        let candidate = vec![0.0f32; 4];
        let near = vec![(1u64, vec![0.1f32; 4])]; // distance 0.2
        let far = vec![(1u64, vec![0.5f32; 4])]; // distance 1.0

        assert_eq!(
            evaluate(&candidate, &centered_box(), &frame(), &near),
            MatchDecision::Accepted
        );
        assert_eq!(
            evaluate(&candidate, &centered_box(), &frame(), &far),
            MatchDecision::NotRecognized
        );
        assert_eq!(
            evaluate(&candidate, &centered_box(), &frame(), &[]),
            MatchDecision::NotEnrolled
        );
    }

    #[test]
    fn session_polls_at_cadence() {
        let mut session = CaptureSession::new();
        assert!(session.poll_due(t0()));
        assert!(!session.poll_due(t0() + Duration::milliseconds(400)));
        assert!(session.poll_due(t0() + Duration::milliseconds(1100)));
    }

    #[test]
    fn session_suspends_during_cooldown_then_resumes() {
        let mut session = CaptureSession::new();
        assert!(session.poll_due(t0()));

        session.suspend_for(30, t0());
        assert!(session.is_suspended(t0() + Duration::seconds(29)));
        assert!(!session.poll_due(t0() + Duration::seconds(29)));

        assert!(!session.is_suspended(t0() + Duration::seconds(30)));
        assert!(session.poll_due(t0() + Duration::seconds(30)));
    }
}
