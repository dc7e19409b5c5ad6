//! Stateless hand pose classification.
//!
//! Every threshold is expressed relative to the palm size (wrist to index
//! knuckle) so the result does not depend on image resolution or on how far
//! the hand is from the camera. Callers that want hysteresis or temporal
//! smoothing apply it to the continuous strengths themselves.

use crate::landmarks::{
    HandFrame, Landmark, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP, PINKY_TIP,
    RING_MCP, RING_TIP, THUMB_MCP, THUMB_TIP, WRIST,
};

pub const PINCH_SPREAD_SCALE: f32 = 0.55;
pub const PINCH_THRESHOLD: f32 = 0.55;
pub const GRAB_THRESHOLD: f32 = 0.55;
pub const BEND_REACH_SCALE: f32 = 1.8;

pub const AIM_CURL_THRESHOLD: f32 = 0.55;
pub const AIM_THUMB_REACH: f32 = 1.4;
pub const AIM_INDEX_REACH: f32 = 1.6;
pub const AIM_MIN_ANGLE_DEG: f32 = 50.0;
pub const AIM_MAX_ANGLE_DEG: f32 = 130.0;

pub const POINT_INDEX_REACH: f32 = 1.65;
pub const POINT_CURLED_REACH: f32 = 1.3;

const MIN_PALM_SIZE: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureKind {
    /// Thumb, index and middle tips brought together.
    Pinch3,
    /// All four fingers closed.
    Grab,
    /// Finger-gun: index and thumb out at roughly a right angle, others curled.
    Aim,
    /// Index out, the other three curled.
    Point,
    /// Hand present, nothing else matched.
    Open,
    /// No usable hand.
    None,
}

impl GestureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinch3 => "pinch3",
            Self::Grab => "grab",
            Self::Aim => "aim",
            Self::Point => "point",
            Self::Open => "open",
            Self::None => "none",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureResult {
    pub kind: GestureKind,
    /// How tightly thumb, index and middle tips converge, in [0,1].
    pub pinch_strength: f32,
    /// Mean bend of the four fingers, in [0,1].
    pub grab_strength: f32,
    /// Curl of middle/ring/pinky while the thumb/index gun shape holds, else 0.
    pub aim_strength: f32,
    pub is_aiming: bool,
    pub thumb_tip: Landmark,
    pub index_tip: Landmark,
    pub middle_tip: Landmark,
}

impl GestureResult {
    pub fn none(anchor: Landmark) -> Self {
        Self {
            kind: GestureKind::None,
            pinch_strength: 0.0,
            grab_strength: 0.0,
            aim_strength: 0.0,
            is_aiming: false,
            thumb_tip: anchor,
            index_tip: anchor,
            middle_tip: anchor,
        }
    }

    /// The "pressing" signal used for hold-to-confirm.
    pub fn press_strength(&self) -> f32 {
        self.aim_strength.max(self.pinch_strength)
    }
}

pub fn classify(frame: &HandFrame) -> GestureResult {
    if !frame.is_complete() {
        let anchor = frame.get(0).unwrap_or(Landmark::ORIGIN);
        return GestureResult::none(anchor);
    }
    let lm = frame.landmarks();
    let wrist = lm[WRIST];
    let palm = wrist.distance(lm[INDEX_MCP]).max(MIN_PALM_SIZE);

    let thumb_tip = lm[THUMB_TIP];
    let index_tip = lm[INDEX_TIP];
    let middle_tip = lm[MIDDLE_TIP];

    let spread = (thumb_tip.distance(index_tip)
        + thumb_tip.distance(middle_tip)
        + index_tip.distance(middle_tip))
        / 3.0;
    let pinch_strength = (1.0 - spread / (palm * PINCH_SPREAD_SCALE)).clamp(0.0, 1.0);

    let bend = |mcp: usize, tip: usize| {
        let reach = wrist.distance(lm[mcp]) * BEND_REACH_SCALE;
        if reach <= MIN_PALM_SIZE {
            return 0.0;
        }
        1.0 - (wrist.distance(lm[tip]) / reach).clamp(0.0, 1.0)
    };
    let index_bend = bend(INDEX_MCP, INDEX_TIP);
    let middle_bend = bend(MIDDLE_MCP, MIDDLE_TIP);
    let ring_bend = bend(RING_MCP, RING_TIP);
    let pinky_bend = bend(PINKY_MCP, PINKY_TIP);
    let grab_strength = (index_bend + middle_bend + ring_bend + pinky_bend) / 4.0;
    let rest_curl = (middle_bend + ring_bend + pinky_bend) / 3.0;

    let thumb_reach = wrist.distance(thumb_tip) / palm;
    let index_reach = wrist.distance(index_tip) / palm;

    let gun_shape = thumb_reach > AIM_THUMB_REACH
        && index_reach > AIM_INDEX_REACH
        && thumb_index_angle_in_range(lm[THUMB_MCP], thumb_tip, lm[INDEX_MCP], index_tip);
    let aim_strength = if gun_shape { rest_curl } else { 0.0 };
    let is_aiming = aim_strength > AIM_CURL_THRESHOLD;

    let others_curled = [MIDDLE_TIP, RING_TIP, PINKY_TIP]
        .iter()
        .all(|&tip| wrist.distance(lm[tip]) / palm < POINT_CURLED_REACH);
    let is_pointing = index_reach > POINT_INDEX_REACH && others_curled;

    let kind = if is_aiming {
        GestureKind::Aim
    } else if pinch_strength > PINCH_THRESHOLD {
        GestureKind::Pinch3
    } else if grab_strength > GRAB_THRESHOLD {
        GestureKind::Grab
    } else if is_pointing {
        GestureKind::Point
    } else {
        GestureKind::Open
    };

    GestureResult {
        kind,
        pinch_strength,
        grab_strength,
        aim_strength,
        is_aiming,
        thumb_tip,
        index_tip,
        middle_tip,
    }
}

fn thumb_index_angle_in_range(
    thumb_mcp: Landmark,
    thumb_tip: Landmark,
    index_mcp: Landmark,
    index_tip: Landmark,
) -> bool {
    let thumb = thumb_tip.to_vec() - thumb_mcp.to_vec();
    let index = index_tip.to_vec() - index_mcp.to_vec();
    let Some(degrees) = crate::matrix_operations::angle_between_deg(thumb, index) else {
        return false;
    };
    (AIM_MIN_ANGLE_DEG..=AIM_MAX_ANGLE_DEG).contains(&degrees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{HandPose, Handedness, LANDMARK_COUNT};

    const ALL_POSES: [HandPose; 5] =
        [HandPose::Open, HandPose::Fist, HandPose::Pinch, HandPose::Point, HandPose::Aim];

    fn posed(pose: HandPose) -> HandFrame {
        HandFrame::posed(Handedness::Right, pose, (0.5, 0.4), 0.12)
    }

    #[test]
    fn short_input_degrades_to_none() {
        for count in [0usize, 1, 5, 20, 22] {
            let landmarks = (0..count)
                .map(|i| Landmark::new(i as f32 * 0.01, 0.5, 0.0))
                .collect();
            let result = classify(&HandFrame::new(Handedness::Left, landmarks));
            assert_eq!(result.kind, GestureKind::None, "count {count}");
            assert_eq!(result.pinch_strength, 0.0);
            assert_eq!(result.grab_strength, 0.0);
            assert_eq!(result.aim_strength, 0.0);
            assert!(!result.is_aiming);
        }
    }

    #[test]
    fn short_input_anchor_is_first_landmark_or_origin() {
        let empty = classify(&HandFrame::new(Handedness::Left, Vec::new()));
        assert_eq!(empty.index_tip, Landmark::ORIGIN);

        let one = classify(&HandFrame::new(Handedness::Left, vec![Landmark::new(0.3, 0.2, 0.1)]));
        assert_eq!(one.index_tip, Landmark::new(0.3, 0.2, 0.1));
        assert_eq!(one.thumb_tip, Landmark::new(0.3, 0.2, 0.1));
    }

    #[test]
    fn canonical_poses_classify() {
        assert_eq!(classify(&posed(HandPose::Open)).kind, GestureKind::Open);
        assert_eq!(classify(&posed(HandPose::Fist)).kind, GestureKind::Grab);
        assert_eq!(classify(&posed(HandPose::Pinch)).kind, GestureKind::Pinch3);
        assert_eq!(classify(&posed(HandPose::Point)).kind, GestureKind::Point);
        assert_eq!(classify(&posed(HandPose::Aim)).kind, GestureKind::Aim);
    }

    #[test]
    fn coincident_tips_give_full_pinch() {
        let result = classify(&posed(HandPose::Pinch));
        assert!((result.pinch_strength - 1.0).abs() < 1e-6);
        assert_eq!(result.kind, GestureKind::Pinch3);
    }

    #[test]
    fn aim_wins_over_pinch_when_both_hold() {
        // Hand-built in palm units (wrist at origin, +y along the fingers):
        // thumb and index tips meet far from the wrist with the thumb coming
        // in sideways, ring and pinky fully closed.
        let to_image = |x: f32, y: f32| Landmark::new(0.5 + x * 0.1, 0.5 - y * 0.1, 0.0);
        let mut landmarks = posed(HandPose::Aim).landmarks().to_vec();
        landmarks[WRIST] = to_image(0.0, 0.0);
        landmarks[INDEX_MCP] = to_image(-0.2, 0.98);
        landmarks[MIDDLE_MCP] = to_image(0.0, 1.0);
        landmarks[RING_MCP] = to_image(0.2, 0.95);
        landmarks[PINKY_MCP] = to_image(0.38, 0.85);
        landmarks[THUMB_MCP] = to_image(-1.25, 1.9);
        landmarks[THUMB_TIP] = to_image(-0.25, 1.9);
        landmarks[INDEX_TIP] = to_image(-0.25, 1.9);
        landmarks[MIDDLE_TIP] = to_image(-0.25, 1.6);
        landmarks[RING_TIP] = to_image(0.0, 0.0);
        landmarks[PINKY_TIP] = to_image(0.0, 0.0);

        let result = classify(&HandFrame::new(Handedness::Right, landmarks));
        assert!(result.is_aiming);
        assert!(result.pinch_strength > PINCH_THRESHOLD);
        assert_eq!(result.kind, GestureKind::Aim);
    }

    #[test]
    fn pinch_wins_over_grab() {
        // A fist whose thumb, index and middle tips converge satisfies both.
        let fist = posed(HandPose::Fist);
        let mut landmarks = fist.landmarks().to_vec();
        landmarks[THUMB_TIP] = landmarks[INDEX_TIP];
        landmarks[MIDDLE_TIP] = landmarks[INDEX_TIP];
        let result = classify(&HandFrame::new(Handedness::Right, landmarks));
        assert!(result.grab_strength > GRAB_THRESHOLD);
        assert!(result.pinch_strength > PINCH_THRESHOLD);
        assert_eq!(result.kind, GestureKind::Pinch3);
    }

    #[test]
    fn strengths_stay_in_unit_range() {
        for pose in ALL_POSES {
            let r = classify(&posed(pose));
            for value in [r.pinch_strength, r.grab_strength, r.aim_strength] {
                assert!((0.0..=1.0).contains(&value), "{pose:?}: {value}");
            }
        }
    }

    #[test]
    fn scale_and_translation_invariant() {
        for pose in ALL_POSES {
            let near = classify(&HandFrame::posed(Handedness::Left, pose, (0.2, 0.3), 0.25));
            let far = classify(&HandFrame::posed(Handedness::Left, pose, (0.8, 0.7), 0.05));
            assert_eq!(near.kind, far.kind);
            assert!((near.grab_strength - far.grab_strength).abs() < 1e-3);
            assert!((near.pinch_strength - far.pinch_strength).abs() < 1e-3);
        }
    }

    #[test]
    fn classify_is_pure() {
        let frame = posed(HandPose::Point);
        assert_eq!(classify(&frame), classify(&frame));
    }

    #[test]
    fn collapsed_hand_does_not_produce_nan() {
        let landmarks = vec![Landmark::new(0.5, 0.5, 0.0); LANDMARK_COUNT];
        let frame = HandFrame::new(Handedness::Left, landmarks);
        let r = classify(&frame);
        assert!(r.pinch_strength.is_finite());
        assert!(r.grab_strength.is_finite());
        assert_eq!(r.pinch_strength, 1.0);
        assert_eq!(r.kind, GestureKind::Pinch3);
    }
}
