//! Hand skeleton input: 21 landmarks per detected hand, and the two named
//! hand slots every per-tick consumer works with.

use cgmath::{InnerSpace, Vector3};

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// One tracked point. `x`/`y` are normalized image coordinates in [0,1],
/// `z` is a relative depth cue with no metric meaning.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const ORIGIN: Landmark = Landmark { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec(self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn distance(self, other: Landmark) -> f32 {
        (self.to_vec() - other.to_vec()).magnitude()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// The skeleton of one hand at one instant. Immutable once produced; the
/// next detection result replaces it wholesale.
///
/// The landmark list is not forced to length 21 here because detectors do
/// deliver short arrays; the classifier is where that is handled.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFrame {
    handedness: Handedness,
    landmarks: Vec<Landmark>,
}

impl HandFrame {
    pub fn new(handedness: Handedness, landmarks: Vec<Landmark>) -> Self {
        Self { handedness, landmarks }
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn is_complete(&self) -> bool {
        self.landmarks.len() == LANDMARK_COUNT
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.landmarks.get(index).copied()
    }

    /// A synthetic, well-formed hand in one of the canonical poses, placed so
    /// that the index fingertip lands on `index_tip` (normalized image
    /// coordinates). `palm_size` is the wrist to index-knuckle distance.
    pub fn posed(
        handedness: Handedness,
        pose: HandPose,
        index_tip: (f32, f32),
        palm_size: f32,
    ) -> Self {
        let local = pose.local_landmarks();
        let anchor = local[INDEX_TIP];
        // Local space has +y pointing up the fingers; image space has +y down.
        let landmarks = local
            .iter()
            .map(|&(x, y)| {
                Landmark::new(
                    index_tip.0 + (x - anchor.0) * palm_size,
                    index_tip.1 - (y - anchor.1) * palm_size,
                    0.0,
                )
            })
            .collect();
        Self { handedness, landmarks }
    }
}

/// Canonical poses used by the desktop demo source and by tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandPose {
    Open,
    Fist,
    Pinch,
    Point,
    Aim,
}

const LOCAL_WRIST: (f32, f32) = (0.0, 0.0);
const LOCAL_INDEX_MCP: (f32, f32) = (-0.2, 0.98);
const LOCAL_MIDDLE_MCP: (f32, f32) = (0.0, 1.0);
const LOCAL_RING_MCP: (f32, f32) = (0.2, 0.95);
const LOCAL_PINKY_MCP: (f32, f32) = (0.38, 0.85);
const LOCAL_THUMB_CMC: (f32, f32) = (-0.35, 0.25);
const LOCAL_THUMB_MCP: (f32, f32) = (-0.6, 0.5);

const EXTENDED_INDEX_TIP: (f32, f32) = (-0.25, 1.9);
const EXTENDED_MIDDLE_TIP: (f32, f32) = (0.0, 2.0);
const EXTENDED_RING_TIP: (f32, f32) = (0.25, 1.85);
const EXTENDED_PINKY_TIP: (f32, f32) = (0.5, 1.6);

const CURLED_INDEX_TIP: (f32, f32) = (-0.2, 0.45);
const CURLED_MIDDLE_TIP: (f32, f32) = (0.0, 0.45);
const CURLED_RING_TIP: (f32, f32) = (0.2, 0.45);
const CURLED_PINKY_TIP: (f32, f32) = (0.38, 0.5);

const PINCH_POINT: (f32, f32) = (-0.3, 1.3);

impl HandPose {
    fn local_landmarks(self) -> [(f32, f32); LANDMARK_COUNT] {
        let (thumb_ip, thumb_tip) = match self {
            Self::Open => ((-0.85, 0.8), (-1.1, 1.05)),
            Self::Aim => ((-1.0, 0.55), (-1.45, 0.6)),
            Self::Pinch => ((-0.5, 0.9), PINCH_POINT),
            Self::Fist | Self::Point => ((-0.68, 0.52), (-0.7, 0.5)),
        };
        let (index, middle, ring, pinky) = match self {
            Self::Open => {
                (EXTENDED_INDEX_TIP, EXTENDED_MIDDLE_TIP, EXTENDED_RING_TIP, EXTENDED_PINKY_TIP)
            }
            Self::Fist => (CURLED_INDEX_TIP, CURLED_MIDDLE_TIP, CURLED_RING_TIP, CURLED_PINKY_TIP),
            Self::Pinch => (PINCH_POINT, PINCH_POINT, EXTENDED_RING_TIP, EXTENDED_PINKY_TIP),
            Self::Point | Self::Aim => {
                (EXTENDED_INDEX_TIP, CURLED_MIDDLE_TIP, CURLED_RING_TIP, CURLED_PINKY_TIP)
            }
        };

        let mut out = [(0.0, 0.0); LANDMARK_COUNT];
        out[WRIST] = LOCAL_WRIST;
        out[THUMB_CMC] = LOCAL_THUMB_CMC;
        out[THUMB_MCP] = LOCAL_THUMB_MCP;
        out[THUMB_IP] = thumb_ip;
        out[THUMB_TIP] = thumb_tip;
        for (mcp_idx, mcp, tip) in [
            (INDEX_MCP, LOCAL_INDEX_MCP, index),
            (MIDDLE_MCP, LOCAL_MIDDLE_MCP, middle),
            (RING_MCP, LOCAL_RING_MCP, ring),
            (PINKY_MCP, LOCAL_PINKY_MCP, pinky),
        ] {
            out[mcp_idx] = mcp;
            out[mcp_idx + 1] = lerp2(mcp, tip, 0.4);
            out[mcp_idx + 2] = lerp2(mcp, tip, 0.7);
            out[mcp_idx + 3] = tip;
        }
        out
    }
}

fn lerp2(a: (f32, f32), b: (f32, f32), t: f32) -> (f32, f32) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// Exactly two named slots, one per hand.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HandSlots<T> {
    pub left: T,
    pub right: T,
}

impl<T> HandSlots<T> {
    pub fn get(&self, hand: Handedness) -> &T {
        match hand {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, hand: Handedness) -> &mut T {
        match hand {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handedness, &T)> {
        [(Handedness::Left, &self.left), (Handedness::Right, &self.right)].into_iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(Handedness, &T) -> U) -> HandSlots<U> {
        HandSlots {
            left: f(Handedness::Left, &self.left),
            right: f(Handedness::Right, &self.right),
        }
    }
}

/// Maps detector output onto the two slots by handedness label. A front
/// camera shows a mirror image, so its labels are swapped when `mirrored`.
/// A second hand claiming an occupied slot is dropped.
pub fn assign_slots(frames: &[HandFrame], mirrored: bool) -> HandSlots<Option<&HandFrame>> {
    let mut slots: HandSlots<Option<&HandFrame>> = HandSlots::default();
    for frame in frames {
        let hand = if mirrored {
            frame.handedness().opposite()
        } else {
            frame.handedness()
        };
        let slot = slots.get_mut(hand);
        if slot.is_some() {
            log::warn!("dropping extra {} hand in one detection result", hand.as_str());
            continue;
        }
        *slot = Some(frame);
    }
    slots
}

/// Latest-snapshot hand detector. Implementations are fed asynchronously and
/// return whatever is current; callers never wait for a fresh result.
pub trait LandmarkSource {
    fn latest_hands(&mut self) -> Vec<HandFrame>;
}

impl LandmarkSource for Vec<HandFrame> {
    fn latest_hands(&mut self) -> Vec<HandFrame> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posed_hand_places_index_tip_on_anchor() {
        let frame = HandFrame::posed(Handedness::Right, HandPose::Aim, (0.4, 0.6), 0.1);
        assert!(frame.is_complete());
        let tip = frame.get(INDEX_TIP).unwrap();
        assert!((tip.x - 0.4).abs() < 1e-6);
        assert!((tip.y - 0.6).abs() < 1e-6);
        let wrist = frame.get(WRIST).unwrap();
        assert!(wrist.y > tip.y, "image y grows downward, wrist is below the fingertip");
    }

    #[test]
    fn palm_size_matches_requested_scale() {
        let frame = HandFrame::posed(Handedness::Left, HandPose::Open, (0.5, 0.5), 0.2);
        let palm = frame.get(WRIST).unwrap().distance(frame.get(INDEX_MCP).unwrap());
        assert!((palm - 0.2).abs() < 1e-3);
    }

    #[test]
    fn slots_follow_handedness_and_mirroring() {
        let left = HandFrame::posed(Handedness::Left, HandPose::Open, (0.3, 0.5), 0.1);
        let right = HandFrame::posed(Handedness::Right, HandPose::Fist, (0.7, 0.5), 0.1);
        let frames = vec![left.clone(), right.clone()];

        let slots = assign_slots(&frames, false);
        assert_eq!(slots.left, Some(&left));
        assert_eq!(slots.right, Some(&right));

        let mirrored = assign_slots(&frames, true);
        assert_eq!(mirrored.left, Some(&right));
        assert_eq!(mirrored.right, Some(&left));
    }

    #[test]
    fn duplicate_handedness_keeps_first() {
        let a = HandFrame::posed(Handedness::Right, HandPose::Open, (0.3, 0.5), 0.1);
        let b = HandFrame::posed(Handedness::Right, HandPose::Fist, (0.7, 0.5), 0.1);
        let frames = vec![a.clone(), b];
        let slots = assign_slots(&frames, false);
        assert_eq!(slots.right, Some(&a));
        assert!(slots.left.is_none());
    }
}
