//! Stand-ins for the camera hand tracker and the phone's orientation sensor
//! so the demo runs on a desktop: the mouse drives one synthetic hand and
//! the arrow keys turn the head.

use winit::event::{ElementState, MouseButton};
use winit::keyboard::{Key, NamedKey};

use crate::landmarks::{HandFrame, HandPose, Handedness, LandmarkSource};
use crate::orientation::{DeviceOrientation, OrientationSource};

/// Synthetic palm size in image units.
const MOUSE_HAND_PALM: f32 = 0.08;
const TURN_RATE_DEG_PER_SEC: f32 = 90.0;
const MAX_PITCH_DEG: f32 = 85.0;

/// Left button aims (press), right button makes a fist (grab); otherwise the
/// hand is open. The index fingertip sits under the mouse cursor.
pub struct MouseHand {
    cursor: Option<(f64, f64)>,
    size: (u32, u32),
    aiming: bool,
    grabbing: bool,
    mirrored: bool,
}

impl MouseHand {
    pub fn new(width: u32, height: u32, mirrored: bool) -> Self {
        Self {
            cursor: None,
            size: (width.max(1), height.max(1)),
            aiming: false,
            grabbing: false,
            mirrored,
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width.max(1), height.max(1));
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        self.cursor = Some((x, y));
    }

    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    pub fn mouse_input(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.aiming = pressed,
            MouseButton::Right => self.grabbing = pressed,
            _ => {}
        }
    }

    pub fn pose(&self) -> HandPose {
        if self.grabbing {
            HandPose::Fist
        } else if self.aiming {
            HandPose::Aim
        } else {
            HandPose::Open
        }
    }

    /// The cursor in camera-image coordinates. A mirrored feed is flipped so
    /// the pointer lands back under the mouse.
    fn image_point(&self) -> Option<(f32, f32)> {
        let (x, y) = self.cursor?;
        let u = (x / self.size.0 as f64) as f32;
        let v = (y / self.size.1 as f64) as f32;
        Some((if self.mirrored { 1.0 - u } else { u }, v))
    }
}

impl LandmarkSource for MouseHand {
    fn latest_hands(&mut self) -> Vec<HandFrame> {
        let Some(point) = self.image_point() else {
            return Vec::new();
        };
        // Labels are swapped for a mirrored feed; pick the label that lands
        // in the right-hand slot either way.
        let label = if self.mirrored {
            Handedness::Left
        } else {
            Handedness::Right
        };
        vec![HandFrame::posed(label, self.pose(), point, MOUSE_HAND_PALM)]
    }
}

#[derive(Default)]
pub struct KeyboardOrientation {
    orientation: DeviceOrientation,
    yaw_input: f32,
    pitch_input: f32,
}

impl KeyboardOrientation {
    /// Returns true when the key was an orientation key.
    pub fn handle_key(&mut self, key: &Key, state: ElementState) -> bool {
        let amount = if state == ElementState::Pressed { 1.0 } else { 0.0 };
        match key {
            Key::Named(NamedKey::ArrowLeft) => self.yaw_input = amount,
            Key::Named(NamedKey::ArrowRight) => self.yaw_input = -amount,
            Key::Named(NamedKey::ArrowUp) => self.pitch_input = amount,
            Key::Named(NamedKey::ArrowDown) => self.pitch_input = -amount,
            _ => return false,
        }
        true
    }

    pub fn advance(&mut self, dt: f32) {
        let step = TURN_RATE_DEG_PER_SEC * dt.max(0.0);
        self.orientation.yaw = (self.orientation.yaw + self.yaw_input * step) % 360.0;
        self.orientation.pitch = (self.orientation.pitch + self.pitch_input * step)
            .clamp(-MAX_PITCH_DEG, MAX_PITCH_DEG);
    }

    pub fn recenter(&mut self) {
        self.orientation = DeviceOrientation::default();
    }
}

impl OrientationSource for KeyboardOrientation {
    fn latest_orientation(&mut self) -> Option<DeviceOrientation> {
        Some(self.orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{classify, GestureKind};
    use crate::interaction::pointer_ndc;
    use crate::landmarks::{assign_slots, INDEX_TIP};

    #[test]
    fn no_cursor_no_hand() {
        let mut hand = MouseHand::new(800, 600, false);
        assert!(hand.latest_hands().is_empty());
        hand.cursor_moved(10.0, 10.0);
        hand.cursor_left();
        assert!(hand.latest_hands().is_empty());
    }

    #[test]
    fn buttons_select_gesture() {
        let mut hand = MouseHand::new(800, 600, false);
        hand.cursor_moved(400.0, 300.0);
        assert_eq!(classify(&hand.latest_hands()[0]).kind, GestureKind::Open);

        hand.mouse_input(MouseButton::Left, ElementState::Pressed);
        assert!(classify(&hand.latest_hands()[0]).is_aiming);

        hand.mouse_input(MouseButton::Right, ElementState::Pressed);
        assert_eq!(classify(&hand.latest_hands()[0]).kind, GestureKind::Grab);

        hand.mouse_input(MouseButton::Right, ElementState::Released);
        hand.mouse_input(MouseButton::Left, ElementState::Released);
        assert_eq!(hand.pose(), HandPose::Open);
    }

    #[test]
    fn mirrored_hand_still_lands_under_cursor_in_right_slot() {
        for mirrored in [false, true] {
            let mut hand = MouseHand::new(800, 600, mirrored);
            hand.cursor_moved(200.0, 150.0);
            let frames = hand.latest_hands();
            let slots = assign_slots(&frames, mirrored);
            let frame = slots.right.expect("right slot");
            let ndc = pointer_ndc(frame.get(INDEX_TIP).unwrap(), mirrored);
            assert!((ndc.x + 0.5).abs() < 1e-5, "{mirrored}: {ndc:?}");
            assert!((ndc.y - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn arrow_keys_turn_and_pitch_is_clamped() {
        let mut keys = KeyboardOrientation::default();
        assert!(keys.handle_key(&Key::Named(NamedKey::ArrowLeft), ElementState::Pressed));
        keys.advance(0.5);
        assert!((keys.latest_orientation().unwrap().yaw - 45.0).abs() < 1e-4);
        keys.handle_key(&Key::Named(NamedKey::ArrowLeft), ElementState::Released);

        keys.handle_key(&Key::Named(NamedKey::ArrowUp), ElementState::Pressed);
        keys.advance(10.0);
        assert_eq!(keys.latest_orientation().unwrap().pitch, MAX_PITCH_DEG);

        keys.recenter();
        assert_eq!(keys.latest_orientation(), Some(DeviceOrientation::default()));
        assert!(!keys.handle_key(&Key::Named(NamedKey::Space), ElementState::Pressed));
    }
}
