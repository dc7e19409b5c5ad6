//! Per-tick resolution of hand gestures into window drags and
//! hold-to-confirm button presses.
//!
//! All mutable interaction state (drag owner, hold owner, cooldowns) lives on
//! one `InteractionController` that the frame loop passes around explicitly.
//! Times are tick timestamps in seconds, so behavior does not depend on the
//! frame rate.

use cgmath::{Point3, Vector2, Vector3};

use crate::camera::Camera;
use crate::gesture::GestureResult;
use crate::landmarks::{HandSlots, Handedness, Landmark};
use crate::matrix_operations::damp_towards;
use crate::windows::{ButtonId, WindowCommand, WindowHit, WindowId, WindowRegistry};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InteractionConfig {
    /// Grab strength needed to pick up a window by its handle.
    pub grab_start: f32,
    /// Grab strength below which a dragged window is let go.
    pub grab_release: f32,
    /// Aim/pinch strength at or above which a hand counts as pressing.
    pub press_threshold: f32,
    /// Seconds a press must be held on one button before it fires.
    pub hold_duration: f64,
    /// Seconds after a drag release during which no new drag starts.
    pub drag_cooldown: f64,
    /// Seconds after a button fires during which no new hold starts.
    pub press_cooldown: f64,
    /// Per second; how quickly a dragged window chases the pointer.
    pub drag_smoothing_rate: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            grab_start: 0.55,
            grab_release: 0.35,
            press_threshold: 0.55,
            hold_duration: 2.0,
            drag_cooldown: 0.5,
            press_cooldown: 0.75,
            drag_smoothing_rate: 14.0,
        }
    }
}

/// One hand's contribution to a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandInput {
    pub gesture: GestureResult,
    /// Index fingertip in normalized device coordinates.
    pub pointer: Vector2<f32>,
}

impl HandInput {
    pub fn new(gesture: GestureResult, mirrored: bool) -> Self {
        Self {
            pointer: pointer_ndc(gesture.index_tip, mirrored),
            gesture,
        }
    }
}

/// Image coordinates ([0,1], y down) to NDC ([-1,1], y up). A mirrored
/// (selfie) feed flips x so the pointer follows the hand on screen.
pub fn pointer_ndc(landmark: Landmark, mirrored: bool) -> Vector2<f32> {
    let x = if mirrored { 1.0 - landmark.x } else { landmark.x };
    Vector2::new(x * 2.0 - 1.0, 1.0 - landmark.y * 2.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        window: WindowId,
        hand: Handedness,
        /// The window's z at pickup; the pointer is projected onto this plane.
        plane_z: f32,
        /// Window center minus the grabbed point.
        offset: Vector3<f32>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hold {
    pub button: ButtonId,
    pub hand: Handedness,
    pub started_at: f64,
}

#[derive(Debug, Default, PartialEq)]
pub struct TickReport {
    pub drag_started: Option<WindowId>,
    pub drag_released: Option<WindowId>,
    pub fired: Vec<ButtonId>,
    pub hovered: Vec<ButtonId>,
    pub opened: Vec<WindowId>,
    pub closed: Vec<WindowId>,
}

pub struct InteractionController {
    pub config: InteractionConfig,
    drag: DragState,
    hold: Option<Hold>,
    drag_cooldown_until: f64,
    press_cooldown_until: f64,
    last_tick: Option<f64>,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            drag: DragState::Idle,
            hold: None,
            drag_cooldown_until: f64::NEG_INFINITY,
            press_cooldown_until: f64::NEG_INFINITY,
            last_tick: None,
        }
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn hold(&self) -> Option<Hold> {
        self.hold
    }

    pub fn update(
        &mut self,
        registry: &mut WindowRegistry,
        camera: &Camera,
        hands: &HandSlots<Option<HandInput>>,
        now: f64,
    ) -> TickReport {
        let dt = self.last_tick.map_or(0.0, |last| (now - last).max(0.0) as f32);
        self.last_tick = Some(now);

        let mut report = TickReport::default();
        registry.update_z_order(camera.position);

        self.update_drag(registry, camera, hands, now, dt, &mut report);
        self.update_hover(registry, camera, hands, &mut report);
        let commands = self.update_hold(registry, camera, hands, now, &mut report);
        self.apply_commands(registry, commands, &mut report);

        report
    }

    fn update_drag(
        &mut self,
        registry: &mut WindowRegistry,
        camera: &Camera,
        hands: &HandSlots<Option<HandInput>>,
        now: f64,
        dt: f32,
        report: &mut TickReport,
    ) {
        match self.drag {
            DragState::Dragging { window, hand, plane_z, offset } => {
                let input = hands.get(hand);
                let grab = input.map_or(0.0, |i| i.gesture.grab_strength);
                let window_alive = registry.get(window).is_some_and(|w| w.visible);
                if grab < self.config.grab_release || !window_alive {
                    self.release_drag(registry, now);
                    report.drag_released = Some(window);
                    return;
                }
                let Some(input) = input else {
                    return;
                };
                let Some(point) = camera.unproject(input.pointer).intersect_z_plane(plane_z) else {
                    return;
                };
                let target = point + offset;
                let rate = self.config.drag_smoothing_rate;
                if let Some(w) = registry.get_mut(window) {
                    let next = damp_towards(w.position, target, rate, dt);
                    w.position = Point3::new(next.x, next.y, plane_z);
                }
            }
            DragState::Idle => {
                if now < self.drag_cooldown_until {
                    return;
                }
                for (hand, input) in hands.iter() {
                    let Some(input) = input else {
                        continue;
                    };
                    if input.gesture.grab_strength <= self.config.grab_start {
                        continue;
                    }
                    let hit = registry.hit_test(camera, input.pointer);
                    let Some((id, WindowHit::Handle, point)) = hit else {
                        continue;
                    };
                    let Some(window) = registry.get(id) else {
                        continue;
                    };
                    self.drag = DragState::Dragging {
                        window: id,
                        hand,
                        plane_z: window.position.z,
                        offset: window.position - point,
                    };
                    registry.set_dragging(Some(id));
                    log::debug!("{} hand picked up {id}", hand.as_str());
                    report.drag_started = Some(id);
                    return;
                }
            }
        }
    }

    fn release_drag(&mut self, registry: &mut WindowRegistry, now: f64) {
        if let DragState::Dragging { window, hand, .. } = self.drag {
            log::debug!("{} hand released {window}", hand.as_str());
        }
        self.drag = DragState::Idle;
        registry.set_dragging(None);
        self.drag_cooldown_until = now + self.config.drag_cooldown;
    }

    fn dragging_hand(&self) -> Option<Handedness> {
        match self.drag {
            DragState::Dragging { hand, .. } => Some(hand),
            DragState::Idle => None,
        }
    }

    fn update_hover(
        &mut self,
        registry: &mut WindowRegistry,
        camera: &Camera,
        hands: &HandSlots<Option<HandInput>>,
        report: &mut TickReport,
    ) {
        let mut hovered = Vec::new();
        for (_, input) in hands.iter() {
            let Some(input) = input else {
                continue;
            };
            let hit = registry.hit_test(camera, input.pointer);
            if let Some((window, WindowHit::Button(index), _)) = hit {
                let id = ButtonId { window, index };
                if !hovered.contains(&id) {
                    hovered.push(id);
                }
            }
        }
        registry.set_hovered(&hovered);
        report.hovered = hovered;
    }

    /// Finds the button being pressed this tick. The current hold keeps
    /// priority while its hand still presses the same button; otherwise the
    /// strongest pressing hand wins.
    fn press_candidate(
        &self,
        registry: &WindowRegistry,
        camera: &Camera,
        hands: &HandSlots<Option<HandInput>>,
    ) -> Option<(ButtonId, Handedness)> {
        let dragging_hand = self.dragging_hand();
        let mut best: Option<(ButtonId, Handedness, f32)> = None;
        for (hand, input) in hands.iter() {
            let Some(input) = input else {
                continue;
            };
            if Some(hand) == dragging_hand {
                continue;
            }
            let strength = input.gesture.press_strength();
            if strength < self.config.press_threshold {
                continue;
            }
            let hit = registry.hit_test(camera, input.pointer);
            let Some((window, WindowHit::Button(index), _)) = hit else {
                continue;
            };
            let id = ButtonId { window, index };
            if let Some(hold) = self.hold {
                if hold.button == id && hold.hand == hand {
                    return Some((id, hand));
                }
            }
            if best.map_or(true, |(_, _, s)| strength > s) {
                best = Some((id, hand, strength));
            }
        }
        best.map(|(id, hand, _)| (id, hand))
    }

    fn update_hold(
        &mut self,
        registry: &mut WindowRegistry,
        camera: &Camera,
        hands: &HandSlots<Option<HandInput>>,
        now: f64,
        report: &mut TickReport,
    ) -> Vec<WindowCommand> {
        if now < self.press_cooldown_until {
            self.reset_hold(registry);
            return Vec::new();
        }

        let candidate = self.press_candidate(registry, camera, hands);
        match (self.hold, candidate) {
            (Some(hold), Some((button, hand))) if hold.button == button && hold.hand == hand => {
                let elapsed = (now - hold.started_at).max(0.0);
                let progress = (elapsed / self.config.hold_duration).min(1.0) as f32;
                registry.set_hold_progress(button, progress);
                if progress < 1.0 {
                    return Vec::new();
                }
                self.hold = None;
                registry.clear_hold_progress();
                self.press_cooldown_until = now + self.config.press_cooldown;
                log::debug!("{} hand fired {:?} on {}", hand.as_str(), button.index, button.window);
                report.fired.push(button);
                registry.invoke(button).unwrap_or_default()
            }
            (_, Some((button, hand))) => {
                self.hold = Some(Hold {
                    button,
                    hand,
                    started_at: now,
                });
                registry.set_hold_progress(button, 0.0);
                Vec::new()
            }
            (_, None) => {
                self.reset_hold(registry);
                Vec::new()
            }
        }
    }

    fn reset_hold(&mut self, registry: &mut WindowRegistry) {
        if self.hold.take().is_some() {
            registry.clear_hold_progress();
        }
    }

    fn apply_commands(
        &mut self,
        registry: &mut WindowRegistry,
        commands: Vec<WindowCommand>,
        report: &mut TickReport,
    ) {
        for command in commands {
            match command {
                WindowCommand::Close(id) => {
                    if self.close_window(registry, id) {
                        report.closed.push(id);
                    }
                }
                WindowCommand::HideAll => {
                    self.cancel_all(registry);
                    registry.set_all_visible(false);
                }
                WindowCommand::ShowAll => registry.set_all_visible(true),
                WindowCommand::Open(spec) => report.opened.push(registry.open(spec)),
            }
        }
    }

    /// Closes a window, first dropping any drag or hold that refers to it.
    pub fn close_window(&mut self, registry: &mut WindowRegistry, id: WindowId) -> bool {
        self.forget_window(registry, id);
        registry.close(id)
    }

    pub fn forget_window(&mut self, registry: &mut WindowRegistry, id: WindowId) {
        if matches!(self.drag, DragState::Dragging { window, .. } if window == id) {
            self.drag = DragState::Idle;
            registry.set_dragging(None);
        }
        if self.hold.is_some_and(|h| h.button.window == id) {
            self.hold = None;
            registry.clear_hold_progress();
        }
    }

    /// Drops all drag and hold state without arming cooldowns. Used when the
    /// camera model changes under the user (stereo toggle) or windows hide.
    pub fn cancel_all(&mut self, registry: &mut WindowRegistry) {
        self.drag = DragState::Idle;
        self.hold = None;
        registry.set_dragging(None);
        registry.clear_hold_progress();
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(InteractionConfig::default())
    }
}
