//! Floating panels in world space and the registry that owns their
//! hit-testing geometry.
//!
//! Panels are axis-aligned rectangles facing +Z. A window's `position` is
//! its center; button hit-boxes and the drag handle are given in the
//! window's local space (origin at the center, +Y up, world units).

use std::fmt;

use cgmath::{Point3, Vector2};

use crate::camera::Camera;
use crate::matrix_operations::Rect;

pub const DEFAULT_HANDLE_HEIGHT: f32 = 0.06;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ButtonId {
    pub window: WindowId,
    pub index: usize,
}

pub type ButtonAction = Box<dyn FnMut(&mut ActionContext)>;

/// Deferred registry edits requested by button actions. They are applied by
/// the interaction controller once dispatch is over, so an action can close
/// its own window without holding a borrow on it.
pub enum WindowCommand {
    Close(WindowId),
    HideAll,
    ShowAll,
    Open(WindowSpec),
}

pub struct ActionContext {
    window: WindowId,
    commands: Vec<WindowCommand>,
}

impl ActionContext {
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            commands: Vec::new(),
        }
    }

    /// The window owning the button being fired.
    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn close_self(&mut self) {
        self.commands.push(WindowCommand::Close(self.window));
    }

    pub fn close(&mut self, id: WindowId) {
        self.commands.push(WindowCommand::Close(id));
    }

    pub fn hide_all(&mut self) {
        self.commands.push(WindowCommand::HideAll);
    }

    pub fn show_all(&mut self) {
        self.commands.push(WindowCommand::ShowAll);
    }

    pub fn open(&mut self, spec: WindowSpec) {
        self.commands.push(WindowCommand::Open(spec));
    }

    pub fn into_commands(self) -> Vec<WindowCommand> {
        self.commands
    }
}

pub struct ButtonSpec {
    pub label: String,
    pub hit_box: Rect,
    pub action: ButtonAction,
}

/// What callers hand to the registry to create a window.
pub struct WindowSpec {
    pub title: String,
    pub width: f32,
    pub height: f32,
    pub position: Point3<f32>,
    pub handle_height: f32,
    pub buttons: Vec<ButtonSpec>,
}

impl WindowSpec {
    pub fn new(title: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            position: Point3::new(0.0, 0.0, -1.5),
            handle_height: DEFAULT_HANDLE_HEIGHT.min(height),
            buttons: Vec::new(),
        }
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Point3::new(x, y, z);
        self
    }

    pub fn button(
        mut self,
        label: impl Into<String>,
        hit_box: Rect,
        action: impl FnMut(&mut ActionContext) + 'static,
    ) -> Self {
        self.buttons.push(ButtonSpec {
            label: label.into(),
            hit_box,
            action: Box::new(action),
        });
        self
    }

    /// A small close button in the top-right corner, just under the handle.
    pub fn with_close_button(self) -> Self {
        let size = (self.width.min(self.height) * 0.18).max(0.02);
        let x = self.width * 0.5 - size * 0.5 - 0.01;
        let y = self.height * 0.5 - self.handle_height - size * 0.5 - 0.01;
        self.button("Close", Rect::new(x, y, size, size), |ctx| ctx.close_self())
    }
}

pub struct Button {
    pub label: String,
    pub hit_box: Rect,
    hold_progress: f32,
    hovered: bool,
    action: ButtonAction,
}

impl Button {
    pub fn hold_progress(&self) -> f32 {
        self.hold_progress
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }
}

impl fmt::Debug for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Button")
            .field("label", &self.label)
            .field("hit_box", &self.hit_box)
            .field("hold_progress", &self.hold_progress)
            .field("hovered", &self.hovered)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Window {
    id: WindowId,
    pub title: String,
    pub position: Point3<f32>,
    pub width: f32,
    pub height: f32,
    pub handle_height: f32,
    pub visible: bool,
    buttons: Vec<Button>,
    dragging: bool,
    /// 0 for the window nearest to the camera at the last z-order update.
    depth_rank: usize,
}

/// Where a window plane was hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowHit {
    Handle,
    Button(usize),
    Body,
}

impl Window {
    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn depth_rank(&self) -> usize {
        self.depth_rank
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn handle_rect(&self) -> Rect {
        Rect::new(0.0, self.height * 0.5 - self.handle_height * 0.5, self.width, self.handle_height)
    }

    pub fn to_local(&self, world: Point3<f32>) -> Vector2<f32> {
        Vector2::new(world.x - self.position.x, world.y - self.position.y)
    }

    /// Projects an NDC pointer through `camera` onto this window's z-plane.
    pub fn project_pointer(&self, camera: &Camera, ndc: Vector2<f32>) -> Option<Point3<f32>> {
        camera.unproject(ndc).intersect_z_plane(self.position.z)
    }

    /// Classifies a local-space point. Buttons take precedence over the
    /// handle; later buttons are drawn on top and win overlaps.
    pub fn hit_local(&self, local: Vector2<f32>) -> Option<WindowHit> {
        if !self.bounds().contains(local) {
            return None;
        }
        if let Some(index) = self.buttons.iter().rposition(|b| b.hit_box.contains(local)) {
            return Some(WindowHit::Button(index));
        }
        if self.handle_rect().contains(local) {
            return Some(WindowHit::Handle);
        }
        Some(WindowHit::Body)
    }
}

#[derive(Default)]
pub struct WindowRegistry {
    windows: Vec<Window>,
    next_id: u32,
    /// Indices into `windows`, nearest first.
    front_to_back: Vec<usize>,
    last_eye: Option<Point3<f32>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, spec: WindowSpec) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        let buttons = spec
            .buttons
            .into_iter()
            .map(|b| Button {
                label: b.label,
                hit_box: b.hit_box,
                hold_progress: 0.0,
                hovered: false,
                action: b.action,
            })
            .collect();
        log::debug!("opening {id} \"{}\"", spec.title);
        self.windows.push(Window {
            id,
            title: spec.title,
            position: spec.position,
            width: spec.width,
            height: spec.height,
            handle_height: spec.handle_height,
            visible: true,
            buttons,
            dragging: false,
            depth_rank: 0,
        });
        self.refresh_order();
        id
    }

    /// Removes the window. Callers that track drag/hold state must forget
    /// it first; the interaction controller does this in `close_window`.
    pub fn close(&mut self, id: WindowId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let window = self.windows.remove(index);
        log::debug!("closed {} \"{}\"", window.id, window.title);
        self.refresh_order();
        true
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    pub fn button(&self, id: ButtonId) -> Option<&Button> {
        self.get(id.window)?.buttons.get(id.index)
    }

    /// Registry (creation) order.
    pub fn iter(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }

    /// Visible windows, nearest first; ties go to the later-registered one.
    pub fn front_to_back(&self) -> impl Iterator<Item = &Window> {
        self.front_to_back
            .iter()
            .map(|&i| &self.windows[i])
            .filter(|w| w.visible)
    }

    /// Visible windows, farthest first, for painter's-order rendering.
    pub fn back_to_front(&self) -> impl Iterator<Item = &Window> {
        self.front_to_back
            .iter()
            .rev()
            .map(|&i| &self.windows[i])
            .filter(|w| w.visible)
    }

    /// Re-ranks windows by distance to the eye. Called once per tick.
    pub fn update_z_order(&mut self, eye: Point3<f32>) {
        self.last_eye = Some(eye);
        self.refresh_order();
    }

    fn refresh_order(&mut self) {
        let eye = self.last_eye;
        let distance = |w: &Window| match eye {
            Some(eye) => {
                let d = w.position - eye;
                (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
            }
            None => 0.0,
        };
        let mut order: Vec<usize> = (0..self.windows.len()).collect();
        order.sort_by(|&a, &b| {
            distance(&self.windows[a])
                .total_cmp(&distance(&self.windows[b]))
                .then(b.cmp(&a))
        });
        for (rank, &index) in order.iter().enumerate() {
            self.windows[index].depth_rank = rank;
        }
        self.front_to_back = order;
    }

    fn index_of(&self, id: WindowId) -> Option<usize> {
        self.windows.iter().position(|w| w.id == id)
    }

    /// First visible window, front to back, whose rectangle contains the
    /// pointer projected onto that window's own plane. Nearer windows occlude
    /// farther ones: a hit on a window's body stops the search.
    pub fn hit_test(
        &self,
        camera: &Camera,
        ndc: Vector2<f32>,
    ) -> Option<(WindowId, WindowHit, Point3<f32>)> {
        for window in self.front_to_back() {
            let Some(point) = window.project_pointer(camera, ndc) else {
                continue;
            };
            if let Some(hit) = window.hit_local(window.to_local(point)) {
                return Some((window.id, hit, point));
            }
        }
        None
    }

    pub fn dragging(&self) -> Option<WindowId> {
        self.windows.iter().find(|w| w.dragging).map(|w| w.id)
    }

    /// Marks exactly one window (or none) as being dragged.
    pub fn set_dragging(&mut self, id: Option<WindowId>) {
        for window in &mut self.windows {
            window.dragging = Some(window.id) == id;
        }
    }

    pub fn hold_progress(&self, id: ButtonId) -> f32 {
        self.button(id).map_or(0.0, |b| b.hold_progress)
    }

    /// Sets one button's progress and zeroes every other button.
    pub fn set_hold_progress(&mut self, id: ButtonId, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        for window in &mut self.windows {
            for (index, button) in window.buttons.iter_mut().enumerate() {
                let this = ButtonId { window: window.id, index };
                button.hold_progress = if this == id { progress } else { 0.0 };
            }
        }
    }

    pub fn clear_hold_progress(&mut self) {
        for button in self.windows.iter_mut().flat_map(|w| w.buttons.iter_mut()) {
            button.hold_progress = 0.0;
        }
    }

    pub fn set_hovered(&mut self, hovered: &[ButtonId]) {
        for window in &mut self.windows {
            let window_id = window.id;
            for (index, button) in window.buttons.iter_mut().enumerate() {
                button.hovered = hovered.contains(&ButtonId { window: window_id, index });
            }
        }
    }

    /// Runs a button's action. Returns `None` if the button no longer exists.
    pub fn invoke(&mut self, id: ButtonId) -> Option<Vec<WindowCommand>> {
        let button = self.get_mut(id.window)?.buttons.get_mut(id.index)?;
        let mut ctx = ActionContext::new(id.window);
        (button.action)(&mut ctx);
        Some(ctx.into_commands())
    }

    pub fn set_all_visible(&mut self, visible: bool) {
        for window in &mut self.windows {
            window.visible = visible;
        }
    }

    pub fn visible_count(&self) -> usize {
        self.windows.iter().filter(|w| w.visible).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn panel(z: f32) -> WindowSpec {
        WindowSpec::new("panel", 1.0, 0.8)
            .at(0.0, 0.0, z)
            .button("ok", Rect::new(0.0, 0.0, 0.3, 0.2), |_| {})
    }

    #[test]
    fn local_hit_classification() {
        let mut registry = WindowRegistry::new();
        let id = registry.open(panel(-2.0));
        let window = registry.get(id).unwrap();
        assert_eq!(window.hit_local(Vector2::new(0.0, 0.0)), Some(WindowHit::Button(0)));
        assert_eq!(window.hit_local(Vector2::new(0.0, 0.38)), Some(WindowHit::Handle));
        assert_eq!(window.hit_local(Vector2::new(-0.4, -0.3)), Some(WindowHit::Body));
        assert_eq!(window.hit_local(Vector2::new(0.6, 0.0)), None);
    }

    #[test]
    fn nearer_window_takes_priority() {
        let mut registry = WindowRegistry::new();
        let far = registry.open(panel(-3.0));
        let near = registry.open(panel(-2.0));
        registry.update_z_order(Point3::new(0.0, 0.0, 0.0));
        let ranks: Vec<_> = registry.front_to_back().map(|w| w.id()).collect();
        assert_eq!(ranks, vec![near, far]);
        assert_eq!(registry.get(near).unwrap().depth_rank(), 0);

        let camera = Camera::new(1.0);
        let (hit_id, hit, _) = registry.hit_test(&camera, Vector2::new(0.0, 0.0)).unwrap();
        assert_eq!(hit_id, near);
        assert_eq!(hit, WindowHit::Button(0));
    }

    #[test]
    fn equal_depth_goes_to_topmost() {
        let mut registry = WindowRegistry::new();
        let _first = registry.open(panel(-2.0));
        let second = registry.open(panel(-2.0));
        registry.update_z_order(Point3::new(0.0, 0.0, 0.0));
        let (hit_id, _, _) = registry.hit_test(&Camera::new(1.0), Vector2::new(0.0, 0.0)).unwrap();
        assert_eq!(hit_id, second);
    }

    #[test]
    fn hidden_windows_are_not_hit() {
        let mut registry = WindowRegistry::new();
        registry.open(panel(-2.0));
        registry.set_all_visible(false);
        assert!(registry.hit_test(&Camera::new(1.0), Vector2::new(0.0, 0.0)).is_none());
        assert_eq!(registry.visible_count(), 0);
    }

    #[test]
    fn single_dragging_window() {
        let mut registry = WindowRegistry::new();
        let a = registry.open(panel(-2.0));
        let b = registry.open(panel(-3.0));
        registry.set_dragging(Some(a));
        registry.set_dragging(Some(b));
        assert_eq!(registry.iter().filter(|w| w.is_dragging()).count(), 1);
        assert_eq!(registry.dragging(), Some(b));
        registry.set_dragging(None);
        assert_eq!(registry.dragging(), None);
    }

    #[test]
    fn single_button_holds_progress() {
        let mut registry = WindowRegistry::new();
        let a = registry.open(panel(-2.0));
        let b = registry.open(panel(-3.0));
        let first = ButtonId { window: a, index: 0 };
        let second = ButtonId { window: b, index: 0 };
        registry.set_hold_progress(first, 0.4);
        registry.set_hold_progress(second, 0.1);
        assert_eq!(registry.hold_progress(first), 0.0);
        assert_eq!(registry.hold_progress(second), 0.1);
    }

    #[test]
    fn invoke_collects_commands() {
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let mut registry = WindowRegistry::new();
        let id = registry.open(
            WindowSpec::new("tool", 0.5, 0.5)
                .button("go", Rect::new(0.0, 0.0, 0.1, 0.1), move |ctx| {
                    counter.set(counter.get() + 1);
                    ctx.hide_all();
                })
                .with_close_button(),
        );
        let commands = registry.invoke(ButtonId { window: id, index: 0 }).unwrap();
        assert_eq!(fired.get(), 1);
        assert!(matches!(commands.as_slice(), [WindowCommand::HideAll]));

        let commands = registry.invoke(ButtonId { window: id, index: 1 }).unwrap();
        assert!(matches!(commands.as_slice(), [WindowCommand::Close(w)] if *w == id));
        assert!(registry.invoke(ButtonId { window: id, index: 7 }).is_none());
    }

    #[test]
    fn ray_parallel_to_window_is_a_miss() {
        let mut registry = WindowRegistry::new();
        registry.open(panel(0.0));
        // The window plane passes through the camera: every ray starts on it
        // or runs away from it, nothing is in front.
        let mut camera = Camera::new(1.0);
        camera.orientation =
            crate::orientation::DeviceOrientation::new(90.0, 0.0, 0.0).to_quaternion();
        assert!(registry.hit_test(&camera, Vector2::new(0.0, 0.0)).is_none());
    }
}
