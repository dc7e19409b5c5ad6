//! The frame-synchronous tick: orientation, gesture classification,
//! interaction, then the state the renderer draws from.

use web_time::{Duration, Instant};

use crate::calibration::{CalibrationEditor, KeyValueStore, Preset};
use crate::camera::Camera;
use crate::gesture::classify;
use crate::interaction::{HandInput, InteractionConfig, InteractionController, TickReport};
use crate::landmarks::{assign_slots, HandSlots, LandmarkSource};
use crate::matrix_operations::Rect;
use crate::orientation::{OrientationFilter, OrientationSource};
use crate::scene_pass::Cursor;
use crate::smoothing::PointerSmoother;
use crate::stereo::StereoRig;
use crate::windows::{WindowRegistry, WindowSpec};

/// Where a cursor floats when its ray hits no window.
const CURSOR_IDLE_DISTANCE: f32 = 1.5;

const CURSOR_IDLE_COLOR: [f32; 4] = [0.9, 0.9, 0.9, 0.9];
const CURSOR_PRESS_COLOR: [f32; 4] = [1.0, 0.45, 0.05, 1.0];
const CURSOR_GRAB_COLOR: [f32; 4] = [0.1, 0.45, 1.0, 1.0];

pub type BoxedStore = Box<dyn KeyValueStore>;

pub struct SpatialApp {
    pub registry: WindowRegistry,
    pub controller: InteractionController,
    pub calibration: CalibrationEditor<BoxedStore>,
    pub head: Camera,
    orientation: OrientationFilter,
    pointers: PointerSmoother,
    rig: StereoRig,
    stereo: bool,
    mirrored: bool,
    hands: HandSlots<Option<HandInput>>,
    /// Tick timestamps are seconds since this instant.
    epoch: Instant,
}

impl SpatialApp {
    pub fn new(store: BoxedStore, output_width: u32, output_height: u32, mirrored: bool) -> Self {
        let calibration = CalibrationEditor::load(store);
        let rig = StereoRig::new(output_width, output_height);
        let (w, h) = rig.output_size();
        Self {
            registry: WindowRegistry::new(),
            controller: InteractionController::new(InteractionConfig::default()),
            calibration,
            head: Camera::new(w as f32 / h as f32),
            orientation: OrientationFilter::default(),
            pointers: PointerSmoother::default(),
            rig,
            stereo: false,
            mirrored,
            hands: HandSlots::default(),
            epoch: Instant::now(),
        }
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    pub fn rig(&self) -> &StereoRig {
        &self.rig
    }

    pub fn hands(&self) -> &HandSlots<Option<HandInput>> {
        &self.hands
    }

    /// Switching the camera model moves every pointer ray, so any drag or
    /// hold in progress is dropped.
    pub fn set_stereo(&mut self, enabled: bool) {
        if enabled == self.stereo {
            return;
        }
        self.stereo = enabled;
        self.controller.cancel_all(&mut self.registry);
        log::info!("stereo {}", if enabled { "on" } else { "off" });
    }

    pub fn toggle_stereo(&mut self) {
        self.set_stereo(!self.stereo);
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.calibration.apply_preset(preset);
    }

    /// Returns the new eye target size when the eye targets must be rebuilt.
    pub fn resize(&mut self, output_width: u32, output_height: u32) -> Option<(u32, u32)> {
        let resized = self.rig.resize(output_width, output_height);
        let (w, h) = self.rig.output_size();
        self.head.set_aspect(w as f32 / h as f32);
        resized
    }

    /// The camera pointer rays are cast through.
    pub fn interaction_camera(&self) -> Camera {
        if self.stereo {
            self.rig.headset_camera(&self.head, self.calibration.profile())
        } else {
            self.head
        }
    }

    /// Mono: the head camera. Stereo: left then right eye.
    pub fn view_cameras(&self) -> Vec<Camera> {
        if self.stereo {
            self.rig.eye_cameras(&self.head, self.calibration.profile()).to_vec()
        } else {
            vec![self.head]
        }
    }

    pub fn seconds_since_start(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn tick(
        &mut self,
        landmarks: &mut dyn LandmarkSource,
        orientation: &mut dyn OrientationSource,
        now: f64,
    ) -> TickReport {
        self.head.orientation = self.orientation.update(orientation.latest_orientation(), now);

        let frames = landmarks.latest_hands();
        let slots = assign_slots(&frames, self.mirrored);
        let mirrored = self.mirrored;
        let raw: HandSlots<Option<HandInput>> =
            slots.map(|_, frame| frame.map(|frame| HandInput::new(classify(frame), mirrored)));
        let pointers = self.pointers.smooth(raw.map(|_, hand| hand.map(|h| h.pointer)), now);
        self.hands = raw.map(|hand, input| {
            let pointer = (*pointers.get(hand))?;
            input.map(|input| HandInput { pointer, ..input })
        });

        let camera = self.interaction_camera();
        let report = self.controller.update(&mut self.registry, &camera, &self.hands, now);

        let wall = self.epoch + Duration::from_secs_f64(now.max(0.0));
        self.calibration.persist_if_needed(wall, false);
        report
    }

    pub fn cursors(&self) -> Vec<Cursor> {
        let camera = self.interaction_camera();
        let config = &self.controller.config;
        self.hands
            .iter()
            .filter_map(|(_, input)| input.as_ref())
            .map(|input| {
                let position = match self.registry.hit_test(&camera, input.pointer) {
                    Some((_, _, point)) => point,
                    None => camera.unproject(input.pointer).at(CURSOR_IDLE_DISTANCE),
                };
                let color = if input.gesture.press_strength() >= config.press_threshold {
                    CURSOR_PRESS_COLOR
                } else if input.gesture.grab_strength > config.grab_start {
                    CURSOR_GRAB_COLOR
                } else {
                    CURSOR_IDLE_COLOR
                };
                Cursor { position, color }
            })
            .collect()
    }

    /// Flushes unsaved calibration edits.
    pub fn shutdown(&mut self) {
        self.calibration.persist_if_needed(Instant::now(), true);
    }
}

/// The camera tool window: a panel with its own close button.
pub fn camera_tool_window() -> WindowSpec {
    WindowSpec::new("Camera", 0.5, 0.4).at(0.6, 0.05, -1.3).with_close_button()
}

/// Startup content for the demo binary.
pub fn populate_demo_windows(registry: &mut WindowRegistry) {
    registry.open(
        WindowSpec::new("Launcher", 0.8, 0.5)
            .at(0.0, 0.0, -1.5)
            .button("Open camera", Rect::new(-0.2, -0.05, 0.3, 0.14), |ctx| {
                ctx.open(camera_tool_window())
            })
            .button("Hide all", Rect::new(0.2, -0.05, 0.3, 0.14), |ctx| ctx.hide_all()),
    );
    registry.open(
        WindowSpec::new("Notes", 0.45, 0.35)
            .at(-0.7, 0.1, -1.8)
            .with_close_button(),
    );
}
