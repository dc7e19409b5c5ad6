pub mod app;
pub mod calibration;
pub mod camera;
pub mod desktop_input;
pub mod gesture;
pub mod interaction;
pub mod landmarks;
pub mod matrix_operations;
pub mod orientation;
pub mod scene_pass;
pub mod smoothing;
pub mod stereo;
pub mod stereo_pass;
pub mod windows;

use std::path::PathBuf;

#[cfg(target_arch="wasm32")]
use wasm_bindgen::prelude::*;

use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
};
use winit::window::WindowBuilder;

use crate::app::{populate_demo_windows, BoxedStore, SpatialApp};
use crate::calibration::{CalibrationField, Preset};
use crate::desktop_input::{KeyboardOrientation, MouseHand};
use crate::scene_pass::{build_scene_vertices, SceneBindings, ScenePass, SceneTarget};
use crate::stereo_pass::{EyeTargets, StereoBindings, StereoPass};

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.005,
    g: 0.008,
    b: 0.02,
    a: 1.0,
};

/// Start-up choices for the demo.
#[derive(Clone, Debug)]
pub struct Options {
    pub stereo: bool,
    pub preset: Option<Preset>,
    /// Ignored on the web, where calibration lives in local storage.
    pub config_dir: Option<PathBuf>,
    /// The hand feed is a selfie (front camera) image.
    pub mirrored: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            stereo: false,
            preset: None,
            config_dir: None,
            mirrored: true,
        }
    }
}

fn open_store(options: &Options) -> BoxedStore {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            let _ = options;
            match calibration::LocalStorageStore::open() {
                Ok(store) => Box::new(store),
                Err(error) => {
                    log::warn!("{error}; calibration will not persist");
                    Box::new(calibration::MemoryStore::default())
                }
            }
        } else {
            let store = match &options.config_dir {
                Some(dir) => calibration::FileStore::new(dir),
                None => calibration::FileStore::default_location(),
            };
            let path = store.path_for(calibration::CALIBRATION_KEY);
            log::info!("calibration file: {}", path.display());
            Box::new(store)
        }
    }
}

/// Calibration slider currently bound to the +/- keys.
struct FieldCursor(usize);

impl FieldCursor {
    fn field(&self) -> CalibrationField {
        CalibrationField::ALL[self.0 % CalibrationField::ALL.len()]
    }

    fn advance(&mut self) -> CalibrationField {
        self.0 = (self.0 + 1) % CalibrationField::ALL.len();
        self.field()
    }
}

async fn arun(options: Options) {

    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Info).expect("Couldn't initialize logger");
        } else {
            env_logger::init();
        }
    }

    let event_loop = EventLoop::new().unwrap();
    let window = WindowBuilder::new()
        .with_title("handspace")
        .build(&event_loop)
        .unwrap();

    #[cfg(target_arch = "wasm32")]
    {
        // Winit prevents sizing with CSS, so we have to set
        // the size manually when on web.
        use winit::dpi::PhysicalSize;
        let _ = window.request_inner_size(PhysicalSize::new(900, 450));

        use winit::platform::web::WindowExtWebSys;
        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let dst = doc.get_element_by_id("wasm-example")?;
                let canvas = web_sys::Element::from(window.canvas()?);
                dst.append_child(&canvas).ok()?;
                Some(())
            })
            .expect("Couldn't append canvas to document body.");
    }

    let size = window.inner_size();

    let instance = wgpu::Instance::default();

    let surface = instance.create_surface(&window).unwrap();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            // Request an adapter which can render to our surface
            compatible_surface: Some(&surface),
        })
        .await
        .expect("Failed to find an appropriate adapter");

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: wgpu::MemoryHints::MemoryUsage,
            },
            None,
        )
        .await
        .expect("Failed to create device");

    // Eye targets and scene colors are linear; an sRGB surface encodes once
    // on write.
    let swapchain_capabilities = surface.get_capabilities(&adapter);
    let swapchain_format = swapchain_capabilities
        .formats
        .iter()
        .copied()
        .find(|format| format.is_srgb())
        .unwrap_or(swapchain_capabilities.formats[0]);

    let mut config = surface
        .get_default_config(&adapter, size.width.max(1), size.height.max(1))
        .expect("Surface isn't supported by the adapter");
    config.format = swapchain_format;
    surface.configure(&device, &config);

    let store = open_store(&options);
    let mut app = SpatialApp::new(store, config.width, config.height, options.mirrored);
    populate_demo_windows(&mut app.registry);
    if let Some(preset) = options.preset {
        app.apply_preset(preset);
    }
    app.set_stereo(options.stereo);

    let mut mouse = MouseHand::new(config.width, config.height, options.mirrored);
    let mut keyboard = KeyboardOrientation::default();
    let mut preset = options.preset.unwrap_or(Preset::VrBox);
    let mut field_cursor = FieldCursor(0);

    let mut scene_pass = ScenePass::new(&device, swapchain_format);
    let mono_bindings = SceneBindings::new(&device, &scene_pass);
    let eye_bindings = [
        SceneBindings::new(&device, &scene_pass),
        SceneBindings::new(&device, &scene_pass),
    ];

    let stereo_pass = StereoPass::new(&device, swapchain_format);
    let mut eye_targets = EyeTargets::new(&device, app.rig().eye_size());
    let mut stereo_bindings =
        StereoBindings::new(&device, &stereo_pass, &eye_targets, app.calibration.profile());

    let mut last_frame = app.seconds_since_start();

    let window = &window;

    event_loop
        .run(move |event, target| {
            // Have the closure take ownership of the resources.
            // `event_loop.run` never returns, therefore we must do this to ensure
            // the resources are properly cleaned up.
            let _ = (&instance, &adapter);

            if let Event::AboutToWait = event {
                let now = app.seconds_since_start();
                keyboard.advance((now - last_frame) as f32);
                last_frame = now;

                let report = app.tick(&mut mouse, &mut keyboard, now);
                for id in &report.opened {
                    log::info!("opened {id}");
                }

                let vertices = build_scene_vertices(&app.registry, &app.cursors());
                scene_pass.upload(&device, &queue, &vertices);

                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        log::warn!("surface lost, reconfiguring");
                        surface.configure(&device, &config);
                        window.request_redraw();
                        return;
                    }
                    Err(error) => {
                        log::warn!("skipping frame: {error}");
                        window.request_redraw();
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: None,
                    });

                let cameras = app.view_cameras();
                if app.is_stereo() {
                    stereo_bindings.write_profile(&queue, app.calibration.profile());
                    for (eye_index, camera) in cameras.iter().enumerate() {
                        let view_projection = camera.view_projection_wgpu();
                        eye_bindings[eye_index].write_view_projection(&queue, view_projection);
                        let mut rpass =
                            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                                label: Some("Eye Pass"),
                                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                    view: eye_targets.view(eye_index),
                                    resolve_target: None,
                                    ops: wgpu::Operations {
                                        load: wgpu::LoadOp::Clear(BACKGROUND),
                                        store: wgpu::StoreOp::Store,
                                    },
                                })],
                                depth_stencil_attachment: None,
                                timestamp_writes: None,
                                occlusion_query_set: None,
                            });
                        scene_pass.record(&mut rpass, &eye_bindings[eye_index], SceneTarget::Eye);
                    }
                    let mut rpass =
                        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("Distortion Pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: None,
                            timestamp_writes: None,
                            occlusion_query_set: None,
                        });
                    stereo_pass.record(&mut rpass, &stereo_bindings);
                } else {
                    mono_bindings.write_view_projection(&queue, cameras[0].view_projection_wgpu());
                    let mut rpass =
                        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("Scene Pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(BACKGROUND),
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: None,
                            timestamp_writes: None,
                            occlusion_query_set: None,
                        });
                    scene_pass.record(&mut rpass, &mono_bindings, SceneTarget::Surface);
                }
                queue.submit(Some(encoder.finish()));
                frame.present();

                window.request_redraw();
            };

            if let Event::WindowEvent {
                window_id: _,
                event,
            } = event
            {
                match event {
                    WindowEvent::Resized(new_size) => {
                        // Reconfigure the surface with the new size
                        config.width = new_size.width.max(1);
                        config.height = new_size.height.max(1);
                        surface.configure(&device, &config);
                        mouse.set_size(config.width, config.height);
                        if let Some(eye_size) = app.resize(config.width, config.height) {
                            eye_targets = EyeTargets::new(&device, eye_size);
                            stereo_bindings.update_eye_targets(&device, &stereo_pass, &eye_targets);
                        }
                        // On macos the window needs to be redrawn manually after resizing
                        window.request_redraw();
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        mouse.cursor_moved(position.x, position.y)
                    }
                    WindowEvent::CursorLeft { .. } => mouse.cursor_left(),
                    WindowEvent::MouseInput { state, button, .. } => {
                        mouse.mouse_input(button, state)
                    }
                    WindowEvent::KeyboardInput {
                        event: KeyEvent { logical_key, state, repeat, .. },
                        ..
                    } => {
                        let turned = keyboard.handle_key(&logical_key, state);
                        if turned || state != ElementState::Pressed {
                            return;
                        }
                        match logical_key {
                            Key::Named(NamedKey::Escape) => {
                                app.shutdown();
                                target.exit();
                            }
                            Key::Named(NamedKey::Tab) if !repeat => {
                                let field = field_cursor.advance();
                                let value = field.get(app.calibration.profile());
                                log::info!("editing {} = {}", field.label(), value);
                            }
                            Key::Character(ref c) => match c.as_str() {
                                "s" if !repeat => app.toggle_stereo(),
                                "p" if !repeat => {
                                    preset = preset.next();
                                    app.apply_preset(preset);
                                }
                                "r" if !repeat => app.calibration.reset(),
                                "h" if !repeat => app.registry.set_all_visible(true),
                                "c" if !repeat => keyboard.recenter(),
                                "=" | "+" | "-" => {
                                    let field = field_cursor.field();
                                    let steps = if c.as_str() == "-" { -1.0 } else { 1.0 };
                                    app.calibration.nudge(field, steps);
                                    let value = field.get(app.calibration.profile());
                                    log::info!("{} = {}", field.label(), value);
                                }
                                _ => {}
                            },
                            _ => {}
                        }
                    }
                    WindowEvent::RedrawRequested => {},
                    WindowEvent::CloseRequested => {
                        app.shutdown();
                        target.exit();
                    }
                    _ => {}
                };
            }
        })
        .unwrap();
}

#[cfg_attr(target_arch="wasm32", wasm_bindgen(start))]
pub fn run() {
    run_with(Options::default());
}

pub fn run_with(options: Options) {

    #[cfg(not(target_arch = "wasm32"))]
    {
        pollster::block_on(arun(options));
    }
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(arun(options));
    }
}
