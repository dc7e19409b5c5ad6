//! Flat-shaded panel renderer. Windows are emitted back to front as colored
//! quads and blended in that order; there is no depth buffer.

use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, Point3};
use wgpu::util::DeviceExt;

use crate::matrix_operations::Rect;
use crate::stereo_pass::EYE_TARGET_FORMAT;
use crate::windows::{Window, WindowRegistry};

const BODY_COLOR: [f32; 4] = [0.02, 0.025, 0.04, 0.85];
const HANDLE_COLOR: [f32; 4] = [0.1, 0.13, 0.2, 0.95];
const HANDLE_DRAGGING_COLOR: [f32; 4] = [0.15, 0.35, 0.85, 1.0];
const BUTTON_COLOR: [f32; 4] = [0.06, 0.07, 0.1, 1.0];
const BUTTON_HOVER_COLOR: [f32; 4] = [0.12, 0.15, 0.25, 1.0];
const PROGRESS_COLOR: [f32; 4] = [0.1, 0.7, 0.25, 1.0];
pub const CURSOR_SIZE: f32 = 0.025;

const INITIAL_VERTEX_CAPACITY: usize = 1024;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SceneVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl SceneVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// A hand's pointer marker, placed where its ray meets the scene.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cursor {
    pub position: Point3<f32>,
    pub color: [f32; 4],
}

fn push_quad(out: &mut Vec<SceneVertex>, origin: Point3<f32>, rect: Rect, color: [f32; 4]) {
    let min = rect.min();
    let max = rect.max();
    let z = origin.z;
    let corner = |x: f32, y: f32| SceneVertex {
        position: [origin.x + x, origin.y + y, z],
        color,
    };
    out.extend_from_slice(&[
        corner(min.x, min.y),
        corner(max.x, min.y),
        corner(min.x, max.y),
        corner(min.x, max.y),
        corner(max.x, min.y),
        corner(max.x, max.y),
    ]);
}

fn push_window(out: &mut Vec<SceneVertex>, window: &Window) {
    let origin = window.position;
    push_quad(out, origin, window.bounds(), BODY_COLOR);
    let handle_color = if window.is_dragging() {
        HANDLE_DRAGGING_COLOR
    } else {
        HANDLE_COLOR
    };
    push_quad(out, origin, window.handle_rect(), handle_color);
    for button in window.buttons() {
        let color = if button.is_hovered() {
            BUTTON_HOVER_COLOR
        } else {
            BUTTON_COLOR
        };
        push_quad(out, origin, button.hit_box, color);
        let progress = button.hold_progress();
        if progress > 0.0 {
            let b = button.hit_box;
            let width = b.size.x * progress;
            let fill = Rect::new(b.min().x + width * 0.5, b.center.y, width, b.size.y);
            push_quad(out, origin, fill, PROGRESS_COLOR);
        }
    }
}

/// World-space triangles for every visible window (far to near) followed by
/// the cursors.
pub fn build_scene_vertices(registry: &WindowRegistry, cursors: &[Cursor]) -> Vec<SceneVertex> {
    let mut out = Vec::new();
    for window in registry.back_to_front() {
        push_window(&mut out, window);
    }
    for cursor in cursors {
        let rect = Rect::new(0.0, 0.0, CURSOR_SIZE, CURSOR_SIZE);
        push_quad(&mut out, cursor.position, rect, cursor.color);
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneTarget {
    Surface,
    Eye,
}

pub struct ScenePass {
    camera_layout: wgpu::BindGroupLayout,
    surface_pipeline: wgpu::RenderPipeline,
    eye_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    vertex_count: u32,
}

impl ScenePass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene: Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&camera_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::include_wgsl!("scene.wgsl"));
        let make_pipeline = |label: &str, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[SceneVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: Default::default(),
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: Default::default(),
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let surface_pipeline = make_pipeline("Scene Pipeline (surface)", surface_format);
        let eye_pipeline = make_pipeline("Scene Pipeline (eye)", EYE_TARGET_FORMAT);
        let vertex_buffer = Self::create_vertex_buffer(device, INITIAL_VERTEX_CAPACITY);

        Self {
            camera_layout,
            surface_pipeline,
            eye_pipeline,
            vertex_buffer,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            vertex_count: 0,
        }
    }

    fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Vertex Buffer"),
            size: (capacity * std::mem::size_of::<SceneVertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Uploads this frame's geometry, growing the buffer when needed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, vertices: &[SceneVertex]) {
        if vertices.len() > self.vertex_capacity {
            self.vertex_capacity = vertices.len().next_power_of_two();
            self.vertex_buffer = Self::create_vertex_buffer(device, self.vertex_capacity);
        }
        if !vertices.is_empty() {
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        }
        self.vertex_count = vertices.len() as u32;
    }
}

/// One view's camera uniform. The demo keeps one for mono and one per eye.
pub struct SceneBindings {
    camera_buffer: wgpu::Buffer,
    camera: wgpu::BindGroup,
}

impl SceneBindings {
    pub fn new(device: &wgpu::Device, pass: &ScenePass) -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::from_scale(1.0).into();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene: Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[identity]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene: Camera Bind Group"),
            layout: &pass.camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });
        Self { camera_buffer, camera }
    }

    pub fn write_view_projection(&self, queue: &wgpu::Queue, view_projection: Matrix4<f32>) {
        let raw: [[f32; 4]; 4] = view_projection.into();
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[raw]));
    }
}

impl<'a> ScenePass {
    pub fn record<'pass>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'pass>,
        bindings: &'a SceneBindings,
        target: SceneTarget,
    ) where
        'a: 'pass,
    {
        if self.vertex_count == 0 {
            return;
        }
        let pipeline = match target {
            SceneTarget::Surface => &self.surface_pipeline,
            SceneTarget::Eye => &self.eye_pipeline,
        };
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &bindings.camera, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.draw(0..self.vertex_count, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::{ButtonId, WindowSpec};

    fn spec(z: f32) -> WindowSpec {
        WindowSpec::new("w", 1.0, 0.5)
            .at(0.0, 0.0, z)
            .button("b", Rect::new(0.0, 0.0, 0.2, 0.1), |_| {})
    }

    #[test]
    fn windows_are_emitted_far_to_near() {
        let mut registry = WindowRegistry::new();
        registry.open(spec(-1.0));
        registry.open(spec(-3.0));
        registry.update_z_order(Point3::new(0.0, 0.0, 0.0));
        let vertices = build_scene_vertices(&registry, &[]);
        // body + handle + button per window
        assert_eq!(vertices.len(), 2 * 3 * 6);
        assert_eq!(vertices[0].position[2], -3.0);
        assert_eq!(vertices.last().unwrap().position[2], -1.0);
    }

    #[test]
    fn hold_progress_adds_partial_fill() {
        let mut registry = WindowRegistry::new();
        let id = registry.open(spec(-2.0));
        registry.set_hold_progress(ButtonId { window: id, index: 0 }, 0.5);
        let vertices = build_scene_vertices(&registry, &[]);
        assert_eq!(vertices.len(), 4 * 6);
        let fill = &vertices[18..];
        assert!(fill.iter().all(|v| v.color == PROGRESS_COLOR));
        let min_x = fill.iter().map(|v| v.position[0]).fold(f32::MAX, f32::min);
        let max_x = fill.iter().map(|v| v.position[0]).fold(f32::MIN, f32::max);
        assert!((min_x + 0.1).abs() < 1e-6);
        assert!(max_x.abs() < 1e-6);
    }

    #[test]
    fn hidden_windows_are_skipped_and_cursors_last() {
        let mut registry = WindowRegistry::new();
        registry.open(spec(-2.0));
        registry.set_all_visible(false);
        let cursor = Cursor {
            position: Point3::new(0.1, 0.2, -1.0),
            color: [1.0; 4],
        };
        let vertices = build_scene_vertices(&registry, &[cursor]);
        assert_eq!(vertices.len(), 6);
        assert!(vertices.iter().all(|v| v.position[2] == -1.0));
    }
}
