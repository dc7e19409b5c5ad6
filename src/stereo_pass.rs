use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::calibration::CalibrationProfile;

/// Linear, filterable, and wide enough that the composite never bands.
pub const EYE_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct DistortionUniform {
    lens: [f32; 4],
    shift: [f32; 4],
}

impl DistortionUniform {
    pub fn from_profile(profile: &CalibrationProfile) -> Self {
        Self {
            lens: [profile.k1, profile.k2, profile.zoom, profile.lens_center_y],
            shift: [profile.left_shift, profile.right_shift, 0.0, 0.0],
        }
    }
}

pub struct EyeTargets {
    size: (u32, u32),
    views: [wgpu::TextureView; 2],
}

impl EyeTargets {
    pub fn new(device: &wgpu::Device, (width, height): (u32, u32)) -> Self {
        let make = |label: &str| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: width.max(1),
                        height: height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: EYE_TARGET_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        Self {
            size: (width.max(1), height.max(1)),
            views: [make("Stereo: Left Eye Target"), make("Stereo: Right Eye Target")],
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn view(&self, eye_index: usize) -> &wgpu::TextureView {
        &self.views[eye_index]
    }
}

pub struct StereoPass {
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
}

impl StereoPass {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let eye_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Stereo: Eye Targets Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Stereo: Distortion Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Stereo Pipeline Layout"),
            bind_group_layouts: &[&eye_layout, &uniform_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::include_wgsl!("distortion.wgsl"));
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Stereo Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main_quad"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(format.into())],
            }),
            primitive: wgpu::PrimitiveState {
                topology: Default::default(),
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
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Stereo: Eye Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self { pipeline, sampler }
    }
}

pub struct StereoBindings {
    distortion_buffer: wgpu::Buffer,
    distortion: wgpu::BindGroup,
    eye_targets: wgpu::BindGroup,
}

impl StereoBindings {
    pub fn new(
        device: &wgpu::Device,
        pass: &StereoPass,
        targets: &EyeTargets,
        profile: &CalibrationProfile,
    ) -> Self {
        let distortion_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Stereo: Distortion Uniform Buffer"),
            contents: bytemuck::cast_slice(&[DistortionUniform::from_profile(profile)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let distortion = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Stereo: Distortion Uniform Bind Group"),
            layout: &pass.pipeline.get_bind_group_layout(1),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: distortion_buffer.as_entire_binding(),
            }],
        });
        Self {
            eye_targets: Self::eye_bind_group(device, pass, targets),
            distortion_buffer,
            distortion,
        }
    }

    fn eye_bind_group(
        device: &wgpu::Device,
        pass: &StereoPass,
        targets: &EyeTargets,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Stereo: Eye Targets Bind Group"),
            layout: &pass.pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(targets.view(0)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(targets.view(1)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&pass.sampler),
                },
            ],
        })
    }

    /// Rebinds after the eye targets were recreated.
    pub fn update_eye_targets(
        &mut self,
        device: &wgpu::Device,
        pass: &StereoPass,
        targets: &EyeTargets,
    ) {
        self.eye_targets = Self::eye_bind_group(device, pass, targets);
    }

    pub fn write_profile(&self, queue: &wgpu::Queue, profile: &CalibrationProfile) {
        queue.write_buffer(
            &self.distortion_buffer,
            0,
            bytemuck::cast_slice(&[DistortionUniform::from_profile(profile)]),
        );
    }
}

impl<'a> StereoPass {
    pub fn record<'pass>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'pass>,
        bindings: &'a StereoBindings,
    ) where
        'a: 'pass,
    {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &bindings.eye_targets, &[]);
        rpass.set_bind_group(1, &bindings.distortion, &[]);
        rpass.draw(0..6, 0..2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<DistortionUniform>(), 32);
        let profile = CalibrationProfile {
            right_shift: 0.02,
            ..CalibrationProfile::default()
        };
        let uniform = DistortionUniform::from_profile(&profile);
        assert_eq!(uniform.lens, [profile.k1, profile.k2, profile.zoom, profile.lens_center_y]);
        assert_eq!(uniform.shift[1], 0.02);
    }
}
