//! Shared wgpu boilerplate helpers for screen-space post-process pipelines.

use crate::gpu::texture::{FilterMode, TextureDescriptor};

/// Fragment-visible float 2D texture binding.
#[must_use]
pub const fn texture_2d(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Fragment-visible sampler binding, filtering when `filterable`.
#[must_use]
pub const fn sampler(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    let ty = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(ty),
        count: None,
    }
}

/// Fragment-visible uniform buffer binding.
#[must_use]
pub const fn uniform_buffer(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Binding of the texture for sampler input `index`.
#[must_use]
pub const fn texture_binding(index: u32) -> u32 {
    1 + 2 * index
}

/// Binding of the sampler for sampler input `index`.
#[must_use]
pub const fn sampler_binding(index: u32) -> u32 {
    2 + 2 * index
}

/// Layout entries for a program: the uniform block at binding 0, then one
/// texture + sampler pair per sampler input.
#[must_use]
pub fn program_layout_entries(filterable: &[bool]) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(1 + 2 * filterable.len());
    entries.push(uniform_buffer(0));
    for (index, &f) in (0u32..).zip(filterable) {
        entries.push(texture_2d(texture_binding(index), f));
        entries.push(sampler(sampler_binding(index), f));
    }
    entries
}

/// Create a full-screen render pipeline with `vs_main` / `fs_main` entry
/// points, no vertex buffers, and one unblended color target per format.
pub fn create_screen_space_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    formats: &[wgpu::TextureFormat],
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> wgpu::RenderPipeline {
    let pipeline_layout =
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts,
            push_constant_ranges: &[],
        });
    let targets: Vec<Option<wgpu::ColorTargetState>> = formats
        .iter()
        .map(|&format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{label} Pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &targets,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Sampler matching a texture's filter and wrap settings. Non-filterable
/// formats always get a nearest sampler.
pub fn sampler_for(device: &wgpu::Device, desc: &TextureDescriptor) -> wgpu::Sampler {
    let filterable = desc.format.is_filterable();
    let filter = |mode: FilterMode| {
        if filterable {
            mode.to_wgpu()
        } else {
            wgpu::FilterMode::Nearest
        }
    };
    let wrap = desc.wrap.to_wgpu();
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{} Sampler", desc.label)),
        address_mode_u: wrap,
        address_mode_v: wrap,
        address_mode_w: wrap,
        mag_filter: filter(desc.mag_filter),
        min_filter: filter(desc.min_filter),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_binding_convention() {
        let entries = program_layout_entries(&[true, true, false]);
        let bindings: Vec<u32> = entries.iter().map(|e| e.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3, 4, 5, 6]);
        assert!(matches!(
            entries[5].ty,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                ..
            }
        ));
        assert!(matches!(
            entries[6].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
        ));
    }
}
