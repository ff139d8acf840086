//! `motionfx` - renders the motion blur effect headlessly on synthetic
//! inputs.
//!
//! Usage: `motionfx [options.toml]`. Logging is controlled by `RUST_LOG`.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::{UVec2, Vec2};
use half::f16;
use motionfx::gpu::render_context::RenderContext;
use motionfx::gpu::wgpu_backend::WgpuBackend;
use motionfx::gpu::{
    ProgramLoader, Resolution, ScreenQuad, Texture, TextureDescriptor,
    TextureFormat,
};
use motionfx::options::Options;
use motionfx::postprocess::{MotionBlur, MotionBlurInputs, RenderEffect};
use motionfx::util::{FrameTime, FrameTiming};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let options = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading options from {path}");
            Options::load(Path::new(&path))?
        }
        None => Options::default(),
    };
    let res = Resolution::new(options.render.width, options.render.height);
    let shader_dir = options.render.shader_dir.clone().unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/shaders/screen")
    });

    let context = pollster::block_on(RenderContext::headless())?;
    let mut gpu = WgpuBackend::new(context);

    let mut blur = MotionBlur::new(
        Rc::new(ProgramLoader::new()?),
        shader_dir,
        res,
        options.motion_blur.clone(),
    );
    blur.load(&mut gpu)?;

    let scene = Texture::create(
        &mut gpu,
        TextureDescriptor::color_target(
            "Synthetic Scene",
            res,
            TextureFormat::Rgba16Float,
        ),
    )?;
    let velocity = Texture::create(
        &mut gpu,
        TextureDescriptor::color_target(
            "Synthetic Velocity",
            res,
            TextureFormat::Rg16Float,
        ),
    )?;
    let depth = Texture::create(
        &mut gpu,
        TextureDescriptor::color_target(
            "Synthetic Depth",
            res,
            TextureFormat::R32Float,
        ),
    )?;
    gpu.write_texture(&scene, &checkerboard(res))?;
    gpu.write_texture(&velocity, &swirl(res))?;
    gpu.write_texture(&depth, &radial_depth(res))?;

    let inputs = MotionBlurInputs {
        scene: &scene,
        depth: &depth,
        velocity: &velocity,
    };
    let quad = ScreenQuad::new();
    let mut timing = FrameTiming::new(0);
    let mut frame = FrameTime::at_fps(options.motion_blur.reference_fps);
    let mut passes = 0;

    for _ in 0..options.render.frames {
        blur.render(&mut gpu, &quad, &inputs, frame)?;
        passes += gpu.submit();
        frame = timing.end_frame();
    }
    let _ = gpu.context().device.poll(wgpu::PollType::Wait);

    log::info!(
        "rendered {} frames ({passes} passes) at {}x{}, {:.1} fps",
        options.render.frames,
        res.width,
        res.height,
        timing.fps()
    );

    blur.unload(&mut gpu);
    scene.release(&mut gpu);
    velocity.release(&mut gpu);
    depth.release(&mut gpu);
    Ok(())
}

/// Rgba16Float checkerboard with a horizontal gradient.
fn checkerboard(res: Resolution) -> Vec<u8> {
    texels(res, |uv| {
        let cell = ((uv.x * 16.0) as u32 + (uv.y * 9.0) as u32) % 2;
        let v = if cell == 0 { 0.1 } else { 0.9 };
        vec![
            f16::from_f32(v * uv.x),
            f16::from_f32(v),
            f16::from_f32(v * (1.0 - uv.x)),
            f16::ONE,
        ]
    })
    .into_iter()
    .flat_map(|h: f16| h.to_le_bytes())
    .collect()
}

/// Rg16Float velocity swirling around the image center, in UV per frame.
fn swirl(res: Resolution) -> Vec<u8> {
    texels(res, |uv| {
        let offset = uv - Vec2::splat(0.5);
        let velocity = offset.perp() * 0.04;
        vec![f16::from_f32(velocity.x), f16::from_f32(velocity.y)]
    })
    .into_iter()
    .flat_map(|h: f16| h.to_le_bytes())
    .collect()
}

/// R32Float depth, nearest at the center.
fn radial_depth(res: Resolution) -> Vec<u8> {
    texels(res, |uv| vec![uv.distance(Vec2::splat(0.5)).min(1.0)])
        .into_iter()
        .flat_map(f32::to_le_bytes)
        .collect()
}

/// Evaluate `f` at every texel center, row-major.
fn texels<T>(res: Resolution, f: impl Fn(Vec2) -> Vec<T>) -> Vec<T> {
    let size = res.as_uvec2().as_vec2();
    let mut out = Vec::new();
    for y in 0..res.height {
        for x in 0..res.width {
            let uv = (UVec2::new(x, y).as_vec2() + Vec2::splat(0.5)) / size;
            out.extend(f(uv));
        }
    }
    out
}
