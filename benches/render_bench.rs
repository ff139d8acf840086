//! Benchmarks for motion blur pass issuance and shader composition.
#![allow(missing_docs)]

use std::hint::black_box;
use std::path::PathBuf;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion};
use motionfx::gpu::recording::RecordingBackend;
use motionfx::gpu::{
    ProgramLoader, Resolution, ScreenQuad, ShaderFile, Texture,
    TextureDescriptor, TextureFormat,
};
use motionfx::options::MotionBlurOptions;
use motionfx::postprocess::{MotionBlur, MotionBlurInputs, RenderEffect};
use motionfx::util::FrameTime;

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/shaders/screen")
}

fn render_benchmark(c: &mut Criterion) {
    let res = Resolution::new(1920, 1080);
    let mut gpu = RecordingBackend::new();
    let mut blur = MotionBlur::new(
        Rc::new(ProgramLoader::new().unwrap()),
        shader_dir(),
        res,
        MotionBlurOptions::default(),
    );
    blur.load(&mut gpu).unwrap();

    let mut make = |label: &str, format| {
        Texture::create(&mut gpu, TextureDescriptor::color_target(label, res, format))
            .unwrap()
    };
    let scene = make("Scene", TextureFormat::Rgba16Float);
    let depth = make("Depth", TextureFormat::Depth32Float);
    let velocity = make("Velocity", TextureFormat::Rg16Float);
    let inputs = MotionBlurInputs {
        scene: &scene,
        depth: &depth,
        velocity: &velocity,
    };
    let quad = ScreenQuad::new();

    let _ = c.bench_function("motion_blur_render_recorded", |b| {
        b.iter(|| {
            gpu.clear_commands();
            blur.render(&mut gpu, &quad, black_box(&inputs), FrameTime::at_fps(60.0))
                .unwrap();
        });
    });
}

fn compose_benchmark(c: &mut Criterion) {
    let loader = ProgramLoader::new().unwrap();
    let files = [ShaderFile::fragment(shader_dir().join("motion_blur.wgsl"))];

    let _ = c.bench_function("compose_motion_blur_uncached", |b| {
        b.iter(|| {
            loader.clear_cache();
            black_box(loader.create_post_processing_program(&files).unwrap())
        });
    });
}

criterion_group!(benches, render_benchmark, compose_benchmark);
criterion_main!(benches);
