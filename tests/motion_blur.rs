//! Pass-protocol tests for the motion blur effect, run against the
//! command-recording backend.

use std::path::PathBuf;
use std::rc::Rc;

use motionfx::gpu::recording::{GpuCommand, RecordingBackend};
use motionfx::gpu::{
    Attachment, GpuBackend, ProgramLoader, Resolution, ScreenQuad, Texture,
    TextureDescriptor, TextureFormat, TextureId,
};
use motionfx::options::MotionBlurOptions;
use motionfx::postprocess::motion_blur::{DEPTH_SLOT, SCENE_SLOT, VELOCITY_SLOT};
use motionfx::postprocess::{MotionBlur, MotionBlurInputs, RenderEffect};
use motionfx::util::FrameTime;
use motionfx::EffectError;

const HD: Resolution = Resolution::new(1920, 1080);

struct Inputs {
    scene: Texture,
    depth: Texture,
    velocity: Texture,
}

impl Inputs {
    fn create(gpu: &mut RecordingBackend, res: Resolution) -> Self {
        let mut make = |label: &str, format| {
            Texture::create(gpu, TextureDescriptor::color_target(label, res, format))
                .unwrap()
        };
        Self {
            scene: make("Scene", TextureFormat::Rgba16Float),
            depth: make("Depth", TextureFormat::Depth32Float),
            velocity: make("Velocity", TextureFormat::Rg16Float),
        }
    }

    fn borrow(&self) -> MotionBlurInputs<'_> {
        MotionBlurInputs {
            scene: &self.scene,
            depth: &self.depth,
            velocity: &self.velocity,
        }
    }
}

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/shaders/screen")
}

fn loaded_effect(gpu: &mut RecordingBackend, res: Resolution) -> MotionBlur {
    let mut blur = MotionBlur::new(
        Rc::new(ProgramLoader::new().unwrap()),
        shader_dir(),
        res,
        MotionBlurOptions::default(),
    );
    blur.load(gpu).unwrap();
    blur
}

fn render_once(
    gpu: &mut RecordingBackend,
    blur: &MotionBlur,
    inputs: &Inputs,
    frame: FrameTime,
) {
    gpu.clear_commands();
    blur.render(gpu, &ScreenQuad::new(), &inputs.borrow(), frame)
        .unwrap();
}

#[test]
fn hd_render_issues_three_passes_in_ping_pong_order() {
    let mut gpu = RecordingBackend::new();
    let blur = loaded_effect(&mut gpu, HD);
    let inputs = Inputs::create(&mut gpu, HD);
    render_once(&mut gpu, &blur, &inputs, FrameTime::at_fps(60.0));

    let a = blur.final_texture().unwrap().id();
    let b = blur.intermediate_texture().unwrap().id();

    assert_eq!(gpu.draw_count(), 3);
    assert_eq!(
        gpu.bindings_to_slot(SCENE_SLOT),
        vec![inputs.scene.id(), a, b]
    );

    let draws: Vec<_> = gpu.draws().cloned().collect();
    let outputs: Vec<Vec<TextureId>> =
        draws.iter().map(|d| d.bindings.outputs.clone()).collect();
    assert_eq!(outputs, vec![vec![a], vec![b], vec![a]]);
    let sampled: Vec<TextureId> = draws.iter().map(|d| d.bindings.inputs[0]).collect();
    assert_eq!(sampled, vec![inputs.scene.id(), a, b]);
    for draw in &draws {
        assert_eq!(draw.bindings.viewport.width, 1920);
        assert_eq!(draw.bindings.viewport.height, 1080);
    }
}

#[test]
fn velocity_and_depth_are_bound_once_and_stay_bound() {
    let mut gpu = RecordingBackend::new();
    let blur = loaded_effect(&mut gpu, HD);
    let inputs = Inputs::create(&mut gpu, HD);
    render_once(&mut gpu, &blur, &inputs, FrameTime::at_fps(60.0));

    assert_eq!(gpu.bindings_to_slot(VELOCITY_SLOT), vec![inputs.velocity.id()]);
    assert_eq!(gpu.bindings_to_slot(DEPTH_SLOT), vec![inputs.depth.id()]);
    for draw in gpu.draws() {
        assert_eq!(draw.bindings.inputs[1], inputs.velocity.id());
        assert_eq!(draw.bindings.inputs[2], inputs.depth.id());
    }
}

#[test]
fn fps_scaler_is_sixty_regardless_of_frame_time() {
    let mut gpu = RecordingBackend::new();
    let res = Resolution::new(64, 64);
    let blur = loaded_effect(&mut gpu, res);
    let inputs = Inputs::create(&mut gpu, res);

    for frame in [
        FrameTime::at_fps(30.0),
        FrameTime::at_fps(144.0),
        FrameTime::from_secs(0.0),
    ] {
        render_once(&mut gpu, &blur, &inputs, frame);
        for draw in gpu.draws() {
            assert_eq!(draw.uniforms, vec![60.0, 60.0]);
        }
    }
}

#[test]
fn attachments_switch_between_passes() {
    let mut gpu = RecordingBackend::new();
    let res = Resolution::new(64, 64);
    let blur = loaded_effect(&mut gpu, res);
    let inputs = Inputs::create(&mut gpu, res);
    render_once(&mut gpu, &blur, &inputs, FrameTime::at_fps(60.0));

    let selections: Vec<Vec<Attachment>> = gpu
        .commands()
        .iter()
        .filter_map(|c| match c {
            GpuCommand::BindFrameTarget { draw_buffers, .. }
            | GpuCommand::SetDrawBuffers(draw_buffers) => Some(draw_buffers.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        selections,
        vec![
            vec![Attachment::COLOR0],
            vec![Attachment::COLOR1],
            vec![Attachment::COLOR0],
        ]
    );
}

#[test]
fn render_before_load_fails() {
    let mut gpu = RecordingBackend::new();
    let res = Resolution::new(64, 64);
    let blur = MotionBlur::new(
        Rc::new(ProgramLoader::new().unwrap()),
        shader_dir(),
        res,
        MotionBlurOptions::default(),
    );
    let inputs = Inputs::create(&mut gpu, res);
    let result = blur.render(
        &mut gpu,
        &ScreenQuad::new(),
        &inputs.borrow(),
        FrameTime::at_fps(60.0),
    );
    assert!(matches!(result, Err(EffectError::NotLoaded)));
    assert_eq!(gpu.draw_count(), 0);
}

#[test]
fn owned_textures_match_resolution() {
    for (w, h) in [(1, 1), (640, 480), (1920, 1080), (3840, 2160)] {
        let mut gpu = RecordingBackend::new();
        let res = Resolution::new(w, h);
        let blur = loaded_effect(&mut gpu, res);
        for texture in [
            blur.final_texture().unwrap(),
            blur.intermediate_texture().unwrap(),
        ] {
            assert_eq!((texture.width(), texture.height()), (w, h));
            let desc = gpu.texture_descriptor(texture.id()).unwrap();
            assert_eq!(desc.mip_levels, 1);
        }
    }
}

#[test]
fn unload_then_render_fails_until_reload() {
    let mut gpu = RecordingBackend::new();
    let res = Resolution::new(64, 64);
    let mut blur = loaded_effect(&mut gpu, res);
    let inputs = Inputs::create(&mut gpu, res);

    blur.unload(&mut gpu);
    let quad = ScreenQuad::new();
    assert!(matches!(
        blur.render(&mut gpu, &quad, &inputs.borrow(), FrameTime::at_fps(60.0)),
        Err(EffectError::NotLoaded)
    ));

    blur.reload(&mut gpu).unwrap();
    render_once(&mut gpu, &blur, &inputs, FrameTime::at_fps(60.0));
    assert_eq!(gpu.draw_count(), 3);
    // Inputs plus the two owned textures.
    assert_eq!(gpu.live_textures(), 5);
}

#[test]
fn mismatched_inputs_still_render() {
    let mut gpu = RecordingBackend::new();
    let blur = loaded_effect(&mut gpu, Resolution::new(64, 64));
    let inputs = Inputs::create(&mut gpu, Resolution::new(32, 32));
    render_once(&mut gpu, &blur, &inputs, FrameTime::at_fps(60.0));
    assert_eq!(gpu.draw_count(), 3);
}

#[test]
fn render_leaves_state_bound() {
    let mut gpu = RecordingBackend::new();
    let res = Resolution::new(64, 64);
    let blur = loaded_effect(&mut gpu, res);
    let inputs = Inputs::create(&mut gpu, res);
    render_once(&mut gpu, &blur, &inputs, FrameTime::at_fps(60.0));

    let state = gpu.state();
    assert!(state.program().is_some());
    assert_eq!(state.draw_buffers(), &[Attachment::COLOR0]);
    assert_eq!(
        state.unit(SCENE_SLOT),
        Some(blur.intermediate_texture().unwrap().id())
    );
    // A further draw with the left-over state is valid.
    gpu.draw_fullscreen().unwrap();
}
