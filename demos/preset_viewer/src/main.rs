use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use postfx_core::{load_typed_json, Size2D, VideoConfig};
use postfx_runtime_glow::{ChainError, FrameFormat, GlBackend, GlCoreVideo, VideoFrame};
use tracing_subscriber::EnvFilter;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use glutin::display::GetGlDisplay;
use glutin::prelude::*;

// raw-window-handle 0.5 traits (matches glutin 0.30)
use raw_window_handle::HasRawWindowHandle;

const FRAME_WIDTH: u32 = 256;
const FRAME_HEIGHT: u32 = 224;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        tracing::error!(error = %e, "preset viewer failed");
        std::process::exit(1);
    }
}

/// `preset_viewer [preset.slangp | preset.slang | config.json]`
fn config_from_args() -> Result<VideoConfig, ChainError> {
    let Some(arg) = std::env::args_os().nth(1).map(PathBuf::from) else {
        return Ok(VideoConfig::default());
    };
    if arg.extension().is_some_and(|e| e == "json") {
        return load_typed_json(&arg);
    }
    Ok(VideoConfig {
        shader_preset: Some(arg),
        ..VideoConfig::default()
    })
}

/// Scrolling colour bars over a checkerboard, packed as XRGB8888.
fn test_frame(frame: u64, pixels: &mut [u32]) {
    const BARS: [u32; 8] = [
        0x00ff_ffff, 0x00ff_ff00, 0x0000_ffff, 0x0000_ff00,
        0x00ff_00ff, 0x00ff_0000, 0x0000_00ff, 0x0000_0000,
    ];
    let shift = (frame % FRAME_WIDTH as u64) as u32;
    for y in 0..FRAME_HEIGHT {
        for x in 0..FRAME_WIDTH {
            let px = if y < FRAME_HEIGHT * 3 / 4 {
                let bar = ((x + shift) % FRAME_WIDTH) * 8 / FRAME_WIDTH;
                BARS[bar as usize]
            } else if ((x / 8) + (y / 8)) % 2 == 0 {
                0x0020_2020
            } else {
                0x00c0_c0c0
            };
            pixels[(y * FRAME_WIDTH + x) as usize] = px;
        }
    }
}

fn as_bytes(pixels: &[u32]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_ne_bytes()).collect()
}

fn run() -> Result<(), ChainError> {
    let config = config_from_args()?;
    let event_loop = EventLoop::new();

    let window_builder = WindowBuilder::new()
        .with_title("postfx: preset viewer")
        .with_inner_size(winit::dpi::LogicalSize::new(1024.0, 768.0));

    let template = glutin::config::ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_depth_size(0)
        .with_stencil_size(0)
        .with_transparency(false);

    let display_builder =
        glutin_winit::DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |configs| {
            configs
                .reduce(|accum, config| {
                    if config.num_samples() > accum.num_samples() {
                        config
                    } else {
                        accum
                    }
                })
                .unwrap()
        })
        .map_err(|e| ChainError::resource(format!("DisplayBuilder.build: {e}")))?;

    let window =
        window.ok_or_else(|| ChainError::resource("DisplayBuilder did not create a window"))?;
    let gl_display = gl_config.display();
    let raw_window_handle = window.raw_window_handle();

    let context_attributes = glutin::context::ContextAttributesBuilder::new()
        .with_profile(glutin::context::GlProfile::Core)
        .with_context_api(glutin::context::ContextApi::OpenGl(Some(glutin::context::Version::new(3, 3))))
        .build(Some(raw_window_handle));

    let not_current_gl_context = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .map_err(|e| ChainError::resource(format!("create_context: {e}")))?
    };

    let size = window.inner_size();
    let (width, height) = (size.width.max(1), size.height.max(1));

    let attrs = glutin::surface::SurfaceAttributesBuilder::<glutin::surface::WindowSurface>::new()
        .build(
            raw_window_handle,
            NonZeroU32::new(width).unwrap(),
            NonZeroU32::new(height).unwrap(),
        );

    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .map_err(|e| ChainError::resource(format!("create_window_surface: {e}")))?
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .map_err(|e| ChainError::resource(format!("make_current: {e}")))?;

    let gl = unsafe {
        glow::Context::from_loader_function(|s| {
            gl_display.get_proc_address(std::ffi::CString::new(s).unwrap().as_c_str()) as *const _
        })
    };

    let backend = unsafe { GlBackend::new(gl)? };
    let preset = config.shader_preset.clone();
    let mut video = Some(GlCoreVideo::new(backend, config, Size2D::new(width, height))?);
    tracing::info!(preset = ?preset, "keys: R rotate, A aspect, I integer scale, S reload, N stock");

    let mut pixels = vec![0u32; (FRAME_WIDTH * FRAME_HEIGHT) as usize];
    let mut frame_index = 0u64;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,

                WindowEvent::Resized(physical_size) => {
                    gl_surface.resize(
                        &gl_context,
                        NonZeroU32::new(physical_size.width.max(1)).unwrap(),
                        NonZeroU32::new(physical_size.height.max(1)).unwrap(),
                    );
                    window.request_redraw();
                }

                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } => {
                    if let Some(video) = video.as_mut() {
                        handle_key(video, key, preset.as_deref());
                    }
                }

                _ => {}
            },

            Event::MainEventsCleared => window.request_redraw(),

            Event::RedrawRequested(_) => {
                let Some(video) = video.as_mut() else {
                    return;
                };
                let s = window.inner_size();
                let surface = Size2D::new(s.width.max(1), s.height.max(1));

                test_frame(frame_index, &mut pixels);
                let data = as_bytes(&pixels);
                let frame = VideoFrame {
                    data: &data,
                    width: FRAME_WIDTH,
                    height: FRAME_HEIGHT,
                    pitch: FRAME_WIDTH as usize * 4,
                    format: FrameFormat::Xrgb8888,
                };
                if let Err(e) = video.frame(&frame, surface) {
                    tracing::error!(error = %e, "frame failed");
                }
                frame_index += 1;

                if let Err(e) = gl_surface.swap_buffers(&gl_context) {
                    tracing::error!(error = %e, "swap_buffers failed");
                }
            }

            Event::LoopDestroyed => {
                if let Some(video) = video.take() {
                    let _gl = video.destroy();
                }
            }

            _ => {}
        }
    });
}

fn handle_key(video: &mut GlCoreVideo, key: VirtualKeyCode, preset: Option<&Path>) {
    match key {
        VirtualKeyCode::R => {
            let rotation = (video.config().rotation + 1) % 4;
            video.set_rotation(rotation);
            tracing::info!(rotation, "rotation");
        }
        VirtualKeyCode::A => {
            let keep = !video.config().keep_aspect;
            video.set_keep_aspect(keep);
            tracing::info!(keep_aspect = keep, "aspect");
        }
        VirtualKeyCode::I => {
            let integer = !video.config().integer_scale;
            video.set_integer_scale(integer);
            tracing::info!(integer_scale = integer, "integer scaling");
        }
        VirtualKeyCode::S => match video.set_shader(preset) {
            Ok(()) => tracing::info!(preset = ?preset, "shader reloaded"),
            Err(e) => tracing::warn!(error = %e, "reload failed, running stock chain"),
        },
        VirtualKeyCode::N => {
            if let Err(e) = video.set_shader(None) {
                tracing::warn!(error = %e, "stock chain failed");
            }
        }
        _ => {}
    }
}
