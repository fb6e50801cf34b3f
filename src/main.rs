//! Particle Canvas
//!
//! A million particles simulated on CPU worker threads, each frame painted
//! into a pixel canvas and shown in a window. Hold the left mouse button (or
//! touch) to push particles away; they spring back to where they spawned.

mod surface;

use anyhow::Context;
use crossbeam::channel::{bounded, Receiver, Sender};
use particle_renderer::CanvasRenderer;
use particle_simulation::{
    CanvasSnapshot, EngineConfig, FrameCoordinator, PointerEvent, StepOutcome,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use surface::WindowSurface;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const PARTICLE_COUNT: usize = 1_000_000;
const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 800;
/// Finished canvases waiting for the render loop; older frames are dropped
const PRESENT_QUEUE_DEPTH: usize = 2;
const FPS_WINDOW: usize = 60;

/// Pointer id of the left mouse button; touches are offset past it
const MOUSE_POINTER: u64 = 0;

struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: CanvasRenderer,

    last_frame_time: Instant,
    frame_times: VecDeque<f32>,
}

impl GpuState {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;

        log::info!("✓ Using GPU: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to open GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no texture formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .context("surface reports no alpha modes")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = CanvasRenderer::new(&device, surface_format);
        log::info!("✓ Renderer initialized");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            renderer,
            last_frame_time: Instant::now(),
            frame_times: VecDeque::with_capacity(FPS_WINDOW),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Draw the newest canvas, returning `(fps, frame time in ms)`
    fn render(
        &mut self,
        snapshot: Option<&CanvasSnapshot>,
    ) -> Result<(f32, f32), wgpu::SurfaceError> {
        let now = Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f32() * 1000.0;
        self.last_frame_time = now;

        if self.frame_times.len() == FPS_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        let avg_frame_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        let fps = if avg_frame_time > 0.0 {
            1000.0 / avg_frame_time
        } else {
            0.0
        };

        if let Some(snapshot) = snapshot {
            self.renderer.upload(&self.device, &self.queue, snapshot);
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.renderer.render(&self.device, &self.queue, &view);
        output.present();

        Ok((fps, avg_frame_time))
    }
}

struct App {
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    coordinator: Option<FrameCoordinator>,
    frame_sender: Sender<CanvasSnapshot>,
    frames: Receiver<CanvasSnapshot>,
    start: Instant,

    mouse_pressed: bool,
    last_cursor_pos: Option<PhysicalPosition<f64>>,
}

impl App {
    fn new() -> Self {
        let (frame_sender, frames) = bounded(PRESENT_QUEUE_DEPTH);
        Self {
            window: None,
            gpu_state: None,
            coordinator: None,
            frame_sender,
            frames,
            start: Instant::now(),
            mouse_pressed: false,
            last_cursor_pos: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("Particle Canvas")
            .with_inner_size(winit::dpi::PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("failed to create window")?,
        );
        let gpu_state = pollster::block_on(GpuState::new(window.clone()))?;

        let surface = WindowSurface::new(self.frame_sender.clone(), window.clone());
        let mut coordinator = FrameCoordinator::new(EngineConfig::default(), Arc::new(surface))
            .context("failed to start simulation workers")?;

        let size = window.inner_size();
        if let Err(e) = coordinator.configure(PARTICLE_COUNT, size.width, size.height) {
            log::warn!("initial configuration skipped: {e}");
        }

        window.request_redraw();
        self.window = Some(window);
        self.gpu_state = Some(gpu_state);
        self.coordinator = Some(coordinator);
        Ok(())
    }

    fn pointer(&mut self, event: PointerEvent) {
        if let Some(coordinator) = &mut self.coordinator {
            coordinator.handle_pointer(event);
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(gpu_state)) = (&self.window, &mut self.gpu_state) else {
            return;
        };

        let latest = self.frames.try_iter().last();
        match gpu_state.render(latest.as_ref()) {
            Ok((fps, frame_time)) => {
                window.set_title(&format!(
                    "Particle Canvas - {:.0} FPS ({:.2}ms) - {} particles",
                    fps, frame_time, PARTICLE_COUNT
                ));
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu_state.resize(window.inner_size())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory");
                event_loop.exit();
                return;
            }
            Err(e) => log::warn!("render error: {e:?}"),
        }

        // The next redraw is requested by the surface once this frame is presented.
        if let Some(coordinator) = &mut self.coordinator {
            if !coordinator.is_frame_in_flight() {
                let outcome = coordinator.step(self.start.elapsed().as_secs_f64());
                if outcome == StepOutcome::Unconfigured {
                    log::trace!("waiting for a non-empty window before stepping");
                }
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                log::error!("startup failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::Resized(physical_size) => {
                log::debug!("resized to {}x{}", physical_size.width, physical_size.height);
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
                if let Some(coordinator) = &mut self.coordinator {
                    if let Err(e) =
                        coordinator.configure(PARTICLE_COUNT, physical_size.width, physical_size.height)
                    {
                        log::warn!("keeping previous configuration: {e}");
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.mouse_pressed = state == ElementState::Pressed;
                match (self.mouse_pressed, self.last_cursor_pos) {
                    (true, Some(position)) => self.pointer(PointerEvent::Down {
                        id: MOUSE_POINTER,
                        x: position.x as f32,
                        y: position.y as f32,
                    }),
                    (false, _) => self.pointer(PointerEvent::Up { id: MOUSE_POINTER }),
                    (true, None) => {}
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.last_cursor_pos = Some(position);
                if self.mouse_pressed {
                    self.pointer(PointerEvent::Move {
                        id: MOUSE_POINTER,
                        x: position.x as f32,
                        y: position.y as f32,
                    });
                }
            }

            WindowEvent::CursorLeft { .. } => {
                self.last_cursor_pos = None;
            }

            WindowEvent::Touch(Touch {
                phase, location, id, ..
            }) => {
                let id = id.wrapping_add(1);
                let (x, y) = (location.x as f32, location.y as f32);
                self.pointer(match phase {
                    TouchPhase::Started => PointerEvent::Down { id, x, y },
                    TouchPhase::Moved => PointerEvent::Move { id, x, y },
                    TouchPhase::Ended | TouchPhase::Cancelled => PointerEvent::Up { id },
                });
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting particle canvas with {PARTICLE_COUNT} particles...");

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new();
    event_loop.run_app(&mut app).context("event loop failed")?;
    Ok(())
}
