use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;

use glam::DVec2;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use windflow::{
    EngineConfig, EngineError, FieldError, GpuContext, LoadTicket, TickStatus,
    ViewState, WindData, WindEngine,
};

/// Upper bound for the particle count reached by repeated doubling.
const MAX_DEMO_PARTICLES: u32 = 1 << 22;

/// Command line of the viewer.
pub struct DemoArgs {
    pub image: PathBuf,
    pub meta: PathBuf,
    pub config: EngineConfig,
}

type LoadResult = (LoadTicket, Result<WindData, FieldError>);

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    engine: WindEngine,
    /// Our stand-in for a basemap: pan and zoom drive the field alignment.
    view: Option<ViewState>,
    frames: u32,
    last_report: Instant,
}

impl GpuState {
    pub async fn new(window: Arc<Window>, config: EngineConfig) -> Result<Self, EngineError> {
        let size = window.inner_size();
        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(window)
            .map_err(windflow::GpuError::from)?;
        let gpu = GpuContext::new(instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&gpu.adapter);
        // Trails are blended in linear byte space; an sRGB target would
        // re-encode them on write.
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);

        let engine = WindEngine::new(
            gpu,
            surface_format,
            (surface_config.width, surface_config.height),
            config,
        )?;

        Ok(Self {
            surface,
            config: surface_config,
            engine,
            view: None,
            frames: 0,
            last_report: Instant::now(),
        })
    }

    fn canvas(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(self.engine.device(), &self.config);
            self.engine.resize((new_size.width, new_size.height));
        }
    }

    fn apply_field(&mut self, ticket: LoadTicket, wind: WindData) {
        match self.engine.set_wind_ticketed(ticket, &wind) {
            Ok(true) => {
                if self.view.is_none() {
                    if let Some(extent) = wind.meta().extent {
                        self.set_view(ViewState::fit(&extent, self.canvas()));
                    }
                }
            }
            Ok(false) => {}
            Err(e) => log::error!("Failed to upload field: {}", e),
        }
    }

    fn set_view(&mut self, view: ViewState) {
        self.view = Some(view);
        self.engine.set_view(view);
    }

    fn pan(&mut self, dx: f64, dy: f64) {
        if let Some(mut view) = self.view {
            view.pan(dx, dy);
            self.set_view(view);
        }
    }

    fn zoom(&mut self, factor: f64, anchor: DVec2) {
        let canvas = self.canvas();
        if let Some(mut view) = self.view {
            view.zoom(factor, anchor, canvas);
            self.set_view(view);
        }
    }

    fn double_particles(&mut self) {
        let requested = self
            .engine
            .params()
            .num_particles
            .saturating_mul(2)
            .min(MAX_DEMO_PARTICLES);
        if let Err(e) = self.engine.reconfigure_particle_count(requested) {
            log::error!("Cannot grow particle count: {}", e);
        }
    }

    fn toggle_latitude_correction(&mut self) {
        let enabled = !self.engine.params().latitude_correction;
        self.engine.set_latitude_correction(enabled);
        log::info!(
            "Latitude correction {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if self.engine.draw(&view) == TickStatus::SkippedNoField {
            clear(&self.engine, &view);
        }
        output.present();

        self.frames += 1;
        let elapsed = self.last_report.elapsed().as_secs_f32();
        if elapsed >= 5.0 {
            log::debug!(
                "{:.1} fps, {} particles, {} ticks",
                self.frames as f32 / elapsed,
                self.engine.num_particles(),
                self.engine.ticks_since_init()
            );
            self.frames = 0;
            self.last_report = Instant::now();
        }
        Ok(())
    }
}

/// Frame shown until the first field arrives.
fn clear(engine: &WindEngine, view: &wgpu::TextureView) {
    let mut encoder = engine
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Clear Encoder"),
        });
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Clear Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
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
    engine.queue().submit(std::iter::once(encoder.finish()));
}

pub struct App {
    args: DemoArgs,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    loads_tx: Sender<LoadResult>,
    loads_rx: Receiver<LoadResult>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    cursor: DVec2,
}

impl App {
    pub fn new(args: DemoArgs) -> Self {
        let (loads_tx, loads_rx) = mpsc::channel();
        Self {
            args,
            window: None,
            gpu_state: None,
            loads_tx,
            loads_rx,
            mouse_pressed: false,
            last_mouse_pos: None,
            cursor: DVec2::ZERO,
        }
    }

    /// Decode the field files on a worker thread; the result is applied at
    /// the next tick boundary.
    fn start_load(&mut self) {
        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };
        let ticket = gpu_state.engine.begin_wind_load();
        let (image, meta) = (self.args.image.clone(), self.args.meta.clone());
        let tx = self.loads_tx.clone();
        log::info!("Loading field #{} from {}", ticket.id(), image.display());
        std::thread::spawn(move || {
            let result = WindData::from_files(&image, &meta);
            // The receiver only goes away when the app exits.
            let _ = tx.send((ticket, result));
        });
    }

    fn drain_loads(&mut self) {
        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };
        while let Ok((ticket, result)) = self.loads_rx.try_recv() {
            match result {
                Ok(wind) => gpu_state.apply_field(ticket, wind),
                Err(e) => log::error!("Field load #{} failed: {}", ticket.id(), e),
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("windflow")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        match pollster::block_on(GpuState::new(window, self.args.config.clone())) {
            Ok(state) => {
                self.gpu_state = Some(state);
                self.start_load();
            }
            Err(e) => {
                log::error!("{}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                match code {
                    KeyCode::Escape => event_loop.exit(),
                    KeyCode::KeyF => self.start_load(),
                    KeyCode::KeyR => {
                        if let Some(gpu_state) = &mut self.gpu_state {
                            gpu_state.double_particles();
                        }
                    }
                    KeyCode::KeyL => {
                        if let Some(gpu_state) = &mut self.gpu_state {
                            gpu_state.toggle_latitude_correction();
                        }
                    }
                    _ => {}
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = DVec2::new(position.x, position.y);
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        if let Some(gpu_state) = &mut self.gpu_state {
                            gpu_state.pan(position.x - last_x, position.y - last_y);
                        }
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y as f64,
                    MouseScrollDelta::PixelDelta(pos) => pos.y * 0.1,
                };
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.zoom(1.1f64.powf(scroll), self.cursor);
                }
            }
            WindowEvent::RedrawRequested => {
                self.drain_loads();
                if let Some(gpu_state) = &mut self.gpu_state {
                    match gpu_state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost) => gpu_state.resize(winit::dpi::PhysicalSize {
                            width: gpu_state.config.width,
                            height: gpu_state.config.height,
                        }),
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => log::warn!("Render error: {:?}", e),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

