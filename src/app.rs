use crate::config::DisplayConfig;
use anyhow::{anyhow, Result};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use ssvep_engine::{EngineContext, StimulusEngine};
use ssvep_render::{load_font, FrameStats, SkiaRenderer};
use ssvep_timing::HighPrecisionTimer;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

const WINDOWED_WIDTH: u32 = 1280;
const WINDOWED_HEIGHT: u32 = 720;

pub struct App {
    config: DisplayConfig,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    engine: StimulusEngine<HighPrecisionTimer, ThreadRng>,
    renderer: Option<SkiaRenderer>,
    render_timer: HighPrecisionTimer,
    last_stats: FrameStats,
    scale_factor: f64,
    refresh_rate: Option<f64>,

    fatal: Option<anyhow::Error>,
    closed: bool,
}

impl App {
    pub fn new(config: DisplayConfig, ctx: Arc<EngineContext>) -> Self {
        let engine = StimulusEngine::new(
            ctx,
            config.engine.clone(),
            HighPrecisionTimer::new(),
            rand::rng(),
        );
        Self {
            config,
            window: None,
            pixels: None,
            engine,
            renderer: None,
            render_timer: HighPrecisionTimer::new(),
            last_stats: FrameStats::default(),
            scale_factor: 1.0,
            refresh_rate: None,
            fatal: None,
            closed: false,
        }
    }

    /// Runs the event loop until Escape, window close or a shutdown request.
    /// A lost drawing surface ends the loop with an error.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            "Platform: {} ({}); press ESC to exit",
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        event_loop.run_app(&mut self)?;

        match self.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next());
        self.refresh_rate = monitor
            .as_ref()
            .and_then(|m| m.refresh_rate_millihertz())
            .map(|rate| rate as f64 / 1000.0);

        let mut window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_resizable(!self.config.fullscreen);
        window_attributes = if self.config.fullscreen {
            window_attributes.with_fullscreen(Some(Fullscreen::Borderless(monitor)))
        } else {
            window_attributes.with_inner_size(PhysicalSize::new(WINDOWED_WIDTH, WINDOWED_HEIGHT))
        };

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        self.scale_factor = window.scale_factor();

        info!(
            "Display: {}x{} physical, scale {:.2}, refresh {}",
            width,
            height,
            self.scale_factor,
            self.refresh_rate
                .map_or_else(|| "unknown".to_string(), |hz| format!("{hz:.1} Hz"))
        );

        let surface_texture = SurfaceTexture::new(width, height, Arc::clone(&window));
        self.pixels = Some(Pixels::new(width, height, surface_texture)?);

        let font = load_font(self.config.font.as_deref());
        if font.is_none() {
            warn!("no usable font found, text overlays are disabled");
        }
        self.renderer = Some(SkiaRenderer::new(width, height, font)?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// One engine step and one presented frame.
    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let frame = self.engine.tick();
        self.last_stats = renderer.render_frame(&frame, pixels.frame_mut(), &mut self.render_timer)?;
        pixels
            .render()
            .map_err(|e| anyhow!("presenting frame failed: {e}"))?;
        Ok(())
    }

    fn handle_input(&mut self, key: &Key, event_loop: &ActiveEventLoop) {
        match key {
            Key::Named(NamedKey::Escape) => self.cleanup_and_exit(event_loop),
            Key::Character(c) => self.engine.record_key(c.as_str()),
            Key::Named(named) => self.engine.record_key(&format!("{named:?}")),
            _ => {}
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) -> Result<()> {
        if new_size.width == 0 || new_size.height == 0 {
            return Ok(());
        }
        if let Some(pixels) = &mut self.pixels {
            pixels.resize_surface(new_size.width, new_size.height)?;
            pixels.resize_buffer(new_size.width, new_size.height)?;
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size.width, new_size.height)?;
        }
        info!("Display resized to: {}x{}", new_size.width, new_size.height);
        Ok(())
    }

    fn fail(&mut self, e: anyhow::Error, event_loop: &ActiveEventLoop) {
        error!("fatal: {:#}", e);
        if self.fatal.is_none() {
            self.fatal = Some(e);
        }
        self.cleanup_and_exit(event_loop);
    }

    /// Releases the surface before the window. Runs once however shutdown arrives.
    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.engine.context().request_shutdown();

        info!("Frame timing: {}", self.engine.frame_stats());
        if let Some(renderer) = &self.renderer {
            for (step, ms) in renderer.component_report() {
                info!("  {:<6} {:.3} ms", step, ms);
            }
        }
        debug!(
            "last frame: clear {:.3}ms, draw {:.3}ms, copy {:.3}ms, total {:.3}ms, {} patches",
            self.last_stats.clear.as_secs_f64() * 1e3,
            self.last_stats.draw.as_secs_f64() * 1e3,
            self.last_stats.copy.as_secs_f64() * 1e3,
            self.last_stats.total.as_secs_f64() * 1e3,
            self.last_stats.patches,
        );

        self.renderer = None;
        self.pixels = None;
        if let Some(window) = self.window.take() {
            window.set_cursor_visible(true);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && !self.closed {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(e.context("creating window and surface"), event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(e, event_loop);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_input(&event.logical_key, event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Err(e) = self.handle_resize(size) {
                    self.fail(e.context("resizing surface"), event_loop);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    if let Err(e) = self.handle_resize(size) {
                        self.fail(e.context("resizing surface"), event_loop);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.context().is_shutdown() {
            self.cleanup_and_exit(event_loop);
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        debug!("Application resources cleaned up");
    }
}
