use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::GfxConfig;
use crate::core::{App, AppControl, FrameClock, FrameCtx};
use crate::device::gpu::{GpuInit, SurfaceErrorAction, WgpuBackend};
use crate::draw::Gfx;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub gfx: GfxConfig,
    pub gpu: GpuInit,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "gametoy".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            gfx: GfxConfig::default(),
            gpu: GpuInit::default(),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and runs `app` until it exits or the window closes.
    ///
    /// Errors from setup and from app callbacks end the loop and are returned.
    pub fn run<A: App + 'static>(config: RuntimeConfig, app: A) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState { config, app, entry: None, failure: None };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// `Gfx` holds teardown callbacks over its backend, which makes it invariant in
// the window lifetime.
#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[not_covariant]
    gfx: Gfx<WgpuBackend<'this>>,
}

fn build_gfx<'w>(window: &'w Window, config: &RuntimeConfig) -> Result<Gfx<WgpuBackend<'w>>> {
    let backend = pollster::block_on(WgpuBackend::new(window, config.gpu.clone()))
        .context("GPU initialization failed for window")?;
    Gfx::new(backend, config.gfx.clone()).context("failed to create graphics context")
}

struct AppState<A: App + 'static> {
    config: RuntimeConfig,
    app: A,
    entry: Option<WindowEntry>,
    failure: Option<anyhow::Error>,
}

impl<A: App + 'static> AppState<A> {
    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let config = &self.config;
        let mut entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            gfx_builder: |w| build_gfx(w, config),
        }
        .try_build()?;

        let app = &mut self.app;
        entry
            .with_gfx_mut(|gfx| app.on_start(gfx))
            .context("app start failed")?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure.get_or_insert(err);
        self.entry = None;
        event_loop.exit();
    }

    fn redraw(&mut self) -> Result<AppControl> {
        let (app, Some(entry)) = (&mut self.app, self.entry.as_mut()) else {
            return Ok(AppControl::Continue);
        };

        entry.with_mut(|fields| -> Result<AppControl> {
            let time = fields.clock.tick();
            fields.window.pre_present_notify();

            let control = {
                let mut ctx = FrameCtx::new(fields.gfx, time);
                app.on_frame(&mut ctx)?
            };

            match fields.gfx.ctx_mut().backend_mut().take_surface_status() {
                Some(SurfaceErrorAction::Fatal) => anyhow::bail!("surface is no longer usable"),
                Some(SurfaceErrorAction::Reconfigured) => fields.clock.reset(),
                _ => {}
            }
            Ok(control)
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let Some(entry) = self.entry.as_mut() else {
            return Ok(());
        };
        entry
            .with_gfx_mut(|gfx| gfx.resize(width, height))
            .context("resize failed")?;
        entry.with_window(|w| w.request_redraw());
        Ok(())
    }
}

impl<A: App + 'static> ApplicationHandler for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        if let Err(err) = self.create_window_entry(event_loop) {
            self.fail(event_loop, err.context("failed to create initial window"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw.
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.app.on_window_event(&event) == AppControl::Exit {
            self.entry = None;
            event_loop.exit();
            return;
        }

        let res = match event {
            WindowEvent::CloseRequested => {
                self.entry = None;
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self.entry.as_ref().map(|e| e.with_window(|w| w.inner_size()));
                match size {
                    Some(size) => self.resize(size.width, size.height),
                    None => Ok(()),
                }
            }
            WindowEvent::RedrawRequested => match self.redraw() {
                Ok(AppControl::Exit) => {
                    self.entry = None;
                    event_loop.exit();
                    Ok(())
                }
                Ok(AppControl::Continue) => Ok(()),
                Err(err) => Err(err.context("frame failed")),
            },
            _ => Ok(()),
        };

        if let Err(err) = res {
            self.fail(event_loop, err);
        }
    }
}
