//! Hosts a single embedded inlay surface inside a plain winit window.
//!
//! The window stands in for a UI toolkit's control: the demo forwards its
//! resize, scale and occlusion events to the view the way a host would.

use std::sync::Arc;

use anyhow::{Context, Result};
use raw_window_handle::HasWindowHandle;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use inlay_engine::core::GraphicsRuntime;
use inlay_engine::embed::{EmbeddedView, ViewConfig};
use inlay_engine::logging::{LoggingConfig, init_logging};
use inlay_engine::paint::Color;
use inlay_engine::render::ClearRenderer;

struct Host {
    runtime: Arc<GraphicsRuntime>,
    window: Option<Window>,
    view: Option<EmbeddedView<ClearRenderer>>,
    failed: bool,
}

impl Host {
    fn new(runtime: Arc<GraphicsRuntime>) -> Self {
        Self {
            runtime,
            window: None,
            view: None,
            failed: false,
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("inlay demo")
            .with_inner_size(LogicalSize::new(960.0, 540.0));
        let window = event_loop
            .create_window(attrs)
            .context("failed to create host window")?;

        let mut view = EmbeddedView::new(
            self.runtime.clone(),
            ClearRenderer::new(Color::from_u8(40, 44, 52, 255)),
            ViewConfig::default(),
        );
        view.on_load(|| log::info!("embedded surface ready"));

        apply_bounds(&mut view, window.inner_size(), window.scale_factor())?;
        let parent = window
            .window_handle()
            .context("host window has no native handle")?
            .as_raw();
        let handle = view.create_child_handle(parent)?;
        log::info!("embedded {handle:?} on {}", self.runtime.backend());

        self.window = Some(window);
        self.view = Some(view);
        Ok(())
    }

    fn close_view(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.close();
            if let Err(e) = view.finish_close() {
                log::error!("{e:#}");
                self.failed = true;
            }
        }
    }
}

fn apply_bounds(view: &mut EmbeddedView<ClearRenderer>, size: PhysicalSize<u32>, scale: f64) -> Result<()> {
    let logical: LogicalSize<f64> = size.to_logical(scale);
    view.on_bounds_changed(logical.width, logical.height, scale)?;
    Ok(())
}

impl ApplicationHandler for Host {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        event_loop.set_control_flow(ControlFlow::Wait);

        if let Err(e) = self.open(event_loop) {
            log::error!("{e:#}");
            self.failed = true;
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let (Some(window), Some(view)) = (&self.window, &mut self.view) else {
            return;
        };

        let result = match event {
            WindowEvent::CloseRequested => {
                self.close_view();
                self.window = None;
                event_loop.exit();
                return;
            }
            WindowEvent::Resized(size) => apply_bounds(view, size, window.scale_factor()),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                apply_bounds(view, window.inner_size(), scale_factor)
            }
            WindowEvent::Occluded(true) => {
                view.on_detach();
                Ok(())
            }
            WindowEvent::Occluded(false) => {
                view.on_attach();
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::error!("{e:#}");
        }

        // A failed render worker shows up as a disposed view.
        if view.is_disposed() {
            log::error!("embedded surface stopped; closing");
            self.failed = true;
            self.close_view();
            event_loop.exit();
        }
    }
}

fn run() -> Result<bool> {
    let runtime = Arc::new(GraphicsRuntime::new()?);
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;

    let mut host = Host::new(runtime);
    event_loop
        .run_app(&mut host)
        .context("winit event loop terminated with error")?;

    host.close_view();
    let failed = host.failed;
    let Host { runtime, .. } = host;
    match Arc::try_unwrap(runtime) {
        Ok(runtime) => runtime.shutdown(),
        Err(_) => log::warn!("graphics runtime still shared at exit"),
    }
    Ok(!failed)
}

fn main() {
    init_logging(LoggingConfig::default());

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{e:#}");
            std::process::exit(1);
        }
    }
}
