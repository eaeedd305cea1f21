use std::sync::Arc;

use raw_window_handle::RawWindowHandle;

use crate::context::GlContextOptions;
use crate::coords::{SurfaceBounds, SurfaceSize};
use crate::core::GraphicsRuntime;
use crate::device::{BackendKind, DeviceOptions, GraphicsDevice, RenderDevice};
use crate::error::{Error, Result};
use crate::platform::{EmbeddedSurface, NativeSurfaceHandle};
use crate::render::{LoopConfig, LoopState, RenderLoop, RenderLoopHandle, Renderer};

/// Device constructor handed to the render worker.
pub type DeviceBuilder<D> = Box<dyn FnOnce() -> Result<D> + Send>;

/// Builds the per-surface device.
///
/// `prepare` runs on the UI thread, where native surfaces and shared contexts
/// may be touched. The builder it returns runs on the render worker.
pub trait DeviceFactory {
    type Device: RenderDevice + 'static;

    fn prepare(
        &self,
        runtime: &GraphicsRuntime,
        backend: BackendKind,
        surface: &EmbeddedSurface,
        size: SurfaceSize,
        config: &ViewConfig,
    ) -> Result<DeviceBuilder<Self::Device>>;
}

/// wgpu devices for every backend, glutin contexts for direct GL.
#[derive(Debug, Copy, Clone, Default)]
pub struct GraphicsDeviceFactory;

impl DeviceFactory for GraphicsDeviceFactory {
    type Device = GraphicsDevice;

    fn prepare(
        &self,
        runtime: &GraphicsRuntime,
        backend: BackendKind,
        surface: &EmbeddedSurface,
        size: SurfaceSize,
        config: &ViewConfig,
    ) -> Result<DeviceBuilder<GraphicsDevice>> {
        let options = config.device.clone();

        if backend.is_direct_gl() {
            let root = runtime.shared_gl_root(&config.gl)?;
            let pending = root.create_render_context(surface, size, &config.gl)?;
            return Ok(Box::new(move || {
                let context = pending.activate()?;
                GraphicsDevice::create_gl(Box::new(context), &options)
            }));
        }

        let binding = surface.binding(backend)?;
        Ok(Box::new(move || GraphicsDevice::create(backend, binding, &options)))
    }
}

/// How a view reaches the GPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SurfacePath {
    /// The runtime's selected backend. Direct GL only when that is OpenGL.
    #[default]
    Auto,
    /// Direct OpenGL on a context shared with the root, whatever the runtime
    /// selected. Views on other paths keep working alongside it.
    DirectGl,
}

impl SurfacePath {
    /// The backend a view on this path renders with.
    pub fn backend_for(self, selected: BackendKind) -> BackendKind {
        match self {
            SurfacePath::Auto => selected,
            SurfacePath::DirectGl => BackendKind::OpenGl,
        }
    }
}

/// Settings for one embedded view.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub path: SurfacePath,
    pub device: DeviceOptions,
    pub loop_config: LoopConfig,
    pub gl: GlContextOptions,
    pub initially_visible: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            path: SurfacePath::Auto,
            device: DeviceOptions::default(),
            loop_config: LoopConfig::default(),
            gl: GlContextOptions::default(),
            initially_visible: true,
        }
    }
}

/// A GPU surface embedded in one host control.
///
/// All methods are meant for the host's UI thread. Drawing happens on the
/// view's render worker, started by [`EmbeddedView::create_child_handle`].
pub struct EmbeddedView<R, F = GraphicsDeviceFactory> {
    runtime: Arc<GraphicsRuntime>,
    factory: F,
    config: ViewConfig,
    renderer: Option<R>,
    on_load: Option<Box<dyn FnOnce() + Send>>,

    bounds: SurfaceBounds,
    visible: bool,
    closed: bool,

    // The loop is always joined before the surface is destroyed.
    render_loop: Option<RenderLoopHandle>,
    surface: Option<EmbeddedSurface>,
}

impl<R> EmbeddedView<R>
where
    R: Renderer<GraphicsDevice> + 'static,
{
    pub fn new(runtime: Arc<GraphicsRuntime>, renderer: R, config: ViewConfig) -> Self {
        Self::with_factory(runtime, renderer, GraphicsDeviceFactory, config)
    }
}

impl<R, F> EmbeddedView<R, F>
where
    F: DeviceFactory,
    R: Renderer<F::Device> + 'static,
{
    pub fn with_factory(runtime: Arc<GraphicsRuntime>, renderer: R, factory: F, config: ViewConfig) -> Self {
        Self {
            runtime,
            factory,
            visible: config.initially_visible,
            config,
            renderer: Some(renderer),
            on_load: None,
            bounds: SurfaceBounds::default(),
            closed: false,
            render_loop: None,
            surface: None,
        }
    }

    /// Creates the native child surface under `parent` and starts rendering.
    ///
    /// Calling it again (the host recreated or reparented its control) returns
    /// the existing handle; GPU state is never rebuilt for the same view.
    pub fn create_child_handle(&mut self, parent: RawWindowHandle) -> Result<NativeSurfaceHandle> {
        if self.closed {
            return Err(Error::Closed);
        }
        if let Some(handle) = self.surface.as_ref().and_then(EmbeddedSurface::handle) {
            log::debug!("reusing surface {handle:?}");
            return Ok(handle);
        }

        let backend = self.config.path.backend_for(self.runtime.backend());
        let surface = EmbeddedSurface::create(self.runtime.provider().clone(), parent, backend.is_direct_gl())?;
        surface.resize(self.bounds)?;

        let size = self.bounds.physical_size();
        let make_device = self
            .factory
            .prepare(&self.runtime, backend, &surface, size, &self.config)?;
        let renderer = self.renderer.take().ok_or(Error::Closed)?;

        let mut builder = RenderLoop::new(self.config.loop_config.clone())
            .initial_size(size)
            .scale_factor(self.bounds.scale_factor())
            .visible(self.visible);
        builder.set_on_load(self.on_load.take());
        let render_loop = builder.spawn(make_device, renderer)?;

        let handle = surface
            .handle()
            .ok_or_else(|| Error::context_state("surface destroyed during creation"))?;
        log::debug!("{} started for {handle:?} on {backend}", render_loop.name());

        self.surface = Some(surface);
        self.render_loop = Some(render_loop);
        Ok(handle)
    }
}

impl<R, F> EmbeddedView<R, F> {
    /// Registers a callback run once the renderer is prepared.
    ///
    /// Only takes effect before the child handle is created.
    pub fn on_load(&mut self, callback: impl FnOnce() + Send + 'static) {
        if self.render_loop.is_some() {
            log::warn!("on_load registered after the view started; ignored");
            return;
        }
        self.on_load = Some(Box::new(callback));
    }

    pub fn runtime(&self) -> &Arc<GraphicsRuntime> {
        &self.runtime
    }

    /// The live native handle, if the view was created and not yet closed.
    pub fn handle(&self) -> Option<NativeSurfaceHandle> {
        self.surface.as_ref().and_then(EmbeddedSurface::handle)
    }

    pub fn bounds(&self) -> SurfaceBounds {
        self.bounds
    }

    pub fn on_attach(&mut self) {
        self.set_visible(true);
    }

    /// Hides the view. Nothing is released; the loop just stops drawing.
    pub fn on_detach(&mut self) {
        self.set_visible(false);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if let Some(render_loop) = &self.render_loop {
            render_loop.set_visible(visible);
        }
    }

    /// Applies host bounds in logical pixels.
    pub fn on_bounds_changed(&mut self, width: f64, height: f64, scale_factor: f64) -> Result<()> {
        self.apply_bounds(SurfaceBounds::new(width, height, scale_factor).with_origin(self.bounds.x, self.bounds.y))
    }

    /// Resizes to `width` x `height` physical pixels at the current scale.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let bounds = SurfaceBounds::from_physical(SurfaceSize::new(width, height), self.bounds.scale)
            .with_origin(self.bounds.x, self.bounds.y);
        self.apply_bounds(bounds)
    }

    /// The loop sees the new size even when the native resize fails.
    fn apply_bounds(&mut self, bounds: SurfaceBounds) -> Result<()> {
        self.bounds = bounds;
        if let Some(render_loop) = &self.render_loop {
            render_loop.set_scale_factor(bounds.scale_factor());
            render_loop.resize(bounds.physical_size());
        }
        match &self.surface {
            Some(surface) => surface.resize(bounds),
            None => Ok(()),
        }
    }

    /// Requests teardown and returns immediately.
    pub fn close(&mut self) {
        self.closed = true;
        if let Some(render_loop) = &self.render_loop {
            render_loop.close();
        }
    }

    pub fn status(&self) -> LoopState {
        match &self.render_loop {
            Some(render_loop) => render_loop.state(),
            None if self.closed => LoopState::Disposed,
            None => LoopState::Created,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.status() == LoopState::Disposed
    }

    pub fn frames_rendered(&self) -> u64 {
        self.render_loop.as_ref().map_or(0, RenderLoopHandle::frames_rendered)
    }

    /// Waits for the render worker, then destroys the native surface.
    ///
    /// Must run on the UI thread: native windows and views are released here,
    /// never on the worker. Returns the worker's error, if any.
    pub fn finish_close(&mut self) -> Result<()> {
        self.close();

        let worker = match self.render_loop.as_mut() {
            Some(render_loop) => render_loop.wait_disposed(),
            None => Ok(()),
        };

        let native = match self.surface.take() {
            Some(surface) => surface.destroy().map(|_| ()),
            None => Ok(()),
        };

        worker.and(native)
    }
}

impl<R, F> Drop for EmbeddedView<R, F> {
    fn drop(&mut self) {
        if let Err(e) = self.finish_close() {
            log::error!("embedded view teardown failed: {e:#}");
        }
    }
}

impl<R, F> std::fmt::Debug for EmbeddedView<R, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedView")
            .field("status", &self.status())
            .field("bounds", &self.bounds)
            .field("visible", &self.visible)
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::device::{BackendSelector, FixedProbe};
    use crate::platform::testing::RecordingProvider;
    use crate::platform::SurfaceProvider;
    use crate::render::{FrameErrorPolicy, FrameInfo};

    #[derive(Default)]
    struct Probe {
        prepared: AtomicUsize,
        backends: Mutex<Vec<BackendKind>>,
        sizes: Mutex<Vec<SurfaceSize>>,
        disposed: AtomicUsize,
        // Native releases already done when the device was disposed.
        releases_at_dispose: Mutex<Option<usize>>,
    }

    struct FakeDevice {
        chain: Option<SurfaceSize>,
        probe: Arc<Probe>,
        provider: Arc<RecordingProvider>,
    }

    impl RenderDevice for FakeDevice {
        fn backend(&self) -> BackendKind {
            BackendKind::Vulkan
        }

        fn chain_size(&self) -> Option<SurfaceSize> {
            self.chain
        }

        fn ensure_chain(&mut self, size: SurfaceSize) -> Result<()> {
            self.chain = Some(size);
            Ok(())
        }

        fn dispose(&mut self) -> Result<()> {
            self.probe.disposed.fetch_add(1, Ordering::SeqCst);
            *self.probe.releases_at_dispose.lock().unwrap() = Some(self.provider.released());
            Ok(())
        }
    }

    struct FakeFactory {
        probe: Arc<Probe>,
        provider: Arc<RecordingProvider>,
    }

    impl DeviceFactory for FakeFactory {
        type Device = FakeDevice;

        fn prepare(
            &self,
            _runtime: &GraphicsRuntime,
            backend: BackendKind,
            surface: &EmbeddedSurface,
            _size: SurfaceSize,
            _config: &ViewConfig,
        ) -> Result<DeviceBuilder<FakeDevice>> {
            assert!(!surface.is_destroyed());
            self.probe.prepared.fetch_add(1, Ordering::SeqCst);
            self.probe.backends.lock().unwrap().push(backend);
            let probe = Arc::clone(&self.probe);
            let provider = Arc::clone(&self.provider);
            Ok(Box::new(move || {
                Ok(FakeDevice {
                    chain: None,
                    probe,
                    provider,
                })
            }))
        }
    }

    struct SizeRecorder(Arc<Probe>);

    impl Renderer<FakeDevice> for SizeRecorder {
        fn render_frame(&mut self, _device: &mut FakeDevice, frame: &FrameInfo) -> anyhow::Result<()> {
            self.0.sizes.lock().unwrap().push(frame.size);
            Ok(())
        }
    }

    struct Fixture {
        provider: Arc<RecordingProvider>,
        probe: Arc<Probe>,
        view: EmbeddedView<SizeRecorder, FakeFactory>,
    }

    impl Fixture {
        fn new(backends: &[BackendKind]) -> Self {
            Self::on_path(backends, SurfacePath::Auto)
        }

        fn on_path(backends: &[BackendKind], path: SurfacePath) -> Self {
            let provider = Arc::new(RecordingProvider::default());
            let dyn_provider: Arc<dyn SurfaceProvider> = provider.clone();
            let selector = BackendSelector::with_preference(Box::new(FixedProbe::new(backends)), None);
            let runtime = Arc::new(GraphicsRuntime::with_selector(dyn_provider, selector));

            let probe = Arc::new(Probe::default());
            let factory = FakeFactory {
                probe: Arc::clone(&probe),
                provider: Arc::clone(&provider),
            };
            let config = ViewConfig {
                path,
                loop_config: LoopConfig {
                    target_frame_rate: 0,
                    zero_area_poll: Duration::from_millis(1),
                    hidden_poll: Duration::from_millis(1),
                    error_policy: FrameErrorPolicy::Terminate,
                },
                ..ViewConfig::default()
            };
            let view = EmbeddedView::with_factory(runtime, SizeRecorder(Arc::clone(&probe)), factory, config);
            Self { provider, probe, view }
        }

        fn frames(&self) -> usize {
            self.probe.sizes.lock().unwrap().len()
        }
    }

    fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn full_lifecycle() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        fx.view.on_bounds_changed(200.0, 100.0, 1.0).unwrap();
        assert_eq!(fx.view.status(), LoopState::Created);

        let handle = fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        assert_eq!(fx.view.handle(), Some(handle));
        assert_eq!(fx.provider.created(), 1);
        assert_eq!(fx.provider.last_resize(), Some(SurfaceBounds::new(200.0, 100.0, 1.0)));

        wait_until("first frames", || fx.frames() >= 2);
        assert_eq!(fx.probe.sizes.lock().unwrap()[0], SurfaceSize::new(200, 100));

        fx.view.on_bounds_changed(400.0, 300.0, 2.0).unwrap();
        assert_eq!(fx.provider.last_resize(), Some(SurfaceBounds::new(400.0, 300.0, 2.0)));
        wait_until("rescaled frames", || {
            fx.probe.sizes.lock().unwrap().contains(&SurfaceSize::new(800, 600))
        });

        fx.view.finish_close().unwrap();
        assert!(fx.view.is_disposed());
        assert_eq!(fx.view.handle(), None);
        assert_eq!(fx.provider.released(), 1);
        assert_eq!(fx.probe.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(*fx.probe.releases_at_dispose.lock().unwrap(), Some(0));
    }

    #[test]
    fn recreated_parent_reuses_the_surface() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        let first = fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        let second = fx.view.create_child_handle(RecordingProvider::parent()).unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.provider.created(), 1);
        assert_eq!(fx.probe.prepared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn direct_gl_asks_for_an_owned_window() {
        let mut fx = Fixture::new(&[BackendKind::OpenGl]);
        let handle = fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        assert!(handle.is_owned());

        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        let handle = fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        assert!(!handle.is_owned());
    }

    #[test]
    fn direct_gl_views_ignore_the_selected_backend() {
        let mut fx = Fixture::on_path(&[BackendKind::Vulkan], SurfacePath::DirectGl);
        let handle = fx.view.create_child_handle(RecordingProvider::parent()).unwrap();

        assert!(handle.is_owned());
        assert_eq!(fx.view.runtime().backend(), BackendKind::Vulkan);
        assert_eq!(*fx.probe.backends.lock().unwrap(), vec![BackendKind::OpenGl]);
    }

    #[test]
    fn auto_path_follows_the_runtime() {
        assert_eq!(SurfacePath::Auto.backend_for(BackendKind::Metal), BackendKind::Metal);
        assert_eq!(SurfacePath::DirectGl.backend_for(BackendKind::Metal), BackendKind::OpenGl);

        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        assert_eq!(*fx.probe.backends.lock().unwrap(), vec![BackendKind::Vulkan]);
    }

    #[test]
    fn failed_native_resize_still_reaches_the_loop() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        fx.view.resize(32, 32).unwrap();
        fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        wait_until("frames", || fx.frames() >= 1);

        fx.provider.reject_resizes();
        let err = fx.view.resize(48, 24).unwrap_err();
        assert!(matches!(err, Error::NativeApi { .. }));
        assert_eq!(fx.view.bounds().physical_size(), SurfaceSize::new(48, 24));
        wait_until("resized frames", || {
            fx.probe.sizes.lock().unwrap().contains(&SurfaceSize::new(48, 24))
        });
    }

    #[test]
    fn detach_pauses_without_releasing() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        fx.view.resize(64, 64).unwrap();
        fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        wait_until("frames", || fx.frames() >= 1);

        fx.view.on_detach();
        wait_until("idle", || fx.view.status() == LoopState::Idle);
        let paused_at = fx.frames();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(fx.frames(), paused_at);
        assert_eq!(fx.provider.released(), 0);
        assert_eq!(fx.probe.disposed.load(Ordering::SeqCst), 0);

        fx.view.on_attach();
        wait_until("resumed frames", || fx.frames() > paused_at);
    }

    #[test]
    fn zero_bounds_never_draw() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        wait_until("idle", || fx.view.status() == LoopState::Idle);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(fx.frames(), 0);
    }

    #[test]
    fn on_load_runs_once() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        let loaded = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loaded);
        fx.view.on_load(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        fx.view.create_child_handle(RecordingProvider::parent()).unwrap();

        wait_until("on_load", || loaded.load(Ordering::SeqCst) == 1);
        fx.view.finish_close().unwrap();
        assert_eq!(loaded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_views_cannot_be_recreated() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        fx.view.create_child_handle(RecordingProvider::parent()).unwrap();
        fx.view.close();
        fx.view.finish_close().unwrap();
        fx.view.finish_close().unwrap();

        let err = fx.view.create_child_handle(RecordingProvider::parent()).unwrap_err();
        assert!(matches!(err, Error::Closed));
        assert_eq!(fx.provider.created(), 1);
        assert_eq!(fx.provider.released(), 1);
    }

    #[test]
    fn dropping_the_view_tears_everything_down() {
        let fx = Fixture::new(&[BackendKind::Vulkan]);
        let Fixture { provider, probe, mut view } = fx;
        view.resize(32, 32).unwrap();
        view.create_child_handle(RecordingProvider::parent()).unwrap();
        wait_until("frames", || !probe.sizes.lock().unwrap().is_empty());

        drop(view);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(provider.released(), 1);
    }

    #[test]
    fn unstarted_view_closes_cleanly() {
        let mut fx = Fixture::new(&[BackendKind::Vulkan]);
        fx.view.finish_close().unwrap();
        assert!(fx.view.is_disposed());
        assert_eq!(fx.provider.created(), 0);
    }
}
