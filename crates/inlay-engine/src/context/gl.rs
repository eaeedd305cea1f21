use std::ffi::{CStr, c_void};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    AsRawContext, ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext,
    NotCurrentGlContext, PossiblyCurrentContext, PossiblyCurrentGlContext, RawContext, Version,
};
use glutin::display::{Display, DisplayApiPreference, GlDisplay};
use glutin::surface::{GlSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use raw_window_handle::RawWindowHandle;

use crate::coords::SurfaceSize;
use crate::device::GlPlatform;
use crate::error::{Error, Result};
use crate::platform::{EmbeddedSurface, SurfaceProvider};

/// How make-current failures are reported.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ContextMode {
    /// Fail the operation with `Error::ContextState`.
    #[default]
    Strict,
    /// Log a warning and carry on.
    Lenient,
}

impl ContextMode {
    /// Turns a failed context operation into this mode's outcome.
    pub fn apply(self, what: String, source: Option<glutin::error::Error>) -> Result<()> {
        match self {
            ContextMode::Strict => Err(Error::ContextState {
                what,
                source: source.map(Into::into),
            }),
            ContextMode::Lenient => {
                match source {
                    Some(e) => log::warn!("{what}: {e}"),
                    None => log::warn!("{what}"),
                }
                Ok(())
            }
        }
    }
}

/// Parameters for the shared root context and every per-surface context.
#[derive(Debug, Clone)]
pub struct GlContextOptions {
    pub version: (u8, u8),
    pub compatibility_profile: bool,
    pub alpha_bits: u8,
    pub depth_bits: u8,
    pub stencil_bits: u8,
    pub debug: bool,
    pub mode: ContextMode,
}

impl Default for GlContextOptions {
    fn default() -> Self {
        Self {
            version: (3, 3),
            compatibility_profile: true,
            alpha_bits: 0,
            depth_bits: 16,
            stencil_bits: 0,
            debug: false,
            mode: ContextMode::Strict,
        }
    }
}

/// Size of the hidden window backing the root context.
pub const ROOT_SURFACE_SIZE: SurfaceSize = SurfaceSize::new(16, 16);

/// The process-wide GL context every per-surface context shares with.
///
/// Textures, buffers and programs created by any surface belong to this
/// share group, so they survive when a surface's own context is recreated.
/// The context is never current on any thread once construction returns.
pub struct SharedRootContext {
    context: Mutex<NotCurrentContext>,
    _surface: Mutex<Surface<WindowSurface>>,
    display: Display,
    // Last: the native window must outlive the GL objects above.
    offscreen: EmbeddedSurface,
}

impl SharedRootContext {
    /// Builds the root context on a hidden offscreen window.
    ///
    /// The context is made current once, which resolves its function table,
    /// and then released so it can be shared from any thread.
    pub fn create(provider: &Arc<dyn SurfaceProvider>, options: &GlContextOptions) -> Result<Self> {
        let offscreen = EmbeddedSurface::offscreen(provider.clone(), ROOT_SURFACE_SIZE)?;
        let window = offscreen
            .handle()
            .ok_or_else(|| Error::context_state("offscreen surface vanished"))?
            .raw_window_handle();

        let raw_display = provider.display_handle()?;
        // SAFETY: the display connection is owned by the provider, which the
        // runtime keeps alive longer than any GL object.
        let display = unsafe { Display::new(raw_display, display_preference(window)) }
            .map_err(|e| Error::native("failed to open GL display", e))?;

        let config = find_config(&display, window, options)?;
        let attributes = base_attributes(options).build(Some(window));
        let context = unsafe { display.create_context(&config, &attributes) }
            .map_err(|e| Error::native("failed to create shared root GL context", e))?;
        let surface = create_window_surface(&display, &config, window, ROOT_SURFACE_SIZE)?;

        let context = context
            .make_current(&surface)
            .map_err(|e| Error::context_failure("failed to make root context current", e))?
            .make_not_current()
            .map_err(|e| Error::context_failure("failed to release root context", e))?;

        log::info!("created shared root GL context ({})", display.version_string());

        Ok(Self {
            context: Mutex::new(context),
            _surface: Mutex::new(surface),
            display,
            offscreen,
        })
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// The hidden window the root context was created against.
    pub fn offscreen(&self) -> &EmbeddedSurface {
        &self.offscreen
    }

    /// Creates a context for `surface` in the root's share group.
    ///
    /// The context is made current once to validate it, then released. The
    /// returned value may move to the render worker, which activates it.
    pub fn create_render_context(
        &self,
        surface: &EmbeddedSurface,
        size: SurfaceSize,
        options: &GlContextOptions,
    ) -> Result<PendingRenderContext> {
        let window = surface
            .handle()
            .ok_or_else(|| Error::context_state("surface already destroyed"))?
            .raw_window_handle();

        let config = find_config(&self.display, window, options)?;
        let attributes = {
            let root = self.root();
            base_attributes(options)
                .with_sharing(&*root)
                .build(Some(window))
        };
        let context = unsafe { self.display.create_context(&config, &attributes) }
            .map_err(|e| Error::native("failed to create shared GL context", e))?;
        let gl_surface = create_window_surface(&self.display, &config, window, size.at_least_one())?;

        let context = context
            .make_current(&gl_surface)
            .map_err(|e| Error::context_failure("failed to make render context current", e))?
            .make_not_current()
            .map_err(|e| Error::context_failure("failed to release render context", e))?;

        Ok(PendingRenderContext {
            context,
            surface: gl_surface,
            display: self.display.clone(),
            mode: options.mode,
            owned_size: size,
        })
    }

    fn root(&self) -> MutexGuard<'_, NotCurrentContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SharedRootContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRootContext")
            .field("offscreen", &self.offscreen)
            .finish_non_exhaustive()
    }
}

/// A per-surface context that is not current anywhere yet.
///
/// Built on the UI thread, moved to the render worker, and turned into a
/// [`RenderContext`] there with [`PendingRenderContext::activate`].
pub struct PendingRenderContext {
    context: NotCurrentContext,
    surface: Surface<WindowSurface>,
    display: Display,
    mode: ContextMode,
    owned_size: SurfaceSize,
}

impl PendingRenderContext {
    /// Makes the context current on the calling thread, which becomes its owner.
    ///
    /// Always strict, whatever the mode: glutin consumes the context on a
    /// failed first make-current, so there is nothing left to carry on with.
    pub fn activate(self) -> Result<RenderContext> {
        let context = self
            .context
            .make_current(&self.surface)
            .map_err(|e| Error::context_failure("failed to activate render context", e))?;

        let owner = thread::current().id();
        log::debug!("render context activated on {owner:?}");

        Ok(RenderContext {
            context,
            surface: self.surface,
            display: self.display,
            owner,
            mode: self.mode,
            size: self.owned_size,
        })
    }
}

/// A per-surface context bound to the thread that activated it.
///
/// Not `Send`: once active, the context never leaves its owning thread.
pub struct RenderContext {
    context: PossiblyCurrentContext,
    surface: Surface<WindowSurface>,
    display: Display,
    owner: ThreadId,
    mode: ContextMode,
    size: SurfaceSize,
}

impl RenderContext {
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    /// `RenderContext` is `!Send`, so only unsafe code can call in from
    /// another thread; this catches that in debug builds.
    fn check_owner(&self, op: &str) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "{op} called off the thread that owns the context"
        );
    }

    fn report(&self, what: String, source: Option<glutin::error::Error>) -> Result<()> {
        self.mode.apply(what, source)
    }
}

impl GlPlatform for RenderContext {
    fn context_handle(&self) -> RawContext {
        self.context.raw_context()
    }

    fn get_proc_address(&self, name: &CStr) -> *const c_void {
        self.display.get_proc_address(name)
    }

    fn make_current(&self) -> Result<()> {
        self.check_owner("make_current");
        match self.context.make_current(&self.surface) {
            Ok(()) => Ok(()),
            Err(e) => self.report("failed to make context current".into(), Some(e)),
        }
    }

    fn is_current(&self) -> bool {
        self.context.is_current()
    }

    fn clear_current(&self) -> Result<()> {
        self.check_owner("clear_current");
        match self.context.make_not_current_in_place() {
            Ok(()) => Ok(()),
            Err(e) => self.report("failed to release context".into(), Some(e)),
        }
    }

    fn swap_buffers(&self) -> Result<()> {
        self.check_owner("swap_buffers");
        self.surface
            .swap_buffers(&self.context)
            .map_err(|e| Error::native("swap_buffers failed", e))
    }

    fn set_vsync(&self, enabled: bool) -> Result<()> {
        let interval = if enabled {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        self.surface
            .set_swap_interval(&self.context, interval)
            .map_err(|e| Error::native("failed to set swap interval", e))
    }

    fn resize_drawable(&mut self, size: SurfaceSize) -> Result<()> {
        let (Some(width), Some(height)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            return Ok(());
        };
        if size == self.size {
            return Ok(());
        }
        self.check_owner("resize_drawable");
        self.surface.resize(&self.context, width, height);
        self.size = size;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.context.is_current() {
            self.clear_current()?;
        }
        log::debug!("render context released");
        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn display_preference(window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Wgl(Some(window))
}

#[cfg(target_os = "macos")]
fn display_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Cgl
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn display_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Egl
}

fn base_attributes(options: &GlContextOptions) -> ContextAttributesBuilder {
    let (major, minor) = options.version;
    let profile = if options.compatibility_profile {
        GlProfile::Compatibility
    } else {
        GlProfile::Core
    };
    ContextAttributesBuilder::new()
        .with_debug(options.debug)
        .with_context_api(ContextApi::OpenGl(Some(Version::new(major, minor))))
        .with_profile(profile)
}

fn find_config(display: &Display, window: RawWindowHandle, options: &GlContextOptions) -> Result<Config> {
    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(options.alpha_bits)
        .with_depth_size(options.depth_bits)
        .with_stencil_size(options.stencil_bits)
        .compatible_with_native_window(window)
        .build();

    let configs = unsafe { display.find_configs(template) }
        .map_err(|e| Error::native("failed to query GL configs", e))?;

    // Plain single-sampled configs first.
    configs
        .min_by_key(|config| config.num_samples())
        .ok_or_else(|| Error::native("no GL config matches the surface", "empty config list"))
}

fn create_window_surface(
    display: &Display,
    config: &Config,
    window: RawWindowHandle,
    size: SurfaceSize,
) -> Result<Surface<WindowSurface>> {
    let width = NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN);
    let height = NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN);
    let attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(window, width, height);
    unsafe { display.create_window_surface(config, &attributes) }
        .map_err(|e| Error::native("failed to create GL window surface", e))
}
