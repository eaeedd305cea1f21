use std::ffi::{CStr, c_void};

use glow::HasContext;
use glutin::context::RawContext;

use super::DeviceOptions;
use crate::coords::SurfaceSize;
use crate::error::Result;

/// Context operations the GL device is handed instead of owning a context.
///
/// The context and its native window are created by the surface layer (see
/// `SharedRootContext::create_render_context`); the device only drives them.
pub trait GlPlatform {
    fn context_handle(&self) -> RawContext;
    fn get_proc_address(&self, name: &CStr) -> *const c_void;
    fn make_current(&self) -> Result<()>;
    /// Whether the context is current on the calling thread.
    fn is_current(&self) -> bool;
    fn clear_current(&self) -> Result<()>;
    fn swap_buffers(&self) -> Result<()>;
    fn set_vsync(&self, enabled: bool) -> Result<()>;
    /// Resizes the default framebuffer. Empty sizes are ignored.
    fn resize_drawable(&mut self, size: SurfaceSize) -> Result<()>;
    /// Releases the context from the current thread ahead of destruction.
    fn destroy(&mut self) -> Result<()>;
}

/// Driver strings queried once at device creation.
#[derive(Debug, Clone, Default)]
pub struct GlInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
}

/// OpenGL device over an injected [`GlPlatform`].
///
/// Presentation is the context's buffer swap; the "chain size" is the size of
/// the default framebuffer and the viewport.
pub struct GlDevice {
    gl: glow::Context,
    platform: Box<dyn GlPlatform>,
    info: GlInfo,
    drawable: Option<SurfaceSize>,
    disposed: bool,
}

impl GlDevice {
    pub fn new(platform: Box<dyn GlPlatform>, options: &DeviceOptions) -> Result<Self> {
        if !platform.is_current() {
            platform.make_current()?;
        }

        // SAFETY: the context is current on this thread, so the loader returns
        // entry points valid for it.
        let gl = unsafe { glow::Context::from_loader_function_cstr(|name| platform.get_proc_address(name)) };

        let info = unsafe {
            GlInfo {
                vendor: gl.get_parameter_string(glow::VENDOR),
                renderer: gl.get_parameter_string(glow::RENDERER),
                version: gl.get_parameter_string(glow::VERSION),
            }
        };
        log::info!("GL vendor: {}, renderer: {}", info.vendor, info.renderer);
        log::debug!("GL version: {}", info.version);

        if let Err(e) = platform.set_vsync(options.vsync) {
            log::warn!("could not set vsync={}: {e:#}", options.vsync);
        }

        Ok(Self {
            gl,
            platform,
            info,
            drawable: None,
            disposed: false,
        })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn info(&self) -> &GlInfo {
        &self.info
    }

    pub fn platform(&self) -> &dyn GlPlatform {
        self.platform.as_ref()
    }

    pub fn drawable_size(&self) -> Option<SurfaceSize> {
        self.drawable
    }

    /// Resizes the drawable and viewport when `size` changed.
    pub fn ensure_drawable(&mut self, size: SurfaceSize) -> Result<()> {
        if size.is_empty() || self.drawable == Some(size) {
            return Ok(());
        }

        self.platform.resize_drawable(size)?;
        unsafe {
            self.gl.viewport(0, 0, size.width as i32, size.height as i32);
        }
        self.drawable = Some(size);
        log::debug!("GL drawable resized to {}x{}", size.width, size.height);
        Ok(())
    }

    /// Swaps buffers, presenting the frame.
    pub fn present(&self) -> Result<()> {
        self.platform.swap_buffers()
    }

    /// Releases the context. Safe to call more than once.
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        unsafe { self.gl.finish() };
        self.platform.destroy()
    }
}
