use std::ffi::{c_int, c_uint, c_ulong};
use std::ptr::{self, NonNull};

use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle};
use x11_dl::xlib::{self, Xlib};

use super::{NativeSurfaceHandle, SurfaceProvider, TargetPlatform};
use crate::coords::{SurfaceBounds, SurfaceSize};
use crate::error::{Error, Result};

const INITIAL_SIZE: SurfaceSize = SurfaceSize::new(100, 100);

/// X11 surfaces on a single display connection.
///
/// Every window (and therefore every GL context) shares this connection, which
/// keeps all contexts in one share group.
pub(super) struct XlibProvider {
    xlib: Xlib,
    display: NonNull<xlib::Display>,
    screen: c_int,
}

// SAFETY: `XInitThreads` runs before the connection is opened, which makes the
// display safe to use from several threads.
unsafe impl Send for XlibProvider {}
unsafe impl Sync for XlibProvider {}

impl XlibProvider {
    pub(super) fn open() -> Result<Self> {
        let xlib = Xlib::open().map_err(|e| Error::native("failed to load libX11", e))?;

        if unsafe { (xlib.XInitThreads)() } == 0 {
            log::warn!("XInitThreads failed; X11 calls from render threads are unsafe");
        }

        let display = unsafe { (xlib.XOpenDisplay)(ptr::null()) };
        let display = NonNull::new(display).ok_or_else(|| {
            Error::native("XOpenDisplay failed", "no X server connection (is DISPLAY set?)")
        })?;
        let screen = unsafe { (xlib.XDefaultScreen)(display.as_ptr()) };

        log::debug!("opened X display (screen {screen})");
        Ok(Self {
            xlib,
            display,
            screen,
        })
    }

    fn dpy(&self) -> *mut xlib::Display {
        self.display.as_ptr()
    }

    fn create_window(&self, parent: c_ulong, size: SurfaceSize, map: bool) -> Result<NativeSurfaceHandle> {
        let size = size.at_least_one();
        let window = unsafe {
            (self.xlib.XCreateSimpleWindow)(
                self.dpy(),
                parent,
                0,
                0,
                size.width as c_uint,
                size.height as c_uint,
                0,
                0,
                (self.xlib.XBlackPixel)(self.dpy(), self.screen),
            )
        };
        if window == 0 {
            return Err(super::null_handle("XCreateSimpleWindow"));
        }

        if map {
            unsafe { (self.xlib.XMapWindow)(self.dpy(), window) };
        }
        unsafe { (self.xlib.XFlush)(self.dpy()) };

        match self.visual_id(window) {
            Ok(visual_id) => Ok(self.handle(window, visual_id, true)),
            Err(e) => {
                unsafe { (self.xlib.XDestroyWindow)(self.dpy(), window) };
                Err(e)
            }
        }
    }

    fn visual_id(&self, window: c_ulong) -> Result<c_ulong> {
        // SAFETY: plain C struct; XGetWindowAttributes fills it in.
        let mut attrs: xlib::XWindowAttributes = unsafe { std::mem::zeroed() };
        if unsafe { (self.xlib.XGetWindowAttributes)(self.dpy(), window, &mut attrs) } == 0 {
            return Err(Error::native(
                format!("XGetWindowAttributes({window:#x}) failed"),
                "window does not exist",
            ));
        }
        if attrs.visual.is_null() {
            return Ok(0);
        }
        Ok(unsafe { (self.xlib.XVisualIDFromVisual)(attrs.visual) })
    }

    fn handle(&self, window: c_ulong, visual_id: c_ulong, owned: bool) -> NativeSurfaceHandle {
        NativeSurfaceHandle::Xlib {
            display: self.display.cast(),
            screen: self.screen,
            window,
            visual_id,
            owned,
        }
    }
}

impl SurfaceProvider for XlibProvider {
    fn platform(&self) -> TargetPlatform {
        TargetPlatform::X11
    }

    fn display_handle(&self) -> Result<RawDisplayHandle> {
        Ok(RawDisplayHandle::Xlib(XlibDisplayHandle::new(
            Some(self.display.cast()),
            self.screen,
        )))
    }

    fn create_embedded(
        &self,
        parent: RawWindowHandle,
        wants_direct_gl: bool,
    ) -> Result<NativeSurfaceHandle> {
        let (parent, parent_visual) = match parent {
            RawWindowHandle::Xlib(h) => (h.window, h.visual_id),
            RawWindowHandle::Xcb(h) => (c_ulong::from(h.window.get()), 0),
            _ => {
                return Err(Error::PlatformUnsupported {
                    what: "non-X11 parent window on x11",
                });
            }
        };

        if wants_direct_gl {
            return self.create_window(parent, INITIAL_SIZE, true);
        }

        // Swapchain backends present straight into the host window.
        let visual_id = if parent_visual != 0 {
            parent_visual
        } else {
            self.visual_id(parent)?
        };
        Ok(self.handle(parent, visual_id, false))
    }

    fn create_offscreen(&self, size: SurfaceSize) -> Result<NativeSurfaceHandle> {
        let root = unsafe { (self.xlib.XRootWindow)(self.dpy(), self.screen) };
        self.create_window(root, size, false)
    }

    fn resize(&self, handle: &NativeSurfaceHandle, bounds: SurfaceBounds) -> Result<()> {
        let NativeSurfaceHandle::Xlib { window, owned, .. } = *handle else {
            return Err(Error::PlatformUnsupported {
                what: "foreign surface handle on x11",
            });
        };
        if !owned {
            return Ok(());
        }

        // X rejects zero-sized windows; the render loop idles on empty sizes anyway.
        let size = bounds.physical_size().at_least_one();
        let (x, y) = bounds.physical_origin();
        unsafe {
            (self.xlib.XMoveResizeWindow)(
                self.dpy(),
                window,
                x,
                y,
                size.width as c_uint,
                size.height as c_uint,
            );
            (self.xlib.XFlush)(self.dpy());
        }
        Ok(())
    }

    fn release(&self, handle: NativeSurfaceHandle) -> Result<()> {
        let NativeSurfaceHandle::Xlib { window, owned, .. } = handle else {
            return Err(Error::PlatformUnsupported {
                what: "foreign surface handle on x11",
            });
        };
        if owned {
            unsafe {
                (self.xlib.XDestroyWindow)(self.dpy(), window);
                (self.xlib.XFlush)(self.dpy());
            }
        }
        Ok(())
    }
}

impl Drop for XlibProvider {
    fn drop(&mut self) {
        unsafe { (self.xlib.XCloseDisplay)(self.dpy()) };
    }
}
