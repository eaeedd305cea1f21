use std::ffi::{c_ulong, c_void};
use std::num::NonZeroIsize;
use std::ptr::NonNull;

use raw_window_handle::{
    AppKitDisplayHandle, AppKitWindowHandle, RawDisplayHandle, RawWindowHandle,
    Win32WindowHandle, WindowsDisplayHandle, XlibDisplayHandle, XlibWindowHandle,
};

use crate::device::BackendKind;

/// Opaque handle to an embeddable native child surface.
///
/// The handle owns no GPU resources. It is created once per attach and may be
/// destroyed and recreated while GPU state lives on (for example when the host
/// reparents its control).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NativeSurfaceHandle {
    Win32 {
        hwnd: NonZeroIsize,
        hinstance: Option<NonZeroIsize>,
        /// Atom of the window class registered for this surface.
        class_atom: u16,
    },
    Xlib {
        display: NonNull<c_void>,
        screen: i32,
        window: c_ulong,
        visual_id: c_ulong,
        /// `false` when the handle wraps a host window we must not destroy.
        owned: bool,
    },
    AppKit {
        view: NonNull<c_void>,
        /// `CAMetalLayer` backing the view.
        layer: NonNull<c_void>,
    },
}

// SAFETY: the handle is a set of plain identifiers. Every native call made with
// it goes through a provider that enforces the platform's thread rules.
unsafe impl Send for NativeSurfaceHandle {}
unsafe impl Sync for NativeSurfaceHandle {}

impl NativeSurfaceHandle {
    pub fn raw_window_handle(&self) -> RawWindowHandle {
        match *self {
            NativeSurfaceHandle::Win32 {
                hwnd, hinstance, ..
            } => {
                let mut handle = Win32WindowHandle::new(hwnd);
                handle.hinstance = hinstance;
                RawWindowHandle::Win32(handle)
            }
            NativeSurfaceHandle::Xlib {
                window, visual_id, ..
            } => {
                let mut handle = XlibWindowHandle::new(window);
                handle.visual_id = visual_id;
                RawWindowHandle::Xlib(handle)
            }
            NativeSurfaceHandle::AppKit { view, .. } => {
                RawWindowHandle::AppKit(AppKitWindowHandle::new(view))
            }
        }
    }

    pub fn raw_display_handle(&self) -> RawDisplayHandle {
        match *self {
            NativeSurfaceHandle::Win32 { .. } => {
                RawDisplayHandle::Windows(WindowsDisplayHandle::new())
            }
            NativeSurfaceHandle::Xlib {
                display, screen, ..
            } => RawDisplayHandle::Xlib(XlibDisplayHandle::new(Some(display), screen)),
            NativeSurfaceHandle::AppKit { .. } => {
                RawDisplayHandle::AppKit(AppKitDisplayHandle::new())
            }
        }
    }

    /// Whether tearing this handle down destroys a native object we created.
    pub fn is_owned(&self) -> bool {
        match *self {
            NativeSurfaceHandle::Xlib { owned, .. } => owned,
            NativeSurfaceHandle::Win32 { .. } | NativeSurfaceHandle::AppKit { .. } => true,
        }
    }
}

/// Presentation source derived from a surface handle for one backend.
#[derive(Debug, Copy, Clone)]
pub enum SurfaceBinding {
    /// Raw display/window pair consumed by swapchain creation.
    Window {
        display: RawDisplayHandle,
        window: RawWindowHandle,
    },
    /// `CAMetalLayer` to present into directly.
    CoreAnimationLayer(NonNull<c_void>),
    /// A window a GL context can be made current against.
    GlWindow {
        display: RawDisplayHandle,
        window: RawWindowHandle,
    },
}

// SAFETY: see `NativeSurfaceHandle`. Bindings are built on the UI thread and
// consumed once by the render worker while the native surface is kept alive.
unsafe impl Send for SurfaceBinding {}

impl SurfaceBinding {
    /// Derives the binding `backend` needs from `handle`.
    pub fn for_backend(handle: &NativeSurfaceHandle, backend: BackendKind) -> Self {
        let display = handle.raw_display_handle();
        let window = handle.raw_window_handle();

        match (handle, backend) {
            (NativeSurfaceHandle::AppKit { layer, .. }, BackendKind::Metal) => {
                SurfaceBinding::CoreAnimationLayer(*layer)
            }
            (_, BackendKind::OpenGl) => SurfaceBinding::GlWindow { display, window },
            _ => SurfaceBinding::Window { display, window },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xlib(owned: bool) -> NativeSurfaceHandle {
        NativeSurfaceHandle::Xlib {
            display: NonNull::dangling(),
            screen: 0,
            window: 42,
            visual_id: 7,
            owned,
        }
    }

    #[test]
    fn xlib_handles_convert() {
        let handle = xlib(true);
        match handle.raw_window_handle() {
            RawWindowHandle::Xlib(h) => {
                assert_eq!(h.window, 42);
                assert_eq!(h.visual_id, 7);
            }
            other => panic!("unexpected window handle {other:?}"),
        }
        assert!(matches!(handle.raw_display_handle(), RawDisplayHandle::Xlib(_)));
        assert!(!xlib(false).is_owned());
    }

    #[test]
    fn binding_follows_backend() {
        let handle = xlib(true);
        assert!(matches!(
            SurfaceBinding::for_backend(&handle, BackendKind::OpenGl),
            SurfaceBinding::GlWindow { .. }
        ));
        assert!(matches!(
            SurfaceBinding::for_backend(&handle, BackendKind::Vulkan),
            SurfaceBinding::Window { .. }
        ));

        let view = NativeSurfaceHandle::AppKit {
            view: NonNull::dangling(),
            layer: NonNull::dangling(),
        };
        assert!(matches!(
            SurfaceBinding::for_backend(&view, BackendKind::Metal),
            SurfaceBinding::CoreAnimationLayer(_)
        ));
        assert!(matches!(
            SurfaceBinding::for_backend(&view, BackendKind::Vulkan),
            SurfaceBinding::Window { .. }
        ));
    }
}
