use std::ffi::c_void;
use std::num::NonZeroIsize;
use std::sync::atomic::{AtomicU32, Ordering};

use raw_window_handle::{RawDisplayHandle, RawWindowHandle, WindowsDisplayHandle};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CS_OWNDC, CreateWindowExW, DefWindowProcW, DestroyWindow, HMENU, HTTRANSPARENT, IDC_ARROW,
    LoadCursorW, RegisterClassExW, SWP_NOACTIVATE, SWP_NOZORDER, SetWindowPos, UnregisterClassW,
    WINDOW_EX_STYLE, WINDOW_STYLE, WM_NCHITTEST, WNDCLASSEXW, WS_CHILD, WS_CLIPSIBLINGS, WS_POPUP,
    WS_VISIBLE,
};
use windows::core::PCWSTR;

use super::{NativeSurfaceHandle, SurfaceProvider, TargetPlatform};
use crate::coords::{SurfaceBounds, SurfaceSize};
use crate::error::{Error, Result};

const INITIAL_SIZE: SurfaceSize = SurfaceSize::new(640, 480);

static NEXT_CLASS: AtomicU32 = AtomicU32::new(0);

/// Child `HWND`s, one private window class per surface.
pub(super) struct Win32Provider {
    hinstance: isize,
}

impl Win32Provider {
    pub(super) fn new() -> Result<Self> {
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|e| Error::native("GetModuleHandleW failed", e))?;
        Ok(Self {
            hinstance: module.0 as isize,
        })
    }

    fn instance(&self) -> HINSTANCE {
        HINSTANCE(self.hinstance as *mut c_void)
    }

    /// Registers a uniquely named class whose window procedure lets every
    /// hit test fall through to the host.
    fn register_class(&self) -> Result<u16> {
        let name = format!(
            "inlay-surface-{}-{}",
            std::process::id(),
            NEXT_CLASS.fetch_add(1, Ordering::Relaxed)
        );
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();

        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_OWNDC,
            lpfnWndProc: Some(surface_proc),
            hInstance: self.instance(),
            hCursor: unsafe { LoadCursorW(HINSTANCE::default(), IDC_ARROW) }.unwrap_or_default(),
            lpszClassName: PCWSTR(wide.as_ptr()),
            ..Default::default()
        };

        let atom = unsafe { RegisterClassExW(&class) };
        if atom == 0 {
            return Err(Error::native(
                format!("RegisterClassExW({name}) failed"),
                windows::core::Error::from_win32(),
            ));
        }
        Ok(atom)
    }

    fn create_window(
        &self,
        parent: HWND,
        style: WINDOW_STYLE,
        size: SurfaceSize,
    ) -> Result<NativeSurfaceHandle> {
        let atom = self.register_class()?;

        let created = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                class_name(atom),
                PCWSTR::null(),
                style,
                0,
                0,
                size.width as i32,
                size.height as i32,
                parent,
                HMENU::default(),
                self.instance(),
                None,
            )
        };

        let hwnd = match created {
            Ok(hwnd) => hwnd,
            Err(e) => {
                self.unregister(atom);
                return Err(Error::native("CreateWindowExW failed", e));
            }
        };

        let Some(hwnd) = NonZeroIsize::new(hwnd.0 as isize) else {
            self.unregister(atom);
            return Err(super::null_handle("CreateWindowExW"));
        };

        Ok(NativeSurfaceHandle::Win32 {
            hwnd,
            hinstance: NonZeroIsize::new(self.hinstance),
            class_atom: atom,
        })
    }

    fn unregister(&self, atom: u16) {
        if let Err(e) = unsafe { UnregisterClassW(class_name(atom), self.instance()) } {
            log::warn!("UnregisterClassW failed: {e}");
        }
    }
}

impl SurfaceProvider for Win32Provider {
    fn platform(&self) -> TargetPlatform {
        TargetPlatform::Windows
    }

    fn display_handle(&self) -> Result<RawDisplayHandle> {
        Ok(RawDisplayHandle::Windows(WindowsDisplayHandle::new()))
    }

    fn create_embedded(
        &self,
        parent: RawWindowHandle,
        _wants_direct_gl: bool,
    ) -> Result<NativeSurfaceHandle> {
        let RawWindowHandle::Win32(parent) = parent else {
            return Err(Error::PlatformUnsupported {
                what: "non-Win32 parent window on windows",
            });
        };

        // A CS_OWNDC child works for both GL and swapchain presentation.
        self.create_window(
            HWND(parent.hwnd.get() as *mut c_void),
            WS_CHILD | WS_VISIBLE | WS_CLIPSIBLINGS,
            INITIAL_SIZE,
        )
    }

    fn create_offscreen(&self, size: SurfaceSize) -> Result<NativeSurfaceHandle> {
        self.create_window(HWND::default(), WS_POPUP, size.at_least_one())
    }

    fn resize(&self, handle: &NativeSurfaceHandle, bounds: SurfaceBounds) -> Result<()> {
        let NativeSurfaceHandle::Win32 { hwnd, .. } = *handle else {
            return Err(Error::PlatformUnsupported {
                what: "foreign surface handle on windows",
            });
        };

        let size = bounds.physical_size();
        let (x, y) = bounds.physical_origin();
        unsafe {
            SetWindowPos(
                HWND(hwnd.get() as *mut c_void),
                HWND::default(),
                x,
                y,
                size.width as i32,
                size.height as i32,
                SWP_NOZORDER | SWP_NOACTIVATE,
            )
        }
        .map_err(|e| Error::native("SetWindowPos failed", e))
    }

    fn release(&self, handle: NativeSurfaceHandle) -> Result<()> {
        let NativeSurfaceHandle::Win32 {
            hwnd, class_atom, ..
        } = handle
        else {
            return Err(Error::PlatformUnsupported {
                what: "foreign surface handle on windows",
            });
        };

        let destroyed = unsafe { DestroyWindow(HWND(hwnd.get() as *mut c_void)) };
        self.unregister(class_atom);
        destroyed.map_err(|e| Error::native("DestroyWindow failed", e))
    }
}

/// `MAKEINTATOM`: a class atom passed where a class name is expected.
fn class_name(atom: u16) -> PCWSTR {
    PCWSTR(atom as usize as *const u16)
}

unsafe extern "system" fn surface_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_NCHITTEST {
        return LRESULT(HTTRANSPARENT as isize);
    }
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}
