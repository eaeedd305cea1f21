//! Native child surfaces.
//!
//! The target platform is resolved once, and a single [`SurfaceProvider`] is
//! built for it:
//! - Windows: a child `HWND` of a private, hit-test transparent window class
//! - X11: a child window on a process-wide display connection (or the host
//!   window itself when no direct GL surface is needed)
//! - macOS: a layer-backed `NSView` whose layer is a `CAMetalLayer`

mod handle;
mod provider;
mod surface;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod win32;
#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios", target_os = "android"))))]
mod x11;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use handle::{NativeSurfaceHandle, SurfaceBinding};
pub use provider::SurfaceProvider;
pub use surface::EmbeddedSurface;

use crate::error::{Error, Result};

/// Operating system family the crate was built for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TargetPlatform {
    Windows,
    /// Linux and the BSDs, presenting through X11.
    X11,
    MacOs,
    Android,
    Other,
}

impl TargetPlatform {
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            TargetPlatform::Windows
        } else if cfg!(target_os = "macos") {
            TargetPlatform::MacOs
        } else if cfg!(target_os = "android") {
            TargetPlatform::Android
        } else if cfg!(all(unix, not(target_os = "ios"))) {
            TargetPlatform::X11
        } else {
            TargetPlatform::Other
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TargetPlatform::Windows => "windows",
            TargetPlatform::X11 => "x11",
            TargetPlatform::MacOs => "macos",
            TargetPlatform::Android => "android",
            TargetPlatform::Other => "other",
        }
    }
}

impl std::fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the surface provider for the current target.
pub fn create_provider() -> Result<Arc<dyn SurfaceProvider>> {
    let platform = TargetPlatform::current();
    log::debug!("creating surface provider for {platform}");
    native_provider(platform)
}

#[cfg(target_os = "windows")]
fn native_provider(_platform: TargetPlatform) -> Result<Arc<dyn SurfaceProvider>> {
    Ok(Arc::new(win32::Win32Provider::new()?))
}

#[cfg(target_os = "macos")]
fn native_provider(_platform: TargetPlatform) -> Result<Arc<dyn SurfaceProvider>> {
    Ok(Arc::new(macos::AppKitProvider::new()))
}

#[cfg(all(unix, not(any(target_os = "macos", target_os = "ios", target_os = "android"))))]
fn native_provider(_platform: TargetPlatform) -> Result<Arc<dyn SurfaceProvider>> {
    Ok(Arc::new(x11::XlibProvider::open()?))
}

#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    all(unix, not(any(target_os = "ios", target_os = "android")))
)))]
fn native_provider(platform: TargetPlatform) -> Result<Arc<dyn SurfaceProvider>> {
    Err(Error::PlatformUnsupported {
        what: match platform {
            TargetPlatform::Android => "embedded surfaces on android",
            _ => "embedded surfaces on this target",
        },
    })
}

/// Shorthand used by the native providers when a call returns a null handle.
#[allow(dead_code)]
pub(crate) fn null_handle(what: &'static str) -> Error {
    Error::native(what, "call returned a null handle")
}
