use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use super::{NativeSurfaceHandle, SurfaceBinding, TargetPlatform};
use crate::coords::{SurfaceBounds, SurfaceSize};
use crate::device::BackendKind;
use crate::error::Result;

/// Creates, resizes and destroys embeddable native surfaces for one OS.
///
/// One provider is built per process for the resolved [`TargetPlatform`];
/// nothing else in the crate branches on the operating system.
///
/// Calls that touch native windows must come from the host's UI thread.
pub trait SurfaceProvider: Send + Sync {
    fn platform(&self) -> TargetPlatform;

    /// Display connection shared by every surface this provider creates.
    fn display_handle(&self) -> Result<RawDisplayHandle>;

    /// Builds a child surface under `parent`.
    ///
    /// `wants_direct_gl` asks for a surface a GL context can own directly.
    /// Platforms that can present into the parent as-is may wrap it instead
    /// when this is `false`.
    fn create_embedded(
        &self,
        parent: RawWindowHandle,
        wants_direct_gl: bool,
    ) -> Result<NativeSurfaceHandle>;

    /// Hidden, fixed-size surface used to back the shared root GL context.
    fn create_offscreen(&self, size: SurfaceSize) -> Result<NativeSurfaceHandle>;

    /// Moves/resizes the native surface to `bounds`.
    fn resize(&self, handle: &NativeSurfaceHandle, bounds: SurfaceBounds) -> Result<()>;

    /// Presentation source for `backend`.
    fn binding(&self, handle: &NativeSurfaceHandle, backend: BackendKind) -> Result<SurfaceBinding> {
        Ok(SurfaceBinding::for_backend(handle, backend))
    }

    /// Releases the native objects behind `handle`.
    ///
    /// Called at most once per handle; see `EmbeddedSurface::destroy`.
    fn release(&self, handle: NativeSurfaceHandle) -> Result<()>;
}
