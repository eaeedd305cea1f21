use std::ffi::c_void;
use std::ptr::NonNull;

use objc2::rc::Retained;
use objc2::{MainThreadMarker, MainThreadOnly};
use objc2_app_kit::NSView;
use objc2_foundation::{NSPoint, NSRect, NSSize};
use objc2_quartz_core::CAMetalLayer;
use raw_window_handle::{AppKitDisplayHandle, RawDisplayHandle, RawWindowHandle};

use super::{NativeSurfaceHandle, SurfaceProvider, TargetPlatform};
use crate::coords::{SurfaceBounds, SurfaceSize};
use crate::error::{Error, Result};

const INITIAL_SIZE: SurfaceSize = SurfaceSize::new(100, 100);

/// Layer-backed `NSView`s presenting through a `CAMetalLayer`.
///
/// AppKit objects are main-thread only; every call checks for a
/// `MainThreadMarker` and fails otherwise.
pub(super) struct AppKitProvider;

impl AppKitProvider {
    pub(super) fn new() -> Self {
        Self
    }

    fn make_view(
        &self,
        mtm: MainThreadMarker,
        size: SurfaceSize,
        scale: f64,
    ) -> Result<NativeSurfaceHandle> {
        let frame = NSRect::new(
            NSPoint::new(0.0, 0.0),
            NSSize::new(f64::from(size.width), f64::from(size.height)),
        );
        let view = NSView::initWithFrame(NSView::alloc(mtm), frame);

        let layer = CAMetalLayer::new();
        layer.setContentsScale(scale);
        layer.setDrawableSize(NSSize::new(
            f64::from(size.width) * scale,
            f64::from(size.height) * scale,
        ));

        // Layer-hosting: assign the layer before turning layer backing on.
        view.setLayer(Some(&layer));
        view.setWantsLayer(true);

        let view = NonNull::new(Retained::into_raw(view).cast::<c_void>());
        let layer = NonNull::new(Retained::into_raw(layer).cast::<c_void>());
        match (view, layer) {
            (Some(view), Some(layer)) => Ok(NativeSurfaceHandle::AppKit { view, layer }),
            _ => Err(super::null_handle("NSView/CAMetalLayer allocation")),
        }
    }
}

impl SurfaceProvider for AppKitProvider {
    fn platform(&self) -> TargetPlatform {
        TargetPlatform::MacOs
    }

    fn display_handle(&self) -> Result<RawDisplayHandle> {
        Ok(RawDisplayHandle::AppKit(AppKitDisplayHandle::new()))
    }

    fn create_embedded(
        &self,
        parent: RawWindowHandle,
        _wants_direct_gl: bool,
    ) -> Result<NativeSurfaceHandle> {
        let RawWindowHandle::AppKit(parent) = parent else {
            return Err(Error::PlatformUnsupported {
                what: "non-AppKit parent view on macos",
            });
        };
        let mtm = main_thread("embedded surface creation")?;

        // SAFETY: the host guarantees `ns_view` is a live NSView for this call.
        let parent: &NSView = unsafe { parent.ns_view.cast::<NSView>().as_ref() };
        let handle = self.make_view(mtm, INITIAL_SIZE, backing_scale(parent, 1.0))?;

        if let NativeSurfaceHandle::AppKit { view, .. } = handle {
            parent.addSubview(unsafe { view.cast::<NSView>().as_ref() });
        }
        Ok(handle)
    }

    fn create_offscreen(&self, size: SurfaceSize) -> Result<NativeSurfaceHandle> {
        let mtm = main_thread("offscreen surface creation")?;
        self.make_view(mtm, size.at_least_one(), 1.0)
    }

    fn resize(&self, handle: &NativeSurfaceHandle, bounds: SurfaceBounds) -> Result<()> {
        let NativeSurfaceHandle::AppKit { view, layer } = *handle else {
            return Err(Error::PlatformUnsupported {
                what: "foreign surface handle on macos",
            });
        };
        let _mtm = main_thread("surface resize")?;

        let view: &NSView = unsafe { view.cast::<NSView>().as_ref() };
        let layer: &CAMetalLayer = unsafe { layer.cast::<CAMetalLayer>().as_ref() };

        view.setFrame(NSRect::new(
            NSPoint::new(bounds.x, bounds.y),
            NSSize::new(bounds.width.max(0.0), bounds.height.max(0.0)),
        ));

        // The display scale can change without the pixel bounds changing
        // (window dragged to another monitor), so reapply it on every resize.
        let scale = backing_scale(view, bounds.scale_factor());
        let physical = SurfaceBounds { scale, ..bounds }.physical_size();
        layer.setContentsScale(scale);
        layer.setDrawableSize(NSSize::new(
            f64::from(physical.width),
            f64::from(physical.height),
        ));
        Ok(())
    }

    fn release(&self, handle: NativeSurfaceHandle) -> Result<()> {
        let NativeSurfaceHandle::AppKit { view, layer } = handle else {
            return Err(Error::PlatformUnsupported {
                what: "foreign surface handle on macos",
            });
        };
        let _mtm = main_thread("surface teardown")?;

        // SAFETY: both pointers came from `Retained::into_raw` in `make_view`
        // and are released exactly once.
        let view = unsafe { Retained::from_raw(view.as_ptr().cast::<NSView>()) };
        let layer = unsafe { Retained::from_raw(layer.as_ptr().cast::<CAMetalLayer>()) };

        if let Some(view) = &view {
            view.setLayer(None);
            view.removeFromSuperview();
        }
        drop(layer);
        drop(view);
        Ok(())
    }
}

fn main_thread(what: &'static str) -> Result<MainThreadMarker> {
    MainThreadMarker::new()
        .ok_or_else(|| Error::native(format!("{what} must run on the main thread"), "AppKit thread check"))
}

fn backing_scale(view: &NSView, fallback: f64) -> f64 {
    view.window()
        .map(|w| w.backingScaleFactor())
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(fallback)
}
