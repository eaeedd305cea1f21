use std::sync::Arc;

use crate::context::{GlContextOptions, SharedContextRegistry, SharedRootContext};
use crate::device::{BackendKind, BackendSelector, CapabilityProbe, WgpuProbe};
use crate::error::Result;
use crate::platform::{self, SurfaceProvider, TargetPlatform};

/// Everything embedded views share within one process.
///
/// Owns the surface provider for the current target, the cached backend
/// choice and the lazily built shared GL root context. Hosts usually create
/// one runtime at startup and hand an `Arc` of it to each view.
pub struct GraphicsRuntime {
    provider: Arc<dyn SurfaceProvider>,
    selector: BackendSelector,
    gl_root: SharedContextRegistry<SharedRootContext>,
}

impl GraphicsRuntime {
    /// Runtime for the current target, probing backends through wgpu.
    pub fn new() -> Result<Self> {
        let provider = platform::create_provider()?;
        Ok(Self::with_selector(provider, BackendSelector::new(Box::new(WgpuProbe))))
    }

    /// Runtime over an injected provider and capability probe.
    ///
    /// `INLAY_BACKEND` is still honored.
    pub fn with_provider(provider: Arc<dyn SurfaceProvider>, probe: Box<dyn CapabilityProbe>) -> Self {
        Self::with_selector(provider, BackendSelector::new(probe))
    }

    pub fn with_selector(provider: Arc<dyn SurfaceProvider>, selector: BackendSelector) -> Self {
        log::debug!("graphics runtime on {}", provider.platform());
        Self {
            provider,
            selector,
            gl_root: SharedContextRegistry::new(),
        }
    }

    pub fn platform(&self) -> TargetPlatform {
        self.provider.platform()
    }

    pub fn provider(&self) -> &Arc<dyn SurfaceProvider> {
        &self.provider
    }

    /// The backend every surface of this process uses. Probed once.
    pub fn backend(&self) -> BackendKind {
        self.selector.select()
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    /// The shared GL root context, built on first use.
    ///
    /// `options` only matter for the call that builds it.
    pub fn shared_gl_root(&self, options: &GlContextOptions) -> Result<&SharedRootContext> {
        self.gl_root
            .get_or_try_init(|| SharedRootContext::create(&self.provider, options))
    }

    pub fn has_shared_gl_root(&self) -> bool {
        self.gl_root.is_initialized()
    }

    /// Releases the shared root context and its offscreen surface.
    ///
    /// Every view must be closed first; their contexts share with the root.
    pub fn shutdown(mut self) {
        match self.gl_root.take() {
            Some(root) => {
                log::debug!("releasing {root:?}");
                drop(root);
            }
            None => log::debug!("graphics runtime shut down"),
        }
    }
}

impl std::fmt::Debug for GraphicsRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsRuntime")
            .field("platform", &self.platform())
            .field("selector", &self.selector)
            .field("gl_root", &self.has_shared_gl_root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::device::FixedProbe;
    use crate::platform::testing::RecordingProvider;

    fn runtime(supported: &[BackendKind]) -> (GraphicsRuntime, Arc<AtomicUsize>) {
        let probe = FixedProbe::new(supported);
        let queries = Arc::clone(&probe.queries);
        let selector = BackendSelector::with_preference(Box::new(probe), None);
        let runtime = GraphicsRuntime::with_selector(Arc::new(RecordingProvider::default()), selector);
        (runtime, queries)
    }

    #[test]
    fn backend_is_probed_once() {
        let (runtime, queries) = runtime(&[BackendKind::Vulkan, BackendKind::OpenGl]);
        assert_eq!(runtime.selector().selected(), None);

        assert_eq!(runtime.backend(), BackendKind::Vulkan);
        let after_first = queries.load(Ordering::SeqCst);
        assert_eq!(runtime.backend(), BackendKind::Vulkan);
        assert_eq!(queries.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn provider_platform_is_reported() {
        let (runtime, _) = runtime(&[]);
        assert_eq!(runtime.platform(), TargetPlatform::X11);
        assert_eq!(runtime.backend(), BackendKind::OpenGlEs);
    }

    #[test]
    fn shutdown_without_gl_root() {
        let (runtime, _) = runtime(&[BackendKind::Metal]);
        assert!(!runtime.has_shared_gl_root());
        runtime.shutdown();
    }
}
