//! Shared GPU contexts.
//!
//! - `SharedContextRegistry`: exactly-once, process-scoped construction of the
//!   root of the resource-sharing group
//! - `SharedRootContext`: the hidden GL context every surface context shares with
//! - `PendingRenderContext` / `RenderContext`: a per-surface context before and
//!   after it is bound to its render thread

mod gl;
mod registry;

pub use gl::{
    ContextMode, GlContextOptions, PendingRenderContext, RenderContext, SharedRootContext,
    ROOT_SURFACE_SIZE,
};
pub use registry::SharedContextRegistry;
