//! Surface geometry.
//!
//! Hosts report bounds in logical pixels plus a scale factor; everything GPU
//! facing works in physical pixels (`SurfaceSize`).

mod size;

pub use size::{AtomicSurfaceSize, SurfaceBounds, SurfaceSize};
