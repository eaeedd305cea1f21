//! Process-scoped graphics state shared by every embedded view.

mod runtime;

pub use runtime::GraphicsRuntime;
