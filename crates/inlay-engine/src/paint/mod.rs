//! Clear colors handed to the default renderer.

mod color;

pub use color::Color;
