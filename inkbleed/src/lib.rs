//! Drawing contexts, pigment compositing and the render stage, on top of `inkbleed-core`.
#![warn(clippy::pedantic)]

pub mod canvas;
pub mod compositor;
pub mod config;
pub mod error;
pub mod frame;
pub mod render;
pub mod stage;
pub mod studio;

pub use canvas::Canvas;
pub use error::EngineError;
pub use render::{Anchor, Renderable};
pub use studio::{CanvasId, Studio};
