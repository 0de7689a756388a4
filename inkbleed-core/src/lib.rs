//! Geometry half of the paint engine: flow fields, stroke paths, bleed fills, brushes, and the
//! coverage masks they rasterize into. Nothing in here touches threads or pixels of color.

pub mod bleed;
pub mod brush;
pub mod color;
pub mod field;
pub mod fill;
pub mod hatch;
pub mod mask;
pub mod plot;
pub mod polygon;
pub mod position;
pub mod random;
pub mod spectral;
pub mod util;

pub use bleed::BleedField;
pub use brush::{BrushDescriptor, BrushError, BrushRegistry};
pub use color::Color;
pub use field::{FieldError, FlowFields};
pub use mask::Mask;
pub use plot::{Plot, PlotKind};
pub use polygon::Polygon;
pub use random::Random;
pub use util::Point;
