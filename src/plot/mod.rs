//! Plot helpers for filter results.
//!
//! Geometry (confidence ellipses, Hinton boxes) is always available. Rendering to SVG files needs
//! the `plot` feature.

pub mod ellipse;
pub mod figure;
pub mod hinton;
#[cfg(feature = "plot")]
pub mod render;

pub use ellipse::{confidence_ellipse, Ellipse};
pub use figure::FigureConfig;
pub use hinton::{hinton_boxes, BoxSign, HintonBox};
#[cfg(feature = "plot")]
pub use render::{draw_ellipse, draw_hinton, save_svg};
