//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize + encode** | Lanczos3, then the per-format `image` encoder |
//! | **Placeholder** | `thumbnail` + `blur`, JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for ladder and dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{LadderStep, applicable_widths, aspect_ratio, base_dimensions, scaled_height};
pub use params::{PlaceholderParams, Quality, ResizeParams};
pub use rust_backend::{RustBackend, single_pixel};
