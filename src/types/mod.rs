// ABOUTME: Validated domain types shared by the build and deploy stages.
// ABOUTME: Parsing happens once at the boundary; stages work with checked values.

mod image_ref;

pub use image_ref::{ImageRef, ParseImageRefError};
