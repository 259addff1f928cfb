//! Compose a printable A4 sheet around a barcode graphic.
//!
//! The sheet carries word-wrapped text at the top, the first page of a
//! source PDF scaled to a fixed width and centered, and a label just below
//! the graphic. The result is written as `{label}.pdf` with the label
//! sanitized into a safe file name.

pub mod compose;
pub mod config;
pub mod error;
pub mod layout;
pub mod pdf;
pub mod sanitize;

pub use compose::{compose_final_pdf, compose_page, compose_with_config, ComposeReport, ComposeRequest};
pub use config::{LayoutConfig, PageSize};
pub use error::{ComposeError, ErrorKind, Result};
pub use layout::{compute_geometry, Geometry, Transform};
pub use sanitize::sanitize_filename;
