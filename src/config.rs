//! Layout configuration and input loading.
//!
//! This module handles:
//! - The fixed drawing constants (page size, margin, target width, fonts)
//! - Validation of the layout invariants
//! - Loading the source PDF bytes and the top text file

use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{ComposeError, Result};
use crate::pdf::fonts::StandardFont;

/// A4 in points
pub const A4: PageSize = PageSize {
    width: 595.27,
    height: 841.89,
};

/// Margin around the top text region (0.5 inch)
pub const MARGIN: f64 = 36.0;

/// Width the source graphic is scaled to (~12.7 cm)
pub const BARCODE_TARGET_WIDTH: f64 = 360.0;

/// Vertical gap between the graphic's lower edge and the label baseline
pub const LABEL_GAP: f64 = 14.0;

/// Line height as a multiple of font size
pub const LINE_HEIGHT_FACTOR: f64 = 1.3;

pub const TOP_TEXT_FONT: FontSpec = FontSpec::new(StandardFont::Helvetica, 10.0);
pub const LABEL_FONT: FontSpec = FontSpec::new(StandardFont::Helvetica, 12.0);

/// Page dimensions in points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

/// A standard font at a fixed size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub font: StandardFont,
    pub size: f64,
}

impl FontSpec {
    pub const fn new(font: StandardFont, size: f64) -> Self {
        Self { font, size }
    }
}

/// Every drawing constant, passed explicitly to each stage.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub page: PageSize,
    pub margin: f64,
    pub target_width: f64,
    pub label_gap: f64,
    pub line_height_factor: f64,
    pub top_text_font: FontSpec,
    pub label_font: FontSpec,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::a4()
    }
}

impl LayoutConfig {
    pub fn a4() -> Self {
        Self {
            page: A4,
            margin: MARGIN,
            target_width: BARCODE_TARGET_WIDTH,
            label_gap: LABEL_GAP,
            line_height_factor: LINE_HEIGHT_FACTOR,
            top_text_font: TOP_TEXT_FONT,
            label_font: LABEL_FONT,
        }
    }

    /// Width available to the top text
    pub fn usable_width(&self) -> f64 {
        self.page.width - 2.0 * self.margin
    }

    pub fn top_line_height(&self) -> f64 {
        self.top_text_font.size * self.line_height_factor
    }

    /// Standard fonts the background page draws with
    pub fn fonts(&self) -> [StandardFont; 2] {
        [self.top_text_font.font, self.label_font.font]
    }

    pub fn validate(&self) -> Result<()> {
        if !self.page.is_valid() {
            return Err(ComposeError::validation(format!(
                "page size must be positive, got {} x {}",
                self.page.width, self.page.height
            )));
        }
        let half_min_side = self.page.width.min(self.page.height) / 2.0;
        if !(self.margin >= 0.0 && self.margin < half_min_side) {
            return Err(ComposeError::validation(format!(
                "margin must be in [0, {}), got {}",
                half_min_side, self.margin
            )));
        }
        if !(self.target_width > 0.0) {
            return Err(ComposeError::validation(format!(
                "target width must be positive, got {}",
                self.target_width
            )));
        }
        if !(self.line_height_factor > 0.0) {
            return Err(ComposeError::validation("line height factor must be positive"));
        }
        for (what, spec) in [("top text", self.top_text_font), ("label", self.label_font)] {
            if !(spec.size > 0.0) {
                return Err(ComposeError::validation(format!(
                    "{} font size must be positive, got {}",
                    what, spec.size
                )));
            }
        }
        Ok(())
    }
}

/// Helper function to open a file with consistent error context
fn open_file_with_context(path: &Path, description: &str) -> Result<File> {
    File::open(path).map_err(|source| ComposeError::InvalidInput {
        context: format!("Failed to open {} at {:?}", description, path),
        source,
    })
}

fn read_all(path: &Path, description: &str) -> Result<Vec<u8>> {
    let file = open_file_with_context(path, description)?;
    let mut buf = Vec::new();
    let mut reader = BufReader::new(file);
    reader
        .read_to_end(&mut buf)
        .map_err(|source| ComposeError::InvalidInput {
            context: format!("Failed to read {} at {:?}", description, path),
            source,
        })?;
    Ok(buf)
}

pub fn load_source_pdf(path: &Path) -> Result<Vec<u8>> {
    read_all(path, "source PDF")
}

/// Read the top text file. Invalid UTF-8 is replaced, never fatal.
pub fn load_top_text(path: &Path) -> Result<String> {
    let bytes = read_all(path, "text file")?;
    Ok(decode_text_lossy(&bytes))
}

/// Lossy UTF-8 decode with a leading byte order mark dropped
pub fn decode_text_lossy(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text.into_owned(),
    }
}
