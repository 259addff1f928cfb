//! PDF content stream generation for the background page.
//!
//! This module provides:
//! - Text drawing operations with standard and CID fonts
//! - Content stream encoding and compression

use std::collections::BTreeSet;
use std::io::Write;

use lopdf::content::{Content, Operation};
use lopdf::Object;

use super::background::TextCanvas;
use super::fonts::FontSet;
use crate::config::FontSpec;
use crate::error::{ComposeError, Result};

/// Builder for a page content stream drawn with the fonts of a [`FontSet`]
pub struct ContentBuilder<'a> {
    fonts: &'a FontSet,
    operations: Vec<Operation>,
    unicode_chars: BTreeSet<char>,
}

impl<'a> ContentBuilder<'a> {
    pub fn new(fonts: &'a FontSet) -> Self {
        Self {
            fonts,
            operations: Vec::new(),
            unicode_chars: BTreeSet::new(),
        }
    }

    /// Draw `text` with its baseline starting at (x, y)
    pub fn add_text(&mut self, font: &FontSpec, x: f64, y: f64, text: &str) {
        let face = self.fonts.select(font.font, text);
        if face.is_unicode() {
            self.unicode_chars.extend(text.chars());
        }

        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("g", vec![Object::Integer(0)]),
            Operation::new("Tf", vec![name(face.resource()), real(font.size)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![face.encode(text)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Encode the content stream and return it with the characters that
    /// were drawn with the Unicode font.
    pub fn finish(self) -> Result<(Vec<u8>, BTreeSet<char>)> {
        let content = Content {
            operations: self.operations,
        };
        let bytes = content
            .encode()
            .map_err(|e| ComposeError::render(format!("Failed to encode page content: {}", e)))?;
        Ok((bytes, self.unicode_chars))
    }
}

impl TextCanvas for ContentBuilder<'_> {
    fn text_width(&self, font: &FontSpec, text: &str) -> f64 {
        self.fonts.select(font.font, text).text_width(text, font.size)
    }

    fn draw_string(&mut self, font: &FontSpec, x: f64, y: f64, text: &str) {
        self.add_text(font, x, y, text);
    }
}

pub(crate) fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// PDF reals are single precision in lopdf
pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ComposeError::render(format!("Failed to compress content stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fonts::StandardFont;
    use std::io::Read;

    const BODY: FontSpec = FontSpec::new(StandardFont::Helvetica, 10.0);

    #[test]
    fn test_empty_builder_encodes_nothing() {
        let fonts = FontSet::new(&[StandardFont::Helvetica], None);
        let (bytes, unicode_chars) = ContentBuilder::new(&fonts).finish().unwrap();
        assert!(bytes.is_empty());
        assert!(unicode_chars.is_empty());
    }

    #[test]
    fn test_add_text_is_wrapped_in_graphics_state() {
        let fonts = FontSet::new(&[StandardFont::Helvetica], None);
        let mut builder = ContentBuilder::new(&fonts);
        builder.add_text(&BODY, 36.0, 792.89, "Hello");
        let (bytes, _) = builder.finish().unwrap();

        let decoded = Content::decode(&bytes).unwrap();
        let ops: Vec<&str> = decoded.operations.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(ops, ["q", "BT", "g", "Tf", "Td", "Tj", "ET", "Q"]);
        assert_eq!(decoded.operations[5].operands[0].as_str().unwrap(), b"Hello");
    }

    #[test]
    fn test_finish_encodes_stream() {
        let fonts = FontSet::new(&[StandardFont::Helvetica], None);
        let mut builder = ContentBuilder::new(&fonts);
        builder.add_text(&BODY, 10.0, 20.0, "(paren)");
        let (bytes, unicode_chars) = builder.finish().unwrap();

        let decoded = Content::decode(&bytes).unwrap();
        assert_eq!(decoded.operations.len(), 8);
        assert_eq!(decoded.operations[5].operands[0].as_str().unwrap(), b"(paren)");
        assert!(unicode_chars.is_empty());
    }

    #[test]
    fn test_text_width_uses_selected_face() {
        let fonts = FontSet::new(&[StandardFont::Helvetica], None);
        let builder = ContentBuilder::new(&fonts);
        let width = builder.text_width(&BODY, "Hello");
        assert!((width - 22.78).abs() < 1e-9);
    }

    #[test]
    fn test_compress_data_roundtrip() {
        let data = b"q BT /F1 10 Tf 36 792 Td (Lot 42) Tj ET Q".repeat(10);
        let compressed = compress_data(&data).unwrap();
        assert!(compressed.len() < data.len());

        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
