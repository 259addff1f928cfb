//! The background page: top text block and label, graphic area left empty.
//!
//! Text runs top-down from `page height - margin`, one line every
//! `font size * line height factor`. Lines that would cross the bottom
//! margin are dropped without a marker; the count is reported in
//! [`BackgroundStats`] only.

use lopdf::{Dictionary, Document, Object};
use serde::Serialize;

use super::content::ContentBuilder;
use super::document::{new_single_page, save_to_bytes};
use super::fonts::FontSet;
use crate::config::{FontSpec, LayoutConfig};
use crate::error::Result;
use crate::layout::Geometry;

/// Surface the background is drawn on.
pub trait TextCanvas {
    /// Width of `text` in points when drawn with `font`
    fn text_width(&self, font: &FontSpec, text: &str) -> f64;

    /// Draw `text` with its baseline starting at (x, y)
    fn draw_string(&mut self, font: &FontSpec, x: f64, y: f64, text: &str);

    /// Draw `text` horizontally centered on `x`
    fn draw_centred_string(&mut self, font: &FontSpec, x: f64, y: f64, text: &str) {
        let width = self.text_width(font, text);
        self.draw_string(font, x - width / 2.0, y, text);
    }
}

/// Greedy word wrap of one paragraph.
///
/// Words wider than `max_width` are broken at character boundaries. A
/// paragraph with no words still yields one empty line.
pub fn wrap_paragraph(paragraph: &str, max_width: f64, measure: impl Fn(&str) -> f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        if measure(word) > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut chunk = String::new();
            for c in word.chars() {
                chunk.push(c);
                if chunk.chars().count() > 1 && measure(&chunk) > max_width {
                    chunk.pop();
                    lines.push(std::mem::replace(&mut chunk, c.to_string()));
                }
            }
            current = chunk;
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{} {}", current, word);
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// One line of the top text with its final position
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f64,
    pub baseline: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<PlacedLine>,
    /// Wrapped lines that did not fit above the bottom margin
    pub dropped: usize,
}

/// Characters that end a paragraph. `\r\n` is one break.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split at line breaks. A break at the very end opens no new paragraph.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        paragraphs.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }
    if start < text.len() {
        paragraphs.push(&text[start..]);
    }
    paragraphs
}

/// Wrap the top text paragraph by paragraph and place it on the page
pub fn layout_top_text(text: &str, config: &LayoutConfig, canvas: &impl TextCanvas) -> TextLayout {
    let font = &config.top_text_font;
    let max_width = config.usable_width();
    let line_height = config.top_line_height();

    let mut paragraphs = split_paragraphs(text);
    if paragraphs.is_empty() {
        paragraphs.push("");
    }

    let wrapped: Vec<String> = paragraphs
        .into_iter()
        .flat_map(|paragraph| wrap_paragraph(paragraph, max_width, |s| canvas.text_width(font, s)))
        .collect();
    let total = wrapped.len();

    let mut layout = TextLayout::default();
    let mut y = config.page.height - config.margin;
    for text in wrapped {
        if y - line_height < config.margin {
            break;
        }
        y -= line_height;
        layout.lines.push(PlacedLine {
            text,
            x: config.margin,
            baseline: y,
        });
    }
    layout.dropped = total - layout.lines.len();
    layout
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackgroundStats {
    /// Line slots used by the top text, blank lines included
    pub lines_drawn: usize,
    pub lines_dropped: usize,
}

/// Draw the top text and the label onto `canvas`
pub fn draw_background(
    canvas: &mut impl TextCanvas,
    top_text: &str,
    label: &str,
    geometry: &Geometry,
    config: &LayoutConfig,
) -> BackgroundStats {
    let layout = layout_top_text(top_text, config, &*canvas);
    for line in layout.lines.iter().filter(|line| !line.text.is_empty()) {
        canvas.draw_string(&config.top_text_font, line.x, line.baseline, &line.text);
    }

    canvas.draw_centred_string(
        &config.label_font,
        geometry.label_anchor_x,
        geometry.label_anchor_y,
        label,
    );

    if layout.dropped > 0 {
        log::debug!(
            "Top text overflows the page: {} of {} lines dropped",
            layout.dropped,
            layout.dropped + layout.lines.len()
        );
    }

    BackgroundStats {
        lines_drawn: layout.lines.len(),
        lines_dropped: layout.dropped,
    }
}

/// A serialized one-page PDF holding the background
pub struct RenderedBackground {
    pub bytes: Vec<u8>,
    pub stats: BackgroundStats,
}

pub fn render_background(
    top_text: &str,
    label: &str,
    geometry: &Geometry,
    config: &LayoutConfig,
) -> Result<RenderedBackground> {
    let fonts = FontSet::for_texts(&config.fonts(), &[top_text, label]);
    let mut builder = ContentBuilder::new(&fonts);
    let stats = draw_background(&mut builder, top_text, label, geometry, config);
    let (content, unicode_chars) = builder.finish()?;

    let mut doc = Document::with_version("1.5");
    let font_resources = fonts.register(&mut doc, &unicode_chars)?;
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(font_resources));
    new_single_page(&mut doc, config.page, content, resources)?;

    let bytes = save_to_bytes(&mut doc)?;
    Ok(RenderedBackground { bytes, stats })
}
