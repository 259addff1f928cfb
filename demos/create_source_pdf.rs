//! Writes `barcode.pdf` and `text.txt` to try the composer with:
//!
//! ```text
//! cargo run --example create_source_pdf
//! cargo run -- --source barcode.pdf --text text.txt --label "Lot 42"
//! ```

use anyhow::Result;
use printpdf::{BuiltinFont, Mm, PdfDocument, Rect};
use std::io::BufWriter;

/// Bar widths in module units for a made-up symbology; only the look matters.
fn bar_pattern(payload: &str) -> Vec<u8> {
    let mut widths = vec![2, 1, 1, 2];
    for byte in payload.bytes() {
        widths.extend([1 + byte % 3, 1 + (byte / 3) % 2, 1 + (byte / 7) % 3, 1]);
    }
    widths.extend([2, 1, 1, 2]);
    widths
}

fn main() -> Result<()> {
    let payload = "LOT42-2025";
    let (doc, page1, layer1) = PdfDocument::new("Barcode", Mm(70.0), Mm(28.0), "Layer 1");
    let current_layer = doc.get_page(page1).get_layer(layer1);
    let font_ref = doc.add_builtin_font(BuiltinFont::Helvetica)?;

    // Alternate bar, gap, bar...
    let module = 0.35;
    let mut x = 4.0;
    for (i, width) in bar_pattern(payload).into_iter().enumerate() {
        let w = f32::from(width) * module;
        if i % 2 == 0 {
            current_layer.add_rect(Rect::new(Mm(x), Mm(8.0), Mm(x + w), Mm(25.0)));
        }
        x += w;
    }

    current_layer.use_text(payload, 8.0, Mm(4.0), Mm(3.0), &font_ref);

    let file = std::fs::File::create("barcode.pdf")?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer)?;
    std::fs::write("text.txt", "Lot 42\nExp 2025-01-01\nStore below 25 °C\n")?;
    println!("Created barcode.pdf and text.txt");
    Ok(())
}
