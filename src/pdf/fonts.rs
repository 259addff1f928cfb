use std::collections::BTreeSet;
use std::fs;

use fontdb::Database;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::Face;

use crate::error::{ComposeError, Result};

/// Standard PDF Type1 fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// Get the PDF BaseFont name for this font
    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Advance width of `c` in 1/1000 text space units.
    ///
    /// Only Helvetica and Courier metrics are built in; the Times faces are
    /// measured with Helvetica widths, which is close enough for wrapping.
    pub fn char_width(&self, c: char) -> f64 {
        match self {
            StandardFont::Courier
            | StandardFont::CourierBold
            | StandardFont::CourierOblique
            | StandardFont::CourierBoldOblique => 600.0,
            _ => helvetica_char_width(c),
        }
    }

    /// Width of `text` in points at `size`.
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        let units: f64 = text.chars().map(|c| self.char_width(c)).sum();
        units * size / 1000.0
    }
}

/// Helvetica AFM widths for the printable ASCII range (32..=126).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Width used for characters outside the built-in Helvetica table.
const FALLBACK_CHAR_WIDTH: f64 = 556.0;

fn helvetica_char_width(c: char) -> f64 {
    match c {
        ' '..='~' => f64::from(HELVETICA_WIDTHS[c as usize - 32]),
        _ => FALLBACK_CHAR_WIDTH,
    }
}

/// Map a character to its WinAnsiEncoding byte, if it has one.
pub fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Encode text for a standard font. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect()
}

/// True when `text` has characters a WinAnsi-encoded standard font cannot show.
pub fn needs_unicode_font(text: &str) -> bool {
    text.chars().any(|c| win_ansi_byte(c).is_none())
}

/// CID for a character under Identity-H. Only the BMP is addressable.
fn cid_for(c: char) -> u16 {
    u16::try_from(u32::from(c)).unwrap_or(u16::from(b'?'))
}

/// Encode text for CID font (Identity-H encoding)
///
/// Each character becomes its big-endian UTF-16 code unit; characters outside
/// the BMP are replaced with `?`.
pub fn encode_cid_text(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for c in s.chars() {
        out.extend_from_slice(&cid_for(c).to_be_bytes());
    }
    out
}

/// Create a font in the PDF document
pub fn create_font(doc: &mut Document, font: StandardFont) -> ObjectId {
    let mut font_dict = Dictionary::new();
    font_dict.set("Type", "Font");
    font_dict.set("Subtype", "Type1");
    font_dict.set("BaseFont", font.base_font_name());
    font_dict.set("Encoding", "WinAnsiEncoding");
    doc.add_object(Object::Dictionary(font_dict))
}

/// Families tried, in order, when text needs glyphs beyond WinAnsi.
const UNICODE_FONT_FAMILIES: [&str; 8] = [
    "DejaVu Sans",
    "Noto Sans",
    "Liberation Sans",
    "Arial",
    "Arial Unicode MS",
    "Verdana",
    "Segoe UI",
    "FreeSans",
];

/// A TrueType font loaded from disk, embedded as a CID font when used.
#[derive(Debug, Clone)]
pub struct UnicodeFont {
    family: String,
    data: Vec<u8>,
}

impl UnicodeFont {
    /// Wrap raw font data. Returns `None` unless the data is a single
    /// TrueType-outline face.
    pub fn from_data(family: &str, data: Vec<u8>) -> Option<Self> {
        let usable = Face::parse(&data, 0)
            .map(|face| face.tables().glyf.is_some())
            .unwrap_or(false);
        usable.then(|| Self {
            family: family.to_string(),
            data,
        })
    }

    /// Find a system font that covers Latin Extended text
    pub fn from_system() -> Option<Self> {
        let mut db = Database::new();
        db.load_system_fonts();

        for family in UNICODE_FONT_FAMILIES {
            let query = fontdb::Query {
                families: &[fontdb::Family::Name(family)],
                ..Default::default()
            };
            let Some(id) = db.query(&query) else {
                continue;
            };
            let Some((source, index)) = db.face_source(id) else {
                continue;
            };
            // Collections cannot be embedded as FontFile2
            if index != 0 {
                continue;
            }
            let data = match source {
                fontdb::Source::File(path) => match fs::read(&path) {
                    Ok(data) => data,
                    Err(err) => {
                        log::debug!("Skipping font {:?}: {}", path, err);
                        continue;
                    }
                },
                fontdb::Source::Binary(data) => data.as_ref().as_ref().to_vec(),
                _ => continue,
            };
            if let Some(font) = UnicodeFont::from_data(family, data) {
                return Some(font);
            }
        }

        None
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// PostScript-safe name for BaseFont
    pub fn base_font_name(&self) -> String {
        self.family.replace(' ', "")
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    fn char_width_units(face: &Face<'_>, c: char) -> f64 {
        let c = if cid_for(c) == u16::from(b'?') { '?' } else { c };
        let units_per_em = f64::from(face.units_per_em());
        face.glyph_index(c)
            .and_then(|gid| face.glyph_hor_advance(gid))
            .map(|advance| f64::from(advance) * 1000.0 / units_per_em)
            .unwrap_or(FALLBACK_CHAR_WIDTH)
    }

    /// Width of `text` in points at `size`.
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        match self.face() {
            Some(face) => {
                let units: f64 = text.chars().map(|c| Self::char_width_units(&face, c)).sum();
                units * size / 1000.0
            }
            None => StandardFont::Helvetica.text_width(text, size),
        }
    }
}

/// Build a CIDToGIDMap stream from font's cmap table
///
/// With Identity-H the CID is the Unicode code point, so every BMP code point
/// maps to the glyph the font's cmap assigns it (GID 0 when absent).
fn build_cidtogid_map(face: &Face<'_>) -> Vec<u8> {
    const MAX_CID: u16 = 0xFFFF;
    let mut gid_map: Vec<u8> = Vec::with_capacity((MAX_CID as usize + 1) * 2);

    for cid in 0..=MAX_CID {
        let gid = char::from_u32(u32::from(cid))
            .and_then(|ch| face.glyph_index(ch))
            .map(|g| g.0)
            .unwrap_or(0);
        gid_map.extend_from_slice(&gid.to_be_bytes());
    }

    gid_map
}

/// Embed a CID-keyed font for text outside WinAnsi
///
/// This creates a Type0 font with a CIDFontType2 descendant. Widths are
/// written for the characters in `used_chars` only.
pub fn embed_cid_font(
    doc: &mut Document,
    font: &UnicodeFont,
    used_chars: &BTreeSet<char>,
) -> Result<ObjectId> {
    let face = font.face().ok_or_else(|| {
        ComposeError::Render(format!("Font {} could not be parsed", font.family))
    })?;
    let base_font = font.base_font_name();
    let units_per_em = f64::from(face.units_per_em());
    let to_pdf_units = |v: i16| -> i64 { (f64::from(v) * 1000.0 / units_per_em).round() as i64 };

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", "Font");
    cid_font.set("Subtype", "CIDFontType2");
    cid_font.set("BaseFont", base_font.as_str());
    cid_font.set("CIDSystemInfo", {
        let mut cid_system = Dictionary::new();
        cid_system.set("Registry", Object::String("Adobe".into(), StringFormat::Literal));
        cid_system.set("Ordering", Object::String("Identity".into(), StringFormat::Literal));
        cid_system.set("Supplement", 0i64);
        Object::Dictionary(cid_system)
    });

    let cidtogid_id = doc.add_object(Stream::new(Dictionary::new(), build_cidtogid_map(&face)));
    cid_font.set("CIDToGIDMap", Object::Reference(cidtogid_id));

    let cids: BTreeSet<u16> = used_chars.iter().map(|c| cid_for(*c)).collect();
    let mut widths = Vec::with_capacity(cids.len() * 2);
    for cid in cids {
        let c = char::from_u32(u32::from(cid)).unwrap_or('?');
        let width = UnicodeFont::char_width_units(&face, c).round() as i64;
        widths.push(Object::Integer(i64::from(cid)));
        widths.push(Object::Array(vec![Object::Integer(width)]));
    }
    cid_font.set("W", Object::Array(widths));

    let bbox = face.global_bounding_box();
    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", "FontDescriptor");
    font_descriptor.set("FontName", base_font.as_str());
    font_descriptor.set("Flags", 4i64); // Symbolic
    font_descriptor.set(
        "FontBBox",
        [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max]
            .into_iter()
            .map(|v| Object::Integer(to_pdf_units(v)))
            .collect::<Vec<_>>(),
    );
    font_descriptor.set("ItalicAngle", 0i64);
    font_descriptor.set("Ascent", to_pdf_units(face.ascender()));
    font_descriptor.set("Descent", to_pdf_units(face.descender()));
    font_descriptor.set("CapHeight", face.capital_height().map(to_pdf_units).unwrap_or(700));
    font_descriptor.set("StemV", 80i64);

    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", font.data.len() as i64);
    let font_stream_id = doc.add_object(Stream::new(font_stream_dict, font.data.clone()));
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));

    let descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let mut type0_font = Dictionary::new();
    type0_font.set("Type", "Font");
    type0_font.set("Subtype", "Type0");
    type0_font.set("BaseFont", base_font.as_str());
    type0_font.set("Encoding", "Identity-H");
    type0_font.set("DescendantFonts", vec![Object::Reference(cid_font_id)]);

    Ok(doc.add_object(Object::Dictionary(type0_font)))
}

/// The face picked to draw one string.
#[derive(Debug, Clone, Copy)]
pub enum FaceChoice<'a> {
    Standard { font: StandardFont, resource: &'a str },
    Unicode { font: &'a UnicodeFont, resource: &'a str },
}

impl FaceChoice<'_> {
    /// Resource name used with `Tf`
    pub fn resource(&self) -> &str {
        match self {
            FaceChoice::Standard { resource, .. } | FaceChoice::Unicode { resource, .. } => *resource,
        }
    }

    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        match self {
            FaceChoice::Standard { font, .. } => font.text_width(text, size),
            FaceChoice::Unicode { font, .. } => font.text_width(text, size),
        }
    }

    /// String operand for `Tj`
    pub fn encode(&self, text: &str) -> Object {
        match self {
            FaceChoice::Standard { .. } => {
                Object::String(encode_win_ansi(text), StringFormat::Literal)
            }
            FaceChoice::Unicode { .. } => {
                Object::String(encode_cid_text(text), StringFormat::Hexadecimal)
            }
        }
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, FaceChoice::Unicode { .. })
    }
}

/// Fonts available to one page, with their resource names.
#[derive(Debug, Clone)]
pub struct FontSet {
    standard: Vec<(StandardFont, String)>,
    unicode: Option<(UnicodeFont, String)>,
}

impl FontSet {
    pub fn new(fonts: &[StandardFont], unicode: Option<UnicodeFont>) -> Self {
        let mut standard: Vec<(StandardFont, String)> = Vec::new();
        for font in fonts {
            if !standard.iter().any(|(f, _)| f == font) {
                let name = format!("F{}", standard.len() + 1);
                standard.push((*font, name));
            }
        }
        if standard.is_empty() {
            standard.push((StandardFont::Helvetica, "F1".to_string()));
        }
        Self {
            standard,
            unicode: unicode.map(|font| (font, "FU1".to_string())),
        }
    }

    /// Build the font set for a page drawing `texts`.
    ///
    /// The system font database is only scanned when some text cannot be
    /// shown with a standard font.
    pub fn for_texts(fonts: &[StandardFont], texts: &[&str]) -> Self {
        let unicode = if texts.iter().any(|t| needs_unicode_font(t)) {
            let found = UnicodeFont::from_system();
            match &found {
                Some(font) => log::debug!("Using system font {} for non-Latin text", font.family()),
                None => log::warn!(
                    "No Unicode system font found; unsupported characters will print as '?'"
                ),
            }
            found
        } else {
            None
        };
        Self::new(fonts, unicode)
    }

    /// Pick the face that will draw `text` in `font`.
    pub fn select(&self, font: StandardFont, text: &str) -> FaceChoice<'_> {
        if needs_unicode_font(text) {
            if let Some((unicode, resource)) = &self.unicode {
                return FaceChoice::Unicode {
                    font: unicode,
                    resource: resource.as_str(),
                };
            }
        }
        let (font, resource) = self
            .standard
            .iter()
            .find(|(f, _)| *f == font)
            .unwrap_or(&self.standard[0]);
        FaceChoice::Standard {
            font: *font,
            resource: resource.as_str(),
        }
    }

    /// Add the font objects to `doc` and return the page's /Font dictionary.
    pub fn register(&self, doc: &mut Document, unicode_chars: &BTreeSet<char>) -> Result<Dictionary> {
        let mut font_resources = Dictionary::new();
        for (font, name) in &self.standard {
            let font_id = create_font(doc, *font);
            font_resources.set(name.as_str(), Object::Reference(font_id));
        }
        if let Some((font, name)) = &self.unicode {
            if !unicode_chars.is_empty() {
                let font_id = embed_cid_font(doc, font, unicode_chars)?;
                font_resources.set(name.as_str(), Object::Reference(font_id));
            }
        }
        Ok(font_resources)
    }
}
