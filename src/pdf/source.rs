//! The externally supplied page that gets placed on the sheet.
//!
//! Only the first page of the source document is used. Its MediaBox and
//! Resources may sit on any ancestor in the page tree.

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::document::first_page_id;
use crate::config::PageSize;
use crate::error::{ComposeError, Result, ResultExt};
use crate::layout::PageSource;

/// Page tree nesting we are willing to walk for inherited attributes
const MAX_TREE_DEPTH: usize = 32;

/// Normalized page rectangle in the page's own units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            llx: x0.min(x1),
            lly: y0.min(y1),
            urx: x0.max(x1),
            ury: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }
}

pub struct SourceDocument {
    doc: Document,
    page_id: ObjectId,
    media_box: PageBox,
}

impl SourceDocument {
    pub fn load_mem(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|source| ComposeError::InvalidSource {
            context: "Failed to parse source PDF".to_string(),
            source,
        })?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: Document) -> Result<Self> {
        let page_id = first_page_id(&doc)
            .ok_or_else(|| ComposeError::validation("Source PDF has no pages"))?;
        let media_box = media_box(&doc, page_id)
            .ok_or_else(|| ComposeError::validation("Source page has no usable MediaBox"))?;

        if !(media_box.width() > 0.0 && media_box.height() > 0.0) {
            return Err(ComposeError::validation(format!(
                "Source page has a degenerate size {}x{}",
                media_box.width(),
                media_box.height()
            )));
        }

        Ok(Self {
            doc,
            page_id,
            media_box,
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_id(&self) -> ObjectId {
        self.page_id
    }

    pub fn media_box(&self) -> PageBox {
        self.media_box
    }

    /// Decoded page content, one stream after another.
    ///
    /// Streams are joined with a newline so operators at a stream boundary
    /// never run together.
    pub fn content(&self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        for stream_id in self.doc.get_page_contents(self.page_id) {
            let stream = self
                .doc
                .get_object(stream_id)
                .and_then(Object::as_stream)
                .pdf_context(|| format!("Source content stream {:?} is missing", stream_id))?;

            if stream.dict.has(b"Filter") {
                let data = stream
                    .decompressed_content()
                    .pdf_context(|| format!("Failed to decode source content stream {:?}", stream_id))?;
                content.extend_from_slice(&data);
            } else {
                content.extend_from_slice(&stream.content);
            }
            content.push(b'\n');
        }
        Ok(content)
    }

    /// The page's resource dictionary, looked up through the page tree
    pub fn resources(&self) -> Option<Dictionary> {
        inherited_attribute(&self.doc, self.page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
    }
}

impl PageSource for SourceDocument {
    fn page_size(&self) -> PageSize {
        PageSize::new(self.media_box.width(), self.media_box.height())
    }
}

/// Look up `key` on the page, then on its ancestors, resolving one level of
/// indirection.
fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageBox> {
    let values = inherited_attribute(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }

    let mut corners = [0.0; 4];
    for (slot, value) in corners.iter_mut().zip(values) {
        let value = match value {
            Object::Reference(id) => doc.get_object(*id).ok()?,
            other => other,
        };
        *slot = number(value)?;
    }
    Some(PageBox::from_corners(corners[0], corners[1], corners[2], corners[3]))
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{empty_pdf_bytes, source_pdf_bytes};
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_load_reads_inherited_media_box() {
        let source = SourceDocument::load_mem(&source_pdf_bytes(200.0, 80.0)).unwrap();
        assert_eq!(source.media_box(), PageBox::from_corners(0.0, 0.0, 200.0, 80.0));
        assert_eq!(source.page_size(), PageSize::new(200.0, 80.0));
    }

    #[test]
    fn test_resources_are_inherited() {
        let source = SourceDocument::load_mem(&source_pdf_bytes(200.0, 80.0)).unwrap();
        let resources = source.resources().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
    }

    #[test]
    fn test_content_is_decoded() {
        let source = SourceDocument::load_mem(&source_pdf_bytes(200.0, 80.0)).unwrap();
        let content = source.content().unwrap();
        assert!(content.starts_with(b"0 0 0 rg"));
        assert_eq!(content.last(), Some(&b'\n'));
    }

    #[test]
    fn test_garbage_is_a_validation_error() {
        let err = SourceDocument::load_mem(b"not a pdf at all").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_no_pages_is_a_validation_error() {
        let err = SourceDocument::load_mem(&empty_pdf_bytes()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("no pages"));
    }

    #[test]
    fn test_zero_width_is_rejected() {
        let err = SourceDocument::load_mem(&source_pdf_bytes(0.0, 80.0)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_inverted_box_is_normalized() {
        let corners = PageBox::from_corners(200.0, 80.0, 0.0, 0.0);
        assert_eq!(corners.width(), 200.0);
        assert_eq!(corners.height(), 80.0);
    }
}
