use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::content::{compress_data, real};
use crate::config::PageSize;
use crate::error::{ComposeError, Result};

/// Give an empty document a catalog and a page tree holding one page.
///
/// `content` is stored Flate-compressed. Returns the page's object id.
pub fn new_single_page(
    doc: &mut Document,
    page: PageSize,
    content: Vec<u8>,
    resources: Dictionary,
) -> Result<ObjectId> {
    let pages_id = doc.new_object_id();

    let mut stream_dict = Dictionary::new();
    stream_dict.set("Filter", "FlateDecode");
    let content_id = doc.add_object(Stream::new(stream_dict, compress_data(&content)?));

    let mut page_dict = Dictionary::new();
    page_dict.set("Type", "Page");
    page_dict.set("Parent", Object::Reference(pages_id));
    page_dict.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            real(page.width),
            real(page.height),
        ]),
    );
    page_dict.set("Resources", Object::Dictionary(resources));
    page_dict.set("Contents", Object::Reference(content_id));
    let page_id = doc.add_object(Object::Dictionary(page_dict));

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", "Pages");
    pages_dict.set("Kids", vec![Object::Reference(page_id)]);
    pages_dict.set("Count", 1i64);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", "Catalog");
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(page_id)
}

/// Object id of the first page in page-tree order
pub fn first_page_id(doc: &Document) -> Option<ObjectId> {
    doc.get_pages().values().next().copied()
}

/// Compress every uncompressed stream and serialize
pub fn save_to_bytes(doc: &mut Document) -> Result<Vec<u8>> {
    doc.compress();
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| ComposeError::render(format!("Failed to serialize PDF: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_single_page_builds_page_tree() {
        let mut doc = Document::with_version("1.5");
        let page_id = new_single_page(
            &mut doc,
            PageSize::new(595.27, 841.89),
            b"q Q".to_vec(),
            Dictionary::new(),
        )
        .unwrap();

        assert_eq!(first_page_id(&doc), Some(page_id));
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert!((media_box[2].as_float().unwrap() - 595.27).abs() < 1e-3);
        assert!((media_box[3].as_float().unwrap() - 841.89).abs() < 1e-3);
    }

    #[test]
    fn test_save_to_bytes_reloads() {
        let mut doc = Document::with_version("1.5");
        new_single_page(&mut doc, PageSize::new(100.0, 50.0), b"q Q".to_vec(), Dictionary::new())
            .unwrap();
        let bytes = save_to_bytes(&mut doc).unwrap();

        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
        let page_id = first_page_id(&reloaded).unwrap();
        assert!(reloaded.get_page_content(page_id).unwrap().starts_with(b"q Q"));
    }
}
