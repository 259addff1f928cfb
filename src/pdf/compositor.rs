//! Merge the transformed source page into the background page.
//!
//! The source page is copied into the background document as a Form XObject
//! (its decoded content, its MediaBox as BBox, its resources deep-copied).
//! The background page keeps its own content, fenced by `q`/`Q`, and gets
//! one more content stream that draws the form: `q a b c d e f cm /Src Do Q`.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::content::{name, real};
use super::document::{first_page_id, save_to_bytes};
use super::resources::add_xobject_resource;
use super::source::SourceDocument;
use crate::error::{ComposeError, Result, ResultExt};
use crate::layout::{Geometry, Transform};

/// Resource name prefix for the placed source page
const FORM_PREFIX: &str = "Src";

/// The single page everything is merged onto
pub struct BackgroundPage {
    doc: Document,
    page_id: ObjectId,
}

impl BackgroundPage {
    pub fn load_mem(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).pdf_context(|| "Failed to parse background page".to_string())?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: Document) -> Result<Self> {
        let page_id =
            first_page_id(&doc).ok_or_else(|| ComposeError::render("Background document has no page"))?;
        Ok(Self { doc, page_id })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_id(&self) -> ObjectId {
        self.page_id
    }

    /// Draw the source page on top of the existing content, mapped through
    /// `transform`.
    ///
    /// The page is only changed if the whole merge succeeds.
    pub fn merge_transformed(&mut self, source: &SourceDocument, transform: Transform) -> Result<()> {
        let mut doc = self.doc.clone();
        let form_id = import_page_as_form(&mut doc, source)?;
        let form_name = add_xobject_resource(&mut doc, self.page_id, FORM_PREFIX, form_id)?;
        let overlay = draw_form_content(&form_name, transform)?;
        wrap_page_content(&mut doc, self.page_id, overlay)?;

        log::debug!(
            "Placed source page as /{} with matrix {:?}",
            form_name,
            transform.coefficients()
        );
        self.doc = doc;
        Ok(())
    }

    pub fn to_bytes(mut self) -> Result<Vec<u8>> {
        save_to_bytes(&mut self.doc)
    }
}

/// Matrix that takes the source page's MediaBox corner to the placed origin.
///
/// The lower-left MediaBox corner is moved to (0, 0) before scaling, so
/// pages whose box does not start at the origin land in the same place.
pub fn placement_transform(source: &SourceDocument, geometry: &Geometry) -> Transform {
    let media_box = source.media_box();
    Transform::translate(-media_box.llx, -media_box.lly).then(geometry.transform())
}

/// Merge `source` onto the serialized background page and serialize the
/// result.
pub fn compose_pages(background: &[u8], source: &SourceDocument, geometry: &Geometry) -> Result<Vec<u8>> {
    let mut page = BackgroundPage::load_mem(background)?;
    page.merge_transformed(source, placement_transform(source, geometry))?;
    page.to_bytes()
}

fn import_page_as_form(doc: &mut Document, source: &SourceDocument) -> Result<ObjectId> {
    let content = source.content()?;
    let resources = match source.resources() {
        Some(resources) => ObjectImporter::new(source.document(), doc).import_dictionary(&resources)?,
        None => Dictionary::new(),
    };

    let bbox = source.media_box();
    let mut dict = Dictionary::new();
    dict.set("Type", "XObject");
    dict.set("Subtype", "Form");
    dict.set("FormType", 1i64);
    dict.set(
        "BBox",
        vec![real(bbox.llx), real(bbox.lly), real(bbox.urx), real(bbox.ury)],
    );
    dict.set("Resources", Object::Dictionary(resources));

    Ok(doc.add_object(Stream::new(dict, content)))
}

fn draw_form_content(form_name: &str, transform: Transform) -> Result<Vec<u8>> {
    let matrix = transform.coefficients().iter().map(|&v| real(v)).collect();
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("cm", matrix),
            Operation::new("Do", vec![name(form_name)]),
            Operation::new("Q", vec![]),
        ],
    };
    content
        .encode()
        .map_err(|e| ComposeError::render(format!("Failed to encode overlay content: {}", e)))
}

/// Replace the page's /Contents with `[q, <existing...>, Q, overlay]`
fn wrap_page_content(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let existing = doc.get_page_contents(page_id);
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(open_id));
    contents.extend(existing.into_iter().map(Object::Reference));
    contents.push(Object::Reference(close_id));
    contents.push(Object::Reference(overlay_id));

    doc.get_dictionary_mut(page_id)
        .pdf_context(|| format!("Background page {:?} is missing", page_id))?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// Deep copy of objects from one document into another.
///
/// Each source object is copied once; references are rewritten to the new
/// ids. `/Parent` links are not followed so a copy never drags in the
/// source page tree.
struct ObjectImporter<'a> {
    source: &'a Document,
    target: &'a mut Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectImporter<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            mapped: HashMap::new(),
        }
    }

    fn import_reference(&mut self, id: ObjectId) -> Result<ObjectId> {
        if let Some(&new_id) = self.mapped.get(&id) {
            return Ok(new_id);
        }

        let source = self.source;
        let object = source
            .get_object(id)
            .pdf_context(|| format!("Source object {:?} is missing", id))?;

        // Registered before recursing so cycles resolve to the same id
        let new_id = self.target.new_object_id();
        self.mapped.insert(id, new_id);
        let copied = self.import_object(object)?;
        self.target.objects.insert(new_id, copied);
        Ok(new_id)
    }

    fn import_object(&mut self, object: &Object) -> Result<Object> {
        Ok(match object {
            Object::Reference(id) => Object::Reference(self.import_reference(*id)?),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import_object(item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(dict)?),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dictionary(&stream.dict)?;
                Object::Stream(copy)
            }
            other => other.clone(),
        })
    }

    fn import_dictionary(&mut self, dict: &Dictionary) -> Result<Dictionary> {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.import_object(value)?);
        }
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayoutConfig, A4};
    use crate::layout::compute_geometry;
    use crate::pdf::background::render_background;
    use crate::pdf::source::fixtures::{dangling_resource_pdf_bytes, source_pdf_bytes};

    fn background_bytes(geometry: &Geometry) -> Vec<u8> {
        render_background("Lot 42", "Lot 42", geometry, &LayoutConfig::a4())
            .unwrap()
            .bytes
    }

    fn page_operators(doc: &Document) -> Vec<Operation> {
        let page_id = first_page_id(doc).unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        Content::decode(&content).unwrap().operations
    }

    #[test]
    fn test_merge_keeps_background_and_draws_form_last() {
        let source = SourceDocument::load_mem(&source_pdf_bytes(200.0, 80.0)).unwrap();
        let geometry = compute_geometry(A4, 200.0, 80.0, 360.0, 14.0);
        let bytes = compose_pages(&background_bytes(&geometry), &source, &geometry).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let ops = page_operators(&doc);
        let names: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(names.first(), Some(&"q"));
        assert_eq!(&names[names.len() - 4..], ["q", "cm", "Do", "Q"]);

        let tj_count = names.iter().filter(|n| **n == "Tj").count();
        assert_eq!(tj_count, 2, "top text line and label survive the merge");
        let tj_pos = names.iter().rposition(|n| *n == "Tj").unwrap();
        let do_pos = names.iter().position(|n| *n == "Do").unwrap();
        assert!(tj_pos < do_pos);

        let cm = &ops[ops.len() - 3];
        let matrix: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
        assert!((matrix[0] - 1.8).abs() < 1e-4);
        assert!((matrix[3] - 1.8).abs() < 1e-4);
        assert!((matrix[4] as f64 - geometry.origin_x).abs() < 1e-3);
        assert!((matrix[5] as f64 - geometry.origin_y).abs() < 1e-3);
    }

    #[test]
    fn test_form_carries_source_resources() {
        let source = SourceDocument::load_mem(&source_pdf_bytes(200.0, 80.0)).unwrap();
        let geometry = compute_geometry(A4, 200.0, 80.0, 360.0, 14.0);
        let mut page = BackgroundPage::load_mem(&background_bytes(&geometry)).unwrap();
        page.merge_transformed(&source, placement_transform(&source, &geometry))
            .unwrap();

        let doc = page.document();
        let page_dict = doc.get_dictionary(page.page_id()).unwrap();
        let resources = page_dict.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.has(b"Font"), "background fonts are kept");

        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let form_id = xobjects.get(b"Src").unwrap().as_reference().unwrap();
        let form = doc.get_object(form_id).unwrap().as_stream().unwrap();
        assert_eq!(form.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");

        let bbox = form.dict.get(b"BBox").unwrap().as_array().unwrap();
        assert_eq!(bbox[2].as_float().unwrap(), 200.0);
        assert_eq!(bbox[3].as_float().unwrap(), 80.0);

        let form_fonts = form
            .dict
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"Font"))
            .and_then(Object::as_dict)
            .unwrap();
        let font_id = form_fonts.get(b"F1").unwrap().as_reference().unwrap();
        let font = doc.get_dictionary(font_id).unwrap();
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
        assert!(form.content.starts_with(b"0 0 0 rg"));
    }

    #[test]
    fn test_failed_merge_leaves_page_untouched() {
        let source = SourceDocument::load_mem(&dangling_resource_pdf_bytes(200.0, 80.0)).unwrap();

        let geometry = compute_geometry(A4, 200.0, 80.0, 360.0, 14.0);
        let mut page = BackgroundPage::load_mem(&background_bytes(&geometry)).unwrap();
        let before = page.document().get_page_contents(page.page_id());

        let err = page
            .merge_transformed(&source, placement_transform(&source, &geometry))
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert_eq!(page.document().get_page_contents(page.page_id()), before);
    }

    #[test]
    fn test_placement_compensates_media_box_offset() {
        let mut doc = Document::load_mem(&source_pdf_bytes(200.0, 80.0)).unwrap();
        let pages_id = doc.catalog().unwrap().get(b"Pages").unwrap().as_reference().unwrap();
        doc.get_dictionary_mut(pages_id).unwrap().set(
            "MediaBox",
            vec![real(50.0), real(20.0), real(250.0), real(100.0)],
        );
        let source = SourceDocument::from_document(doc).unwrap();

        let geometry = compute_geometry(A4, 200.0, 80.0, 360.0, 14.0);
        let (x, y) = placement_transform(&source, &geometry).apply(50.0, 20.0);
        assert!((x - geometry.origin_x).abs() < 1e-9);
        assert!((y - geometry.origin_y).abs() < 1e-9);
    }

    #[test]
    fn test_importer_copies_each_object_once() {
        let mut source = Document::with_version("1.5");
        let shared = source.add_object(Object::Integer(7));
        let mut dict = Dictionary::new();
        dict.set("A", Object::Reference(shared));
        dict.set("B", Object::Reference(shared));
        dict.set("Parent", Object::Reference((500, 0)));

        let mut target = Document::with_version("1.5");
        let copy = ObjectImporter::new(&source, &mut target)
            .import_dictionary(&dict)
            .unwrap();

        let a = copy.get(b"A").unwrap().as_reference().unwrap();
        let b = copy.get(b"B").unwrap().as_reference().unwrap();
        assert_eq!(a, b);
        assert!(!copy.has(b"Parent"));
        assert_eq!(target.objects.len(), 1);
    }
}
