use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{ComposeError, Result, ResultExt};

/// Register `xobject_id` in a page's /XObject resources under a name that
/// does not clash with existing entries. Returns the name used.
///
/// The page's /Resources may be inline or a reference, and so may the
/// /XObject dictionary inside it. Both cases are handled:
/// 1. Read the existing resources and XObject dictionaries (cloned)
/// 2. Pick a free name starting with `prefix`
/// 3. Write the updated dictionaries back where they came from
pub fn add_xobject_resource(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: &str,
    xobject_id: ObjectId,
) -> Result<String> {
    // Get the page's resources
    let resources_ref = doc
        .get_dictionary(page_id)
        .pdf_context(|| format!("Page {:?} is missing", page_id))?
        .get(b"Resources")
        .ok()
        .cloned();

    let (resources_id, mut resources) = match resources_ref {
        Some(Object::Reference(id)) => {
            let dict = doc
                .get_dictionary(id)
                .pdf_context(|| format!("Page resources {:?} are missing", id))?
                .clone();
            (Some(id), dict)
        }
        Some(Object::Dictionary(dict)) => (None, dict),
        Some(_) => return Err(ComposeError::render("Page /Resources is not a dictionary")),
        None => (None, Dictionary::new()),
    };

    // Get the existing XObject dictionary first (before mutable borrow)
    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        Ok(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    };

    let name = free_name(&xobjects, prefix);
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    // Now write the resources back
    match resources_id {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(resources));
        }
        None => {
            doc.get_dictionary_mut(page_id)
                .pdf_context(|| format!("Page {:?} is missing", page_id))?
                .set("Resources", Object::Dictionary(resources));
        }
    }

    Ok(name)
}

/// `prefix`, or `prefix` followed by the first number not yet taken
fn free_name(dict: &Dictionary, prefix: &str) -> String {
    if !dict.has(prefix.as_bytes()) {
        return prefix.to_string();
    }
    (1u32..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !dict.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}
