//! Validates submitted PDFs, merges them in order and checksums the result

use crate::error::{DispatchError, Result};
use dispatch_types::PdfDoc;
use log::debug;
use lopdf::{Document, Object, ObjectId};
use sha2::{Digest, Sha256};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Merged letter content ready to be stored and batched
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledDocument {
    pub content: Vec<u8>,
    pub checksum: String,
    pub page_count: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Validate every document and merge them into one, preserving input order
    pub fn assemble(&self, documents: &[PdfDoc]) -> Result<AssembledDocument> {
        if documents.is_empty() {
            return Err(DispatchError::Validation("At least one document is required".to_string()));
        }

        let parsed = documents
            .iter()
            .map(|doc| self.validate(doc))
            .collect::<Result<Vec<_>>>()?;

        let page_count = parsed.iter().map(|doc| doc.get_pages().len()).sum();

        let content = if documents.len() == 1 {
            documents[0].content.clone()
        } else {
            merge(parsed)?
        };

        let checksum = checksum(&content);
        debug!("Assembled {} document(s), {} page(s), checksum {}", documents.len(), page_count, checksum);

        Ok(AssembledDocument {
            content,
            checksum,
            page_count,
        })
    }

    /// Parse a single document, rejecting anything that is not a PDF with pages
    pub fn validate(&self, doc: &PdfDoc) -> Result<Document> {
        let malformed = |reason: String| DispatchError::PdfMalformed {
            file_name: doc.filename.clone(),
            reason,
        };

        if doc.content.len() < PDF_MAGIC.len() || !doc.content.starts_with(PDF_MAGIC) {
            return Err(malformed("missing %PDF header".to_string()));
        }

        let parsed = Document::load_mem(&doc.content).map_err(|e| malformed(e.to_string()))?;

        if parsed.get_pages().is_empty() {
            return Err(malformed("document has no pages".to_string()));
        }

        Ok(parsed)
    }
}

/// Lowercase hex SHA-256 of the content
pub fn checksum(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Concatenate the pages of several documents under a single page tree
fn merge(documents: Vec<Document>) -> Result<Vec<u8>> {
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects = std::collections::BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        // get_pages is keyed by page number, so this keeps reading order
        for (_, page_id) in doc.get_pages() {
            let page = doc
                .get_object(page_id)
                .map_err(|e| DispatchError::Validation(format!("Failed to read page: {}", e)))?
                .to_owned();
            pages.push((page_id, page));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut page_tree: Option<(ObjectId, Object)> = None;

    for (object_id, object) in objects {
        let type_name = object.type_name().unwrap_or(b"").to_vec();
        match type_name.as_slice() {
            b"Catalog" => {
                if catalog.is_none() {
                    catalog = Some((object_id, object));
                }
            }
            b"Pages" => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    if let Some((_, Object::Dictionary(existing))) = &page_tree {
                        dictionary.extend(existing);
                    }
                    let id = page_tree.as_ref().map(|(id, _)| *id).unwrap_or(object_id);
                    page_tree = Some((id, Object::Dictionary(dictionary)));
                }
            }
            b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (catalog_id, catalog) =
        catalog.ok_or_else(|| DispatchError::Validation("Merged documents have no catalog".to_string()))?;
    let (pages_id, page_tree) =
        page_tree.ok_or_else(|| DispatchError::Validation("Merged documents have no page tree".to_string()))?;

    for (page_id, page) in &pages {
        if let Ok(dictionary) = page.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Parent", Object::Reference(pages_id));
            merged.objects.insert(*page_id, Object::Dictionary(dictionary));
        }
    }

    if let Ok(dictionary) = page_tree.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Count", Object::Integer(pages.len() as i64));
        dictionary.set(
            "Kids",
            Object::Array(pages.iter().map(|(id, _)| Object::Reference(*id)).collect()),
        );
        dictionary.remove(b"Parent");
        merged.objects.insert(pages_id, Object::Dictionary(dictionary));
    }

    if let Ok(dictionary) = catalog.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Pages", Object::Reference(pages_id));
        dictionary.remove(b"Outlines");
        merged.objects.insert(catalog_id, Object::Dictionary(dictionary));
    }

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    let mut buffer = Vec::new();
    merged
        .save_to(&mut buffer)
        .map_err(|e| DispatchError::Validation(format!("Failed to write merged document: {}", e)))?;
    Ok(buffer)
}
