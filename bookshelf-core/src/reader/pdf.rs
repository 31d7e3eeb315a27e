//! Render engine backed by lopdf
//!
//! Reads the page tree and page geometry. Rasters carry the page's text
//! rather than pixels, which is what a terminal can display.

use super::engine::{PageSize, PdfDocument, PdfPage, Raster, RenderEngine};
use crate::error::ReaderError;
use async_trait::async_trait;
use lopdf::{Document, Object, ObjectId};
use std::sync::Arc;

/// US Letter, used when a page tree has no MediaBox at all
const FALLBACK_PAGE_SIZE: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

/// Parent chains deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 64;

/// Engine that opens PDFs with lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RenderEngine for LopdfEngine {
    async fn open(&self, bytes: Vec<u8>) -> Result<Arc<dyn PdfDocument>, ReaderError> {
        let document = tokio::task::spawn_blocking(move || Document::load_mem(&bytes))
            .await
            .map_err(|e| ReaderError::DocumentLoad(format!("Task failed: {}", e)))?
            .map_err(|e| ReaderError::DocumentLoad(e.to_string()))?;

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        tracing::debug!(pages = pages.len(), "opened PDF document");

        Ok(Arc::new(LopdfDocument {
            document: Arc::new(document),
            pages,
        }))
    }
}

struct LopdfDocument {
    document: Arc<Document>,
    /// Page object ids in page order
    pages: Vec<ObjectId>,
}

#[async_trait]
impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn page(&self, number: u32) -> Result<Box<dyn PdfPage>, ReaderError> {
        let id = number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or(ReaderError::PageOutOfRange {
                page: number,
                total: self.page_count(),
            })?;

        Ok(Box::new(LopdfPage {
            document: Arc::clone(&self.document),
            number,
            size: page_size(&self.document, id),
        }))
    }
}

struct LopdfPage {
    document: Arc<Document>,
    number: u32,
    size: PageSize,
}

#[async_trait]
impl PdfPage for LopdfPage {
    fn number(&self) -> u32 {
        self.number
    }

    fn size(&self) -> PageSize {
        self.size
    }

    async fn render(&self, scale: f64) -> Result<Raster, ReaderError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ReaderError::PageRender {
                page: self.number,
                reason: format!("invalid scale {}", scale),
            });
        }

        let document = Arc::clone(&self.document);
        let number = self.number;
        let text = tokio::task::spawn_blocking(move || document.extract_text(&[number]))
            .await
            .map_err(|e| ReaderError::PageRender {
                page: number,
                reason: format!("Task failed: {}", e),
            })?
            .unwrap_or_else(|e| {
                // Pages with unsupported fonts still have geometry worth showing
                tracing::debug!(page = number, "no extractable text: {}", e);
                String::new()
            });

        let (width, height) = Raster::dimensions(self.size, scale);
        Ok(Raster {
            width,
            height,
            text,
        })
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(document: &Document, object: &Object) -> Option<f64> {
    match resolve(document, object)? {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn rectangle(document: &Document, object: &Object) -> Option<PageSize> {
    let values = resolve(document, object)?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let coords: Vec<f64> = values
        .iter()
        .map(|v| number(document, v))
        .collect::<Option<_>>()?;
    let size = PageSize::new((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs());
    (size.width > 0.0 && size.height > 0.0).then_some(size)
}

/// Page size from the nearest MediaBox up the page tree, honoring /Rotate
fn page_size(document: &Document, page: ObjectId) -> PageSize {
    let mut media_box = None;
    let mut rotate = None;
    let mut current = Some(page);

    for _ in 0..MAX_TREE_DEPTH {
        let Some(id) = current else { break };
        let Ok(dict) = document.get_dictionary(id) else {
            break;
        };
        if media_box.is_none() {
            media_box = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|o| rectangle(document, o));
        }
        if rotate.is_none() {
            rotate = dict.get(b"Rotate").ok().and_then(|o| number(document, o));
        }
        if media_box.is_some() && rotate.is_some() {
            break;
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    }

    let size = media_box.unwrap_or(FALLBACK_PAGE_SIZE);
    let quarter_turns = (rotate.unwrap_or(0.0) / 90.0).round() as i64;
    if quarter_turns.rem_euclid(2) == 1 {
        PageSize::new(size.height, size.width)
    } else {
        size
    }
}
