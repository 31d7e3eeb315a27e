//! Rendering engine port
//!
//! The session never touches PDF internals; it asks an engine for a
//! document, asks the document for pages, and asks pages for rasters.

use crate::error::ReaderError;
use async_trait::async_trait;
use std::sync::Arc;

/// Page dimensions in PDF points at scale 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// A rendered page at some output scale
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// Extracted page text, for displays that cannot show pixels
    pub text: String,
}

impl Raster {
    /// Pixel dimensions for a page rendered at `scale`
    pub fn dimensions(size: PageSize, scale: f64) -> (u32, u32) {
        let scaled = size.scaled(scale);
        (
            scaled.width.round().max(1.0) as u32,
            scaled.height.round().max(1.0) as u32,
        )
    }
}

/// Opens documents from raw bytes
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn open(&self, bytes: Vec<u8>) -> Result<Arc<dyn PdfDocument>, ReaderError>;
}

/// An opened document
#[async_trait]
pub trait PdfDocument: Send + Sync {
    fn page_count(&self) -> u32;

    /// Fetch a page by 1-based number
    async fn page(&self, number: u32) -> Result<Box<dyn PdfPage>, ReaderError>;
}

/// One page of an opened document
#[async_trait]
pub trait PdfPage: Send + Sync {
    fn number(&self) -> u32;

    /// Intrinsic size at scale 1
    fn size(&self) -> PageSize;

    /// Rasterize at the given output scale
    async fn render(&self, scale: f64) -> Result<Raster, ReaderError>;
}
