//! Reader configuration and viewport math

use super::engine::PageSize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest allowed zoom factor
pub const MIN_ZOOM: f64 = 0.5;

/// Largest allowed zoom factor
pub const MAX_ZOOM: f64 = 3.0;

/// Zoom change per keyboard step
pub const ZOOM_STEP: f64 = 0.25;

/// Rasters are never rendered below this pixel density
pub const MIN_PIXEL_RATIO: f64 = 1.5;

/// The document a session reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookConfig {
    /// Identifier used for the progress record
    pub id: String,
    /// Resource path of the PDF
    pub pdf_path: String,
    /// Human readable title, also used for download file names
    pub title: String,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            id: "loQueViEnTusOjos".to_string(),
            pdf_path: "/src/books/iseeyoureyes/iseeonyoureyes.pdf".to_string(),
            title: "Lo Que Vi En Tus Ojos".to_string(),
        }
    }
}

/// Space available for the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Knobs for a reader session
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    pub viewport: Viewport,
    /// Margin subtracted from each viewport dimension before fitting
    pub padding: f64,
    /// Display pixel density; raised to [`MIN_PIXEL_RATIO`] when lower
    pub device_pixel_ratio: f64,
    /// Scale before the first page is fitted
    pub initial_scale: f64,
    /// Pause between the page-turn cue and the render
    pub page_turn_delay: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            padding: 40.0,
            device_pixel_ratio: 1.0,
            initial_scale: 1.5,
            page_turn_delay: Duration::from_millis(300),
        }
    }
}

/// Scale that makes the page fill the padded viewport without overflow
pub fn fit_scale(viewport: Viewport, padding: f64, page: PageSize) -> f64 {
    if page.width <= 0.0 || page.height <= 0.0 {
        return 1.0;
    }
    let available_width = (viewport.width - padding).max(1.0);
    let available_height = (viewport.height - padding).max(1.0);
    (available_width / page.width).min(available_height / page.height)
}

/// Clamp a zoom factor into `[MIN_ZOOM, MAX_ZOOM]`
pub fn clamp_zoom(scale: f64) -> f64 {
    scale.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Raster scale for a display scale at the given pixel density
pub fn output_scale(scale: f64, device_pixel_ratio: f64) -> f64 {
    scale * device_pixel_ratio.max(MIN_PIXEL_RATIO)
}
