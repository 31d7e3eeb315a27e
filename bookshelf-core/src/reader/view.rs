//! Display port driven by the reader session

use super::engine::{PageSize, Raster};
use crate::progress::ProgressRecord;
use serde::{Deserialize, Serialize};

/// Page navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Prev,
    Next,
}

/// A rendered page ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct PageFrame {
    pub page: u32,
    pub total_pages: u32,
    /// Display scale; the raster itself is denser
    pub scale: f64,
    /// Size the page occupies on screen
    pub display: PageSize,
    pub raster: Raster,
}

/// Everything the session needs from its host UI
///
/// Only page display, progress and alerts are required; the rest are
/// cosmetic and default to no-ops.
pub trait ReaderView: Send + Sync {
    fn show_page(&self, frame: &PageFrame);

    fn update_progress(&self, current_page: u32, total_pages: u32, percent: u32);

    /// Blocking, user-visible error
    fn alert(&self, message: &str);

    fn set_navigation(&self, _can_prev: bool, _can_next: bool) {}

    /// Transitional cue before a page change
    fn page_turn(&self, _direction: Direction) {}

    fn zoom_changed(&self, _scale: f64) {}

    /// Lock or release page scrolling behind the reader
    fn set_scroll_lock(&self, _locked: bool) {}

    /// Refresh progress shown outside the reader (library cards, details page)
    fn refresh_library_progress(&self, _book_id: &str, _record: &ProgressRecord) {}
}
