//! PDF reader session
//!
//! A [`ReaderSession`] owns one open document at a time. It restores the
//! saved page on open, renders pages through a [`RenderEngine`], persists
//! progress after every successful render, and reports to a [`ReaderView`].

mod config;
mod engine;
mod pdf;
mod session;
mod view;

pub use config::{
    clamp_zoom, fit_scale, output_scale, BookConfig, ReaderConfig, Viewport, MAX_ZOOM,
    MIN_PIXEL_RATIO, MIN_ZOOM, ZOOM_STEP,
};
pub use engine::{PageSize, PdfDocument, PdfPage, Raster, RenderEngine};
pub use pdf::LopdfEngine;
pub use session::{
    download_filename, ReaderCommand, ReaderPorts, ReaderSession, RenderOutcome,
    LOAD_FAILURE_MESSAGE,
};
pub use view::{Direction, PageFrame, ReaderView};
