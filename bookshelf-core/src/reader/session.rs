//! Reader session: one open document, its position and zoom

use super::config::{clamp_zoom, fit_scale, output_scale, BookConfig, ReaderConfig, ZOOM_STEP};
use super::engine::{PdfDocument, RenderEngine};
use super::view::{Direction, PageFrame, ReaderView};
use crate::error::ReaderError;
use crate::fetch::{AssetRequest, Destination, Fetcher};
use crate::progress::{percent_complete, ProgressRecord, ProgressStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shown when the document cannot be opened
pub const LOAD_FAILURE_MESSAGE: &str = "Error loading the book. Please reload the page.";

/// Collaborators a session talks to
#[derive(Clone)]
pub struct ReaderPorts {
    pub engine: Arc<dyn RenderEngine>,
    /// Where the document bytes come from; may be the asset cache
    pub source: Arc<dyn Fetcher>,
    pub progress: ProgressStore,
    pub view: Arc<dyn ReaderView>,
}

/// What happened to a render request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    /// Another render was in flight; nothing changed
    Dropped,
    /// The request was a no-op (edge page, same zoom, closed session)
    Unchanged,
}

/// Host actions mapped from keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReaderCommand {
    Navigate(Direction),
    Zoom(f64),
    ResetZoom,
    Close,
}

impl ReaderCommand {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(ReaderCommand::Navigate(Direction::Prev)),
            "ArrowRight" => Some(ReaderCommand::Navigate(Direction::Next)),
            "Escape" => Some(ReaderCommand::Close),
            "+" | "=" => Some(ReaderCommand::Zoom(ZOOM_STEP)),
            "-" => Some(ReaderCommand::Zoom(-ZOOM_STEP)),
            "0" => Some(ReaderCommand::ResetZoom),
            _ => None,
        }
    }
}

/// Which zoom a render should use
#[derive(Debug, Clone, Copy)]
enum ZoomTarget {
    /// Whatever zoom the session currently holds
    Current,
    Explicit(f64),
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Opening,
    Open,
}

struct SessionState {
    phase: Phase,
    document: Option<Arc<dyn PdfDocument>>,
    current_page: u32,
    total_pages: u32,
    scale: f64,
    zoom_override: Option<f64>,
}

impl SessionState {
    fn closed(initial_scale: f64) -> Self {
        Self {
            phase: Phase::Closed,
            document: None,
            current_page: 1,
            total_pages: 0,
            scale: initial_scale,
            zoom_override: None,
        }
    }
}

/// Reading state for a single document
///
/// Shared by `Arc`; every operation takes `&self`. The state lock is never
/// held across an await, and at most one render runs at a time: a render
/// requested while another is in flight is dropped, not queued.
pub struct ReaderSession {
    book: BookConfig,
    config: ReaderConfig,
    ports: ReaderPorts,
    state: Mutex<SessionState>,
    rendering: AtomicBool,
}

impl ReaderSession {
    pub fn new(book: BookConfig, config: ReaderConfig, ports: ReaderPorts) -> Self {
        let state = SessionState::closed(config.initial_scale);
        Self {
            book,
            config,
            ports,
            state: Mutex::new(state),
            rendering: AtomicBool::new(false),
        }
    }

    pub fn book(&self) -> &BookConfig {
        &self.book
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().phase == Phase::Open
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::SeqCst)
    }

    pub fn current_page(&self) -> u32 {
        self.state.lock().unwrap().current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.state.lock().unwrap().total_pages
    }

    /// Scale of the last render, or the pending zoom
    pub fn scale(&self) -> f64 {
        self.state.lock().unwrap().scale
    }

    pub fn zoom_override(&self) -> Option<f64> {
        self.state.lock().unwrap().zoom_override
    }

    /// Restore progress, load the document and render the saved page
    pub async fn open(&self) -> Result<(), ReaderError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.phase != Phase::Closed {
                tracing::debug!(book = %self.book.id, "reader already open");
                return Ok(());
            }
            state.phase = Phase::Opening;
        }

        let restored = match self.ports.progress.load(&self.book.id).await {
            Ok(Some(record)) => record.current_page,
            Ok(None) => 1,
            Err(e) => {
                tracing::warn!(book = %self.book.id, "could not read saved progress: {}", e);
                1
            }
        };

        let document = match self.load_document().await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(book = %self.book.id, "Error loading PDF: {}", e);
                self.state.lock().unwrap().phase = Phase::Closed;
                self.ports.view.alert(LOAD_FAILURE_MESSAGE);
                return Err(e);
            }
        };

        let total_pages = document.page_count();
        let page = restored.clamp(1, total_pages);
        {
            let mut state = self.state.lock().unwrap();
            state.phase = Phase::Open;
            state.document = Some(document);
            state.total_pages = total_pages;
            state.current_page = page;
            state.scale = self.config.initial_scale;
            state.zoom_override = None;
        }
        self.ports.view.set_scroll_lock(true);
        tracing::info!(book = %self.book.id, page, total_pages, "reader opened");

        // A failed first page leaves the session open; the error is already logged
        let _ = self.render(page).await;
        Ok(())
    }

    async fn load_document(&self) -> Result<Arc<dyn PdfDocument>, ReaderError> {
        let request = AssetRequest::new(self.book.pdf_path.clone(), Destination::Empty);
        let response = self
            .ports
            .source
            .fetch(&request)
            .await
            .map_err(|e| ReaderError::DocumentLoad(e.to_string()))?;
        if response.status != 200 {
            return Err(ReaderError::DocumentLoad(format!(
                "{} returned HTTP status {}",
                self.book.pdf_path, response.status
            )));
        }

        let document = self.ports.engine.open(response.body).await?;
        if document.page_count() == 0 {
            return Err(ReaderError::DocumentLoad(
                "document has no pages".to_string(),
            ));
        }
        Ok(document)
    }

    /// Render a page, fit to the viewport unless a zoom is set, and persist progress
    pub async fn render(&self, page_number: u32) -> Result<RenderOutcome, ReaderError> {
        self.render_with(page_number, ZoomTarget::Current).await
    }

    async fn render_with(
        &self,
        page_number: u32,
        zoom: ZoomTarget,
    ) -> Result<RenderOutcome, ReaderError> {
        let (document, total_pages) = {
            let state = self.state.lock().unwrap();
            match &state.document {
                Some(document) if state.phase == Phase::Open => {
                    (Arc::clone(document), state.total_pages)
                }
                _ => return Err(ReaderError::NotOpen),
            }
        };
        if page_number < 1 || page_number > total_pages {
            return Err(ReaderError::PageOutOfRange {
                page: page_number,
                total: total_pages,
            });
        }

        if self
            .rendering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(page = page_number, "render in flight, dropping request");
            return Ok(RenderOutcome::Dropped);
        }

        // Read after taking the guard so a render never commits a stale zoom
        let zoom_override = match zoom {
            ZoomTarget::Current => self.state.lock().unwrap().zoom_override,
            ZoomTarget::Explicit(scale) => Some(scale),
            ZoomTarget::Fit => None,
        };
        let result = self
            .render_page(document.as_ref(), page_number, total_pages, zoom_override)
            .await;
        self.rendering.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => Ok(RenderOutcome::Rendered),
            Err(e) => {
                tracing::error!(page = page_number, "Error rendering page: {}", e);
                Err(e)
            }
        }
    }

    async fn render_page(
        &self,
        document: &dyn PdfDocument,
        page_number: u32,
        total_pages: u32,
        zoom_override: Option<f64>,
    ) -> Result<(), ReaderError> {
        let page = document.page(page_number).await.map_err(|e| match e {
            ReaderError::PageRender { .. } => e,
            other => ReaderError::PageRender {
                page: page_number,
                reason: other.to_string(),
            },
        })?;

        let size = page.size();
        let scale = zoom_override
            .unwrap_or_else(|| fit_scale(self.config.viewport, self.config.padding, size));
        let raster = page
            .render(output_scale(scale, self.config.device_pixel_ratio))
            .await
            .map_err(|e| match e {
                ReaderError::PageRender { .. } => e,
                other => ReaderError::PageRender {
                    page: page_number,
                    reason: other.to_string(),
                },
            })?;

        {
            let mut state = self.state.lock().unwrap();
            if state.phase != Phase::Open {
                // Closed while the page was rendering
                return Err(ReaderError::NotOpen);
            }
            state.current_page = page_number;
            state.scale = scale;
            state.zoom_override = zoom_override;
        }

        let frame = PageFrame {
            page: page_number,
            total_pages,
            scale,
            display: size.scaled(scale),
            raster,
        };
        let view = &self.ports.view;
        view.show_page(&frame);
        view.update_progress(
            page_number,
            total_pages,
            percent_complete(page_number, total_pages),
        );
        view.set_navigation(page_number > 1, page_number < total_pages);

        if let Err(e) = self
            .ports
            .progress
            .save(&self.book.id, page_number, total_pages)
            .await
        {
            tracing::warn!(book = %self.book.id, "failed to save progress: {}", e);
        }
        Ok(())
    }

    /// Move exactly one page; a no-op at either end of the document
    pub async fn navigate(&self, direction: Direction) -> Result<RenderOutcome, ReaderError> {
        let (current, total) = {
            let state = self.state.lock().unwrap();
            if state.phase != Phase::Open {
                return Err(ReaderError::NotOpen);
            }
            (state.current_page, state.total_pages)
        };

        let target = match direction {
            Direction::Prev if current <= 1 => return Ok(RenderOutcome::Unchanged),
            Direction::Next if current >= total => return Ok(RenderOutcome::Unchanged),
            Direction::Prev => current - 1,
            Direction::Next => current + 1,
        };

        self.ports.view.page_turn(direction);
        if !self.config.page_turn_delay.is_zero() {
            tokio::time::sleep(self.config.page_turn_delay).await;
        }
        self.render(target).await
    }

    /// Change the zoom by `delta`, clamped to the allowed range, and re-render.
    /// The new zoom only sticks once the page has rendered at it.
    pub async fn zoom(&self, delta: f64) -> Result<RenderOutcome, ReaderError> {
        if !delta.is_finite() {
            return Ok(RenderOutcome::Unchanged);
        }

        let (page, target) = {
            let state = self.state.lock().unwrap();
            if state.phase != Phase::Open {
                return Err(ReaderError::NotOpen);
            }
            let next = clamp_zoom(state.scale + delta);
            if (next - state.scale).abs() < f64::EPSILON {
                return Ok(RenderOutcome::Unchanged);
            }
            (state.current_page, next)
        };

        let outcome = self
            .render_with(page, ZoomTarget::Explicit(target))
            .await?;
        if outcome == RenderOutcome::Rendered {
            tracing::debug!(scale = target, "zoom changed");
            self.ports.view.zoom_changed(target);
        }
        Ok(outcome)
    }

    /// Drop the explicit zoom and fit the page to the viewport again
    pub async fn reset_zoom(&self) -> Result<RenderOutcome, ReaderError> {
        let page = {
            let state = self.state.lock().unwrap();
            if state.phase != Phase::Open {
                return Err(ReaderError::NotOpen);
            }
            if state.zoom_override.is_none() {
                return Ok(RenderOutcome::Unchanged);
            }
            state.current_page
        };

        let outcome = self.render_with(page, ZoomTarget::Fit).await?;
        if outcome == RenderOutcome::Rendered {
            self.ports.view.zoom_changed(self.scale());
        }
        Ok(outcome)
    }

    /// Dispatch a key press; ignored while closed
    pub async fn handle_key(&self, key: &str) -> Result<RenderOutcome, ReaderError> {
        if !self.is_open() {
            return Ok(RenderOutcome::Unchanged);
        }
        match ReaderCommand::from_key(key) {
            Some(command) => self.execute(command).await,
            None => Ok(RenderOutcome::Unchanged),
        }
    }

    pub async fn execute(&self, command: ReaderCommand) -> Result<RenderOutcome, ReaderError> {
        match command {
            ReaderCommand::Navigate(direction) => self.navigate(direction).await,
            ReaderCommand::Zoom(delta) => self.zoom(delta).await,
            ReaderCommand::ResetZoom => self.reset_zoom().await,
            ReaderCommand::Close => {
                self.close().await?;
                Ok(RenderOutcome::Unchanged)
            }
        }
    }

    /// Save progress, refresh library displays, release the document and the scroll lock
    ///
    /// Returns the stored record, or `None` if the session was not open.
    pub async fn close(&self) -> Result<Option<ProgressRecord>, ReaderError> {
        let (current, total) = {
            let mut state = self.state.lock().unwrap();
            if state.phase != Phase::Open {
                return Ok(None);
            }
            let position = (state.current_page, state.total_pages);
            *state = SessionState::closed(self.config.initial_scale);
            position
        };

        let saved = match self.ports.progress.save(&self.book.id, current, total).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(book = %self.book.id, "failed to save progress on close: {}", e);
                None
            }
        };

        let stored = match self.ports.progress.load(&self.book.id).await {
            Ok(stored) => stored.or(saved),
            Err(_) => saved,
        };
        if let Some(record) = &stored {
            self.ports.view.refresh_library_progress(&self.book.id, record);
        }

        self.ports.view.set_scroll_lock(false);
        tracing::info!(book = %self.book.id, page = current, "reader closed");
        Ok(stored)
    }

    /// Save the document under `{title}.pdf` in `directory`
    pub async fn download(&self, directory: &Path) -> Result<PathBuf, ReaderError> {
        let request = AssetRequest::new(self.book.pdf_path.clone(), Destination::Empty);
        let response = self
            .ports
            .source
            .fetch(&request)
            .await
            .map_err(|e| ReaderError::Download(e.to_string()))?;
        if !response.is_success() {
            return Err(ReaderError::Download(format!(
                "{} returned HTTP status {}",
                self.book.pdf_path, response.status
            )));
        }

        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| ReaderError::Download(e.to_string()))?;
        let path = directory.join(download_filename(&self.book.title));
        tokio::fs::write(&path, &response.body)
            .await
            .map_err(|e| ReaderError::Download(e.to_string()))?;

        tracing::info!(path = %path.display(), bytes = response.body.len(), "book downloaded");
        Ok(path)
    }
}

/// Sanitize a title into a `.pdf` file name
pub fn download_filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .take(80)
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    let stem = stem.trim().trim_matches('.');
    if stem.is_empty() {
        "book.pdf".to_string()
    } else {
        format!("{}.pdf", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, StorageError};
    use crate::fetch::AssetResponse;
    use crate::reader::engine::{PageSize, PdfPage, Raster};
    use crate::storage::{MemoryStorage, StorageProvider};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    const PDF_PATH: &str = "/books/b1.pdf";

    /// Serves one document, or fails when `offline`
    struct FakeSource {
        offline: bool,
    }

    #[async_trait]
    impl Fetcher for FakeSource {
        async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
            if self.offline {
                return Err(FetchError::Network("offline".to_string()));
            }
            if request.url == PDF_PATH {
                Ok(AssetResponse::ok("application/pdf", b"%PDF-fake".to_vec()))
            } else {
                Ok(AssetResponse::not_found())
            }
        }
    }

    /// Documents with a fixed page count; one page can be gated or broken
    struct FakeEngine {
        pages: u32,
        gate: Option<(u32, Arc<Notify>)>,
        broken_page: Option<u32>,
    }

    struct FakeDocument {
        pages: u32,
        gate: Option<(u32, Arc<Notify>)>,
        broken_page: Option<u32>,
    }

    struct FakePage {
        number: u32,
        gate: Option<Arc<Notify>>,
        broken: bool,
    }

    #[async_trait]
    impl RenderEngine for FakeEngine {
        async fn open(&self, _bytes: Vec<u8>) -> Result<Arc<dyn PdfDocument>, ReaderError> {
            Ok(Arc::new(FakeDocument {
                pages: self.pages,
                gate: self.gate.clone(),
                broken_page: self.broken_page,
            }))
        }
    }

    #[async_trait]
    impl PdfDocument for FakeDocument {
        fn page_count(&self) -> u32 {
            self.pages
        }

        async fn page(&self, number: u32) -> Result<Box<dyn PdfPage>, ReaderError> {
            let gate = self
                .gate
                .as_ref()
                .filter(|(page, _)| *page == number)
                .map(|(_, notify)| Arc::clone(notify));
            Ok(Box::new(FakePage {
                number,
                gate,
                broken: self.broken_page == Some(number),
            }))
        }
    }

    #[async_trait]
    impl PdfPage for FakePage {
        fn number(&self) -> u32 {
            self.number
        }

        fn size(&self) -> PageSize {
            PageSize::new(380.0, 560.0)
        }

        async fn render(&self, scale: f64) -> Result<Raster, ReaderError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.broken {
                return Err(ReaderError::PageRender {
                    page: self.number,
                    reason: "corrupt content stream".to_string(),
                });
            }
            let (width, height) = Raster::dimensions(self.size(), scale);
            Ok(Raster {
                width,
                height,
                text: format!("page {}", self.number),
            })
        }
    }

    #[derive(Default)]
    struct RecordingView {
        shown: Mutex<Vec<PageFrame>>,
        alerts: Mutex<Vec<String>>,
        turns: Mutex<Vec<Direction>>,
        scroll_locked: AtomicBool,
        refreshed: Mutex<Vec<ProgressRecord>>,
    }

    impl RecordingView {
        fn shown_pages(&self) -> Vec<u32> {
            self.shown.lock().unwrap().iter().map(|f| f.page).collect()
        }
    }

    impl ReaderView for RecordingView {
        fn show_page(&self, frame: &PageFrame) {
            self.shown.lock().unwrap().push(frame.clone());
        }

        fn update_progress(&self, _current_page: u32, _total_pages: u32, _percent: u32) {}

        fn alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }

        fn page_turn(&self, direction: Direction) {
            self.turns.lock().unwrap().push(direction);
        }

        fn set_scroll_lock(&self, locked: bool) {
            self.scroll_locked.store(locked, Ordering::SeqCst);
        }

        fn refresh_library_progress(&self, _book_id: &str, record: &ProgressRecord) {
            self.refreshed.lock().unwrap().push(record.clone());
        }
    }

    /// Memory storage that counts writes
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl StorageProvider for CountingStorage {
        async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &str, data: Vec<u8>) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(path, data).await
        }

        async fn delete(&self, path: &str) -> Result<(), StorageError> {
            self.inner.delete(path).await
        }

        async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
            self.inner.delete_prefix(prefix).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(prefix).await
        }

        async fn exists(&self, path: &str) -> Result<bool, StorageError> {
            self.inner.exists(path).await
        }
    }

    struct Harness {
        session: Arc<ReaderSession>,
        view: Arc<RecordingView>,
        storage: Arc<CountingStorage>,
        progress: ProgressStore,
    }

    fn harness(engine: FakeEngine, offline: bool) -> Harness {
        let view = Arc::new(RecordingView::default());
        let storage = Arc::new(CountingStorage::default());
        let progress = ProgressStore::new(storage.clone());
        let book = BookConfig {
            id: "b1".to_string(),
            pdf_path: PDF_PATH.to_string(),
            title: "Book One".to_string(),
        };
        let config = ReaderConfig {
            page_turn_delay: Duration::ZERO,
            ..ReaderConfig::default()
        };
        let ports = ReaderPorts {
            engine: Arc::new(engine),
            source: Arc::new(FakeSource { offline }),
            progress: progress.clone(),
            view: view.clone(),
        };
        Harness {
            session: Arc::new(ReaderSession::new(book, config, ports)),
            view,
            storage,
            progress,
        }
    }

    fn pages(count: u32) -> FakeEngine {
        FakeEngine {
            pages: count,
            gate: None,
            broken_page: None,
        }
    }

    #[tokio::test]
    async fn test_open_without_progress_starts_at_first_page() {
        let h = harness(pages(10), false);

        h.session.open().await.unwrap();

        assert_eq!(h.session.current_page(), 1);
        assert_eq!(h.session.total_pages(), 10);
        let record = h.progress.load("b1").await.unwrap().unwrap();
        assert_eq!(
            (record.current_page, record.total_pages, record.percent_complete),
            (1, 10, 10)
        );
        assert!(h.view.scroll_locked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_open_restores_saved_page() {
        let h = harness(pages(10), false);
        h.progress.save("b1", 7, 10).await.unwrap();

        h.session.open().await.unwrap();

        assert_eq!(h.view.shown_pages(), vec![7]);
        assert_eq!(h.session.current_page(), 7);
    }

    #[tokio::test]
    async fn test_open_clamps_restored_page() {
        let h = harness(pages(4), false);
        h.progress.save("b1", 9, 12).await.unwrap();

        h.session.open().await.unwrap();

        assert_eq!(h.session.current_page(), 4);
        let record = h.progress.load("b1").await.unwrap().unwrap();
        assert_eq!((record.current_page, record.total_pages), (4, 4));
    }

    #[tokio::test]
    async fn test_load_failure_alerts_and_stays_closed() {
        let h = harness(pages(10), true);

        let err = h.session.open().await.unwrap_err();

        assert!(matches!(err, ReaderError::DocumentLoad(_)));
        assert!(!h.session.is_open());
        assert_eq!(*h.view.alerts.lock().unwrap(), vec![LOAD_FAILURE_MESSAGE]);
        assert!(h.view.shown_pages().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_is_a_load_failure() {
        let h = harness(pages(0), false);
        assert!(matches!(
            h.session.open().await,
            Err(ReaderError::DocumentLoad(_))
        ));
        assert!(!h.session.is_open());
    }

    #[tokio::test]
    async fn test_render_persists_each_page() {
        let h = harness(pages(8), false);
        h.session.open().await.unwrap();

        for page in 1..=8 {
            assert_eq!(
                h.session.render(page).await.unwrap(),
                RenderOutcome::Rendered
            );
            let record = h.progress.load("b1").await.unwrap().unwrap();
            assert_eq!(record.current_page, page);
            assert_eq!(record.percent_complete, percent_complete(page, 8));
        }
    }

    #[tokio::test]
    async fn test_navigation_stops_at_both_ends() {
        let h = harness(pages(2), false);
        h.session.open().await.unwrap();

        assert_eq!(
            h.session.navigate(Direction::Prev).await.unwrap(),
            RenderOutcome::Unchanged
        );
        assert_eq!(h.session.current_page(), 1);

        h.session.navigate(Direction::Next).await.unwrap();
        assert_eq!(h.session.current_page(), 2);

        assert_eq!(
            h.session.navigate(Direction::Next).await.unwrap(),
            RenderOutcome::Unchanged
        );
        assert_eq!(h.session.current_page(), 2);
        assert_eq!(*h.view.turns.lock().unwrap(), vec![Direction::Next]);
    }

    #[tokio::test]
    async fn test_zoom_clamps_and_overrides_fit() {
        let h = harness(pages(3), false);
        h.session.open().await.unwrap();
        // (600 - 40) / 560 = 1.0 fits the 380x560 page
        assert!((h.session.scale() - 1.0).abs() < 1e-9);

        for _ in 0..20 {
            h.session.zoom(0.25).await.unwrap();
            assert!(h.session.scale() <= 3.0);
        }
        assert_eq!(h.session.scale(), 3.0);
        assert_eq!(h.session.zoom(0.25).await.unwrap(), RenderOutcome::Unchanged);

        let last = h.view.shown.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.scale, 3.0);
        assert_eq!(last.display, PageSize::new(1140.0, 1680.0));
        // Rendered at the 1.5 density floor
        assert_eq!((last.raster.width, last.raster.height), (1710, 2520));

        for _ in 0..20 {
            h.session.zoom(-0.25).await.unwrap();
        }
        assert_eq!(h.session.scale(), 0.5);

        h.session.reset_zoom().await.unwrap();
        assert_eq!(h.session.zoom_override(), None);
        assert!((h.session.scale() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_render_in_flight_drops_second_request() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            FakeEngine {
                pages: 10,
                gate: Some((2, gate.clone())),
                broken_page: None,
            },
            false,
        );
        h.session.open().await.unwrap();
        let writes_before = h.storage.writes.load(Ordering::SeqCst);

        let session = Arc::clone(&h.session);
        let in_flight = tokio::spawn(async move { session.render(2).await });
        while !h.session.is_rendering() {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.session.render(5).await.unwrap(), RenderOutcome::Dropped);
        assert_eq!(h.session.current_page(), 1);

        gate.notify_one();
        assert_eq!(in_flight.await.unwrap().unwrap(), RenderOutcome::Rendered);

        assert_eq!(h.session.current_page(), 2);
        assert_eq!(h.view.shown_pages(), vec![1, 2]);
        assert_eq!(h.storage.writes.load(Ordering::SeqCst), writes_before + 1);
    }

    #[tokio::test]
    async fn test_zoom_dropped_while_rendering_keeps_fit() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            FakeEngine {
                pages: 10,
                gate: Some((2, gate.clone())),
                broken_page: None,
            },
            false,
        );
        h.session.open().await.unwrap();

        let session = Arc::clone(&h.session);
        let in_flight = tokio::spawn(async move { session.render(2).await });
        while !h.session.is_rendering() {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.session.zoom(0.25).await.unwrap(), RenderOutcome::Dropped);
        assert_eq!(h.session.zoom_override(), None);
        assert!((h.session.scale() - 1.0).abs() < 1e-9);

        gate.notify_one();
        assert_eq!(in_flight.await.unwrap().unwrap(), RenderOutcome::Rendered);

        assert_eq!(h.session.zoom_override(), None);
        assert!((h.session.scale() - 1.0).abs() < 1e-9);
        let last = h.view.shown.lock().unwrap().last().cloned().unwrap();
        assert!((last.scale - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reset_zoom_dropped_while_rendering_keeps_override() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            FakeEngine {
                pages: 10,
                gate: Some((2, gate.clone())),
                broken_page: None,
            },
            false,
        );
        h.session.open().await.unwrap();
        h.session.zoom(0.25).await.unwrap();
        assert_eq!(h.session.zoom_override(), Some(1.25));

        let session = Arc::clone(&h.session);
        let in_flight = tokio::spawn(async move { session.render(2).await });
        while !h.session.is_rendering() {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.session.reset_zoom().await.unwrap(), RenderOutcome::Dropped);
        assert_eq!(h.session.zoom_override(), Some(1.25));

        gate.notify_one();
        assert_eq!(in_flight.await.unwrap().unwrap(), RenderOutcome::Rendered);

        // The in-flight page kept the zoom it started with
        assert_eq!(h.session.zoom_override(), Some(1.25));
        assert_eq!(h.session.scale(), 1.25);
        assert_eq!(h.view.shown.lock().unwrap().last().unwrap().scale, 1.25);
    }

    #[tokio::test]
    async fn test_page_failure_keeps_previous_page() {
        let h = harness(
            FakeEngine {
                pages: 5,
                gate: None,
                broken_page: Some(2),
            },
            false,
        );
        h.session.open().await.unwrap();

        let err = h.session.navigate(Direction::Next).await.unwrap_err();

        assert!(matches!(err, ReaderError::PageRender { page: 2, .. }));
        assert!(!h.session.is_rendering());
        assert_eq!(h.session.current_page(), 1);
        assert_eq!(h.progress.load("b1").await.unwrap().unwrap().current_page, 1);
    }

    #[tokio::test]
    async fn test_close_saves_refreshes_and_releases() {
        let h = harness(pages(10), false);
        h.session.open().await.unwrap();
        h.session.render(4).await.unwrap();

        let record = h.session.close().await.unwrap().unwrap();

        assert_eq!(record.current_page, 4);
        assert!(!h.session.is_open());
        assert!(!h.view.scroll_locked.load(Ordering::SeqCst));
        assert_eq!(h.view.refreshed.lock().unwrap().len(), 1);
        assert!(matches!(
            h.session.render(1).await,
            Err(ReaderError::NotOpen)
        ));

        // Reopening resumes where the reader left off
        h.session.open().await.unwrap();
        assert_eq!(h.session.current_page(), 4);
    }

    #[tokio::test]
    async fn test_keys_map_to_commands() {
        let h = harness(pages(3), false);
        assert_eq!(
            h.session.handle_key("ArrowRight").await.unwrap(),
            RenderOutcome::Unchanged
        );

        h.session.open().await.unwrap();
        h.session.handle_key("ArrowRight").await.unwrap();
        assert_eq!(h.session.current_page(), 2);
        h.session.handle_key("ArrowLeft").await.unwrap();
        assert_eq!(h.session.current_page(), 1);
        h.session.handle_key("Escape").await.unwrap();
        assert!(!h.session.is_open());
    }

    #[tokio::test]
    async fn test_download_writes_titled_file() {
        let h = harness(pages(3), false);
        let dir = tempfile::TempDir::new().unwrap();

        let path = h.session.download(dir.path()).await.unwrap();

        assert_eq!(path.file_name().unwrap(), "Book One.pdf");
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-fake");
    }

    #[test]
    fn test_download_filename_sanitized() {
        assert_eq!(download_filename("Lo Que Vi En Tus Ojos"), "Lo Que Vi En Tus Ojos.pdf");
        assert_eq!(download_filename("a/b:c?"), "abc.pdf");
        assert_eq!(download_filename("///"), "book.pdf");
    }
}
