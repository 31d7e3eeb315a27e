//! Download command implementation

use super::{book_config, book_source, progress_store};
use crate::{BookArgs, SourceArgs};
use anyhow::{Context, Result};
use bookshelf_core::reader::{
    LopdfEngine, PageFrame, ReaderConfig, ReaderPorts, ReaderSession, ReaderView,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Downloads never display pages
struct HeadlessView;

impl ReaderView for HeadlessView {
    fn show_page(&self, _frame: &PageFrame) {}

    fn update_progress(&self, _current_page: u32, _total_pages: u32, _percent: u32) {}

    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Save the book's PDF as `{title}.pdf` in `output`
pub async fn download(
    data_dir: &Path,
    source: &SourceArgs,
    book: &BookArgs,
    output: &Path,
) -> Result<()> {
    let book = book_config(book);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Downloading {}", book.title));

    let ports = ReaderPorts {
        engine: Arc::new(LopdfEngine::new()),
        source: book_source(data_dir, source).await?,
        progress: progress_store(data_dir),
        view: Arc::new(HeadlessView),
    };
    let session = ReaderSession::new(book, ReaderConfig::default(), ports);

    let path = session
        .download(output)
        .await
        .with_context(|| format!("Failed to download {}", session.book().title));
    spinner.finish_and_clear();

    println!("Saved {}", path?.display());
    Ok(())
}
