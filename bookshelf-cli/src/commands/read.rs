//! Terminal reader

use super::{book_config, book_source, progress_store};
use crate::{BookArgs, SourceArgs};
use anyhow::Result;
use bookshelf_core::progress::ProgressRecord;
use bookshelf_core::reader::{
    Direction, LopdfEngine, PageFrame, ReaderCommand, ReaderConfig, ReaderPorts,
    ReaderSession, ReaderView, Viewport, ZOOM_STEP,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "n next  p previous  + zoom in  - zoom out  0 fit  d download  q quit";

/// One line of reader input
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Command(ReaderCommand),
    Download,
    Help,
}

fn parse_input(line: &str) -> Option<Input> {
    let input = match line.split_whitespace().next()? {
        "n" | "next" => Input::Command(ReaderCommand::Navigate(Direction::Next)),
        "p" | "prev" => Input::Command(ReaderCommand::Navigate(Direction::Prev)),
        "+" => Input::Command(ReaderCommand::Zoom(ZOOM_STEP)),
        "-" => Input::Command(ReaderCommand::Zoom(-ZOOM_STEP)),
        "0" | "fit" => Input::Command(ReaderCommand::ResetZoom),
        "q" | "quit" => Input::Command(ReaderCommand::Close),
        "d" | "download" => Input::Download,
        "h" | "help" | "?" => Input::Help,
        _ => return None,
    };
    Some(input)
}

/// Prints pages as text
struct TerminalView;

impl ReaderView for TerminalView {
    fn show_page(&self, frame: &PageFrame) {
        println!(
            "--- Page {}/{} ({:.2}x, {}x{}px) ---",
            frame.page, frame.total_pages, frame.scale, frame.raster.width, frame.raster.height
        );
        let text = frame.raster.text.trim_end();
        if text.trim().is_empty() {
            println!("(no text on this page)");
        } else {
            println!("{}", text);
        }
    }

    fn update_progress(&self, current_page: u32, total_pages: u32, percent: u32) {
        println!("Page {} of {} ({}%)", current_page, total_pages, percent);
    }

    fn alert(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn zoom_changed(&self, scale: f64) {
        println!("Zoom {:.2}x", scale);
    }

    fn refresh_library_progress(&self, book_id: &str, record: &ProgressRecord) {
        println!(
            "Saved {}: page {} of {} ({}%)",
            book_id, record.current_page, record.total_pages, record.percent_complete
        );
    }
}

/// Open the book and drive it from stdin until `q` or end of input
pub async fn read(
    data_dir: &Path,
    source: &SourceArgs,
    book: &BookArgs,
    width: f64,
    height: f64,
    pixel_ratio: f64,
) -> Result<()> {
    let config = ReaderConfig {
        viewport: Viewport { width, height },
        device_pixel_ratio: pixel_ratio,
        // No page-turn animation in a terminal
        page_turn_delay: Duration::ZERO,
        ..ReaderConfig::default()
    };
    let ports = ReaderPorts {
        engine: Arc::new(LopdfEngine::new()),
        source: book_source(data_dir, source).await?,
        progress: progress_store(data_dir),
        view: Arc::new(TerminalView),
    };
    let session = ReaderSession::new(book_config(book), config, ports);

    session.open().await?;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(input) = parse_input(&line) else {
            if !line.trim().is_empty() {
                println!("Unknown command: {}", line.trim());
            }
            continue;
        };

        let result = match input {
            Input::Command(ReaderCommand::Close) => break,
            Input::Command(command) => session.execute(command).await.map(|_| ()),
            Input::Download => match session.download(Path::new(".")).await {
                Ok(path) => {
                    println!("Saved {}", path.display());
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Input::Help => {
                println!("{}", HELP);
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("Error: {}", e);
        }
    }

    session.close().await?;
    Ok(())
}
