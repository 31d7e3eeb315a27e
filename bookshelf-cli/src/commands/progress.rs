//! Progress command implementation

use super::progress_store;
use anyhow::{Context, Result};
use bookshelf_core::progress::ProgressRecord;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BookProgress {
    book_id: String,
    #[serde(flatten)]
    record: ProgressRecord,
}

/// Show saved reading progress, or forget it for one book
pub async fn progress(data_dir: &Path, book_id: Option<&str>, reset: bool, json: bool) -> Result<()> {
    let store = progress_store(data_dir);

    if reset {
        let book_id = book_id.context("A book id is required to reset progress")?;
        if store.remove(book_id).await? {
            println!("Progress for {} reset", book_id);
        } else {
            println!("No progress saved for {}", book_id);
        }
        return Ok(());
    }

    let records: Vec<BookProgress> = match book_id {
        Some(book_id) => store
            .load(book_id)
            .await?
            .map(|record| BookProgress {
                book_id: book_id.to_string(),
                record,
            })
            .into_iter()
            .collect(),
        None => store
            .list()
            .await?
            .into_iter()
            .map(|(book_id, record)| BookProgress { book_id, record })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No reading progress saved");
        return Ok(());
    }
    for entry in &records {
        let record = &entry.record;
        println!(
            "{:<24} page {:>4} of {:<4} {:>3}%  last read {}",
            entry.book_id,
            record.current_page,
            record.total_pages,
            record.percent_complete,
            record.last_read.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}
