//! Cache commands implementation

use super::{cache_manager, cache_store};
use anyhow::{Context, Result};
use bookshelf_core::cache::CacheEvent;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Install the manifest into the current generation and activate it
pub async fn cache_install(data_dir: &Path, origin: &str, manifest: Option<&Path>) -> Result<()> {
    let cache = cache_manager(data_dir, origin, manifest).await?;
    let mut events = cache.subscribe();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Caching {} assets into {}",
        cache.manifest().assets.len(),
        cache.generation()
    ));

    let result = cache.install().await;
    spinner.finish_and_clear();

    while let Ok(event) = events.try_recv() {
        match event {
            CacheEvent::Installed { generation, assets } => {
                println!("Cached {} assets in {}", assets, generation)
            }
            CacheEvent::GenerationDeleted { generation } => {
                println!("Deleted old cache {}", generation)
            }
            CacheEvent::Activated { generation } => println!("Activated {}", generation),
            CacheEvent::Installing { .. } | CacheEvent::InstallFailed { .. } => {}
        }
    }

    result.with_context(|| format!("Failed to install cache {}", cache.generation()))?;
    if !cache.is_controlling() {
        println!("Installed; waiting for skipWaiting before activation");
    }
    Ok(())
}

#[derive(Serialize)]
struct GenerationInfo {
    generation: String,
    entries: Vec<String>,
}

/// List stored generations and the request keys they hold
pub async fn cache_list(data_dir: &Path, json: bool) -> Result<()> {
    let store = cache_store(data_dir);

    let mut generations = Vec::new();
    for generation in store.generations().await? {
        let entries = store.keys(&generation).await?;
        generations.push(GenerationInfo {
            generation,
            entries,
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&generations)?);
        return Ok(());
    }

    if generations.is_empty() {
        println!("No cache generations stored");
        return Ok(());
    }
    for info in &generations {
        println!("{} ({} entries)", info.generation, info.entries.len());
        for entry in &info.entries {
            println!("  {}", entry);
        }
    }

    Ok(())
}
