//! Status command.

use std::path::Path;

use console::style;

use crate::config::Settings;

/// Summarize the data directory and effective settings.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    println!("{}", style("scenarium").bold());
    println!("  Data directory:   {}", settings.data_dir.display());
    if !settings.data_dir.exists() {
        println!(
            "  {} Not initialized; run `scenarium init`",
            style("!").yellow()
        );
        return Ok(());
    }

    let content_dir = settings.content_dir();
    for area in ["uploads", "manifests", "thumbnails"] {
        let (files, bytes) = dir_stats(&content_dir.join(area))?;
        println!("  {:<17} {} files, {} bytes", format!("{}:", area), files, bytes);
    }

    println!("  Queue capacity:   {}", settings.queue_capacity);
    println!("  Dispatch workers: {}", settings.dispatch_workers);
    println!("  Import lock TTL:  {}s", settings.import_lock_ttl_secs);
    println!(
        "  Rate limit:       {} requests / {}s",
        settings.rate_limit_permits, settings.rate_limit_window_secs
    );
    match &settings.redis_url {
        Some(url) => println!("  Coordination:     redis ({})", url),
        None => println!("  Coordination:     in-process"),
    }
    Ok(())
}

/// File count and byte total under a directory, recursively. A missing
/// directory reads as empty.
fn dir_stats(dir: &Path) -> std::io::Result<(usize, u64)> {
    let mut files = 0;
    let mut bytes = 0;
    if !dir.exists() {
        return Ok((0, 0));
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let (f, b) = dir_stats(&path)?;
            files += f;
            bytes += b;
        } else {
            files += 1;
            bytes += entry.metadata()?.len();
        }
    }
    Ok((files, bytes))
}
