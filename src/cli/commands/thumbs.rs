//! Thumbnail command: register images from a directory and generate
//! their thumbnails.

use std::path::Path;
use std::time::Duration;

use console::style;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app::AppContext;
use crate::cli::helpers::{register_directory, wait_for_thumbnails};
use crate::config::Settings;

pub async fn cmd_thumbs(settings: Settings, dir: &Path, wait: u64) -> anyhow::Result<()> {
    let ctx = AppContext::for_local(settings).await?;
    let operator = Uuid::new_v4();

    let registered = register_directory(&ctx, dir, operator).await?;
    let needing = registered
        .iter()
        .filter(|(_, a)| a.requires_thumbnail)
        .count();
    println!(
        "{} Registered {} files from {} ({} need thumbnails)",
        style("✓").green(),
        registered.len(),
        dir.display(),
        needing
    );
    if needing == 0 {
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let dispatcher = ctx.dispatcher().start(shutdown.clone());
    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait);
    let pending = wait_for_thumbnails(&ctx, deadline).await?;
    shutdown.cancel();
    dispatcher.shutdown().await;

    for (file, asset) in &registered {
        let current = ctx
            .media
            .get(asset.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("asset {} disappeared mid-run", asset.id))?;
        match current.thumbnail_ref {
            Some(thumbnail_ref) => {
                println!("  {} {} -> {}", style("✓").green(), file, thumbnail_ref)
            }
            None if current.requires_thumbnail => {
                println!("  {} {} failed; flag left set", style("!").yellow(), file)
            }
            None => println!("  {} {} (no thumbnail needed)", style("•").dim(), file),
        }
    }
    if pending > 0 {
        println!(
            "{} {} thumbnails still pending after {}s",
            style("!").yellow(),
            pending,
            wait
        );
    }
    Ok(())
}
