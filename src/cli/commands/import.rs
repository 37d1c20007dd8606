//! Import command: register media, run one batch through the pipeline,
//! print the audit trail.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use console::style;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app::AppContext;
use crate::cli::helpers::{register_directory, wait_for_thumbnails};
use crate::config::Settings;
use crate::models::{ImportBatch, ImportBatchStatus, ImportLogLevel, ScenarioDefinition};
use crate::services::ImportRequest;

pub async fn cmd_import(
    settings: Settings,
    manifest_path: &Path,
    media_dir: Option<&Path>,
    name: Option<String>,
    wait: u64,
) -> anyhow::Result<()> {
    let raw = std::fs::read(manifest_path)?;
    let mut definitions: Vec<ScenarioDefinition> = serde_json::from_slice(&raw)?;
    println!(
        "{} Loaded {} definitions from {}",
        style("✓").green(),
        definitions.len(),
        manifest_path.display()
    );

    let ctx = AppContext::for_local(settings).await?;
    let operator = Uuid::new_v4();

    if let Some(dir) = media_dir {
        let registered = register_directory(&ctx, dir, operator).await?;
        println!(
            "{} Registered {} media files from {}",
            style("✓").green(),
            registered.len(),
            dir.display()
        );

        // A manifest written against local files names its media by
        // plain file name; swap those for the refs assigned at
        // registration. Anything else passes through untouched.
        let by_name: HashMap<&str, &str> = registered
            .iter()
            .map(|(file, asset)| (file.as_str(), asset.content_ref.as_str()))
            .collect();
        for definition in &mut definitions {
            if let Some(content_ref) = by_name.get(definition.media_ref.as_str()) {
                definition.media_ref = (*content_ref).to_string();
            }
        }
    }

    let batch_name = name.unwrap_or_else(|| {
        manifest_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("import")
            .to_string()
    });
    let batch = ctx
        .imports
        .create(
            ImportRequest {
                name: batch_name,
                manifest_ref: None,
                definitions: Some(definitions),
            },
            operator,
        )
        .await?;
    println!("{} Created batch {} ({})", style("✓").green(), batch.id, batch.name);

    let shutdown = CancellationToken::new();
    let dispatcher = ctx.dispatcher().start(shutdown.clone());
    ctx.imports.queue_processing(batch.id).await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait);
    let settled = loop {
        let current = ctx
            .imports
            .get(batch.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("batch {} disappeared mid-run", batch.id))?;
        if current.status.is_terminal() || tokio::time::Instant::now() >= deadline {
            break current;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    let pending_thumbs = wait_for_thumbnails(&ctx, deadline).await?;

    shutdown.cancel();
    dispatcher.shutdown().await;

    println!();
    print_batch(&settled);
    println!("  {} scenarios created", ctx.scenarios.created().await.len());
    if pending_thumbs > 0 {
        println!(
            "  {} {} thumbnails still pending; re-run `scenarium thumbs` later",
            style("!").yellow(),
            pending_thumbs
        );
    }

    println!();
    println!("{}", style("Audit trail").bold());
    for log in ctx.imports.logs(batch.id).await? {
        let glyph = match log.level {
            ImportLogLevel::Info => style("•").dim(),
            ImportLogLevel::Warning => style("!").yellow(),
            ImportLogLevel::Error => style("✗").red(),
        };
        println!(
            "  {} {} {}",
            glyph,
            style(log.logged_at.format("%H:%M:%S%.3f")).dim(),
            log.message
        );
    }
    Ok(())
}

fn print_batch(batch: &ImportBatch) {
    let glyph = match batch.status {
        ImportBatchStatus::Completed => style("✓").green(),
        ImportBatchStatus::Failed => style("✗").red(),
        _ => style("!").yellow(),
    };
    println!(
        "{} Batch {} is {} ({}/{} records)",
        glyph,
        batch.id,
        style(batch.status.as_str()).bold(),
        batch.processed_records,
        batch.total_records
    );
    if let Some(reason) = &batch.failure_reason {
        println!("  {} {}", style("reason:").red(), reason);
    }
}
