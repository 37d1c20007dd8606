//! Shared helper functions for CLI commands.

use std::path::Path;
use std::time::Duration;

use uuid::Uuid;

use crate::app::AppContext;
use crate::models::MediaAsset;

/// Map a file extension to a MIME type for registration.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Upload and register every regular file in a directory, walking the
/// full ticket flow: reserve a key, write the bytes, register the
/// asset. Returns (file name, asset) pairs in name order.
pub async fn register_directory(
    ctx: &AppContext,
    dir: &Path,
    uploaded_by: Uuid,
) -> anyhow::Result<Vec<(String, MediaAsset)>> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut registered = Vec::new();
    for entry in entries {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from)
        else {
            continue;
        };
        let bytes = std::fs::read(&path)?;
        let content_type = content_type_for(&path);

        let ticket = ctx
            .media
            .create_upload_ticket(&file_name, uploaded_by)
            .await?;
        ctx.content
            .write(&ticket.content_ref, &bytes, content_type)
            .await?;
        let asset = ctx
            .media
            .register(
                &ticket.content_ref,
                &file_name,
                content_type,
                bytes.len() as u64,
                &MediaAsset::compute_hash(&bytes),
                uploaded_by,
            )
            .await?;
        registered.push((file_name, asset));
    }
    Ok(registered)
}

/// Poll until no registered asset still needs a thumbnail, or the
/// deadline passes. Returns the number left pending.
pub async fn wait_for_thumbnails(
    ctx: &AppContext,
    deadline: tokio::time::Instant,
) -> anyhow::Result<usize> {
    loop {
        let pending = ctx
            .media
            .list()
            .await?
            .iter()
            .filter(|a| a.requires_thumbnail)
            .count();
        if pending == 0 || tokio::time::Instant::now() >= deadline {
            return Ok(pending);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
