//! Upload Helpers
//!
//! Sends a local file, or an in-memory zip of a local folder, to the chat
//! that triggered the command.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use chat_companion_core::OutgoingFile;
use ignore::WalkBuilder;
use zip::write::SimpleFileOptions;

use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{CommandContext, LiveMessage};
use crate::utils::error::{AppError, AppResult};

/// Regular files under `root`, hidden and ignored files included.
fn walk_files(root: &Path) -> impl Iterator<Item = ignore::DirEntry> {
    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false).follow_links(false);
    builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
}

/// Total size of the files under `root`, stopping once `limit` is reached.
pub fn directory_size(root: &Path, limit: u64) -> AppResult<u64> {
    let mut total = 0u64;
    for entry in walk_files(root) {
        total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        if total >= limit {
            break;
        }
    }
    Ok(total)
}

/// Zip every file under `root`, paths stored relative to `root`.
pub fn zip_directory(root: &Path) -> AppResult<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for entry in walk_files(root) {
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let name = rel.to_string_lossy().replace('\\', "/");
        writer.start_file(name, options)?;
        let data = fs::read(path)?;
        writer.write_all(&data)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Upload `path` to the chat of `live`, then delete the status message.
///
/// Progress is shown on `live`. Missing paths and oversize files are
/// reported there, not as errors.
pub async fn send_from_disk(
    ctx: &CommandContext,
    live: &mut LiveMessage,
    path: &Path,
    max_bytes: u64,
) -> AppResult<()> {
    if path.is_file() {
        let size = tokio::fs::metadata(path).await?.len();
        if size >= max_bytes {
            live.show(ctx, &format!("<code>File size too big. Max {}.</code>", size_label(max_bytes)))
                .await?;
            return Ok(());
        }
        let name = display_name(path);
        live.show(ctx, &ResponseMapper::uploading("File", &name, size))
            .await?;
        let data = tokio::fs::read(path).await?;
        live.send_file(ctx, OutgoingFile::new(name, data)).await?;
        live.clear(ctx).await?;
        tracing::info!("[Upload] Sent file {} ({} bytes)", path.display(), size);
        return Ok(());
    }

    if path.is_dir() {
        let root = path.to_path_buf();
        let size = tokio::task::spawn_blocking(move || directory_size(&root, max_bytes))
            .await
            .map_err(|e| AppError::internal(e.to_string()))??;
        if size >= max_bytes {
            live.show(ctx, &format!("<code>Folder size too big. Max {}.</code>", size_label(max_bytes)))
                .await?;
            return Ok(());
        }

        live.show(ctx, "Processing ZipFile from folder").await?;
        let root = path.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || zip_directory(&root))
            .await
            .map_err(|e| AppError::internal(e.to_string()))??;

        let name = display_name(path);
        live.show(ctx, &ResponseMapper::uploading("Folder", &name, size))
            .await?;
        live.send_file(ctx, OutgoingFile::new(format!("{}.zip", name), archive))
            .await?;
        live.clear(ctx).await?;
        tracing::info!("[Upload] Sent folder {} as zip", path.display());
        return Ok(());
    }

    live.show(
        ctx,
        &format!("{} doesn't exist.", ResponseMapper::code(&path.display().to_string())),
    )
    .await?;
    Ok(())
}

fn size_label(bytes: u64) -> String {
    let (value, unit) = ResponseMapper::convert_file_size(bytes);
    format!("{} {}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_directory_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"12345").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), b"123").unwrap();

        assert_eq!(directory_size(dir.path(), u64::MAX).unwrap(), 8);
        assert!(directory_size(dir.path(), 4).unwrap() >= 4);
    }

    #[test]
    fn test_zip_directory_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.log"), b"top").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join(".hidden"), b"deep").unwrap();

        let bytes = zip_directory(dir.path()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("nested/.hidden")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "deep");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/var/log/syslog")), "syslog");
        assert_eq!(display_name(Path::new("logs/")), "logs");
    }

    #[test]
    fn test_size_label() {
        assert_eq!(size_label(1_500_000_000), "1.4 gigabytes");
    }
}
