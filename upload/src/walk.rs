use anyhow::Context;
use async_recursion::async_recursion;
use tracing::instrument;

/// A regular file found under the upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: std::path::PathBuf,
    pub size: u64,
}

/// Lists every regular file below `root`, sorted by path.
///
/// Directories are descended, symlinks to files are followed. Symlinked directories and special
/// files are skipped with a warning.
#[instrument]
pub async fn list_files(root: &std::path::Path) -> anyhow::Result<Vec<FileEntry>> {
    let mut files = Vec::new();
    walk(root, &mut files).await?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[async_recursion]
async fn walk(dir: &std::path::Path, files: &mut Vec<FileEntry>) -> anyhow::Result<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot open directory {dir:?} for reading"))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {dir:?}"))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("failed reading file type of {path:?}"))?;
        if file_type.is_dir() {
            walk(&path, files).await?;
            continue;
        }
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("failed reading metadata from {path:?}"))?;
        if metadata.is_file() {
            files.push(FileEntry {
                path,
                size: metadata.len(),
            });
        } else {
            tracing::warn!("skipping {path:?}: not a regular file");
        }
    }
    Ok(())
}
