// src/util.rs

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read a UTF-8 file into a String with a clear error message.
///
/// This is mainly used for:
/// - serverless.json manifests
/// - schema / HubDB definition files
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = read_to_string(path)?;
    serde_json::from_str(&raw).with_context(|| format!("File is not valid JSON: {:?}", path))
}

/// Pretty-print a JSON value into a file, creating parent directories.
pub fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize JSON")?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write file {:?}", path))
}

/// Ensure a directory exists (create it if missing).
///
/// This is used when:
/// - scaffolding modules, templates and projects
/// - writing fetched files
/// - staging function folders
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {:?}", path))
}

/// Search `start` and its ancestors for a file called `name`.
pub fn find_up(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Recursively copy a directory tree.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", src))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .context("Walked path escaped source directory")?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {:?} to {:?}", entry.path(), target))?;
        }
    }
    Ok(())
}

/// List the regular files below `root`, sorted, as paths relative to `root`.
///
/// Dotfiles and `node_modules` are skipped, matching what HubSpot ignores on upload.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        e.depth() == 0 || !(name.starts_with('.') || name == "node_modules")
    });

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .context("Walked path escaped root directory")?;
            files.push(rel.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Convert a relative filesystem path into a `/`-separated remote path.
pub fn to_remote_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join two remote (Design Manager / File Manager) paths.
pub fn join_remote(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    if base.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", base, rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn find_up_walks_ancestors() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(tmp.path().join("a/marker.yml"), "x").unwrap();

        let found = find_up(&nested, "marker.yml").unwrap();
        assert_eq!(found, tmp.path().join("a/marker.yml"));
        assert!(find_up(&nested, "missing.yml").is_none());
    }

    #[test]
    fn list_files_skips_hidden_and_node_modules() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("css")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("css/main.css"), "").unwrap();
        std::fs::write(root.join(".env"), "").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        std::fs::write(root.join("theme.json"), "{}").unwrap();

        let files = list_files(root).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("css/main.css"), PathBuf::from("theme.json")]
        );
    }

    #[test]
    fn remote_paths_join_cleanly() {
        assert_eq!(join_remote("my-theme/", "/css/main.css"), "my-theme/css/main.css");
        assert_eq!(join_remote("", "main.css"), "main.css");
        assert_eq!(to_remote_path(Path::new("a/b/c.html")), "a/b/c.html");
    }
}
