//! Namespace-partitioned output tree
//!
//! Layout: `<root>/<namespace>/<file>`. The tree is owned by one run at a
//! time: `recreate_root` wipes it at the start of every crawl.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::Error as CrateError;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of the output tree
    pub base_path: PathBuf,

    /// Extension of written files, without the dot
    pub extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("output"),
            extension: "txt".to_string(),
        }
    }
}

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid namespace folder name: {0:?}")]
    InvalidNamespace(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for CrateError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => CrateError::Io(e),
            other => CrateError::Storage(other.to_string()),
        }
    }
}

type Result<T> = std::result::Result<T, StorageError>;

/// A file found in the output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Parent folder name; `None` for files at the root
    pub namespace: Option<String>,

    pub path: PathBuf,
}

/// Directory and file counts of the output tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub directories: usize,
    pub files: usize,
}

/// Replace every run of characters that are neither alphanumeric nor `_` by one `_`
pub fn sanitize_file_stem(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Output tree manager
#[derive(Debug, Clone)]
pub struct Storage {
    config: StorageConfig,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage {
    /// Create a new storage with default configuration
    pub fn new() -> Self {
        Self {
            config: StorageConfig::default(),
        }
    }

    /// Create a new storage with custom configuration
    pub fn with_config(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Root of the output tree
    pub fn root(&self) -> &Path {
        &self.config.base_path
    }

    /// Deterministic file name for a URL
    pub fn url_to_filename(&self, url: &str) -> String {
        format!("{}.{}", sanitize_file_stem(url), self.config.extension)
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        let invalid = namespace.is_empty()
            || namespace == "."
            || namespace == ".."
            || namespace.contains(['/', '\\']);
        if invalid {
            return Err(StorageError::InvalidNamespace(namespace.to_string()));
        }
        Ok(self.config.base_path.join(namespace))
    }

    /// Delete the output tree if present and create it empty
    pub async fn recreate_root(&self) -> Result<()> {
        let root = &self.config.base_path;
        if fs::try_exists(root).await? {
            info!("Removing previous output tree {}", root.display());
            fs::remove_dir_all(root).await?;
        }
        fs::create_dir_all(root).await?;
        Ok(())
    }

    /// Create the folder of a namespace
    pub async fn ensure_namespace(&self, namespace: &str) -> Result<PathBuf> {
        let dir = self.namespace_dir(namespace)?;
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Write `contents` to `<root>/<namespace>/<filename>`
    pub async fn write(&self, namespace: &str, filename: &str, contents: &str) -> Result<PathBuf> {
        let dir = self.ensure_namespace(namespace).await?;
        let path = dir.join(filename);
        fs::write(&path, contents).await?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Write the document for `url` under its namespace
    pub async fn write_url(&self, namespace: &str, url: &str, contents: &str) -> Result<PathBuf> {
        let filename = self.url_to_filename(url);
        self.write(namespace, &filename, contents).await
    }

    /// Every regular file at the root and one level below it, sorted by path
    pub async fn list_files(&self) -> Result<Vec<StoredFile>> {
        let root = &self.config.base_path;
        if !fs::try_exists(root).await? {
            return Err(StorageError::NotFound(root.display().to_string()));
        }

        let mut files = Vec::new();
        let mut entries = fs::read_dir(root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_file() {
                files.push(StoredFile {
                    namespace: None,
                    path: entry.path(),
                });
            } else if file_type.is_dir() {
                let namespace = entry.file_name().to_string_lossy().to_string();
                let mut children = fs::read_dir(entry.path()).await?;
                while let Some(child) = children.next_entry().await? {
                    if child.file_type().await?.is_file() {
                        files.push(StoredFile {
                            namespace: Some(namespace.clone()),
                            path: child.path(),
                        });
                    }
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Count namespace folders and files
    pub async fn stats(&self) -> Result<TreeStats> {
        let files = self.list_files().await?;
        let mut stats = TreeStats {
            files: files.len(),
            ..Default::default()
        };
        let mut entries = fs::read_dir(&self.config.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                stats.directories += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_in(dir: &Path) -> Storage {
        Storage::with_config(StorageConfig {
            base_path: dir.join("out"),
            ..Default::default()
        })
    }

    #[test]
    fn test_url_to_filename() {
        let storage = Storage::new();
        assert_eq!(
            storage.url_to_filename("https://monservicepublic.gouv.mc/thematiques/logement"),
            "https_monservicepublic_gouv_mc_thematiques_logement.txt"
        );
        assert_eq!(
            storage.url_to_filename("https://x.mc/actualites?query=&limit=60"),
            "https_x_mc_actualites_query_limit_60.txt"
        );
        assert_eq!(sanitize_file_stem("a__b--c"), "a__b_c");
    }

    #[test]
    fn test_invalid_namespace() {
        let storage = Storage::new();
        assert!(matches!(
            storage.namespace_dir("../escape"),
            Err(StorageError::InvalidNamespace(_))
        ));
        assert!(storage.namespace_dir("Relations avec l'administration").is_ok());
    }

    #[tokio::test]
    async fn test_recreate_root_wipes_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        storage.recreate_root().await.unwrap();
        storage.write("general", "old.txt", "stale").await.unwrap();
        storage.recreate_root().await.unwrap();

        assert_eq!(storage.stats().await.unwrap(), TreeStats::default());
    }

    #[tokio::test]
    async fn test_write_list_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());
        storage.recreate_root().await.unwrap();

        storage
            .write_url("Logement", "https://x.mc/thematiques/logement/a", "<p>a</p>")
            .await
            .unwrap();
        storage.write("general", "b.txt", "<p>b</p>").await.unwrap();
        storage.ensure_namespace("annuaire").await.unwrap();
        tokio::fs::write(storage.root().join("loose.txt"), "c").await.unwrap();

        let files = storage.list_files().await.unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().any(|f| f.namespace.is_none()));
        assert!(files.iter().any(|f| f.namespace.as_deref() == Some("Logement")
            && f.path.ends_with("https_x_mc_thematiques_logement_a.txt")));

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.directories, 3);
        assert_eq!(stats.files, 3);
    }

    #[tokio::test]
    async fn test_list_files_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());
        assert!(matches!(
            storage.list_files().await,
            Err(StorageError::NotFound(_))
        ));
    }
}
