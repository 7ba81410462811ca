use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions a manifest file may have
pub const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Finds manifest files under a directory.
///
/// The scan descends recursively and skips `target` and hidden directories.
/// Files come back sorted by path so manifests merge in a stable order.
///
/// # Example
///
/// ```no_run
/// use rest_swagger::scanner::ManifestScanner;
/// use std::path::PathBuf;
///
/// let scanner = ManifestScanner::new(PathBuf::from("./api"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} manifests", result.manifest_files.len());
/// ```
pub struct ManifestScanner {
    root_path: PathBuf,
}

/// Result of a directory scan
pub struct ScanResult {
    pub manifest_files: Vec<PathBuf>,
    /// Entries that could not be read; the scan carries on past them
    pub warnings: Vec<String>,
}

impl ManifestScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Collect every manifest file under the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.exists() {
            anyhow::bail!("Manifest directory does not exist: {}", self.root_path.display());
        }

        let mut manifest_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path).into_iter().filter_entry(|e| {
            if e.path() == self.root_path {
                return true;
            }
            let file_name = e.file_name().to_string_lossy();
            !file_name.starts_with('.') && file_name != "target"
        }) {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_manifest(path) {
                        manifest_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        manifest_files.sort();
        debug!("Found {} manifest files under {}", manifest_files.len(), self.root_path.display());

        Ok(ScanResult {
            manifest_files,
            warnings,
        })
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| MANIFEST_EXTENSIONS.contains(&ext))
}
