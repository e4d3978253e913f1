//! Directory scanning: walk the input roots and keep files whose name ends
//! with one of the accepted extensions.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("input directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("failed to stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A matching file and its modification time in seconds since the epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub modified: f64,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    /// Problems that were logged and skipped.
    pub errors: Vec<ScanError>,
}

#[derive(Debug, Clone)]
pub struct Scanner {
    extensions: Vec<String>,
    recursive: bool,
}

impl Scanner {
    /// `extensions` may be given as `pdf` or `.PDF`; matching ignores case.
    pub fn new<S: AsRef<str>>(extensions: &[S], recursive: bool) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| e.len() > 1)
                .collect(),
            recursive,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    /// Walk every root. Missing roots and unreadable entries are logged and
    /// reported in [`ScanOutcome::errors`]; they never abort the scan.
    pub fn scan(&self, roots: &[PathBuf]) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut seen = HashSet::new();

        for root in roots {
            let root = std::path::absolute(root).unwrap_or_else(|_| root.clone());
            if !root.is_dir() {
                warn!("Input directory does not exist, skipping: {}", root.display());
                outcome.errors.push(ScanError::DirectoryNotFound(root));
                continue;
            }

            // Plain filesystem walk: hidden files and ignore files are not special
            let walker = WalkBuilder::new(&root)
                .standard_filters(false)
                .max_depth(if self.recursive { None } else { Some(1) })
                .sort_by_file_name(|a, b| a.cmp(b))
                .build();

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry under {}: {e}", root.display());
                        outcome.errors.push(ScanError::Walk {
                            root: root.clone(),
                            source: e,
                        });
                        continue;
                    }
                };

                let path = entry.path();
                if !path.is_file() || !self.matches(path) {
                    continue;
                }

                let modified = match path.metadata().and_then(|m| m.modified()) {
                    Ok(t) => system_time_to_secs(t),
                    Err(e) => {
                        warn!("Cannot read modification time of {}: {e}", path.display());
                        outcome.errors.push(ScanError::Metadata {
                            path: path.to_path_buf(),
                            source: e,
                        });
                        continue;
                    }
                };

                if seen.insert(path.to_path_buf()) {
                    outcome.files.push(ScannedFile {
                        path: path.to_path_buf(),
                        modified,
                    });
                }
            }
        }

        debug!("Scan found {} matching files", outcome.files.len());
        outcome
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Seconds since the Unix epoch; times before the epoch come out negative.
pub fn system_time_to_secs(t: SystemTime) -> f64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(outcome: &ScanOutcome) -> Vec<String> {
        outcome
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let scanner = Scanner::new(&[".pdf", "TXT"], true);
        assert!(scanner.matches(Path::new("/docs/Doc.PDF")));
        assert!(scanner.matches(Path::new("/docs/notes.txt")));
        assert!(!scanner.matches(Path::new("/docs/notes.md")));
        assert!(!scanner.matches(Path::new("/docs/pdf")));
    }

    #[test]
    fn test_scan_recursive_and_flat() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("top.txt"), "a").unwrap();
        fs::write(dir.path().join("skip.md"), "b").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("nested.txt"), "c").unwrap();

        let roots = vec![dir.path().to_path_buf()];

        let recursive = Scanner::new(&[".txt"], true).scan(&roots);
        assert_eq!(names(&recursive), vec!["nested.txt", "top.txt"]);

        let flat = Scanner::new(&[".txt"], false).scan(&roots);
        assert_eq!(names(&flat), vec!["top.txt"]);
    }

    #[test]
    fn test_scan_includes_hidden_and_ignored_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.txt\n").unwrap();
        fs::write(dir.path().join(".hidden.txt"), "a").unwrap();
        fs::write(dir.path().join("plain.txt"), "b").unwrap();

        let outcome = Scanner::new(&[".txt"], true).scan(&[dir.path().to_path_buf()]);
        assert_eq!(names(&outcome), vec![".hidden.txt", "plain.txt"]);
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let roots = vec![dir.path().join("missing"), dir.path().to_path_buf()];
        let outcome = Scanner::new(&[".txt"], true).scan(&roots);

        assert_eq!(names(&outcome), vec!["a.txt"]);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(outcome.errors[0], ScanError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_overlapping_roots_report_once() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("a.txt"), "a").unwrap();

        let roots = vec![dir.path().to_path_buf(), dir.path().join("sub")];
        let outcome = Scanner::new(&[".txt"], true).scan(&roots);
        assert_eq!(outcome.files.len(), 1);
        assert!(outcome.files[0].path.is_absolute());
    }

    #[test]
    fn test_system_time_to_secs() {
        let t = UNIX_EPOCH + std::time::Duration::from_millis(1500);
        assert_eq!(system_time_to_secs(t), 1.5);
        assert_eq!(system_time_to_secs(UNIX_EPOCH), 0.0);
    }
}
