use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Names of the direct children of a directory
    pub fn entry_names<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to list directory: {:?}", dir))? {
            let entry = entry.context("Failed to read directory entry")?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    /// All files below `dir`, skipping anything under one of the `ignored` prefixes
    ///
    /// Ignored prefixes are relative to `dir`; results are sorted.
    pub fn find_files<P: AsRef<Path>>(dir: P, ignored: &[String]) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let ignored: Vec<PathBuf> = ignored.iter().map(|location| dir.join(location)).collect();
        let mut result = Vec::new();

        let walker = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !ignored.iter().any(|prefix| entry.path().starts_with(prefix)));

        for entry in walker {
            let entry = entry.context("Failed to read directory entry")?;
            if entry.file_type().is_file() {
                result.push(entry.path().to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file, creating the parent directories
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
    }

    /// Write every `(path, content)` pair or none of them
    ///
    /// Contents go to temporary files next to their destinations first and are
    /// renamed into place once all of them were written. A failed rename removes
    /// the destinations already renamed. The error names the failing path.
    pub fn write_all_or_nothing(files: &[(PathBuf, String)]) -> std::result::Result<(), (PathBuf, std::io::Error)> {
        let mut staged = Vec::with_capacity(files.len());
        for (path, content) in files {
            let staged_file = Self::stage(path, content).map_err(|e| (path.clone(), e))?;
            staged.push((staged_file, path));
        }

        let mut persisted: Vec<&PathBuf> = Vec::with_capacity(staged.len());
        for (staged_file, path) in staged {
            if let Err(e) = staged_file.persist(path) {
                for done in persisted {
                    if let Err(remove_error) = fs::remove_file(done) {
                        warn!("Failed to remove {:?} after a failed write: {}", done, remove_error);
                    }
                }
                return Err((path.clone(), e.error));
            }
            persisted.push(path);
        }

        Ok(())
    }

    fn stage(path: &Path, content: &str) -> std::io::Result<NamedTempFile> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut staged_file = NamedTempFile::new_in(parent)?;
        staged_file.write_all(content.as_bytes())?;
        staged_file.flush()?;
        Ok(staged_file)
    }
}
