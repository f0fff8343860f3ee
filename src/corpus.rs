//! Vault walker: one `Document` per Markdown file under the root.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No Markdown files found under {0}")]
    EmptyCorpus(PathBuf),

    #[error("Snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// What to do when a file cannot be read (permissions, invalid UTF-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    /// Log a warning, remember the path, keep going.
    Skip,
    /// Fail the whole run.
    Abort,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub extension: String,
    pub skip_hidden: bool,
    pub on_read_error: ReadErrorPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extension: "md".into(),
            skip_hidden: false,
            on_read_error: ReadErrorPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Directory relative to the vault root; empty for top-level notes.
    pub directory: PathBuf,
    /// File stem.
    pub name: String,
    pub extension: String,
    pub text: String,
}

#[derive(Debug)]
pub struct LoadedCorpus {
    pub documents: Vec<Document>,
    pub skipped: Vec<PathBuf>,
}

pub fn load(root: &Path, opts: &LoadOptions) -> Result<LoadedCorpus, CorpusError> {
    if !root.exists() {
        return Err(CorpusError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(CorpusError::NotADirectory(root.to_path_buf()));
    }

    let mut skipped = Vec::new();
    let candidates = collect_candidates(root, opts, &mut skipped)?;
    debug!(candidates = candidates.len(), "walk complete");

    let pb = ProgressBar::new(candidates.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} notes")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut documents = Vec::with_capacity(candidates.len());
    for path in candidates {
        pb.inc(1);
        // read_to_string owns the handle; it is closed on every return path
        match fs::read_to_string(&path) {
            Ok(text) => documents.push(to_document(root, &path, text)),
            Err(source) => match opts.on_read_error {
                ReadErrorPolicy::Skip => {
                    warn!(path = %path.display(), error = %source, "skipping unreadable file");
                    skipped.push(path);
                }
                ReadErrorPolicy::Abort => {
                    pb.finish_and_clear();
                    return Err(CorpusError::Read { path, source });
                }
            },
        }
    }
    pb.finish_and_clear();

    if documents.is_empty() {
        return Err(CorpusError::EmptyCorpus(root.to_path_buf()));
    }

    info!(
        root = %root.display(),
        documents = documents.len(),
        skipped = skipped.len(),
        "corpus loaded"
    );
    Ok(LoadedCorpus { documents, skipped })
}

fn collect_candidates(
    root: &Path,
    opts: &LoadOptions,
    skipped: &mut Vec<PathBuf>,
) -> Result<Vec<PathBuf>, CorpusError> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(opts.skip_hidden && e.depth() > 0 && is_hidden(e)));

    let mut out = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(source) => {
                let path = source.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                match opts.on_read_error {
                    ReadErrorPolicy::Skip => {
                        warn!(path = %path.display(), error = %source, "skipping unwalkable entry");
                        skipped.push(path);
                        continue;
                    }
                    ReadErrorPolicy::Abort => return Err(CorpusError::Walk { path, source }),
                }
            }
        };
        if entry.file_type().is_file() && has_extension(entry.path(), &opts.extension) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn to_document(root: &Path, path: &Path, text: String) -> Document {
    let directory = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Document {
        directory,
        name,
        extension,
        text,
    }
}

// ── Tests ──
