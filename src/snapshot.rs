//! Raw corpus snapshot: the only artifact the pipeline persists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::{CorpusError, Document};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    directory: String,
    name: String,
    extension: String,
    text: String,
}

pub fn write(path: &Path, documents: &[Document]) -> Result<(), CorpusError> {
    let wrap = |source| CorpusError::Snapshot {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| wrap(e.into()))?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(wrap)?;
    for doc in documents {
        writer
            .serialize(SnapshotRow {
                directory: doc.directory.to_string_lossy().replace('\\', "/"),
                name: doc.name.clone(),
                extension: doc.extension.clone(),
                text: doc.text.clone(),
            })
            .map_err(wrap)?;
    }
    writer.flush().map_err(|e| wrap(e.into()))?;

    info!(path = %path.display(), rows = documents.len(), "snapshot written");
    Ok(())
}

pub fn read(path: &Path) -> Result<Vec<Document>, CorpusError> {
    let wrap = |source| CorpusError::Snapshot {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(wrap)?;
    let mut documents = Vec::new();
    for row in reader.deserialize::<SnapshotRow>() {
        let row = row.map_err(wrap)?;
        documents.push(Document {
            directory: PathBuf::from(row.directory),
            name: row.name,
            extension: row.extension,
            text: row.text,
        });
    }

    if documents.is_empty() {
        return Err(CorpusError::EmptyCorpus(path.to_path_buf()));
    }
    Ok(documents)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(dir: &str, name: &str, text: &str) -> Document {
        Document {
            directory: PathBuf::from(dir),
            name: name.into(),
            extension: "md".into(),
            text: text.into(),
        }
    }

    #[test]
    fn header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/corpus.csv");
        write(&path, &[doc("", "a", "hello"), doc("x/y", "b", "world")]).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let mut lines = raw.lines();
        assert_eq!(lines.next(), Some("directory,name,extension,text"));
        assert_eq!(lines.next(), Some(",a,md,hello"));
        assert_eq!(lines.next(), Some("x/y,b,md,world"));
    }

    #[test]
    fn multiline_text_with_delimiters_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        let text = "---\ntags: [a, b]\n---\nLine one, with \"quotes\"\nLine two";
        let docs = vec![doc("inbox", "note", text)];
        write(&path, &docs).unwrap();
        assert_eq!(read(&path).unwrap(), docs);
    }

    #[test]
    fn empty_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        write(&path, &[]).unwrap();
        assert!(matches!(read(&path), Err(CorpusError::EmptyCorpus(_))));
    }
}
