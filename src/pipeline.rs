//! Stage wiring: load, extract, normalize schema, merge, clean text, vectorize.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::corpus::{self, Document};
use crate::features::{build_features, FeatureMatrix};
use crate::parser::{extract, Extracted};
use crate::settings::Settings;
use crate::snapshot;
use crate::table::merge::merge;
use crate::table::schema::{flatten, normalize};
use crate::table::CorpusTable;
use crate::text::{normalize_columns, TextNormalizer};

/// Where the raw documents come from.
#[derive(Debug, Clone)]
pub enum Source {
    Vault(PathBuf),
    Snapshot(PathBuf),
}

pub fn load_documents(source: &Source, settings: &Settings) -> Result<Vec<Document>> {
    match source {
        Source::Vault(root) => {
            let loaded = corpus::load(root, &settings.load_options())
                .with_context(|| format!("Failed to load notes from {:?}", root))?;
            if !loaded.skipped.is_empty() {
                info!(skipped = loaded.skipped.len(), "some files were not readable");
            }
            Ok(loaded.documents)
        }
        Source::Snapshot(path) => {
            snapshot::read(path).with_context(|| format!("Failed to read snapshot {:?}", path))
        }
    }
}

/// Front-matter extraction, schema normalization and the left join.
pub fn build_table(documents: &[Document], settings: &Settings) -> Result<CorpusTable> {
    let schema = settings.schema_options();
    let policy = settings.default_policy()?;

    let extracted: Vec<Extracted> = documents.iter().map(extract).collect();
    let records = extracted
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.front_matter.as_ref().map(|fm| (i, flatten(fm, &schema))))
        .collect();
    let normalized = normalize(records, &schema);

    Ok(merge(documents, &extracted, &normalized, &policy))
}

#[derive(Debug)]
pub struct Prepared {
    pub table: CorpusTable,
    pub features: FeatureMatrix,
}

/// Everything up to and including the feature matrix.
pub fn prepare(source: &Source, settings: &Settings) -> Result<Prepared> {
    let documents = load_documents(source, settings)?;
    let mut table = build_table(&documents, settings)?;

    let normalizer = TextNormalizer::new(&settings.stop_languages);
    normalize_columns(&mut table, &settings.text_columns, &normalizer);

    let features = build_features(&table, &settings.text_columns)
        .context("Failed to build feature matrix")?;
    info!(
        notes = table.rows(),
        columns = table.columns().len(),
        features = features.matrix.n_cols(),
        "corpus prepared"
    );
    Ok(Prepared { table, features })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusError;
    use crate::table::{Value, HAS_FRONT_MATTER, NAME, TEXT};
    use std::fs;
    use std::path::Path;

    fn vault(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, text) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, text).unwrap();
        }
        dir
    }

    fn table_for(files: &[(&str, &str)]) -> CorpusTable {
        let dir = vault(files);
        let settings = Settings::default();
        let docs = load_documents(&Source::Vault(dir.path().into()), &settings).unwrap();
        build_table(&docs, &settings).unwrap()
    }

    fn row_of(table: &CorpusTable, name: &str) -> usize {
        (0..table.rows()).find(|&r| table.text(NAME, r) == Some(name)).unwrap()
    }

    #[test]
    fn tagged_and_plain_note() {
        let t = table_for(&[
            ("a.md", "---\ntags: [x, y]\n---\nHello World"),
            ("b.md", "Just text"),
        ]);
        assert_eq!(t.rows(), 2);
        let (a, b) = (row_of(&t, "a"), row_of(&t, "b"));
        assert_eq!(t.value("tag_x", a), Some(&Value::Bool(true)));
        assert_eq!(t.value("tag_y", a), Some(&Value::Bool(true)));
        assert_eq!(t.value("tag_x", b), Some(&Value::Bool(false)));
        assert_eq!(t.value("tag_y", b), Some(&Value::Bool(false)));
        assert_eq!(t.text(TEXT, a), Some("Hello World"));
        assert_eq!(t.text(TEXT, b), Some("Just text"));
    }

    #[test]
    fn single_alias_becomes_scalar() {
        let t = table_for(&[("n.md", "---\naliases: [foo]\n---\nbody")]);
        assert_eq!(t.value("aliases", 0), Some(&Value::Text("foo".into())));
    }

    #[test]
    fn malformed_front_matter_keeps_the_note() {
        let t = table_for(&[
            ("bad.md", "---\ntitle: [unclosed\n---\nstill here"),
            ("good.md", "---\ntitle: Good\nrating: 3\ntags: [x]\n---\nfine"),
        ]);
        assert_eq!(t.rows(), 2);
        let bad = row_of(&t, "bad");
        assert_eq!(t.text(TEXT, bad), Some("still here"));
        assert_eq!(t.value(HAS_FRONT_MATTER, bad), Some(&Value::Bool(true)));
        assert_eq!(t.value("title", bad), Some(&Value::Text("missing".into())));
        assert_eq!(t.value("rating", bad), Some(&Value::Number(0.0)));
        assert_eq!(t.value("tag_x", bad), Some(&Value::Bool(false)));
    }

    #[test]
    fn nested_directories_are_relative() {
        let t = table_for(&[("projects/rust/borrow.md", "text"), ("top.md", "text")]);
        let r = row_of(&t, "borrow");
        assert_eq!(t.text("directory", r), Some("projects/rust"));
        assert_eq!(t.text("directory", row_of(&t, "top")), Some(""));
    }

    #[test]
    fn fixture_vault_end_to_end() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vault");
        let settings = Settings::default();
        let prepared = prepare(&Source::Vault(root), &settings).unwrap();
        let t = &prepared.table;

        assert_eq!(t.rows(), 6);
        // dropped plugin fields never become columns
        assert!(t.column("sr-due").is_none());
        assert!(t.column("cssclass").is_none());
        assert!(t.tag_columns().count() >= 3);

        // text was normalized before vectorizing
        let r = row_of(t, "ownership");
        let body = t.text(TEXT, r).unwrap();
        assert_eq!(body, body.to_lowercase());
        assert!(!body.split(' ').any(|w| w == "the"));

        let f = &prepared.features;
        assert_eq!(f.matrix.n_rows(), 6);
        assert!(f.block(TEXT).unwrap().width() > 0);
        assert!(f.block("name").is_some());
    }

    #[test]
    fn snapshot_source_matches_vault() {
        let dir = vault(&[("a.md", "---\ntags: [x]\n---\nA"), ("sub/b.md", "B")]);
        let settings = Settings::default();
        let docs = load_documents(&Source::Vault(dir.path().into()), &settings).unwrap();

        let csv = dir.path().join("out/corpus.csv");
        snapshot::write(&csv, &docs).unwrap();
        let restored = load_documents(&Source::Snapshot(csv), &settings).unwrap();
        assert_eq!(
            build_table(&docs, &settings).unwrap(),
            build_table(&restored, &settings).unwrap()
        );
    }

    #[test]
    fn empty_vault_is_reported() {
        let dir = vault(&[("readme.txt", "not markdown")]);
        let err = prepare(&Source::Vault(dir.path().into()), &Settings::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CorpusError>(),
            Some(CorpusError::EmptyCorpus(_))
        ));
    }
}
