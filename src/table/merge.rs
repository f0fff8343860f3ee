use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use super::schema::NormalizedTable;
use super::{
    Column, ColumnKind, CorpusTable, Value, DIRECTORY, EXTENSION, HAS_FRONT_MATTER, NAME, TEXT,
};
use crate::corpus::Document;
use crate::parser::Extracted;

/// Fill value per column kind. Resolved once per column, never per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultPolicy {
    pub text: String,
    pub other: String,
    pub sentinel: NaiveDateTime,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self {
            text: "missing".into(),
            other: "unknown".into(),
            sentinel: NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
        }
    }
}

impl DefaultPolicy {
    pub fn fill(&self, kind: ColumnKind) -> Value {
        match kind {
            ColumnKind::Boolean => Value::Bool(false),
            ColumnKind::Numeric => Value::Number(0.0),
            ColumnKind::Text => Value::Text(self.text.clone()),
            ColumnKind::Temporal => Value::Timestamp(self.sentinel),
            ColumnKind::Other => Value::Text(self.other.clone()),
        }
    }
}

/// Left join of every loaded note with its front-matter row.
///
/// `extracted[i]` belongs to `documents[i]`. The result has exactly one row
/// per document, in loader order, and no missing cells.
pub fn merge(
    documents: &[Document],
    extracted: &[Extracted],
    normalized: &NormalizedTable,
    policy: &DefaultPolicy,
) -> CorpusTable {
    assert_eq!(documents.len(), extracted.len(), "one extraction per document");

    let rows = documents.len();
    let mut table = CorpusTable::new(rows);

    let text_column = |name: &str, f: &dyn Fn(usize) -> String| Column {
        name: name.to_string(),
        kind: ColumnKind::Text,
        values: (0..rows).map(|i| Value::Text(f(i))).collect(),
    };
    table.push(text_column(DIRECTORY, &|i: usize| {
        documents[i].directory.to_string_lossy().replace('\\', "/")
    }));
    table.push(text_column(NAME, &|i: usize| documents[i].name.clone()));
    table.push(text_column(EXTENSION, &|i: usize| documents[i].extension.clone()));
    // body is the original text when there were no fences
    table.push(text_column(TEXT, &|i: usize| extracted[i].body.clone()));
    table.push(Column {
        name: HAS_FRONT_MATTER.to_string(),
        kind: ColumnKind::Boolean,
        values: extracted
            .iter()
            .map(|e| Value::Bool(e.front_matter.is_some()))
            .collect(),
    });

    let row_of = normalized.row_index();
    for partial in &normalized.columns {
        let default = policy.fill(partial.kind);
        let values = (0..rows)
            .map(|doc| {
                row_of
                    .get(&doc)
                    .and_then(|&row| partial.cells[row].clone())
                    .unwrap_or_else(|| default.clone())
            })
            .collect();
        table.push(Column {
            name: partial.name.clone(),
            kind: partial.kind,
            values,
        });
    }

    info!(
        rows,
        with_front_matter = normalized.doc_ids.len(),
        columns = table.columns().len(),
        "corpus merged"
    );
    table
}

// ── Tests ──
