pub mod merge;
pub mod schema;

use std::fmt;

use chrono::NaiveDateTime;

use crate::cluster::Label;

pub const DIRECTORY: &str = "directory";
pub const NAME: &str = "name";
pub const EXTENSION: &str = "extension";
pub const TEXT: &str = "text";
pub const HAS_FRONT_MATTER: &str = "has_front_matter";
pub const CLUSTER: &str = "cluster";
pub const TAG_PREFIX: &str = "tag_";

/// Column names owned by the pipeline rather than by front matter.
pub const RESERVED: &[&str] = &[DIRECTORY, NAME, EXTENSION, TEXT, HAS_FRONT_MATTER, CLUSTER];

/// Semantic column type, fixed per column when the schema is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKind {
    Boolean,
    Numeric,
    Text,
    Temporal,
    Other,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Boolean => "boolean",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
            ColumnKind::Temporal => "temporal",
            ColumnKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M")),
        }
    }
}

/// Integers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A fully populated column: one value per document.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Value>,
}

/// The merged corpus: one row per loaded note, no missing cells.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusTable {
    columns: Vec<Column>,
    rows: usize,
}

impl CorpusTable {
    pub fn new(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// Appends or replaces a column. Panics if the length does not match the
    /// row count, since every column must cover every document.
    pub fn push(&mut self, column: Column) {
        assert_eq!(
            column.values.len(),
            self.rows,
            "column {} has {} values for {} rows",
            column.name,
            column.values.len(),
            self.rows
        );
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn value(&self, column: &str, row: usize) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    pub fn text(&self, column: &str, row: usize) -> Option<&str> {
        self.value(column, row).and_then(Value::as_text)
    }

    /// `tag_*` columns.
    pub fn tag_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Boolean && c.name.starts_with(TAG_PREFIX))
    }

    /// Attach the chosen clustering as a numeric `cluster` column; noise is -1.
    pub fn attach_labels(&mut self, labels: &[Label]) {
        self.push(Column {
            name: CLUSTER.to_string(),
            kind: ColumnKind::Numeric,
            values: labels.iter().map(|l| Value::Number(l.as_i64() as f64)).collect(),
        });
    }
}

pub fn tag_column_name(tag: &str) -> String {
    format!("{}{}", TAG_PREFIX, tag)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_replaces_by_name() {
        let mut t = CorpusTable::new(2);
        t.push(Column {
            name: "x".into(),
            kind: ColumnKind::Numeric,
            values: vec![Value::Number(1.0), Value::Number(2.0)],
        });
        t.push(Column {
            name: "x".into(),
            kind: ColumnKind::Text,
            values: vec![Value::Text("a".into()), Value::Text("b".into())],
        });
        assert_eq!(t.columns().len(), 1);
        assert_eq!(t.text("x", 1), Some("b"));
    }

    #[test]
    #[should_panic]
    fn push_rejects_short_column() {
        let mut t = CorpusTable::new(2);
        t.push(Column {
            name: "x".into(),
            kind: ColumnKind::Boolean,
            values: vec![Value::Bool(true)],
        });
    }

    #[test]
    fn attach_labels_marks_noise() {
        let mut t = CorpusTable::new(3);
        t.attach_labels(&[Label::Cluster(0), Label::Noise, Label::Cluster(2)]);
        let c = t.column(CLUSTER).unwrap();
        assert_eq!(c.kind, ColumnKind::Numeric);
        let got: Vec<_> = c.values.iter().filter_map(Value::as_number).collect();
        assert_eq!(got, vec![0.0, -1.0, 2.0]);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-1.0), "-1");
        assert_eq!(format_number(2.5), "2.5");
    }
}
