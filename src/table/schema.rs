//! Flatten per-note front matter into typed columns.
//!
//! Runs in two passes over the whole corpus: the first collects the tag
//! vocabulary and the kinds observed for every field, the second
//! materializes fixed columns. No column is added after the first pass.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_yaml::Value as Yaml;
use tracing::{debug, info, warn};

use super::{format_number, tag_column_name, ColumnKind, Value, RESERVED, TAG_PREFIX};
use crate::parser::front_matter::FrontMatter;

const TAGS: &str = "tags";
const DATE: &str = "date";
const ALIASES: &str = "aliases";
const LINK: &str = "link";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Fields considered noise for clustering (scheduling data, plugin flags).
    pub dropped_fields: HashSet<String>,
    /// Tags carried by fewer notes than this get no column.
    pub min_tag_support: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            dropped_fields: HashSet::new(),
            min_tag_support: 1,
        }
    }
}

/// One flattened field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    /// Lists and mappings kept as compact JSON.
    Structured(String),
}

impl Field {
    fn kind(&self) -> ColumnKind {
        match self {
            Field::Bool(_) => ColumnKind::Boolean,
            Field::Number(_) => ColumnKind::Numeric,
            Field::Text(_) => ColumnKind::Text,
            Field::Date(_) => ColumnKind::Temporal,
            Field::Structured(_) => ColumnKind::Other,
        }
    }

    fn into_value(self, kind: ColumnKind) -> Value {
        match (kind, self) {
            (ColumnKind::Boolean, Field::Bool(b)) => Value::Bool(b),
            (ColumnKind::Numeric, Field::Number(n)) => Value::Number(n),
            (ColumnKind::Temporal, Field::Date(t)) => Value::Timestamp(t),
            (_, field) => Value::Text(field.into_text()),
        }
    }

    fn into_text(self) -> String {
        match self {
            Field::Bool(b) => b.to_string(),
            Field::Number(n) => format_number(n),
            Field::Text(s) | Field::Structured(s) => s,
            Field::Date(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// A note's front matter after flattening.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    pub tags: BTreeSet<String>,
    /// `None` marks a key that was present but null or unparseable.
    pub fields: BTreeMap<String, Option<Field>>,
}

/// Front-matter columns for the notes that had front matter. Cells are
/// optional here; the merger fills them.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Option<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    /// Document index of each row.
    pub doc_ids: Vec<usize>,
    pub columns: Vec<PartialColumn>,
}

impl NormalizedTable {
    /// Row lookup by document index.
    pub fn row_index(&self) -> HashMap<usize, usize> {
        self.doc_ids
            .iter()
            .enumerate()
            .map(|(row, &doc)| (doc, row))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&PartialColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Flatten one mapping.
pub fn flatten(fm: &FrontMatter, opts: &SchemaOptions) -> FlatRecord {
    let mut record = FlatRecord::default();

    for (key, raw) in fm {
        if opts.dropped_fields.contains(key) {
            continue;
        }

        if key == TAGS {
            record.tags = collect_tags(raw);
            continue;
        }

        let value = unwrap_single(raw);
        let field = match key.as_str() {
            DATE => parse_date(value).map(Field::Date),
            ALIASES | LINK => yaml_to_text(value).map(Field::Text),
            _ => to_field(value),
        };
        let name = free_name(&record.fields, column_name(key));
        record.fields.insert(name, field);
    }

    record
}

/// Build the front-matter columns for every `(doc_id, record)` pair.
pub fn normalize(records: Vec<(usize, FlatRecord)>, opts: &SchemaOptions) -> NormalizedTable {
    // Pass 1: vocabulary and kinds.
    let mut tag_support: BTreeMap<&str, usize> = BTreeMap::new();
    let mut observed: BTreeMap<&str, BTreeSet<ColumnKind>> = BTreeMap::new();
    for (_, record) in &records {
        for tag in &record.tags {
            *tag_support.entry(tag.as_str()).or_default() += 1;
        }
        for (name, field) in &record.fields {
            let kinds = observed.entry(name.as_str()).or_default();
            if let Some(f) = field {
                kinds.insert(f.kind());
            }
        }
    }

    let vocabulary: Vec<String> = tag_support
        .iter()
        .filter(|(_, n)| **n >= opts.min_tag_support)
        .map(|(t, _)| t.to_string())
        .collect();
    let pruned = tag_support.len() - vocabulary.len();
    if pruned > 0 {
        debug!(pruned, min_support = opts.min_tag_support, "pruned rare tags");
    }

    let schema: Vec<(String, ColumnKind)> = observed
        .into_iter()
        .map(|(name, kinds)| (name.to_string(), resolve_kind(name, &kinds)))
        .collect();

    // Pass 2: materialize.
    let rows = records.len();
    let mut doc_ids = Vec::with_capacity(rows);
    let mut field_cells: Vec<Vec<Option<Value>>> = vec![Vec::with_capacity(rows); schema.len()];
    let mut tag_cells: Vec<Vec<Option<Value>>> = vec![Vec::with_capacity(rows); vocabulary.len()];

    for (doc_id, mut record) in records {
        doc_ids.push(doc_id);
        for ((name, kind), cells) in schema.iter().zip(field_cells.iter_mut()) {
            let cell = record
                .fields
                .remove(name)
                .flatten()
                .map(|f| f.into_value(*kind));
            cells.push(cell);
        }
        for (tag, cells) in vocabulary.iter().zip(tag_cells.iter_mut()) {
            cells.push(Some(Value::Bool(record.tags.contains(tag))));
        }
    }

    let mut columns: Vec<PartialColumn> = schema
        .into_iter()
        .zip(field_cells)
        .map(|((name, kind), cells)| PartialColumn { name, kind, cells })
        .collect();
    columns.extend(vocabulary.iter().zip(tag_cells).map(|(tag, cells)| PartialColumn {
        name: tag_column_name(tag),
        kind: ColumnKind::Boolean,
        cells,
    }));

    info!(
        rows,
        fields = columns.len() - vocabulary.len(),
        tags = vocabulary.len(),
        "front matter normalized"
    );
    NormalizedTable { doc_ids, columns }
}

fn resolve_kind(name: &str, kinds: &BTreeSet<ColumnKind>) -> ColumnKind {
    match name {
        DATE => ColumnKind::Temporal,
        ALIASES | LINK => ColumnKind::Text,
        _ if kinds.len() == 1 => *kinds.iter().next().unwrap_or(&ColumnKind::Other),
        _ => ColumnKind::Other,
    }
}

/// Keep front-matter keys out of the pipeline's own column names.
fn column_name(key: &str) -> String {
    if RESERVED.contains(&key) || key.starts_with(TAG_PREFIX) {
        format!("fm_{}", key)
    } else {
        key.to_string()
    }
}

/// Prefix again until the name is unused, so a literal `fm_<key>` and a
/// renamed reserved key both survive.
fn free_name(fields: &BTreeMap<String, Option<Field>>, mut name: String) -> String {
    if fields.contains_key(&name) {
        let original = name.clone();
        while fields.contains_key(&name) {
            name = format!("fm_{}", name);
        }
        warn!(field = %original, renamed = %name, "front-matter field name collision");
    }
    name
}

fn unwrap_single(value: &Yaml) -> &Yaml {
    match value {
        Yaml::Sequence(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

fn collect_tags(value: &Yaml) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    match value {
        Yaml::String(s) => {
            for part in s.split(|c: char| c == ',' || c.is_whitespace()) {
                insert_tag(&mut tags, part);
            }
        }
        Yaml::Sequence(items) => {
            for item in items {
                if let Some(t) = scalar_text(item) {
                    insert_tag(&mut tags, &t);
                }
            }
        }
        Yaml::Number(_) | Yaml::Bool(_) => {
            if let Some(t) = scalar_text(value) {
                insert_tag(&mut tags, &t);
            }
        }
        _ => {}
    }
    tags
}

fn insert_tag(tags: &mut BTreeSet<String>, raw: &str) {
    let tag = raw.trim().trim_start_matches('#');
    if !tag.is_empty() {
        tags.insert(tag.to_string());
    }
}

fn scalar_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn yaml_to_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::Null => None,
        Yaml::Sequence(items) => {
            let parts: Vec<String> = items.iter().filter_map(yaml_to_text).collect();
            Some(parts.join(", "))
        }
        Yaml::Mapping(_) | Yaml::Tagged(_) => Some(to_json(value)),
        scalar => scalar_text(scalar),
    }
}

fn to_field(value: &Yaml) -> Option<Field> {
    match value {
        Yaml::Null => None,
        Yaml::Bool(b) => Some(Field::Bool(*b)),
        Yaml::Number(n) => n.as_f64().map(Field::Number),
        Yaml::String(s) => Some(Field::Text(s.clone())),
        Yaml::Sequence(_) | Yaml::Mapping(_) | Yaml::Tagged(_) => {
            Some(Field::Structured(to_json(value)))
        }
    }
}

fn to_json(value: &Yaml) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{:?}", value))
}

/// Parse a front-matter date. Anything unrecognised is `None`, never "now".
pub fn parse_date(value: &Yaml) -> Option<NaiveDateTime> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ── Tests ──
