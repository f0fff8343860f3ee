//! TF-IDF features, one independently fitted vectorizer per text column.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::table::{ColumnKind, CorpusTable};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Cannot vectorize an empty corpus")]
    EmptyCorpus,

    #[error("No terms found in any of the columns {0:?}")]
    NoTerms(Vec<String>),
}

/// Sparse row with strictly increasing indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseVector {
    pub fn from_pairs(mut pairs: Vec<(usize, f64)>) -> Self {
        pairs.sort_by_key(|&(i, _)| i);
        let (indices, values) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.iter().map(|(i, v)| v * dense[i]).sum()
    }

    /// `dense += scale * self`
    pub fn add_to(&self, dense: &mut [f64], scale: f64) {
        for (i, v) in self.iter() {
            dense[i] += scale * v;
        }
    }

    fn l2_normalize(&mut self) {
        let norm = self.squared_norm().sqrt();
        if norm > 0.0 {
            self.values.iter_mut().for_each(|v| *v /= norm);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    rows: Vec<SparseVector>,
    n_cols: usize,
}

impl SparseMatrix {
    pub fn new(rows: Vec<SparseVector>, n_cols: usize) -> Self {
        debug_assert!(rows
            .iter()
            .all(|r| r.indices.last().map_or(true, |&i| i < n_cols)));
        Self { rows, n_cols }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> &SparseVector {
        &self.rows[i]
    }

    /// Place blocks side by side. All blocks must have the same row count.
    pub fn hstack(blocks: &[SparseMatrix]) -> SparseMatrix {
        let n_rows = blocks.first().map_or(0, |b| b.n_rows());
        assert!(blocks.iter().all(|b| b.n_rows() == n_rows), "row count mismatch");

        let mut rows = vec![SparseVector::default(); n_rows];
        let mut offset = 0;
        for block in blocks {
            for (row, part) in rows.iter_mut().zip(&block.rows) {
                row.indices.extend(part.indices.iter().map(|i| i + offset));
                row.values.extend_from_slice(&part.values);
            }
            offset += block.n_cols;
        }
        SparseMatrix { rows, n_cols: offset }
    }
}

/// Term-frequency / inverse-document-frequency model for one column.
///
/// Vocabulary indices follow sorted term order. Weights use raw counts,
/// smoothed idf `ln((1 + n) / (1 + df)) + 1` and unit L2 rows.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn fit(docs: &[&str]) -> Self {
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs {
            let unique: BTreeSet<&str> = tokenize(doc).collect();
            for term in unique {
                *df.entry(term.to_string()).or_default() += 1;
            }
        }

        let n = docs.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(df.len());
        for (index, (term, count)) in df.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + count as f64)).ln() + 1.0);
            vocabulary.insert(term, index);
        }
        Self { vocabulary, idf }
    }

    pub fn transform(&self, docs: &[&str]) -> SparseMatrix {
        let rows = docs
            .iter()
            .map(|doc| {
                let mut counts: HashMap<usize, f64> = HashMap::new();
                for term in tokenize(doc) {
                    if let Some(&i) = self.vocabulary.get(term) {
                        *counts.entry(i).or_default() += 1.0;
                    }
                }
                let mut row = SparseVector::from_pairs(
                    counts.into_iter().map(|(i, tf)| (i, tf * self.idf[i])).collect(),
                );
                row.l2_normalize();
                row
            })
            .collect();
        SparseMatrix::new(rows, self.vocabulary.len())
    }

    pub fn fit_transform(docs: &[&str]) -> (Self, SparseMatrix) {
        let model = Self::fit(docs);
        let matrix = model.transform(docs);
        (model, matrix)
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&i| self.idf[i])
    }

    /// Terms in index order.
    pub fn terms(&self) -> Vec<String> {
        self.vocabulary.keys().cloned().collect()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str())
}

/// Where one column's terms live inside the concatenated matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBlock {
    pub column: String,
    pub offset: usize,
    pub terms: Vec<String>,
}

impl FeatureBlock {
    pub fn width(&self) -> usize {
        self.terms.len()
    }
}

#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub matrix: SparseMatrix,
    pub blocks: Vec<FeatureBlock>,
}

impl FeatureMatrix {
    pub fn block(&self, column: &str) -> Option<&FeatureBlock> {
        self.blocks.iter().find(|b| b.column == column)
    }

    /// Highest mean-weight terms of one column over a subset of rows.
    pub fn top_terms(&self, column: &str, rows: &[usize], k: usize) -> Vec<(String, f64)> {
        let Some(block) = self.block(column) else {
            return Vec::new();
        };
        if rows.is_empty() || block.width() == 0 {
            return Vec::new();
        }

        let range = block.offset..block.offset + block.width();
        let mut sums = vec![0.0; block.width()];
        for &r in rows {
            for (i, v) in self.matrix.row(r).iter() {
                if range.contains(&i) {
                    sums[i - block.offset] += v;
                }
            }
        }

        let n = rows.len() as f64;
        let mut ranked: Vec<(String, f64)> = sums
            .into_iter()
            .enumerate()
            .filter(|&(_, s)| s > 0.0)
            .map(|(i, s)| (block.terms[i].clone(), s / n))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}

/// Fit one vectorizer per column and concatenate the blocks. The fitted
/// models are dropped on return; only the matrix and term names survive.
pub fn build_features(table: &CorpusTable, columns: &[String]) -> Result<FeatureMatrix, FeatureError> {
    if table.rows() == 0 {
        return Err(FeatureError::EmptyCorpus);
    }

    let mut matrices = Vec::new();
    let mut blocks = Vec::new();
    let mut offset = 0;

    for name in columns {
        let Some(column) = table.column(name) else {
            warn!(column = %name, "text column not present, skipping");
            continue;
        };
        if column.kind != ColumnKind::Text {
            warn!(column = %name, kind = column.kind.as_str(), "not a text column, skipping");
            continue;
        }

        let docs: Vec<&str> = column.values.iter().map(|v| v.as_text().unwrap_or("")).collect();
        let (model, matrix) = TfidfVectorizer::fit_transform(&docs);
        if model.is_empty() {
            warn!(column = %name, "empty vocabulary");
        }
        debug!(column = %name, terms = model.len(), "vectorized");

        blocks.push(FeatureBlock {
            column: name.clone(),
            offset,
            terms: model.terms(),
        });
        offset += matrix.n_cols();
        matrices.push(matrix);
    }

    let matrix = SparseMatrix::hstack(&matrices);
    if matrix.n_cols() == 0 {
        return Err(FeatureError::NoTerms(columns.to_vec()));
    }

    info!(
        rows = matrix.n_rows(),
        features = matrix.n_cols(),
        blocks = blocks.len(),
        "feature matrix built"
    );
    Ok(FeatureMatrix { matrix, blocks })
}

// ── Tests ──
