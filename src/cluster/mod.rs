pub mod birch;
pub mod dbscan;
pub mod projection;
pub mod sweep;

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::features::SparseMatrix;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Nothing to cluster")]
    EmptyInput,
}

/// Cluster membership of one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Noise,
    Cluster(usize),
}

impl Label {
    /// Numeric form used in tables and captions.
    pub fn as_i64(&self) -> i64 {
        match self {
            Label::Noise => -1,
            Label::Cluster(c) => *c as i64,
        }
    }

    pub fn is_noise(&self) -> bool {
        matches!(self, Label::Noise)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Noise => write!(f, "noise"),
            Label::Cluster(c) => write!(f, "{}", c),
        }
    }
}

/// Labels for every row of the feature matrix, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub labels: Vec<Label>,
}

impl Assignment {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_clusters(&self) -> usize {
        self.distinct_labels().iter().filter(|l| !l.is_noise()).count()
    }

    pub fn n_noise(&self) -> usize {
        self.labels.iter().filter(|l| l.is_noise()).count()
    }

    /// Observed labels in ascending order, noise first.
    pub fn distinct_labels(&self) -> Vec<Label> {
        self.labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    pub fn members(&self, label: Label) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == label)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Dense symmetric matrix of pairwise Euclidean distances.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// `|a - b|` from norms and dot products, so each pair costs one
    /// sparse merge.
    pub fn euclidean(matrix: &SparseMatrix) -> Self {
        let n = matrix.n_rows();
        let norms: Vec<f64> = matrix.rows().iter().map(|r| r.squared_norm()).collect();
        let data = distance_rows(matrix, &norms);
        Self { n, data }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}

fn distance_row(matrix: &SparseMatrix, norms: &[f64], i: usize) -> Vec<f64> {
    let a = matrix.row(i);
    (0..matrix.n_rows())
        .map(|j| {
            if i == j {
                0.0
            } else {
                let sq = norms[i] + norms[j] - 2.0 * a.dot(matrix.row(j));
                sq.max(0.0).sqrt()
            }
        })
        .collect()
}

#[cfg(feature = "rayon")]
fn distance_rows(matrix: &SparseMatrix, norms: &[f64]) -> Vec<f64> {
    (0..matrix.n_rows())
        .into_par_iter()
        .flat_map_iter(|i| distance_row(matrix, norms, i))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn distance_rows(matrix: &SparseMatrix, norms: &[f64]) -> Vec<f64> {
    (0..matrix.n_rows())
        .flat_map(|i| distance_row(matrix, norms, i))
        .collect()
}

fn positive(name: &'static str, value: f64) -> Result<(), ClusterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ClusterError::InvalidParameter {
            name,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

fn at_least(name: &'static str, value: usize, min: usize) -> Result<(), ClusterError> {
    if value >= min {
        Ok(())
    } else {
        Err(ClusterError::InvalidParameter {
            name,
            reason: format!("must be at least {}, got {}", min, value),
        })
    }
}

// ── Tests ──

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::SparseVector;

    pub(crate) fn dense(points: &[&[f64]]) -> SparseMatrix {
        let dim = points.first().map_or(0, |p| p.len());
        let rows = points
            .iter()
            .map(|p| {
                SparseVector::from_pairs(
                    p.iter()
                        .enumerate()
                        .filter(|(_, v)| **v != 0.0)
                        .map(|(i, v)| (i, *v))
                        .collect(),
                )
            })
            .collect();
        SparseMatrix::new(rows, dim)
    }

    /// Two tight groups around (0, 0) and (10, 10).
    pub(crate) fn two_blobs() -> SparseMatrix {
        dense(&[
            &[0.0, 0.0],
            &[0.1, 0.0],
            &[0.0, 0.1],
            &[0.1, 0.1],
            &[10.0, 10.0],
            &[10.1, 10.0],
            &[10.0, 10.1],
            &[10.1, 10.1],
        ])
    }

    #[test]
    fn euclidean_distances() {
        let m = dense(&[&[0.0, 0.0], &[3.0, 4.0], &[3.0, 0.0]]);
        let d = DistanceMatrix::euclidean(&m);
        assert_eq!(d.len(), 3);
        assert!((d.get(0, 1) - 5.0).abs() < 1e-9);
        assert!((d.get(1, 2) - 4.0).abs() < 1e-9);
        assert_eq!(d.get(2, 0), d.get(0, 2));
        assert_eq!(d.get(1, 1), 0.0);
    }

    #[test]
    fn assignment_counts() {
        let a = Assignment::new(vec![
            Label::Cluster(1),
            Label::Noise,
            Label::Cluster(0),
            Label::Cluster(1),
            Label::Noise,
        ]);
        assert_eq!(a.n_clusters(), 2);
        assert_eq!(a.n_noise(), 2);
        assert_eq!(
            a.distinct_labels(),
            vec![Label::Noise, Label::Cluster(0), Label::Cluster(1)]
        );
        assert_eq!(a.members(Label::Cluster(1)), vec![0, 3]);
    }

    #[test]
    fn label_display() {
        assert_eq!(Label::Noise.to_string(), "noise");
        assert_eq!(Label::Cluster(3).to_string(), "3");
        assert_eq!(Label::Noise.as_i64(), -1);
    }

    #[test]
    fn parameter_checks() {
        assert!(positive("eps", 0.5).is_ok());
        assert!(positive("eps", 0.0).is_err());
        assert!(positive("eps", f64::NAN).is_err());
        assert!(at_least("min_samples", 1, 1).is_ok());
        assert!(at_least("min_samples", 0, 1).is_err());
    }
}
