//! Two-dimensional PCA projection for plotting.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::features::SparseMatrix;

const MAX_ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-10;

/// Project rows onto the first two principal components.
///
/// Components come from power iteration on the implicit covariance matrix
/// (the data is never densified), the second one kept orthogonal to the
/// first. Each component is signed so its largest-magnitude entry is
/// positive, which makes the output depend only on the data and `seed`.
/// A missing component (rank < 2) projects to zero.
pub fn project_2d(matrix: &SparseMatrix, seed: u64) -> Vec<[f64; 2]> {
    let n = matrix.n_rows();
    let dim = matrix.n_cols();
    if n == 0 {
        return Vec::new();
    }
    if dim == 0 {
        return vec![[0.0, 0.0]; n];
    }

    let mut mean = vec![0.0; dim];
    for row in matrix.rows() {
        row.add_to(&mut mean, 1.0 / n as f64);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let first = principal_component(matrix, &mean, &[], &mut rng);
    let second = first
        .as_ref()
        .and_then(|c| principal_component(matrix, &mean, std::slice::from_ref(c), &mut rng));

    let coordinate = |component: &Option<Vec<f64>>, i: usize| match component {
        Some(c) => matrix.row(i).dot_dense(c) - dot(&mean, c),
        None => 0.0,
    };
    (0..n)
        .map(|i| [coordinate(&first, i), coordinate(&second, i)])
        .collect()
}

fn principal_component(
    matrix: &SparseMatrix,
    mean: &[f64],
    previous: &[Vec<f64>],
    rng: &mut ChaCha8Rng,
) -> Option<Vec<f64>> {
    let dim = mean.len();
    let mut v: Vec<f64> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    orthogonalize(&mut v, previous);
    normalize(&mut v)?;

    for _ in 0..MAX_ITERATIONS {
        let mut next = covariance_times(matrix, mean, &v);
        orthogonalize(&mut next, previous);
        normalize(&mut next)?;
        // compare up to sign
        let delta = 1.0 - dot(&next, &v).abs();
        v = next;
        if delta < TOLERANCE {
            break;
        }
    }

    let pivot = v
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(0.0);
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
    Some(v)
}

/// `C v` where `C = (1/n) sum (x - mean)(x - mean)^T`.
fn covariance_times(matrix: &SparseMatrix, mean: &[f64], v: &[f64]) -> Vec<f64> {
    let n = matrix.n_rows() as f64;
    let mean_dot = dot(mean, v);
    let mut out = vec![0.0; mean.len()];
    let mut total = 0.0;
    for row in matrix.rows() {
        let s = row.dot_dense(v) - mean_dot;
        row.add_to(&mut out, s / n);
        total += s;
    }
    for (o, m) in out.iter_mut().zip(mean) {
        *o -= total / n * m;
    }
    out
}

fn orthogonalize(v: &mut [f64], against: &[Vec<f64>]) {
    for u in against {
        let p = dot(v, u);
        for (x, y) in v.iter_mut().zip(u) {
            *x -= p * y;
        }
    }
}

/// `None` when the vector has collapsed to zero.
fn normalize(v: &mut [f64]) -> Option<()> {
    let norm = dot(v, v).sqrt();
    if norm < 1e-12 {
        return None;
    }
    v.iter_mut().for_each(|x| *x /= norm);
    Some(())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tests::{dense, two_blobs};

    #[test]
    fn deterministic_for_a_seed() {
        let m = two_blobs();
        assert_eq!(project_2d(&m, 42), project_2d(&m, 42));
    }

    #[test]
    fn seed_does_not_flip_axes() {
        let m = two_blobs();
        let a = project_2d(&m, 1);
        let b = project_2d(&m, 99);
        for (p, q) in a.iter().zip(&b) {
            assert!((p[0] - q[0]).abs() < 1e-6);
        }
    }

    #[test]
    fn first_axis_separates_blobs() {
        let p = project_2d(&two_blobs(), 42);
        assert_eq!(p.len(), 8);
        let spread: f64 = p[..4].iter().map(|x| x[0]).sum::<f64>() / 4.0
            - p[4..].iter().map(|x| x[0]).sum::<f64>() / 4.0;
        assert!(spread.abs() > 10.0);
        // centred
        let mean: f64 = p.iter().map(|x| x[0]).sum::<f64>() / 8.0;
        assert!(mean.abs() < 1e-9);
    }

    #[test]
    fn line_has_no_second_component() {
        let m = dense(&[&[1.0], &[2.0], &[3.0]]);
        let p = project_2d(&m, 7);
        assert!((p[0][0] - -1.0).abs() < 1e-9);
        assert!((p[2][0] - 1.0).abs() < 1e-9);
        assert!(p.iter().all(|x| x[1] == 0.0));
    }

    #[test]
    fn degenerate_inputs() {
        assert!(project_2d(&SparseMatrix::new(Vec::new(), 4), 0).is_empty());
        let flat = dense(&[&[1.0, 1.0], &[1.0, 1.0]]);
        assert_eq!(project_2d(&flat, 0), vec![[0.0, 0.0]; 2]);
    }
}
