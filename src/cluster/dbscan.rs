use std::collections::VecDeque;

use tracing::debug;

use super::{at_least, positive, Assignment, ClusterError, DistanceMatrix, Label};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    pub eps: f64,
    pub min_samples: usize,
}

impl DbscanParams {
    pub fn validate(&self) -> Result<(), ClusterError> {
        positive("eps", self.eps)?;
        at_least("min_samples", self.min_samples, 1)
    }
}

/// Density-based clustering over precomputed distances.
///
/// A point is core when at least `min_samples` points, itself included, lie
/// within `eps`. Clusters grow from core points in ascending index order and
/// are numbered in the order they are found. A border point joins the first
/// cluster that reaches it. Everything unreachable is noise.
pub fn dbscan(distances: &DistanceMatrix, params: &DbscanParams) -> Result<Assignment, ClusterError> {
    params.validate()?;
    let n = distances.len();

    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            distances
                .row(i)
                .iter()
                .enumerate()
                .filter(|(_, d)| **d <= params.eps)
                .map(|(j, _)| j)
                .collect()
        })
        .collect();
    let core: Vec<bool> = neighbors.iter().map(|nb| nb.len() >= params.min_samples).collect();

    let mut labels = vec![Label::Noise; n];
    let mut assigned = vec![false; n];
    let mut next = 0;

    for seed in 0..n {
        if assigned[seed] || !core[seed] {
            continue;
        }
        let cluster = Label::Cluster(next);
        next += 1;

        let mut queue = VecDeque::from([seed]);
        assigned[seed] = true;
        while let Some(p) = queue.pop_front() {
            labels[p] = cluster;
            if !core[p] {
                continue;
            }
            for &q in &neighbors[p] {
                if !assigned[q] {
                    assigned[q] = true;
                    queue.push_back(q);
                }
            }
        }
    }

    let assignment = Assignment::new(labels);
    debug!(
        eps = params.eps,
        min_samples = params.min_samples,
        clusters = assignment.n_clusters(),
        noise = assignment.n_noise(),
        "dbscan"
    );
    Ok(assignment)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tests::{dense, two_blobs};

    fn run(points: &crate::features::SparseMatrix, eps: f64, min_samples: usize) -> Assignment {
        dbscan(&DistanceMatrix::euclidean(points), &DbscanParams { eps, min_samples }).unwrap()
    }

    #[test]
    fn separated_blobs() {
        let a = run(&two_blobs(), 0.5, 3);
        assert_eq!(a.n_clusters(), 2);
        assert_eq!(a.n_noise(), 0);
        assert!(a.labels[..4].iter().all(|l| *l == Label::Cluster(0)));
        assert!(a.labels[4..].iter().all(|l| *l == Label::Cluster(1)));
    }

    #[test]
    fn outlier_is_noise() {
        let points = dense(&[&[0.0], &[0.1], &[0.2], &[5.0]]);
        let a = run(&points, 0.5, 2);
        assert_eq!(
            a.labels,
            vec![Label::Cluster(0), Label::Cluster(0), Label::Cluster(0), Label::Noise]
        );
    }

    #[test]
    fn eps_too_small_gives_all_noise() {
        let a = run(&two_blobs(), 0.01, 2);
        assert_eq!(a.n_clusters(), 0);
        assert_eq!(a.n_noise(), 8);
    }

    #[test]
    fn min_samples_counts_the_point_itself() {
        let points = dense(&[&[0.0], &[10.0]]);
        let a = run(&points, 0.5, 1);
        assert_eq!(a.labels, vec![Label::Cluster(0), Label::Cluster(1)]);
    }

    #[test]
    fn border_point_is_not_expanded() {
        // 0,1,2 dense; 3 touches only 2; 4 touches nothing
        let points = dense(&[&[0.0], &[0.4], &[0.8], &[1.6], &[2.6]]);
        let a = run(&points, 0.9, 3);
        assert_eq!(a.labels[3], Label::Cluster(0));
        assert_eq!(a.labels[4], Label::Noise);
    }

    #[test]
    fn invalid_params() {
        let d = DistanceMatrix::euclidean(&two_blobs());
        assert!(dbscan(&d, &DbscanParams { eps: 0.0, min_samples: 3 }).is_err());
        assert!(dbscan(&d, &DbscanParams { eps: 1.0, min_samples: 0 }).is_err());
    }
}
