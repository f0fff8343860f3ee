//! Incremental hierarchical clustering over a clustering-feature (CF) tree.
//!
//! Points are inserted one by one. A leaf entry absorbs a point when the
//! merged subcluster radius stays within `threshold`; a node holding more
//! than `branching_factor` entries splits around its two farthest entries.
//! The leaf entries ("subclusters") are optionally reduced to `n_clusters`
//! groups by Ward agglomeration of their centroids, and every point is
//! finally labelled by its nearest subcluster.

use tracing::{debug, warn};

use super::{at_least, positive, Assignment, ClusterError, Label};
use crate::features::{SparseMatrix, SparseVector};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BirchParams {
    pub threshold: f64,
    pub branching_factor: usize,
    pub n_clusters: Option<usize>,
}

impl BirchParams {
    pub fn validate(&self) -> Result<(), ClusterError> {
        positive("threshold", self.threshold)?;
        at_least("branching_factor", self.branching_factor, 2)?;
        if let Some(k) = self.n_clusters {
            at_least("n_clusters", k, 1)?;
        }
        Ok(())
    }
}

/// Clustering feature: point count, linear sum and sum of squared norms.
#[derive(Debug, Clone)]
struct Cf {
    n: usize,
    linear_sum: Vec<f64>,
    squared_sum: f64,
}

impl Cf {
    fn empty(dim: usize) -> Self {
        Self {
            n: 0,
            linear_sum: vec![0.0; dim],
            squared_sum: 0.0,
        }
    }

    fn from_point(point: &SparseVector, dim: usize) -> Self {
        let mut cf = Self::empty(dim);
        cf.add_point(point);
        cf
    }

    fn add_point(&mut self, point: &SparseVector) {
        self.n += 1;
        point.add_to(&mut self.linear_sum, 1.0);
        self.squared_sum += point.squared_norm();
    }

    fn add(&mut self, other: &Cf) {
        self.n += other.n;
        for (a, b) in self.linear_sum.iter_mut().zip(&other.linear_sum) {
            *a += b;
        }
        self.squared_sum += other.squared_sum;
    }

    fn centroid(&self) -> Vec<f64> {
        let n = self.n.max(1) as f64;
        self.linear_sum.iter().map(|v| v / n).collect()
    }

    /// Radius of this subcluster after absorbing `point`.
    fn radius_with(&self, point: &SparseVector) -> f64 {
        let n = (self.n + 1) as f64;
        let ss = self.squared_sum + point.squared_norm();
        let ls_sq = squared_norm(&self.linear_sum)
            + 2.0 * point.dot_dense(&self.linear_sum)
            + point.squared_norm();
        (ss / n - ls_sq / (n * n)).max(0.0).sqrt()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    cf: Cf,
    centroid: Vec<f64>,
    centroid_sq: f64,
    child: Option<usize>,
}

impl Entry {
    fn new(cf: Cf, child: Option<usize>) -> Self {
        let centroid = cf.centroid();
        let centroid_sq = squared_norm(&centroid);
        Self {
            cf,
            centroid,
            centroid_sq,
            child,
        }
    }

    fn refresh(&mut self) {
        self.centroid = self.cf.centroid();
        self.centroid_sq = squared_norm(&self.centroid);
    }

    /// Squared distance from the centroid to `point`, up to the point's own
    /// norm which is constant across entries.
    fn score(&self, point: &SparseVector) -> f64 {
        self.centroid_sq - 2.0 * point.dot_dense(&self.centroid)
    }
}

#[derive(Debug, Clone)]
struct Node {
    leaf: bool,
    entries: Vec<Entry>,
}

/// CF tree stored as an arena of nodes.
#[derive(Debug)]
pub struct Birch {
    params: BirchParams,
    dim: usize,
    nodes: Vec<Node>,
    root: usize,
}

impl Birch {
    pub fn new(params: BirchParams) -> Result<Self, ClusterError> {
        params.validate()?;
        Ok(Self {
            params,
            dim: 0,
            nodes: Vec::new(),
            root: 0,
        })
    }

    pub fn fit_predict(mut self, matrix: &SparseMatrix) -> Result<Assignment, ClusterError> {
        if matrix.n_rows() == 0 {
            return Err(ClusterError::EmptyInput);
        }
        self.dim = matrix.n_cols();
        self.nodes = vec![Node {
            leaf: true,
            entries: Vec::new(),
        }];
        self.root = 0;

        for point in matrix.rows() {
            self.insert(point);
        }

        let centroids = self.subcluster_centroids();
        let groups = match self.params.n_clusters {
            Some(k) if centroids.len() < k => {
                warn!(
                    subclusters = centroids.len(),
                    n_clusters = k,
                    "fewer subclusters than requested clusters, keeping subclusters"
                );
                (0..centroids.len()).collect()
            }
            Some(k) => ward(&centroids, k),
            None => (0..centroids.len()).collect::<Vec<_>>(),
        };

        let labels = matrix
            .rows()
            .iter()
            .map(|p| Label::Cluster(groups[nearest(&centroids, p)]))
            .collect();
        let assignment = Assignment::new(labels);
        debug!(
            threshold = self.params.threshold,
            subclusters = centroids.len(),
            clusters = assignment.n_clusters(),
            "birch"
        );
        Ok(assignment)
    }

    fn insert(&mut self, point: &SparseVector) {
        if let Some(sibling) = self.insert_into(self.root, point) {
            let old = self.root;
            let entries = vec![self.summarize(old), self.summarize(sibling)];
            self.nodes.push(Node {
                leaf: false,
                entries,
            });
            self.root = self.nodes.len() - 1;
        }
    }

    /// Returns the id of a new sibling when `node` had to split.
    fn insert_into(&mut self, node: usize, point: &SparseVector) -> Option<usize> {
        let closest = closest_entry(&self.nodes[node].entries, point);

        if self.nodes[node].leaf {
            match closest {
                Some(i) if self.nodes[node].entries[i].cf.radius_with(point) <= self.params.threshold => {
                    let entry = &mut self.nodes[node].entries[i];
                    entry.cf.add_point(point);
                    entry.refresh();
                }
                _ => {
                    let cf = Cf::from_point(point, self.dim);
                    self.nodes[node].entries.push(Entry::new(cf, None));
                }
            }
        } else {
            // internal nodes are never empty
            let i = closest.unwrap_or(0);
            let Some(child) = self.nodes[node].entries[i].child else {
                unreachable!("internal entry without child");
            };
            let split = self.insert_into(child, point);
            self.nodes[node].entries[i] = self.summarize(child);
            if let Some(sibling) = split {
                let entry = self.summarize(sibling);
                self.nodes[node].entries.push(entry);
            }
        }

        if self.nodes[node].entries.len() > self.params.branching_factor {
            Some(self.split(node))
        } else {
            None
        }
    }

    /// Parent entry describing everything under `node`.
    fn summarize(&self, node: usize) -> Entry {
        let mut cf = Cf::empty(self.dim);
        for e in &self.nodes[node].entries {
            cf.add(&e.cf);
        }
        Entry::new(cf, Some(node))
    }

    /// Move part of `node`'s entries into a new node. The farthest pair of
    /// centroids seeds the two halves; every other entry follows the closer seed.
    fn split(&mut self, node: usize) -> usize {
        let entries = std::mem::take(&mut self.nodes[node].entries);
        let (a, b) = farthest_pair(&entries);
        let seed_a = entries[a].centroid.clone();
        let seed_b = entries[b].centroid.clone();

        let (right, left): (Vec<_>, Vec<_>) = entries.into_iter().enumerate().partition(|(i, e)| {
            *i == b
                || (*i != a
                    && squared_distance(&e.centroid, &seed_b) < squared_distance(&e.centroid, &seed_a))
        });

        let leaf = self.nodes[node].leaf;
        self.nodes[node].entries = left.into_iter().map(|(_, e)| e).collect();
        self.nodes.push(Node {
            leaf,
            entries: right.into_iter().map(|(_, e)| e).collect(),
        });
        self.nodes.len() - 1
    }

    fn subcluster_centroids(&self) -> Vec<Vec<f64>> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.leaf {
                out.extend(node.entries.iter().map(|e| e.centroid.clone()));
            } else {
                // reversed so children come out left to right
                stack.extend(node.entries.iter().rev().filter_map(|e| e.child));
            }
        }
        out
    }
}

fn closest_entry(entries: &[Entry], point: &SparseVector) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.score(point).total_cmp(&b.score(point)))
        .map(|(i, _)| i)
}

fn farthest_pair(entries: &[Entry]) -> (usize, usize) {
    let mut best = (0, 1, f64::NEG_INFINITY);
    for i in 0..entries.len() {
        for j in i + 1..entries.len() {
            let d = squared_distance(&entries[i].centroid, &entries[j].centroid);
            if d > best.2 {
                best = (i, j, d);
            }
        }
    }
    (best.0, best.1)
}

fn nearest(centroids: &[Vec<f64>], point: &SparseVector) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_norm(c) - 2.0 * point.dot_dense(c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}

/// Agglomerate points bottom-up with Ward linkage until `k` groups remain.
/// Groups are numbered by their first member. Cubic in the number of
/// subclusters, which stays small for note vaults.
fn ward(points: &[Vec<f64>], k: usize) -> Vec<usize> {
    let m = points.len();
    let mut size = vec![1usize; m];
    let mut alive = vec![true; m];
    let mut group: Vec<usize> = (0..m).collect();
    let mut dist = vec![vec![0.0; m]; m];
    for i in 0..m {
        for j in i + 1..m {
            let d = squared_distance(&points[i], &points[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    for _ in k..m {
        let mut best = (0, 0, f64::INFINITY);
        for i in (0..m).filter(|&i| alive[i]) {
            for j in (i + 1..m).filter(|&j| alive[j]) {
                if dist[i][j] < best.2 {
                    best = (i, j, dist[i][j]);
                }
            }
        }
        let (a, b, d_ab) = best;

        // Lance-Williams update for Ward on squared distances
        for c in (0..m).filter(|&c| alive[c] && c != a && c != b) {
            let (na, nb, nc) = (size[a] as f64, size[b] as f64, size[c] as f64);
            let d = ((na + nc) * dist[a][c] + (nb + nc) * dist[b][c] - nc * d_ab) / (na + nb + nc);
            dist[a][c] = d;
            dist[c][a] = d;
        }
        size[a] += size[b];
        alive[b] = false;
        for g in group.iter_mut().filter(|g| **g == b) {
            *g = a;
        }
    }

    let mut renumber = std::collections::HashMap::new();
    group
        .iter()
        .map(|g| {
            let next = renumber.len();
            *renumber.entry(*g).or_insert(next)
        })
        .collect()
}

fn squared_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

// ── Tests ──
