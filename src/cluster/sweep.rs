use std::fmt;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::birch::{Birch, BirchParams};
use super::dbscan::{dbscan, DbscanParams};
use super::projection::project_2d;
use super::{Assignment, ClusterError, DistanceMatrix};
use crate::features::FeatureMatrix;

/// Parameter grid for both methods.
#[derive(Debug, Clone, Default)]
pub struct SweepGrid {
    pub dbscan: Vec<DbscanParams>,
    pub birch: Vec<BirchParams>,
}

impl SweepGrid {
    pub fn len(&self) -> usize {
        self.dbscan.len() + self.birch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    Dbscan(DbscanParams),
    Birch(BirchParams),
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Dbscan(_) => "DBSCAN",
            Method::Birch(_) => "BIRCH",
        }
    }

    pub fn fit(&self, features: &FeatureMatrix) -> Result<Assignment, ClusterError> {
        match self {
            Method::Dbscan(p) => dbscan(&DistanceMatrix::euclidean(&features.matrix), p),
            Method::Birch(p) => Birch::new(*p)?.fit_predict(&features.matrix),
        }
    }
}

/// Parameter caption, e.g. `eps=1.2 min_samples=3`.
impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Dbscan(p) => write!(f, "eps={} min_samples={}", p.eps, p.min_samples),
            Method::Birch(p) => {
                write!(f, "threshold={}", p.threshold)?;
                match p.n_clusters {
                    Some(k) => write!(f, " n_clusters={}", k),
                    None => write!(f, " n_clusters=none"),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Run {
    pub method: Method,
    pub assignment: Assignment,
}

#[derive(Debug, Clone)]
pub struct Sweep {
    pub dbscan: Vec<Run>,
    pub birch: Vec<Run>,
    /// Shared by every panel so plots are comparable.
    pub projection: Vec<[f64; 2]>,
}

/// Run every grid point. Distances are computed once for all DBSCAN runs and
/// the projection once for the whole sweep.
pub fn run(features: &FeatureMatrix, grid: &SweepGrid, seed: u64) -> Result<Sweep, ClusterError> {
    let matrix = &features.matrix;
    if matrix.n_rows() == 0 {
        return Err(ClusterError::EmptyInput);
    }

    let pb = ProgressBar::new(grid.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut dbscan_runs = Vec::with_capacity(grid.dbscan.len());
    if !grid.dbscan.is_empty() {
        let distances = DistanceMatrix::euclidean(matrix);
        for params in &grid.dbscan {
            pb.set_message(format!("dbscan {}", params.eps));
            let assignment = dbscan(&distances, params)?;
            dbscan_runs.push(Run {
                method: Method::Dbscan(*params),
                assignment,
            });
            pb.inc(1);
        }
    }

    let mut birch_runs = Vec::with_capacity(grid.birch.len());
    for params in &grid.birch {
        pb.set_message(format!("birch {}", params.threshold));
        let assignment = Birch::new(*params)?.fit_predict(matrix)?;
        birch_runs.push(Run {
            method: Method::Birch(*params),
            assignment,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();

    let projection = project_2d(matrix, seed);
    info!(
        dbscan = dbscan_runs.len(),
        birch = birch_runs.len(),
        points = projection.len(),
        "sweep complete"
    );

    Ok(Sweep {
        dbscan: dbscan_runs,
        birch: birch_runs,
        projection,
    })
}

// ── Tests ──
