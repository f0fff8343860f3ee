use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;
use tracing::info;

use super::{label_color, FONT};
use crate::cluster::sweep::Run;

const PANEL: (u32, u32) = (420, 380);

/// One panel per run over a shared 2-D projection, laid out on a near-square
/// grid. Points are coloured by label; each panel lists its observed labels
/// and captions its parameters with cluster and noise counts.
pub fn render_grid(path: &Path, title: &str, projection: &[[f64; 2]], runs: &[Run]) -> Result<()> {
    anyhow::ensure!(!runs.is_empty(), "nothing to plot for {}", title);
    for run in runs {
        anyhow::ensure!(
            run.assignment.len() == projection.len(),
            "{} labels for {} projected points",
            run.assignment.len(),
            projection.len()
        );
    }

    let (rows, cols) = grid_shape(runs.len());
    let size = (PANEL.0 * cols as u32, PANEL.1 * rows as u32 + 40);
    let (x_range, y_range) = bounds(projection);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, (FONT, 24))?;

    for (panel, run) in root.split_evenly((rows, cols)).iter().zip(runs) {
        let caption = format!(
            "{} | clusters={} noise={}",
            run.method,
            run.assignment.n_clusters(),
            run.assignment.n_noise()
        );
        let mut chart = ChartBuilder::on(panel)
            .caption(caption, (FONT, 13))
            .margin(8)
            .x_label_area_size(20)
            .y_label_area_size(30)
            .build_cartesian_2d(x_range.clone(), y_range.clone())?;
        chart.configure_mesh().disable_mesh().x_labels(5).y_labels(5).draw()?;

        for label in run.assignment.distinct_labels() {
            let color = label_color(label);
            let points: Vec<(f64, f64)> = run
                .assignment
                .members(label)
                .into_iter()
                .map(|i| (projection[i][0], projection[i][1]))
                .collect();
            chart
                .draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))?
                .label(label.to_string())
                .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font((FONT, 11))
            .draw()?;
    }

    root.present().with_context(|| format!("Failed to write {:?}", path))?;
    info!(path = %path.display(), panels = runs.len(), "plot written");
    Ok(())
}

/// Rows and columns for `n` panels, columns first.
fn grid_shape(n: usize) -> (usize, usize) {
    let cols = (n as f64).sqrt().ceil().max(1.0) as usize;
    let rows = n.div_ceil(cols).max(1);
    (rows, cols)
}

/// Padded axis ranges covering every point; never empty.
fn bounds(points: &[[f64; 2]]) -> (Range<f64>, Range<f64>) {
    let axis = |k: usize| {
        let (lo, hi) = points
            .iter()
            .map(|p| p[k])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if !lo.is_finite() || !hi.is_finite() {
            return -1.0..1.0;
        }
        let pad = ((hi - lo) * 0.05).max(0.5);
        (lo - pad)..(hi + pad)
    };
    (axis(0), axis(1))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::dbscan::DbscanParams;
    use crate::cluster::sweep::Method;
    use crate::cluster::{Assignment, Label};

    fn run(eps: f64, labels: Vec<Label>) -> Run {
        Run {
            method: Method::Dbscan(DbscanParams { eps, min_samples: 2 }),
            assignment: Assignment::new(labels),
        }
    }

    #[test]
    fn grid_shapes() {
        assert_eq!(grid_shape(1), (1, 1));
        assert_eq!(grid_shape(4), (2, 2));
        assert_eq!(grid_shape(6), (2, 3));
        assert_eq!(grid_shape(9), (3, 3));
    }

    #[test]
    fn bounds_are_padded() {
        let (x, y) = bounds(&[[0.0, 1.0], [0.0, 1.0]]);
        assert!(x.start < 0.0 && x.end > 0.0);
        assert!(y.start < 1.0 && y.end > 1.0);
        assert_eq!(bounds(&[]), (-1.0..1.0, -1.0..1.0));
    }

    #[test]
    fn writes_svg_with_captions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.svg");
        let projection = vec![[0.0, 0.0], [1.0, 1.0], [5.0, 5.0]];
        let runs = vec![
            run(0.5, vec![Label::Cluster(0), Label::Cluster(0), Label::Noise]),
            run(9.0, vec![Label::Cluster(0); 3]),
        ];
        render_grid(&path, "DBSCAN sweep", &projection, &runs).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("DBSCAN sweep"));
        assert!(svg.contains("eps=0.5 min_samples=2 | clusters=1 noise=1"));
        assert!(svg.contains("noise"));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runs = vec![run(0.5, vec![Label::Noise])];
        assert!(render_grid(&dir.path().join("x.svg"), "t", &[[0.0, 0.0]; 2], &runs).is_err());
        assert!(render_grid(&dir.path().join("y.svg"), "t", &[], &[]).is_err());
    }
}
