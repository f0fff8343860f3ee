use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;
use tracing::{debug, info};

use super::{label_color, FONT};
use crate::cluster::Label;

const CANVAS: (u32, u32) = (900, 600);
const MIN_SIZE: f64 = 12.0;
const MAX_SIZE: f64 = 64.0;
const MAX_STEPS: usize = 20_000;

/// A term with its position (top-left corner) and box size.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub term: String,
    pub size: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placed {
    fn overlaps(&self, other: &Placed) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Word-cloud SVG of weighted terms; heavier terms are larger and placed
/// closer to the centre.
pub fn render(path: &Path, terms: &[(String, f64)]) -> Result<()> {
    anyhow::ensure!(!terms.is_empty(), "no terms for the word cloud");

    let placed = layout(terms, CANVAS);
    let root = SVGBackend::new(path, CANVAS).into_drawing_area();
    root.fill(&WHITE)?;
    for (rank, p) in placed.iter().enumerate() {
        let color = label_color(Label::Cluster(rank));
        let style = (FONT, p.size).into_font().color(&color);
        root.draw(&Text::new(p.term.clone(), (p.x as i32, p.y as i32), style))?;
    }
    root.present().with_context(|| format!("Failed to write {:?}", path))?;

    info!(path = %path.display(), terms = placed.len(), "word cloud written");
    Ok(())
}

/// Place terms heaviest first along an Archimedean spiral from the centre,
/// taking the first spot that overlaps nothing already placed. Terms that
/// find no spot are dropped.
pub fn layout(terms: &[(String, f64)], canvas: (u32, u32)) -> Vec<Placed> {
    let mut sorted: Vec<&(String, f64)> = terms.iter().filter(|(_, w)| *w > 0.0).collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let (lo, hi) = sorted
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, w)| (lo.min(*w), hi.max(*w)));
    let (cw, ch) = (canvas.0 as f64, canvas.1 as f64);

    let mut placed: Vec<Placed> = Vec::new();
    for (term, weight) in sorted {
        let scale = if hi > lo { (weight - lo) / (hi - lo) } else { 1.0 };
        let size = MIN_SIZE + (MAX_SIZE - MIN_SIZE) * scale;
        let width = size * 0.6 * term.chars().count() as f64;
        let height = size;

        let spot = (0..MAX_STEPS).find_map(|step| {
            let t = step as f64 * 0.1;
            let r = 2.0 * t;
            let candidate = Placed {
                term: term.clone(),
                size,
                x: cw / 2.0 + r * t.cos() - width / 2.0,
                y: ch / 2.0 + r * t.sin() - height / 2.0,
                width,
                height,
            };
            let inside = candidate.x >= 0.0
                && candidate.y >= 0.0
                && candidate.x + width <= cw
                && candidate.y + height <= ch;
            (inside && !placed.iter().any(|p| p.overlaps(&candidate))).then_some(candidate)
        });

        match spot {
            Some(p) => placed.push(p),
            None => debug!(term = %term, "no room in word cloud"),
        }
    }
    placed
}

// ── Tests ──
