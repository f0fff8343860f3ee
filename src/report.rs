//! Console reports. Everything here prints to stdout as the CLI's output.

use std::time::Duration;

use itertools::Itertools;

use crate::cluster::Assignment;
use crate::features::FeatureMatrix;
use crate::table::{ColumnKind, CorpusTable, DIRECTORY, HAS_FRONT_MATTER, NAME, TEXT};

const DATE_COLUMN: &str = "date";
const SAMPLE_NAMES: usize = 5;
const TOP_TERMS: usize = 8;

/// Compact table of the first `limit` notes plus a summary of column kinds.
pub fn print_overview(table: &CorpusTable, limit: usize) {
    println!(
        "{:>4} | {:<28} | {:<24} | {:<10} | {:>4} | {:>7}",
        "#", "Note", "Directory", "Date", "Tags", "Chars"
    );
    println!("{}", "-".repeat(92));

    let tag_columns: Vec<_> = table.tag_columns().collect();
    let dates = table
        .column(DATE_COLUMN)
        .filter(|c| c.kind == ColumnKind::Temporal);

    for row in 0..table.rows().min(limit) {
        let name = truncate(table.text(NAME, row).unwrap_or("-"), 28);
        let dir = truncate(table.text(DIRECTORY, row).unwrap_or("-"), 24);
        let date = dates
            .and_then(|c| c.values[row].as_timestamp())
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        let tags = tag_columns
            .iter()
            .filter(|c| c.values[row].as_bool() == Some(true))
            .count();
        let chars = table.text(TEXT, row).map_or(0, |t| t.chars().count());

        println!(
            "{:>4} | {:<28} | {:<24} | {:<10} | {:>4} | {:>7}",
            row + 1,
            name,
            dir,
            date,
            tags,
            chars
        );
    }
    if table.rows() > limit {
        println!("  ... {} more", table.rows() - limit);
    }

    let with_fm = table
        .column(HAS_FRONT_MATTER)
        .map_or(0, |c| c.values.iter().filter(|v| v.as_bool() == Some(true)).count());
    println!(
        "\n{} notes | {} with front matter | {} columns | {} tags",
        table.rows(),
        with_fm,
        table.columns().len(),
        tag_columns.len()
    );

    println!("\n--- Columns ---");
    for (kind, columns) in &table
        .columns()
        .iter()
        .filter(|c| !c.name.starts_with(crate::table::TAG_PREFIX))
        .sorted_by_key(|c| c.kind)
        .group_by(|c| c.kind)
    {
        println!("  {:<9} {}", kind.as_str(), columns.map(|c| c.name.as_str()).join(", "));
    }
}

/// Size, sample notes and characteristic body terms of every cluster.
pub fn print_clusters(table: &CorpusTable, features: &FeatureMatrix, assignment: &Assignment) {
    println!(
        "{} clusters, {} noise points, {} notes\n",
        assignment.n_clusters(),
        assignment.n_noise(),
        assignment.len()
    );

    for label in assignment.distinct_labels() {
        let members = assignment.members(label);
        let samples = members
            .iter()
            .take(SAMPLE_NAMES)
            .filter_map(|&r| table.text(NAME, r))
            .map(|n| truncate(n, 24))
            .join(", ");
        let terms = features
            .top_terms(TEXT, &members, TOP_TERMS)
            .into_iter()
            .map(|(t, _)| t)
            .join(" ");

        println!("[{}] {} notes", label, members.len());
        println!("    notes: {}", samples);
        if !terms.is_empty() {
            println!("    terms: {}", terms);
        }
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──
