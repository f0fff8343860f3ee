mod cluster;
mod corpus;
mod features;
mod parser;
mod pipeline;
mod render;
mod report;
mod settings;
mod snapshot;
mod table;
mod text;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use cluster::birch::BirchParams;
use cluster::dbscan::DbscanParams;
use cluster::projection::project_2d;
use cluster::sweep::{self, Method, Run};
use pipeline::Source;
use settings::{Settings, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "notecluster", about = "Explore clusters in a folder of Markdown notes")]
struct Cli {
    /// TOML config file; a missing file means defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every note and write the raw corpus as CSV
    Snapshot {
        root: PathBuf,
        /// Output file (default: <output_dir>/corpus.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build the corpus table and print an overview
    Inspect {
        root: PathBuf,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "30")]
        limit: usize,
        /// Treat ROOT as a CSV snapshot instead of a folder
        #[arg(long)]
        snapshot: bool,
    },
    /// Run the DBSCAN and BIRCH parameter grids and plot every run
    Sweep { root: PathBuf },
    /// Run one clustering, report it and plot it
    Cluster {
        root: PathBuf,
        #[command(subcommand)]
        method: MethodArgs,
    },
    /// Word cloud of the highest-weighted body terms
    Cloud {
        root: PathBuf,
        /// Number of terms
        #[arg(short = 'k', long, default_value = "80")]
        top: usize,
    },
}

#[derive(Subcommand)]
enum MethodArgs {
    Dbscan {
        #[arg(long)]
        eps: f64,
        /// Default: the configured grid's min_samples
        #[arg(long)]
        min_samples: Option<usize>,
    },
    Birch {
        #[arg(long)]
        threshold: f64,
        /// Leave unset to keep the raw subclusters
        #[arg(long)]
        n_clusters: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    let result = match cli.command {
        Commands::Snapshot { root, output } => {
            let documents = pipeline::load_documents(&Source::Vault(root), &settings)?;
            let path = output.unwrap_or_else(|| settings.output_dir.join("corpus.csv"));
            snapshot::write(&path, &documents)?;
            println!("Wrote {} notes to {}", documents.len(), path.display());
            Ok(())
        }
        Commands::Inspect {
            root,
            limit,
            snapshot,
        } => {
            let source = if snapshot {
                Source::Snapshot(root)
            } else {
                Source::Vault(root)
            };
            let documents = pipeline::load_documents(&source, &settings)?;
            let table = pipeline::build_table(&documents, &settings)?;
            report::print_overview(&table, limit);
            Ok(())
        }
        Commands::Sweep { root } => {
            let prepared = pipeline::prepare(&Source::Vault(root), &settings)?;
            let grid = settings.sweep_grid();
            println!(
                "Sweeping {} DBSCAN and {} BIRCH configurations over {} notes...",
                grid.dbscan.len(),
                grid.birch.len(),
                prepared.table.rows()
            );
            let swept = sweep::run(&prepared.features, &grid, settings.seed)?;

            let out = output_dir(&settings.output_dir)?;
            let mut written = Vec::new();
            for (runs, name, title) in [
                (&swept.dbscan, "dbscan_sweep.svg", "DBSCAN sweep"),
                (&swept.birch, "birch_sweep.svg", "BIRCH sweep"),
            ] {
                if runs.is_empty() {
                    continue;
                }
                let path = out.join(name);
                render::scatter::render_grid(&path, title, &swept.projection, runs)?;
                written.push(path);
            }

            for run in swept.dbscan.iter().chain(&swept.birch) {
                println!(
                    "  {:<6} {:<32} clusters={:<4} noise={}",
                    run.method.name(),
                    run.method.to_string(),
                    run.assignment.n_clusters(),
                    run.assignment.n_noise()
                );
            }
            for path in written {
                println!("Wrote {}", path.display());
            }
            Ok(())
        }
        Commands::Cluster { root, method } => {
            let mut prepared = pipeline::prepare(&Source::Vault(root), &settings)?;
            let method = match method {
                MethodArgs::Dbscan { eps, min_samples } => Method::Dbscan(DbscanParams {
                    eps,
                    min_samples: min_samples.unwrap_or(settings.dbscan.min_samples),
                }),
                MethodArgs::Birch {
                    threshold,
                    n_clusters,
                } => Method::Birch(BirchParams {
                    threshold,
                    branching_factor: settings.birch.branching_factor,
                    n_clusters,
                }),
            };

            let assignment = method.fit(&prepared.features)?;
            prepared.table.attach_labels(&assignment.labels);
            report::print_clusters(&prepared.table, &prepared.features, &assignment);

            let projection = project_2d(&prepared.features.matrix, settings.seed);
            let path = output_dir(&settings.output_dir)?.join("clusters.svg");
            let title = format!("{} clusters", method.name());
            render::scatter::render_grid(&path, &title, &projection, &[Run { method, assignment }])?;
            println!("\nWrote {}", path.display());
            Ok(())
        }
        Commands::Cloud { root, top } => {
            let prepared = pipeline::prepare(&Source::Vault(root), &settings)?;
            let all: Vec<usize> = (0..prepared.table.rows()).collect();
            let terms = prepared.features.top_terms(table::TEXT, &all, top);
            if terms.is_empty() {
                println!("No body terms to draw.");
                return Ok(());
            }
            let path = output_dir(&settings.output_dir)?.join("wordcloud.svg");
            render::cloud::render(&path, &terms)?;
            println!("Wrote {} terms to {}", terms.len(), path.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", report::format_duration(elapsed));
    }

    result
}

fn output_dir(dir: &Path) -> anyhow::Result<&Path> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    Ok(dir)
}
