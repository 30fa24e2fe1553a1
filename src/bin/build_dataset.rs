//! Builds the labelled training table from road network nodes.
//!
//! Uses the raw node table when it exists; otherwise extracts junctions from
//! an OpenStreetMap PBF extract and writes the raw table first.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roadrisk::blackspots::BlackspotIndex;
use roadrisk::dataset::{
    DEFAULT_RAW_NODES_PATH, DEFAULT_TRAINING_TABLE_PATH, build_training_table, read_road_nodes,
    write_road_nodes, write_training_table,
};
use roadrisk::graph::RoadGraph;
use roadrisk::labeler::LABEL_RULE_VERSION;

#[derive(Parser, Debug)]
#[command(about = "Label road nodes by blackspot proximity and junction complexity")]
struct Args {
    /// Raw node table (node_id, lat, lon, junction_complexity)
    #[arg(long, default_value = DEFAULT_RAW_NODES_PATH)]
    raw: PathBuf,

    /// Output training table
    #[arg(long, default_value = DEFAULT_TRAINING_TABLE_PATH)]
    out: PathBuf,

    /// OSM extract used when the raw table is missing
    #[arg(long)]
    pbf: Option<PathBuf>,

    /// `name,lat,lon` blackspot table instead of the built-in one
    #[arg(long)]
    blackspots: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let nodes = if args.raw.exists() {
        info!(path = %args.raw.display(), "found existing raw data");
        read_road_nodes(&args.raw)?
    } else {
        let Some(pbf) = &args.pbf else {
            bail!(
                "{} does not exist; pass --pbf to extract it from OSM data",
                args.raw.display()
            );
        };
        let graph = RoadGraph::from_pbf(pbf)
            .with_context(|| format!("failed to read {}", pbf.display()))?;
        let nodes = graph.road_nodes();
        write_road_nodes(&args.raw, &nodes)?;
        info!(path = %args.raw.display(), count = nodes.len(), "raw data saved");
        nodes
    };

    let index = match &args.blackspots {
        Some(path) => BlackspotIndex::from_csv(path)?,
        None => BlackspotIndex::bengaluru(),
    };

    info!("calculating proximity to blackspots and labelling");
    let table = build_training_table(&nodes, &index);
    write_training_table(&args.out, &table)?;

    let high_risk = table.iter().filter(|r| r.is_high_risk()).count();
    info!(
        path = %args.out.display(),
        samples = table.len(),
        high_risk,
        label_rule_version = LABEL_RULE_VERSION,
        "training data saved"
    );
    Ok(())
}
