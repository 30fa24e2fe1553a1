//! Road accident risk scoring.
//!
//! A point's risk blends a historical model (distance to known blackspots,
//! trained offline on a labelled road-node table) with live traffic and
//! weather penalties. See [`scorer`] for the blending rule.

pub mod blackspots;
pub mod classifier;
pub mod config;
pub mod context;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod graph;
pub mod heatmap;
pub mod labeler;
pub mod providers;
pub mod route;
pub mod scorer;
pub mod server;
