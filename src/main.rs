use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roadrisk::blackspots::BlackspotIndex;
use roadrisk::classifier::{Classifier, TreeEnsemble};
use roadrisk::config::AppConfig;
use roadrisk::context::SimulatedProvider;
use roadrisk::heatmap::load_heatmap;
use roadrisk::providers::HttpProvider;
use roadrisk::scorer::RiskScorer;
use roadrisk::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::from_env().context("invalid configuration")?;

    // 1. Blackspots
    let index = match &cfg.blackspots_path {
        Some(path) => BlackspotIndex::from_csv(path).context("failed to load blackspot table")?,
        None => BlackspotIndex::bengaluru(),
    };

    // 2. Risk model; without it the server still answers, but refuses to score
    let classifier: Option<Box<dyn Classifier>> = match TreeEnsemble::load(&cfg.model_path) {
        Ok(model) => Some(Box::new(model)),
        Err(e) => {
            warn!(error = %e, "risk model unavailable, /predict will answer 503");
            None
        }
    };

    // 3. Live context
    if cfg.tomtom_key.is_none() || cfg.openweather_key.is_none() {
        info!("live API key missing, simulating the affected signals");
    }
    let provider = HttpProvider::new(
        cfg.tomtom_key.clone(),
        cfg.openweather_key.clone(),
        cfg.provider_timeout,
    )
    .context("failed to build HTTP client")?
    .with_simulation(SimulatedProvider::new().with_utc_offset(cfg.utc_offset));

    // 4. Heatmap
    let heatmap = load_heatmap(&cfg.training_table_path).context("failed to load heatmap")?;

    let scorer = RiskScorer::new(index, classifier, Box::new(provider), cfg.scorer_settings());
    let state = Arc::new(AppState::new(
        cfg.city.clone(),
        scorer,
        heatmap,
        cfg.hex_resolution,
    ));

    let app = server::router(state);

    info!("API server running on http://{}", cfg.bind);
    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
