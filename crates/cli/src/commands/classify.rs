//! `tutorflow classify` — Show which tool a message routes to.

use std::path::Path;
use tutorflow_pipeline::{KeywordIntentStrategy, Pipeline};

pub async fn run(
    config_path: Option<&Path>,
    message: &str,
    use_model: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    let (intent, strategy) = if use_model {
        let pipeline = Pipeline::from_config(&config).await?;
        let classification = pipeline.classify(message, &[]).await;
        (classification.intent, classification.strategy)
    } else {
        let registry = config.registry()?;
        (KeywordIntentStrategy::score(message, &registry), "keyword".to_string())
    };

    println!("{intent}  (via {strategy})");
    Ok(())
}
