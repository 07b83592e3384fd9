//! `tutorflow chat` — Run one message through the pipeline.

use std::path::Path;
use tutorflow_pipeline::{ChatRequest, Pipeline};

pub async fn run(
    config_path: Option<&Path>,
    user_id: String,
    session_id: String,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let pipeline = Pipeline::from_config(&config).await?;

    let reply = pipeline
        .handle(ChatRequest {
            user_id,
            session_id,
            message,
            chat_history: None,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
