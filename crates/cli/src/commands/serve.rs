//! `tutorflow serve` — Start the HTTP gateway.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🎓 tutorflow gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {} ({})", config.model.provider, config.model.model);
    println!("   Store:     {}", config.store.backend);

    tutorflow_gateway::start(config).await?;

    Ok(())
}
