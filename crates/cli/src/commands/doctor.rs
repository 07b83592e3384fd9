//! `tutorflow doctor` — Diagnose configuration.

use std::path::Path;
use std::time::Duration;
use tutorflow_config::{AppConfig, ModelConfig};
use tutorflow_core::Provider;
use tutorflow_providers::build_from_config;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 tutorflow doctor");
    println!("===================\n");

    let mut issues = 0;
    let path = super::config_file(config_path);

    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults (run `tutorflow init`)", path.display());
        issues += 1;
    }

    let config = match AppConfig::load_at(&path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running other checks.");
            return Ok(());
        }
    };

    match config.registry() {
        Ok(registry) => {
            println!("  ✅ Tool registry valid ({} tools)", registry.len());
            for tool in registry.iter() {
                println!("     {} → {}", tool.id, tool.endpoint);
            }
        }
        Err(e) => {
            println!("  ❌ Tool registry invalid: {e}");
            issues += 1;
        }
    }

    let model = &config.model;
    if model.provider == "none" {
        println!("  ⚠️  Model disabled: routing uses keywords and fallback rules only");
        issues += 1;
    } else if config.has_api_key() || !tutorflow_providers::needs_api_key(&model.provider) {
        println!("  ✅ Model: {} ({})", model.provider, model.model);
        match model_reachable(model).await {
            Some(Ok(true)) => println!("  ✅ Model endpoint reachable"),
            Some(Ok(false)) => {
                println!("  ⚠️  Model endpoint answered with an error status");
                issues += 1;
            }
            Some(Err(e)) => {
                println!("  ⚠️  Model endpoint unreachable: {e}");
                issues += 1;
            }
            None => {}
        }
    } else {
        println!(
            "  ⚠️  No API key for '{}': routing uses keywords and fallback rules only",
            model.provider
        );
        issues += 1;
    }

    println!("  ✅ Store backend: {}", config.store.backend);

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Ask the configured model backend whether it answers. `None` when no
/// backend is configured.
async fn model_reachable(model: &ModelConfig) -> Option<Result<bool, String>> {
    let provider = build_from_config(model).default()?;
    Some(
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, provider.health_check()).await {
            Ok(Ok(ok)) => Ok(ok),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("timed out".into()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;

    fn local_model(api_url: String) -> ModelConfig {
        ModelConfig {
            provider: "ollama".into(),
            api_url: Some(api_url),
            ..ModelConfig::default()
        }
    }

    #[tokio::test]
    async fn disabled_model_is_not_checked() {
        let model = ModelConfig {
            provider: "none".into(),
            ..ModelConfig::default()
        };
        assert!(model_reachable(&model).await.is_none());
    }

    #[tokio::test]
    async fn live_model_endpoint_is_reachable() {
        let app = Router::new().route("/v1/models", get(|| async { "{\"data\": []}" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let result = model_reachable(&local_model(format!("http://{addr}/v1"))).await;
        assert_eq!(result, Some(Ok(true)));
    }

    #[tokio::test]
    async fn refused_model_endpoint_is_reported() {
        let result = model_reachable(&local_model("http://127.0.0.1:1/v1".into())).await;
        assert!(matches!(result, Some(Err(_))));
    }
}
