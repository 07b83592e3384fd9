//! `tutorflow tools` — List the tool registry.

use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let registry = config.registry()?;

    println!("🧰 Registered tools ({})", registry.len());
    println!();
    for tool in registry.iter() {
        println!("  {} — {}", tool.id, tool.display_name);
        println!("    endpoint:  {}", tool.endpoint);
        println!("    keywords:  {}", tool.keywords.join(", "));
        let params: Vec<String> = tool
            .params
            .iter()
            .map(|p| {
                let marker = if p.required { "*" } else { "" };
                format!("{}{marker}: {}", p.name, p.type_hint())
            })
            .collect();
        println!("    params:    {}", params.join(", "));
        println!();
    }
    println!("  * required");

    Ok(())
}
