//! `tutorflow init` — Write a default config file.

use std::path::Path;
use tutorflow_config::AppConfig;

pub fn run(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_file(config_path);

    println!("🎓 tutorflow — setup");
    println!("====================\n");

    if path.exists() && !force {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    write_default(&path)?;
    println!("✅ Created config at: {}", path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set TUTORFLOW_API_KEY (or api_key under [model]) to enable model routing");
    println!("   2. Point each [[tools]] endpoint at a running tool service");
    println!("   3. Run: tutorflow serve\n");

    Ok(())
}

fn write_default(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_default(&path).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.tools.len(), 4);
        assert_eq!(config.registry().unwrap().len(), 4);
    }

    #[test]
    fn existing_file_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        run(Some(path.as_path()), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
    }
}
