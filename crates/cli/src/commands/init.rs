//! `dispatch init`: create the vault layout and per-lane memory files.

use dispatch_config::AppConfig;

pub async fn run(config: AppConfig, name: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let root = &config.vault_path;
    println!("Dispatch: vault setup at {}\n", root.display());

    let report = dispatch_vault::init_vault(root, name.as_deref()).await?;
    for dir in &report.created_dirs {
        println!("  created  {}/", dir.display());
    }
    for file in &report.created_files {
        println!("  created  {}", file.display());
    }
    if report.created_dirs.is_empty() && report.created_files.is_empty() {
        println!("  Vault already set up; nothing to do.");
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        std::fs::create_dir_all(AppConfig::config_dir())?;
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("  created  {}", config_path.display());
    }

    println!("\nNext: set ANTHROPIC_API_KEY, then run `dispatch ask \"what should I focus on today?\"`");
    Ok(())
}
